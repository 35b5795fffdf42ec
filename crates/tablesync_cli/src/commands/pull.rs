//! Pull command implementation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablesync_engine::{
    EngineConfig, MemoryPendingLog, MemoryRemote, PullClient, PullSettings, PullSummary,
};
use tablesync_protocol::{system, SyncQuery};
use tablesync_storage::{FileStore, LocalStore, Row, TableSchema};
use tracing::info;

/// Arguments of the pull command.
#[derive(Debug, Clone)]
pub struct PullOptions {
    /// JSON file holding the remote rows.
    pub remote: PathBuf,
    /// Table to pull.
    pub table: String,
    /// Incremental pull identity.
    pub query_id: Option<String>,
    /// Rows per page.
    pub page_size: Option<u32>,
    /// Largest page the remote answers with.
    pub server_page_size: Option<u32>,
}

/// Pull result as printed.
#[derive(Debug, Serialize)]
pub struct PullReport {
    /// Pulled table.
    pub table: String,
    /// Incremental pull identity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    /// Pages fetched.
    pub pages_fetched: u64,
    /// Pages held back by pending mutations.
    pub pages_skipped: u64,
    /// Rows upserted.
    pub upserted: u64,
    /// Rows deleted.
    pub deleted: u64,
    /// Newest change pulled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_water_mark: Option<String>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl PullReport {
    fn new(summary: &PullSummary, query_id: Option<String>) -> Self {
        Self {
            table: summary.table.clone(),
            query_id,
            pages_fetched: summary.pages_fetched,
            pages_skipped: summary.pages_skipped,
            upserted: summary.upserted,
            deleted: summary.deleted,
            high_water_mark: summary
                .high_water_mark
                .as_ref()
                .map(system::format_timestamp),
            duration_ms: summary.duration.as_millis() as u64,
        }
    }
}

/// Remote dump layouts: a bare array of rows for the pulled table, or an
/// object mapping table names to rows.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteDump {
    Rows(Vec<Row>),
    Tables(BTreeMap<String, Vec<Row>>),
}

/// Loads a remote dump into an in-memory remote.
pub fn load_remote(
    path: &Path,
    table: &str,
    server_page_size: Option<u32>,
) -> Result<MemoryRemote, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(path)?);
    let dump: RemoteDump = serde_json::from_reader(reader)?;

    let mut remote = MemoryRemote::new();
    if let Some(size) = server_page_size {
        remote = remote.with_max_page_size(size);
    }
    match dump {
        RemoteDump::Rows(rows) => remote.put_all(table, rows),
        RemoteDump::Tables(tables) => {
            for (name, rows) in tables {
                remote.put_all(&name, rows);
            }
        }
    }
    Ok(remote)
}

/// Runs the pull command.
pub async fn run(
    path: &Path,
    options: PullOptions,
    format: &str,
) -> Result<PullReport, Box<dyn std::error::Error>> {
    info!("Pulling table {} from {:?} into {:?}", options.table, options.remote, path);

    let store = Arc::new(FileStore::open(path)?);
    if !store.table_names().contains(&options.table) {
        store.define_table(&TableSchema::new(&options.table)).await?;
    }
    let remote = Arc::new(load_remote(
        &options.remote,
        &options.table,
        options.server_page_size,
    )?);

    let client = PullClient::new(
        EngineConfig::default(),
        store,
        remote,
        Arc::new(MemoryPendingLog::new()),
    )?;
    client.initialize().await?;

    let mut settings = PullSettings::default();
    if let Some(size) = options.page_size {
        settings = settings.with_page_size(size);
    }
    let summary = client
        .pull(
            &SyncQuery::new(&options.table),
            options.query_id.as_deref(),
            settings,
        )
        .await?;
    let report = PullReport::new(&summary, options.query_id);
    info!(
        "Pulled {} pages: {} upserted, {} deleted",
        report.pages_fetched, report.upserted, report.deleted
    );

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(report)
}

fn print_text_output(report: &PullReport) {
    println!("Pulled table: {}", report.table);
    match &report.query_id {
        Some(id) => println!("Query id:     {id}"),
        None => println!("Query id:     (one-shot)"),
    }
    println!("Pages:        {} ({} held back)", report.pages_fetched, report.pages_skipped);
    println!("Upserted:     {}", report.upserted);
    println!("Deleted:      {}", report.deleted);
    if let Some(hwm) = &report.high_water_mark {
        println!("Checkpoint:   {hwm}");
    }
    println!("Took:         {} ms", report.duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn write_dump(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("remote.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const ROWS: &str = r#"[
        {"id": "a", "updatedAt": "2024-01-01T00:00:00Z", "deleted": false, "title": "milk"},
        {"id": "b", "updatedAt": "2024-01-02T00:00:00Z", "deleted": true},
        {"id": "c", "updatedAt": "2024-01-03T00:00:00Z", "deleted": false, "title": "eggs"}
    ]"#;

    #[tokio::test]
    async fn pull_into_file_store() {
        let dir = TempDir::new().unwrap();
        let remote = write_dump(&dir, ROWS);
        let store_path = dir.path().join("store");

        let options = PullOptions {
            remote,
            table: "todo".into(),
            query_id: Some("all".into()),
            page_size: Some(1),
            server_page_size: None,
        };
        let report = run(&store_path, options, "json").await.unwrap();

        // With one row per page every row is fetched again at its own
        // instant before the cursor moves on.
        assert_eq!(report.upserted, 4);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.pages_fetched, 7);
        assert_eq!(report.high_water_mark.as_deref(), Some("2024-01-03T00:00:00Z"));

        let store = FileStore::open(&store_path).unwrap();
        let rows = store.rows("todo").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn pull_logs_progress() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = TempDir::new().unwrap();
        let options = PullOptions {
            remote: write_dump(&dir, ROWS),
            table: "todo".into(),
            query_id: None,
            page_size: Some(1),
            server_page_size: None,
        };
        run(&dir.path().join("store"), options, "text").await.unwrap();

        let output = logs.contents();
        assert!(output.contains("Pulling table todo"), "{output}");
        assert!(output.contains("Pulled 7 pages: 4 upserted, 2 deleted"), "{output}");
    }

    #[tokio::test]
    async fn load_remote_by_table() {
        let dir = TempDir::new().unwrap();
        let path = write_dump(&dir, &format!(r#"{{"todo": {ROWS}, "notes": []}}"#));
        let remote = load_remote(&path, "ignored", Some(2)).unwrap();

        let page = tablesync_protocol::PageQuery::at_cursor(
            "todo",
            None,
            system::beginning_of_time(),
            10,
        );
        let rows = tablesync_engine::RemoteSource::read(
            &remote,
            &page,
            &tablesync_protocol::ReadOptions::including_deleted(),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn load_remote_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = write_dump(&dir, "42");
        assert!(load_remote(&path, "todo", None).is_err());
    }
}
