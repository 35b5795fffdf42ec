//! Checkpoints command implementation.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tablesync_engine::{
    validate_identity, Checkpoint, CheckpointStore, DEFAULT_CHECKPOINT_TABLE,
    DEFAULT_MAX_IDENTITY_LEN,
};
use tablesync_protocol::system;
use tablesync_storage::{row_id_of, FileStore, StorageError};
use tracing::info;

/// A stored checkpoint as printed.
#[derive(Debug, Serialize)]
pub struct CheckpointEntry {
    /// Pull identity.
    pub identity: String,
    /// Pulled table.
    pub table: String,
    /// Newest change pulled.
    pub high_water_mark: String,
    /// First write.
    pub created_at: String,
    /// Last write.
    pub updated_at: String,
}

impl From<Checkpoint> for CheckpointEntry {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            identity: checkpoint.identity,
            table: checkpoint.table,
            high_water_mark: system::format_timestamp(&checkpoint.high_water_mark),
            created_at: system::format_timestamp(&checkpoint.created_at),
            updated_at: system::format_timestamp(&checkpoint.updated_at),
        }
    }
}

/// Runs the checkpoints command.
pub async fn run(
    path: &Path,
    reset: Option<&str>,
    format: &str,
) -> Result<Vec<CheckpointEntry>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {:?}", path).into());
    }
    info!("Reading checkpoints from {:?}", path);

    let store = Arc::new(FileStore::open(path)?);
    let checkpoints = CheckpointStore::new(Arc::clone(&store), DEFAULT_CHECKPOINT_TABLE);

    if let Some(identity) = reset {
        validate_identity(Some(identity), DEFAULT_MAX_IDENTITY_LEN)?;
        checkpoints.initialize().await?;
        checkpoints.remove(identity).await?;
        info!("Removed checkpoint {identity}");
        println!("Reset checkpoint: {identity}");
    }

    let entries = list(&store, &checkpoints).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            print_text_output(&entries);
        }
    }

    Ok(entries)
}

async fn list(
    store: &FileStore,
    checkpoints: &CheckpointStore<FileStore>,
) -> Result<Vec<CheckpointEntry>, Box<dyn std::error::Error>> {
    let rows = match store.rows(DEFAULT_CHECKPOINT_TABLE) {
        Ok(rows) => rows,
        Err(StorageError::TableNotDefined(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let identity = row_id_of(&row)?.to_string();
        if let Some(checkpoint) = checkpoints.get(&identity).await? {
            entries.push(CheckpointEntry::from(checkpoint));
        }
    }
    Ok(entries)
}

fn print_text_output(entries: &[CheckpointEntry]) {
    if entries.is_empty() {
        println!("No checkpoints");
        return;
    }
    println!("{:<24} {:<16} {:<28} {}", "IDENTITY", "TABLE", "HIGH-WATER-MARK", "UPDATED");
    for entry in entries {
        println!(
            "{:<24} {:<16} {:<28} {}",
            entry.identity, entry.table, entry.high_water_mark, entry.updated_at
        );
    }
}
