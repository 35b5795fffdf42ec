//! Configuration for the pull engine.

use crate::error::{PullError, PullResult};

/// Page size used when a pull does not override it.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Name of the local table holding incremental pull checkpoints.
pub const DEFAULT_CHECKPOINT_TABLE: &str = "__incremental_pull_checkpoints";

/// Maximum length of a pull identity, in characters.
pub const DEFAULT_MAX_IDENTITY_LEN: usize = 255;

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Page size for pulls that don't set one.
    pub default_page_size: u32,
    /// Local table used to persist checkpoints.
    pub checkpoint_table: String,
    /// Maximum length of a pull identity.
    pub max_identity_len: usize,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            checkpoint_table: DEFAULT_CHECKPOINT_TABLE.to_string(),
            max_identity_len: DEFAULT_MAX_IDENTITY_LEN,
        }
    }

    /// Sets the default page size.
    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }

    /// Sets the checkpoint table name.
    pub fn with_checkpoint_table(mut self, table: impl Into<String>) -> Self {
        self.checkpoint_table = table.into();
        self
    }

    /// Sets the maximum identity length.
    pub fn with_max_identity_len(mut self, len: usize) -> Self {
        self.max_identity_len = len;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PullError::InvalidSettings`] for a zero default page size,
    /// an empty checkpoint table name or a zero identity length.
    pub fn validate(&self) -> PullResult<()> {
        if self.default_page_size == 0 {
            return Err(PullError::InvalidSettings(
                "default page size must be a positive integer".into(),
            ));
        }
        if self.checkpoint_table.is_empty() {
            return Err(PullError::InvalidSettings(
                "checkpoint table name must not be empty".into(),
            ));
        }
        if self.max_identity_len == 0 {
            return Err(PullError::InvalidSettings(
                "maximum identity length must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call pull settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullSettings {
    /// Overrides the engine's default page size.
    pub page_size: Option<u32>,
}

impl PullSettings {
    /// Settings with a page size override.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Returns the page size to use for this pull.
    ///
    /// # Errors
    ///
    /// Returns [`PullError::InvalidSettings`] if an override is present and
    /// is not a positive integer.
    pub fn resolve_page_size(&self, default: u32) -> PullResult<u32> {
        match self.page_size {
            Some(0) => Err(PullError::InvalidSettings(
                "page size must be a positive integer".into(),
            )),
            Some(size) => Ok(size),
            None => Ok(default),
        }
    }
}
