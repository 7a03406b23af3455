//! Adapter around the external dump/restore tool.
//!
//! Executors only see [`SnapshotTool`]; the PostgreSQL client binaries live behind
//! [`PgSnapshotTool`], so tests and alternative backends can swap the invocation.

pub(crate) mod pg_tools;

use async_trait::async_trait;
use std::path::Path;

use crate::errors::Result;

pub use pg_tools::PgSnapshotTool;

#[async_trait]
pub trait SnapshotTool: Send + Sync {
    /// Writes a complete logical snapshot of the configured database to `target`.
    /// Returns only after the tool has exited successfully.
    async fn dump(&self, target: &Path) -> Result<()>;

    /// Applies the snapshot at `source` to the configured database.
    async fn restore(&self, source: &Path) -> Result<()>;
}
