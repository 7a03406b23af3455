// dietops/src/backup/mod.rs
use crate::errors::{OpsError, Result};
use crate::snapshot::SnapshotTool;
use crate::store::{ArtifactPrefix, BackupStore};
use crate::tasks::TaskContext;
use crate::utils::format_bytes;

/// Backup procedure: Init(10) → Dump(50) → Verify(80) → Done.
///
/// Returns the success line; the runner records it together with progress 100.
pub async fn run_backup(
    ctx: &mut TaskContext,
    store: &BackupStore,
    tool: &dyn SnapshotTool,
) -> Result<String> {
    ctx.enter("Init", 10, "Starting database backup");
    store.ensure_directory().await?;

    let (name, path) = store.allocate(ArtifactPrefix::Backup);
    ctx.enter("Dump", 50, format!("Creating database dump {}", name));
    tool.dump(&path).await?;

    ctx.enter("Verify", 80, "Verifying backup file");
    let artifact = store.stat(&name).await.map_err(|e| match e {
        OpsError::NotFound(_) => {
            OpsError::Storage(format!("dump reported success but {} was not written", name))
        }
        other => other,
    })?;
    let size = format_bytes(artifact.size_bytes);
    ctx.log(format!("Backup file size: {}", size));

    Ok(format!("Backup completed successfully: {} ({})", name, size))
}
