// dietops/src/restore/mod.rs
use crate::errors::Result;
use crate::snapshot::SnapshotTool;
use crate::store::{ArtifactPrefix, BackupStore};
use crate::tasks::TaskContext;

/// Restore procedure: Init(20) → SafetyBackup(40) → Apply(70) → Done.
///
/// The live database is only touched after the safety snapshot has been written;
/// any earlier failure returns before `restore` is called.
pub async fn run_restore(
    ctx: &mut TaskContext,
    store: &BackupStore,
    tool: &dyn SnapshotTool,
    artifact: &str,
) -> Result<String> {
    ctx.enter("Init", 20, format!("Starting restore from {}", artifact));
    // the file may have been deleted since the request was accepted
    let source = store.existing_path(artifact).await?;
    store.ensure_directory().await?;

    let (safety_name, safety_path) = store.allocate(ArtifactPrefix::PreRestore);
    ctx.enter(
        "SafetyBackup",
        40,
        format!("Creating safety backup {} before restore", safety_name),
    );
    tool.dump(&safety_path).await?;

    ctx.enter("Apply", 70, format!("Restoring database from {}", artifact));
    tool.restore(&source).await?;

    Ok(format!(
        "Restore completed successfully from {} (safety backup: {})",
        artifact, safety_name
    ))
}
