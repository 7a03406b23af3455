// dietops/src/maintenance/mod.rs
pub(crate) mod housekeeping;
pub(crate) mod schedule;

use chrono::Utc;

use crate::errors::Result;
use crate::tasks::TaskContext;

pub use housekeeping::{Housekeeping, PgHousekeeping};
pub use schedule::{MaintenanceSchedule, ScheduleStore, ScheduleUpdate};

/// Maintenance procedure: Init(20) → Analyze(50) → Cleanup(85) → Done, then stamps `lastRun`.
pub async fn run_maintenance(
    ctx: &mut TaskContext,
    db: &dyn Housekeeping,
    schedule: &ScheduleStore,
    retention_days: u32,
) -> Result<String> {
    ctx.enter("Init", 20, "Starting database maintenance");

    ctx.enter("Analyze", 50, "Optimizing database (VACUUM ANALYZE)");
    db.optimize().await?;

    ctx.enter(
        "Cleanup",
        85,
        format!("Purging audit records older than {} days", retention_days),
    );
    let purged = db.purge_audit_older_than(retention_days).await?;
    ctx.log(format!("Removed {} old audit records", purged));

    let finished = schedule.record_run(Utc::now()).await?;
    if let Some(at) = finished.last_run {
        ctx.log(format!("Last maintenance run recorded at {}", at.to_rfc3339()));
    }

    Ok("Maintenance completed successfully".to_string())
}
