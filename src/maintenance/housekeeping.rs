// dietops/src/maintenance/housekeeping.rs
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::{OpsError, Result};

/// Database-side work done by the maintenance task.
#[async_trait]
pub trait Housekeeping: Send + Sync {
    /// Refreshes planner statistics and reclaims dead tuples.
    async fn optimize(&self) -> Result<()>;

    /// Deletes audit rows older than `retention_days`; returns the number removed.
    async fn purge_audit_older_than(&self, retention_days: u32) -> Result<u64>;
}

pub struct PgHousekeeping {
    pool: PgPool,
    audit_table: String,
    audit_timestamp_column: String,
}

impl PgHousekeeping {
    /// Connections are opened on first use so the API can start while the database is down.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(&config.database_url)?;
        Ok(Self {
            pool,
            audit_table: config.audit_table.clone(),
            audit_timestamp_column: config.audit_timestamp_column.clone(),
        })
    }

    async fn audit_table_exists(&self) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass(quote_ident($1)) IS NOT NULL")
            .bind(&self.audit_table)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl Housekeeping for PgHousekeeping {
    async fn optimize(&self) -> Result<()> {
        // VACUUM cannot run inside a transaction block; a plain pool execute is autocommit
        sqlx::query("VACUUM (ANALYZE)")
            .execute(&self.pool)
            .await
            .map_err(OpsError::from)?;
        info!("VACUUM ANALYZE completed");
        Ok(())
    }

    async fn purge_audit_older_than(&self, retention_days: u32) -> Result<u64> {
        let days = retention_days_param(retention_days)?;
        if !self.audit_table_exists().await? {
            warn!(table = %self.audit_table, "Audit table not found, nothing to purge");
            return Ok(0);
        }

        // identifiers were validated when the configuration was loaded
        let sql = format!(
            r#"DELETE FROM "{}" WHERE "{}" < NOW() - make_interval(days => $1)"#,
            self.audit_table, self.audit_timestamp_column
        );
        let result = sqlx::query(&sql)
            .bind(days)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// `make_interval` takes an `int4`; a wrapped value would move the cutoff into the future.
fn retention_days_param(retention_days: u32) -> Result<i32> {
    match i32::try_from(retention_days) {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(OpsError::Validation(format!(
            "audit retention of {} days is out of range",
            retention_days
        ))),
    }
}
