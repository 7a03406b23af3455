// dietops/src/config/mod.rs
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{info, warn};
use url::Url;

const DEFAULT_BACKUP_DIR: &str = "./backups";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_AUDIT_TABLE: &str = "audit_logs";
const DEFAULT_AUDIT_TIMESTAMP_COLUMN: &str = "created_at";
const DEFAULT_AUDIT_RETENTION_DAYS: u32 = 90;
const MAX_AUDIT_RETENTION_DAYS: u32 = 36_500;
const SCHEDULE_FILE_NAME: &str = "maintenance_schedule.json";

static SQL_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("SQL identifier pattern is valid")
});

// Struct for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub database_url: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub listen_addr: Option<String>,
    pub admin_token: Option<String>,
    pub schedule_file: Option<PathBuf>,
    pub audit_table: Option<String>,
    pub audit_timestamp_column: Option<String>,
    pub audit_retention_days: Option<u32>,
    pub pg_dump_path: Option<PathBuf>,
    pub psql_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub backup_dir: PathBuf,
    pub listen_addr: String,
    pub admin_token: Option<String>,
    pub schedule_file: PathBuf,
    pub audit_table: String,
    pub audit_timestamp_column: String,
    pub audit_retention_days: u32,
    pub pg_dump_path: Option<PathBuf>,
    pub psql_path: Option<PathBuf>,
}

impl AppConfig {
    /// Reads `config_path` if it exists, then lets environment variables override it.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read config file at {}", config_path.display())
            })?;
            serde_json::from_str(&config_content).with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?
        } else {
            info!(
                "No config file at {}, relying on environment variables",
                config_path.display()
            );
            RawJsonConfig::default()
        };

        Self::from_raw(apply_env_overrides(raw))
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let database_url = raw
            .database_url
            .filter(|s| !s.trim().is_empty())
            .context("database_url must be set in config.json or DATABASE_URL")?;
        Url::parse(&database_url).context("database_url is not a valid URL")?;

        let backup_dir = raw
            .backup_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));
        if backup_dir.to_string_lossy().is_empty() {
            anyhow::bail!("backup_dir cannot be empty in config.json.");
        }

        let schedule_file = raw
            .schedule_file
            .unwrap_or_else(|| backup_dir.join(SCHEDULE_FILE_NAME));

        let audit_table = raw
            .audit_table
            .unwrap_or_else(|| DEFAULT_AUDIT_TABLE.to_string());
        let audit_timestamp_column = raw
            .audit_timestamp_column
            .unwrap_or_else(|| DEFAULT_AUDIT_TIMESTAMP_COLUMN.to_string());
        for ident in [&audit_table, &audit_timestamp_column] {
            if !is_sql_identifier(ident) {
                anyhow::bail!("'{}' is not a valid SQL identifier", ident);
            }
        }

        let audit_retention_days = raw
            .audit_retention_days
            .unwrap_or(DEFAULT_AUDIT_RETENTION_DAYS);
        if !(1..=MAX_AUDIT_RETENTION_DAYS).contains(&audit_retention_days) {
            anyhow::bail!(
                "audit_retention_days must be between 1 and {}, got {}",
                MAX_AUDIT_RETENTION_DAYS,
                audit_retention_days
            );
        }

        let admin_token = raw.admin_token.filter(|s| !s.trim().is_empty());
        if admin_token.is_none() {
            warn!("No admin_token configured; every admin request will be rejected");
        }

        Ok(AppConfig {
            database_url,
            backup_dir,
            listen_addr: raw
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            admin_token,
            schedule_file,
            audit_table,
            audit_timestamp_column,
            audit_retention_days,
            pg_dump_path: raw.pg_dump_path,
            psql_path: raw.psql_path,
        })
    }
}

fn apply_env_overrides(mut raw: RawJsonConfig) -> RawJsonConfig {
    if let Ok(url) = env::var("DATABASE_URL") {
        raw.database_url = Some(url);
    }
    if let Ok(token) = env::var("OPS_ADMIN_TOKEN") {
        raw.admin_token = Some(token);
    }
    if let Ok(addr) = env::var("OPS_LISTEN_ADDR") {
        raw.listen_addr = Some(addr);
    }
    if let Ok(dir) = env::var("OPS_BACKUP_DIR") {
        raw.backup_dir = Some(PathBuf::from(dir));
    }
    raw
}

fn is_sql_identifier(ident: &str) -> bool {
    SQL_IDENTIFIER.is_match(ident)
}

/// Strips the password from a connection URL so it can be logged.
pub fn redact_db_url(db_url: &str) -> String {
    match Url::parse(db_url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
