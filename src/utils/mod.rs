use std::path::PathBuf;
use which::which;

use crate::errors::{OpsError, Result};

/// Resolves an external executable, preferring an explicitly configured path over `PATH`.
pub fn find_executable(name: &str, configured: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.clone());
    }
    which(name).map_err(|e| {
        OpsError::Config(format!(
            "{} executable not found in PATH ({}). Please ensure PostgreSQL client tools are installed and in your PATH.",
            name, e
        ))
    })
}

/// Renders a byte count with 1024-based units and two decimals.
///
/// Zero renders as `"0 MB"`; the admin client has always displayed empty sizes that way.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 MB".to_string();
    }

    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, UNITS[unit])
}
