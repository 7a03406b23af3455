// dietops/src/store/naming.rs
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::errors::{OpsError, Result};

static ARTIFACT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(backup|pre-restore-backup)-\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}-\d{3}Z\.sql$")
        .expect("artifact name pattern is valid")
});

// Last millisecond stamp handed out; shared by every store in the process.
static LAST_STAMP_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Distinguishes operator-requested snapshots from the ones Restore takes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactPrefix {
    Backup,
    PreRestore,
}

impl ArtifactPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactPrefix::Backup => "backup",
            ArtifactPrefix::PreRestore => "pre-restore-backup",
        }
    }
}

pub fn is_valid_artifact_name(name: &str) -> bool {
    ARTIFACT_NAME.is_match(name)
}

pub fn validate_artifact_name(name: &str) -> Result<()> {
    if is_valid_artifact_name(name) {
        Ok(())
    } else {
        Err(OpsError::Validation(format!(
            "'{}' is not a valid backup file name",
            name
        )))
    }
}

/// Returns a millisecond timestamp strictly greater than any previously returned one.
fn next_stamp_millis(last_issued: &AtomicI64, now_millis: i64) -> i64 {
    let mut last = last_issued.load(Ordering::Relaxed);
    loop {
        let candidate = now_millis.max(last + 1);
        match last_issued.compare_exchange_weak(
            last,
            candidate,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// `backup-2024-01-15T10-30-45-123Z.sql` style name, unique within the process.
pub fn generate_artifact_name(prefix: ArtifactPrefix) -> String {
    let millis = next_stamp_millis(&LAST_STAMP_MILLIS, Utc::now().timestamp_millis());
    let stamp = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(Utc::now);
    format!(
        "{}-{}.sql",
        prefix.as_str(),
        stamp.format("%Y-%m-%dT%H-%M-%S-%3fZ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_names_match_pattern() {
        for prefix in [ArtifactPrefix::Backup, ArtifactPrefix::PreRestore] {
            let name = generate_artifact_name(prefix);
            assert!(is_valid_artifact_name(&name), "{name} should be valid");
            assert!(name.starts_with(prefix.as_str()));
        }
    }

    #[test]
    fn test_generated_names_are_unique_and_increasing() {
        let names: Vec<String> = (0..500)
            .map(|_| generate_artifact_name(ArtifactPrefix::Backup))
            .collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, names);
    }

    #[test]
    fn test_generated_names_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..100)
                        .map(|_| generate_artifact_name(ArtifactPrefix::Backup))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(all.insert(name));
            }
        }
        assert_eq!(all.len(), 400);
    }

    #[test]
    fn test_rejects_crafted_names() {
        for name in [
            "",
            "backup.sql",
            "../etc/passwd",
            "backup-2024-01-15T10-30-45-123Z.sql/../../etc/passwd",
            "../backup-2024-01-15T10-30-45-123Z.sql",
            "backup-2024-01-15T10-30-45-123Z.sql.bak",
            "backup-2024-01-15T10:30:45.123Z.sql",
            "restore-2024-01-15T10-30-45-123Z.sql",
            "backup-2024-01-15T10-30-45-123Z.SQL",
            "backup-2024-01-15T10-30-45-123Z.sql\n",
        ] {
            assert!(!is_valid_artifact_name(name), "{name:?} should be rejected");
            assert!(matches!(
                validate_artifact_name(name),
                Err(OpsError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_accepts_well_formed_names() {
        assert!(is_valid_artifact_name("backup-2024-01-15T10-30-45-123Z.sql"));
        assert!(is_valid_artifact_name(
            "pre-restore-backup-2024-01-15T10-30-45-123Z.sql"
        ));
    }

    #[test]
    fn test_stamp_never_goes_backwards() {
        let last_issued = AtomicI64::new(0);
        let first = next_stamp_millis(&last_issued, 1_700_000_000_000);
        // clock stepped back
        let second = next_stamp_millis(&last_issued, 1_600_000_000_000);
        let third = next_stamp_millis(&last_issued, 1_700_000_000_000);
        assert_eq!(first, 1_700_000_000_000);
        assert_eq!(second, first + 1);
        assert_eq!(third, second + 1);
    }
}
