//! Directory of immutable backup artifacts.

pub(crate) mod naming;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::errors::{OpsError, Result};

pub use naming::{ArtifactPrefix, generate_artifact_name, is_valid_artifact_name, validate_artifact_name};

/// Metadata of one stored snapshot, read from the filesystem at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupArtifact {
    #[serde(rename = "filename")]
    pub name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            OpsError::storage(
                format!("Failed to create backup directory {}", self.dir.display()),
                e,
            )
        })
    }

    /// Reserves a fresh artifact name and returns it with its full path. Nothing is created on disk.
    pub fn allocate(&self, prefix: ArtifactPrefix) -> (String, PathBuf) {
        let name = generate_artifact_name(prefix);
        let path = self.dir.join(&name);
        (name, path)
    }

    /// All artifacts, newest first. An unreadable directory yields an empty list.
    pub async fn list(&self) -> Vec<BackupArtifact> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), "Cannot read backup directory, listing nothing: {}", e);
                return Vec::new();
            }
        };

        let mut artifacts = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), "Error while reading backup directory: {}", e);
                    break;
                }
            };

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !is_valid_artifact_name(&name) {
                continue;
            }

            match entry.metadata().await {
                Ok(meta) if meta.is_file() => artifacts.push(artifact_from_metadata(name, &meta)),
                Ok(_) => {}
                Err(e) => debug!(artifact = %name, "Skipping artifact without metadata: {}", e),
            }
        }

        artifacts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        artifacts
    }

    /// Metadata of a single artifact.
    pub async fn stat(&self, name: &str) -> Result<BackupArtifact> {
        let path = self.resolve(name)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(artifact_from_metadata(name.to_string(), &meta)),
            Ok(_) => Err(OpsError::NotFound(format!("backup file {}", name))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OpsError::NotFound(format!("backup file {}", name)))
            }
            Err(e) => Err(OpsError::storage(format!("Failed to stat {}", name), e)),
        }
    }

    /// Path of an existing artifact.
    pub async fn existing_path(&self, name: &str) -> Result<PathBuf> {
        self.stat(name).await?;
        self.resolve(name)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.existing_path(name).await?;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpsError::NotFound(format!("backup file {}", name))
            } else {
                OpsError::storage(format!("Failed to delete {}", name), e)
            }
        })?;
        info!(artifact = %name, "Backup deleted");
        Ok(())
    }

    /// Opens the artifact for streaming; returns the handle together with its length.
    pub async fn open(&self, name: &str) -> Result<(fs::File, u64)> {
        let artifact = self.stat(name).await?;
        let path = self.resolve(name)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpsError::NotFound(format!("backup file {}", name))
            } else {
                OpsError::storage(format!("Failed to open {}", name), e)
            }
        })?;
        Ok((file, artifact.size_bytes))
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_artifact_name(name)?;
        Ok(self.dir.join(name))
    }
}

fn artifact_from_metadata(name: String, meta: &std::fs::Metadata) -> BackupArtifact {
    let created = meta
        .created()
        .or_else(|_| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();
    BackupArtifact {
        name,
        size_bytes: meta.len(),
        created_at: created,
    }
}
