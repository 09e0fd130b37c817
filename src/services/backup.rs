//! Snapshot backups for SQLite deployments.
//!
//! Copies the live database file into a backup directory with timestamped
//! names, and supports verification, restore, age-based cleanup and summary
//! statistics. Only meaningful when the configured datastore is a local
//! SQLite file; every operation refuses cleanly otherwise.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// First 16 bytes of every SQLite database file.
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";
/// Smallest plausible database file (one page header).
const MIN_BACKUP_BYTES: u64 = 100;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BackupInfo {
    pub file_name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BackupStats {
    pub count: usize,
    pub total_bytes: u64,
    pub newest: Option<DateTime<Utc>>,
    pub oldest: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct BackupService {
    db_path: Option<PathBuf>,
    backup_dir: PathBuf,
}

impl BackupService {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            db_path: cfg.sqlite_path().map(PathBuf::from),
            backup_dir: PathBuf::from(&cfg.backup_dir),
        }
    }

    #[cfg(test)]
    fn with_paths(db_path: PathBuf, backup_dir: PathBuf) -> Self {
        Self {
            db_path: Some(db_path),
            backup_dir,
        }
    }

    fn live_db(&self) -> Result<&Path, ServiceError> {
        self.db_path.as_deref().ok_or_else(|| {
            ServiceError::InvalidOperation(
                "backups are only available for file-backed SQLite databases".into(),
            )
        })
    }

    /// Reject names that could escape the backup directory.
    fn backup_path(&self, file_name: &str) -> Result<PathBuf, ServiceError> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(ServiceError::ValidationError(
                "invalid backup file name".into(),
            ));
        }
        Ok(self.backup_dir.join(file_name))
    }

    fn io_err(context: &str, err: std::io::Error) -> ServiceError {
        error!(context, error = %err, "backup file operation failed");
        ServiceError::InternalError(format!("{context}: {err}"))
    }

    /// Snapshot the live database into the backup directory.
    #[instrument(skip(self))]
    pub fn create_backup(&self) -> Result<BackupInfo, ServiceError> {
        let db_path = self.live_db()?;
        if !db_path.exists() {
            return Err(ServiceError::InvalidOperation(
                "database file does not exist yet".into(),
            ));
        }

        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| Self::io_err("creating backup directory", e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut file_name = format!("rfq_backup_{stamp}.db");
        let mut counter = 1;
        while self.backup_dir.join(&file_name).exists() {
            file_name = format!("rfq_backup_{stamp}_{counter}.db");
            counter += 1;
        }
        let target = self.backup_dir.join(&file_name);

        fs::copy(db_path, &target).map_err(|e| Self::io_err("copying database file", e))?;
        self.verify_backup(&file_name)?;

        let meta = fs::metadata(&target).map_err(|e| Self::io_err("reading backup metadata", e))?;
        info!(file = %file_name, size = meta.len(), "backup created");

        Ok(BackupInfo {
            file_name,
            size_bytes: meta.len(),
            modified: meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// All backups in the directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, ServiceError> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let entries =
            fs::read_dir(&self.backup_dir).map_err(|e| Self::io_err("reading backup directory", e))?;

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::io_err("reading backup directory entry", e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".db") {
                continue;
            }
            let meta = entry
                .metadata()
                .map_err(|e| Self::io_err("reading backup metadata", e))?;
            backups.push(BackupInfo {
                file_name: name,
                size_bytes: meta.len(),
                modified: meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
            });
        }

        backups.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(backups)
    }

    /// Check that a backup looks like a usable SQLite file.
    pub fn verify_backup(&self, file_name: &str) -> Result<(), ServiceError> {
        let path = self.backup_path(file_name)?;
        let meta = fs::metadata(&path)
            .map_err(|_| ServiceError::NotFound(format!("backup {} not found", file_name)))?;

        if meta.len() < MIN_BACKUP_BYTES {
            return Err(ServiceError::InvalidOperation(format!(
                "backup {} is too small to be a database file",
                file_name
            )));
        }

        let mut header = [0u8; 16];
        let mut file = fs::File::open(&path).map_err(|e| Self::io_err("opening backup", e))?;
        file.read_exact(&mut header)
            .map_err(|e| Self::io_err("reading backup header", e))?;

        if &header != SQLITE_MAGIC {
            return Err(ServiceError::InvalidOperation(format!(
                "backup {} is not a SQLite database",
                file_name
            )));
        }

        Ok(())
    }

    /// Replace the live database with a verified backup.
    ///
    /// A safety copy of the current file is written next to the backups
    /// before anything is overwritten.
    #[instrument(skip(self))]
    pub fn restore_backup(&self, file_name: &str) -> Result<(), ServiceError> {
        let db_path = self.live_db()?.to_path_buf();
        self.verify_backup(file_name)?;
        let source = self.backup_path(file_name)?;

        if db_path.exists() {
            fs::create_dir_all(&self.backup_dir)
                .map_err(|e| Self::io_err("creating backup directory", e))?;
            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            let safety = self.backup_dir.join(format!("pre_restore_{stamp}.db"));
            fs::copy(&db_path, &safety)
                .map_err(|e| Self::io_err("writing pre-restore safety copy", e))?;
            info!(safety = %safety.display(), "pre-restore safety copy written");
        }

        fs::copy(&source, &db_path).map_err(|e| Self::io_err("restoring backup", e))?;
        warn!(file = file_name, "database restored from backup");
        Ok(())
    }

    /// Delete backups whose modification time is older than `keep_days`.
    /// Returns how many files were removed.
    #[instrument(skip(self))]
    pub fn cleanup_old_backups(&self, keep_days: i64) -> Result<usize, ServiceError> {
        let cutoff = Utc::now() - ChronoDuration::days(keep_days.max(0));
        let mut deleted = 0;

        for backup in self.list_backups()? {
            if backup.modified < cutoff {
                let path = self.backup_path(&backup.file_name)?;
                match fs::remove_file(&path) {
                    Ok(()) => {
                        info!(file = %backup.file_name, "old backup removed");
                        deleted += 1;
                    }
                    Err(e) => {
                        // Cleanup is advisory; keep going.
                        error!(file = %backup.file_name, error = %e, "failed to remove backup");
                    }
                }
            }
        }

        Ok(deleted)
    }

    /// Aggregate statistics over the backup directory.
    pub fn stats(&self) -> Result<BackupStats, ServiceError> {
        let backups = self.list_backups()?;
        Ok(BackupStats {
            count: backups.len(),
            total_bytes: backups.iter().map(|b| b.size_bytes).sum(),
            newest: backups.first().map(|b| b.modified),
            oldest: backups.last().map(|b| b.modified),
        })
    }
}
