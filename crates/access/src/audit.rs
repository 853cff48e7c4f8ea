//! Audit trail for permission changes
//!
//! Every grant and revoke that reached the store is appended here so an
//! administrator can answer "who was given what, and when".
//! Storage: ~/.local/share/docket/audit.log (JSON lines)

use crate::record::AccessFlags;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Kind of permission change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Grant,
    Revoke,
}

/// A single audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ChangeKind,
    pub user_id: String,
    pub module_key: String,
    pub scope_key: Option<String>,
    /// Flags written by a grant; absent for revokes
    pub flags: Option<AccessFlags>,
}

impl AuditEntry {
    pub fn grant(user_id: &str, module_key: &str, scope_key: Option<&str>, flags: AccessFlags) -> Self {
        Self::new(ChangeKind::Grant, user_id, module_key, scope_key, Some(flags))
    }

    pub fn revoke(user_id: &str, module_key: &str, scope_key: Option<&str>) -> Self {
        Self::new(ChangeKind::Revoke, user_id, module_key, scope_key, None)
    }

    fn new(
        kind: ChangeKind,
        user_id: &str,
        module_key: &str,
        scope_key: Option<&str>,
        flags: Option<AccessFlags>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            user_id: user_id.to_string(),
            module_key: module_key.to_string(),
            scope_key: scope_key.map(str::to_string),
            flags,
        }
    }
}

/// Audit log manager
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    pub fn with_path(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Append an entry to the log
    pub fn log(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open audit log at {:?}", self.log_path))?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Append an entry; a failed append is logged, never returned
    pub fn record(&self, entry: &AuditEntry) {
        if let Err(e) = self.log(entry) {
            warn!(error = %e, path = %self.log_path.display(), "failed to write audit entry");
        }
    }

    /// Query recent entries
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.query(AuditQuery::default().limit(limit))
    }

    /// Query with custom filter, most recent first
    pub fn query(&self, query: AuditQuery) -> Result<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .with_context(|| format!("Failed to open audit log at {:?}", self.log_path))?;
        let reader = BufReader::new(file);

        let mut entries: Vec<AuditEntry> = reader
            .lines()
            .filter_map(|line| line.ok().and_then(|l| serde_json::from_str(&l).ok()))
            .filter(|entry: &AuditEntry| query.matches(entry))
            .collect();

        // Later appends first among equal timestamps (sort is stable)
        entries.reverse();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }

        Ok(entries)
    }
}

/// Query parameters for audit log
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    user_id: Option<String>,
    module_key: Option<String>,
    kind: Option<ChangeKind>,
    since: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

impl AuditQuery {
    /// Filter by user
    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Filter by module
    pub fn module(mut self, module_key: &str) -> Self {
        self.module_key = Some(module_key.to_string());
        self
    }

    /// Filter by change kind
    pub fn kind(mut self, kind: ChangeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter by time
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Limit results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref user_id) = self.user_id {
            if entry.user_id != *user_id {
                return false;
            }
        }

        if let Some(ref module_key) = self.module_key {
            if entry.module_key != *module_key {
                return false;
            }
        }

        if let Some(kind) = self.kind {
            if entry.kind != kind {
                return false;
            }
        }

        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_audit_log() {
        let dir = tempdir().unwrap();
        let log = AuditLog::with_path(dir.path().join("audit.log"));

        log.log(&AuditEntry::grant("3", "bail", Some("1"), AccessFlags::FULL))
            .unwrap();

        let entries = log.recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::Grant);
        assert_eq!(entries[0].scope_key.as_deref(), Some("1"));
        assert_eq!(entries[0].flags, Some(AccessFlags::FULL));
    }

    #[test]
    fn test_audit_query() {
        let dir = tempdir().unwrap();
        let log = AuditLog::with_path(dir.path().join("audit.log"));

        for i in 0..5 {
            let user = format!("u{}", i % 2);
            let entry = if i % 2 == 0 {
                AuditEntry::grant(&user, "psi", None, AccessFlags::view_only())
            } else {
                AuditEntry::revoke(&user, "social", None)
            };
            log.log(&entry).unwrap();
        }

        assert_eq!(log.query(AuditQuery::default().user("u0")).unwrap().len(), 3);
        assert_eq!(
            log.query(AuditQuery::default().kind(ChangeKind::Revoke))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(log.query(AuditQuery::default().module("psi")).unwrap().len(), 3);
        assert_eq!(log.recent(2).unwrap().len(), 2);

        let future = Utc::now() + Duration::hours(1);
        assert!(log.query(AuditQuery::default().since(future)).unwrap().is_empty());
    }

    #[test]
    fn test_most_recent_first() {
        let dir = tempdir().unwrap();
        let log = AuditLog::with_path(dir.path().join("audit.log"));

        log.log(&AuditEntry::grant("1", "psi", None, AccessFlags::FULL)).unwrap();
        log.log(&AuditEntry::revoke("1", "psi", None)).unwrap();

        let entries = log.recent(10).unwrap();
        assert_eq!(entries[0].kind, ChangeKind::Revoke);
        assert_eq!(entries[1].kind, ChangeKind::Grant);
    }

    #[test]
    fn test_record_swallows_errors() {
        let dir = tempdir().unwrap();
        // A directory where the log file should be makes the append fail
        let log_path = dir.path().join("audit.log");
        std::fs::create_dir(&log_path).unwrap();

        let log = AuditLog::with_path(log_path);
        log.record(&AuditEntry::revoke("1", "psi", None));
        assert!(log.log(&AuditEntry::revoke("1", "psi", None)).is_err());
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempdir().unwrap();
        let log = AuditLog::with_path(dir.path().join("none.log"));
        assert!(log.recent(5).unwrap().is_empty());
    }
}
