//! Append-only audit sink.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::AuditRecord;
use crate::Result;

/// Shared append-only audit log.
///
/// Each record is written with a single `write_all` under a lock, so lines
/// from concurrent commands never interleave. When disabled, `record` does
/// nothing.
pub struct AuditLog {
    sink: Option<Mutex<Box<dyn Write + Send>>>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Open (or create) the audit file at `path` in append mode.
    ///
    /// Parent directories are created if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            sink: Some(Mutex::new(Box::new(file))),
            path: Some(path.to_path_buf()),
        })
    }

    /// Write records to an arbitrary writer.
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Mutex::new(Box::new(writer))),
            path: None,
        }
    }

    /// A log that drops every record.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            path: None,
        }
    }

    /// Open the configured file, or a disabled log.
    pub fn from_settings(enabled: bool, path: impl AsRef<Path>) -> Result<Self> {
        if enabled {
            Self::open(path)
        } else {
            Ok(Self::disabled())
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Destination file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record.
    ///
    /// Write failures are reported through tracing and never reach the
    /// command path.
    pub fn record(&self, record: AuditRecord) {
        let Some(sink) = &self.sink else {
            return;
        };

        let mut line = record.to_line();
        tracing::debug!(target: "audit", kind = ?record.kind, "{}", record.payload);
        line.push('\n');

        let mut writer = sink.lock();
        if let Err(err) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            tracing::error!(%err, "failed to write audit record");
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("enabled", &self.is_enabled())
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::open(&path).unwrap();

        log.record(AuditRecord::connect("root@router:22"));
        log.record(AuditRecord::command("uptime", true, Duration::ZERO, Some("up"), None));

        let content = read(&path);
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("SSH CONNECT | root@router:22"));
        assert!(lines[1].contains("COMMAND: uptime"));
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");

        AuditLog::open(&path).unwrap().record(AuditRecord::disconnect("first"));
        AuditLog::open(&path).unwrap().record(AuditRecord::disconnect("second"));

        assert_eq!(read(&path).lines().count(), 2);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/audit.log");
        let log = AuditLog::open(&path).unwrap();
        assert_eq!(log.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_disabled_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::from_settings(false, &path).unwrap();

        log.record(AuditRecord::connect("root@router:22"));

        assert!(!log.is_enabled());
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_records_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = Arc::new(AuditLog::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let output = format!("thread-{t}-{i}-{}", "x".repeat(150));
                        log.record(AuditRecord::command("ps", true, Duration::ZERO, Some(&output), None));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = read(&path);
        assert_eq!(content.lines().count(), 400);
        for line in content.lines() {
            assert_eq!(line.matches("COMMAND: ps").count(), 1, "interleaved: {line}");
        }
    }
}
