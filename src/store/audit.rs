//! Append-only audit trail for authentication attempts and privileged reads.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub action: String,
    pub ip: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: &str, ip: &str, success: bool, reason: Option<&str>) -> Self {
        Self {
            action: action.to_string(),
            ip: ip.to_string(),
            success,
            reason: reason.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// Write-only audit sink. `record` must not block the caller or fail it.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Emits entries on the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            action = %entry.action,
            ip = %entry.ip,
            success = entry.success,
            reason = entry.reason.as_deref().unwrap_or(""),
            timestamp = %entry.timestamp,
            "audit"
        );
    }
}

/// Appends entries as JSON lines from a background task.
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    tx: mpsc::UnboundedSender<AuditEntry>,
}

impl FileAuditSink {
    /// Spawn the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEntry>();
        tokio::spawn(async move {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(f) => f,
                Err(e) => {
                    tracing::error!(path = ?path, error = %e, "Failed to open audit log; entries will be dropped");
                    return;
                }
            };
            while let Some(entry) = rx.recv().await {
                let Ok(mut line) = serde_json::to_vec(&entry) else {
                    continue;
                };
                line.push(b'\n');
                let written = match file.write_all(&line).await {
                    Ok(()) => file.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::error!(path = ?path, error = %e, "Failed to append audit entry");
                }
            }
        });
        Self { tx }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, entry: AuditEntry) {
        // Writer gone means entries are dropped; the request proceeds regardless.
        let _ = self.tx.send(entry);
    }
}

/// Keeps entries in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
