//! Appends `terminal_input` audit records for every client→upstream frame.
//! Upstream→client frames are never audited: they're binary and verbose,
//! and the sandbox itself is not a trusted source of truth.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    event: &'static str,
    project_id: &'a str,
    user_id: &'a str,
    timestamp: i64,
    content: &'a str,
}

/// Owns the non-blocking writer and its background flush thread. Kept
/// alive for the whole process lifetime; dropping it stops the writer.
pub struct AuditLog {
    writer: tracing_appender::non_blocking::NonBlocking,
    _guard: WorkerGuard,
}

impl AuditLog {
    pub fn open(directory: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(directory)
            .map_err(|e| anyhow::anyhow!("creating audit directory {}: {e}", directory.display()))?;

        let appender = rolling::daily(directory, "terminal-input.jsonl");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        Ok(Self { writer, _guard: guard })
    }

    /// Records one input frame. Best-effort: a write failure is logged,
    /// never propagated into the proxy loop.
    pub fn record_input(&self, project_id: &str, user_id: &str, content: &str) {
        let record = AuditRecord {
            event: "terminal_input",
            project_id,
            user_id,
            timestamp: Utc::now().timestamp(),
            content,
        };

        match serde_json::to_vec(&record) {
            Ok(mut line) => {
                line.push(b'\n');
                use std::io::Write;
                let mut writer = self.writer.clone();
                if let Err(e) = writer.write_all(&line) {
                    tracing::warn!(error = %e, "failed to write audit record");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize audit record"),
        }
    }
}
