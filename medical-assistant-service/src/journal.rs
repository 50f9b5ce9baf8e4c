use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::error;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Append-only UTF-8 text log.
///
/// Appends through one sink are serialized, and each record goes out in a
/// single write, so concurrent callers never interleave records.
#[derive(Clone)]
pub struct LogSink {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl LogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_path())
            .await?;
        file.write_all(record.as_bytes()).await?;
        file.flush().await
    }
}

/// Consultation transcript: one `"{timestamp} - [{session}] {entry}"` line per entry.
#[derive(Clone)]
pub struct ConsultationLog {
    sink: LogSink,
}

impl ConsultationLog {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }

    /// Transcript failures are logged and otherwise ignored; the dialog keeps going.
    pub async fn record(&self, session_id: &str, entry: &str) {
        let line = format!(
            "{} - [{}] {}\n",
            timestamp(),
            session_id,
            escape_line_breaks(entry)
        );
        if let Err(e) = self.sink.append(&line).await {
            error!(
                session_id = %session_id,
                path = %self.sink.path().display(),
                error = %e,
                "Failed to write consultation log"
            );
        }
    }
}

/// Analysis log: timestamp line, result body, 80 `=` characters.
#[derive(Clone)]
pub struct AnalysisLog {
    sink: LogSink,
}

impl AnalysisLog {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }

    pub async fn record(&self, body: &str) -> std::io::Result<()> {
        self.sink.append(&format_analysis_record(&timestamp(), body)).await
    }
}

/// One entry, one line: raw CR/LF in user input must not start a new transcript line.
fn escape_line_breaks(entry: &str) -> String {
    entry.replace('\r', "\\r").replace('\n', "\\n")
}

pub fn format_analysis_record(timestamp: &str, body: &str) -> String {
    format!("{}\n{}\n{}\n", timestamp, body, "=".repeat(80))
}
