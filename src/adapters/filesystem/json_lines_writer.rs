//! Append-only JSON-lines analytics log.
//!
//! `analytics.jsonl` receives one `AnalyticsEvent` per line and
//! `feedback.jsonl` one `UserFeedback` per line.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::analytics::{AnalyticsEvent, UserFeedback};
use crate::domain::foundation::DomainError;
use crate::ports::AnalyticsWriter;

pub const ANALYTICS_FILE: &str = "analytics.jsonl";
pub const FEEDBACK_FILE: &str = "feedback.jsonl";

pub struct JsonLinesAnalyticsWriter {
    dir: PathBuf,
    // One writer at a time so lines never interleave.
    lock: Mutex<()>,
}

impl JsonLinesAnalyticsWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<(), DomainError> {
        let mut line = serde_json::to_string(record).map_err(|e| {
            DomainError::unavailable("analytics_log", format!("Failed to serialize record: {}", e))
        })?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            DomainError::unavailable("analytics_log", format!("Failed to create directory: {}", e))
        })?;

        let path = self.dir.join(file);
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                DomainError::unavailable("analytics_log", format!("Failed to open {}: {}", path.display(), e))
            })?;
        handle.write_all(line.as_bytes()).await.map_err(|e| {
            DomainError::unavailable("analytics_log", format!("Failed to append to {}: {}", path.display(), e))
        })?;
        handle
            .flush()
            .await
            .map_err(|e| DomainError::unavailable("analytics_log", format!("Failed to flush: {}", e)))
    }
}

#[async_trait]
impl AnalyticsWriter for JsonLinesAnalyticsWriter {
    async fn append_analytics_event(&self, event: &AnalyticsEvent) -> Result<(), DomainError> {
        self.append(ANALYTICS_FILE, event).await
    }

    async fn append_feedback(&self, feedback: &UserFeedback) -> Result<(), DomainError> {
        self.append(FEEDBACK_FILE, feedback).await
    }
}
