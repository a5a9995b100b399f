//! Recurring-query registration.

use std::sync::Arc;

use atlas_core::config::JobsConfig;
use tracing::{error, info};

use crate::status::StatusLine;
use crate::transport::{JobRequest, Transport};

/// Submits recurring queries and reports the outcome on the status line.
pub struct JobScheduler {
    transport: Arc<dyn Transport>,
    config: JobsConfig,
    status: StatusLine,
}

impl JobScheduler {
    pub fn new(transport: Arc<dyn Transport>, config: JobsConfig, status: StatusLine) -> Self {
        Self {
            transport,
            config,
            status,
        }
    }

    /// Register `query` to run every `interval` seconds.
    ///
    /// `interval` is the raw text from the input panel and is not validated.
    /// Returns `None` without sending anything when the query is blank,
    /// otherwise the status text that was shown.
    pub async fn schedule(&self, query: &str, interval: &str) -> Option<String> {
        if query.trim().is_empty() {
            return None;
        }

        let request = JobRequest {
            query: query.to_string(),
            interval_seconds: parse_interval(interval),
        };
        let text = match self.transport.schedule_job(request).await {
            Ok(ack) => {
                info!(status = %ack.status, "Job scheduled");
                format!("{}{}", self.config.success_prefix, ack.status)
            }
            Err(e) => {
                error!(error = %e, "Failed to schedule job");
                self.config.error_message.clone()
            }
        };
        self.status.set(text.clone());
        Some(text)
    }
}

/// Leading-integer parse: optional sign then digits, trailing text ignored.
/// Values beyond the `i64` range saturate rather than being dropped.
pub fn parse_interval(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let sign_len = usize::from(text.starts_with(['+', '-']));
    let digits = text[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(text.len(), |end| sign_len + end);
    if digits == sign_len {
        return None;
    }
    match text[..digits].parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) if text.starts_with('-') => Some(i64::MIN),
        Err(_) => Some(i64::MAX),
    }
}
