//! Retry diagnostics rendered from a message template.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::delay::millis;
use crate::record::{RetryEvent, RetryObserver, RetryRecord};

pub const DEFAULT_TEMPLATE: &str = "[{ts}] {method} {url} - {code} {phrase} - Retries: {retries}, Delay: {delay}, \
                                    Time: {connect_time}, {total_time}, Error: {error_code} {error}";

/// Destination of rendered retry messages.
pub trait LogSink: Send + Sync {
    fn log(&self, event: RetryEvent, message: &str, record: &RetryRecord);
}

/// Emits each record as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, event: RetryEvent, message: &str, record: &RetryRecord) {
        match event {
            RetryEvent::Retry => info!(
                target: "hitch::retry",
                method = %record.method,
                url = %record.url,
                retries = record.retries,
                delay_ms = millis(record.delay),
                status = record.status,
                "{message}"
            ),
            RetryEvent::TransportFailure => warn!(
                target: "hitch::retry",
                method = %record.method,
                url = %record.url,
                error_code = record.error_code,
                error = record.error.as_deref(),
                "{message}"
            ),
        }
    }
}

/// Observer turning retry records into log lines.
pub struct BackoffLogger {
    template: String,
    sink:     Arc<dyn LogSink>,
}

impl BackoffLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            sink,
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn render(&self, record: &RetryRecord) -> String { render(&self.template, record) }
}

impl Default for BackoffLogger {
    fn default() -> Self { Self::new(Arc::new(TracingSink)) }
}

impl RetryObserver for BackoffLogger {
    fn on_retry(&self, record: &RetryRecord) { self.sink.log(RetryEvent::Retry, &self.render(record), record); }

    fn on_transport_failure(&self, record: &RetryRecord) {
        self.sink
            .log(RetryEvent::TransportFailure, &self.render(record), record);
    }
}

/// Replaces `{placeholder}`s in `template`. Unknown placeholders are kept
/// verbatim, missing values render empty.
pub fn render(template: &str, record: &RetryRecord) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        let name = &tail[1..end];
        match value(name, record) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

fn seconds(duration: Option<Duration>) -> String { duration.map(|d| format!("{:.4}", d.as_secs_f64())).unwrap_or_default() }

fn value(name: &str, record: &RetryRecord) -> Option<String> {
    let value = match name {
        "ts" => record.ts.to_rfc3339(),
        "method" => record.method.clone(),
        "url" => record.url.clone(),
        "code" => record.status.map(|s| s.to_string()).unwrap_or_default(),
        "phrase" => record.phrase.clone().unwrap_or_default(),
        "retries" => record.retries.to_string(),
        "delay" => format!("{}", record.delay.as_secs_f64()),
        "error_code" => record.error_code.map(|c| c.to_string()).unwrap_or_default(),
        "error" => record.error.clone().unwrap_or_default(),
        "connect_time" => seconds(record.connect_time),
        "total_time" => seconds(record.total_time),
        _ => {
            let header = name.strip_prefix("header_")?;
            record.header(header).unwrap_or_default().to_string()
        },
    };
    Some(value)
}
