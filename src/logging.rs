//! Tracing setup and an in-memory tail of recent log lines.
//!
//! Every event goes to stdout through the fmt layer and is also kept in a
//! bounded ring buffer, so one-shot commands can print what happened while
//! they ran.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn format(&self) -> String {
        format!(
            "{} {} [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.target,
            self.message
        )
    }
}

/// Most recent log entries, oldest dropped first
pub struct LogBuffer {
    recent: parking_lot::RwLock<VecDeque<LogEntry>>,
    max_entries: usize,
}

impl LogBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            recent: parking_lot::RwLock::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut recent = self.recent.write();
        if recent.len() >= self.max_entries {
            recent.pop_front();
        }
        recent.push_back(entry);
    }

    /// The last `count` entries, oldest first
    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        let recent = self.recent.read();
        let start = recent.len().saturating_sub(count);
        recent.iter().skip(start).cloned().collect()
    }
}

pub type SharedLogBuffer = Arc<LogBuffer>;

pub fn create_log_buffer(max_entries: usize) -> SharedLogBuffer {
    Arc::new(LogBuffer::new(max_entries))
}

/// Tracing layer that copies events into a [`LogBuffer`]
pub struct LogCaptureLayer {
    buffer: SharedLogBuffer,
}

impl LogCaptureLayer {
    pub fn new(buffer: SharedLogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.buffer.push(LogEntry {
            timestamp: chrono::Utc::now(),
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else if self.message.is_empty() {
            self.message = format!("{}={}", field.name(), value);
        }
    }
}

/// Install the global subscriber and return the capture buffer
pub fn init(level: tracing_subscriber::filter::LevelFilter, max_entries: usize) -> SharedLogBuffer {
    let buffer = create_log_buffer(max_entries);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(level)
        .with(LogCaptureLayer::new(buffer.clone()))
        .init();

    buffer
}
