//! Progress reporting for provisioning phases.
//!
//! Status is purely observational: sinks never influence the outcome of a
//! run, and a slow or full sink never blocks provisioning.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info};

/// A phase transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Started {
        label: String,
        at: DateTime<Utc>,
    },
    Ended {
        label: String,
        success: bool,
        at: DateTime<Utc>,
    },
}

/// Receives phase start/end notifications.
pub trait StatusSink: Send + Sync {
    fn start(&self, label: &str);

    fn end(&self, label: &str, success: bool);
}

/// Logs phases through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn start(&self, label: &str) {
        info!(phase = %label, " • {label}");
    }

    fn end(&self, label: &str, success: bool) {
        if success {
            info!(phase = %label, " ✓ {label}");
        } else {
            error!(phase = %label, " ✗ {label}");
        }
    }
}

/// Discards all status.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatus;

impl StatusSink for NoopStatus {
    fn start(&self, _label: &str) {}

    fn end(&self, _label: &str, _success: bool) {}
}

/// Forwards status events into a channel. Events are dropped when the
/// channel is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    sender: mpsc::Sender<StatusEvent>,
}

impl ChannelStatus {
    pub fn new(sender: mpsc::Sender<StatusEvent>) -> Self {
        Self { sender }
    }
}

impl StatusSink for ChannelStatus {
    fn start(&self, label: &str) {
        let _ = self.sender.try_send(StatusEvent::Started {
            label: label.to_string(),
            at: Utc::now(),
        });
    }

    fn end(&self, label: &str, success: bool) {
        let _ = self.sender.try_send(StatusEvent::Ended {
            label: label.to_string(),
            success,
            at: Utc::now(),
        });
    }
}

/// An open phase. Dropping it without calling [`Phase::end`] reports failure.
pub struct Phase<'a> {
    sink: &'a dyn StatusSink,
    label: String,
    ended: bool,
}

impl<'a> Phase<'a> {
    pub fn start(sink: &'a dyn StatusSink, label: impl Into<String>) -> Self {
        let label = label.into();
        sink.start(&label);
        Self {
            sink,
            label,
            ended: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Finish the phase.
    pub fn end(mut self, success: bool) {
        self.finish(success);
    }

    fn finish(&mut self, success: bool) {
        if !self.ended {
            self.ended = true;
            self.sink.end(&self.label, success);
        }
    }
}

impl Drop for Phase<'_> {
    fn drop(&mut self) {
        self.finish(false);
    }
}
