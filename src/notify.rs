//! Best-effort notification sink for human-readable run events.
//!
//! The archive core reports collisions, failures, and completions through a
//! [`Notifier`]. Delivery is fire-and-forget: implementations must not block
//! and have no way to report failure back to the caller.

use std::fmt;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{error, info, trace, warn};

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// One free-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

/// Destination for notifications.
pub trait Notifier: Send + Sync {
    /// Hands a notification to the sink. Must return promptly.
    fn notify(&self, notification: Notification);

    fn info(&self, message: String) {
        self.notify(Notification {
            severity: Severity::Info,
            message,
        });
    }

    fn warn(&self, message: String) {
        self.notify(Notification {
            severity: Severity::Warning,
            message,
        });
    }

    fn error(&self, message: String) {
        self.notify(Notification {
            severity: Severity::Error,
            message,
        });
    }
}

/// Writes notifications to the tracing subscriber under the `notify` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let Notification { severity, message } = notification;
        match severity {
            Severity::Info => info!(target: "notify", "{message}"),
            Severity::Warning => warn!(target: "notify", "{message}"),
            Severity::Error => error!(target: "notify", "{message}"),
        }
    }
}

/// Forwards notifications over an unbounded channel.
///
/// Sending never waits. If the receiving side has been dropped the
/// notification is discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver that drains it.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(dropped) = self.sender.send(notification) {
            trace!(
                severity = %dropped.0.severity,
                "notification receiver gone, discarding"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::channel();

        notifier.info("started".to_string());
        notifier.warn("renamed".to_string());
        notifier.error("failed".to_string());

        assert_eq!(rx.try_recv().unwrap().severity, Severity::Info);
        let warning = rx.try_recv().unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.message, "renamed");
        assert_eq!(rx.try_recv().unwrap().severity, Severity::Error);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);

        // Must not panic or block
        notifier.error("nobody listening".to_string());
    }

    #[test]
    fn test_arc_dyn_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        let shared: Arc<dyn Notifier> = Arc::new(notifier);

        shared.warn("via arc".to_string());

        assert_eq!(rx.try_recv().unwrap().message, "via arc");
    }

    #[test]
    fn test_log_notifier_accepts_all_severities() {
        let notifier = LogNotifier;
        notifier.info("i".to_string());
        notifier.warn("w".to_string());
        notifier.error("e".to_string());
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Info.to_string(), "info");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Error.to_string(), "error");
    }
}
