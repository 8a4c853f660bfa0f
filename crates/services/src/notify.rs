//! Transient user-facing notices (loading, success, error toasts).

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Shown until replaced by the next notice.
    Loading { message: String },
    Success { message: String },
    Error {
        message: String,
        dismiss_after: Duration,
    },
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Loading { message } | Self::Success { message } | Self::Error { message, .. } => {
                message
            }
        }
    }
}

/// Fire-and-forget receiver of notices.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Loading { message } => tracing::debug!(%message, "notice"),
            Notice::Success { message } => tracing::info!(%message, "notice"),
            Notice::Error {
                message,
                dismiss_after,
            } => tracing::warn!(
                %message,
                dismiss_after_ms = u64::try_from(dismiss_after.as_millis()).unwrap_or(u64::MAX),
                "notice"
            ),
        }
    }
}
