#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod notify;
pub mod sessions;

pub use assess_core::Clock;
pub use sessions as session;

pub use config::SessionConfig;
pub use error::{LoadError, SessionError};
pub use notify::{Notice, NotificationSink, TracingNotificationSink};

pub use sessions::{
    AdvanceOutcome, AssessmentLoopService, AssessmentSession, ExitChoice, ExitOutcome,
    SessionProgress, SessionStatus,
};
