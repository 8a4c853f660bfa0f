//! Domain model for assessment sessions: questions, answers, completion rules,
//! resume reconciliation, navigation, and submission payloads.
#![forbid(unsafe_code)]

pub mod answer_store;
pub mod model;
pub mod navigation;
pub mod resume;
pub mod submission;
pub mod time;

pub use answer_store::{AnswerStore, AnswerStoreError};
pub use navigation::{Advance, Navigator, ProgressBar};
pub use resume::{Reconciliation, ResumeMismatch, reconcile};
pub use submission::{FinalPayload, FlatAnswer, ProgressPayload, SubmissionError};
pub use time::Clock;
