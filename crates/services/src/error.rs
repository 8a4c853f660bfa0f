//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::model::{AnswerError, QuestionError};
use assess_core::{AnswerStoreError, SubmissionError};
use storage::repository::StorageError;

/// Failures while loading a session. Always fatal for the session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("failed to fetch questions: {0}")]
    Questions(#[source] StorageError),
    #[error("failed to fetch prior answers: {0}")]
    PriorSubmission(#[source] StorageError),
    #[error("failed to start attempt: {0}")]
    StartAttempt(#[source] StorageError),
    #[error("failed to read resume token: {0}")]
    ResumeToken(#[source] StorageError),
    #[error(transparent)]
    InvalidQuestions(#[from] QuestionError),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to save progress: {0}")]
    Save(#[source] StorageError),
    #[error("failed to submit answers: {0}")]
    Submit(#[source] StorageError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Store(#[from] AnswerStoreError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("session is no longer active")]
    Closed,
    #[error("test has no questions")]
    Empty,
}

impl SessionError {
    /// The session cannot be used; the caller should leave the flow.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Load(_) | Self::Empty)
    }

    /// The session is intact and the same operation may be retried or corrected.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Save(_) | Self::Submit(_) | Self::Answer(_) | Self::Store(_) | Self::Submission(_)
        )
    }
}
