use async_trait::async_trait;
use assess_core::model::{AttemptId, Question, TestId};
use assess_core::{FinalPayload, FlatAnswer, ProgressPayload};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Source of the question set for a test.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the ordered questions of a test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown test, or other storage errors.
    async fn fetch_questions(&self, test_id: TestId) -> Result<Vec<Question>, StorageError>;
}

/// Server-side attempt state: creation, prior answers, partial saves.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Open a new attempt for a test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown test, or other storage errors.
    async fn start_attempt(&self, test_id: TestId) -> Result<AttemptId, StorageError>;

    /// Answers saved for an attempt, or `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt,
    /// `StorageError::Conflict` if it was already submitted, or other storage errors.
    async fn fetch_prior_submission(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Option<Vec<FlatAnswer>>, StorageError>;

    /// Persist a partial answer set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt,
    /// `StorageError::Conflict` if the attempt was already submitted, or other
    /// storage errors.
    async fn save_progress(&self, payload: &ProgressPayload) -> Result<(), StorageError>;
}

/// Receiver of completed attempts.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Submit the final answers of an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt,
    /// `StorageError::Conflict` if it was already submitted, or other storage errors.
    async fn submit(&self, payload: &FinalPayload) -> Result<(), StorageError>;
}

/// Device-local record of which attempt to resume for a test.
#[async_trait]
pub trait ResumeTokenRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_token(&self, test_id: TestId) -> Result<Option<AttemptId>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be stored.
    async fn put_token(&self, test_id: TestId, attempt_id: AttemptId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be removed.
    async fn clear_token(&self, test_id: TestId) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct AttemptState {
    test_id: TestId,
    progress: u32,
    answers: Option<Vec<FlatAnswer>>,
    submitted: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    tests: HashMap<TestId, Vec<Question>>,
    attempts: HashMap<AttemptId, AttemptState>,
    submissions: Vec<FinalPayload>,
    tokens: HashMap<TestId, AttemptId>,
    next_attempt: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        f(&mut guard)
    }

    /// Register (or replace) the question set of a test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the internal lock is poisoned.
    pub fn put_questions(
        &self,
        test_id: TestId,
        questions: Vec<Question>,
    ) -> Result<(), StorageError> {
        self.with_state(|state| {
            state.tests.insert(test_id, questions);
            Ok(())
        })
    }

    /// Last saved progress marker (one-based) for an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt.
    pub fn saved_progress(&self, attempt_id: AttemptId) -> Result<u32, StorageError> {
        self.with_state(|state| {
            state
                .attempts
                .get(&attempt_id)
                .map(|attempt| attempt.progress)
                .ok_or(StorageError::NotFound)
        })
    }

    /// Every payload accepted by `submit`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the internal lock is poisoned.
    pub fn submissions(&self) -> Result<Vec<FinalPayload>, StorageError> {
        self.with_state(|state| Ok(state.submissions.clone()))
    }
}

#[async_trait]
impl QuestionSource for InMemoryRepository {
    async fn fetch_questions(&self, test_id: TestId) -> Result<Vec<Question>, StorageError> {
        self.with_state(|state| state.tests.get(&test_id).cloned().ok_or(StorageError::NotFound))
    }
}

#[async_trait]
impl ProgressStore for InMemoryRepository {
    async fn start_attempt(&self, test_id: TestId) -> Result<AttemptId, StorageError> {
        self.with_state(|state| {
            if !state.tests.contains_key(&test_id) {
                return Err(StorageError::NotFound);
            }
            state.next_attempt += 1;
            let id = AttemptId::new(state.next_attempt);
            state.attempts.insert(
                id,
                AttemptState {
                    test_id,
                    progress: 0,
                    answers: None,
                    submitted: false,
                },
            );
            Ok(id)
        })
    }

    async fn fetch_prior_submission(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Option<Vec<FlatAnswer>>, StorageError> {
        self.with_state(|state| {
            let attempt = state
                .attempts
                .get(&attempt_id)
                .ok_or(StorageError::NotFound)?;
            if attempt.submitted {
                return Err(StorageError::Conflict);
            }
            Ok(attempt.answers.clone())
        })
    }

    async fn save_progress(&self, payload: &ProgressPayload) -> Result<(), StorageError> {
        self.with_state(|state| {
            let attempt = state
                .attempts
                .get_mut(&payload.attempt_id)
                .ok_or(StorageError::NotFound)?;
            if attempt.submitted || attempt.test_id != payload.test_id {
                return Err(StorageError::Conflict);
            }
            attempt.progress = payload.progress;
            attempt.answers = Some(payload.answers.clone());
            Ok(())
        })
    }
}

#[async_trait]
impl SubmissionSink for InMemoryRepository {
    async fn submit(&self, payload: &FinalPayload) -> Result<(), StorageError> {
        self.with_state(|state| {
            let attempt = state
                .attempts
                .get_mut(&payload.attempt_id)
                .ok_or(StorageError::NotFound)?;
            if attempt.submitted {
                return Err(StorageError::Conflict);
            }
            attempt.submitted = true;
            attempt.answers = Some(payload.answers.clone());
            state.submissions.push(payload.clone());
            Ok(())
        })
    }
}

#[async_trait]
impl ResumeTokenRepository for InMemoryRepository {
    async fn get_token(&self, test_id: TestId) -> Result<Option<AttemptId>, StorageError> {
        self.with_state(|state| Ok(state.tokens.get(&test_id).copied()))
    }

    async fn put_token(&self, test_id: TestId, attempt_id: AttemptId) -> Result<(), StorageError> {
        self.with_state(|state| {
            state.tokens.insert(test_id, attempt_id);
            Ok(())
        })
    }

    async fn clear_token(&self, test_id: TestId) -> Result<(), StorageError> {
        self.with_state(|state| {
            state.tokens.remove(&test_id);
            Ok(())
        })
    }
}

/// Aggregates the collaborator contracts behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionSource>,
    pub progress: Arc<dyn ProgressStore>,
    pub submissions: Arc<dyn SubmissionSink>,
    pub resume_tokens: Arc<dyn ResumeTokenRepository>,
}

impl Storage {
    /// Share one repository value across every contract.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: QuestionSource
            + ProgressStore
            + SubmissionSink
            + ResumeTokenRepository
            + Clone
            + 'static,
    {
        Self {
            questions: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            submissions: Arc::new(repo.clone()),
            resume_tokens: Arc::new(repo),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }
}
