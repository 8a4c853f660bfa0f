use std::sync::Arc;

use assess_core::model::{AttemptId, Question, QuestionSet, TestId};
use assess_core::{Advance, reconcile};
use storage::repository::{
    ProgressStore, QuestionSource, ResumeTokenRepository, Storage, StorageError, SubmissionSink,
};

use super::service::{AssessmentSession, SessionStatus};
use crate::Clock;
use crate::config::SessionConfig;
use crate::error::{LoadError, SessionError};
use crate::notify::{Notice, NotificationSink, TracingNotificationSink};

const SAVING: &str = "Saving progress";
const SAVED: &str = "Progress saved";
const SAVE_FAILED: &str = "Could not save progress";
const SUBMITTING: &str = "Submitting answers";
const SUBMITTED: &str = "Answers submitted";
const SUBMIT_FAILED: &str = "Could not submit answers";

/// How the user chose to leave an unfinished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitChoice {
    /// Leave without persisting anything.
    Discard,
    /// Persist progress first; stay if the save fails.
    SaveThenExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Discarded,
    Saved,
}

/// Result of a forward step driven through the loop service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Blocked,
    Moved(usize),
    Submitted,
}

/// Orchestrates session load, persistence, exit and submission.
#[derive(Clone)]
pub struct AssessmentLoopService {
    clock: Clock,
    config: SessionConfig,
    questions: Arc<dyn QuestionSource>,
    progress: Arc<dyn ProgressStore>,
    submissions: Arc<dyn SubmissionSink>,
    resume_tokens: Arc<dyn ResumeTokenRepository>,
    notifier: Arc<dyn NotificationSink>,
}

impl AssessmentLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionSource>,
        progress: Arc<dyn ProgressStore>,
        submissions: Arc<dyn SubmissionSink>,
        resume_tokens: Arc<dyn ResumeTokenRepository>,
    ) -> Self {
        Self {
            clock,
            config: SessionConfig::default(),
            questions,
            progress,
            submissions,
            resume_tokens,
            notifier: Arc::new(TracingNotificationSink),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.submissions),
            Arc::clone(&storage.resume_tokens),
        )
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    //
    // ─── LOAD ──────────────────────────────────────────────────────────────────
    //

    /// Open a session for `test_id`, resuming the locally tracked attempt if any.
    ///
    /// A tracked attempt the backend no longer knows, or one that was already
    /// submitted, is forgotten and a new one is started instead.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Load` when a fetch fails or the question set is
    /// invalid, and `SessionError::Empty` when the test has no questions.
    pub async fn start_session(&self, test_id: TestId) -> Result<AssessmentSession, SessionError> {
        let token = self
            .resume_tokens
            .get_token(test_id)
            .await
            .map_err(LoadError::ResumeToken)?;

        let Some(attempt_id) = token else {
            return self.start_fresh(test_id).await;
        };

        match self.resume_session(test_id, attempt_id).await {
            Err(SessionError::Load(LoadError::PriorSubmission(
                err @ (StorageError::NotFound | StorageError::Conflict),
            ))) => {
                tracing::warn!(
                    test_id = %test_id,
                    attempt_id = %attempt_id,
                    error = %err,
                    "tracked attempt can no longer be resumed; starting a new one"
                );
                self.forget_token(test_id).await;
                self.start_fresh(test_id).await
            }
            other => other,
        }
    }

    /// Resume a known attempt, rebuilding answers from its saved progress.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Load` when a fetch fails, the attempt was already
    /// submitted, or the question set is invalid, and `SessionError::Empty`
    /// when the test has no questions.
    pub async fn resume_session(
        &self,
        test_id: TestId,
        attempt_id: AttemptId,
    ) -> Result<AssessmentSession, SessionError> {
        let (questions, prior) = tokio::try_join!(
            async {
                self.questions
                    .fetch_questions(test_id)
                    .await
                    .map_err(LoadError::Questions)
            },
            async {
                self.progress
                    .fetch_prior_submission(attempt_id)
                    .await
                    .map_err(LoadError::PriorSubmission)
            },
        )?;

        let questions = question_set(test_id, questions)?;
        let reconciliation = reconcile(prior.as_deref().unwrap_or_default(), questions.questions());
        for mismatch in &reconciliation.mismatches {
            tracing::warn!(
                test_id = %test_id,
                attempt_id = %attempt_id,
                question_id = %mismatch.question_id,
                "saved answer does not match any loaded question; skipped"
            );
        }
        self.remember_token(test_id, attempt_id).await;

        tracing::debug!(
            test_id = %test_id,
            attempt_id = %attempt_id,
            position = reconciliation.position,
            answered = reconciliation.answers.len(),
            "resumed session"
        );
        Ok(AssessmentSession::resumed(
            questions,
            attempt_id,
            reconciliation,
            self.clock.now(),
        ))
    }

    async fn start_fresh(&self, test_id: TestId) -> Result<AssessmentSession, SessionError> {
        let (attempt_id, questions) = tokio::try_join!(
            async {
                self.progress
                    .start_attempt(test_id)
                    .await
                    .map_err(LoadError::StartAttempt)
            },
            async {
                self.questions
                    .fetch_questions(test_id)
                    .await
                    .map_err(LoadError::Questions)
            },
        )?;

        let questions = question_set(test_id, questions)?;
        self.remember_token(test_id, attempt_id).await;

        tracing::debug!(
            test_id = %test_id,
            attempt_id = %attempt_id,
            questions = questions.len(),
            "started session"
        );
        Ok(AssessmentSession::fresh(questions, attempt_id, self.clock.now()))
    }

    //
    // ─── PERSIST ───────────────────────────────────────────────────────────────
    //

    /// Save the answered positions and the current position.
    ///
    /// The session stays active whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` for an inactive session and
    /// `SessionError::Save` when the store rejects the payload.
    pub async fn save_progress(&self, session: &mut AssessmentSession) -> Result<(), SessionError> {
        session.ensure_active()?;
        let payload = session.progress_payload();

        self.notifier.notify(Notice::Loading {
            message: SAVING.into(),
        });
        match self.progress.save_progress(&payload).await {
            Ok(()) => {
                session.mark_saved(self.clock.now());
                self.notifier.notify(Notice::Success {
                    message: SAVED.into(),
                });
                tracing::debug!(
                    attempt_id = %payload.attempt_id,
                    progress = payload.progress,
                    "progress saved"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(attempt_id = %payload.attempt_id, error = %err, "save failed");
                self.notify_error(SAVE_FAILED);
                Err(SessionError::Save(err))
            }
        }
    }

    /// Leave the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` for an inactive session. With
    /// `ExitChoice::SaveThenExit`, a failed save returns `SessionError::Save`
    /// and the session stays open.
    pub async fn exit(
        &self,
        session: &mut AssessmentSession,
        choice: ExitChoice,
    ) -> Result<ExitOutcome, SessionError> {
        session.ensure_active()?;
        match choice {
            ExitChoice::Discard => {
                session.close(SessionStatus::Discarded);
                tracing::debug!(attempt_id = %session.attempt_id(), "session discarded");
                Ok(ExitOutcome::Discarded)
            }
            ExitChoice::SaveThenExit => {
                self.save_progress(session).await?;
                session.close(SessionStatus::Saved);
                Ok(ExitOutcome::Saved)
            }
        }
    }

    //
    // ─── SUBMIT ────────────────────────────────────────────────────────────────
    //

    /// Step forward, submitting when the last question is complete.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` for an inactive session, or the errors of
    /// `submit` when the step reaches submission.
    pub async fn advance(
        &self,
        session: &mut AssessmentSession,
    ) -> Result<AdvanceOutcome, SessionError> {
        match session.advance()? {
            Advance::Blocked => Ok(AdvanceOutcome::Blocked),
            Advance::Moved(position) => Ok(AdvanceOutcome::Moved(position)),
            Advance::Submit => {
                self.submit(session).await?;
                Ok(AdvanceOutcome::Submitted)
            }
        }
    }

    /// Submit the final answers and close the session.
    ///
    /// On success the resume token for the test is cleared.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submission` if any position is incomplete and
    /// `SessionError::Submit` if the sink rejects the payload; the session is
    /// left untouched in both cases.
    pub async fn submit(&self, session: &mut AssessmentSession) -> Result<(), SessionError> {
        session.ensure_active()?;
        let payload = session.final_payload()?;

        self.notifier.notify(Notice::Loading {
            message: SUBMITTING.into(),
        });
        if let Err(err) = self.submissions.submit(&payload).await {
            tracing::warn!(attempt_id = %payload.attempt_id, error = %err, "submit failed");
            self.notify_error(SUBMIT_FAILED);
            return Err(SessionError::Submit(err));
        }

        session.close(SessionStatus::Submitted);
        self.forget_token(session.test_id()).await;
        self.notifier.notify(Notice::Success {
            message: SUBMITTED.into(),
        });
        tracing::info!(
            test_id = %session.test_id(),
            attempt_id = %payload.attempt_id,
            answers = payload.answers.len(),
            "attempt submitted"
        );
        Ok(())
    }

    //
    // ─── HELPERS ───────────────────────────────────────────────────────────────
    //

    fn notify_error(&self, message: &str) {
        self.notifier.notify(Notice::Error {
            message: message.into(),
            dismiss_after: self.config.error_notice_ttl,
        });
    }

    async fn remember_token(&self, test_id: TestId, attempt_id: AttemptId) {
        if let Err(err) = self.resume_tokens.put_token(test_id, attempt_id).await {
            tracing::warn!(test_id = %test_id, error = %err, "failed to store resume token");
        }
    }

    async fn forget_token(&self, test_id: TestId) {
        if let Err(err) = self.resume_tokens.clear_token(test_id).await {
            tracing::warn!(test_id = %test_id, error = %err, "failed to clear resume token");
        }
    }
}

fn question_set(test_id: TestId, questions: Vec<Question>) -> Result<QuestionSet, SessionError> {
    if questions.is_empty() {
        return Err(SessionError::Empty);
    }
    QuestionSet::new(test_id, questions).map_err(|err| SessionError::Load(err.into()))
}
