use chrono::{DateTime, Utc};
use std::fmt;

use assess_core::model::{AnswerInput, AnswerRecord, AttemptId, Question, QuestionSet, TestId};
use assess_core::submission::{final_payload, progress_payload};
use assess_core::{
    Advance, AnswerStore, FinalPayload, Navigator, ProgressBar, ProgressPayload, Reconciliation,
};

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    /// Left after a successful save; the attempt can be resumed.
    Saved,
    Submitted,
    Discarded,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of one attempt at a test.
///
/// Owns the loaded questions, the answers keyed by position and the navigation
/// cursor. Every mutation requires `&mut self`, and all of them fail with
/// `SessionError::Closed` once the session has left the `Active` status.
pub struct AssessmentSession {
    attempt_id: AttemptId,
    questions: QuestionSet,
    answers: AnswerStore,
    navigator: Navigator,
    started_at: DateTime<Utc>,
    last_saved_at: Option<DateTime<Utc>>,
    resumed: bool,
    status: SessionStatus,
}

impl AssessmentSession {
    /// Session for a brand-new attempt, positioned on the first question.
    #[must_use]
    pub fn fresh(questions: QuestionSet, attempt_id: AttemptId, started_at: DateTime<Utc>) -> Self {
        let len = questions.len();
        Self {
            attempt_id,
            answers: AnswerStore::new(len),
            navigator: Navigator::new(len),
            questions,
            started_at,
            last_saved_at: None,
            resumed: false,
            status: SessionStatus::Active,
        }
    }

    /// Session continuing a saved attempt from its reconciled answers.
    #[must_use]
    pub fn resumed(
        questions: QuestionSet,
        attempt_id: AttemptId,
        reconciliation: Reconciliation,
        started_at: DateTime<Utc>,
    ) -> Self {
        let len = questions.len();
        Self {
            attempt_id,
            answers: reconciliation.answers,
            navigator: Navigator::resume_at(len, reconciliation.position),
            questions,
            started_at,
            last_saved_at: None,
            resumed: true,
            status: SessionStatus::Active,
        }
    }

    #[must_use]
    pub fn test_id(&self) -> TestId {
        self.questions.test_id()
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        self.questions.questions()
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.navigator.position()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.navigator.position())
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        self.answers.get(self.navigator.position())
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// True when the session was rebuilt from previously saved answers.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.navigator.is_last()
    }

    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.is_active() && self.navigator.can_advance(&self.answers, self.questions())
    }

    #[must_use]
    pub fn can_retreat(&self) -> bool {
        self.is_active() && self.navigator.can_retreat()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self.answers.complete_count(self.questions());
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            position: self.position(),
            is_complete: self.answers.is_fully_complete(self.questions()),
        }
    }

    #[must_use]
    pub fn progress_bar(&self) -> ProgressBar {
        self.navigator.progress_bar()
    }

    /// Apply an answer event to the current question, returning the replaced record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` for an inactive session, `SessionError::Answer`
    /// when the input does not fit the question, and `SessionError::Empty` when
    /// there is no current question.
    pub fn answer(&mut self, input: AnswerInput) -> Result<Option<AnswerRecord>, SessionError> {
        self.ensure_active()?;
        let position = self.navigator.position();
        let question = self.questions.get(position).ok_or(SessionError::Empty)?;
        let record = AnswerRecord::from_input(question, self.answers.get(position), input)?;
        Ok(self.answers.set(self.questions.questions(), position, record)?)
    }

    /// Step forward when the current answer is complete.
    ///
    /// `Advance::Submit` only reports that the last question is done; submission
    /// itself goes through the loop service.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` for an inactive session.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        self.ensure_active()?;
        Ok(self.navigator.advance(&self.answers, self.questions.questions()))
    }

    /// # Errors
    ///
    /// Returns `SessionError::Closed` for an inactive session.
    pub fn retreat(&mut self) -> Result<bool, SessionError> {
        self.ensure_active()?;
        Ok(self.navigator.retreat())
    }

    /// Move toward `target`; forward moves stop at the first incomplete answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` for an inactive session.
    pub fn jump_to(&mut self, target: usize) -> Result<usize, SessionError> {
        self.ensure_active()?;
        Ok(self
            .navigator
            .jump_to(target, &self.answers, self.questions.questions()))
    }

    #[must_use]
    pub fn progress_payload(&self) -> ProgressPayload {
        progress_payload(
            self.test_id(),
            self.attempt_id,
            self.navigator.position(),
            self.questions.questions(),
            &self.answers,
        )
    }

    /// # Errors
    ///
    /// Returns `SessionError::Submission` naming the first incomplete position.
    pub fn final_payload(&self) -> Result<FinalPayload, SessionError> {
        Ok(final_payload(
            self.attempt_id,
            self.questions.questions(),
            &self.answers,
        )?)
    }

    pub(crate) fn ensure_active(&self) -> Result<(), SessionError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    pub(crate) fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.last_saved_at = Some(at);
    }

    pub(crate) fn close(&mut self, status: SessionStatus) {
        self.status = status;
    }
}

impl fmt::Debug for AssessmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentSession")
            .field("test_id", &self.test_id())
            .field("attempt_id", &self.attempt_id)
            .field("questions", &self.questions.len())
            .field("answered", &self.answers.len())
            .field("position", &self.navigator.position())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
