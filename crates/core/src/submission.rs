//! Wire payloads for save-progress and final submission.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answer_store::{AnswerStore, is_record_complete};
use crate::model::{AnswerRecord, AttemptId, Question, QuestionId, TestId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("question at position {position} is not complete")]
    Incomplete { position: usize },
}

/// One answer as the backend stores it.
///
/// Numeric answers (slider, percentage) list every option id of the question in
/// `option_ids` and carry the actual answer in `score`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatAnswer {
    pub question_id: QuestionId,
    #[serde(default)]
    pub option_ids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Vec<u64>>,
}

impl FlatAnswer {
    #[must_use]
    pub fn from_record(question: &Question, record: &AnswerRecord) -> Self {
        if question.question_type.carries_score() {
            Self {
                question_id: record.question_id,
                option_ids: question.option_ids().map(|id| id.value()).collect(),
                score: Some(record.values.clone()),
            }
        } else {
            Self {
                question_id: record.question_id,
                option_ids: record.values.clone(),
                score: None,
            }
        }
    }
}

/// Partial save: only answered positions are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(rename = "user_test_id")]
    pub attempt_id: AttemptId,
    pub test_id: TestId,
    /// One-based index of the question the user is on.
    pub progress: u32,
    pub answers: Vec<FlatAnswer>,
}

/// Final submission: every position, all complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalPayload {
    #[serde(rename = "user_test_id")]
    pub attempt_id: AttemptId,
    pub answers: Vec<FlatAnswer>,
}

/// Build the save-progress payload for the answered positions.
#[must_use]
pub fn progress_payload(
    test_id: TestId,
    attempt_id: AttemptId,
    position: usize,
    questions: &[Question],
    store: &AnswerStore,
) -> ProgressPayload {
    let answers = store
        .iter()
        .filter_map(|(pos, record)| {
            questions
                .get(pos)
                .map(|question| FlatAnswer::from_record(question, record))
        })
        .collect();

    ProgressPayload {
        attempt_id,
        test_id,
        progress: u32::try_from(position.saturating_add(1)).unwrap_or(u32::MAX),
        answers,
    }
}

/// Build the final payload, covering every position in order.
///
/// # Errors
///
/// Returns `SubmissionError::Incomplete` with the first position whose answer
/// is missing or incomplete.
pub fn final_payload(
    attempt_id: AttemptId,
    questions: &[Question],
    store: &AnswerStore,
) -> Result<FinalPayload, SubmissionError> {
    let mut answers = Vec::with_capacity(questions.len());
    for (position, question) in questions.iter().enumerate() {
        let record = store
            .get(position)
            .filter(|record| is_record_complete(question, record))
            .ok_or(SubmissionError::Incomplete { position })?;
        answers.push(FlatAnswer::from_record(question, record));
    }
    Ok(FinalPayload {
        attempt_id,
        answers,
    })
}
