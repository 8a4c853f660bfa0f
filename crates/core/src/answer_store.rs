//! Position-keyed answer storage and per-type completion rules.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{
    AnswerRecord, CompletionFamily, MAX_COLOR_PICKS, Question, QuestionId, QuestionType, SCALE_MAX,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerStoreError {
    #[error("position {position} is out of range for {len} questions")]
    OutOfRange { position: usize, len: usize },

    #[error("position {position} holds a {expected} question, record is {found}")]
    TypeMismatch {
        position: usize,
        expected: QuestionType,
        found: QuestionType,
    },

    #[error("position {position} holds question {expected}, record is for {found}")]
    QuestionMismatch {
        position: usize,
        expected: QuestionId,
        found: QuestionId,
    },
}

/// Ordered mapping from question position to the current answer.
///
/// Keyed by position rather than question id: question order is what a resumed
/// attempt anchors on. The record at a position always belongs to the question
/// at that position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerStore {
    capacity: usize,
    records: BTreeMap<usize, AnswerRecord>,
}

impl AnswerStore {
    /// Empty store for a question sequence of `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of positions holding a record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the record at `position`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns `AnswerStoreError::OutOfRange` when `position` is past the
    /// question sequence, and `TypeMismatch`/`QuestionMismatch` when the record
    /// does not belong to the question at `position`. The store is unchanged on
    /// error.
    pub fn set(
        &mut self,
        questions: &[Question],
        position: usize,
        record: AnswerRecord,
    ) -> Result<Option<AnswerRecord>, AnswerStoreError> {
        let len = self.capacity.min(questions.len());
        let question = questions
            .get(position)
            .filter(|_| position < len)
            .ok_or(AnswerStoreError::OutOfRange { position, len })?;

        if record.question_type != question.question_type {
            return Err(AnswerStoreError::TypeMismatch {
                position,
                expected: question.question_type,
                found: record.question_type,
            });
        }
        if record.question_id != question.id {
            return Err(AnswerStoreError::QuestionMismatch {
                position,
                expected: question.id,
                found: record.question_id,
            });
        }

        Ok(self.records.insert(position, record))
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&AnswerRecord> {
        self.records.get(&position)
    }

    /// Whether the answer at `position` satisfies its type's completion rule.
    ///
    /// A missing record or an out-of-range position is never complete.
    #[must_use]
    pub fn is_complete(&self, position: usize, questions: &[Question]) -> bool {
        match (questions.get(position), self.get(position)) {
            (Some(question), Some(record)) => is_record_complete(question, record),
            _ => false,
        }
    }

    /// First position (in order) that is not complete.
    #[must_use]
    pub fn first_incomplete(&self, questions: &[Question]) -> Option<usize> {
        (0..questions.len()).find(|pos| !self.is_complete(*pos, questions))
    }

    /// True when every question in the sequence is complete.
    #[must_use]
    pub fn is_fully_complete(&self, questions: &[Question]) -> bool {
        !questions.is_empty() && self.first_incomplete(questions).is_none()
    }

    /// Number of complete positions.
    #[must_use]
    pub fn complete_count(&self, questions: &[Question]) -> usize {
        self.records
            .keys()
            .filter(|pos| self.is_complete(**pos, questions))
            .count()
    }

    /// Records in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &AnswerRecord)> {
        self.records.iter().map(|(pos, record)| (*pos, record))
    }

    /// Drop every record; the capacity is kept.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Completion rule for one record, dispatched on the question's family.
#[must_use]
pub fn is_record_complete(question: &Question, record: &AnswerRecord) -> bool {
    let values = &record.values;
    match question.question_type.completion_family() {
        CompletionFamily::ExactlyOne => values.len() == 1,
        CompletionFamily::BoundedMulti => {
            !values.is_empty() && values.len() <= question.selection_limit()
        }
        CompletionFamily::SumTo100 => {
            values
                .iter()
                .try_fold(0_u64, |acc, v| acc.checked_add(*v))
                == Some(SCALE_MAX)
        }
        CompletionFamily::NonEmptyList if question.question_type == QuestionType::Color => {
            (1..=MAX_COLOR_PICKS).contains(&values.len())
        }
        // Rankings count as answered once started, even if partial.
        CompletionFamily::NonEmptyList => !values.is_empty(),
    }
}
