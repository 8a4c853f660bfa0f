use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, TestId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("unknown question type code: {0}")]
    UnknownType(u8),

    #[error("question {0} has no options")]
    NoOptions(QuestionId),

    #[error("question set for test {0} is empty")]
    EmptySet(TestId),

    #[error("question {0} appears more than once in the set")]
    DuplicateQuestion(QuestionId),
}

//
// ─── QUESTION TYPE ─────────────────────────────────────────────────────────────
//

/// How "answered" is decided for a question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionFamily {
    /// Exactly one value.
    ExactlyOne,
    /// Between one and `maxSelect` values.
    BoundedMulti,
    /// Weights that add up to exactly 100.
    SumTo100,
    /// Any non-empty list.
    NonEmptyList,
}

/// The ten answer shapes a question can take.
///
/// Serialized as its backend integer code (`1..=10`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    Slider,
    Ranking,
    SingleEmotion,
    Emotion,
    Percentage,
    Color,
    ImageChoice,
    ImageCaptionChoice,
}

impl QuestionType {
    pub const ALL: [QuestionType; 10] = [
        QuestionType::SingleChoice,
        QuestionType::MultiChoice,
        QuestionType::Slider,
        QuestionType::Ranking,
        QuestionType::SingleEmotion,
        QuestionType::Emotion,
        QuestionType::Percentage,
        QuestionType::Color,
        QuestionType::ImageChoice,
        QuestionType::ImageCaptionChoice,
    ];

    /// Backend integer code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            QuestionType::SingleChoice => 1,
            QuestionType::MultiChoice => 2,
            QuestionType::Slider => 3,
            QuestionType::Ranking => 4,
            QuestionType::SingleEmotion => 5,
            QuestionType::Emotion => 6,
            QuestionType::Percentage => 7,
            QuestionType::Color => 8,
            QuestionType::ImageChoice => 9,
            QuestionType::ImageCaptionChoice => 10,
        }
    }

    /// Completion family lookup; the single source of truth for `is_complete`.
    #[must_use]
    pub const fn completion_family(self) -> CompletionFamily {
        match self {
            QuestionType::SingleChoice
            | QuestionType::Slider
            | QuestionType::SingleEmotion
            | QuestionType::Emotion
            | QuestionType::ImageChoice
            | QuestionType::ImageCaptionChoice => CompletionFamily::ExactlyOne,
            QuestionType::MultiChoice => CompletionFamily::BoundedMulti,
            QuestionType::Percentage => CompletionFamily::SumTo100,
            QuestionType::Ranking | QuestionType::Color => CompletionFamily::NonEmptyList,
        }
    }

    /// Numeric-answer types: the answer travels in `score`, not `option_ids`.
    #[must_use]
    pub const fn carries_score(self) -> bool {
        matches!(self, QuestionType::Slider | QuestionType::Percentage)
    }

    /// Types whose values are option ids of the question.
    #[must_use]
    pub const fn values_are_option_ids(self) -> bool {
        !matches!(
            self,
            QuestionType::Slider | QuestionType::Percentage | QuestionType::Color
        )
    }

    /// Types answered by picking exactly one option.
    #[must_use]
    pub const fn is_single_select(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice
                | QuestionType::SingleEmotion
                | QuestionType::Emotion
                | QuestionType::ImageChoice
                | QuestionType::ImageCaptionChoice
        )
    }
}

impl TryFrom<u8> for QuestionType {
    type Error = QuestionError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        QuestionType::ALL
            .into_iter()
            .find(|ty| ty.code() == code)
            .ok_or(QuestionError::UnknownType(code))
    }
}

impl From<QuestionType> for u8 {
    fn from(ty: QuestionType) -> Self {
        ty.code()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

//
// ─── QUESTION + OPTION ─────────────────────────────────────────────────────────
//

/// One selectable option of a question.
///
/// `dimension` and `score` are opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl QuestionOption {
    #[must_use]
    pub fn new(id: OptionId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            image: None,
            dimension: None,
            score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(
        default,
        rename = "maxSelect",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_select: Option<u32>,
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Build a question, rejecting an empty option list.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::NoOptions` if `options` is empty.
    pub fn new(
        id: QuestionId,
        question_type: QuestionType,
        content: impl Into<String>,
        options: Vec<QuestionOption>,
    ) -> Result<Self, QuestionError> {
        let question = Self {
            id,
            question_type,
            content: content.into(),
            image: None,
            max_select: None,
            options,
        };
        question.validate()?;
        Ok(question)
    }

    #[must_use]
    pub fn with_max_select(mut self, max_select: u32) -> Self {
        self.max_select = Some(max_select);
        self
    }

    /// Check invariants that deserialization cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::NoOptions` if the option list is empty.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.options.is_empty() {
            return Err(QuestionError::NoOptions(self.id));
        }
        Ok(())
    }

    /// Option ids in question order.
    pub fn option_ids(&self) -> impl Iterator<Item = OptionId> + '_ {
        self.options.iter().map(|opt| opt.id)
    }

    #[must_use]
    pub fn has_option(&self, id: OptionId) -> bool {
        self.options.iter().any(|opt| opt.id == id)
    }

    /// Upper bound for multi-select answers; falls back to the option count.
    #[must_use]
    pub fn selection_limit(&self) -> usize {
        self.max_select
            .and_then(|max| usize::try_from(max).ok())
            .filter(|max| *max > 0)
            .unwrap_or(self.options.len())
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// Validated, ordered question list for one test.
///
/// Position in this list is the resume and navigation anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    test_id: TestId,
    questions: Vec<Question>,
}

impl QuestionSet {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptySet` for an empty list, `NoOptions` for a
    /// question without options, and `DuplicateQuestion` when ids repeat.
    pub fn new(test_id: TestId, questions: Vec<Question>) -> Result<Self, QuestionError> {
        if questions.is_empty() {
            return Err(QuestionError::EmptySet(test_id));
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            question.validate()?;
            if !seen.insert(question.id) {
                return Err(QuestionError::DuplicateQuestion(question.id));
            }
        }
        Ok(Self { test_id, questions })
    }

    #[must_use]
    pub fn test_id(&self) -> TestId {
        self.test_id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Question> {
        self.questions.get(position)
    }

    /// Linear scan for the position of a question id.
    #[must_use]
    pub fn position_of(&self, id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id == id)
    }
}

impl AsRef<[Question]> for QuestionSet {
    fn as_ref(&self) -> &[Question] {
        &self.questions
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
