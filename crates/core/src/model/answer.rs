use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};
use crate::model::question::{Question, QuestionType};

/// Upper bound of the slider and percentage scales.
pub const SCALE_MAX: u64 = 100;

/// Maximum palette coordinates a color answer may hold.
pub const MAX_COLOR_PICKS: usize = 2;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("{input} input does not apply to {question_type} questions")]
    InputMismatch {
        input: &'static str,
        question_type: QuestionType,
    },

    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("option {0} listed more than once")]
    DuplicateOption(OptionId),

    #[error("at most {limit} options may be selected")]
    SelectionLimit { limit: usize },

    #[error("value {value} is outside 0..=100")]
    OutOfScale { value: u64 },

    #[error("expected {expected} weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },

    #[error("color answers hold 1 or 2 picks, got {0}")]
    ColorCount(usize),
}

//
// ─── ANSWER RECORD ─────────────────────────────────────────────────────────────
//

/// In-memory value of one question's current answer.
///
/// `values` holds option ids for choice/ranking types, a single magnitude for
/// sliders, one weight per option for percentages, and palette coordinates for
/// colors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_type: QuestionType,
    pub question_id: QuestionId,
    pub values: Vec<u64>,
}

impl AnswerRecord {
    #[must_use]
    pub fn new(question_type: QuestionType, question_id: QuestionId, values: Vec<u64>) -> Self {
        Self {
            question_type,
            question_id,
            values,
        }
    }

    /// Apply a UI answer event to `question`, starting from `previous`.
    ///
    /// Only toggles read `previous`; every other input replaces the answer.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` when the input kind does not match the question
    /// type or names values the question cannot hold.
    pub fn from_input(
        question: &Question,
        previous: Option<&AnswerRecord>,
        input: AnswerInput,
    ) -> Result<Self, AnswerError> {
        let ty = question.question_type;
        let mismatch = |input: &AnswerInput| AnswerError::InputMismatch {
            input: input.kind(),
            question_type: ty,
        };

        let values = match input {
            AnswerInput::Select(option) if ty.is_single_select() => {
                ensure_option(question, option)?;
                vec![option.value()]
            }
            AnswerInput::Toggle(option) if ty == QuestionType::MultiChoice => {
                ensure_option(question, option)?;
                let mut selected: Vec<u64> = previous
                    .filter(|prev| prev.question_id == question.id)
                    .map(|prev| prev.values.clone())
                    .unwrap_or_default();
                if let Some(idx) = selected.iter().position(|v| *v == option.value()) {
                    selected.remove(idx);
                } else {
                    let limit = question.selection_limit();
                    if selected.len() >= limit {
                        return Err(AnswerError::SelectionLimit { limit });
                    }
                    selected.push(option.value());
                }
                selected
            }
            AnswerInput::Rank(order) if ty == QuestionType::Ranking => {
                let mut seen = HashSet::with_capacity(order.len());
                for option in &order {
                    ensure_option(question, *option)?;
                    if !seen.insert(*option) {
                        return Err(AnswerError::DuplicateOption(*option));
                    }
                }
                order.into_iter().map(|opt| opt.value()).collect()
            }
            AnswerInput::Slider(value) if ty == QuestionType::Slider => {
                ensure_scale(value)?;
                vec![value]
            }
            AnswerInput::Allocate(weights) if ty == QuestionType::Percentage => {
                if weights.len() != question.options.len() {
                    return Err(AnswerError::WeightCount {
                        expected: question.options.len(),
                        actual: weights.len(),
                    });
                }
                for weight in &weights {
                    ensure_scale(*weight)?;
                }
                weights
            }
            AnswerInput::Color(picks) if ty == QuestionType::Color => {
                if picks.is_empty() || picks.len() > MAX_COLOR_PICKS {
                    return Err(AnswerError::ColorCount(picks.len()));
                }
                picks
            }
            other => return Err(mismatch(&other)),
        };

        Ok(Self::new(ty, question.id, values))
    }

    /// Values interpreted as option ids.
    pub fn option_ids(&self) -> impl Iterator<Item = OptionId> + '_ {
        self.values.iter().copied().map(OptionId::new)
    }
}

fn ensure_option(question: &Question, option: OptionId) -> Result<(), AnswerError> {
    if question.has_option(option) {
        Ok(())
    } else {
        Err(AnswerError::UnknownOption {
            question: question.id,
            option,
        })
    }
}

fn ensure_scale(value: u64) -> Result<(), AnswerError> {
    if value > SCALE_MAX {
        return Err(AnswerError::OutOfScale { value });
    }
    Ok(())
}

//
// ─── ANSWER INPUT ──────────────────────────────────────────────────────────────
//

/// A discrete answer event coming from the question UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerInput {
    /// Pick one option (single choice, emotion, image choices).
    Select(OptionId),
    /// Add or remove one option of a multi-select question.
    Toggle(OptionId),
    /// Full ordering of the options of a ranking question.
    Rank(Vec<OptionId>),
    /// Slider magnitude on the 0..=100 scale.
    Slider(u64),
    /// One weight per option, in option order.
    Allocate(Vec<u64>),
    /// One or two palette coordinates.
    Color(Vec<u64>),
}

impl AnswerInput {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AnswerInput::Select(_) => "select",
            AnswerInput::Toggle(_) => "toggle",
            AnswerInput::Rank(_) => "rank",
            AnswerInput::Slider(_) => "slider",
            AnswerInput::Allocate(_) => "allocate",
            AnswerInput::Color(_) => "color",
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
