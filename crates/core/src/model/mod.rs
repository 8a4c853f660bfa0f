mod answer;
mod ids;
mod question;

pub use ids::{AttemptId, OptionId, ParseIdError, QuestionId, TestId};

pub use answer::{AnswerError, AnswerInput, AnswerRecord, MAX_COLOR_PICKS, SCALE_MAX};
pub use question::{
    CompletionFamily, Question, QuestionError, QuestionOption, QuestionSet, QuestionType,
};
