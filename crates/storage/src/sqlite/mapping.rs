use assess_core::FlatAnswer;
use assess_core::model::{
    AttemptId, OptionId, Question, QuestionId, QuestionOption, QuestionType, TestId,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn test_id_from_i64(v: i64) -> Result<TestId, StorageError> {
    Ok(TestId::new(i64_to_u64("test_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn question_type_from_i64(v: i64) -> Result<QuestionType, StorageError> {
    let code = u8::try_from(v)
        .map_err(|_| StorageError::Serialization(format!("invalid question kind: {v}")))?;
    QuestionType::try_from(code).map_err(ser)
}

pub(crate) fn encode_answers(answers: &[FlatAnswer]) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn decode_answers(json: &str) -> Result<Vec<FlatAnswer>, StorageError> {
    serde_json::from_str(json).map_err(ser)
}

/// Question row without its options.
pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = QuestionId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?);
    let question_type = question_type_from_i64(row.try_get::<i64, _>("kind").map_err(ser)?)?;
    let max_select = row
        .try_get::<Option<i64>, _>("max_select")
        .map_err(ser)?
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| StorageError::Serialization(format!("invalid max_select: {v}")))
        })
        .transpose()?;

    Ok(Question {
        id,
        question_type,
        content: row.try_get("content").map_err(ser)?,
        image: row.try_get("image").map_err(ser)?,
        max_select,
        options: Vec::new(),
    })
}

pub(crate) fn map_option_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<(QuestionId, QuestionOption), StorageError> {
    let question_id = QuestionId::new(i64_to_u64(
        "question_id",
        row.try_get::<i64, _>("question_id").map_err(ser)?,
    )?);
    let option = QuestionOption {
        id: OptionId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        content: row.try_get("content").map_err(ser)?,
        image: row.try_get("image").map_err(ser)?,
        dimension: row.try_get("dimension").map_err(ser)?,
        score: row.try_get("score").map_err(ser)?,
    };
    Ok((question_id, option))
}
