use std::collections::HashMap;

use assess_core::model::{Question, QuestionId, TestId};
use sqlx::Row;

use super::mapping::{id_i64, map_option_row, map_question_row, ser};
use super::{SqliteRepository, conn};
use crate::repository::{QuestionSource, StorageError};

impl SqliteRepository {
    /// Insert or replace a test together with its ordered questions.
    ///
    /// Existing questions of the test are removed first; options follow them
    /// through the cascade.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for ids that do not fit the
    /// schema, or `StorageError::Connection` on database errors.
    pub async fn upsert_test(
        &self,
        test_id: TestId,
        name: &str,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let test = id_i64("test_id", test_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO tests (id, name, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(test)
        .bind(name)
        .bind(self.clock.now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM questions WHERE test_id = ?1")
            .bind(test)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (ordinal, question) in questions.iter().enumerate() {
            let question_id = id_i64("question_id", question.id.value())?;
            let ordinal = i64::try_from(ordinal).map_err(ser)?;

            sqlx::query(
                r"
                    INSERT INTO questions (
                        id, test_id, ordinal, kind, content, image, max_select
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(question_id)
            .bind(test)
            .bind(ordinal)
            .bind(i64::from(question.question_type.code()))
            .bind(question.content.as_str())
            .bind(question.image.as_deref())
            .bind(question.max_select.map(i64::from))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (opt_ordinal, option) in question.options.iter().enumerate() {
                sqlx::query(
                    r"
                        INSERT INTO options (
                            id, test_id, question_id, ordinal, content, image, dimension, score
                        )
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ",
                )
                .bind(id_i64("option_id", option.id.value())?)
                .bind(test)
                .bind(question_id)
                .bind(i64::try_from(opt_ordinal).map_err(ser)?)
                .bind(option.content.as_str())
                .bind(option.image.as_deref())
                .bind(option.dimension.as_deref())
                .bind(option.score)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(test_id = %test_id, questions = questions.len(), "stored test");
        Ok(())
    }
}

#[async_trait::async_trait]
impl QuestionSource for SqliteRepository {
    async fn fetch_questions(&self, test_id: TestId) -> Result<Vec<Question>, StorageError> {
        let test = id_i64("test_id", test_id.value())?;

        let exists = sqlx::query("SELECT 1 FROM tests WHERE id = ?1")
            .bind(test)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let question_rows = sqlx::query(
            r"
                SELECT id, kind, content, image, max_select
                FROM questions
                WHERE test_id = ?1
                ORDER BY ordinal ASC
            ",
        )
        .bind(test)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let option_rows = sqlx::query(
            r"
                SELECT question_id, id, content, image, dimension, score
                FROM options
                WHERE test_id = ?1
                ORDER BY question_id ASC, ordinal ASC
            ",
        )
        .bind(test)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut options_by_question: HashMap<QuestionId, Vec<_>> = HashMap::new();
        for row in &option_rows {
            let (question_id, option) = map_option_row(row)?;
            options_by_question.entry(question_id).or_default().push(option);
        }

        question_rows
            .iter()
            .map(|row| {
                let mut question = map_question_row(row)?;
                question.options = options_by_question.remove(&question.id).unwrap_or_default();
                Ok(question)
            })
            .collect()
    }
}

impl SqliteRepository {
    /// Display name of a stored test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown test.
    pub async fn test_name(&self, test_id: TestId) -> Result<String, StorageError> {
        let row = sqlx::query("SELECT name FROM tests WHERE id = ?1")
            .bind(id_i64("test_id", test_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        row.try_get("name").map_err(ser)
    }
}
