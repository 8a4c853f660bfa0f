use assess_core::model::{AttemptId, TestId};
use assess_core::{FinalPayload, FlatAnswer, ProgressPayload};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::mapping::{
    attempt_id_from_i64, decode_answers, encode_answers, id_i64, ser, test_id_from_i64,
};
use super::{SqliteRepository, conn};
use crate::repository::{ProgressStore, StorageError, SubmissionSink};

struct AttemptHead {
    test_id: TestId,
    submitted: bool,
}

impl SqliteRepository {
    async fn attempt_head(
        &self,
        tx: &mut sqlx::SqliteConnection,
        attempt: i64,
    ) -> Result<AttemptHead, StorageError> {
        let row = sqlx::query("SELECT test_id, submitted_at FROM attempts WHERE id = ?1")
            .bind(attempt)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        let submitted_at: Option<DateTime<Utc>> = row.try_get("submitted_at").map_err(ser)?;
        Ok(AttemptHead {
            test_id: test_id_from_i64(row.try_get::<i64, _>("test_id").map_err(ser)?)?,
            submitted: submitted_at.is_some(),
        })
    }
}

#[async_trait::async_trait]
impl ProgressStore for SqliteRepository {
    async fn start_attempt(&self, test_id: TestId) -> Result<AttemptId, StorageError> {
        let test = id_i64("test_id", test_id.value())?;

        let exists = sqlx::query("SELECT 1 FROM tests WHERE id = ?1")
            .bind(test)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(
            r"
                INSERT INTO attempts (test_id, started_at, progress)
                VALUES (?1, ?2, 0)
            ",
        )
        .bind(test)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let attempt_id = attempt_id_from_i64(res.last_insert_rowid())?;
        tracing::debug!(test_id = %test_id, attempt_id = %attempt_id, "started attempt");
        Ok(attempt_id)
    }

    async fn fetch_prior_submission(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Option<Vec<FlatAnswer>>, StorageError> {
        let row = sqlx::query("SELECT answers_json, submitted_at FROM attempts WHERE id = ?1")
            .bind(id_i64("attempt_id", attempt_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let submitted_at: Option<DateTime<Utc>> = row.try_get("submitted_at").map_err(ser)?;
        if submitted_at.is_some() {
            return Err(StorageError::Conflict);
        }
        let json: Option<String> = row.try_get("answers_json").map_err(ser)?;
        json.as_deref().map(decode_answers).transpose()
    }

    async fn save_progress(&self, payload: &ProgressPayload) -> Result<(), StorageError> {
        let attempt = id_i64("attempt_id", payload.attempt_id.value())?;
        let answers = encode_answers(&payload.answers)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;
        let head = self.attempt_head(&mut tx, attempt).await?;
        if head.submitted || head.test_id != payload.test_id {
            return Err(StorageError::Conflict);
        }

        sqlx::query(
            r"
                UPDATE attempts
                SET progress = ?2, answers_json = ?3, saved_at = ?4
                WHERE id = ?1
            ",
        )
        .bind(attempt)
        .bind(i64::from(payload.progress))
        .bind(answers)
        .bind(self.clock.now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        tracing::debug!(
            attempt_id = %payload.attempt_id,
            progress = payload.progress,
            answers = payload.answers.len(),
            "saved progress"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubmissionSink for SqliteRepository {
    async fn submit(&self, payload: &FinalPayload) -> Result<(), StorageError> {
        let attempt = id_i64("attempt_id", payload.attempt_id.value())?;
        let answers = encode_answers(&payload.answers)?;
        let now = self.clock.now();

        let mut tx = self.pool.begin().await.map_err(conn)?;
        if self.attempt_head(&mut tx, attempt).await?.submitted {
            return Err(StorageError::Conflict);
        }

        sqlx::query(
            r"
                INSERT INTO submissions (attempt_id, answers_json, submitted_at)
                VALUES (?1, ?2, ?3)
            ",
        )
        .bind(attempt)
        .bind(answers.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query(
            r"
                UPDATE attempts
                SET answers_json = ?2, submitted_at = ?3
                WHERE id = ?1
            ",
        )
        .bind(attempt)
        .bind(answers.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        tracing::debug!(attempt_id = %payload.attempt_id, "submitted attempt");
        Ok(())
    }
}

impl SqliteRepository {
    /// Last saved progress marker (one-based) for an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt.
    pub async fn saved_progress(&self, attempt_id: AttemptId) -> Result<u32, StorageError> {
        let row = sqlx::query("SELECT progress FROM attempts WHERE id = ?1")
            .bind(id_i64("attempt_id", attempt_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        let progress: i64 = row.try_get("progress").map_err(ser)?;
        u32::try_from(progress)
            .map_err(|_| StorageError::Serialization(format!("invalid progress: {progress}")))
    }
}
