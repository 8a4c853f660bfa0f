use assess_core::model::{AttemptId, TestId};
use sqlx::Row;

use super::mapping::{attempt_id_from_i64, id_i64, ser};
use super::{SqliteRepository, conn};
use crate::repository::{ResumeTokenRepository, StorageError};

#[async_trait::async_trait]
impl ResumeTokenRepository for SqliteRepository {
    async fn get_token(&self, test_id: TestId) -> Result<Option<AttemptId>, StorageError> {
        let row = sqlx::query("SELECT attempt_id FROM resume_tokens WHERE test_id = ?1")
            .bind(id_i64("test_id", test_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|row| attempt_id_from_i64(row.try_get::<i64, _>("attempt_id").map_err(ser)?))
            .transpose()
    }

    async fn put_token(&self, test_id: TestId, attempt_id: AttemptId) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO resume_tokens (test_id, attempt_id, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(test_id) DO UPDATE SET
                    attempt_id = excluded.attempt_id,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(id_i64("test_id", test_id.value())?)
        .bind(id_i64("attempt_id", attempt_id.value())?)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear_token(&self, test_id: TestId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM resume_tokens WHERE test_id = ?1")
            .bind(id_i64("test_id", test_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
