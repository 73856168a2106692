use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use lesson_core::model::{LessonId, LessonProgress, UserId};
use sqlx::Row;
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{conn, from_json, map_state_row, ms_to_datetime, ser, to_json};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError> {
        let Some(row) = sqlx::query(
            r"
            SELECT completed_lessons, current_lesson, last_updated
            FROM lesson_progress
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        else {
            return Ok(LessonProgress::new(user_id.clone(), now));
        };

        let completed: BTreeSet<LessonId> =
            from_json(&row.try_get::<String, _>("completed_lessons").map_err(ser)?)?;
        let current_lesson = row
            .try_get::<Option<String>, _>("current_lesson")
            .map_err(ser)?
            .map(LessonId::new);
        let last_updated = ms_to_datetime("last_updated", row.try_get("last_updated").map_err(ser)?)?;

        let rows = sqlx::query(
            r"
            SELECT lesson_id, started_at, completed_at, current_step_id,
                   responses, help_used, time_spent_ms, last_touched_at
            FROM lesson_states
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut states = BTreeMap::new();
        for row in rows {
            let state = map_state_row(&row)?;
            states.insert(state.lesson_id().clone(), state);
        }

        Ok(LessonProgress::from_persisted(
            user_id.clone(),
            completed,
            current_lesson,
            states,
            last_updated,
        ))
    }

    /// Replace the user's rows in one transaction.
    ///
    /// A record whose `last_updated` is older than the stored one is refused
    /// with `StorageError::Conflict`.
    async fn save_progress(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        let user = progress.user_id().as_str();
        let completed = to_json(progress.completed_lessons())?;
        let current = progress.current_lesson().map(LessonId::as_str);
        let last_updated = progress.last_updated().timestamp_millis();

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO lesson_progress (user_id, completed_lessons, current_lesson, last_updated)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                completed_lessons = excluded.completed_lessons,
                current_lesson = excluded.current_lesson,
                last_updated = excluded.last_updated
            WHERE excluded.last_updated >= lesson_progress.last_updated
            ",
        )
        .bind(user)
        .bind(completed)
        .bind(current)
        .bind(last_updated)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            tx.rollback().await.map_err(conn)?;
            return Err(StorageError::Conflict);
        }

        sqlx::query("DELETE FROM lesson_states WHERE user_id = ?1")
            .bind(user)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for state in progress.lesson_states().values() {
            sqlx::query(
                r"
                INSERT INTO lesson_states (
                    user_id, lesson_id, started_at, completed_at, current_step_id,
                    responses, help_used, time_spent_ms, last_touched_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )
            .bind(user)
            .bind(state.lesson_id().as_str())
            .bind(state.started_at().timestamp_millis())
            .bind(state.completed_at().map(|t| t.timestamp_millis()))
            .bind(state.current_step_id().as_str())
            .bind(to_json(state.responses())?)
            .bind(to_json(state.help_used())?)
            .bind(state.time_spent().num_milliseconds())
            .bind(state.last_touched_at().timestamp_millis())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        debug!(
            user = %progress.user_id(),
            states = progress.lesson_states().len(),
            "progress saved"
        );
        Ok(())
    }
}
