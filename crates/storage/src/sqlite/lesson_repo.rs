use std::sync::Arc;

use lesson_core::model::{Lesson, LessonId, SectionId};
use sqlx::Row;
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{conn, map_lesson_row, order_to_i64, ser, to_json};
use crate::repository::{LessonCatalog, StorageError};

impl SqliteRepository {
    /// Insert or replace an authored lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if another lesson already holds the
    /// same section and order, or other storage errors.
    pub async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let body = to_json(lesson)?;

        sqlx::query(
            r"
            INSERT INTO lessons (id, section_id, ord, body)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                section_id = excluded.section_id,
                ord = excluded.ord,
                body = excluded.body
            ",
        )
        .bind(lesson.id().as_str())
        .bind(lesson.section_id().as_str())
        .bind(order_to_i64(lesson))
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;

        debug!(lesson = %lesson.id(), "lesson stored");
        Ok(())
    }
}

#[async_trait::async_trait]
impl LessonCatalog for SqliteRepository {
    async fn get_lesson(&self, id: &LessonId) -> Result<Arc<Lesson>, StorageError> {
        let row = sqlx::query("SELECT body FROM lessons WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_lesson_row(&row).map(Arc::new)
    }

    async fn list_lessons_by_section(
        &self,
        section_id: &SectionId,
    ) -> Result<Vec<Arc<Lesson>>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT body FROM lessons
            WHERE section_id = ?1
            ORDER BY ord ASC
            ",
        )
        .bind(section_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(Arc::new(map_lesson_row(&row)?));
        }
        Ok(lessons)
    }

    async fn list_sections(&self) -> Result<Vec<SectionId>, StorageError> {
        let rows = sqlx::query("SELECT DISTINCT section_id FROM lessons ORDER BY section_id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("section_id")
                    .map(SectionId::new)
                    .map_err(ser)
            })
            .collect()
    }
}
