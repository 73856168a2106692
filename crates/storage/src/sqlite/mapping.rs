use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use lesson_core::model::{Lesson, LessonId, LessonState, OptionId, StepId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn ms_to_datetime(field: &'static str, ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Serialization(format!("{field} out of range: {ms}")))
}

pub(crate) fn opt_ms_to_datetime(
    field: &'static str,
    ms: Option<i64>,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    ms.map(|v| ms_to_datetime(field, v)).transpose()
}

pub(crate) fn order_to_i64(lesson: &Lesson) -> i64 {
    i64::from(lesson.order())
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let body: String = row.try_get("body").map_err(ser)?;
    from_json(&body)
}

pub(crate) fn map_state_row(row: &SqliteRow) -> Result<LessonState, StorageError> {
    let lesson_id = LessonId::new(row.try_get::<String, _>("lesson_id").map_err(ser)?);
    let started_at = ms_to_datetime("started_at", row.try_get("started_at").map_err(ser)?)?;
    let completed_at =
        opt_ms_to_datetime("completed_at", row.try_get("completed_at").map_err(ser)?)?;
    let current_step_id = StepId::new(row.try_get::<String, _>("current_step_id").map_err(ser)?);
    let responses: BTreeMap<StepId, OptionId> =
        from_json(&row.try_get::<String, _>("responses").map_err(ser)?)?;
    let help_used: BTreeSet<StepId> =
        from_json(&row.try_get::<String, _>("help_used").map_err(ser)?)?;

    let time_spent_ms: i64 = row.try_get("time_spent_ms").map_err(ser)?;
    if time_spent_ms < 0 {
        return Err(StorageError::Serialization(format!(
            "invalid time_spent_ms: {time_spent_ms}"
        )));
    }
    let last_touched_at =
        opt_ms_to_datetime("last_touched_at", row.try_get("last_touched_at").map_err(ser)?)?;

    Ok(LessonState::from_persisted(
        lesson_id,
        started_at,
        completed_at,
        current_step_id,
        responses,
        help_used,
        Duration::milliseconds(time_spent_ms),
        last_touched_at,
    ))
}
