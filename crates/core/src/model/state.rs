use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, OptionId, StepId};
use crate::time::to_millis;

/// Where a user stands in one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    InProgress(StepId),
    Completed,
}

/// One user's traversal of one lesson.
///
/// Serialized field names and epoch-millisecond timestamps form the contract
/// with progress storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonState {
    lesson_id: LessonId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    started_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    completed_at: Option<DateTime<Utc>>,
    current_step_id: StepId,
    #[serde(default)]
    responses: BTreeMap<StepId, OptionId>,
    #[serde(default)]
    help_used: BTreeSet<StepId>,
    #[serde(default = "Duration::zero", with = "duration_ms")]
    time_spent: Duration,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    last_touched_at: Option<DateTime<Utc>>,
}

impl LessonState {
    /// Fresh state positioned at `entry`.
    #[must_use]
    pub fn new(lesson_id: LessonId, entry: StepId, started_at: DateTime<Utc>) -> Self {
        let started_at = to_millis(started_at);
        Self {
            lesson_id,
            started_at,
            completed_at: None,
            current_step_id: entry,
            responses: BTreeMap::new(),
            help_used: BTreeSet::new(),
            time_spent: Duration::zero(),
            last_touched_at: Some(started_at),
        }
    }

    /// Rehydrate a state from storage columns.
    ///
    /// Negative durations are read as zero.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        lesson_id: LessonId,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        current_step_id: StepId,
        responses: BTreeMap<StepId, OptionId>,
        help_used: BTreeSet<StepId>,
        time_spent: Duration,
        last_touched_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            lesson_id,
            started_at,
            completed_at,
            current_step_id,
            responses,
            help_used,
            time_spent: time_spent.max(Duration::zero()),
            last_touched_at,
        }
    }

    #[must_use]
    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn current_step_id(&self) -> &StepId {
        &self.current_step_id
    }

    #[must_use]
    pub fn responses(&self) -> &BTreeMap<StepId, OptionId> {
        &self.responses
    }

    #[must_use]
    pub fn response_for(&self, step_id: &StepId) -> Option<&OptionId> {
        self.responses.get(step_id)
    }

    #[must_use]
    pub fn help_used(&self) -> &BTreeSet<StepId> {
        &self.help_used
    }

    #[must_use]
    pub fn time_spent(&self) -> Duration {
        self.time_spent
    }

    /// Anchor for the next elapsed-time delta.
    ///
    /// Records written before this field existed fall back to `started_at`.
    #[must_use]
    pub fn last_touched_at(&self) -> DateTime<Utc> {
        self.last_touched_at.unwrap_or(self.started_at)
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.is_completed() {
            SessionStatus::Completed
        } else {
            SessionStatus::InProgress(self.current_step_id.clone())
        }
    }

    /// Add the time since the last touch, capped at `cap`, and move the anchor.
    ///
    /// Clock skew (a `now` earlier than the anchor) accrues nothing.
    pub(crate) fn accrue(&mut self, now: DateTime<Utc>, cap: Duration) {
        let now = to_millis(now);
        let delta = (now - self.last_touched_at()).clamp(Duration::zero(), cap);
        self.time_spent += delta;
        if now > self.last_touched_at() {
            self.last_touched_at = Some(now);
        }
    }

    pub(crate) fn move_to(&mut self, step_id: StepId) {
        self.current_step_id = step_id;
    }

    pub(crate) fn record_response(&mut self, step_id: StepId, option_id: OptionId) {
        self.responses.insert(step_id, option_id);
    }

    /// Returns false if help was already recorded for the step.
    pub(crate) fn mark_help(&mut self, step_id: StepId) -> bool {
        self.help_used.insert(step_id)
    }

    pub(crate) fn mark_completed(&mut self, at: DateTime<Utc>) {
        if self.completed_at.is_none() {
            self.completed_at = Some(to_millis(at));
        }
    }
}

/// Serde adapter storing a `chrono::Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        if ms < 0 {
            return Err(serde::de::Error::custom("duration must be non-negative"));
        }
        Ok(Duration::milliseconds(ms))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
