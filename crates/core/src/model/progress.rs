use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, UserId};
use crate::model::state::{LessonState, SessionStatus, duration_ms};
use crate::time::to_millis;

/// Per-user record of every lesson session.
///
/// Mutations go through `ledger` and `engine::SessionEngine`, which keep
/// `total_time_spent` and `completed_lessons` consistent with `lesson_states`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    user_id: UserId,
    #[serde(default)]
    completed_lessons: BTreeSet<LessonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_lesson: Option<LessonId>,
    #[serde(default)]
    lesson_states: BTreeMap<LessonId, LessonState>,
    #[serde(default = "Duration::zero", with = "duration_ms")]
    total_time_spent: Duration,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    last_updated: DateTime<Utc>,
}

impl LessonProgress {
    /// Empty progress for a user who has not started anything.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            completed_lessons: BTreeSet::new(),
            current_lesson: None,
            lesson_states: BTreeMap::new(),
            total_time_spent: Duration::zero(),
            last_updated: to_millis(now),
        }
    }

    /// Rehydrate progress from persisted parts.
    ///
    /// Derived fields are recomputed rather than trusted: the total is summed
    /// from the states and every completed state is listed as completed.
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        completed_lessons: BTreeSet<LessonId>,
        current_lesson: Option<LessonId>,
        lesson_states: BTreeMap<LessonId, LessonState>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let mut progress = Self {
            user_id,
            completed_lessons,
            current_lesson,
            lesson_states,
            total_time_spent: Duration::zero(),
            last_updated,
        };
        progress.reconcile();
        progress
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn completed_lessons(&self) -> &BTreeSet<LessonId> {
        &self.completed_lessons
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: &LessonId) -> bool {
        self.completed_lessons.contains(lesson_id)
    }

    /// Most recently started or resumed lesson.
    #[must_use]
    pub fn current_lesson(&self) -> Option<&LessonId> {
        self.current_lesson.as_ref()
    }

    #[must_use]
    pub fn lesson_states(&self) -> &BTreeMap<LessonId, LessonState> {
        &self.lesson_states
    }

    #[must_use]
    pub fn state(&self, lesson_id: &LessonId) -> Option<&LessonState> {
        self.lesson_states.get(lesson_id)
    }

    #[must_use]
    pub fn total_time_spent(&self) -> Duration {
        self.total_time_spent
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    #[must_use]
    pub fn status(&self, lesson_id: &LessonId) -> SessionStatus {
        self.lesson_states
            .get(lesson_id)
            .map_or(SessionStatus::NotStarted, LessonState::status)
    }

    pub(crate) fn insert_state(&mut self, state: LessonState) {
        if state.is_completed() {
            self.completed_lessons.insert(state.lesson_id().clone());
        }
        self.lesson_states.insert(state.lesson_id().clone(), state);
        self.total_time_spent = self.sum_time_spent();
    }

    /// Existing state for `lesson_id`, or a new one from `init`.
    ///
    /// New states carry no time yet, so the total stays valid.
    pub(crate) fn ensure_state(
        &mut self,
        lesson_id: &LessonId,
        init: impl FnOnce() -> LessonState,
    ) -> &LessonState {
        self.lesson_states
            .entry(lesson_id.clone())
            .or_insert_with(init)
    }

    pub(crate) fn set_current_lesson(&mut self, lesson_id: LessonId) {
        self.current_lesson = Some(lesson_id);
    }

    pub(crate) fn mark_completed(&mut self, lesson_id: LessonId) {
        self.completed_lessons.insert(lesson_id);
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        let now = to_millis(now);
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    pub(crate) fn sum_time_spent(&self) -> Duration {
        self.lesson_states
            .values()
            .fold(Duration::zero(), |acc, s| acc + s.time_spent())
    }

    fn reconcile(&mut self) {
        for (id, state) in &self.lesson_states {
            if state.is_completed() {
                self.completed_lessons.insert(id.clone());
            }
        }
        self.total_time_spent = self.sum_time_spent();
    }
}

/// Read-only projection of a user's progress for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub completed_count: usize,
    pub in_progress_count: usize,
    #[serde(with = "duration_ms")]
    pub total_time_spent: Duration,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
