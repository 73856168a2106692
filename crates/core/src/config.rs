use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Lesson;

// Largest second count `chrono::Duration` can hold.
const MAX_CAP_SECS: i64 = i64::MAX / 1_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("idle cap multiple must be >= 1")]
    InvalidCapMultiple,

    #[error("fixed idle cap must be > 0 seconds")]
    InvalidFixedCap,
}

/// What happens when a learner picks an option marked incorrect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPolicy {
    /// Show the feedback and move on, like an ungraded choice.
    #[default]
    Advance,
    /// Show the feedback and keep the learner on the question.
    RequireCorrect,
}

/// Upper bound for a single elapsed-time delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleCap {
    /// `estimated_minutes * n` of the lesson being traversed.
    EstimateMultiple(u32),
    /// Same cap for every lesson, in seconds.
    FixedSecs(u64),
}

impl Default for IdleCap {
    fn default() -> Self {
        Self::EstimateMultiple(3)
    }
}

/// Tunables of the session engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub answer_policy: AnswerPolicy,
    pub idle_cap: IdleCap,
}

impl EngineConfig {
    /// Check the configured values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the idle cap would be zero.
    pub fn validate(self) -> Result<Self, ConfigError> {
        match self.idle_cap {
            IdleCap::EstimateMultiple(0) => Err(ConfigError::InvalidCapMultiple),
            IdleCap::FixedSecs(0) => Err(ConfigError::InvalidFixedCap),
            _ => Ok(self),
        }
    }

    #[must_use]
    pub fn with_answer_policy(mut self, policy: AnswerPolicy) -> Self {
        self.answer_policy = policy;
        self
    }

    #[must_use]
    pub fn with_idle_cap(mut self, cap: IdleCap) -> Self {
        self.idle_cap = cap;
        self
    }

    /// Largest delta credited to `timeSpent` in one operation on `lesson`.
    #[must_use]
    pub fn idle_cap_for(&self, lesson: &Lesson) -> Duration {
        let secs = match self.idle_cap {
            IdleCap::EstimateMultiple(n) => u64::from(lesson.estimated_minutes())
                .saturating_mul(u64::from(n))
                .saturating_mul(60),
            IdleCap::FixedSecs(secs) => secs,
        };
        Duration::seconds(i64::try_from(secs).unwrap_or(MAX_CAP_SECS).min(MAX_CAP_SECS))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
