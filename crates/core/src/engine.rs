//! Session state machine for one user traversing one lesson.
//!
//! `NotStarted -> InProgress(step) -> Completed`. Every method is a pure
//! transition over values owned by the caller; `now` comes from the
//! caller's `Clock` so tests stay deterministic.

use chrono::{DateTime, Utc};

use crate::config::{AnswerPolicy, EngineConfig};
use crate::error::EngineError;
use crate::ledger;
use crate::model::{Lesson, LessonProgress, LessonState, OptionId, StepId};
use crate::validator::{self, Feedback};

/// Cursor movement caused by an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The cursor moved to another step.
    Moved { from: StepId, to: StepId },
    /// The cursor stayed put (an incorrect answer under `RequireCorrect`).
    Stayed,
    /// The reflection step was acknowledged; the session is complete.
    Finished,
}

impl Transition {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Transition::Finished)
    }
}

/// Feedback plus cursor movement for a submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub feedback: Feedback,
    pub transition: Transition,
}

/// Applies learner actions to a `LessonState`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionEngine {
    config: EngineConfig,
}

impl SessionEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Begin or resume `lesson`.
    ///
    /// Creates a state at the introduction when none exists; otherwise the
    /// stored state is returned untouched. Either way the lesson becomes the
    /// user's current lesson.
    pub fn start<'p>(
        &self,
        lesson: &Lesson,
        progress: &'p mut LessonProgress,
        now: DateTime<Utc>,
    ) -> &'p LessonState {
        progress.set_current_lesson(lesson.id().clone());
        progress.touch(now);
        progress.ensure_state(lesson.id(), || {
            LessonState::new(
                lesson.id().clone(),
                lesson.introduction().id().clone(),
                now,
            )
        })
    }

    /// Record that help was shown for the current step.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::HelpUnavailable` if `step_id` is not the current
    /// step or the step offers no help, and `EngineError::AlreadyCompleted`
    /// for finished sessions.
    pub fn request_help(
        &self,
        lesson: &Lesson,
        state: &mut LessonState,
        step_id: &StepId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        ensure_open(lesson, state)?;
        if state.current_step_id() != step_id {
            return Err(EngineError::HelpUnavailable {
                step: step_id.clone(),
            });
        }
        let step = lesson.graph().resolve_step(step_id)?;
        if !step.help_available() {
            return Err(EngineError::HelpUnavailable {
                step: step_id.clone(),
            });
        }

        state.accrue(now, self.config.idle_cap_for(lesson));
        state.mark_help(step_id.clone());
        Ok(())
    }

    /// Answer the current step with `option_id`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StepNotGraded` if the current step has no options,
    /// `EngineError::OptionNotFound` for an unknown option,
    /// `EngineError::StepNotFound` if the cursor no longer matches the lesson,
    /// and `EngineError::AlreadyCompleted` for finished sessions.
    pub fn submit_answer(
        &self,
        lesson: &Lesson,
        state: &mut LessonState,
        option_id: &OptionId,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, EngineError> {
        ensure_open(lesson, state)?;
        let current = state.current_step_id().clone();
        let step = lesson.graph().resolve_step(&current)?;
        let feedback = validator::validate(step, option_id)?;
        let target = lesson.graph().resolve_branch(&current, option_id)?.cloned();

        state.accrue(now, self.config.idle_cap_for(lesson));
        state.record_response(current.clone(), option_id.clone());

        let blocked = self.config.answer_policy == AnswerPolicy::RequireCorrect
            && feedback.is_correct == Some(false);
        let transition = if blocked {
            Transition::Stayed
        } else {
            move_or_finish(state, current, target, now)
        };

        Ok(AnswerOutcome {
            feedback,
            transition,
        })
    }

    /// Move past an informational step.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AnswerRequired` if the current step has options,
    /// `EngineError::StepNotFound` if the cursor no longer matches the lesson,
    /// and `EngineError::AlreadyCompleted` for finished sessions.
    pub fn advance(
        &self,
        lesson: &Lesson,
        state: &mut LessonState,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        ensure_open(lesson, state)?;
        let current = state.current_step_id().clone();
        let step = lesson.graph().resolve_step(&current)?;
        if step.has_options() {
            return Err(EngineError::AnswerRequired { step: current });
        }
        let target = lesson.graph().default_successor(&current)?.cloned();

        state.accrue(now, self.config.idle_cap_for(lesson));
        Ok(move_or_finish(state, current, target, now))
    }

    /// Credit time spent without moving the cursor.
    ///
    /// Allowed on completed sessions, where time is the only field that may
    /// still change.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LessonNotInProgress` if `state` belongs to
    /// another lesson.
    pub fn heartbeat(
        &self,
        lesson: &Lesson,
        state: &mut LessonState,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        ensure_same_lesson(lesson, state)?;
        state.accrue(now, self.config.idle_cap_for(lesson));
        Ok(())
    }

    /// Close the session and book it into the ledger.
    ///
    /// A cursor resting on an option-less reflection step counts as
    /// acknowledged. Calling this again on a completed session is a no-op
    /// apart from re-recording the state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFinished` if the reflection step has not been
    /// reached, and `EngineError::LessonNotInProgress` if the lesson was never
    /// started in `progress`.
    pub fn complete(
        &self,
        lesson: &Lesson,
        state: &mut LessonState,
        progress: &mut LessonProgress,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        ensure_same_lesson(lesson, state)?;
        if !state.is_completed() {
            let at_end = lesson.graph().is_terminal(state.current_step_id())
                && !lesson.reflection().has_options();
            if !at_end {
                return Err(EngineError::NotFinished {
                    lesson: lesson.id().clone(),
                });
            }
            state.mark_completed(now);
        }

        ledger::record_state(progress, state.clone(), now)?;
        progress.mark_completed(lesson.id().clone());
        Ok(())
    }
}

fn ensure_same_lesson(lesson: &Lesson, state: &LessonState) -> Result<(), EngineError> {
    if state.lesson_id() == lesson.id() {
        Ok(())
    } else {
        Err(EngineError::LessonNotInProgress {
            lesson: lesson.id().clone(),
        })
    }
}

fn ensure_open(lesson: &Lesson, state: &LessonState) -> Result<(), EngineError> {
    ensure_same_lesson(lesson, state)?;
    if state.is_completed() {
        return Err(EngineError::AlreadyCompleted {
            lesson: lesson.id().clone(),
        });
    }
    Ok(())
}

fn move_or_finish(
    state: &mut LessonState,
    from: StepId,
    target: Option<StepId>,
    now: DateTime<Utc>,
) -> Transition {
    match target {
        Some(to) => {
            state.move_to(to.clone());
            Transition::Moved { from, to }
        }
        None => {
            state.mark_completed(now);
            Transition::Finished
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
