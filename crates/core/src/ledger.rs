//! Progress ledger: booking lesson states into a user's `LessonProgress`
//! and deriving unlock status and stats from it.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::error::EngineError;
use crate::model::{Lesson, LessonId, LessonProgress, LessonState, ProgressStats};

/// Broken ledger invariant, reported by `check_invariants`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerViolation {
    #[error("lesson {lesson} has a completion time but is not listed as completed")]
    MissingCompletion { lesson: LessonId },

    #[error("total time spent is {recorded:?} but lesson states sum to {actual:?}")]
    TotalMismatch { recorded: Duration, actual: Duration },
}

/// Upsert `state` into `progress`.
///
/// Recomputes the total time and stamps `last_updated`.
///
/// # Errors
///
/// Returns `EngineError::LessonNotInProgress` if the lesson was never started
/// for this user.
pub fn record_state(
    progress: &mut LessonProgress,
    state: LessonState,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if progress.state(state.lesson_id()).is_none() {
        return Err(EngineError::LessonNotInProgress {
            lesson: state.lesson_id().clone(),
        });
    }
    progress.insert_state(state);
    progress.touch(now);
    Ok(())
}

/// Whether the user may begin `lesson_id`.
///
/// `section` holds the sibling lessons of the section, in any order. A lesson
/// is open if it was authored unlocked, is the first of its section, or its
/// predecessor by `order` has been completed. Lessons missing from `section`
/// are locked.
#[must_use]
pub fn is_unlocked<L: AsRef<Lesson>>(
    progress: &LessonProgress,
    section: &[L],
    lesson_id: &LessonId,
) -> bool {
    let Some(lesson) = find(section, lesson_id) else {
        return false;
    };
    if !lesson.locked() {
        return true;
    }

    let first_order = section.iter().map(|l| l.as_ref().order()).min();
    if first_order == Some(lesson.order()) {
        return true;
    }

    previous_in_section(section, lesson)
        .is_some_and(|prev| progress.is_completed(prev.id()))
}

/// Sibling right after `lesson` by `order`, if any.
#[must_use]
pub fn next_in_section<'s, L: AsRef<Lesson>>(section: &'s [L], lesson: &Lesson) -> Option<&'s Lesson> {
    let wanted = lesson.order().checked_add(1)?;
    section
        .iter()
        .map(AsRef::as_ref)
        .find(|l| l.section_id() == lesson.section_id() && l.order() == wanted)
}

/// Sibling right before `lesson` by `order`, if any.
#[must_use]
pub fn previous_in_section<'s, L: AsRef<Lesson>>(
    section: &'s [L],
    lesson: &Lesson,
) -> Option<&'s Lesson> {
    let wanted = lesson.order().checked_sub(1)?;
    section
        .iter()
        .map(AsRef::as_ref)
        .find(|l| l.section_id() == lesson.section_id() && l.order() == wanted)
}

/// Display projection of `progress`.
#[must_use]
pub fn stats(progress: &LessonProgress) -> ProgressStats {
    let in_progress_count = progress
        .lesson_states()
        .values()
        .filter(|s| !s.is_completed())
        .count();

    ProgressStats {
        completed_count: progress.completed_lessons().len(),
        in_progress_count,
        total_time_spent: progress.total_time_spent(),
        last_updated: progress.last_updated(),
    }
}

/// Verify that completions and the time total agree with the lesson states.
///
/// # Errors
///
/// Returns the first `LedgerViolation` found.
pub fn check_invariants(progress: &LessonProgress) -> Result<(), LedgerViolation> {
    for (id, state) in progress.lesson_states() {
        if state.is_completed() && !progress.is_completed(id) {
            return Err(LedgerViolation::MissingCompletion { lesson: id.clone() });
        }
    }

    let actual = progress.sum_time_spent();
    if actual != progress.total_time_spent() {
        return Err(LedgerViolation::TotalMismatch {
            recorded: progress.total_time_spent(),
            actual,
        });
    }
    Ok(())
}

fn find<'s, L: AsRef<Lesson>>(section: &'s [L], lesson_id: &LessonId) -> Option<&'s Lesson> {
    section
        .iter()
        .map(AsRef::as_ref)
        .find(|l| l.id() == lesson_id)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
