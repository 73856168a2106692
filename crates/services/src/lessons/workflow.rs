use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lesson_core::engine::{SessionEngine, Transition};
use lesson_core::model::{
    Lesson, LessonId, LessonProgress, LessonState, OptionId, ProgressStats, SectionId, StepId,
    UserId,
};
use lesson_core::validator::Feedback;
use lesson_core::{EngineConfig, EngineError, ledger};
use storage::repository::{LessonCatalog, ProgressRepository, Storage, StorageError};
use tracing::{debug, info};

use super::locks::UserLocks;
use super::view::{CompletionReport, HelpView, LessonListItem, LessonStatusView, StepView};
use crate::Clock;
use crate::error::SessionError;
use crate::retry::{RetryConfig, with_retry};

/// Result of answering the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub feedback: Feedback,
    pub transition: Transition,
    /// Step the learner is on after the answer.
    pub step: StepView,
    /// Set when the answer finished the lesson.
    pub completion: Option<CompletionReport>,
}

/// Result of moving past an informational step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceResult {
    pub transition: Transition,
    pub step: StepView,
    pub completion: Option<CompletionReport>,
}

/// Orchestrates lesson sessions over a catalog and a progress store.
///
/// Every mutating call runs under the user's lock as
/// load progress -> apply engine operation -> save (with retry). Results are
/// returned only after the save is acknowledged.
#[derive(Clone)]
pub struct LessonSessionService {
    clock: Clock,
    engine: SessionEngine,
    retry: RetryConfig,
    catalog: Arc<dyn LessonCatalog>,
    progress: Arc<dyn ProgressRepository>,
    locks: UserLocks,
}

impl LessonSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn LessonCatalog>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            engine: SessionEngine::default(),
            retry: RetryConfig::default(),
            catalog,
            progress,
            locks: UserLocks::default(),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.progress),
        )
    }

    #[must_use]
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = SessionEngine::new(config);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn engine_config(&self) -> &EngineConfig {
        self.engine.config()
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ─── Queries ───────────────────────────────────────────────────────────────

    /// Current progress record of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the record cannot be loaded.
    pub async fn progress(&self, user_id: &UserId) -> Result<LessonProgress, SessionError> {
        self.load(user_id).await
    }

    /// Display stats for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the record cannot be loaded.
    pub async fn stats(&self, user_id: &UserId) -> Result<ProgressStats, SessionError> {
        Ok(ledger::stats(&self.load(user_id).await?))
    }

    /// Lessons of a section with the user's unlock status and progress.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn section_overview(
        &self,
        user_id: &UserId,
        section_id: &SectionId,
    ) -> Result<Vec<LessonListItem>, SessionError> {
        let section = self.catalog.list_lessons_by_section(section_id).await?;
        let progress = self.load(user_id).await?;

        Ok(section
            .iter()
            .map(|lesson| LessonListItem {
                lesson_id: lesson.id().clone(),
                title: lesson.title().to_string(),
                order: lesson.order(),
                estimated_minutes: lesson.estimated_minutes(),
                unlocked: ledger::is_unlocked(&progress, &section, lesson.id()),
                status: LessonStatusView::from(&progress.status(lesson.id())),
                time_spent: progress
                    .state(lesson.id())
                    .map_or_else(chrono::Duration::zero, LessonState::time_spent),
            })
            .collect())
    }

    /// Where the user stands in a started lesson.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LessonNotInProgress` if the lesson was never
    /// started, or `SessionError::LessonNotFound`.
    pub async fn current_step(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<StepView, SessionError> {
        let lesson = self.lesson(lesson_id).await?;
        let progress = self.load(user_id).await?;
        let state = existing_state(&progress, &lesson)?;
        view_of(&lesson, state)
    }

    // ─── Mutations ─────────────────────────────────────────────────────────────

    /// Begin or resume a lesson.
    ///
    /// Resuming returns the stored cursor unchanged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::LessonLocked` if the lesson is not unlocked for
    /// this user, `SessionError::LessonNotFound`, or `SessionError::Persistence`.
    pub async fn start_lesson(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<StepView, SessionError> {
        let lesson = self.lesson(lesson_id).await?;
        let section = self.section_of(&lesson).await?;

        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load(user_id).await?;

        let resuming = progress.state(lesson.id()).is_some();
        if !resuming && !ledger::is_unlocked(&progress, &section, lesson.id()) {
            return Err(SessionError::LessonLocked {
                lesson: lesson.id().clone(),
            });
        }

        let now = self.clock.now();
        let state = self.engine.start(&lesson, &mut progress, now).clone();
        self.save(&progress).await?;

        debug!(user = %user_id, lesson = %lesson.id(), resuming, "lesson started");
        view_of(&lesson, &state)
    }

    /// Record a help request for the current step and return its
    /// elaboration.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::HelpUnavailable` if the step offers no help or is
    /// not the current one, plus the errors of `start_lesson`.
    pub async fn request_help(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
        step_id: &StepId,
    ) -> Result<HelpView, SessionError> {
        let lesson = self.lesson(lesson_id).await?;
        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load(user_id).await?;
        let mut state = existing_state(&progress, &lesson)?.clone();

        let now = self.clock.now();
        self.engine
            .request_help(&lesson, &mut state, step_id, now)?;
        ledger::record_state(&mut progress, state.clone(), now)?;
        self.save(&progress).await?;

        debug!(user = %user_id, lesson = %lesson.id(), step = %step_id, "help shown");
        let step = lesson.graph().resolve_step(step_id)?;
        Ok(HelpView::new(&lesson, step, &state))
    }

    /// Answer the current step.
    ///
    /// An answer that ends the lesson also books the completion.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StepNotGraded`, `EngineError::OptionNotFound`,
    /// `EngineError::AlreadyCompleted`, `EngineError::LessonNotInProgress`,
    /// `SessionError::LessonNotFound`, or `SessionError::Persistence`.
    pub async fn submit_answer(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
        option_id: &OptionId,
    ) -> Result<AnswerResult, SessionError> {
        let lesson = self.lesson(lesson_id).await?;
        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load(user_id).await?;
        let mut state = existing_state(&progress, &lesson)?.clone();
        let section = self.section_of(&lesson).await?;

        let now = self.clock.now();
        let outcome = self
            .engine
            .submit_answer(&lesson, &mut state, option_id, now)?;
        debug!(
            user = %user_id,
            lesson = %lesson.id(),
            option = %option_id,
            correct = ?outcome.feedback.is_correct,
            transition = ?outcome.transition,
            "answer recorded"
        );

        let completion = if outcome.transition.is_finished() {
            Some(self.finish(&lesson, &section, &mut state, &mut progress, now)?)
        } else {
            ledger::record_state(&mut progress, state.clone(), now)?;
            None
        };
        self.save(&progress).await?;
        log_completion(user_id, completion.as_ref());

        Ok(AnswerResult {
            feedback: outcome.feedback,
            transition: outcome.transition,
            step: view_of(&lesson, &state)?,
            completion,
        })
    }

    /// Move past the current informational step.
    ///
    /// Advancing from the reflection step finishes the lesson.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AnswerRequired` on question steps, plus the
    /// errors of `submit_answer`.
    pub async fn advance(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<AdvanceResult, SessionError> {
        let lesson = self.lesson(lesson_id).await?;
        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load(user_id).await?;
        let mut state = existing_state(&progress, &lesson)?.clone();
        let section = self.section_of(&lesson).await?;

        let now = self.clock.now();
        let transition = self.engine.advance(&lesson, &mut state, now)?;
        debug!(user = %user_id, lesson = %lesson.id(), transition = ?transition, "advanced");

        let completion = if transition.is_finished() {
            Some(self.finish(&lesson, &section, &mut state, &mut progress, now)?)
        } else {
            ledger::record_state(&mut progress, state.clone(), now)?;
            None
        };
        self.save(&progress).await?;
        log_completion(user_id, completion.as_ref());

        Ok(AdvanceResult {
            transition,
            step: view_of(&lesson, &state)?,
            completion,
        })
    }

    /// Complete a lesson whose cursor rests on the reflection step.
    ///
    /// Repeating the call on a completed lesson returns the same report with
    /// nothing newly unlocked.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFinished` before the reflection step, plus the
    /// errors of `submit_answer`.
    pub async fn complete_lesson(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<CompletionReport, SessionError> {
        let lesson = self.lesson(lesson_id).await?;
        let section = self.section_of(&lesson).await?;

        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load(user_id).await?;
        let mut state = existing_state(&progress, &lesson)?.clone();

        let now = self.clock.now();
        let report = self.finish(&lesson, &section, &mut state, &mut progress, now)?;
        self.save(&progress).await?;
        log_completion(user_id, Some(&report));
        Ok(report)
    }

    /// Credit time spent on the current step without moving.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LessonNotInProgress` if the lesson was never
    /// started, `SessionError::LessonNotFound`, or `SessionError::Persistence`.
    pub async fn heartbeat(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<(), SessionError> {
        let lesson = self.lesson(lesson_id).await?;
        let _guard = self.locks.lock(user_id).await;
        let mut progress = self.load(user_id).await?;
        let mut state = existing_state(&progress, &lesson)?.clone();

        let now = self.clock.now();
        self.engine.heartbeat(&lesson, &mut state, now)?;
        ledger::record_state(&mut progress, state, now)?;
        self.save(&progress).await
    }

    // ─── Internals ─────────────────────────────────────────────────────────────

    async fn lesson(&self, lesson_id: &LessonId) -> Result<Arc<Lesson>, SessionError> {
        match self.catalog.get_lesson(lesson_id).await {
            Ok(lesson) => Ok(lesson),
            Err(StorageError::NotFound) => Err(SessionError::LessonNotFound {
                lesson: lesson_id.clone(),
            }),
            Err(e) => Err(SessionError::Storage(e)),
        }
    }

    async fn section_of(&self, lesson: &Lesson) -> Result<Vec<Arc<Lesson>>, SessionError> {
        Ok(self
            .catalog
            .list_lessons_by_section(lesson.section_id())
            .await?)
    }

    async fn load(&self, user_id: &UserId) -> Result<LessonProgress, SessionError> {
        let repo = &self.progress;
        let now = self.clock.now();
        with_retry(&self.retry, "load_progress", || repo.load_progress(user_id, now))
            .await
            .map_err(|e| SessionError::Storage(e.error))
    }

    async fn save(&self, progress: &LessonProgress) -> Result<(), SessionError> {
        debug_assert!(ledger::check_invariants(progress).is_ok());
        let repo = &self.progress;
        with_retry(&self.retry, "save_progress", || repo.save_progress(progress))
            .await
            .map_err(|e| SessionError::Persistence {
                attempts: e.attempts,
                source: e.error,
            })
    }

    fn finish(
        &self,
        lesson: &Lesson,
        section: &[Arc<Lesson>],
        state: &mut LessonState,
        progress: &mut LessonProgress,
        now: DateTime<Utc>,
    ) -> Result<CompletionReport, SessionError> {
        let before = unlocked_set(progress, section);
        self.engine.complete(lesson, state, progress, now)?;
        let after = unlocked_set(progress, section);

        let newly_unlocked = section
            .iter()
            .map(|l| l.id())
            .filter(|id| after.contains(*id) && !before.contains(*id))
            .cloned()
            .collect();

        Ok(CompletionReport {
            lesson_id: lesson.id().clone(),
            completed_at: state.completed_at().unwrap_or(now),
            time_spent: state.time_spent(),
            newly_unlocked,
            next_lesson: ledger::next_in_section(section, lesson).map(|l| l.id().clone()),
        })
    }
}

fn existing_state<'p>(
    progress: &'p LessonProgress,
    lesson: &Lesson,
) -> Result<&'p LessonState, SessionError> {
    progress.state(lesson.id()).ok_or_else(|| {
        SessionError::Engine(EngineError::LessonNotInProgress {
            lesson: lesson.id().clone(),
        })
    })
}

fn view_of(lesson: &Lesson, state: &LessonState) -> Result<StepView, SessionError> {
    let step = lesson.graph().resolve_step(state.current_step_id())?;
    Ok(StepView::new(lesson, step, state))
}

fn unlocked_set<'s>(progress: &LessonProgress, section: &'s [Arc<Lesson>]) -> HashSet<&'s LessonId> {
    section
        .iter()
        .map(|l| l.id())
        .filter(|id| ledger::is_unlocked(progress, section, id))
        .collect()
}

fn log_completion(user_id: &UserId, report: Option<&CompletionReport>) {
    if let Some(report) = report {
        info!(
            user = %user_id,
            lesson = %report.lesson_id,
            time_spent_ms = report.time_spent.num_milliseconds(),
            unlocked = ?report.newly_unlocked,
            "lesson completed"
        );
    }
}
