#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use lesson_core::model::{LessonId, UserId};
use services::{Clock, CompletionReport, LessonSessionService, RetryConfig, SessionError};
use storage::{InMemoryRepository, JsonCatalog, LessonCatalog, ProgressRepository};

pub const GENESIS_1: &str = "genesis-1";
pub const GENESIS_2: &str = "genesis-2";
pub const SECTION: &str = "genesis-creation";

pub fn catalog() -> Arc<dyn LessonCatalog> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/lessons");
    Arc::new(JsonCatalog::from_dir(dir).expect("fixture catalog"))
}

pub fn quick_retry() -> RetryConfig {
    RetryConfig {
        base_delay_ms: 1,
        max_delay_ms: 4,
        ..RetryConfig::default()
    }
}

pub fn service(clock: Clock) -> (LessonSessionService, InMemoryRepository) {
    let repo = InMemoryRepository::new();
    let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
    let svc = LessonSessionService::new(clock, catalog(), progress).with_retry(quick_retry());
    (svc, repo)
}

/// Play `lesson` from its current step to the end, picking the first option
/// on every question and moving the clock `step_secs` before each action.
pub async fn play_through(
    svc: &LessonSessionService,
    clock: &mut Clock,
    user: &UserId,
    lesson: &LessonId,
    step_secs: i64,
) -> Result<(usize, CompletionReport), SessionError> {
    let mut step = svc.current_step(user, lesson).await?;
    let mut ops = 0;
    loop {
        clock.advance(chrono::Duration::seconds(step_secs));
        ops += 1;
        let (next, completion) = if step.has_options() {
            let pick = step.options[0].id.clone();
            let result = svc.submit_answer(user, lesson, &pick).await?;
            (result.step, result.completion)
        } else {
            let result = svc.advance(user, lesson).await?;
            (result.step, result.completion)
        };
        if let Some(report) = completion {
            return Ok((ops, report));
        }
        step = next;
    }
}
