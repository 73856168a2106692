mod common;

use chrono::Duration;
use lesson_core::model::{LessonId, StepId, StepType, UserId};
use lesson_core::time::fixed_now;
use lesson_core::{AnswerPolicy, EngineConfig, EngineError, Transition};
use services::{Clock, LessonStatusView, SessionError};
use storage::ProgressRepository;

use common::{GENESIS_1, GENESIS_2, SECTION, play_through, service};

fn user() -> UserId {
    "user-1".into()
}

#[tokio::test]
async fn first_lesson_walks_to_completion_and_unlocks_the_next() {
    let mut clock = Clock::manual(fixed_now());
    let (svc, _) = service(clock.clone());
    let lesson: LessonId = GENESIS_1.into();

    let first = svc.start_lesson(&user(), &lesson).await.unwrap();
    assert_eq!(first.step_id, "intro-1-perfected");
    assert_eq!(first.position, 0);
    assert_eq!(first.total_steps, 21);
    // Option-bearing narration is presented as a question.
    assert_eq!(first.step_type, StepType::Question);

    let (ops, report) = play_through(&svc, &mut clock, &user(), &lesson, 30)
        .await
        .unwrap();

    assert_eq!(ops, 21);
    assert_eq!(report.lesson_id, lesson);
    assert_eq!(report.time_spent, Duration::seconds(21 * 30));
    assert_eq!(report.newly_unlocked, [LessonId::new(GENESIS_2)]);
    assert_eq!(report.next_lesson, Some(LessonId::new(GENESIS_2)));
    assert_eq!(report.completed_at, fixed_now() + Duration::seconds(21 * 30));

    let stats = svc.stats(&user()).await.unwrap();
    assert_eq!(stats.completed_count, 1);
    assert_eq!(stats.in_progress_count, 0);
    assert_eq!(stats.total_time_spent, Duration::seconds(630));
}

#[tokio::test]
async fn first_start_stamps_progress_with_the_service_clock() {
    let at = fixed_now() - Duration::days(30) + Duration::nanoseconds(420_000);
    let clock = Clock::fixed(at);
    let (svc, repo) = service(clock.clone());

    svc.start_lesson(&user(), &GENESIS_1.into()).await.unwrap();

    let stats = svc.stats(&user()).await.unwrap();
    assert_eq!(stats.last_updated, clock.now());
    assert_eq!(stats.last_updated, fixed_now() - Duration::days(30));
    let stored = repo.load_progress(&user(), fixed_now()).await.unwrap();
    assert_eq!(stored.last_updated(), clock.now());
}

#[tokio::test]
async fn locked_lesson_cannot_be_started() {
    let (svc, _) = service(Clock::fixed(fixed_now()));

    let err = svc
        .start_lesson(&user(), &GENESIS_2.into())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::LessonLocked { .. }));

    let progress = svc.progress(&user()).await.unwrap();
    assert!(progress.lesson_states().is_empty());
}

#[tokio::test]
async fn unknown_lesson_is_reported() {
    let (svc, _) = service(Clock::fixed(fixed_now()));
    let err = svc
        .start_lesson(&user(), &"exodus-1".into())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::LessonNotFound { .. }));
}

#[tokio::test]
async fn resuming_returns_the_stored_cursor() {
    let clock = Clock::fixed(fixed_now());
    let (svc, _) = service(clock);
    let lesson: LessonId = GENESIS_1.into();

    svc.start_lesson(&user(), &lesson).await.unwrap();
    svc.submit_answer(&user(), &lesson, &"opt-2".into())
        .await
        .unwrap();
    svc.advance(&user(), &lesson).await.unwrap();

    let resumed = svc.start_lesson(&user(), &lesson).await.unwrap();
    assert_eq!(resumed.step_id, "teach-2-perfected");
    assert_eq!(svc.current_step(&user(), &lesson).await.unwrap(), resumed);
}

#[tokio::test]
async fn help_and_answer_on_a_question() {
    let (svc, _) = service(Clock::fixed(fixed_now()));
    let lesson: LessonId = GENESIS_1.into();

    svc.start_lesson(&user(), &lesson).await.unwrap();
    svc.submit_answer(&user(), &lesson, &"opt-1".into())
        .await
        .unwrap();
    svc.advance(&user(), &lesson).await.unwrap();

    let help = svc
        .request_help(&user(), &lesson, &"teach-2-perfected".into())
        .await
        .unwrap();
    assert!(help.step.help_used);
    assert_eq!(help.step.step_id, "teach-2-perfected");
    let ids: Vec<_> = help.elaboration.iter().map(|h| h.option_id.as_str()).collect();
    assert_eq!(ids, ["opt-1", "opt-2", "opt-3"]);
    assert!(help.elaboration.iter().all(|h| !h.response.is_empty()));
    assert!(help.elaboration[0].response.starts_with("CORRECT."));

    let result = svc
        .submit_answer(&user(), &lesson, &"opt-2".into())
        .await
        .unwrap();
    assert_eq!(result.feedback.is_correct, Some(false));
    assert!(!result.feedback.response.is_empty());
    assert_eq!(result.step.step_id, "teach-3-perfected");
    assert!(result.completion.is_none());

    let state = svc.progress(&user()).await.unwrap();
    let state = state.state(&lesson).unwrap();
    assert!(state.help_used().contains(&StepId::new("teach-2-perfected")));
}

#[tokio::test]
async fn misuse_is_rejected_without_saving() {
    let (svc, _) = service(Clock::fixed(fixed_now()));
    let lesson: LessonId = GENESIS_1.into();

    let err = svc.advance(&user(), &lesson).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Engine(EngineError::LessonNotInProgress { .. })
    ));

    svc.start_lesson(&user(), &lesson).await.unwrap();
    let before = svc.progress(&user()).await.unwrap();

    let err = svc.advance(&user(), &lesson).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Engine(EngineError::AnswerRequired { .. })
    ));
    let err = svc.complete_lesson(&user(), &lesson).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Engine(EngineError::NotFinished { .. })
    ));
    let err = svc
        .submit_answer(&user(), &lesson, &"opt-9".into())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Engine(EngineError::OptionNotFound { .. })
    ));

    assert_eq!(svc.progress(&user()).await.unwrap(), before);
}

#[tokio::test]
async fn follow_up_skips_the_default_successor() {
    let mut clock = Clock::manual(fixed_now());
    let (svc, _) = service(clock.clone());
    let first: LessonId = GENESIS_1.into();
    let second: LessonId = GENESIS_2.into();

    svc.start_lesson(&user(), &first).await.unwrap();
    play_through(&svc, &mut clock, &user(), &first, 5)
        .await
        .unwrap();

    svc.start_lesson(&user(), &second).await.unwrap();
    svc.advance(&user(), &second).await.unwrap();
    svc.advance(&user(), &second).await.unwrap();
    let result = svc
        .submit_answer(&user(), &second, &"opt-1".into())
        .await
        .unwrap();
    assert_eq!(
        result.transition,
        Transition::Moved {
            from: "g2-teach-2".into(),
            to: "g2-teach-4".into()
        }
    );

    let (_, report) = play_through(&svc, &mut clock, &user(), &second, 5)
        .await
        .unwrap();
    assert!(report.newly_unlocked.is_empty());
    assert_eq!(report.next_lesson, None);
}

#[tokio::test]
async fn require_correct_keeps_the_learner_on_the_question() {
    let (svc, _) = service(Clock::fixed(fixed_now()));
    let svc = svc.with_engine_config(
        EngineConfig::default().with_answer_policy(AnswerPolicy::RequireCorrect),
    );
    let lesson: LessonId = GENESIS_1.into();

    svc.start_lesson(&user(), &lesson).await.unwrap();
    svc.submit_answer(&user(), &lesson, &"opt-3".into())
        .await
        .unwrap();
    svc.advance(&user(), &lesson).await.unwrap();

    let wrong = svc
        .submit_answer(&user(), &lesson, &"opt-2".into())
        .await
        .unwrap();
    assert_eq!(wrong.transition, Transition::Stayed);
    assert_eq!(wrong.step.step_id, "teach-2-perfected");
    assert_eq!(wrong.step.selected, Some("opt-2".into()));

    let right = svc
        .submit_answer(&user(), &lesson, &"opt-1".into())
        .await
        .unwrap();
    assert_eq!(right.step.step_id, "teach-3-perfected");
}

#[tokio::test]
async fn completing_twice_is_idempotent() {
    let mut clock = Clock::manual(fixed_now());
    let (svc, _) = service(clock.clone());
    let lesson: LessonId = GENESIS_1.into();

    svc.start_lesson(&user(), &lesson).await.unwrap();
    let (_, first) = play_through(&svc, &mut clock, &user(), &lesson, 10)
        .await
        .unwrap();

    clock.advance(Duration::minutes(1));
    let again = svc.complete_lesson(&user(), &lesson).await.unwrap();
    assert_eq!(again.completed_at, first.completed_at);
    assert!(again.newly_unlocked.is_empty());

    let progress = svc.progress(&user()).await.unwrap();
    assert_eq!(progress.completed_lessons().len(), 1);
}

#[tokio::test]
async fn heartbeat_credits_capped_idle_time() {
    let mut clock = Clock::manual(fixed_now());
    let (svc, _) = service(clock.clone());
    let lesson: LessonId = GENESIS_1.into();
    svc.start_lesson(&user(), &lesson).await.unwrap();

    clock.advance(Duration::seconds(45));
    svc.heartbeat(&user(), &lesson).await.unwrap();
    clock.advance(Duration::days(2));
    svc.heartbeat(&user(), &lesson).await.unwrap();

    let stats = svc.stats(&user()).await.unwrap();
    // 16 minute estimate, default cap of three times that per delta.
    assert_eq!(
        stats.total_time_spent,
        Duration::seconds(45) + Duration::minutes(48)
    );
}

#[tokio::test]
async fn section_overview_tracks_status_and_unlocks() {
    let mut clock = Clock::manual(fixed_now());
    let (svc, _) = service(clock.clone());
    let section = SECTION.into();

    let fresh = svc.section_overview(&user(), &section).await.unwrap();
    let rows: Vec<_> = fresh
        .iter()
        .map(|r| (r.lesson_id.as_str(), r.unlocked, r.status))
        .collect();
    assert_eq!(
        rows,
        [
            (GENESIS_1, true, LessonStatusView::NotStarted),
            (GENESIS_2, false, LessonStatusView::NotStarted),
        ]
    );

    let lesson: LessonId = GENESIS_1.into();
    svc.start_lesson(&user(), &lesson).await.unwrap();
    clock.advance(Duration::seconds(20));
    svc.heartbeat(&user(), &lesson).await.unwrap();

    let started = svc.section_overview(&user(), &section).await.unwrap();
    assert_eq!(started[0].status, LessonStatusView::InProgress);
    assert_eq!(started[0].time_spent, Duration::seconds(20));

    play_through(&svc, &mut clock, &user(), &lesson, 1)
        .await
        .unwrap();
    let done = svc.section_overview(&user(), &section).await.unwrap();
    assert_eq!(done[0].status, LessonStatusView::Completed);
    assert!(done[1].unlocked);
}
