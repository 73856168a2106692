//! Property tests for traversal and ledger invariants.

use chrono::Duration;
use proptest::prelude::*;

use crate::config::{AnswerPolicy, EngineConfig};
use crate::engine::{SessionEngine, Transition};
use crate::ledger;
use crate::model::{
    DialogueOption, DialogueStep, Lesson, LessonContent, LessonDraft, LessonProgress, LessonState,
};
use crate::testing::section_lesson;
use crate::time::fixed_now;

// ─── Generators ────────────────────────────────────────────────────────────────

fn question(id: String, graded: bool) -> DialogueStep {
    let mut right = DialogueOption::new("opt-1", "Right", "Yes");
    let mut wrong = DialogueOption::new("opt-2", "Wrong", "No");
    if graded {
        right = right.correct(true);
        wrong = wrong.correct(false);
    }
    DialogueStep::question(id, "Pick", vec![right, wrong], graded)
}

/// Linear lesson: `true` entries in `teaching` are questions.
fn arb_lesson() -> impl Strategy<Value = Lesson> {
    (
        proptest::collection::vec(any::<bool>(), 1..8),
        any::<bool>(),
        1u32..30,
    )
        .prop_map(|(teaching, intro_has_options, minutes)| {
            let introduction = if intro_has_options {
                question("intro".to_string(), false)
            } else {
                DialogueStep::narration("intro", "Hello")
            };
            let teaching = teaching
                .into_iter()
                .enumerate()
                .map(|(i, is_question)| {
                    if is_question {
                        question(format!("t-{i}"), true)
                    } else {
                        DialogueStep::narration(format!("t-{i}"), "Listen")
                    }
                })
                .collect();
            LessonDraft {
                id: "prop".into(),
                section_id: "s".into(),
                title: "Prop".into(),
                description: String::new(),
                scripture: None,
                estimated_minutes: minutes,
                order: 1,
                locked: false,
                content: LessonContent {
                    introduction,
                    teaching,
                    application: DialogueStep::reflection("app", "Apply"),
                    reflection: DialogueStep::reflection("refl", "Reflect"),
                },
            }
            .validate()
            .expect("generated lesson is valid")
        })
}

/// Learner moves: option pick and seconds waited before acting.
fn arb_moves() -> impl Strategy<Value = Vec<(bool, i64)>> {
    proptest::collection::vec((any::<bool>(), 0i64..20_000), 16)
}

/// Drive `state` to the end, returning how many operations it took.
fn walk(
    engine: &SessionEngine,
    lesson: &Lesson,
    state: &mut LessonState,
    moves: &[(bool, i64)],
) -> usize {
    let mut now = fixed_now();
    for (ops, &(pick_first, wait)) in moves.iter().cycle().enumerate() {
        now += Duration::seconds(wait);
        let step = lesson.graph().resolve_step(state.current_step_id()).unwrap();
        let transition = if step.has_options() {
            let pick = if pick_first { "opt-1" } else { "opt-2" };
            engine
                .submit_answer(lesson, state, &pick.into(), now)
                .unwrap()
                .transition
        } else {
            engine.advance(lesson, state, now).unwrap()
        };
        if transition.is_finished() {
            return ops + 1;
        }
    }
    unreachable!("cycled moves never end")
}

// ─── Properties ────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn linear_traversal_visits_every_step_once(lesson in arb_lesson(), moves in arb_moves()) {
        let engine = SessionEngine::default();
        let mut progress = LessonProgress::new("u".into(), fixed_now());
        let mut state = engine.start(&lesson, &mut progress, fixed_now()).clone();

        let ops = walk(&engine, &lesson, &mut state, &moves);

        prop_assert_eq!(ops, lesson.graph().linear_len());
        prop_assert!(state.is_completed());
    }

    #[test]
    fn time_is_capped_per_operation(lesson in arb_lesson(), moves in arb_moves()) {
        let engine = SessionEngine::default();
        let cap = engine.config().idle_cap_for(&lesson);
        let mut progress = LessonProgress::new("u".into(), fixed_now());
        let mut state = engine.start(&lesson, &mut progress, fixed_now()).clone();

        let ops = walk(&engine, &lesson, &mut state, &moves);
        let ops = i32::try_from(ops).unwrap();

        prop_assert!(state.time_spent() >= Duration::zero());
        prop_assert!(state.time_spent() <= cap * ops);
    }

    #[test]
    fn ledger_stays_consistent(lesson in arb_lesson(), moves in arb_moves()) {
        let engine = SessionEngine::default();
        let mut progress = LessonProgress::new("u".into(), fixed_now());
        let mut state = engine.start(&lesson, &mut progress, fixed_now()).clone();
        walk(&engine, &lesson, &mut state, &moves);
        let end = state.last_touched_at();

        engine.complete(&lesson, &mut state, &mut progress, end).unwrap();

        prop_assert!(ledger::check_invariants(&progress).is_ok());
        prop_assert_eq!(progress.total_time_spent(), state.time_spent());
        prop_assert!(progress.is_completed(lesson.id()));
    }

    #[test]
    fn require_correct_never_passes_a_wrong_answer(lesson in arb_lesson(), moves in arb_moves()) {
        let engine = SessionEngine::new(
            EngineConfig::default().with_answer_policy(AnswerPolicy::RequireCorrect),
        );
        let mut progress = LessonProgress::new("u".into(), fixed_now());
        let mut state = engine.start(&lesson, &mut progress, fixed_now()).clone();

        for &(pick_first, _) in moves.iter().cycle().take(64) {
            let step = lesson.graph().resolve_step(state.current_step_id()).unwrap().clone();
            let transition = if step.has_options() {
                let pick = if pick_first { "opt-1" } else { "opt-2" };
                engine.submit_answer(&lesson, &mut state, &pick.into(), fixed_now()).unwrap().transition
            } else {
                engine.advance(&lesson, &mut state, fixed_now()).unwrap()
            };
            if step.is_graded() && !pick_first {
                prop_assert_eq!(transition.clone(), Transition::Stayed);
                prop_assert_eq!(state.current_step_id(), step.id());
            }
            if transition.is_finished() {
                break;
            }
        }
    }

    #[test]
    fn completing_lessons_never_relocks(done in proptest::collection::vec(any::<bool>(), 4)) {
        let section: Vec<Lesson> = (1..=4u32)
            .map(|order| section_lesson("s", &format!("l-{order}"), order, true))
            .collect();
        let engine = SessionEngine::default();
        let mut progress = LessonProgress::new("u".into(), fixed_now());

        for (lesson, finish) in section.iter().zip(done) {
            let before: Vec<bool> = section
                .iter()
                .map(|l| ledger::is_unlocked(&progress, &section, l.id()))
                .collect();
            if !finish || !ledger::is_unlocked(&progress, &section, lesson.id()) {
                continue;
            }

            let mut state = engine.start(lesson, &mut progress, fixed_now()).clone();
            walk(&engine, lesson, &mut state, &[(true, 0)]);
            engine.complete(lesson, &mut state, &mut progress, fixed_now()).unwrap();

            for (l, was_open) in section.iter().zip(before) {
                if was_open {
                    prop_assert!(ledger::is_unlocked(&progress, &section, l.id()));
                }
            }
        }
    }
}
