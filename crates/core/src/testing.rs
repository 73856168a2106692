//! Lessons shared by the unit tests.

use crate::model::{DialogueOption, DialogueStep, Lesson, LessonContent, LessonDraft};

pub(crate) const GENESIS_1: &str = include_str!("../../../fixtures/lessons/genesis-1.json");
pub(crate) const GENESIS_2: &str = include_str!("../../../fixtures/lessons/genesis-2.json");

/// "The Creation of the World": the reference lesson.
pub(crate) fn genesis_lesson() -> Lesson {
    serde_json::from_str(GENESIS_1).expect("genesis-1 fixture is valid")
}

/// Locked second lesson of the same section, with a follow-up branch.
pub(crate) fn genesis_sequel() -> Lesson {
    serde_json::from_str(GENESIS_2).expect("genesis-2 fixture is valid")
}

/// Minimal linear lesson in `section` at `order`.
pub(crate) fn section_lesson(section: &str, id: &str, order: u32, locked: bool) -> Lesson {
    LessonDraft {
        id: id.into(),
        section_id: section.into(),
        title: format!("Lesson {id}"),
        description: String::new(),
        scripture: None,
        estimated_minutes: 5,
        order,
        locked,
        content: LessonContent {
            introduction: DialogueStep::narration(format!("{id}-intro"), "Welcome"),
            teaching: vec![DialogueStep::question(
                format!("{id}-q"),
                "Pick one",
                vec![
                    DialogueOption::new("opt-1", "Right", "Yes").correct(true),
                    DialogueOption::new("opt-2", "Wrong", "No").correct(false),
                ],
                false,
            )],
            application: DialogueStep::reflection(format!("{id}-app"), "Apply it"),
            reflection: DialogueStep::reflection(format!("{id}-refl"), "Rest in it"),
        },
    }
    .validate()
    .expect("section lesson is valid")
}
