use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::DialogueGraph;
use crate::model::ids::{LessonId, OptionId, SectionId, StepId};
use crate::model::step::DialogueStep;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Authoring mistakes detected when lesson content is loaded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson id cannot be empty")]
    EmptyId,

    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("estimated minutes must be > 0")]
    InvalidEstimate,

    #[error("lesson order must be >= 1")]
    InvalidOrder,

    #[error("lesson must contain at least one teaching step")]
    EmptyTeaching,

    #[error("duplicate step id: {step}")]
    DuplicateStep { step: StepId },

    #[error("duplicate option id {option} in step {step}")]
    DuplicateOption { step: StepId, option: OptionId },

    #[error("question step {step} has no options")]
    EmptyOptions { step: StepId },

    #[error("step {step} marks more than one option as correct")]
    MultipleCorrect { step: StepId },

    #[error("step {step} offers help but has no options to elaborate")]
    HelpWithoutOptions { step: StepId },

    #[error("option {option} in step {step} follows up to unknown step {target}")]
    UnknownFollowUp {
        step: StepId,
        option: OptionId,
        target: StepId,
    },

    #[error("option {option} in step {step} follows up to earlier step {target}")]
    BackwardFollowUp {
        step: StepId,
        option: OptionId,
        target: StepId,
    },
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// The four-part dialogue of a lesson, in authored form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    pub introduction: DialogueStep,
    pub teaching: Vec<DialogueStep>,
    pub application: DialogueStep,
    pub reflection: DialogueStep,
}

/// Unvalidated lesson as read from a content file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
    pub id: LessonId,
    pub section_id: SectionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripture: Option<String>,
    pub estimated_minutes: u32,
    pub order: u32,
    #[serde(default)]
    pub locked: bool,
    pub content: LessonContent,
}

impl LessonDraft {
    /// Validate the draft and build its step index.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` describing the first authoring mistake found.
    pub fn validate(self) -> Result<Lesson, LessonError> {
        if self.id.as_str().trim().is_empty() {
            return Err(LessonError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if self.estimated_minutes == 0 {
            return Err(LessonError::InvalidEstimate);
        }
        if self.order == 0 {
            return Err(LessonError::InvalidOrder);
        }

        let graph = DialogueGraph::build(self.content)?;

        Ok(Lesson {
            id: self.id,
            section_id: self.section_id,
            title: self.title,
            description: self.description,
            scripture: self.scripture,
            estimated_minutes: self.estimated_minutes,
            order: self.order,
            locked: self.locked,
            graph,
        })
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// An authored, immutable lesson with its dialogue indexed for traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LessonDraft", into = "LessonDraft")]
pub struct Lesson {
    id: LessonId,
    section_id: SectionId,
    title: String,
    description: String,
    scripture: Option<String>,
    estimated_minutes: u32,
    order: u32,
    locked: bool,
    graph: DialogueGraph,
}

impl TryFrom<LessonDraft> for Lesson {
    type Error = LessonError;

    fn try_from(draft: LessonDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Lesson> for LessonDraft {
    fn from(lesson: Lesson) -> Self {
        Self {
            id: lesson.id,
            section_id: lesson.section_id,
            title: lesson.title,
            description: lesson.description,
            scripture: lesson.scripture,
            estimated_minutes: lesson.estimated_minutes,
            order: lesson.order,
            locked: lesson.locked,
            content: lesson.graph.into_content(),
        }
    }
}

impl AsRef<Lesson> for Lesson {
    fn as_ref(&self) -> &Lesson {
        self
    }
}

impl Lesson {
    #[must_use]
    pub fn id(&self) -> &LessonId {
        &self.id
    }

    #[must_use]
    pub fn section_id(&self) -> &SectionId {
        &self.section_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Scripture passage the lesson covers, e.g. `Genesis 1:1-2:3`.
    #[must_use]
    pub fn scripture(&self) -> Option<&str> {
        self.scripture.as_deref()
    }

    #[must_use]
    pub fn estimated_minutes(&self) -> u32 {
        self.estimated_minutes
    }

    /// Position among sibling lessons of the same section, starting at 1.
    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Authoring-time lock flag. Progress may override it, see `ledger::is_unlocked`.
    #[must_use]
    pub fn locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn graph(&self) -> &DialogueGraph {
        &self.graph
    }

    #[must_use]
    pub fn introduction(&self) -> &DialogueStep {
        self.graph.entry()
    }

    #[must_use]
    pub fn teaching(&self) -> &[DialogueStep] {
        self.graph.teaching()
    }

    #[must_use]
    pub fn application(&self) -> &DialogueStep {
        self.graph.application()
    }

    #[must_use]
    pub fn reflection(&self) -> &DialogueStep {
        self.graph.terminal()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::step::DialogueOption;

    fn draft() -> LessonDraft {
        LessonDraft {
            id: LessonId::new("l-1"),
            section_id: SectionId::new("s-1"),
            title: "Lesson".into(),
            description: String::new(),
            scripture: None,
            estimated_minutes: 10,
            order: 1,
            locked: false,
            content: LessonContent {
                introduction: DialogueStep::narration("intro", "Hello"),
                teaching: vec![DialogueStep::question(
                    "q-1",
                    "Pick",
                    vec![
                        DialogueOption::new("a", "A", "yes").correct(true),
                        DialogueOption::new("b", "B", "no").correct(false),
                    ],
                    true,
                )],
                application: DialogueStep::reflection("app", "Apply"),
                reflection: DialogueStep::reflection("refl", "Reflect"),
            },
        }
    }

    #[test]
    fn valid_draft_builds_lesson() {
        let lesson = draft().validate().unwrap();
        assert_eq!(lesson.introduction().id(), &StepId::new("intro"));
        assert_eq!(lesson.teaching().len(), 1);
        assert_eq!(lesson.application().id(), &StepId::new("app"));
        assert_eq!(lesson.reflection().id(), &StepId::new("refl"));
    }

    #[test]
    fn zero_estimate_is_rejected() {
        let mut d = draft();
        d.estimated_minutes = 0;
        assert_eq!(d.validate().unwrap_err(), LessonError::InvalidEstimate);
    }

    #[test]
    fn zero_order_is_rejected() {
        let mut d = draft();
        d.order = 0;
        assert_eq!(d.validate().unwrap_err(), LessonError::InvalidOrder);
    }

    #[test]
    fn lesson_round_trips_through_authored_json() {
        let lesson = draft().validate().unwrap();
        let json = serde_json::to_string(&lesson).unwrap();
        assert!(json.contains("\"sectionId\":\"s-1\""));
        let back: Lesson = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lesson);
    }

    #[test]
    fn invalid_json_content_is_rejected_on_load() {
        let json = r#"{
            "id": "l", "sectionId": "s", "title": "T", "estimatedMinutes": 5, "order": 1,
            "content": {
                "introduction": { "id": "i", "type": "narration", "text": "x" },
                "teaching": [],
                "application": { "id": "a", "type": "reflection", "text": "x" },
                "reflection": { "id": "r", "type": "reflection", "text": "x" }
            }
        }"#;
        let err = serde_json::from_str::<Lesson>(json).unwrap_err();
        assert!(err.to_string().contains("teaching"));
    }
}
