use serde::{Deserialize, Serialize};

use crate::model::ids::{OptionId, StepId};
use crate::model::lesson::LessonError;

//
// ─── OPTION ────────────────────────────────────────────────────────────────────
//

/// A selectable choice attached to a question step.
///
/// `response` is the feedback shown after the option is picked. `follow_up`
/// overrides the default successor when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueOption {
    pub id: OptionId,
    pub text: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

impl DialogueOption {
    #[must_use]
    pub fn new(id: impl Into<OptionId>, text: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            response: response.into(),
            follow_up: None,
            is_correct: None,
        }
    }

    #[must_use]
    pub fn correct(mut self, is_correct: bool) -> Self {
        self.is_correct = Some(is_correct);
        self
    }

    #[must_use]
    pub fn with_follow_up(mut self, target: impl Into<StepId>) -> Self {
        self.follow_up = Some(target.into());
        self
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// Authored step type tag, as it appears in lesson content files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Narration,
    Question,
    Scripture,
    Reflection,
}

/// Shape-specific payload of a dialogue step.
///
/// Only `Question` carries options, so informational steps cannot hold graded
/// choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Narration,
    Scripture {
        scripture: String,
    },
    Reflection,
    Question {
        options: Vec<DialogueOption>,
        help_available: bool,
        scripture: Option<String>,
    },
}

/// One node of a lesson's dialogue.
///
/// `authored_type` is the `type` tag the step was written with. It only
/// matters for writing the step back out; behavior follows `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AuthoredStep", into = "AuthoredStep")]
pub struct DialogueStep {
    id: StepId,
    text: String,
    kind: StepKind,
    authored_type: StepType,
}

impl DialogueStep {
    #[must_use]
    pub fn new(id: impl Into<StepId>, text: impl Into<String>, kind: StepKind) -> Self {
        let authored_type = type_of(&kind);
        Self {
            id: id.into(),
            text: text.into(),
            kind,
            authored_type,
        }
    }

    #[must_use]
    pub fn narration(id: impl Into<StepId>, text: impl Into<String>) -> Self {
        Self::new(id, text, StepKind::Narration)
    }

    #[must_use]
    pub fn scripture(
        id: impl Into<StepId>,
        text: impl Into<String>,
        scripture: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            text,
            StepKind::Scripture {
                scripture: scripture.into(),
            },
        )
    }

    #[must_use]
    pub fn reflection(id: impl Into<StepId>, text: impl Into<String>) -> Self {
        Self::new(id, text, StepKind::Reflection)
    }

    #[must_use]
    pub fn question(
        id: impl Into<StepId>,
        text: impl Into<String>,
        options: Vec<DialogueOption>,
        help_available: bool,
    ) -> Self {
        Self::new(
            id,
            text,
            StepKind::Question {
                options,
                help_available,
                scripture: None,
            },
        )
    }

    #[must_use]
    pub fn id(&self) -> &StepId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    /// Effective type, derived from the step's shape.
    #[must_use]
    pub fn step_type(&self) -> StepType {
        type_of(&self.kind)
    }

    /// Type tag as written in the lesson content.
    #[must_use]
    pub fn authored_type(&self) -> StepType {
        self.authored_type
    }

    /// Options of a question step; empty for informational steps.
    #[must_use]
    pub fn options(&self) -> &[DialogueOption] {
        match &self.kind {
            StepKind::Question { options, .. } => options,
            _ => &[],
        }
    }

    #[must_use]
    pub fn has_options(&self) -> bool {
        !self.options().is_empty()
    }

    #[must_use]
    pub fn option(&self, option_id: &OptionId) -> Option<&DialogueOption> {
        self.options().iter().find(|o| &o.id == option_id)
    }

    #[must_use]
    pub fn scripture_text(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Scripture { scripture } => Some(scripture),
            StepKind::Question { scripture, .. } => scripture.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn help_available(&self) -> bool {
        matches!(
            self.kind,
            StepKind::Question {
                help_available: true,
                ..
            }
        )
    }

    /// True when at least one option is marked correct.
    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.options().iter().any(|o| o.is_correct == Some(true))
    }
}

fn type_of(kind: &StepKind) -> StepType {
    match kind {
        StepKind::Narration => StepType::Narration,
        StepKind::Scripture { .. } => StepType::Scripture,
        StepKind::Reflection => StepType::Reflection,
        StepKind::Question { .. } => StepType::Question,
    }
}

//
// ─── AUTHORED SHAPE ────────────────────────────────────────────────────────────
//

/// Flat step shape used by lesson content files.
///
/// Any step that carries a non-empty option list behaves as a question,
/// whatever its authored `type`. Authored content uses option-bearing
/// narration for acknowledgement prompts. The authored `type` is kept and
/// written back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoredStep {
    pub id: StepId,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<DialogueOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_available: Option<bool>,
}

impl TryFrom<AuthoredStep> for DialogueStep {
    type Error = LessonError;

    fn try_from(raw: AuthoredStep) -> Result<Self, Self::Error> {
        let options = raw.options.unwrap_or_default();
        if options.is_empty() && raw.help_available == Some(true) {
            return Err(LessonError::HelpWithoutOptions { step: raw.id });
        }
        let kind = if options.is_empty() {
            match (raw.step_type, raw.scripture) {
                (StepType::Scripture, scripture) => StepKind::Scripture {
                    scripture: scripture.unwrap_or_default(),
                },
                (StepType::Reflection, _) => StepKind::Reflection,
                (StepType::Narration | StepType::Question, _) => {
                    // A question without options carries nothing to answer.
                    StepKind::Narration
                }
            }
        } else {
            StepKind::Question {
                options,
                help_available: raw.help_available.unwrap_or(false),
                scripture: raw.scripture,
            }
        };

        Ok(Self {
            id: raw.id,
            text: raw.text,
            kind,
            authored_type: raw.step_type,
        })
    }
}

impl From<DialogueStep> for AuthoredStep {
    fn from(step: DialogueStep) -> Self {
        let step_type = step.authored_type;
        let (scripture, options, help_available) = match step.kind {
            StepKind::Narration | StepKind::Reflection => (None, None, None),
            StepKind::Scripture { scripture } => (Some(scripture), None, None),
            StepKind::Question {
                options,
                help_available,
                scripture,
            } => (scripture, Some(options), help_available.then_some(true)),
        };

        Self {
            id: step.id,
            step_type,
            text: step.text,
            scripture,
            options,
            help_available,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
