use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use lesson_core::model::{
    DialogueStep, Lesson, LessonId, LessonState, OptionId, SessionStatus, StepId, StepType,
};

/// Choice as shown to the learner. Correctness and responses stay hidden
/// until the option is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
}

/// Presentation-agnostic snapshot of the learner's current step.
///
/// Carries no formatting; the UI decides how to render each step type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub lesson_id: LessonId,
    pub step_id: StepId,
    pub step_type: StepType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripture: Option<String>,
    pub options: Vec<OptionView>,
    pub help_available: bool,
    pub help_used: bool,
    /// Option picked on an earlier visit of this step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<OptionId>,
    /// Zero-based position on the linear path.
    pub position: usize,
    pub total_steps: usize,
    pub completed: bool,
}

impl StepView {
    pub(crate) fn new(lesson: &Lesson, step: &DialogueStep, state: &LessonState) -> Self {
        let graph = lesson.graph();
        Self {
            lesson_id: lesson.id().clone(),
            step_id: step.id().clone(),
            step_type: step.step_type(),
            text: step.text().to_string(),
            scripture: step.scripture_text().map(ToString::to_string),
            options: step
                .options()
                .iter()
                .map(|o| OptionView {
                    id: o.id.clone(),
                    text: o.text.clone(),
                })
                .collect(),
            help_available: step.help_available(),
            help_used: state.help_used().contains(step.id()),
            selected: state.response_for(step.id()).cloned(),
            position: graph.position(step.id()).unwrap_or_default(),
            total_steps: graph.linear_len(),
            completed: state.is_completed(),
        }
    }

    #[must_use]
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }
}

/// Authored explanation attached to one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionHelp {
    pub option_id: OptionId,
    pub text: String,
    pub response: String,
}

/// What the learner sees after asking for help on a question.
///
/// Help opens up the option responses, so it reveals what `StepView` keeps
/// hidden. The step itself is unchanged apart from `help_used`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpView {
    pub step: StepView,
    pub elaboration: Vec<OptionHelp>,
}

impl HelpView {
    pub(crate) fn new(lesson: &Lesson, step: &DialogueStep, state: &LessonState) -> Self {
        Self {
            step: StepView::new(lesson, step, state),
            elaboration: step
                .options()
                .iter()
                .map(|o| OptionHelp {
                    option_id: o.id.clone(),
                    text: o.text.clone(),
                    response: o.response.clone(),
                })
                .collect(),
        }
    }
}

/// Row of a section listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonListItem {
    pub lesson_id: LessonId,
    pub title: String,
    pub order: u32,
    pub estimated_minutes: u32,
    pub unlocked: bool,
    pub status: LessonStatusView,
    #[serde(with = "millis")]
    pub time_spent: Duration,
}

/// `SessionStatus` flattened for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatusView {
    NotStarted,
    InProgress,
    Completed,
}

impl From<&SessionStatus> for LessonStatusView {
    fn from(status: &SessionStatus) -> Self {
        match status {
            SessionStatus::NotStarted => Self::NotStarted,
            SessionStatus::InProgress(_) => Self::InProgress,
            SessionStatus::Completed => Self::Completed,
        }
    }
}

/// Outcome of finishing a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub lesson_id: LessonId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub completed_at: DateTime<Utc>,
    #[serde(with = "millis")]
    pub time_spent: Duration,
    /// Lessons that were locked before this completion and are open now.
    pub newly_unlocked: Vec<LessonId>,
    /// Next lesson of the section by order, locked or not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_lesson: Option<LessonId>,
}

mod millis {
    use chrono::Duration;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }
}
