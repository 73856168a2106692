//! Lesson sessions: start, answer, advance, complete, and section overviews.

mod locks;
mod view;
mod workflow;

pub use view::{
    CompletionReport, HelpView, LessonListItem, LessonStatusView, OptionHelp, OptionView, StepView,
};
pub use workflow::{AdvanceResult, AnswerResult, LessonSessionService};
