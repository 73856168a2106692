#![forbid(unsafe_code)]

pub mod error;
pub mod lessons;
pub mod retry;

pub use lesson_core::Clock;

pub use error::SessionError;
pub use lessons::{
    AdvanceResult, AnswerResult, CompletionReport, HelpView, LessonListItem, LessonSessionService,
    LessonStatusView, OptionHelp, OptionView, StepView,
};
pub use retry::RetryConfig;
