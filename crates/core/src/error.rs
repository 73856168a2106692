use thiserror::Error;

use crate::model::{LessonId, OptionId, StepId};

/// Errors raised while traversing a lesson or updating the progress ledger.
///
/// All variants describe caller misuse (stale step ids, answering an
/// informational step, ...) and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("step {step} does not exist in this lesson")]
    StepNotFound { step: StepId },

    #[error("option {option} does not exist on step {step}")]
    OptionNotFound { step: StepId, option: OptionId },

    #[error("step {step} has no options to answer")]
    StepNotGraded { step: StepId },

    #[error("help is not available for step {step}")]
    HelpUnavailable { step: StepId },

    #[error("lesson {lesson} has not been started")]
    LessonNotInProgress { lesson: LessonId },

    #[error("step {step} expects an answer before moving on")]
    AnswerRequired { step: StepId },

    #[error("lesson {lesson} is already completed")]
    AlreadyCompleted { lesson: LessonId },

    #[error("lesson {lesson} has not reached its reflection yet")]
    NotFinished { lesson: LessonId },
}
