mod ids;
mod lesson;
mod progress;
mod state;
mod step;

pub use ids::{LessonId, OptionId, ParseIdError, SectionId, StepId, UserId};

pub use lesson::{Lesson, LessonContent, LessonDraft, LessonError};
pub use progress::{LessonProgress, ProgressStats};
pub use state::{LessonState, SessionStatus};
pub use step::{AuthoredStep, DialogueOption, DialogueStep, StepKind, StepType};

