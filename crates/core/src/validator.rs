use serde::Serialize;

use crate::error::EngineError;
use crate::model::{DialogueStep, OptionId};

/// Result of checking a chosen option against its step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub option_id: OptionId,
    /// `None` for ungraded steps, where no option is marked correct.
    pub is_correct: Option<bool>,
    pub response: String,
}

/// Classify `option_id` on `step`.
///
/// # Errors
///
/// Returns `EngineError::StepNotGraded` for steps without options and
/// `EngineError::OptionNotFound` if the step does not offer `option_id`.
pub fn validate(step: &DialogueStep, option_id: &OptionId) -> Result<Feedback, EngineError> {
    if !step.has_options() {
        return Err(EngineError::StepNotGraded {
            step: step.id().clone(),
        });
    }

    let option = step
        .option(option_id)
        .ok_or_else(|| EngineError::OptionNotFound {
            step: step.id().clone(),
            option: option_id.clone(),
        })?;

    let is_correct = step
        .is_graded()
        .then(|| option.is_correct.unwrap_or(false));

    Ok(Feedback {
        option_id: option.id.clone(),
        is_correct,
        response: option.response.clone(),
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
