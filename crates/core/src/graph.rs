//! Dialogue graph resolution over a lesson's steps.
//!
//! Steps live in an arena ordered along the default linear path
//! (introduction, teaching..., application, reflection) with an id index on
//! top. Branches are plain step ids, resolved through the index.

use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::model::{DialogueStep, LessonContent, LessonError, OptionId, StepId, StepKind};

/// Indexed, immutable view of a lesson's dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueGraph {
    steps: Vec<DialogueStep>,
    index: HashMap<StepId, usize>,
}

impl DialogueGraph {
    /// Validate authored content and index it.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` for empty teaching, duplicate ids, malformed
    /// questions, and follow-ups that point outside the lesson or not
    /// strictly forward along the linear path.
    pub(crate) fn build(content: LessonContent) -> Result<Self, LessonError> {
        if content.teaching.is_empty() {
            return Err(LessonError::EmptyTeaching);
        }

        let mut steps = Vec::with_capacity(content.teaching.len() + 3);
        steps.push(content.introduction);
        steps.extend(content.teaching);
        steps.push(content.application);
        steps.push(content.reflection);

        let mut index = HashMap::with_capacity(steps.len());
        for (pos, step) in steps.iter().enumerate() {
            if index.insert(step.id().clone(), pos).is_some() {
                return Err(LessonError::DuplicateStep {
                    step: step.id().clone(),
                });
            }
        }

        for (pos, step) in steps.iter().enumerate() {
            check_options(step, pos, &index)?;
        }

        Ok(Self { steps, index })
    }

    /// Look up a step by id.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StepNotFound` if the lesson has no such step.
    pub fn resolve_step(&self, step_id: &StepId) -> Result<&DialogueStep, EngineError> {
        self.position(step_id).map(|pos| &self.steps[pos])
    }

    /// Next step on the linear path, or `None` at the reflection step.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StepNotFound` if the lesson has no such step.
    pub fn default_successor(&self, step_id: &StepId) -> Result<Option<&StepId>, EngineError> {
        let pos = self.position(step_id)?;
        Ok(self.steps.get(pos + 1).map(DialogueStep::id))
    }

    /// Target of choosing `option_id` on `step_id`.
    ///
    /// The option's follow-up wins over the linear successor.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StepNotFound` for an unknown step and
    /// `EngineError::OptionNotFound` if the step does not offer the option.
    pub fn resolve_branch(
        &self,
        step_id: &StepId,
        option_id: &OptionId,
    ) -> Result<Option<&StepId>, EngineError> {
        let step = self.resolve_step(step_id)?;
        let option = step.option(option_id).ok_or_else(|| EngineError::OptionNotFound {
            step: step_id.clone(),
            option: option_id.clone(),
        })?;

        match &option.follow_up {
            // Follow-ups are checked against the index when the graph is built.
            Some(target) => self.resolve_step(target).map(|s| Some(s.id())),
            None => self.default_successor(step_id),
        }
    }

    /// Zero-based position of a step along the linear path.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StepNotFound` if the lesson has no such step.
    pub fn position(&self, step_id: &StepId) -> Result<usize, EngineError> {
        self.index
            .get(step_id)
            .copied()
            .ok_or_else(|| EngineError::StepNotFound {
                step: step_id.clone(),
            })
    }

    /// Number of steps on the linear path.
    #[must_use]
    pub fn linear_len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn steps(&self) -> &[DialogueStep] {
        &self.steps
    }

    #[must_use]
    pub fn contains(&self, step_id: &StepId) -> bool {
        self.index.contains_key(step_id)
    }

    /// The introduction step.
    #[must_use]
    pub fn entry(&self) -> &DialogueStep {
        &self.steps[0]
    }

    /// The reflection step, end of the lesson.
    #[must_use]
    pub fn terminal(&self) -> &DialogueStep {
        &self.steps[self.steps.len() - 1]
    }

    #[must_use]
    pub fn teaching(&self) -> &[DialogueStep] {
        &self.steps[1..self.steps.len() - 2]
    }

    #[must_use]
    pub fn application(&self) -> &DialogueStep {
        &self.steps[self.steps.len() - 2]
    }

    #[must_use]
    pub fn is_terminal(&self, step_id: &StepId) -> bool {
        self.terminal().id() == step_id
    }

    pub(crate) fn into_content(self) -> LessonContent {
        let mut steps = self.steps;
        let reflection = steps.pop();
        let application = steps.pop();
        let mut rest = steps.into_iter();
        let introduction = rest.next();
        match (introduction, application, reflection) {
            (Some(introduction), Some(application), Some(reflection)) => LessonContent {
                introduction,
                teaching: rest.collect(),
                application,
                reflection,
            },
            _ => unreachable!("graph always holds at least four steps"),
        }
    }
}

fn check_options(
    step: &DialogueStep,
    pos: usize,
    index: &HashMap<StepId, usize>,
) -> Result<(), LessonError> {
    let StepKind::Question { options, .. } = step.kind() else {
        return Ok(());
    };
    if options.is_empty() {
        return Err(LessonError::EmptyOptions {
            step: step.id().clone(),
        });
    }

    let mut seen = HashSet::with_capacity(options.len());
    let mut correct = 0_usize;
    for option in options {
        if !seen.insert(&option.id) {
            return Err(LessonError::DuplicateOption {
                step: step.id().clone(),
                option: option.id.clone(),
            });
        }
        if option.is_correct == Some(true) {
            correct += 1;
        }
        if let Some(target) = &option.follow_up {
            // Forward-only follow-ups keep every walk finite.
            match index.get(target) {
                None => {
                    return Err(LessonError::UnknownFollowUp {
                        step: step.id().clone(),
                        option: option.id.clone(),
                        target: target.clone(),
                    });
                }
                Some(&to) if to <= pos => {
                    return Err(LessonError::BackwardFollowUp {
                        step: step.id().clone(),
                        option: option.id.clone(),
                        target: target.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    if correct > 1 {
        return Err(LessonError::MultipleCorrect {
            step: step.id().clone(),
        });
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
