use tracing::debug;

use crate::answers::{AnswerField, AnswerRecord, Question};

/// Result of answering the current step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<R> {
    /// Moved on to the next step
    Advanced { step: usize },
    /// Last step answered; carries the full record. The wizard is back at step 1.
    Completed(R),
}

/// Result of navigating backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    /// Moved to the previous step, answers kept
    Stepped { step: usize },
    /// Backed out of step 1; answers were discarded
    Exited,
}

/// Linear stepper over the fields of an [`AnswerRecord`].
///
/// Steps are 1-indexed and bounded by `R::total_steps()`. Answering the last
/// step hands the finished record to the caller and rewinds to step 1 with an
/// empty record; backing out of step 1 discards everything.
///
/// Only [`Wizard::answer`] and [`Wizard::back`] move the step, so it always
/// stays within `[1, total_steps]`.
#[derive(Debug, Clone)]
pub struct Wizard<R: AnswerRecord> {
    current_step: usize,
    answers: R,
    step_changed: Option<usize>,
}

impl<R: AnswerRecord> Wizard<R> {
    pub fn new() -> Self {
        Self {
            current_step: 1,
            answers: R::default(),
            step_changed: Some(1),
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        R::total_steps()
    }

    pub fn current_question(&self) -> &'static Question<R::Field> {
        // current_step is kept within [1, total_steps]
        &R::questions()[self.current_step - 1]
    }

    pub fn answers(&self) -> &R {
        &self.answers
    }

    /// Record `value` for the field the current step asks for and advance.
    ///
    /// Option membership is not checked here; callers only offer valid options.
    pub fn answer(&mut self, value: impl Into<String>) -> StepOutcome<R> {
        let field = self.current_question().field;
        let value = value.into();
        debug!(
            step = self.current_step,
            field = field.name(),
            value = %value,
            "Wizard answer"
        );
        self.answers.set(field, value);

        if self.current_step < self.total_steps() {
            self.move_to(self.current_step + 1);
            StepOutcome::Advanced {
                step: self.current_step,
            }
        } else {
            let answers = std::mem::take(&mut self.answers);
            self.move_to(1);
            debug!(total_steps = self.total_steps(), "Wizard completed");
            StepOutcome::Completed(answers)
        }
    }

    pub fn back(&mut self) -> BackOutcome {
        if self.current_step > 1 {
            self.move_to(self.current_step - 1);
            BackOutcome::Stepped {
                step: self.current_step,
            }
        } else {
            debug!("Wizard exited, discarding answers");
            self.answers = R::default();
            self.move_to(1);
            BackOutcome::Exited
        }
    }

    /// One-shot notification of the step now on screen, for entrance animations.
    /// Returns `None` until the next transition once consumed.
    pub fn take_step_changed(&mut self) -> Option<usize> {
        self.step_changed.take()
    }

    fn move_to(&mut self, step: usize) {
        debug!(from = self.current_step, to = step, "Wizard step changed");
        self.current_step = step;
        self.step_changed = Some(step);
    }
}

impl<R: AnswerRecord> Default for Wizard<R> {
    fn default() -> Self {
        Self::new()
    }
}
