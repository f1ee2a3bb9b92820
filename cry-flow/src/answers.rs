use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{FlowError, Result};

/// Field identifier of an answer record
pub trait AnswerField: Copy + Eq + Debug + Send + Sync + 'static {
    /// Stable snake_case name used in logs, JSON and storage rows
    fn name(self) -> &'static str;
}

/// One step of a wizard: the field it fills, the prompt shown and the offered options
#[derive(Debug, Clone, Copy)]
pub struct Question<F> {
    pub field: F,
    pub prompt: &'static str,
    pub options: &'static [&'static str],
}

impl<F> Question<F> {
    pub fn accepts(&self, value: &str) -> bool {
        self.options.contains(&value)
    }
}

/// A fixed record filled one field per wizard step.
///
/// The order of [`AnswerRecord::questions`] is the order of the steps, so the
/// record's field count is also the wizard's step count.
pub trait AnswerRecord: Default + Clone + Debug + Send + Sync + 'static {
    type Field: AnswerField;

    fn questions() -> &'static [Question<Self::Field>];

    fn set(&mut self, field: Self::Field, value: String);

    fn get(&self, field: Self::Field) -> Option<&str>;

    fn total_steps() -> usize {
        Self::questions().len()
    }

    /// Question for a 1-indexed step
    fn question_at(step: usize) -> Option<&'static Question<Self::Field>> {
        step.checked_sub(1).and_then(|idx| Self::questions().get(idx))
    }

    fn question_for(field: Self::Field) -> Option<&'static Question<Self::Field>> {
        Self::questions().iter().find(|q| q.field == field)
    }

    fn is_complete(&self) -> bool {
        Self::questions().iter().all(|q| self.get(q.field).is_some())
    }

    /// Question prompt / answer pairs for every answered field, in step order
    fn answered_pairs(&self) -> Vec<AnsweredQuestion> {
        Self::questions()
            .iter()
            .filter_map(|q| {
                self.get(q.field).map(|answer| AnsweredQuestion {
                    field: q.field.name().to_string(),
                    question: q.prompt.to_string(),
                    answer: answer.to_string(),
                })
            })
            .collect()
    }
}

/// Checks that `value` is one of the options offered for `field`.
///
/// The wizard itself never enforces membership; this is for callers that accept
/// answers from outside, such as the HTTP layer.
pub fn validate_option<R: AnswerRecord>(field: R::Field, value: &str) -> Result<()> {
    match R::question_for(field) {
        Some(question) if question.accepts(value) => Ok(()),
        _ => Err(FlowError::InvalidOption {
            field: field.name().to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub field: String,
    pub question: String,
    pub answer: String,
}
