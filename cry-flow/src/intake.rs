//! Intake questionnaire asked once when the parent first opens the app.

use serde::{Deserialize, Serialize};

use crate::answers::{AnswerField, AnswerRecord, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeField {
    Sex,
    AgeRange,
    RecentSymptom,
}

impl AnswerField for IntakeField {
    fn name(self) -> &'static str {
        match self {
            IntakeField::Sex => "sex",
            IntakeField::AgeRange => "age_range",
            IntakeField::RecentSymptom => "recent_symptom",
        }
    }
}

pub static INTAKE_QUESTIONS: [Question<IntakeField>; 3] = [
    Question {
        field: IntakeField::Sex,
        prompt: "Qual o sexo do bebê?",
        options: &["Masculino", "Feminino"],
    },
    Question {
        field: IntakeField::AgeRange,
        prompt: "Qual a idade do bebê?",
        options: &[
            "Menos de 1 mês",
            "1-3 meses",
            "4-6 meses",
            "7-12 meses",
            "Mais de 1 ano",
        ],
    },
    Question {
        field: IntakeField::RecentSymptom,
        prompt: "Sintomas recentes?",
        options: &[
            "Febre",
            "Choro excessivo",
            "Falta de apetite",
            "Dificuldade para dormir",
            "Outros",
        ],
    },
];

/// Baby profile collected by the intake questionnaire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireAnswers {
    pub sex: Option<String>,
    pub age_range: Option<String>,
    pub recent_symptom: Option<String>,
}

impl AnswerRecord for QuestionnaireAnswers {
    type Field = IntakeField;

    fn questions() -> &'static [Question<IntakeField>] {
        &INTAKE_QUESTIONS
    }

    fn set(&mut self, field: IntakeField, value: String) {
        let slot = match field {
            IntakeField::Sex => &mut self.sex,
            IntakeField::AgeRange => &mut self.age_range,
            IntakeField::RecentSymptom => &mut self.recent_symptom,
        };
        *slot = Some(value);
    }

    fn get(&self, field: IntakeField) -> Option<&str> {
        match field {
            IntakeField::Sex => self.sex.as_deref(),
            IntakeField::AgeRange => self.age_range.as_deref(),
            IntakeField::RecentSymptom => self.recent_symptom.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::validate_option;

    #[test]
    fn steps_follow_field_order() {
        assert_eq!(QuestionnaireAnswers::total_steps(), 3);
        assert_eq!(
            QuestionnaireAnswers::question_at(2).map(|q| q.field),
            Some(IntakeField::AgeRange)
        );
        assert!(QuestionnaireAnswers::question_at(0).is_none());
        assert!(QuestionnaireAnswers::question_at(4).is_none());
    }

    #[test]
    fn option_membership_is_checked_per_field() {
        assert!(validate_option::<QuestionnaireAnswers>(IntakeField::Sex, "Feminino").is_ok());
        assert!(validate_option::<QuestionnaireAnswers>(IntakeField::Sex, "Febre").is_err());
        assert!(
            validate_option::<QuestionnaireAnswers>(IntakeField::RecentSymptom, "Febre").is_ok()
        );
    }
}
