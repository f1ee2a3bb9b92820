//! Nine-question quiz asked after a cry to tailor the suggestions.

use serde::{Deserialize, Serialize};

use crate::answers::{AnswerField, AnswerRecord, Question};

pub const YES: &str = "Sim";
pub const NO: &str = "Não";
pub const NIGHT: &str = "Noite";
pub const DAWN: &str = "Madrugada";
pub const OVER_30_MINUTES: &str = "Mais de 30 minutos";
pub const NO_CHANGE: &str = "Nenhuma mudança";
pub const DISCOMFORT_SIGNS: &str = "Sim (ex.: erupção na pele, febre, cólicas)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizField {
    TimeOfDay,
    Duration,
    FedRecently,
    DiaperChanged,
    EnvironmentComfortable,
    RecentChange,
    PhysicalDiscomfort,
    SleepHabits,
    StrangerContact,
}

impl AnswerField for QuizField {
    fn name(self) -> &'static str {
        match self {
            QuizField::TimeOfDay => "time_of_day",
            QuizField::Duration => "duration",
            QuizField::FedRecently => "fed_recently",
            QuizField::DiaperChanged => "diaper_changed",
            QuizField::EnvironmentComfortable => "environment_comfortable",
            QuizField::RecentChange => "recent_change",
            QuizField::PhysicalDiscomfort => "physical_discomfort",
            QuizField::SleepHabits => "sleep_habits",
            QuizField::StrangerContact => "stranger_contact",
        }
    }
}

const YES_NO: &[&str] = &[YES, NO];

pub static QUIZ_QUESTIONS: [Question<QuizField>; 9] = [
    Question {
        field: QuizField::TimeOfDay,
        prompt: "Em que horário o choro ocorreu?",
        options: &["Manhã", "Tarde", NIGHT, DAWN],
    },
    Question {
        field: QuizField::Duration,
        prompt: "Quanto tempo durou o choro?",
        options: &[
            "Menos de 5 minutos",
            "5-15 minutos",
            "15-30 minutos",
            OVER_30_MINUTES,
        ],
    },
    Question {
        field: QuizField::FedRecently,
        prompt: "O bebê se alimentou recentemente?",
        options: YES_NO,
    },
    Question {
        field: QuizField::DiaperChanged,
        prompt: "O bebê passou por alguma troca de fralda nos últimos 30 minutos?",
        options: YES_NO,
    },
    Question {
        field: QuizField::EnvironmentComfortable,
        prompt: "O ambiente está confortável (temperatura, barulho, iluminação)?",
        options: YES_NO,
    },
    Question {
        field: QuizField::RecentChange,
        prompt: "Há alguma mudança recente no ambiente do bebê?",
        options: &[
            "Mudança de casa",
            "Novo membro da família",
            "Viagem",
            NO_CHANGE,
        ],
    },
    Question {
        field: QuizField::PhysicalDiscomfort,
        prompt: "O bebê está com algum sinal de desconforto físico?",
        options: &[DISCOMFORT_SIGNS, NO],
    },
    Question {
        field: QuizField::SleepHabits,
        prompt: "Seu bebê tem hábitos de sono regulares?",
        options: YES_NO,
    },
    Question {
        field: QuizField::StrangerContact,
        prompt: "O bebê teve contato com estranhos ou situações novas recentemente?",
        options: YES_NO,
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswers {
    pub time_of_day: Option<String>,
    pub duration: Option<String>,
    pub fed_recently: Option<String>,
    pub diaper_changed: Option<String>,
    pub environment_comfortable: Option<String>,
    pub recent_change: Option<String>,
    pub physical_discomfort: Option<String>,
    pub sleep_habits: Option<String>,
    pub stranger_contact: Option<String>,
}

impl QuizAnswers {
    fn slot_mut(&mut self, field: QuizField) -> &mut Option<String> {
        match field {
            QuizField::TimeOfDay => &mut self.time_of_day,
            QuizField::Duration => &mut self.duration,
            QuizField::FedRecently => &mut self.fed_recently,
            QuizField::DiaperChanged => &mut self.diaper_changed,
            QuizField::EnvironmentComfortable => &mut self.environment_comfortable,
            QuizField::RecentChange => &mut self.recent_change,
            QuizField::PhysicalDiscomfort => &mut self.physical_discomfort,
            QuizField::SleepHabits => &mut self.sleep_habits,
            QuizField::StrangerContact => &mut self.stranger_contact,
        }
    }

    /// Answers where nothing points at a cause: fed, clean, comfortable, no
    /// change, no discomfort, regular sleep and no strangers.
    pub fn all_clear() -> Self {
        Self {
            time_of_day: Some("Manhã".to_string()),
            duration: Some("Menos de 5 minutos".to_string()),
            fed_recently: Some(YES.to_string()),
            diaper_changed: Some(YES.to_string()),
            environment_comfortable: Some(YES.to_string()),
            recent_change: Some(NO_CHANGE.to_string()),
            physical_discomfort: Some(NO.to_string()),
            sleep_habits: Some(YES.to_string()),
            stranger_contact: Some(NO.to_string()),
        }
    }
}

impl AnswerRecord for QuizAnswers {
    type Field = QuizField;

    fn questions() -> &'static [Question<QuizField>] {
        &QUIZ_QUESTIONS
    }

    fn set(&mut self, field: QuizField, value: String) {
        *self.slot_mut(field) = Some(value);
    }

    fn get(&self, field: QuizField) -> Option<&str> {
        match field {
            QuizField::TimeOfDay => self.time_of_day.as_deref(),
            QuizField::Duration => self.duration.as_deref(),
            QuizField::FedRecently => self.fed_recently.as_deref(),
            QuizField::DiaperChanged => self.diaper_changed.as_deref(),
            QuizField::EnvironmentComfortable => self.environment_comfortable.as_deref(),
            QuizField::RecentChange => self.recent_change.as_deref(),
            QuizField::PhysicalDiscomfort => self.physical_discomfort.as_deref(),
            QuizField::SleepHabits => self.sleep_habits.as_deref(),
            QuizField::StrangerContact => self.stranger_contact.as_deref(),
        }
    }
}
