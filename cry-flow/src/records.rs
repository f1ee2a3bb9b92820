//! Row shapes of the hosted database (profiles, babies, cry_analyses,
//! quiz_answers) and conversions from in-memory values.
//!
//! Writing the rows is the hosted service's job; nothing here talks to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    analysis::Analysis, answers::AnswerRecord, auth::AuthUser, intake::QuestionnaireAnswers,
    quiz::QuizAnswers,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    pub fn from_user(user: &AuthUser) -> Self {
        let now = Utc::now();
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BabyRow {
    pub id: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub sex: Option<String>,
    pub birth_date: Option<String>,
    pub age_range: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BabyRow {
    pub fn from_questionnaire(answers: &QuestionnaireAnswers, user_id: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            name: None,
            sex: answers.sex.clone(),
            birth_date: None,
            age_range: answers.age_range.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryAnalysisRow {
    pub id: String,
    pub user_id: Option<String>,
    pub baby_id: Option<String>,
    pub analysis_type: Option<String>,
    pub cry_type: Option<String>,
    pub confidence_score: Option<i32>,
    pub symptoms: Option<String>,
    /// Recommendations, one per line
    pub recommendations: Option<String>,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CryAnalysisRow {
    pub fn from_analysis(
        analysis: &Analysis,
        user_id: Option<&str>,
        baby: Option<&BabyRow>,
        symptoms: Option<&str>,
    ) -> Self {
        Self {
            id: analysis.id.clone(),
            user_id: user_id.map(str::to_string),
            baby_id: baby.map(|b| b.id.clone()),
            analysis_type: Some(analysis.kind.to_string()),
            cry_type: Some(analysis.diagnosis.clone()),
            confidence_score: Some(i32::from(analysis.confidence)),
            symptoms: symptoms.map(str::to_string),
            recommendations: Some(analysis.recommendations.join("\n")),
            audio_url: None,
            created_at: analysis.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswerRow {
    pub id: String,
    pub analysis_id: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QuizAnswerRow {
    /// One row per answered question, in quiz order
    pub fn from_quiz(answers: &QuizAnswers, analysis_id: Option<&str>) -> Vec<Self> {
        let now = Utc::now();
        answers
            .answered_pairs()
            .into_iter()
            .map(|pair| Self {
                id: Uuid::new_v4().to_string(),
                analysis_id: analysis_id.map(str::to_string),
                question: Some(pair.question),
                answer: Some(pair.answer),
                created_at: now,
            })
            .collect()
    }
}
