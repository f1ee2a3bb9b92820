use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    answers::{AnswerField, AnswerRecord},
    auth::{AuthState, AuthUser},
    error::Result,
    history::InMemoryHistoryStore,
    intake::QuestionnaireAnswers,
    quiz::QuizAnswers,
    wizard::Wizard,
};

/// Everything one client has going on: both wizards, what they produced and
/// the analysis history
#[derive(Debug, Clone)]
pub struct FlowSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub intake: Wizard<QuestionnaireAnswers>,
    pub quiz: Wizard<QuizAnswers>,
    /// Baby profile from the last completed intake questionnaire
    pub baby: Option<QuestionnaireAnswers>,
    /// Answers of the last completed quiz, input of the suggestion rules
    pub last_quiz: Option<QuizAnswers>,
    pub history: InMemoryHistoryStore,
    pub auth: AuthState,
}

impl FlowSession {
    pub fn new(auth: AuthState) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), auth)
    }

    pub fn with_id(id: impl Into<String>, auth: AuthState) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            intake: Wizard::new(),
            quiz: Wizard::new(),
            baby: None,
            last_quiz: None,
            history: InMemoryHistoryStore::new(),
            auth,
        }
    }

    /// Client view of the session. Consumes the wizards' step-changed signals,
    /// so each step change is reported once.
    pub fn snapshot(&mut self) -> FlowSnapshot {
        FlowSnapshot {
            id: self.id.clone(),
            created_at: self.created_at,
            user: self.auth.current(),
            intake: WizardView::of(&mut self.intake),
            quiz: WizardView::of(&mut self.quiz),
            baby: self.baby.clone(),
            quiz_completed: self.last_quiz.is_some(),
        }
    }
}

/// Serializable picture of a wizard for clients
#[derive(Debug, Clone, Serialize)]
pub struct WizardView<R: Serialize> {
    pub current_step: usize,
    pub total_steps: usize,
    pub field: &'static str,
    pub question: &'static str,
    pub options: &'static [&'static str],
    pub answers: R,
    /// Step just entered, present once per step change
    pub step_changed: Option<usize>,
}

impl<R: AnswerRecord + Serialize> WizardView<R> {
    pub fn of(wizard: &mut Wizard<R>) -> Self {
        let question = wizard.current_question();
        Self {
            current_step: wizard.current_step(),
            total_steps: wizard.total_steps(),
            field: question.field.name(),
            question: question.prompt,
            options: question.options,
            answers: wizard.answers().clone(),
            step_changed: wizard.take_step_changed(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub user: Option<AuthUser>,
    pub intake: WizardView<QuestionnaireAnswers>,
    pub quiz: WizardView<QuizAnswers>,
    pub baby: Option<QuestionnaireAnswers>,
    pub quiz_completed: bool,
}

/// Trait for storing and retrieving flow sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: FlowSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<FlowSession>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, FlowSession>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: FlowSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<FlowSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
