use cry_flow::{
    AuthUser, BackOutcome, StepOutcome, Suggestions,
    records::{BabyRow, CryAnalysisRow, ProfileRow, QuizAnswerRow},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordingQuery {
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StepResponse<R> {
    pub session_id: String,
    /// "advanced" or "completed"
    pub status: &'static str,
    pub current_step: usize,
    pub completed: Option<R>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

impl<R> StepResponse<R> {
    pub fn from_outcome(session_id: &str, outcome: StepOutcome<R>) -> Self {
        let (status, current_step, completed) = match outcome {
            StepOutcome::Advanced { step } => ("advanced", step, None),
            StepOutcome::Completed(answers) => ("completed", 1, Some(answers)),
        };
        Self {
            session_id: session_id.to_string(),
            status,
            current_step,
            completed,
            suggestions: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Option<Suggestions>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct BackResponse {
    pub session_id: String,
    /// "stepped" or "exited"
    pub status: &'static str,
    pub current_step: usize,
}

impl BackResponse {
    pub fn from_outcome(session_id: &str, outcome: BackOutcome) -> Self {
        let (status, current_step) = match outcome {
            BackOutcome::Stepped { step } => ("stepped", step),
            BackOutcome::Exited => ("exited", 1),
        };
        Self {
            session_id: session_id.to_string(),
            status,
            current_step,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub session_id: String,
    pub recording_id: String,
    pub kind: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub session_id: Option<String>,
    pub user: Option<AuthUser>,
}

/// Rows as they would be written to the hosted tables
#[derive(Debug, Serialize)]
pub struct RecordsExport {
    pub profile: Option<ProfileRow>,
    pub baby: Option<BabyRow>,
    pub cry_analyses: Vec<CryAnalysisRow>,
    pub quiz_answers: Vec<QuizAnswerRow>,
}
