//! FlowRunner – loads a flow session, applies exactly **one** transition and
//! persists the session back to storage.
//!
//! Every client action (answer, back, record) is one roundtrip, so the
//! load → transition → save sequence lives here instead of in each handler.
//! Callers that need several transitions in a row can work on a
//! [`FlowSession`] directly and save it once at the end.

use std::sync::Arc;
use tracing::info;

use crate::{
    analysis::{Analysis, AnalysisKind, AnalysisSettings, provider_for},
    answers::{AnswerRecord, validate_option},
    auth::AuthState,
    capture::AudioCapture,
    error::{FlowError, Result},
    history::HistoryStore,
    intake::QuestionnaireAnswers,
    quiz::QuizAnswers,
    session::RecordingSession,
    storage::{FlowSession, FlowSnapshot, SessionStorage},
    suggestions::{self, Suggestions},
    wizard::{BackOutcome, StepOutcome},
};

#[derive(Clone)]
pub struct FlowRunner {
    storage: Arc<dyn SessionStorage>,
    settings: AnalysisSettings,
}

impl FlowRunner {
    pub fn new(storage: Arc<dyn SessionStorage>, settings: AnalysisSettings) -> Self {
        Self { storage, settings }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub async fn create(&self, auth: AuthState) -> Result<FlowSession> {
        let session = FlowSession::new(auth);
        info!(session_id = %session.id, "Flow session created");
        self.storage.save(session.clone()).await?;
        Ok(session)
    }

    pub async fn load(&self, session_id: &str) -> Result<FlowSession> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }

    /// Load, apply `transition`, save. Nothing is saved if the transition fails.
    pub async fn update<T, F>(&self, session_id: &str, transition: F) -> Result<T>
    where
        F: FnOnce(&mut FlowSession) -> Result<T> + Send,
        T: Send,
    {
        let mut session = self.load(session_id).await?;
        let output = transition(&mut session)?;
        self.storage.save(session).await?;
        Ok(output)
    }

    /// Client view of the session; reports each wizard step change once
    pub async fn snapshot(&self, session_id: &str) -> Result<FlowSnapshot> {
        self.update(session_id, |session| Ok(session.snapshot())).await
    }

    /// Answer the current intake question. Completion stores the baby profile.
    pub async fn answer_intake(
        &self,
        session_id: &str,
        value: &str,
    ) -> Result<StepOutcome<QuestionnaireAnswers>> {
        self.update(session_id, |session| {
            let field = session.intake.current_question().field;
            validate_option::<QuestionnaireAnswers>(field, value)?;
            let outcome = session.intake.answer(value);
            if let StepOutcome::Completed(answers) = &outcome {
                info!(session_id = %session.id, "Intake questionnaire completed");
                session.baby = Some(answers.clone());
            }
            Ok(outcome)
        })
        .await
    }

    pub async fn back_intake(&self, session_id: &str) -> Result<BackOutcome> {
        self.update(session_id, |session| Ok(session.intake.back())).await
    }

    /// Answer the current quiz question. Completion keeps the answers for the
    /// suggestion rules and any detailed recording that follows.
    pub async fn answer_quiz(
        &self,
        session_id: &str,
        value: &str,
    ) -> Result<StepOutcome<QuizAnswers>> {
        self.update(session_id, |session| {
            let field = session.quiz.current_question().field;
            validate_option::<QuizAnswers>(field, value)?;
            let outcome = session.quiz.answer(value);
            if let StepOutcome::Completed(answers) = &outcome {
                info!(session_id = %session.id, "Quiz completed");
                session.last_quiz = Some(answers.clone());
            }
            Ok(outcome)
        })
        .await
    }

    pub async fn back_quiz(&self, session_id: &str) -> Result<BackOutcome> {
        self.update(session_id, |session| Ok(session.quiz.back())).await
    }

    /// Suggestions for the last completed quiz, if any
    pub async fn suggestions(&self, session_id: &str) -> Result<Option<Suggestions>> {
        let session = self.load(session_id).await?;
        Ok(session.last_quiz.as_ref().map(suggestions::generate))
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<Analysis>> {
        let session = self.load(session_id).await?;
        Ok(session.history.list().await)
    }

    /// Build a recording session that appends to this flow session's history.
    ///
    /// Detailed sessions carry the answers of the last completed quiz.
    pub async fn recording_session(
        &self,
        session_id: &str,
        kind: AnalysisKind,
        capture: Box<dyn AudioCapture>,
    ) -> Result<RecordingSession> {
        let session = self.load(session_id).await?;
        let provider = provider_for(kind, &self.settings);
        let history: Arc<dyn HistoryStore> = Arc::new(session.history.clone());

        let mut recording = RecordingSession::new(capture, provider, history);
        if kind == AnalysisKind::Detailed
            && let Some(answers) = &session.last_quiz
        {
            recording = recording.with_answers(answers.answered_pairs());
        }
        Ok(recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DETAILED_LATENCY;
    use crate::auth::{AccountRegistry, AuthProvider, InMemoryAuthProvider};
    use crate::capture::{BufferedCapture, DEFAULT_MIME_TYPE};
    use crate::session::AnalysisOutcome;
    use crate::storage::InMemorySessionStorage;
    use crate::suggestions::DEFAULT_HEALTH;

    fn runner() -> FlowRunner {
        FlowRunner::new(
            Arc::new(InMemorySessionStorage::new()),
            AnalysisSettings::default(),
        )
    }

    fn signed_out() -> AuthState {
        InMemoryAuthProvider::new(AccountRegistry::new()).subscribe()
    }

    #[tokio::test]
    async fn intake_answers_are_validated_and_persisted() {
        let runner = runner();
        let session = runner.create(signed_out()).await.unwrap();

        let err = runner.answer_intake(&session.id, "Febre").await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidOption { .. }));
        assert_eq!(runner.load(&session.id).await.unwrap().intake.current_step(), 1);

        runner.answer_intake(&session.id, "Feminino").await.unwrap();
        runner.answer_intake(&session.id, "1-3 meses").await.unwrap();
        let outcome = runner.answer_intake(&session.id, "Febre").await.unwrap();
        assert!(matches!(outcome, StepOutcome::Completed(_)));

        let stored = runner.load(&session.id).await.unwrap();
        let baby = stored.baby.unwrap();
        assert_eq!(baby.sex.as_deref(), Some("Feminino"));
        assert_eq!(baby.recent_symptom.as_deref(), Some("Febre"));
        assert_eq!(stored.intake.current_step(), 1);
    }

    #[tokio::test]
    async fn backing_out_of_the_quiz_leaves_no_result() {
        let runner = runner();
        let session = runner.create(signed_out()).await.unwrap();
        runner.answer_quiz(&session.id, "Noite").await.unwrap();

        assert_eq!(
            runner.back_quiz(&session.id).await.unwrap(),
            BackOutcome::Stepped { step: 1 }
        );
        assert_eq!(
            runner.back_quiz(&session.id).await.unwrap(),
            BackOutcome::Exited
        );
        assert!(runner.suggestions(&session.id).await.unwrap().is_none());
        let stored = runner.load(&session.id).await.unwrap();
        assert_eq!(stored.quiz.answers(), &QuizAnswers::default());
    }

    #[tokio::test(start_paused = true)]
    async fn completed_quiz_feeds_suggestions_and_detailed_recording() {
        let runner = runner();
        let session = runner.create(signed_out()).await.unwrap();

        let answers = QuizAnswers::all_clear();
        for question in QuizAnswers::questions() {
            let value = answers.get(question.field).unwrap();
            runner.answer_quiz(&session.id, value).await.unwrap();
        }

        let suggestions = runner.suggestions(&session.id).await.unwrap().unwrap();
        assert_eq!(suggestions.health, vec![DEFAULT_HEALTH[0].to_string()]);

        let capture = Box::new(BufferedCapture::preloaded(DEFAULT_MIME_TYPE, vec![9; 8]));
        let mut recording = runner
            .recording_session(&session.id, AnalysisKind::Detailed, capture)
            .await
            .unwrap();
        recording.start_capture().await.unwrap();
        let artifact = recording.stop_capture().await.unwrap();

        let started = tokio::time::Instant::now();
        let outcome = recording.submit_for_analysis(artifact).await.unwrap();
        assert!(started.elapsed() >= DETAILED_LATENCY);
        let AnalysisOutcome::Completed(analysis) = outcome else {
            panic!("expected a completed analysis");
        };
        assert_eq!(analysis.answers.len(), 9);

        let history = runner.history(&session.id).await.unwrap();
        assert_eq!(history, vec![analysis]);
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let runner = runner();
        assert!(matches!(
            runner.answer_quiz("missing", "Noite").await,
            Err(FlowError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_reports_each_step_change_once() {
        let runner = runner();
        let session = runner.create(signed_out()).await.unwrap();

        let first = runner.snapshot(&session.id).await.unwrap();
        assert_eq!(first.intake.step_changed, Some(1));
        assert_eq!(first.quiz.step_changed, Some(1));

        let again = runner.snapshot(&session.id).await.unwrap();
        assert_eq!(again.intake.step_changed, None);

        runner.answer_intake(&session.id, "Masculino").await.unwrap();
        let after = runner.snapshot(&session.id).await.unwrap();
        assert_eq!(after.intake.step_changed, Some(2));
        assert_eq!(after.quiz.step_changed, None);
    }
}
