pub mod analysis;
pub mod answers;
pub mod auth;
pub mod capture;
pub mod error;
pub mod history;
pub mod intake;
pub mod quiz;
pub mod records;
pub mod runner;
pub mod session;
pub mod storage;
pub mod suggestions;
pub mod wizard;

// Re-export commonly used types
pub use analysis::{
    Analysis, AnalysisKind, AnalysisProvider, AnalysisSettings, DetailedAnalysisProvider,
    Finding, UrgentAnalysisProvider, provider_for,
};
pub use answers::{AnswerField, AnswerRecord, AnsweredQuestion, Question, validate_option};
pub use auth::{
    AccountRegistry, AuthProvider, AuthState, AuthUser, FederatedIdentity, InMemoryAuthProvider,
};
pub use capture::{AudioArtifact, AudioCapture, BufferedCapture};
pub use error::{FlowError, Result};
pub use history::{HistoryStore, InMemoryHistoryStore};
pub use intake::{IntakeField, QuestionnaireAnswers};
pub use quiz::{QuizAnswers, QuizField};
pub use runner::FlowRunner;
pub use session::{AbandonHandle, AnalysisOutcome, RecordingSession, RecordingState};
pub use storage::{FlowSession, FlowSnapshot, InMemorySessionStorage, SessionStorage};
pub use suggestions::Suggestions;
pub use wizard::{BackOutcome, StepOutcome, Wizard};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_urgent_flow_end_to_end() {
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(storage.clone(), AnalysisSettings::default());
        let auth = InMemoryAuthProvider::new(AccountRegistry::new());

        let session = runner.create(auth.subscribe()).await.unwrap();
        assert_eq!(storage.len(), 1);

        let mut recording = runner
            .recording_session(
                &session.id,
                AnalysisKind::Urgent,
                Box::new(BufferedCapture::preloaded("audio/webm", vec![1, 2, 3])),
            )
            .await
            .unwrap();
        recording.start_capture().await.unwrap();
        let artifact = recording.stop_capture().await.unwrap();
        let outcome = recording.submit_for_analysis(artifact).await.unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Completed(_)));

        let history = runner.history(&session.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, AnalysisKind::Urgent);
        assert_eq!(history[0].diagnosis, "Desconforto/Dor");
        assert!(history[0].answers.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_wizard_progress() {
        let runner = FlowRunner::new(
            Arc::new(InMemorySessionStorage::new()),
            AnalysisSettings::default(),
        );
        let auth = InMemoryAuthProvider::new(AccountRegistry::new());
        let session = runner.create(auth.subscribe()).await.unwrap();

        runner.answer_intake(&session.id, "Masculino").await.unwrap();
        runner.answer_quiz(&session.id, "Tarde").await.unwrap();

        let snapshot = runner.snapshot(&session.id).await.unwrap();
        assert_eq!(snapshot.intake.current_step, 2);
        assert_eq!(snapshot.intake.field, "age_range");
        assert_eq!(snapshot.quiz.current_step, 2);
        assert_eq!(snapshot.quiz.total_steps, 9);
        assert_eq!(snapshot.quiz.question, "Quanto tempo durou o choro?");
        assert!(!snapshot.quiz_completed);
        assert!(snapshot.user.is_none());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["intake"]["answers"]["sex"], "Masculino");
    }
}
