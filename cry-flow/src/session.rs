//! One capture → analysis → result cycle.
//!
//! The urgent and detailed modes run the exact same session; they differ only
//! in the [`AnalysisProvider`] handed in (and the detailed mode attaching the
//! quiz answers that preceded it).

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    analysis::{Analysis, AnalysisKind, AnalysisProvider},
    answers::AnsweredQuestion,
    capture::{AudioArtifact, AudioCapture},
    error::{FlowError, Result},
    history::HistoryStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Capturing,
    Paused,
    Captured,
    Analyzing,
    Completed,
    Abandoned,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Capturing => "capturing",
            RecordingState::Paused => "paused",
            RecordingState::Captured => "captured",
            RecordingState::Analyzing => "analyzing",
            RecordingState::Completed => "completed",
            RecordingState::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a submitted analysis ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Resolved and appended to the history
    Completed(Analysis),
    /// The caller walked away first; nothing was written
    Abandoned,
}

/// Who got to the analysis result first. Both outcomes are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Pending,
    Abandoned,
    Recorded,
}

fn settle(signal: &watch::Sender<Resolution>, outcome: Resolution) -> bool {
    signal.send_if_modified(|current| {
        if *current == Resolution::Pending {
            *current = outcome;
            true
        } else {
            false
        }
    })
}

/// Lets another task abandon the session while its analysis is pending
#[derive(Debug, Clone)]
pub struct AbandonHandle {
    signal: Arc<watch::Sender<Resolution>>,
}

impl AbandonHandle {
    /// Abandon the session. Returns `false` if the result had already been
    /// written to the history, in which case nothing changes.
    pub fn abandon(&self) -> bool {
        settle(&self.signal, Resolution::Abandoned);
        self.is_abandoned()
    }

    pub fn is_abandoned(&self) -> bool {
        *self.signal.borrow() == Resolution::Abandoned
    }
}

async fn wait_abandoned(mut rx: watch::Receiver<Resolution>) {
    loop {
        if *rx.borrow_and_update() == Resolution::Abandoned {
            return;
        }
        if rx.changed().await.is_err() {
            // sender gone, nobody can abandon any more
            std::future::pending::<()>().await;
        }
    }
}

pub struct RecordingSession {
    id: Uuid,
    capture: Box<dyn AudioCapture>,
    provider: Arc<dyn AnalysisProvider>,
    history: Arc<dyn HistoryStore>,
    answers: Vec<AnsweredQuestion>,
    state: RecordingState,
    signal: Arc<watch::Sender<Resolution>>,
}

impl RecordingSession {
    pub fn new(
        capture: Box<dyn AudioCapture>,
        provider: Arc<dyn AnalysisProvider>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let (signal, _) = watch::channel(Resolution::Pending);
        Self {
            id: Uuid::new_v4(),
            capture,
            provider,
            history,
            answers: Vec::new(),
            state: RecordingState::Idle,
            signal: Arc::new(signal),
        }
    }

    /// Attach the quiz answers that led to this recording
    pub fn with_answers(mut self, answers: Vec<AnsweredQuestion>) -> Self {
        self.answers = answers;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> AnalysisKind {
        self.provider.kind()
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn abandon_handle(&self) -> AbandonHandle {
        AbandonHandle {
            signal: self.signal.clone(),
        }
    }

    fn invalid(&self, action: &str) -> FlowError {
        FlowError::InvalidTransition {
            from: self.state.to_string(),
            action: action.to_string(),
        }
    }

    fn unavailable(err: FlowError) -> FlowError {
        match err {
            FlowError::CaptureUnavailable(_) => err,
            other => FlowError::CaptureUnavailable(other.to_string()),
        }
    }

    /// Acquire the audio input and begin recording.
    ///
    /// On failure the session is back to idle and may be started again.
    pub async fn start_capture(&mut self) -> Result<()> {
        if self.state != RecordingState::Idle {
            return Err(self.invalid("start capture"));
        }

        let started = match self.capture.acquire().await {
            Ok(()) => self.capture.start().await,
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            warn!(session_id = %self.id, error = %e, "Could not start capture");
            self.capture.release().await;
            return Err(Self::unavailable(e));
        }

        info!(session_id = %self.id, kind = %self.kind(), "Capture started");
        self.state = RecordingState::Capturing;
        Ok(())
    }

    pub async fn pause_capture(&mut self) -> Result<()> {
        if self.state != RecordingState::Capturing {
            return Err(self.invalid("pause capture"));
        }
        self.capture.pause().await.map_err(Self::unavailable)?;
        self.state = RecordingState::Paused;
        Ok(())
    }

    pub async fn resume_capture(&mut self) -> Result<()> {
        if self.state != RecordingState::Paused {
            return Err(self.invalid("resume capture"));
        }
        self.capture.resume().await.map_err(Self::unavailable)?;
        self.state = RecordingState::Capturing;
        Ok(())
    }

    /// Finish recording and release the input
    pub async fn stop_capture(&mut self) -> Result<AudioArtifact> {
        if !matches!(
            self.state,
            RecordingState::Capturing | RecordingState::Paused
        ) {
            return Err(self.invalid("stop capture"));
        }

        let stopped = self.capture.stop().await;
        self.capture.release().await;
        match stopped {
            Ok(artifact) => {
                info!(
                    session_id = %self.id,
                    artifact_id = %artifact.id,
                    bytes = artifact.len(),
                    "Capture stopped"
                );
                self.state = RecordingState::Captured;
                Ok(artifact)
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Capture failed while stopping");
                self.state = RecordingState::Idle;
                Err(Self::unavailable(e))
            }
        }
    }

    /// Run the analysis and record its result.
    ///
    /// Suspends for the provider's latency. If the session is abandoned before
    /// the provider resolves, the result is dropped and the history is left
    /// untouched.
    pub async fn submit_for_analysis(
        &mut self,
        artifact: AudioArtifact,
    ) -> Result<AnalysisOutcome> {
        if self.state != RecordingState::Captured {
            return Err(self.invalid("submit for analysis"));
        }
        self.state = RecordingState::Analyzing;
        info!(session_id = %self.id, kind = %self.kind(), "Analysis submitted");

        let provider = self.provider.clone();
        let finding = tokio::select! {
            finding = provider.analyze(&artifact) => finding,
            _ = wait_abandoned(self.signal.subscribe()) => {
                return Ok(self.mark_abandoned());
            }
        };

        // an abandon in the same tick the provider resolved still wins
        if !settle(&self.signal, Resolution::Recorded) {
            return Ok(self.mark_abandoned());
        }

        let answers = std::mem::take(&mut self.answers);
        let analysis = Analysis::from_finding(self.kind(), finding, answers);
        self.history.append(analysis.clone()).await;
        self.state = RecordingState::Completed;
        info!(
            session_id = %self.id,
            analysis_id = %analysis.id,
            diagnosis = %analysis.diagnosis,
            confidence = analysis.confidence,
            "Analysis completed"
        );
        Ok(AnalysisOutcome::Completed(analysis))
    }

    /// Walk away from the session; any pending analysis result is discarded
    pub async fn abandon(&mut self) {
        settle(&self.signal, Resolution::Abandoned);
        if matches!(
            self.state,
            RecordingState::Capturing | RecordingState::Paused
        ) {
            self.capture.release().await;
        }
        self.mark_abandoned();
    }

    fn mark_abandoned(&mut self) -> AnalysisOutcome {
        info!(session_id = %self.id, from = %self.state, "Recording session abandoned");
        self.state = RecordingState::Abandoned;
        AnalysisOutcome::Abandoned
    }
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DetailedAnalysisProvider, UrgentAnalysisProvider, URGENT_LATENCY};
    use crate::capture::{BufferedCapture, DEFAULT_MIME_TYPE};
    use crate::history::InMemoryHistoryStore;
    use crate::analysis::Finding;
    use async_trait::async_trait;
    use std::sync::OnceLock;
    use tokio::time::Duration;

    struct DeniedCapture;

    #[async_trait]
    impl AudioCapture for DeniedCapture {
        async fn acquire(&mut self) -> Result<()> {
            Err(FlowError::CaptureUnavailable("permission denied".into()))
        }
        async fn start(&mut self) -> Result<()> {
            unreachable!("start after failed acquire")
        }
        async fn pause(&mut self) -> Result<()> {
            Ok(())
        }
        async fn resume(&mut self) -> Result<()> {
            Ok(())
        }
        async fn stop(&mut self) -> Result<AudioArtifact> {
            Err(FlowError::CaptureUnavailable("never started".into()))
        }
        async fn release(&mut self) {}
    }

    /// Resolves at once, abandoning its own session right before returning
    struct AbandoningProvider {
        handle: Arc<OnceLock<AbandonHandle>>,
    }

    #[async_trait]
    impl AnalysisProvider for AbandoningProvider {
        fn kind(&self) -> AnalysisKind {
            AnalysisKind::Urgent
        }

        async fn analyze(&self, _artifact: &AudioArtifact) -> Finding {
            if let Some(handle) = self.handle.get() {
                handle.abandon();
            }
            UrgentAnalysisProvider::finding()
        }
    }

    fn urgent_session(history: Arc<InMemoryHistoryStore>) -> RecordingSession {
        RecordingSession::new(
            Box::new(BufferedCapture::preloaded(DEFAULT_MIME_TYPE, vec![7; 32])),
            Arc::new(UrgentAnalysisProvider::default()),
            history,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn urgent_session_lands_at_head_of_history() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let earlier = Analysis::from_finding(
            AnalysisKind::Detailed,
            DetailedAnalysisProvider::finding(),
            vec![],
        );
        history.append(earlier.clone()).await;

        let mut session = urgent_session(history.clone());
        session.start_capture().await.unwrap();
        let artifact = session.stop_capture().await.unwrap();
        assert_eq!(artifact.len(), 32);

        let started = tokio::time::Instant::now();
        let outcome = session.submit_for_analysis(artifact).await.unwrap();
        assert!(started.elapsed() >= URGENT_LATENCY);

        let AnalysisOutcome::Completed(analysis) = outcome else {
            panic!("expected a completed analysis");
        };
        assert_eq!(analysis.kind, AnalysisKind::Urgent);
        assert_eq!(analysis.confidence, 78);
        assert_eq!(session.state(), RecordingState::Completed);
        assert_eq!(history.list().await, vec![analysis, earlier]);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoning_during_analysis_discards_the_result() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut session = urgent_session(history.clone());
        let handle = session.abandon_handle();

        session.start_capture().await.unwrap();
        let artifact = session.stop_capture().await.unwrap();

        let pending = tokio::spawn(async move {
            let outcome = session.submit_for_analysis(artifact).await;
            (outcome, session.state())
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.abandon();

        let (outcome, state) = pending.await.unwrap();
        assert_eq!(outcome.unwrap(), AnalysisOutcome::Abandoned);
        assert_eq!(state, RecordingState::Abandoned);

        // let the would-be resolution time pass as well
        tokio::time::sleep(URGENT_LATENCY * 2).await;
        assert_eq!(history.len().await, 0);
    }

    #[tokio::test]
    async fn abandoned_before_submit_never_writes() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut session = urgent_session(history.clone());
        session.start_capture().await.unwrap();
        let artifact = session.stop_capture().await.unwrap();
        session.abandon_handle().abandon();

        // state is still captured; the flag alone stops the write
        let outcome = session.submit_for_analysis(artifact).await.unwrap();
        assert_eq!(outcome, AnalysisOutcome::Abandoned);
        assert!(history.is_empty().await);
    }

    #[tokio::test]
    async fn denied_input_is_capture_unavailable_and_retryable() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut session = RecordingSession::new(
            Box::new(DeniedCapture),
            Arc::new(UrgentAnalysisProvider::default()),
            history,
        );

        let err = session.start_capture().await.unwrap_err();
        assert!(matches!(err, FlowError::CaptureUnavailable(_)));
        assert!(err.is_recoverable());
        assert_eq!(session.state(), RecordingState::Idle);

        // still idle, so another attempt is allowed (and fails the same way)
        assert!(matches!(
            session.start_capture().await,
            Err(FlowError::CaptureUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn stop_without_capture_is_invalid() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut session = urgent_session(history);
        let err = session.stop_capture().await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition { .. }));
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_before_stopping() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut session = urgent_session(history);
        session.start_capture().await.unwrap();
        session.pause_capture().await.unwrap();
        assert_eq!(session.state(), RecordingState::Paused);
        assert!(session.pause_capture().await.is_err());
        session.resume_capture().await.unwrap();
        assert_eq!(session.state(), RecordingState::Capturing);
        assert!(session.stop_capture().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn detailed_session_keeps_quiz_answers() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let answers = vec![AnsweredQuestion {
            field: "fed_recently".to_string(),
            question: "O bebê se alimentou recentemente?".to_string(),
            answer: "Não".to_string(),
        }];
        let mut session = RecordingSession::new(
            Box::new(BufferedCapture::preloaded(DEFAULT_MIME_TYPE, vec![1])),
            Arc::new(DetailedAnalysisProvider::default()),
            history.clone(),
        )
        .with_answers(answers.clone());

        session.start_capture().await.unwrap();
        let artifact = session.stop_capture().await.unwrap();
        let outcome = session.submit_for_analysis(artifact).await.unwrap();

        let AnalysisOutcome::Completed(analysis) = outcome else {
            panic!("expected a completed analysis");
        };
        assert_eq!(analysis.kind, AnalysisKind::Detailed);
        assert_eq!(analysis.diagnosis, "Fome");
        assert_eq!(analysis.answers, answers);
    }

    #[tokio::test]
    async fn abandon_in_the_tick_of_resolution_still_wins() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let handle = Arc::new(OnceLock::new());
        let mut session = RecordingSession::new(
            Box::new(BufferedCapture::preloaded(DEFAULT_MIME_TYPE, vec![3; 4])),
            Arc::new(AbandoningProvider {
                handle: handle.clone(),
            }),
            history.clone(),
        );
        handle.set(session.abandon_handle()).unwrap();

        session.start_capture().await.unwrap();
        let artifact = session.stop_capture().await.unwrap();
        let outcome = session.submit_for_analysis(artifact).await.unwrap();

        assert_eq!(outcome, AnalysisOutcome::Abandoned);
        assert_eq!(session.state(), RecordingState::Abandoned);
        assert!(history.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_after_the_result_is_recorded_changes_nothing() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut session = urgent_session(history.clone());
        let handle = session.abandon_handle();

        session.start_capture().await.unwrap();
        let artifact = session.stop_capture().await.unwrap();
        let outcome = session.submit_for_analysis(artifact).await.unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Completed(_)));

        assert!(!handle.abandon());
        assert!(!handle.is_abandoned());
        assert_eq!(history.len().await, 1);
    }

    #[tokio::test]
    async fn abandon_before_resolution_reports_success() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let session = urgent_session(history);
        let handle = session.abandon_handle();
        assert!(handle.abandon());
        // repeated abandons keep reporting the same outcome
        assert!(handle.abandon());
    }
}
