use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode, header::CONTENT_TYPE},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use cry_flow::{
    AbandonHandle, AccountRegistry, Analysis, AnalysisKind, AnalysisOutcome, AuthProvider,
    BufferedCapture, FederatedIdentity, FlowError, FlowRunner, FlowSnapshot,
    InMemoryAuthProvider, InMemorySessionStorage, QuestionnaireAnswers, QuizAnswers,
    SessionStorage,
    capture::DEFAULT_MIME_TYPE,
    records::{BabyRow, CryAnalysisRow, ProfileRow, QuizAnswerRow},
    suggestions,
};
use dashmap::DashMap;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    models::{
        AnswerRequest, AuthQuery, BackResponse, CredentialsRequest, RecordingQuery,
        RecordingResponse, RecordsExport, StepResponse, UserResponse,
    },
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn flow_error(err: FlowError) -> ApiError {
    let status = match &err {
        FlowError::InvalidOption { .. } => StatusCode::BAD_REQUEST,
        FlowError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
        FlowError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        FlowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        FlowError::CaptureUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    if status.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }

    (
        status,
        Json(json!({
            "error": err.to_string(),
            "recoverable": err.is_recoverable()
        })),
    )
}

/// Analysis still running in the background for a flow session
#[derive(Debug, Clone)]
struct PendingRecording {
    recording_id: Uuid,
    kind: AnalysisKind,
    handle: AbandonHandle,
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub flow_runner: FlowRunner,
    pub accounts: AccountRegistry,
    auth_providers: Arc<DashMap<String, Arc<InMemoryAuthProvider>>>,
    pending: Arc<DashMap<String, PendingRecording>>,
}

impl AppState {
    pub fn new(config: &ServiceConfig) -> Self {
        let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let flow_runner = FlowRunner::new(session_storage.clone(), config.analysis_settings());

        Self {
            session_storage,
            flow_runner,
            accounts: AccountRegistry::new(),
            auth_providers: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
        }
    }

    fn auth_provider(&self, session_id: &str) -> Result<Arc<InMemoryAuthProvider>, ApiError> {
        self.auth_providers
            .get(session_id)
            .map(|provider| provider.value().clone())
            .ok_or_else(|| not_found_error("Session not found", session_id))
    }

    /// Abandon the session's pending analysis. The flag is `false` when the
    /// result reached the history before the abandon did.
    fn abandon_pending(&self, session_id: &str) -> Option<(PendingRecording, bool)> {
        let (_, pending) = self.pending.remove(session_id)?;
        let abandoned = pending.handle.abandon();
        info!(
            session_id = %session_id,
            recording_id = %pending.recording_id,
            abandoned,
            "Pending analysis abandoned"
        );
        Some((pending, abandoned))
    }
}

pub fn create_app(config: &ServiceConfig) -> Router {
    build_router(AppState::new(config))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route(
            "/sessions/{session_id}",
            get(get_session).delete(delete_session),
        )
        .route("/sessions/{session_id}/intake/answer", post(answer_intake))
        .route("/sessions/{session_id}/intake/back", post(back_intake))
        .route("/sessions/{session_id}/quiz/answer", post(answer_quiz))
        .route("/sessions/{session_id}/quiz/back", post(back_quiz))
        .route("/sessions/{session_id}/quiz/suggestions", get(get_suggestions))
        .route(
            "/sessions/{session_id}/recordings",
            post(start_recording)
                .get(get_pending_recording)
                .delete(abandon_recording),
        )
        .route("/sessions/{session_id}/history", get(get_history))
        .route("/sessions/{session_id}/records", get(export_records))
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signin/{provider}", post(sign_in_with_provider))
        .route("/auth/signout", post(sign_out))
        .route("/auth/user", get(current_user))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = &header {
        request.headers_mut().insert("x-correlation-id", value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "EcoBaby Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Questionnaires, care suggestions and cry analysis for parents",
        "endpoints": {
            "POST /sessions": "Start a new flow session",
            "GET /sessions/{session_id}": "Wizard progress, baby profile and signed-in user",
            "POST /sessions/{session_id}/intake/answer": "Answer the current intake question",
            "POST /sessions/{session_id}/quiz/answer": "Answer the current quiz question",
            "GET /sessions/{session_id}/quiz/suggestions": "Suggestions for the completed quiz",
            "POST /sessions/{session_id}/recordings?kind=urgent|detailed": "Upload a recording for analysis",
            "DELETE /sessions/{session_id}/recordings": "Abandon the pending analysis",
            "GET /sessions/{session_id}/history": "Analysis history, newest first",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<FlowSnapshot>), ApiError> {
    let provider = Arc::new(InMemoryAuthProvider::new(state.accounts.clone()));
    let session = state
        .flow_runner
        .create(provider.subscribe())
        .await
        .map_err(flow_error)?;
    state.auth_providers.insert(session.id.clone(), provider);

    let snapshot = state
        .flow_runner
        .snapshot(&session.id)
        .await
        .map_err(flow_error)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<FlowSnapshot> {
    let snapshot = state
        .flow_runner
        .snapshot(&session_id)
        .await
        .map_err(flow_error)?;
    Ok(Json(snapshot))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .flow_runner
        .load(&session_id)
        .await
        .map_err(flow_error)?;

    state.abandon_pending(&session_id);
    state.auth_providers.remove(&session_id);
    state
        .session_storage
        .delete(&session_id)
        .await
        .map_err(flow_error)?;

    info!(session_id = %session_id, "Flow session deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn answer_intake(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<StepResponse<QuestionnaireAnswers>> {
    let outcome = state
        .flow_runner
        .answer_intake(&session_id, &request.value)
        .await
        .map_err(flow_error)?;
    Ok(Json(StepResponse::from_outcome(&session_id, outcome)))
}

async fn back_intake(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<BackResponse> {
    let outcome = state
        .flow_runner
        .back_intake(&session_id)
        .await
        .map_err(flow_error)?;
    Ok(Json(BackResponse::from_outcome(&session_id, outcome)))
}

async fn answer_quiz(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<StepResponse<QuizAnswers>> {
    let outcome = state
        .flow_runner
        .answer_quiz(&session_id, &request.value)
        .await
        .map_err(flow_error)?;

    let response = StepResponse::from_outcome(&session_id, outcome);
    let suggestions = response.completed.as_ref().map(suggestions::generate);
    Ok(Json(response.with_suggestions(suggestions)))
}

async fn back_quiz(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<BackResponse> {
    let outcome = state
        .flow_runner
        .back_quiz(&session_id)
        .await
        .map_err(flow_error)?;
    Ok(Json(BackResponse::from_outcome(&session_id, outcome)))
}

async fn get_suggestions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<suggestions::Suggestions> {
    state
        .flow_runner
        .suggestions(&session_id)
        .await
        .map_err(flow_error)?
        .map(Json)
        .ok_or_else(|| not_found_error("Quiz not completed", &session_id))
}

async fn start_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<RecordingQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RecordingResponse>), ApiError> {
    let kind = match query.kind.as_deref() {
        Some(raw) => raw
            .parse::<AnalysisKind>()
            .map_err(|e| bad_request_error(&e))?,
        None => AnalysisKind::Urgent,
    };
    if body.is_empty() {
        return Err(bad_request_error("Audio body is required"));
    }

    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();
    let capture = Box::new(BufferedCapture::preloaded(mime_type, body.to_vec()));

    let mut recording = state
        .flow_runner
        .recording_session(&session_id, kind, capture)
        .await
        .map_err(flow_error)?;
    recording.start_capture().await.map_err(flow_error)?;
    let artifact = recording.stop_capture().await.map_err(flow_error)?;

    let recording_id = recording.id();
    let pending = PendingRecording {
        recording_id,
        kind,
        handle: recording.abandon_handle(),
    };
    if let Some(previous) = state.pending.insert(session_id.clone(), pending) {
        info!(
            session_id = %session_id,
            recording_id = %previous.recording_id,
            "Superseded by a new recording"
        );
        previous.handle.abandon();
    }

    let pending_map = state.pending.clone();
    let task_session_id = session_id.clone();
    tokio::spawn(
        async move {
            match recording.submit_for_analysis(artifact).await {
                Ok(AnalysisOutcome::Completed(analysis)) => {
                    info!(
                        session_id = %task_session_id,
                        analysis_id = %analysis.id,
                        "Background analysis stored"
                    );
                }
                Ok(AnalysisOutcome::Abandoned) => {}
                Err(e) => {
                    error!(session_id = %task_session_id, error = %e, "Background analysis failed");
                }
            }
            pending_map.remove_if(&task_session_id, |_, pending| {
                pending.recording_id == recording_id
            });
        }
        .instrument(tracing::Span::current()),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(RecordingResponse {
            session_id,
            recording_id: recording_id.to_string(),
            kind: kind.to_string(),
            status: "analyzing",
        }),
    ))
}

async fn get_pending_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<RecordingResponse> {
    state
        .pending
        .get(&session_id)
        .map(|pending| {
            Json(RecordingResponse {
                session_id: session_id.clone(),
                recording_id: pending.recording_id.to_string(),
                kind: pending.kind.to_string(),
                status: "analyzing",
            })
        })
        .ok_or_else(|| not_found_error("No pending analysis", &session_id))
}

async fn abandon_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<RecordingResponse> {
    let (pending, abandoned) = state
        .abandon_pending(&session_id)
        .ok_or_else(|| not_found_error("No pending analysis", &session_id))?;

    Ok(Json(RecordingResponse {
        session_id,
        recording_id: pending.recording_id.to_string(),
        kind: pending.kind.to_string(),
        status: if abandoned { "abandoned" } else { "completed" },
    }))
}

async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Vec<Analysis>> {
    let history = state
        .flow_runner
        .history(&session_id)
        .await
        .map_err(flow_error)?;
    Ok(Json(history))
}

async fn export_records(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<RecordsExport> {
    let session = state
        .flow_runner
        .load(&session_id)
        .await
        .map_err(flow_error)?;
    let history = state
        .flow_runner
        .history(&session_id)
        .await
        .map_err(flow_error)?;

    let user = session.auth.current();
    let user_id = user.as_ref().map(|u| u.id.as_str());
    let baby = session
        .baby
        .as_ref()
        .map(|answers| BabyRow::from_questionnaire(answers, user_id));
    let symptoms = session
        .baby
        .as_ref()
        .and_then(|answers| answers.recent_symptom.as_deref());

    let cry_analyses = history
        .iter()
        .map(|analysis| CryAnalysisRow::from_analysis(analysis, user_id, baby.as_ref(), symptoms))
        .collect();
    // quiz answers belong to the newest detailed analysis
    let detailed_id = history
        .iter()
        .find(|analysis| analysis.kind == AnalysisKind::Detailed)
        .map(|analysis| analysis.id.as_str());
    let quiz_answers = session
        .last_quiz
        .as_ref()
        .map(|answers| QuizAnswerRow::from_quiz(answers, detailed_id))
        .unwrap_or_default();

    Ok(Json(RecordsExport {
        profile: user.as_ref().map(ProfileRow::from_user),
        baby,
        cry_analyses,
        quiz_answers,
    }))
}

async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let provider = InMemoryAuthProvider::new(state.accounts.clone());
    let user = provider
        .sign_up_with_email(&request.email, &request.password)
        .await
        .map_err(flow_error)?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            session_id: None,
            user: Some(user),
        }),
    ))
}

async fn sign_in(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<UserResponse> {
    let provider = state.auth_provider(&query.session_id)?;
    let user = provider
        .sign_in_with_email(&request.email, &request.password)
        .await
        .map_err(flow_error)?;

    Ok(Json(UserResponse {
        session_id: Some(query.session_id),
        user: Some(user),
    }))
}

async fn sign_in_with_provider(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    Query(query): Query<AuthQuery>,
    Json(identity): Json<FederatedIdentity>,
) -> ApiResult<UserResponse> {
    let provider = state.auth_provider(&query.session_id)?;
    let user = provider
        .sign_in_with_provider(&provider_name, identity)
        .await
        .map_err(flow_error)?;

    Ok(Json(UserResponse {
        session_id: Some(query.session_id),
        user: Some(user),
    }))
}

async fn sign_out(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> ApiResult<UserResponse> {
    let provider = state.auth_provider(&query.session_id)?;
    provider.sign_out().await.map_err(flow_error)?;

    Ok(Json(UserResponse {
        session_id: Some(query.session_id),
        user: None,
    }))
}

async fn current_user(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> ApiResult<UserResponse> {
    let provider = state.auth_provider(&query.session_id)?;
    let user = provider.current_user().await;

    Ok(Json(UserResponse {
        session_id: Some(query.session_id),
        user,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use cry_flow::AuthState;
    use tower::ServiceExt;

    fn signed_out() -> AuthState {
        InMemoryAuthProvider::new(AccountRegistry::new()).subscribe()
    }

    #[test]
    fn flow_errors_map_to_status_codes() {
        let cases = [
            (
                FlowError::InvalidOption {
                    field: "sex".into(),
                    value: "Azul".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (FlowError::AuthFailure("nope".into()), StatusCode::UNAUTHORIZED),
            (FlowError::SessionNotFound("s".into()), StatusCode::NOT_FOUND),
            (
                FlowError::InvalidTransition {
                    from: "idle".into(),
                    action: "stop capture".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                FlowError::CaptureUnavailable("denied".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            let recoverable = err.is_recoverable();
            let (status, Json(body)) = flow_error(err);
            assert_eq!(status, expected);
            assert_eq!(body["recoverable"], recoverable);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_abandon_reports_the_recorded_result() {
        let state = AppState::new(&ServiceConfig::default());
        let session = state.flow_runner.create(signed_out()).await.unwrap();

        let capture = Box::new(BufferedCapture::preloaded(DEFAULT_MIME_TYPE, vec![5; 8]));
        let mut recording = state
            .flow_runner
            .recording_session(&session.id, AnalysisKind::Urgent, capture)
            .await
            .unwrap();
        recording.start_capture().await.unwrap();
        let artifact = recording.stop_capture().await.unwrap();

        // the slot is still registered when the result is written
        state.pending.insert(
            session.id.clone(),
            PendingRecording {
                recording_id: recording.id(),
                kind: AnalysisKind::Urgent,
                handle: recording.abandon_handle(),
            },
        );
        let outcome = recording.submit_for_analysis(artifact).await.unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Completed(_)));

        let app = build_router(state.clone());
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/sessions/{}/recordings", session.id))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "completed");
        assert_eq!(state.flow_runner.history(&session.id).await.unwrap().len(), 1);
    }
}
