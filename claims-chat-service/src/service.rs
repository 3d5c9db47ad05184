use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use claim_flow::{FlowError, FlowRunner, Policy, PolicyLookup, QuestionType, Turn, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::demo;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

const SESSION_EXPIRED: &str = "Session expired. Please login again.";

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn detail_error(status: StatusCode, detail: &str) -> ApiError {
    (status, Json(json!({ "detail": detail })))
}

fn session_expired() -> ApiError {
    detail_error(StatusCode::UNAUTHORIZED, SESSION_EXPIRED)
}

fn internal_error(detail: &str) -> ApiError {
    detail_error(StatusCode::INTERNAL_SERVER_ERROR, detail)
}

fn flow_error(session_id: &str, e: FlowError) -> ApiError {
    match e {
        FlowError::SessionNotFound(_) => {
            info!(session_id = %session_id, "unknown or expired session");
            session_expired()
        }
        e => {
            error!(session_id = %session_id, error = %e, "conversation step failed");
            internal_error("Failed to process message")
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub runner: FlowRunner,
    pub policies: Arc<dyn PolicyLookup>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session_id: String,
    pub user: UserProfile,
    pub policies: Vec<Policy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

/// Wire shape of one bot turn
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub completed: bool,
}

impl From<Turn> for ChatResponse {
    fn from(turn: Turn) -> Self {
        Self {
            question_type: turn.question_type(),
            options: turn.options().to_vec(),
            completed: turn.completed,
            response: turn.text,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub session_id: String,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/chat", post(chat))
        .route("/policies", get(list_policies))
        .route("/policy/{policy_number}", get(get_policy))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

/// Tag each request with a correlation id and run it inside a span carrying it
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = &header {
        request.headers_mut().insert(CORRELATION_ID_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "FNOL Claims Chat Service",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "endpoints": {
            "POST /login": "Log in with a demo account",
            "POST /logout": "End a session",
            "POST /chat": "Send a chat message",
            "GET /policies": "List the session user's policies",
            "GET /policy/{policy_number}": "Get one policy",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let Some(user) = demo::authenticate(&request.email, &request.password) else {
        warn!(email = %request.email, "login rejected");
        return Err(detail_error(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
        ));
    };

    let session = state.runner.open(user).await.map_err(|e| {
        error!(error = %e, "failed to open session");
        internal_error("Failed to create session")
    })?;

    let policies = state.policies.list(&session.user).await.unwrap_or_else(|e| {
        warn!(error = %e, "policy list unavailable at login");
        Vec::new()
    });

    info!(session_id = %session.id, user = %session.user.email, "user logged in");

    Ok(Json(LoginResponse {
        session_id: session.id,
        user: session.user,
        policies,
    }))
}

async fn logout(
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> ApiResult<Value> {
    state
        .runner
        .close(&request.session_id)
        .await
        .map_err(|e| flow_error(&request.session_id, e))?;

    info!(session_id = %request.session_id, "user logged out");
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    info!(
        session_id = %request.session_id,
        message_length = request.message.len(),
        "processing chat message"
    );

    let turn = state
        .runner
        .run(&request.session_id, &request.message)
        .await
        .map_err(|e| flow_error(&request.session_id, e))?;

    info!(
        session_id = %request.session_id,
        prompt = %turn.prompt_id.as_str(),
        completed = turn.completed,
        "chat message processed"
    );

    Ok(Json(turn.into()))
}

async fn session_user(state: &AppState, session_id: &str) -> Result<UserProfile, ApiError> {
    state
        .runner
        .session(session_id)
        .await
        .map(|session| session.user)
        .map_err(|e| flow_error(session_id, e))
}

async fn list_policies(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Value> {
    let user = session_user(&state, &query.session_id).await?;
    let policies = state.policies.list(&user).await.map_err(|e| {
        error!(session_id = %query.session_id, error = %e, "failed to list policies");
        internal_error("Policy service unavailable")
    })?;

    Ok(Json(json!({ "policies": policies })))
}

async fn get_policy(
    State(state): State<AppState>,
    Path(policy_number): Path<String>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Value> {
    let user = session_user(&state, &query.session_id).await?;
    let policy = state.policies.find(&user, &policy_number).await.map_err(|e| {
        error!(session_id = %query.session_id, error = %e, "failed to look up policy");
        internal_error("Policy service unavailable")
    })?;

    match policy {
        Some(policy) => Ok(Json(json!({ "policy": policy }))),
        None => Err(detail_error(StatusCode::NOT_FOUND, "Policy not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use claim_flow::{
        FlowController, InMemoryClaimRecorder, InMemorySessionStore, QuestionCatalog,
        RuleNormalizer,
    };
    use tower::ServiceExt;

    fn app() -> (Router, InMemoryClaimRecorder) {
        let recorder = InMemoryClaimRecorder::new();
        let policies: Arc<dyn PolicyLookup> = Arc::new(demo::policy_directory());
        let controller = FlowController::new(
            Arc::new(QuestionCatalog::fnol()),
            Arc::new(RuleNormalizer::new()),
            policies.clone(),
            Arc::new(recorder.clone()),
        );
        let runner = FlowRunner::new(Arc::new(controller), Arc::new(InMemorySessionStore::new()));
        (build_router(AppState { runner, policies }), recorder)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn login(app: &Router) -> String {
        let (status, body) = send(
            app,
            post_json(
                "/login",
                json!({ "email": "demo1@company.com", "password": "demo123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["sessionId"].as_str().unwrap().to_string()
    }

    async fn chat(app: &Router, session_id: &str, message: &str) -> (StatusCode, Value) {
        send(
            app,
            post_json("/chat", json!({ "message": message, "sessionId": session_id })),
        )
        .await
    }

    #[tokio::test]
    async fn test_health_and_banner() {
        let (app, _) = app();
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");

        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn test_login() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            post_json(
                "/login",
                json!({ "email": "demo1@company.com", "password": "demo123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Demo User One");
        assert_eq!(body["policies"].as_array().unwrap().len(), 3);
        assert_eq!(body["policies"][0]["policyNumber"], "POL-2024-001");
        assert_eq!(body["policies"][0]["type"], "Auto Insurance");

        let (status, body) = send(
            &app,
            post_json(
                "/login",
                json!({ "email": "demo1@company.com", "password": "wrong" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_chat_wire_shape() {
        let (app, _) = app();
        let session_id = login(&app).await;

        let (status, body) = chat(&app, &session_id, "hello").await;
        assert_eq!(status, StatusCode::OK);
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 4);
        assert_eq!(body["questionType"], "text");
        assert_eq!(body["options"], json!([]));
        assert_eq!(body["completed"], false);

        chat(&app, &session_id, "I had an accident").await;
        for answer in [
            "POL-2024-001",
            "555-0100",
            "today at 9am",
        ] {
            chat(&app, &session_id, answer).await;
        }
        let (_, body) = chat(&app, &session_id, "Collision").await;
        assert_eq!(body["questionType"], "text");

        let (_, body) = chat(&app, &session_id, "Main St").await;
        assert_eq!(body["questionType"], "options");
        assert_eq!(
            body["options"],
            json!(["Clear", "Rainy", "Snowy", "Foggy", "Windy", "Other"])
        );

        let (_, body) = chat(&app, &session_id, "rainy").await;
        assert_eq!(body["questionType"], "yesno");
        assert_eq!(body["response"], "Was a police report filed?");
    }

    #[tokio::test]
    async fn test_full_claim_over_http() {
        let (app, recorder) = app();
        let session_id = login(&app).await;

        let script = [
            "file a claim",
            "POL-2024-001",
            "555-0100",
            "yesterday at 3pm",
            "Collision",
            "Main St and 5th Ave",
            "Rainy",
            "No",
            "Rear bumper dented",
            "Yes",
            "No",
            "Yes",
            "No injuries",
            "Jane Doe",
            "Self",
            "D1234567",
            "5-10 years",
            "Yes",
        ];
        for message in script {
            let (status, body) = chat(&app, &session_id, message).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["completed"], false);
        }

        let (_, body) = chat(&app, &session_id, "Yes").await;
        assert_eq!(body["completed"], true);
        assert_eq!(body["questionType"], "text");

        let records = recorder.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fnol_data.len(), 18);

        let (_, body) = chat(&app, &session_id, "reset").await;
        assert_eq!(body["completed"], false);
        assert!(body["response"].as_str().unwrap().starts_with("Hello!"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_unauthorized() {
        let (app, _) = app();
        let (status, body) = chat(&app, "no-such-session", "hello").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], SESSION_EXPIRED);

        let (status, _) = send(&app, get("/policies?sessionId=no-such-session")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (app, _) = app();
        let session_id = login(&app).await;

        let logout = post_json("/logout", json!({ "sessionId": session_id }));
        let (status, body) = send(&app, logout).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Logged out successfully");

        let (status, _) = chat(&app, &session_id, "hello").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // logging out twice is fine
        let logout = post_json("/logout", json!({ "sessionId": session_id }));
        let (status, _) = send(&app, logout).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_policy_endpoints() {
        let (app, _) = app();
        let session_id = login(&app).await;

        let (status, body) = send(&app, get(&format!("/policies?sessionId={session_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["policies"].as_array().unwrap().len(), 3);

        let (status, body) = send(
            &app,
            get(&format!("/policy/pol-2024-002?sessionId={session_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["policy"]["property"], "123 Main St, City");
        assert!(body["policy"].get("vehicle").is_none());

        // another user's policy is not visible
        let (status, body) = send(
            &app,
            get(&format!("/policy/POL-2024-003?sessionId={session_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Policy not found");
    }
}
