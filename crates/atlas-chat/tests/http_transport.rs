//! End-to-end tests for the HTTP transport against a local axum server.
//!
//! Each test starts its own server on an ephemeral port that mimics the
//! `/history`, `/chat` and `/jobs` routes and records what it received.

use std::sync::{Arc, Mutex};

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use atlas_chat::{
    AttachmentBundle, ChatError, ConversationSession, HttpTransport, JobRequest, JobScheduler,
    RenderedFragment, StatusLine, SubmitOutcome, Transport, TurnRequest,
};
use atlas_core::config::{ChatConfig, JobsConfig, ServerConfig};
use atlas_core::{GeoSnapshot, ResultKind, Role, UploadedFile};

// =============================================================================
// Test server
// =============================================================================

const IDENTITY: &str = "researcher_01";

#[derive(Debug, Clone, PartialEq)]
enum ChatBody {
    Json(Value),
    /// (field name, file name, bytes)
    Multipart(Vec<(String, Option<String>, Vec<u8>)>),
}

#[derive(Default)]
struct Recorded {
    history: Value,
    identities: Vec<Option<String>>,
    chat_bodies: Vec<ChatBody>,
    jobs: Vec<Value>,
}

type Shared = Arc<Mutex<Recorded>>;

fn identity_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-user")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn history(State(state): State<Shared>, headers: HeaderMap) -> Json<Value> {
    let mut recorded = state.lock().unwrap();
    recorded.identities.push(identity_of(&headers));
    Json(recorded.history.clone())
}

async fn chat(State(state): State<Shared>, request: Request) -> Response {
    let identity = identity_of(request.headers());
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (body, message) = if is_multipart {
        let mut multipart = Multipart::from_request(request, &state).await.unwrap();
        let mut fields = Vec::new();
        let mut message = String::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.unwrap().to_vec();
            if name == "message" {
                message = String::from_utf8_lossy(&bytes).to_string();
            }
            fields.push((name, file_name, bytes));
        }
        (ChatBody::Multipart(fields), message)
    } else {
        let Json(value) = Json::<Value>::from_request(request, &state).await.unwrap();
        let message = value["message"].as_str().unwrap_or_default().to_string();
        (ChatBody::Json(value), message)
    };

    {
        let mut recorded = state.lock().unwrap();
        recorded.identities.push(identity);
        recorded.chat_bodies.push(body);
    }

    match message.as_str() {
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, "agent crashed").into_response(),
        "garbled" => (StatusCode::OK, "not json").into_response(),
        "chart" => Json(json!({
            "response": "Here is the trend.",
            "exec_result": {"type": "plot", "content": "{\"data\": [], \"layout\": {}}"}
        }))
        .into_response(),
        other => Json(json!({ "response": format!("echo: {other}") })).into_response(),
    }
}

async fn jobs(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let identity = identity_of(&headers);
    let mut recorded = state.lock().unwrap();
    recorded.identities.push(identity.clone());
    recorded.jobs.push(body);
    if identity.is_none() {
        return (StatusCode::NOT_FOUND, "User not found").into_response();
    }
    Json(json!({"status": "Job scheduled"})).into_response()
}

async fn spawn_server(history_body: Value) -> (ServerConfig, Shared) {
    let state: Shared = Arc::new(Mutex::new(Recorded {
        history: history_body,
        ..Recorded::default()
    }));
    let app = Router::new()
        .route("/history", get(history))
        .route("/chat", post(chat))
        .route("/jobs", post(jobs))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ServerConfig {
        base_url: format!("http://{addr}/"),
        identity: IDENTITY.to_string(),
        ..ServerConfig::default()
    };
    (config, state)
}

fn bare_turn(message: &str) -> TurnRequest {
    TurnRequest {
        message: message.to_string(),
        bbox: None,
        service: None,
        file: None,
    }
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn test_history_decodes_messages() {
    let (config, state) = spawn_server(json!([
        {"role": "user", "content": "Show me rainfall"},
        {
            "role": "model",
            "content": "Done.",
            "timestamp": "2024-05-01T10:00:00",
            "exec_result": {"type": "dataframe", "content": "<table></table>"}
        }
    ]))
    .await;
    let transport = HttpTransport::new(&config).unwrap();

    let messages = transport.fetch_history().await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Model);
    assert!(messages[1].timestamp.is_some());
    assert_eq!(
        messages[1].result.as_ref().map(|r| r.kind.clone()),
        Some(ResultKind::Dataframe)
    );
    assert_eq!(
        state.lock().unwrap().identities,
        vec![Some(IDENTITY.to_string())]
    );
}

#[tokio::test]
async fn test_history_with_unknown_role_keeps_other_records() {
    let (config, _) = spawn_server(json!([
        {"role": "user", "content": "Show me rainfall"},
        {"role": "tool", "content": "raw tool output"},
        {"role": "model", "content": "Done."}
    ]))
    .await;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config).unwrap());
    let session = ConversationSession::new(IDENTITY, transport, ChatConfig::default());

    assert_eq!(session.load_history().await, 2);
    let roles: Vec<Role> = session.transcript().iter().map(|e| e.message.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Model]);
}

#[tokio::test]
async fn test_bare_turn_is_sent_as_json() {
    let (config, state) = spawn_server(json!([])).await;
    let transport = HttpTransport::new(&config).unwrap();

    let mut request = bare_turn("Where is the river?");
    request.bbox = Some(GeoSnapshot::new(10.0, 5.0, 3.0, -1.0));
    let reply = transport.send_turn(request).await.unwrap();
    assert_eq!(reply.response, "echo: Where is the river?");
    assert!(reply.exec_result.is_none());

    let recorded = state.lock().unwrap();
    assert_eq!(
        recorded.chat_bodies,
        vec![ChatBody::Json(json!({
            "message": "Where is the river?",
            "bbox": {"north": 10.0, "south": 5.0, "east": 3.0, "west": -1.0}
        }))]
    );
    assert_eq!(recorded.identities, vec![Some(IDENTITY.to_string())]);
}

#[tokio::test]
async fn test_attachments_force_multipart() {
    let (config, state) = spawn_server(json!([])).await;
    let transport = HttpTransport::new(&config).unwrap();

    let bundle = AttachmentBundle::from_panel(
        "sse",
        "http://tools.local/sse",
        Some(UploadedFile::new("skill.md", b"# skill".to_vec())),
    );
    let request = atlas_chat::RequestComposer::new().compose(
        "Use the tool",
        Some(GeoSnapshot::new(1.0, 0.0, 1.0, 0.0)),
        Some(&bundle),
    );
    transport.send_turn(request).await.unwrap();

    let recorded = state.lock().unwrap();
    let ChatBody::Multipart(fields) = &recorded.chat_bodies[0] else {
        panic!("expected multipart body, got {:?}", recorded.chat_bodies[0]);
    };
    let field = |name: &str| fields.iter().find(|(n, _, _)| n == name).cloned();

    assert_eq!(field("message").unwrap().2, b"Use the tool".to_vec());
    assert_eq!(field("mcp_type").unwrap().2, b"SSE".to_vec());
    assert_eq!(field("mcp_url").unwrap().2, b"http://tools.local/sse".to_vec());
    let bbox: Value = serde_json::from_slice(&field("bbox").unwrap().2).unwrap();
    assert_eq!(bbox["north"], json!(1.0));
    let (_, file_name, bytes) = field("skill_file").unwrap();
    assert_eq!(file_name.as_deref(), Some("skill.md"));
    assert_eq!(bytes, b"# skill".to_vec());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (config, _) = spawn_server(json!([])).await;
    let transport = HttpTransport::new(&config).unwrap();

    let err = transport.send_turn(bare_turn("boom")).await.unwrap_err();
    match err {
        ChatError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "agent crashed");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_reply_is_decode_error() {
    let (config, _) = spawn_server(json!([])).await;
    let transport = HttpTransport::new(&config).unwrap();

    let err = transport.send_turn(bare_turn("garbled")).await.unwrap_err();
    assert!(matches!(err, ChatError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ServerConfig {
        base_url: format!("http://{addr}"),
        ..ServerConfig::default()
    };
    let transport = HttpTransport::new(&config).unwrap();
    let err = transport.fetch_history().await.unwrap_err();
    assert!(matches!(err, ChatError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_schedule_job_posts_interval() {
    let (config, state) = spawn_server(json!([])).await;
    let transport = HttpTransport::new(&config).unwrap();

    let ack = transport
        .schedule_job(JobRequest {
            query: "Run analysis".to_string(),
            interval_seconds: Some(3600),
        })
        .await
        .unwrap();
    assert_eq!(ack.status, "Job scheduled");
    assert_eq!(
        state.lock().unwrap().jobs,
        vec![json!({"query": "Run analysis", "interval_seconds": 3600})]
    );
}

// =============================================================================
// Session and scheduler over HTTP
// =============================================================================

#[tokio::test]
async fn test_session_round_trip_with_chart() {
    let (config, _) = spawn_server(json!([
        {"role": "user", "content": "earlier"},
        {"role": "model", "content": "earlier reply"}
    ]))
    .await;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config).unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session =
        ConversationSession::new(IDENTITY, transport, ChatConfig::default()).with_chart_mounts(tx);

    assert_eq!(session.load_history().await, 2);
    assert_eq!(session.submit("chart").await, SubmitOutcome::Answered);

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript[3].message.content, "Here is the trend.");
    let Some(RenderedFragment::Chart(chart)) = transcript[3].rendered.clone() else {
        panic!("expected chart fragment");
    };

    let mount = rx.recv().await.unwrap();
    assert_eq!(mount.container_id, chart.container_id);
    assert_eq!(mount.spec, json!({"data": [], "layout": {}}));
}

#[tokio::test]
async fn test_session_failure_appends_fixed_entry() {
    let (config, _) = spawn_server(json!([])).await;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config).unwrap());
    let session = ConversationSession::new(IDENTITY, transport, ChatConfig::default());

    assert_eq!(session.submit("boom").await, SubmitOutcome::Failed);
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].message.content, "boom");
    assert_eq!(transcript[1].message.content, "Error communicating with agent.");
}

#[tokio::test]
async fn test_scheduler_shares_status_line() {
    let (config, _) = spawn_server(json!([])).await;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config).unwrap());
    let status = StatusLine::new();
    let scheduler = JobScheduler::new(transport, JobsConfig::default(), status.clone());

    let text = scheduler.schedule("Run analysis", "60").await;
    assert_eq!(text.as_deref(), Some("Job Scheduled: Job scheduled"));
    assert_eq!(status.get(), "Job Scheduled: Job scheduled");
}
