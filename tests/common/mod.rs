//! In-process fake automation server for integration tests.
//!
//! Serves the endpoints the client uses from an in-memory state on an
//! ephemeral port. Claiming hands out the oldest `new` item and marks it
//! `in progress`, the way the real server does.

#![allow(dead_code)]

use ats_client::{Client, Config};
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "test-token";
const TIMESTAMP: &str = "2024-05-01T08:00:00Z";

#[derive(Default)]
struct FakeState {
    sessions: HashMap<i64, Value>,
    processes: HashMap<i64, Value>,
    workqueues: HashMap<i64, Value>,
    items: Vec<Value>,
    next_item_id: i64,
    credentials: HashMap<String, Value>,
    assets: HashMap<String, Value>,
    audit_logs: Vec<Value>,
    requests: Vec<String>,
    auth_headers: Vec<Option<String>>,
    status_failure: Option<u16>,
    claim_failure: Option<u16>,
    audit_failure: Option<u16>,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeServer {
    pub url: String,
    state: Shared,
}

impl FakeServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            next_item_id: 1,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/sessions/:id", get(get_session))
            .route("/processes/:id", get(get_process))
            .route("/workqueues/:id", get(get_workqueue))
            .route("/workqueues/:id/next_item", get(next_item))
            .route("/workqueues/:id/add", post(add_item))
            .route("/workqueues/:id/clear", post(clear_workqueue))
            .route("/workqueues/:id/by_reference/:reference", get(by_reference))
            .route("/workitems/:id", put(update_item))
            .route("/workitems/:id/status", put(update_status))
            .route("/credentials/by_name/:name", get(get_credential))
            .route("/assets/by_name/:name", get(get_asset))
            .route("/audit-logs", post(audit_log))
            .layer(middleware::from_fn_with_state(state.clone(), record_request))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("fake server address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake server failed");
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub fn config(&self) -> Config {
        Config::new(&self.url).with_token(TOKEN)
    }

    pub fn client(&self) -> Client {
        Client::new(&self.config()).expect("client")
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_workqueue(&self, id: i64, name: &str) {
        self.with(|s| {
            s.workqueues.insert(
                id,
                json!({
                    "id": id,
                    "name": name,
                    "description": format!("{name} queue"),
                    "enabled": true,
                    "deleted": false,
                    "created_at": TIMESTAMP,
                    "updated_at": TIMESTAMP,
                }),
            );
        });
    }

    pub fn add_session(&self, id: i64, process_id: i64) {
        self.with(|s| {
            s.sessions.insert(
                id,
                json!({
                    "id": id,
                    "process_id": process_id,
                    "resource_id": 3,
                    "dispatched_at": "2024-05-01T07:59:30.500000",
                    "status": "in progress",
                    "stop_requested": false,
                    "deleted": false,
                    "parameters": "{}",
                    "created_at": TIMESTAMP,
                    "updated_at": TIMESTAMP,
                    "added_by_newer_server": {"nested": true},
                }),
            );
        });
    }

    pub fn add_process(&self, id: i64, workqueue_id: Option<i64>) {
        self.with(|s| {
            s.processes.insert(
                id,
                json!({
                    "id": id,
                    "name": "invoice-import",
                    "description": "Imports invoices",
                    "requirements": "",
                    "target_type": "git",
                    "target_source": "https://example.invalid/repo.git",
                    "target_credentials_id": null,
                    "credentials_id": 4,
                    "workqueue_id": workqueue_id,
                    "deleted": false,
                    "created_at": TIMESTAMP,
                    "updated_at": TIMESTAMP,
                }),
            );
        });
    }

    pub fn add_credential(&self, name: &str, username: &str, password: &str) {
        self.with(|s| {
            let id = s.credentials.len() as i64 + 1;
            s.credentials.insert(
                name.to_string(),
                json!({
                    "id": id,
                    "name": name,
                    "data": {"domain": "corp"},
                    "username": username,
                    "password": password,
                    "deleted": false,
                    "created_at": TIMESTAMP,
                    "updated_at": TIMESTAMP,
                }),
            );
        });
    }

    pub fn add_asset(&self, name: &str, data: Value) {
        self.with(|s| {
            let id = s.assets.len() as i64 + 1;
            s.assets.insert(
                name.to_string(),
                json!({
                    "id": id,
                    "name": name,
                    "data": data,
                    "deleted": false,
                    "created_at": TIMESTAMP,
                    "updated_at": TIMESTAMP,
                }),
            );
        });
    }

    /// Server-side view of an item.
    pub fn item(&self, id: i64) -> Value {
        self.with(|s| {
            s.items
                .iter()
                .find(|item| item["id"] == id)
                .cloned()
                .unwrap_or(Value::Null)
        })
    }

    pub fn audit_logs(&self) -> Vec<Value> {
        self.with(|s| s.audit_logs.clone())
    }

    /// "METHOD /path" for every request received, in order.
    pub fn requests(&self) -> Vec<String> {
        self.with(|s| s.requests.clone())
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.with(|s| s.auth_headers.clone())
    }

    pub fn fail_status_updates(&self, status: Option<u16>) {
        self.with(|s| s.status_failure = status);
    }

    pub fn fail_claims(&self, status: Option<u16>) {
        self.with(|s| s.claim_failure = status);
    }

    pub fn fail_audit_logs(&self, status: Option<u16>) {
        self.with(|s| s.audit_failure = status);
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn record_request(State(state): State<Shared>, request: Request, next: Next) -> Response {
    {
        let mut s = state.lock().unwrap();
        s.requests
            .push(format!("{} {}", request.method(), request.uri().path()));
        s.auth_headers.push(
            request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
    }
    next.run(request).await
}

fn found(value: Option<Value>) -> Response {
    match value {
        Some(v) => Json(v).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

fn failure(status: u16, body: &'static str) -> Response {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
        .into_response()
}

async fn get_session(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    found(state.lock().unwrap().sessions.get(&id).cloned())
}

async fn get_process(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    found(state.lock().unwrap().processes.get(&id).cloned())
}

async fn get_workqueue(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    found(state.lock().unwrap().workqueues.get(&id).cloned())
}

async fn next_item(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut s = state.lock().unwrap();
    if let Some(status) = s.claim_failure {
        return failure(status, "queue is locked");
    }
    match s
        .items
        .iter_mut()
        .find(|item| item["workqueue_id"] == id && item["status"] == "new")
    {
        Some(item) => {
            item["status"] = json!("in progress");
            item["locked"] = json!(true);
            Json(item.clone()).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Deserialize)]
struct NewItem {
    data: Value,
    reference: String,
}

async fn add_item(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<NewItem>,
) -> Response {
    let mut s = state.lock().unwrap();
    if !s.workqueues.contains_key(&id) {
        return failure(404, "no such workqueue");
    }
    let item_id = s.next_item_id;
    s.next_item_id += 1;
    let item = json!({
        "id": item_id,
        "data": body.data,
        "reference": body.reference,
        "locked": false,
        "status": "new",
        "message": "",
        "workqueue_id": id,
        "created_at": TIMESTAMP,
        "updated_at": TIMESTAMP,
    });
    s.items.push(item.clone());
    (StatusCode::CREATED, Json(item)).into_response()
}

#[derive(Deserialize)]
struct ClearBody {
    workitem_status: Option<String>,
}

async fn clear_workqueue(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<ClearBody>,
) -> StatusCode {
    let mut s = state.lock().unwrap();
    s.items.retain(|item| {
        let in_queue = item["workqueue_id"] == id;
        let matches_status = body
            .workitem_status
            .as_deref()
            .is_none_or(|status| item["status"] == status);
        !(in_queue && matches_status)
    });
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

async fn by_reference(
    State(state): State<Shared>,
    Path((id, reference)): Path<(i64, String)>,
    Query(query): Query<StatusQuery>,
) -> Json<Vec<Value>> {
    let s = state.lock().unwrap();
    Json(
        s.items
            .iter()
            .filter(|item| item["workqueue_id"] == id && item["reference"] == reference.as_str())
            .filter(|item| {
                query
                    .status
                    .as_deref()
                    .is_none_or(|status| item["status"] == status)
            })
            .cloned()
            .collect(),
    )
}

#[derive(Deserialize)]
struct DataBody {
    data: Value,
    reference: String,
}

async fn update_item(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<DataBody>,
) -> Response {
    let mut s = state.lock().unwrap();
    match s.items.iter_mut().find(|item| item["id"] == id) {
        Some(item) => {
            item["data"] = body.data;
            item["reference"] = json!(body.reference);
            StatusCode::NO_CONTENT.into_response()
        }
        None => failure(404, "no such work item"),
    }
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
    message: String,
}

async fn update_status(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Response {
    let mut s = state.lock().unwrap();
    if let Some(status) = s.status_failure {
        return failure(status, "status update rejected");
    }
    match s.items.iter_mut().find(|item| item["id"] == id) {
        Some(item) => {
            item["status"] = json!(body.status);
            item["message"] = json!(body.message);
            StatusCode::NO_CONTENT.into_response()
        }
        None => failure(404, "no such work item"),
    }
}

async fn get_credential(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    found(state.lock().unwrap().credentials.get(&name).cloned())
}

async fn get_asset(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    found(state.lock().unwrap().assets.get(&name).cloned())
}

async fn audit_log(State(state): State<Shared>, Json(record): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    if let Some(status) = s.audit_failure {
        return failure(status, "audit log unavailable");
    }
    s.audit_logs.push(record);
    StatusCode::NO_CONTENT.into_response()
}
