#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

/// In-process stand-in for the simulator API: cookie sessions, role
/// enforcement, and per-route fetch counters the tests assert against.
pub struct MockState {
    pub pd_gets: AtomicUsize,
    pub md_gets: AtomicUsize,
    pub dataset_gets: AtomicUsize,
    pub multicast_gets: AtomicUsize,
    pub enable_posts: AtomicUsize,
    pub fail_dataset_writes: AtomicBool,
    pd_enabled: Mutex<bool>,
    dataset: Mutex<Vec<Vec<u8>>>,
    sessions: Mutex<HashMap<String, String>>,
    next_token: AtomicUsize,
}

impl MockState {
    fn new() -> Self {
        Self {
            pd_gets: AtomicUsize::new(0),
            md_gets: AtomicUsize::new(0),
            dataset_gets: AtomicUsize::new(0),
            multicast_gets: AtomicUsize::new(0),
            enable_posts: AtomicUsize::new(0),
            fail_dataset_writes: AtomicBool::new(false),
            pd_enabled: Mutex::new(false),
            dataset: Mutex::new(vec![vec![0, 0], vec![7, 7, 7]]),
            sessions: Mutex::new(HashMap::new()),
            next_token: AtomicUsize::new(0),
        }
    }

    pub fn pd_enabled(&self) -> bool {
        *self.pd_enabled.lock()
    }

    pub fn dataset_element(&self, idx: usize) -> Vec<u8> {
        self.dataset.lock()[idx].clone()
    }
}

pub async fn spawn_mock() -> (Url, Arc<MockState>) {
    let state = Arc::new(MockState::new());
    let app = router(Arc::clone(&state));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (Url::parse(&format!("http://{addr}")).unwrap(), state)
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/auth/session", get(session_probe))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/ui/theme", post(theme))
        .route("/api/ui/overview", get(overview))
        .route("/api/pd/status", get(pd_status))
        .route("/api/pd/:com_id/enable", post(pd_enable))
        .route("/api/md/session/:id", get(md_session))
        .route("/api/datasets/:id", get(dataset_get))
        .route("/api/datasets/:id/elements/:idx", post(dataset_set))
        .route("/api/network/multicast", get(multicast))
        .route("/api/diag/events", get(events))
        .route("/api/diag/metrics", get(metrics))
        .route("/api/diag/log/export", get(log_export))
        .route("/api/sim/state", get(sim_state))
        .route("/api/time/sync", get(time_sync))
        .route("/api/config/detail", get(config_detail))
        .with_state(state)
}

fn session_role(state: &MockState, headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    let token = cookies
        .split(';')
        .find_map(|part| part.trim().strip_prefix("trdp_session="))?;
    state.sessions.lock().get(token).cloned()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "authentication required" })),
    )
        .into_response()
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "insufficient role" })),
    )
        .into_response()
}

async fn session_probe(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Response {
    match session_role(&state, &headers) {
        Some(role) => Json(identity_json(&role)).into_response(),
        None => unauthorized(),
    }
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let role = match (username, password) {
        ("viewer", "viewer123") => "Viewer",
        ("developer", "dev123") => "Developer",
        ("admin", "admin123") => "Admin",
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid credentials" })),
            )
                .into_response();
        }
    };

    let token = format!("tok-{}", state.next_token.fetch_add(1, Ordering::SeqCst));
    state.sessions.lock().insert(token.clone(), role.to_string());

    let mut response = Json(identity_json(role)).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        format!("trdp_session={token}; Path=/").parse().unwrap(),
    );
    response
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        if let Some(token) = cookies
            .split(';')
            .find_map(|part| part.trim().strip_prefix("trdp_session="))
        {
            state.sessions.lock().remove(token);
        }
    }
    Json(json!({ "status": "ok" })).into_response()
}

async fn theme(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    Json(json!({ "theme": body["theme"] })).into_response()
}

fn identity_json(role: &str) -> Value {
    let username = match role {
        "Viewer" => "viewer",
        "Developer" => "developer",
        _ => "admin",
    };
    json!({ "username": username, "role": role, "theme": "dark" })
}

fn pd_rows(state: &MockState) -> Value {
    json!([{
        "comId": 42,
        "dataSetId": 7,
        "name": "Door Status",
        "direction": "PUBLISH",
        "enabled": *state.pd_enabled.lock(),
        "locked": false,
        "redundantActive": true,
        "activeChannel": 1,
        "stats": { "txCount": 10, "rxCount": 0, "timeoutCount": 0 }
    }])
}

async fn pd_status(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    state.pd_gets.fetch_add(1, Ordering::SeqCst);
    Json(pd_rows(&state)).into_response()
}

async fn pd_enable(
    State(state): State<Arc<MockState>>,
    Path(_com_id): Path<u32>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match session_role(&state, &headers) {
        None => return unauthorized(),
        Some(role) if role == "Viewer" => return forbidden(),
        Some(_) => {}
    }
    state.enable_posts.fetch_add(1, Ordering::SeqCst);
    *state.pd_enabled.lock() = body["enabled"].as_bool().unwrap_or(false);
    Json(pd_rows(&state)).into_response()
}

async fn md_session(
    State(state): State<Arc<MockState>>,
    Path(id): Path<u32>,
    headers: HeaderMap,
) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    state.md_gets.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "sessionId": id,
        "comId": 2002,
        "role": "REQUESTER",
        "state": "REPLY_RECEIVED",
        "protocol": "UDP",
        "stats": { "txCount": 1, "rxCount": 1, "retryCount": 0, "timeoutCount": 0 },
        "exchange": {
            "request": { "hex": "0a0b0c" },
            "response": { "hex": "0d0e0f" }
        }
    }))
    .into_response()
}

fn dataset_json(state: &MockState, id: u32) -> Value {
    let values: Vec<Value> = state
        .dataset
        .lock()
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            json!({
                "name": format!("field{idx}"),
                "type": "UINT8",
                "arraySize": raw.len(),
                "raw": raw,
            })
        })
        .collect();
    json!({
        "dataSetId": id,
        "name": "Traction Command",
        "locked": false,
        "isOutgoing": true,
        "readOnly": false,
        "status": "Active",
        "values": values,
    })
}

async fn dataset_get(
    State(state): State<Arc<MockState>>,
    Path(id): Path<u32>,
    headers: HeaderMap,
) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    state.dataset_gets.fetch_add(1, Ordering::SeqCst);
    Json(dataset_json(&state, id)).into_response()
}

async fn dataset_set(
    State(state): State<Arc<MockState>>,
    Path((id, idx)): Path<(u32, usize)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    match session_role(&state, &headers) {
        None => return unauthorized(),
        Some(role) if role == "Viewer" => return forbidden(),
        Some(_) => {}
    }
    if state.fail_dataset_writes.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "raw payload length mismatch" })),
        )
            .into_response();
    }

    let mut dataset = state.dataset.lock();
    if idx >= dataset.len() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "element index out of range" })),
        )
            .into_response();
    }
    if body["clear"].as_bool().unwrap_or(false) {
        let len = dataset[idx].len();
        dataset[idx] = vec![0; len];
    } else if let Some(raw) = body["raw"].as_array() {
        dataset[idx] = raw
            .iter()
            .map(|v| v.as_u64().unwrap_or(0) as u8)
            .collect();
    }
    drop(dataset);
    Json(dataset_json(&state, id)).into_response()
}

async fn multicast(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    state.multicast_gets.fetch_add(1, Ordering::SeqCst);
    Json(json!([
        { "interface": "bus0", "group": "239.0.0.1", "joined": true, "nic": "eth1" }
    ]))
    .into_response()
}

async fn overview(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "config": { "hostName": "sim-a", "dataSets": 2, "pdTelegrams": 1, "mdTelegrams": 1 },
        "metrics": { "threads": { "pd": true, "md": true, "diag": true, "trdp": true } },
        "events": [],
        "pd": pd_rows(&state),
    }))
    .into_response()
}

async fn events(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    Json(json!([
        { "timestampMs": 100, "component": "pd", "severity": "DEBUG", "message": "cycle start" },
        { "timestampMs": 200, "component": "md", "severity": "WARN", "message": "slow reply" },
        { "timestampMs": 300, "component": "trdp", "severity": "ERROR", "message": "publish failed" }
    ]))
    .into_response()
}

async fn metrics(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "timestampMs": 1000,
        "threads": { "pd": true, "md": true, "diag": true, "trdp": true },
        "pd": { "telegrams": 1, "maxCycleJitterUs": 120 },
        "md": { "sessions": 0, "maxLatencyUs": 0 },
        "trdp": { "initErrors": 0 }
    }))
    .into_response()
}

async fn log_export(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    "2026-08-06 10:00:00 [INFO] pd: cycle start\n".into_response()
}

async fn sim_state(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "stress": { "enabled": false, "pdCycleOverrideUs": 0, "pdBurstTelegrams": 0, "mdBurst": 0, "mdIntervalUs": 0 },
        "redundancy": { "forceSwitch": false, "busFailure": false, "failedChannel": 0 },
        "timeSync": { "ntpOffsetUs": 0, "ptpOffsetUs": 0 },
        "instances": []
    }))
    .into_response()
}

async fn time_sync(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "ntpOffsetUs": 0,
        "ptpOffsetUs": 0,
        "now": { "unixMs": 1754400000000i64, "iso": "2026-08-06T10:00:00Z" }
    }))
    .into_response()
}

async fn config_detail(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if session_role(&state, &headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "device": { "hostName": "sim-a", "leaderName": "sim-a", "type": "ED" },
        "memory": { "memorySize": 1048576, "blocks": [{ "size": 1024, "preallocate": 16 }] },
        "comParameters": [{ "id": 1, "qos": 3, "ttl": 64 }],
        "dataSets": []
    }))
    .into_response()
}
