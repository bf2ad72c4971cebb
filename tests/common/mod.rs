//! In-process fake of the Supabase Management API Edge Functions endpoints.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const PROJECT_REF: &str = "mayuaycdtijbctgqbycg";
pub const ACCESS_TOKEN: &str = "sbp_test_token";
pub const CREATED_AT: i64 = 1704067200;

/// A function as stored by the fake API.
#[derive(Debug, Clone)]
pub struct StoredFunction {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub status: String,
    pub version: i64,
    pub verify_jwt: bool,
    pub updated_at: i64,
    pub body: String,
}

/// What the fake saw in a deploy request.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub slug: String,
    pub metadata: Value,
    pub files: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub functions: BTreeMap<(String, String), StoredFunction>,
    pub deploys: Vec<DeployRequest>,
    pub user_agents: Vec<String>,
    /// Answer the next request with this status and body instead.
    pub fail_next: Option<(StatusCode, String)>,
    /// Leave `created_at` out of deploy responses.
    pub omit_created_at_on_deploy: bool,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeApi {
    pub url: String,
    pub state: Shared,
}

impl FakeApi {
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = Router::new()
            .route("/v1/projects/:project_ref/functions/deploy", post(deploy))
            .route(
                "/v1/projects/:project_ref/functions/:slug",
                get(get_function).delete(delete_function),
            )
            .route("/v1/projects/:project_ref/functions/:slug/body", get(get_body))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn provider_config(&self) -> Value {
        json!({"endpoint": self.url, "access_token": ACCESS_TOKEN})
    }

    pub fn fail_next(&self, status: StatusCode, body: &str) {
        self.state.lock().unwrap().fail_next = Some((status, body.to_string()));
    }

    pub fn insert(&self, slug: &str) {
        self.state.lock().unwrap().functions.insert(
            (PROJECT_REF.to_string(), slug.to_string()),
            StoredFunction {
                id: format!("func-{}", slug),
                slug: slug.to_string(),
                name: slug.to_string(),
                status: "ACTIVE".to_string(),
                version: 3,
                verify_jwt: false,
                updated_at: CREATED_AT + 300,
                body: "export default {}".to_string(),
            },
        );
    }

    pub fn function(&self, slug: &str) -> Option<StoredFunction> {
        self.state
            .lock()
            .unwrap()
            .functions
            .get(&(PROJECT_REF.to_string(), slug.to_string()))
            .cloned()
    }

    pub fn last_deploy(&self) -> DeployRequest {
        self.state.lock().unwrap().deploys.last().cloned().unwrap()
    }
}

/// Checks auth and injected failures shared by every route.
fn precheck(state: &Shared, headers: &HeaderMap) -> Option<Response> {
    let mut state = state.lock().unwrap();
    if let Some(agent) = headers.get("user-agent").and_then(|v| v.to_str().ok()) {
        state.user_agents.push(agent.to_string());
    }

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", ACCESS_TOKEN));
    if !authorized {
        return Some((StatusCode::UNAUTHORIZED, "{\"message\":\"Unauthorized\"}").into_response());
    }

    state
        .fail_next
        .take()
        .map(|(status, body)| (status, body).into_response())
}

fn function_json(f: &StoredFunction) -> Value {
    json!({
        "id": f.id,
        "slug": f.slug,
        "name": f.name,
        "status": f.status,
        "version": f.version,
        "created_at": CREATED_AT,
        "updated_at": f.updated_at,
        "verify_jwt": f.verify_jwt,
    })
}

#[derive(Deserialize)]
struct DeployQuery {
    slug: String,
}

async fn deploy(
    State(state): State<Shared>,
    Path(project_ref): Path<String>,
    Query(query): Query<DeployQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut metadata = Value::Null;
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let text = field.text().await.unwrap();
        match name.as_str() {
            "metadata" => metadata = serde_json::from_str(&text).unwrap(),
            "file" => files.push((file_name.unwrap_or_default(), text)),
            other => panic!("unexpected form field {}", other),
        }
    }

    // The body is drained first so early answers do not reset the upload.
    if let Some(response) = precheck(&state, &headers) {
        return response;
    }

    let mut state = state.lock().unwrap();
    let key = (project_ref, query.slug.clone());
    let previous = state.functions.get(&key).cloned();
    let version = previous.as_ref().map_or(1, |f| f.version + 1);
    let body = files
        .iter()
        .map(|(_, text)| text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let function = StoredFunction {
        id: previous
            .map(|f| f.id)
            .unwrap_or_else(|| format!("func-{}", query.slug)),
        slug: query.slug.clone(),
        name: metadata["name"]
            .as_str()
            .unwrap_or(&query.slug)
            .to_string(),
        status: "ACTIVE".to_string(),
        version,
        verify_jwt: metadata["verify_jwt"].as_bool().unwrap_or(true),
        updated_at: CREATED_AT + version * 100,
        body,
    };

    let mut response = function_json(&function);
    if state.omit_created_at_on_deploy {
        if let Some(fields) = response.as_object_mut() {
            fields.remove("created_at");
        }
    }
    state.functions.insert(key, function);
    state.deploys.push(DeployRequest {
        slug: query.slug,
        metadata,
        files,
    });
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn get_function(
    State(state): State<Shared>,
    Path((project_ref, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = precheck(&state, &headers) {
        return response;
    }
    match state.lock().unwrap().functions.get(&(project_ref, slug)) {
        Some(f) => Json(function_json(f)).into_response(),
        None => (StatusCode::NOT_FOUND, "{\"message\":\"Function not found\"}").into_response(),
    }
}

async fn delete_function(
    State(state): State<Shared>,
    Path((project_ref, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = precheck(&state, &headers) {
        return response;
    }
    match state.lock().unwrap().functions.remove(&(project_ref, slug)) {
        Some(_) => StatusCode::OK.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_body(
    State(state): State<Shared>,
    Path((project_ref, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = precheck(&state, &headers) {
        return response;
    }
    match state.lock().unwrap().functions.get(&(project_ref, slug)) {
        Some(f) => f.body.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "{\"message\":\"Function not found\"}").into_response(),
    }
}

/// A source tree with an entrypoint and one nested module.
pub fn source_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("lib")).unwrap();
    std::fs::write(
        dir.path().join("index.ts"),
        "import { greet } from './lib/greet.ts'\nDeno.serve(() => new Response(greet()))",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("lib/greet.ts"),
        "export const greet = () => 'hello'",
    )
    .unwrap();
    dir
}

pub fn function_config(slug: &str, source_dir: &std::path::Path) -> Value {
    json!({
        "project_ref": PROJECT_REF,
        "slug": slug,
        "entrypoint_path": "index.ts",
        "source_dir": source_dir.to_string_lossy(),
    })
}
