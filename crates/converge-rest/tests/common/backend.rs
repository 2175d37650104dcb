//! In-memory feed backend
//!
//! A small document store with users, channels, a change feed and a single
//! "all docs" view. Visibility of feed entries and view rows can be scripted
//! per request to simulate a backend that converges over time.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use converge_rest::backend::{Backend, StoreSpec, UserAccess, GUEST_USERNAME};
use converge_rest::Identity;
use serde_json::{json, Value};

type SharedState = Arc<FeedState>;

#[derive(Debug, Clone)]
struct User {
    password: String,
    access: UserAccess,
}

#[derive(Debug, Clone)]
struct Doc {
    seq: u64,
    id: String,
    channels: Vec<String>,
}

impl Doc {
    fn change_entry(&self) -> Value {
        json!({
            "seq": self.seq,
            "id": self.id,
            "changes": [{ "rev": format!("1-{:04x}", self.seq) }],
        })
    }
}

#[derive(Debug)]
struct Database {
    spec: StoreSpec,
    users: HashMap<String, User>,
    docs: Vec<Doc>,
    last_seq: u64,
}

impl Database {
    fn new(spec: StoreSpec) -> Self {
        let mut users = HashMap::new();
        users.insert(
            GUEST_USERNAME.to_string(),
            User {
                password: String::new(),
                access: UserAccess::guest(false),
            },
        );
        Self {
            spec,
            users,
            docs: Vec::new(),
            last_seq: 0,
        }
    }

    fn authenticate(&self, headers: &HeaderMap) -> std::result::Result<UserAccess, Response> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            let guest = &self.users[GUEST_USERNAME];
            if guest.access.disabled {
                return Err(error(StatusCode::UNAUTHORIZED, "Login required"));
            }
            return Ok(guest.access.clone());
        };

        let identity = Identity::from_authorization(value)
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Invalid login"))?;
        let user = self
            .users
            .get(&identity.username)
            .filter(|user| !user.access.disabled)
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Invalid login"))?;

        let empty_ok = self.spec.allow_empty_password && identity.password.is_empty();
        if user.password != identity.password && !empty_ok {
            return Err(error(StatusCode::UNAUTHORIZED, "Invalid login"));
        }
        Ok(user.access.clone())
    }

    fn visible_docs(&self, access: &UserAccess) -> Vec<&Doc> {
        self.docs
            .iter()
            .filter(|doc| doc.channels.iter().any(|channel| access.can_see(channel)))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Inner {
    databases: HashMap<String, Database>,
    created: Vec<StoreSpec>,
    reset: Vec<String>,
    changes_script: VecDeque<usize>,
    view_script: VecDeque<usize>,
    changes_body: Option<String>,
}

#[derive(Debug, Default)]
struct FeedState {
    inner: Mutex<Inner>,
    changes_requests: AtomicUsize,
    view_requests: AtomicUsize,
}

/// Next scripted visibility limit; the last entry sticks
fn next_limit(script: &mut VecDeque<usize>) -> Option<usize> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().copied()
    }
}

fn error(status: StatusCode, reason: &str) -> Response {
    let name = status.canonical_reason().unwrap_or("error");
    (status, Json(json!({ "error": name, "reason": reason }))).into_response()
}

fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "missing")
}

/// Feed backend shared between the trait implementation and its routers
#[derive(Debug, Clone, Default)]
pub struct FeedBackend {
    state: SharedState,
}

impl FeedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how many feed entries each successive request may see
    pub fn script_changes(&self, limits: &[usize]) {
        self.state.inner.lock().unwrap().changes_script = limits.iter().copied().collect();
    }

    /// Limit how many view rows each successive request may see
    pub fn script_view(&self, limits: &[usize]) {
        self.state.inner.lock().unwrap().view_script = limits.iter().copied().collect();
    }

    /// Serve `body` verbatim (status 200) from every change feed
    pub fn override_changes_body(&self, body: &str) {
        self.state.inner.lock().unwrap().changes_body = Some(body.to_string());
    }

    pub fn changes_requests(&self) -> usize {
        self.state.changes_requests.load(Ordering::SeqCst)
    }

    pub fn view_requests(&self) -> usize {
        self.state.view_requests.load(Ordering::SeqCst)
    }

    /// Specs of every store created, in order
    pub fn created_stores(&self) -> Vec<StoreSpec> {
        self.state.inner.lock().unwrap().created.clone()
    }

    /// Names of every store reset, in order
    pub fn reset_stores(&self) -> Vec<String> {
        self.state.inner.lock().unwrap().reset.clone()
    }

    /// Current access state of a user, if the database and user exist
    pub fn access_of(&self, database: &str, username: &str) -> Option<UserAccess> {
        let inner = self.state.inner.lock().unwrap();
        inner
            .databases
            .get(database)
            .and_then(|db| db.users.get(username))
            .map(|user| user.access.clone())
    }
}

#[async_trait]
impl Backend for FeedBackend {
    fn name(&self) -> &'static str {
        "feed"
    }

    fn admin_handler(&self) -> Router {
        Router::new()
            .route("/{db}/", get(admin_db_info))
            .route("/{db}/_changes", get(admin_changes))
            .route("/{db}/_user/{name}", get(get_user).put(put_user))
            .route("/{db}/_design/{ddoc}/_view/{view}", get(query_view))
            .route("/{db}/{docid}", get(admin_get_doc).put(put_doc))
            .with_state(self.state.clone())
    }

    fn public_handler(&self) -> Router {
        Router::new()
            .route("/{db}/", get(public_db_info))
            .route("/{db}/_changes", get(public_changes))
            .route("/{db}/{docid}", get(public_get_doc))
            .with_state(self.state.clone())
    }

    async fn create_store(&self, spec: &StoreSpec) -> Result<()> {
        let mut inner = self.state.inner.lock().unwrap();
        if inner.created.iter().any(|created| created.name == spec.name) {
            bail!("store '{}' already exists", spec.name);
        }
        if inner.databases.contains_key(&spec.database) {
            bail!("database '{}' already exists", spec.database);
        }
        inner
            .databases
            .insert(spec.database.clone(), Database::new(spec.clone()));
        inner.created.push(spec.clone());
        Ok(())
    }

    async fn reset_store(&self, spec: &StoreSpec) -> Result<()> {
        let mut inner = self.state.inner.lock().unwrap();
        inner.databases.remove(&spec.database);
        inner.reset.push(spec.name.clone());
        Ok(())
    }

    async fn user_access(&self, database: &str, username: &str) -> Result<UserAccess> {
        let inner = self.state.inner.lock().unwrap();
        let db = inner
            .databases
            .get(database)
            .ok_or_else(|| anyhow!("no database '{}'", database))?;
        db.users
            .get(username)
            .map(|user| user.access.clone())
            .ok_or_else(|| anyhow!("no user '{}' in '{}'", username, database))
    }

    async fn save_user_access(
        &self,
        database: &str,
        username: &str,
        access: &UserAccess,
    ) -> Result<()> {
        let mut inner = self.state.inner.lock().unwrap();
        let db = inner
            .databases
            .get_mut(database)
            .ok_or_else(|| anyhow!("no database '{}'", database))?;
        let user = db
            .users
            .get_mut(username)
            .ok_or_else(|| anyhow!("no user '{}' in '{}'", username, database))?;
        user.access = access.clone();
        Ok(())
    }

    async fn wait_for_sequence(&self, database: &str, seq: u64) -> Result<()> {
        let inner = self.state.inner.lock().unwrap();
        let db = inner
            .databases
            .get(database)
            .ok_or_else(|| anyhow!("no database '{}'", database))?;
        if seq > db.last_seq {
            bail!("sequence {} not reached (last is {})", seq, db.last_seq);
        }
        Ok(())
    }
}

fn changes_response(state: &FeedState, db: &str, access: Option<&UserAccess>) -> Response {
    state.changes_requests.fetch_add(1, Ordering::SeqCst);
    let mut inner = state.inner.lock().unwrap();

    if let Some(body) = inner.changes_body.clone() {
        return (StatusCode::OK, [(CONTENT_TYPE, "application/json")], body).into_response();
    }

    let limit = next_limit(&mut inner.changes_script);
    let Some(database) = inner.databases.get(db) else {
        return not_found();
    };

    let access = access.cloned().unwrap_or_else(|| UserAccess::guest(true));

    let mut docs = database.visible_docs(&access);
    if let Some(limit) = limit {
        docs.truncate(limit);
    }
    let results: Vec<Value> = docs.iter().map(|doc| doc.change_entry()).collect();
    let last_seq = docs.last().map(|doc| doc.seq).unwrap_or(0);

    Json(json!({ "results": results, "last_seq": last_seq.to_string() })).into_response()
}

async fn admin_changes(State(state): State<SharedState>, Path(db): Path<String>) -> Response {
    changes_response(&state, &db, None)
}

async fn public_changes(
    State(state): State<SharedState>,
    Path(db): Path<String>,
    headers: HeaderMap,
) -> Response {
    let access = {
        let inner = state.inner.lock().unwrap();
        let Some(database) = inner.databases.get(&db) else {
            return not_found();
        };
        match database.authenticate(&headers) {
            Ok(access) => access,
            Err(response) => return response,
        }
    };
    changes_response(&state, &db, Some(&access))
}

async fn admin_db_info(State(state): State<SharedState>, Path(db): Path<String>) -> Response {
    let inner = state.inner.lock().unwrap();
    match inner.databases.get(&db) {
        Some(database) => {
            Json(json!({ "db_name": db, "update_seq": database.last_seq })).into_response()
        }
        None => not_found(),
    }
}

async fn public_db_info(
    State(state): State<SharedState>,
    Path(db): Path<String>,
    headers: HeaderMap,
) -> Response {
    let inner = state.inner.lock().unwrap();
    let Some(database) = inner.databases.get(&db) else {
        return not_found();
    };
    match database.authenticate(&headers) {
        Ok(_) => Json(json!({ "db_name": db })).into_response(),
        Err(response) => response,
    }
}

async fn get_user(
    State(state): State<SharedState>,
    Path((db, name)): Path<(String, String)>,
) -> Response {
    let inner = state.inner.lock().unwrap();
    let user = inner
        .databases
        .get(&db)
        .and_then(|database| database.users.get(&name));
    match user {
        Some(user) => Json(json!({
            "name": name,
            "disabled": user.access.disabled,
            "admin_channels": user.access.explicit_channels.keys().collect::<Vec<_>>(),
        }))
        .into_response(),
        None => not_found(),
    }
}

async fn put_user(
    State(state): State<SharedState>,
    Path((db, name)): Path<(String, String)>,
    body: String,
) -> Response {
    let Ok(body) = serde_json::from_str::<Value>(&body) else {
        return error(StatusCode::BAD_REQUEST, "Invalid JSON");
    };
    let password = body["password"].as_str().unwrap_or_default().to_string();
    let channels: BTreeMap<String, u64> = body["admin_channels"]
        .as_array()
        .map(|channels| {
            channels
                .iter()
                .filter_map(Value::as_str)
                .map(|channel| (channel.to_string(), 1))
                .collect()
        })
        .unwrap_or_default();

    let mut inner = state.inner.lock().unwrap();
    let Some(database) = inner.databases.get_mut(&db) else {
        return not_found();
    };
    database.users.insert(
        name,
        User {
            password,
            access: UserAccess {
                disabled: false,
                explicit_channels: channels,
            },
        },
    );
    StatusCode::CREATED.into_response()
}

async fn put_doc(
    State(state): State<SharedState>,
    Path((db, docid)): Path<(String, String)>,
    body: String,
) -> Response {
    let Ok(body) = serde_json::from_str::<Value>(&body) else {
        return error(StatusCode::BAD_REQUEST, "Invalid JSON");
    };
    let channels: Vec<String> = body["channels"]
        .as_array()
        .map(|channels| {
            channels
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut inner = state.inner.lock().unwrap();
    let Some(database) = inner.databases.get_mut(&db) else {
        return not_found();
    };
    database.last_seq += 1;
    let doc = Doc {
        seq: database.last_seq,
        id: docid,
        channels,
    };
    let rev = format!("1-{:04x}", doc.seq);
    let response = json!({ "ok": true, "id": doc.id, "rev": rev });
    database.docs.push(doc);
    (StatusCode::CREATED, Json(response)).into_response()
}

fn doc_response(database: &Database, docid: &str, access: &UserAccess) -> Response {
    let doc = database
        .visible_docs(access)
        .into_iter()
        .find(|doc| doc.id == docid);
    match doc {
        Some(doc) => Json(json!({
            "_id": doc.id,
            "_rev": format!("1-{:04x}", doc.seq),
            "channels": doc.channels,
        }))
        .into_response(),
        None => not_found(),
    }
}

async fn admin_get_doc(
    State(state): State<SharedState>,
    Path((db, docid)): Path<(String, String)>,
) -> Response {
    let inner = state.inner.lock().unwrap();
    match inner.databases.get(&db) {
        Some(database) => doc_response(database, &docid, &UserAccess::guest(true)),
        None => not_found(),
    }
}

async fn public_get_doc(
    State(state): State<SharedState>,
    Path((db, docid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let inner = state.inner.lock().unwrap();
    let Some(database) = inner.databases.get(&db) else {
        return not_found();
    };
    match database.authenticate(&headers) {
        Ok(access) => doc_response(database, &docid, &access),
        Err(response) => response,
    }
}

async fn query_view(
    State(state): State<SharedState>,
    Path((db, _ddoc, _view)): Path<(String, String, String)>,
) -> Response {
    state.view_requests.fetch_add(1, Ordering::SeqCst);
    let mut inner = state.inner.lock().unwrap();
    let limit = next_limit(&mut inner.view_script);
    let Some(database) = inner.databases.get(&db) else {
        return not_found();
    };

    let total_rows = database.docs.len();
    let rows: Vec<Value> = database
        .docs
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|doc| json!({ "id": doc.id, "key": doc.id, "value": doc.channels }))
        .collect();

    Json(json!({ "total_rows": total_rows, "rows": rows })).into_response()
}
