#![allow(dead_code)]

//! In-process stand-in for the hosted database service (auth, tables, storage),
//! plus helpers to drive the timecapsule router against it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::{Body, Bytes, to_bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;

pub const ANON_KEY: &str = "anon";
pub const SERVICE_KEY: &str = "service";

#[derive(Clone, Debug)]
pub struct FakeUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub metadata: Value,
}

#[derive(Default)]
pub struct FakeState {
    pub users: Vec<FakeUser>,
    pub sessions: HashMap<String, String>,
    pub capsules: Vec<Value>,
    pub items: Vec<Value>,
    pub tags: Vec<Value>,
    pub item_tags: Vec<Value>,
    pub members: Vec<Value>,
    pub objects: HashMap<String, (String, Vec<u8>)>,
    pub calls: Vec<String>,
    pub auto_confirm: bool,
    /// Storage answers every upload with a 400.
    pub reject_uploads: bool,
    /// `capsule_members` selects return rows of the wrong shape.
    pub corrupt_members: bool,
    next_id: u64,
}

impl FakeState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Strictly increasing timestamps so "newest first" is deterministic.
    fn created_at(&mut self) -> String {
        self.next_id += 1;
        (Utc::now() + Duration::seconds(self.next_id as i64)).to_rfc3339()
    }

    fn user_json(user: &FakeUser) -> Value {
        json!({ "id": user.id, "email": user.email, "user_metadata": user.metadata })
    }

    fn issue_session(&mut self, user: &FakeUser) -> Value {
        let token = self.next("token");
        self.sessions.insert(token.clone(), user.id.clone());
        json!({
            "access_token": token,
            "refresh_token": format!("refresh-{token}"),
            "expires_in": 3600,
            "token_type": "bearer",
            "user": Self::user_json(user),
        })
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<FakeUser> {
        let token = bearer(headers)?;
        let id = self.sessions.get(&token)?;
        self.users.iter().find(|u| &u.id == id).cloned()
    }

    pub fn create_user(&mut self, email: &str, password: &str) -> FakeUser {
        let user = FakeUser {
            id: self.next("user"),
            email: email.to_string(),
            password: password.to_string(),
            metadata: json!({}),
        };
        self.users.push(user.clone());
        user
    }

    pub fn set_released(&mut self, capsule_id: &str, released: bool) {
        for c in self.capsules.iter_mut().filter(|c| c["id"] == capsule_id) {
            c["is_released"] = json!(released);
        }
    }

    fn tags_for(&self, item_id: &str) -> Vec<Value> {
        self.item_tags
            .iter()
            .filter(|link| link["capsule_item_id"] == item_id)
            .map(|link| {
                let tag = self.tags.iter().find(|t| t["id"] == link["tag_id"]).cloned();
                json!({ "tags": tag })
            })
            .collect()
    }

    fn embedded_item(&self, item: &Value) -> Value {
        let mut out = item.clone();
        out["capsule_item_tags"] = Value::Array(self.tags_for(item["id"].as_str().unwrap_or("")));
        out
    }
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeSupabase {
    pub url: Url,
    pub state: Shared,
}

impl FakeSupabase {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            auto_confirm: true,
            ..Default::default()
        }));
        let app = Router::new()
            .route("/auth/v1/token", post(auth_token))
            .route("/auth/v1/signup", post(auth_signup))
            .route("/auth/v1/user", get(auth_get_user).put(auth_update_user))
            .route("/auth/v1/logout", post(auth_logout))
            .route("/rest/v1/{table}", get(rest_select).post(rest_insert))
            .route("/storage/v1/object/public/{bucket}/{*path}", get(storage_public))
            .route("/storage/v1/object/{bucket}/{*path}", post(storage_upload))
            .layer(middleware::from_fn_with_state(state.clone(), record_call))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake upstream");
        let addr = listener.local_addr().expect("fake upstream addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            url: Url::parse(&format!("http://{addr}")).expect("fake upstream url"),
            state,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

async fn record_call(
    State(state): State<Shared>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    let line = format!("{} {}", req.method(), req.uri().path());
    state.lock().unwrap().calls.push(line);
    next.run(req).await
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn upstream_error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn auth_token(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut st = state.lock().unwrap();
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let user = st
        .users
        .iter()
        .find(|u| u.email == email && u.password == password)
        .cloned();
    match user {
        Some(user) => Json(st.issue_session(&user)).into_response(),
        None => upstream_error(
            StatusCode::BAD_REQUEST,
            json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" }),
        ),
    }
}

async fn auth_signup(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut st = state.lock().unwrap();
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if st.users.iter().any(|u| u.email == email) {
        return upstream_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "code": 422, "error_code": "user_already_exists", "msg": "User already registered" }),
        );
    }
    let mut user = st.create_user(&email, body["password"].as_str().unwrap_or_default());
    user.metadata = body["data"].clone();
    if let Some(stored) = st.users.iter_mut().find(|u| u.id == user.id) {
        stored.metadata = user.metadata.clone();
    }
    if st.auto_confirm {
        Json(st.issue_session(&user)).into_response()
    } else {
        Json(FakeState::user_json(&user)).into_response()
    }
}

async fn auth_get_user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let st = state.lock().unwrap();
    match st.user_for(&headers) {
        Some(user) => Json(FakeState::user_json(&user)).into_response(),
        None => upstream_error(
            StatusCode::UNAUTHORIZED,
            json!({ "code": 401, "msg": "invalid JWT: unable to parse or verify signature" }),
        ),
    }
}

async fn auth_update_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut st = state.lock().unwrap();
    let Some(user) = st.user_for(&headers) else {
        return upstream_error(StatusCode::UNAUTHORIZED, json!({ "msg": "invalid JWT" }));
    };
    if body["password"].as_str() == Some(user.password.as_str()) {
        return upstream_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "msg": "New password should be different from the old password." }),
        );
    }
    let stored = st
        .users
        .iter_mut()
        .find(|u| u.id == user.id)
        .expect("session user exists");
    if let Some(email) = body["email"].as_str() {
        stored.email = email.to_string();
    }
    if let Some(password) = body["password"].as_str() {
        stored.password = password.to_string();
    }
    let updated = stored.clone();
    Json(FakeState::user_json(&updated)).into_response()
}

async fn auth_logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut st = state.lock().unwrap();
    if let Some(token) = bearer(&headers) {
        st.sessions.remove(&token);
    }
    StatusCode::NO_CONTENT.into_response()
}

fn eq_filter<'a>(query: &'a [(String, String)], column: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == column)
        .and_then(|(_, v)| v.strip_prefix("eq."))
}

async fn rest_select(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().unwrap();
    let apikey = headers
        .get("apikey")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if apikey != ANON_KEY && apikey != SERVICE_KEY {
        return upstream_error(
            StatusCode::UNAUTHORIZED,
            json!({ "message": "Invalid API key", "hint": "Double check your Supabase `anon` or `service_role` API key." }),
        );
    }
    let admin = bearer(&headers).as_deref() == Some(SERVICE_KEY);
    let caller = st.user_for(&headers);

    let rows: Vec<Value> = match table.as_str() {
        "users" => vec![json!({ "count": st.users.len() })],
        "capsule_items" => {
            let released = eq_filter(&query, "capsules.is_released") == Some("true");
            let public = eq_filter(&query, "capsules.is_public_on_release") == Some("true");
            st.items
                .iter()
                .rev()
                .filter_map(|item| {
                    let capsule = st.capsules.iter().find(|c| c["id"] == item["capsule_id"])?;
                    if released && capsule["is_released"] != true {
                        return None;
                    }
                    if public && capsule["is_public_on_release"] != true {
                        return None;
                    }
                    let mut row = st.embedded_item(item);
                    row["capsules"] = json!({
                        "title": capsule["title"],
                        "is_released": capsule["is_released"],
                        "is_public_on_release": capsule["is_public_on_release"],
                    });
                    Some(row)
                })
                .collect()
        }
        "capsules" => {
            let embed = query
                .iter()
                .any(|(k, v)| k == "select" && v.contains("capsule_items("));
            st.capsules
                .iter()
                .rev()
                .filter(|c| eq_filter(&query, "id").is_none_or(|id| c["id"] == id))
                .filter(|c| eq_filter(&query, "owner_id").is_none_or(|o| c["owner_id"] == o))
                .filter(|c| {
                    admin
                        || caller.as_ref().is_some_and(|u| c["owner_id"] == u.id.as_str())
                        || (c["is_released"] == true && c["is_public_on_release"] == true)
                })
                .map(|c| {
                    let mut row = c.clone();
                    if embed {
                        let items: Vec<Value> = st
                            .items
                            .iter()
                            .filter(|i| i["capsule_id"] == c["id"])
                            .map(|i| st.embedded_item(i))
                            .collect();
                        row["capsule_items"] = Value::Array(items);
                    }
                    row
                })
                .collect()
        }
        "capsule_members" if st.corrupt_members => vec![json!({ "unexpected": true })],
        "capsule_members" => st
            .members
            .iter()
            .filter(|m| eq_filter(&query, "capsule_id").is_none_or(|id| m["capsule_id"] == id))
            .cloned()
            .collect(),
        other => {
            return upstream_error(
                StatusCode::NOT_FOUND,
                json!({ "message": format!("relation \"public.{other}\" does not exist") }),
            );
        }
    };
    Json(rows).into_response()
}

async fn rest_insert(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut st = state.lock().unwrap();
    let Some(caller) = st.user_for(&headers) else {
        return upstream_error(
            StatusCode::UNAUTHORIZED,
            json!({ "code": "PGRST301", "message": "JWT expired" }),
        );
    };
    let rows = match body {
        Value::Array(rows) => rows,
        single => vec![single],
    };

    let mut out = Vec::new();
    for mut row in rows {
        match table.as_str() {
            "capsules" => {
                if row["owner_id"] != caller.id.as_str() {
                    return upstream_error(
                        StatusCode::FORBIDDEN,
                        json!({ "code": "42501", "message": "new row violates row-level security policy for table \"capsules\"" }),
                    );
                }
                row["id"] = json!(st.next("capsule"));
                row["created_at"] = json!(st.created_at());
                st.capsules.push(row.clone());
            }
            "capsule_items" => {
                row["id"] = json!(st.next("item"));
                row["created_at"] = json!(st.created_at());
                st.items.push(row.clone());
            }
            "tags" => {
                assert!(
                    query.iter().any(|(k, v)| k == "on_conflict" && v == "name"),
                    "tags must be upserted on name"
                );
                let existing = st.tags.iter().find(|t| t["name"] == row["name"]).cloned();
                row = match existing {
                    Some(tag) => tag,
                    None => {
                        row["id"] = json!(st.next("tag"));
                        st.tags.push(row.clone());
                        row
                    }
                };
            }
            "capsule_item_tags" => st.item_tags.push(row.clone()),
            "capsule_members" => {
                if st.members.iter().any(|m| {
                    m["capsule_id"] == row["capsule_id"] && m["user_id"] == row["user_id"]
                }) {
                    return upstream_error(
                        StatusCode::CONFLICT,
                        json!({ "code": "23505", "message": "duplicate key value violates unique constraint \"capsule_members_pkey\"" }),
                    );
                }
                row["created_at"] = json!(st.created_at());
                st.members.push(row.clone());
            }
            other => {
                return upstream_error(
                    StatusCode::NOT_FOUND,
                    json!({ "message": format!("relation \"public.{other}\" does not exist") }),
                );
            }
        }
        out.push(row);
    }
    (StatusCode::CREATED, Json(out)).into_response()
}

async fn storage_upload(
    State(state): State<Shared>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut st = state.lock().unwrap();
    if st.user_for(&headers).is_none() {
        return upstream_error(
            StatusCode::BAD_REQUEST,
            json!({ "statusCode": "403", "error": "Unauthorized", "message": "new row violates row-level security policy" }),
        );
    }
    if st.reject_uploads {
        return upstream_error(
            StatusCode::BAD_REQUEST,
            json!({ "statusCode": "413", "error": "Payload too large", "message": "The object exceeded the maximum allowed size" }),
        );
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    st.objects
        .insert(format!("{bucket}/{path}"), (content_type, body.to_vec()));
    Json(json!({ "Key": format!("{bucket}/{path}") })).into_response()
}

async fn storage_public(
    State(state): State<Shared>,
    Path((bucket, path)): Path<(String, String)>,
) -> Response {
    let st = state.lock().unwrap();
    match st.objects.get(&format!("{bucket}/{path}")) {
        Some((content_type, bytes)) => (
            [(header::CONTENT_TYPE, content_type.clone())],
            bytes.clone(),
        )
            .into_response(),
        None => upstream_error(
            StatusCode::NOT_FOUND,
            json!({ "statusCode": "404", "error": "not_found", "message": "Object not found" }),
        ),
    }
}

// App under test.

pub struct TestApp {
    pub app: Router,
    pub fake: FakeSupabase,
}

pub fn test_config(upstream: &Url) -> timecapsule::config::Config {
    let mut cfg = timecapsule::config::Config::default();
    cfg.supabase.url = upstream.clone();
    cfg.supabase.anon_key = ANON_KEY.to_string();
    cfg.supabase.service_role_key = Some(SERVICE_KEY.to_string());
    cfg.supabase.request_timeout_secs = 5;
    cfg.session.insecure_cookie = true;
    cfg.session.cookie_secret = Some("s".repeat(64));
    cfg
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(tweak: impl FnOnce(&mut timecapsule::config::Config)) -> TestApp {
    let fake = FakeSupabase::spawn().await;
    let mut cfg = test_config(&fake.url);
    tweak(&mut cfg);
    let supabase = timecapsule::SupabaseClient::new(&cfg).expect("client");
    let state = timecapsule::router::TimecapsuleState::new(supabase, &cfg);
    TestApp {
        app: timecapsule::router::timecapsule_router(state),
        fake,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` pairs of every cookie set (not removed) by the response.
    pub fn cookies(&self) -> String {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter(|pair| pair.split_once('=').is_some_and(|(_, value)| !value.is_empty()))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn error_message(&self) -> &str {
        self.body["error"]["message"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self.app.clone().oneshot(req).await.expect("request failed");
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Value,
        cookies: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn get(&self, uri: &str, cookies: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    /// Creates an account upstream and signs in through the API; returns the session cookies.
    pub async fn signed_in(&self, email: &str, password: &str) -> String {
        self.fake.state.lock().unwrap().create_user(email, password);
        let resp = self
            .json(
                Method::POST,
                "/api/auth/signin",
                json!({ "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "sign-in failed: {:?}", resp.body);
        resp.cookies()
    }

    pub async fn multipart(
        &self,
        uri: &str,
        parts: &[Part<'_>],
        cookies: Option<&str>,
    ) -> TestResponse {
        let (content_type, body) = multipart_body(parts);
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        self.send(builder.body(Body::from(body)).expect("request"))
            .await
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

const BOUNDARY: &str = "timecapsule-test-boundary";

pub fn multipart_body(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
