#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{OriginalUri, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use fleet_api_client::{ApiClient, ClientConfig, MemoryStore, RefreshToken, TenantTemplate, TokenPair};

pub const REFRESH_TOKEN: &str = "refresh-token";
pub const FRESH_TOKEN: &str = "fresh-token";
pub const STALE_TOKEN: &str = "stale-token";
pub const PASSWORD: &str = "correct-horse";

/// One request observed by a protected endpoint.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub authorization: Option<String>,
    pub company: Option<String>,
}

/// Scriptable stand-in for the fleet backend.
pub struct Backend {
    pub accepted_token: Mutex<String>,
    pub issued_token: Mutex<String>,
    pub refresh_ok: AtomicBool,
    pub refresh_delay: Duration,
    /// Refresh token handed out alongside each new access token.
    pub rotated_refresh: Option<&'static str>,
    pub refresh_calls: AtomicUsize,
    pub refresh_bodies: Mutex<Vec<Value>>,
    pub refresh_paths: Mutex<Vec<String>>,
    pub login_paths: Mutex<Vec<String>>,
    pub validated_domains: Mutex<Vec<String>>,
    pub validation_content_types: Mutex<Vec<Option<String>>>,
    pub seen: Mutex<Vec<Seen>>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            accepted_token: Mutex::new(FRESH_TOKEN.into()),
            issued_token: Mutex::new(FRESH_TOKEN.into()),
            refresh_ok: AtomicBool::new(true),
            refresh_delay: Duration::ZERO,
            rotated_refresh: None,
            refresh_calls: AtomicUsize::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            refresh_paths: Mutex::new(Vec::new()),
            login_paths: Mutex::new(Vec::new()),
            validated_domains: Mutex::new(Vec::new()),
            validation_content_types: Mutex::new(Vec::new()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Backend {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn login_paths(&self) -> Vec<String> {
        self.login_paths.lock().unwrap().clone()
    }

    /// Records the request and checks its bearer token.
    fn authorize(&self, uri: &OriginalUri, headers: &HeaderMap) -> Result<(), Response> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let authorization = header(AUTHORIZATION.as_str());
        self.seen.lock().unwrap().push(Seen {
            path: uri.0.path().to_owned(),
            authorization: authorization.clone(),
            company: header("x-company-name"),
        });

        let expected = format!("Bearer {}", self.accepted_token.lock().unwrap());
        if authorization.as_deref() == Some(expected.as_str()) {
            Ok(())
        } else {
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Given token not valid for any token type" })),
            )
                .into_response())
        }
    }
}

async fn login(
    State(backend): State<Arc<Backend>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<Value>,
) -> Response {
    backend.login_paths.lock().unwrap().push(uri.path().to_owned());

    let username = body["username"].as_str().unwrap_or_default();
    if username == "blocked" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "detail": "This account has been disabled." })),
        )
            .into_response();
    }
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response();
    }

    let access = backend.issued_token.lock().unwrap().clone();
    Json(json!({
        "user": { "id": 1, "username": username, "email": "dispatch@acme.test" },
        "access_token": access,
        "refresh_token": REFRESH_TOKEN,
    }))
    .into_response()
}

async fn refresh(
    State(backend): State<Arc<Backend>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<Value>,
) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    backend.refresh_bodies.lock().unwrap().push(body.clone());
    backend.refresh_paths.lock().unwrap().push(uri.path().to_owned());
    if !backend.refresh_delay.is_zero() {
        tokio::time::sleep(backend.refresh_delay).await;
    }

    let known = body["refresh"] == REFRESH_TOKEN
        || backend.rotated_refresh.is_some_and(|r| body["refresh"] == r);
    if !backend.refresh_ok.load(Ordering::SeqCst) || !known {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired" })),
        )
            .into_response();
    }
    let access = backend.issued_token.lock().unwrap().clone();
    match backend.rotated_refresh {
        Some(rotated) => Json(json!({ "access": access, "refresh": rotated })).into_response(),
        None => Json(json!({ "access": access })).into_response(),
    }
}

async fn me(
    State(backend): State<Arc<Backend>>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = backend.authorize(&uri, &headers) {
        return rejection;
    }
    Json(json!({ "id": 1, "username": "dispatch", "is_staff": true })).into_response()
}

async fn vehicle_stats(
    State(backend): State<Arc<Backend>>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = backend.authorize(&uri, &headers) {
        return rejection;
    }
    Json(json!({ "total": 42, "active": 40, "in_maintenance": 2 })).into_response()
}

async fn alerts(
    State(backend): State<Arc<Backend>>,
    uri: OriginalUri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = backend.authorize(&uri, &headers) {
        return rejection;
    }
    Json(json!({
        "count": 1,
        "next": null,
        "previous": null,
        "results": [{ "id": 5, "status": query.get("status"), "page": query.get("page") }],
    }))
    .into_response()
}

async fn create_vehicle(
    State(backend): State<Arc<Backend>>,
    uri: OriginalUri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = backend.authorize(&uri, &headers) {
        return rejection;
    }
    (StatusCode::CREATED, Json(json!({ "id": 9, "echo": body }))).into_response()
}

async fn remove_vehicle(
    State(backend): State<Arc<Backend>>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = backend.authorize(&uri, &headers) {
        return rejection;
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn forbidden(
    State(backend): State<Arc<Backend>>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = backend.authorize(&uri, &headers) {
        return rejection;
    }
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "detail": "You do not have permission to manage SIM cards." })),
    )
        .into_response()
}

async fn validate_domain(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let domain = query.get("domain").cloned().unwrap_or_default();
    backend.validated_domains.lock().unwrap().push(domain.clone());
    backend.validation_content_types.lock().unwrap().push(
        headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    );

    match domain.as_str() {
        "acmecorp.fleet.test" => Json(json!({ "valid": true, "tenant": "acmecorp" })).into_response(),
        "dormantfleet.fleet.test" => Json(json!({ "valid": false })).into_response(),
        "ghostboth.fleet.test" => Json(json!({ "valid": false, "exists": false })).into_response(),
        "oddverdict.fleet.test" => Json(json!({ "valid": "false" })).into_response(),
        "badcorp.fleet.test" => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "domain": ["Enter a valid domain."] })),
        )
            .into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response(),
    }
}

fn api_routes() -> Router<Arc<Backend>> {
    Router::new()
        .route("/users/login_with_password", post(login))
        .route("/users/refresh_token/", post(refresh))
        .route("/users/users/me", get(me))
        .route("/fleet/vehicles/dashboard_stats/", get(vehicle_stats))
        .route("/fleet/vehicles/", post(create_vehicle))
        .route("/fleet/vehicles/9/", axum::routing::delete(remove_vehicle))
        .route("/fleet/alerts/", get(alerts))
        .route("/fleet/sim_cards/", get(forbidden))
}

/// Serves the fake backend on an ephemeral port.
pub async fn spawn(backend: Arc<Backend>) -> SocketAddr {
    let app = Router::new()
        .route("/api/tenant/validate-domain/", get(validate_domain))
        .merge(api_routes())
        .nest("/tenants/{tenant}", api_routes())
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Client configuration pointing at a fake backend on `addr`, tenants
/// nested under `/tenants/{tenant}`.
pub fn config_for(addr: SocketAddr) -> ClientConfig {
    let base = format!("http://{addr}");
    let template =
        TenantTemplate::new("{tenant}.fleet.test", format!("{base}/tenants/{{tenant}}")).unwrap();
    ClientConfig::new(base.parse().unwrap())
        .with_tenant_template(template)
        .with_timeout(Duration::from_secs(5))
}

pub struct Harness {
    pub backend: Arc<Backend>,
    pub store: Arc<MemoryStore>,
    pub client: ApiClient,
    pub redirects: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_backend(Backend::default()).await
    }

    pub async fn with_backend(backend: Backend) -> Self {
        let backend = Arc::new(backend);
        let addr = spawn(backend.clone()).await;
        Self::connect(backend, addr)
    }

    pub fn connect(backend: Arc<Backend>, addr: SocketAddr) -> Self {
        Self::connect_with(backend, config_for(addr))
    }

    pub fn connect_with(backend: Arc<Backend>, config: ClientConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let redirects = Arc::new(Mutex::new(Vec::new()));
        let sink = redirects.clone();
        let client = ApiClient::new(config, store.clone())
            .unwrap()
            .with_navigator(move |route: &str| sink.lock().unwrap().push(route.to_owned()));

        Self {
            backend,
            store,
            client,
            redirects,
        }
    }

    /// Puts a session in the store as if a login had happened earlier.
    pub fn seed_session(&self, access: &str) {
        self.client
            .session()
            .store_tokens(&TokenPair {
                access_token: access.into(),
                refresh_token: Some(RefreshToken::from(REFRESH_TOKEN)),
            })
            .unwrap();
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}
