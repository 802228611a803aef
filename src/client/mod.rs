//! Authenticated, tenant-aware HTTP client for the fleet backend.
//!
//! Every request passes through the same pipeline:
//!
//! 1. attach `Authorization: Bearer <token>` and `X-Company-Name` from the session
//! 2. send
//! 3. on 401, refresh the access token once (single-flight) and replay the
//!    request once with the new token
//! 4. if the refresh fails, clear the session, ask the [`Navigator`] to show
//!    the sign-in screen and return [`Error::SessionExpired`]
//! 5. map 403 to [`Error::AccessDenied`] and every other failure status to
//!    [`Error::Api`]

mod auth;
mod fleet;
mod refresh;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, extract_message};
use crate::navigator::{LogNavigator, Navigator};
use crate::session::Session;
use crate::store::CredentialStore;
use crate::types::AccessToken;

pub use auth::ValidatedTenant;
pub use fleet::{AlertQuery, DashboardResource};
pub use refresh::RefreshFailure;

/// Header carrying the normalized tenant identifier.
pub const COMPANY_HEADER: HeaderName = HeaderName::from_static("x-company-name");

/// Fleet backend client.
///
/// Create one at application start and share it (e.g. behind an `Arc`);
/// concurrent requests share a single refresh.
///
/// ```rust,ignore
/// let store = Arc::new(FileStore::open(data_dir.join("credentials.json"))?);
/// let client = ApiClient::new(ClientConfig::from_env()?, store)?
///     .with_navigator(|route: &str| ui.show_login(route));
///
/// client.login_with_company("Acme Corp", "dispatch", "hunter2").await?;
/// let me = client.get_current_user().await?;
/// ```
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    session: Session,
    navigator: Arc<dyn Navigator>,
    refresh_gate: Mutex<()>,
    /// Forced sign-outs so far; bumped under `refresh_gate`.
    sign_outs: AtomicU64,
}

impl ApiClient {
    /// Create a client persisting credentials in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;
        let session = Session::new(store, config.secure_cookies);
        Ok(Self {
            config,
            http,
            session,
            navigator: Arc::new(LogNavigator),
            refresh_gate: Mutex::new(()),
            sign_outs: AtomicU64::new(0),
        })
    }

    /// Hook called when the session expires and cannot be refreshed.
    #[must_use]
    pub fn with_navigator(mut self, navigator: impl Navigator) -> Self {
        self.navigator = Arc::new(navigator);
        self
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The configured timeout and default headers are not applied to a custom
    /// client; authenticated calls still get theirs from the pipeline.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Base URL for authenticated calls: the stored tenant's origin, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the tenant template yields an invalid URL.
    pub fn api_base(&self) -> Result<Url, Error> {
        match (self.session.company(), self.config.tenant_template.as_ref()) {
            (Some(company), Some(template)) => template.base_url_for(&company),
            _ => Ok(self.config.base_url.clone()),
        }
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(Method::GET, path, None::<&()>, None::<&()>).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.request(Method::GET, path, Some(query), None::<&()>).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, None::<&()>, Some(body)).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, None::<&()>, Some(body)).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PATCH, path, None::<&()>, Some(body)).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(Method::DELETE, path, None::<&()>, None::<&()>).await
    }

    /// Send an authenticated request to `path` (relative to [`api_base`](Self::api_base))
    /// and decode the JSON response. An empty body decodes as `null`, so
    /// `T = ()` or `Option<_>` suit endpoints answering `204 No Content`.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionExpired`] if a 401 could not be recovered by refreshing
    /// - [`Error::AccessDenied`] on 403
    /// - [`Error::Api`] on any other failure status
    /// - [`Error::Http`] on network failure, [`Error::Decode`] on an unexpected body
    pub async fn request<T, Q, B>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
        body: Option<&B>,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let url = endpoint(&self.api_base()?, path)?;
        let mut builder = self.http.request(method, url);
        if let Some(query) = query {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.dispatch(builder.build()?).await?;
        decode(response).await
    }

    /// Response side of the pipeline: refresh and replay once on 401.
    async fn dispatch(&self, mut request: Request) -> Result<Response, Error> {
        let epoch = self.sign_outs.load(Ordering::SeqCst);
        let sent_token = self.session.access_token();
        self.intercept(&mut request, sent_token.as_ref())?;
        // Replay copy; taking it here is what bounds the pipeline to one retry.
        let replay = request.try_clone();

        let response = self.send(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        let Some(mut replay) = replay else {
            tracing::warn!(
                path = response.url().path(),
                "Request body cannot be replayed; returning 401"
            );
            return check_status(response).await;
        };

        let token = self
            .refresh_after_rejection(sent_token.as_ref(), epoch)
            .await?;
        self.intercept(&mut replay, Some(&token))?;
        check_status(self.send(replay).await?).await
    }

    /// Request side of the pipeline: credentials and tenant headers.
    fn intercept(&self, request: &mut Request, token: Option<&AccessToken>) -> Result<(), Error> {
        let company = self.session.company();
        let headers = request.headers_mut();

        match token {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                    .map_err(|_| Error::Store("stored access token is not a valid header value".into()))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => {
                headers.remove(AUTHORIZATION);
            }
        }
        match company {
            Some(company) => {
                let value = HeaderValue::from_str(company.as_str())
                    .map_err(|_| Error::Store("stored company is not a valid header value".into()))?;
                headers.insert(COMPANY_HEADER, value);
            }
            None => {
                headers.remove(COMPANY_HEADER);
            }
        }
        headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(())
    }

    async fn send(&self, request: Request) -> Result<Response, Error> {
        let method = request.method().clone();
        let path = request.url().path().to_owned();
        self.http.execute(request).await.map_err(|e| {
            tracing::error!(error = %e, %method, path, "Request failed");
            Error::Http(e)
        })
    }

    /// Called with `refresh_gate` held.
    fn expire_session(&self, failure: &RefreshFailure) {
        tracing::warn!(reason = %failure, "Token refresh failed; signing out");
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.session.clear();
        self.navigator.redirect_to_sign_in(&self.config.sign_in_route);
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Joins `path` onto `base`, keeping any path prefix `base` already has.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, Error> {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Checks HTTP response status; returns the response on success or a typed error.
pub(crate) async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body);

    if status == StatusCode::FORBIDDEN {
        return Err(Error::AccessDenied {
            message: message
                .unwrap_or_else(|| "You do not have permission to perform this action.".into()),
        });
    }
    Err(Error::Api {
        status: status.as_u16(),
        message: message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_owned()),
        body,
    })
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(JsonValue::Null)?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}
