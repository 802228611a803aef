use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::tenant::TenantTemplate;

/// Per-call timeout applied by the HTTP client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Route handed to the [`Navigator`](crate::Navigator) on forced sign-out.
pub const DEFAULT_SIGN_IN_ROUTE: &str = "/auth/sign-in";

/// Fleet API client configuration.
///
/// The base URL is the only required field and is a constructor parameter.
///
/// ```rust,ignore
/// use fleet_api_client::{ClientConfig, TenantTemplate};
///
/// let config = ClientConfig::new("https://api.fleet.example.com".parse()?)
///     .with_tenant_template(TenantTemplate::from_domain("{tenant}.fleet.example.com")?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) tenant_template: Option<TenantTemplate>,
    pub(crate) timeout: Duration,
    pub(crate) sign_in_route: String,
    pub(crate) secure_cookies: bool,
}

impl ClientConfig {
    /// Create a configuration for the backend at `base_url`.
    ///
    /// Cookies are marked `Secure` when `base_url` is HTTPS.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        let secure_cookies = base_url.scheme() == "https";
        Self {
            base_url,
            tenant_template: None,
            timeout: DEFAULT_TIMEOUT,
            sign_in_route: DEFAULT_SIGN_IN_ROUTE.into(),
            secure_cookies,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `FLEET_API_URL`: backend base URL
    ///
    /// # Optional env vars
    /// - `FLEET_TENANT_DOMAIN`: tenant domain template, e.g. `{tenant}.fleet.example.com`
    /// - `FLEET_TENANT_BASE_URL`: tenant origin template (default `https://<domain template>`)
    /// - `FLEET_API_TIMEOUT_SECS`: per-call timeout in seconds
    /// - `FLEET_SIGN_IN_ROUTE`: route passed to the navigator on forced sign-out
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url: Url = lookup("FLEET_API_URL")
            .ok_or_else(|| Error::Config("FLEET_API_URL is required".into()))?
            .parse()
            .map_err(|e| Error::Config(format!("FLEET_API_URL: {e}")))?;

        let mut config = Self::new(base_url);

        match (lookup("FLEET_TENANT_DOMAIN"), lookup("FLEET_TENANT_BASE_URL")) {
            (Some(domain), Some(base)) => {
                config = config.with_tenant_template(TenantTemplate::new(domain, base)?);
            }
            (Some(domain), None) => {
                config = config.with_tenant_template(TenantTemplate::from_domain(domain)?);
            }
            (None, Some(_)) => {
                return Err(Error::Config(
                    "FLEET_TENANT_BASE_URL requires FLEET_TENANT_DOMAIN".into(),
                ));
            }
            (None, None) => {}
        }

        if let Some(secs) = lookup("FLEET_API_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("FLEET_API_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(route) = lookup("FLEET_SIGN_IN_ROUTE") {
            config = config.with_sign_in_route(route);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_tenant_template(mut self, template: TenantTemplate) -> Self {
        self.tenant_template = Some(template);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_sign_in_route(mut self, route: impl Into<String>) -> Self {
        self.sign_in_route = route.into();
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn tenant_template(&self) -> Option<&TenantTemplate> {
        self.tenant_template.as_ref()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn sign_in_route(&self) -> &str {
        &self.sign_in_route
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}
