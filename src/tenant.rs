use url::Url;

use crate::error::Error;
use crate::types::CompanyName;

/// Placeholder substituted with the normalized company name in tenant templates.
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Normalizes a user-entered company name into a tenant identifier.
///
/// ASCII-lowercases and drops everything that is not an ASCII letter or digit,
/// so `"Acme Corp"` and `"ACME-corp"` both become `"acmecorp"`.
#[must_use]
pub fn normalize_company_name(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Templates that map a tenant to its domain and backend origin.
///
/// ```rust,ignore
/// use fleet_api_client::TenantTemplate;
///
/// let template = TenantTemplate::from_domain("{tenant}.fleet.example.com")?;
/// // acmecorp.fleet.example.com, https://acmecorp.fleet.example.com/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantTemplate {
    domain: String,
    base_url: String,
}

impl TenantTemplate {
    /// Create a template pair. Both must contain [`TENANT_PLACEHOLDER`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a placeholder is missing, or if the base URL
    /// template does not produce a valid URL.
    pub fn new(domain: impl Into<String>, base_url: impl Into<String>) -> Result<Self, Error> {
        let template = Self {
            domain: domain.into(),
            base_url: base_url.into(),
        };
        if !template.domain.contains(TENANT_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "tenant domain template {:?} has no {TENANT_PLACEHOLDER} placeholder",
                template.domain
            )));
        }
        if !template.base_url.contains(TENANT_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "tenant base URL template {:?} has no {TENANT_PLACEHOLDER} placeholder",
                template.base_url
            )));
        }
        Url::parse(&template.base_url.replace(TENANT_PLACEHOLDER, "tenant"))
            .map_err(|e| Error::Config(format!("tenant base URL template: {e}")))?;
        Ok(template)
    }

    /// Template whose backend origin is `https://<domain>`.
    ///
    /// # Errors
    ///
    /// Same as [`TenantTemplate::new`].
    pub fn from_domain(domain: impl Into<String>) -> Result<Self, Error> {
        let domain = domain.into();
        let base_url = format!("https://{domain}");
        Self::new(domain, base_url)
    }

    /// Domain sent to the validation endpoint, e.g. `acmecorp.fleet.example.com`.
    #[must_use]
    pub fn domain_for(&self, company: &CompanyName) -> String {
        self.domain.replace(TENANT_PLACEHOLDER, company.as_str())
    }

    /// Backend origin serving this tenant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if substitution yields an invalid URL.
    pub fn base_url_for(&self, company: &CompanyName) -> Result<Url, Error> {
        Ok(Url::parse(
            &self.base_url.replace(TENANT_PLACEHOLDER, company.as_str()),
        )?)
    }

    #[must_use]
    pub fn domain_template(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn base_url_template(&self) -> &str {
        &self.base_url
    }
}
