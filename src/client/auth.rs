use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use super::{ApiClient, COMPANY_HEADER, check_status, endpoint};
use crate::error::{Error, extract_message};
use crate::tenant::TenantTemplate;
use crate::types::{AuthenticatedUser, CompanyName, LoginResponse, TokenPair, User};

const LOGIN_PATH: &str = "/users/login_with_password";
const VALIDATE_DOMAIN_PATH: &str = "/api/tenant/validate-domain/";
const CURRENT_USER_PATH: &str = "/users/users/me";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Verdict fields the validation endpoint may send; either one being
/// `false` rejects the company.
#[derive(Deserialize)]
struct DomainValidation {
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    exists: Option<bool>,
}

impl DomainValidation {
    /// Reads a 2xx validation body. Empty and non-object bodies carry no
    /// verdict and count as accepted.
    fn accepts(body: &str) -> Result<bool, Error> {
        if body.trim().is_empty() {
            return Ok(true);
        }
        let value: JsonValue = serde_json::from_str(body)?;
        if !value.is_object() {
            return Ok(true);
        }
        let verdict: Self = serde_json::from_value(value)?;
        Ok(verdict.valid != Some(false) && verdict.exists != Some(false))
    }
}

/// A company whose domain the backend confirmed.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ValidatedTenant {
    pub company: CompanyName,
    /// Domain sent to the validation endpoint.
    pub domain: String,
    /// Origin the tenant's login and API calls go to.
    pub base_url: Url,
}

impl ApiClient {
    /// Log in against the default backend and persist the issued tokens.
    ///
    /// Clears any tenant left over from an earlier company login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] carrying the backend's message and body
    /// if the credentials are rejected, or [`Error::Http`] on network failure.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthenticatedUser, Error> {
        let url = endpoint(&self.config.base_url, LOGIN_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Login network error");
                Error::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_message(&body)
                .unwrap_or_else(|| "invalid username or password".into());
            tracing::warn!(status = status.as_u16(), error = %message, "Login failed");
            return Err(Error::Authentication {
                status: status.as_u16(),
                message,
                body,
            });
        }

        let (user, tokens) = response.json::<LoginResponse>().await?.into_parts();
        self.persist_login(&tokens, None)?;

        tracing::info!(user_id = %user.user.id, "Login successful");
        Ok(user)
    }

    /// Check that a company exists before logging in to its backend.
    ///
    /// The company name is normalized (`"Acme Corp"` becomes `acmecorp`) and
    /// turned into a domain with the configured [`TenantTemplate`].
    ///
    /// # Errors
    ///
    /// - [`Error::CompanyNotFound`] if the backend answers 404 or reports
    ///   `valid: false` / `exists: false`
    /// - [`Error::Decode`] if a 2xx body carries a verdict that is not a boolean
    /// - [`Error::InvalidDomain`] on 400, or if the name has no letters or digits
    /// - [`Error::ConnectionFailure`] if the backend is unreachable
    /// - [`Error::Config`] if no tenant template is configured
    #[tracing::instrument(skip(self))]
    pub async fn validate_domain(&self, company_name: &str) -> Result<ValidatedTenant, Error> {
        let template = self.tenant_template()?;
        let company = CompanyName::normalize(company_name)?;
        let domain = template.domain_for(&company);
        let base_url = template.base_url_for(&company)?;

        let mut url = endpoint(&self.config.base_url, VALIDATE_DOMAIN_PATH)?;
        url.query_pairs_mut().append_pair("domain", &domain);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| connection_failure(company_name, &e))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::warn!(%domain, "Company not found");
                return Err(Error::CompanyNotFound {
                    company: company_name.to_owned(),
                });
            }
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(%domain, "Company domain rejected");
                return Err(Error::InvalidDomain {
                    company: company_name.to_owned(),
                    detail: extract_message(&body)
                        .unwrap_or_else(|| "rejected by the server".into()),
                });
            }
            _ => {}
        }

        let body = check_status(response).await?.text().await?;
        if !DomainValidation::accepts(&body)? {
            tracing::warn!(%domain, "Company domain reported invalid");
            return Err(Error::CompanyNotFound {
                company: company_name.to_owned(),
            });
        }

        Ok(ValidatedTenant {
            company,
            domain,
            base_url,
        })
    }

    /// Two-phase tenant login: validate the company, then log in to its backend.
    ///
    /// Nothing is persisted unless both phases succeed; afterwards every
    /// request is routed to the tenant's origin.
    ///
    /// # Errors
    ///
    /// The errors of [`validate_domain`](Self::validate_domain), plus
    /// [`Error::InvalidCredentials`] on 401, [`Error::AccessDenied`] on 403,
    /// [`Error::ConnectionFailure`] if the tenant backend is unreachable, and
    /// [`Error::Authentication`] for any other rejection.
    #[tracing::instrument(skip(self, password))]
    pub async fn login_with_company(
        &self,
        company_name: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, Error> {
        let tenant = self.validate_domain(company_name).await?;

        let url = endpoint(&tenant.base_url, LOGIN_PATH)?;
        let response = self
            .http
            .post(url)
            .header(COMPANY_HEADER, tenant.company.as_str())
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| connection_failure(company_name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), company = %tenant.company, "Company login failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED => Error::InvalidCredentials {
                    company: company_name.to_owned(),
                },
                StatusCode::FORBIDDEN => Error::AccessDenied {
                    message: match extract_message(&body) {
                        Some(detail) => format!("Access to \"{company_name}\" was denied: {detail}"),
                        None => format!("Your account does not have access to \"{company_name}\"."),
                    },
                },
                _ => Error::Authentication {
                    status: status.as_u16(),
                    message: extract_message(&body).unwrap_or_else(|| "login failed".into()),
                    body,
                },
            });
        }

        let (user, tokens) = response.json::<LoginResponse>().await?.into_parts();
        self.persist_login(&tokens, Some(&tenant.company))?;

        tracing::info!(company = %tenant.company, user_id = %user.user.id, "Company login successful");
        Ok(user)
    }

    /// Forget the session locally: tokens, legacy copies and tenant.
    ///
    /// There is no server-side invalidation; calling this repeatedly is harmless.
    pub fn logout(&self) {
        self.session.clear();
        tracing::info!("Logged out");
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get_current_user(&self) -> Result<User, Error> {
        self.get(CURRENT_USER_PATH).await
    }

    /// Writes the tenant before the tokens; a failed write leaves no session behind.
    fn persist_login(
        &self,
        tokens: &TokenPair,
        company: Option<&CompanyName>,
    ) -> Result<(), Error> {
        let stored = match company {
            Some(company) => self.session.store_company(company),
            None => self.session.clear_company(),
        }
        .and_then(|()| self.session.store_tokens(tokens));

        if let Err(e) = stored {
            tracing::warn!(error = %e, "Could not persist login; discarding session");
            self.session.clear();
            return Err(e);
        }
        Ok(())
    }

    fn tenant_template(&self) -> Result<&TenantTemplate, Error> {
        self.config
            .tenant_template
            .as_ref()
            .ok_or_else(|| Error::Config("company login requires a tenant template".into()))
    }
}

fn connection_failure(company: &str, e: &reqwest::Error) -> Error {
    tracing::error!(error = %e, company, "Company backend unreachable");
    Error::ConnectionFailure {
        company: company.to_owned(),
        detail: e.to_string(),
    }
}
