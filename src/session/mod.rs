//! Typed view over a [`CredentialStore`].
//!
//! Layout of the persisted session:
//!
//! | Location | Key | Contents |
//! |---|---|---|
//! | cookie | `access_token` | access token (canonical, 30 days, `SameSite=Lax`) |
//! | item | `refresh_token` | refresh token |
//! | item | `company_name` | normalized tenant identifier |
//! | item | `access_token`, `authToken` | legacy access token copies, read-only |
//!
//! Older dashboard builds wrote the access token to the cookie and to both
//! legacy items. Only the cookie is written now; the legacy items are still
//! read as a fallback so existing sessions survive an upgrade, and are
//! removed on [`Session::clear`].

mod cookies;

use std::sync::Arc;

use crate::error::Error;
use crate::store::CredentialStore;
use crate::types::{AccessToken, CompanyName, RefreshToken, TokenPair};

pub(crate) const LEGACY_ACCESS_TOKEN_KEY: &str = "access_token";
pub(crate) const LEGACY_AUTH_TOKEN_KEY: &str = "authToken";
pub(crate) const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub(crate) const COMPANY_NAME_KEY: &str = "company_name";

const ITEM_KEYS: [&str; 4] = [
    LEGACY_ACCESS_TOKEN_KEY,
    LEGACY_AUTH_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    COMPANY_NAME_KEY,
];

/// Session credentials backed by a host-provided store.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
    secure_cookies: bool,
}

impl Session {
    /// `secure_cookies` should be true when the API is served over HTTPS.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, secure_cookies: bool) -> Self {
        Self {
            store,
            secure_cookies,
        }
    }

    /// Current access token: the cookie first, then the legacy items.
    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        let from_cookie = self
            .read(|store| store.cookie(cookies::ACCESS_TOKEN_COOKIE))
            .filter(|c| !cookies::is_expired(c))
            .map(|c| c.value().to_string());

        from_cookie
            .or_else(|| self.read(|store| store.item(LEGACY_ACCESS_TOKEN_KEY)))
            .or_else(|| self.read(|store| store.item(LEGACY_AUTH_TOKEN_KEY)))
            .filter(|token| !token.is_empty())
            .map(AccessToken::from)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.read(|store| store.item(REFRESH_TOKEN_KEY))
            .filter(|token| !token.is_empty())
            .map(RefreshToken::from)
    }

    /// Stored tenant, if the session was opened through a company login.
    #[must_use]
    pub fn company(&self) -> Option<CompanyName> {
        let raw = self.read(|store| store.item(COMPANY_NAME_KEY))?;
        match CompanyName::try_from(raw) {
            Ok(company) => Some(company),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed stored company name");
                None
            }
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Persist a freshly issued token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store rejects a write.
    pub fn store_tokens(&self, tokens: &TokenPair) -> Result<(), Error> {
        self.store_access_token(&tokens.access_token)?;
        match &tokens.refresh_token {
            Some(refresh) => self.store_refresh_token(refresh),
            None => self.store.remove_item(REFRESH_TOKEN_KEY),
        }
    }

    /// Overwrite the access token in place (refresh flow).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store rejects a write.
    pub fn store_access_token(&self, token: &AccessToken) -> Result<(), Error> {
        self.store.set_cookie(cookies::access_token_cookie(
            token.as_str(),
            self.secure_cookies,
        ))?;
        // Legacy copies would otherwise resurface once the cookie expires.
        self.store.remove_item(LEGACY_ACCESS_TOKEN_KEY)?;
        self.store.remove_item(LEGACY_AUTH_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store rejects a write.
    pub fn store_refresh_token(&self, token: &RefreshToken) -> Result<(), Error> {
        self.store.set_item(REFRESH_TOKEN_KEY, token.as_str())
    }

    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store rejects a write.
    pub fn store_company(&self, company: &CompanyName) -> Result<(), Error> {
        self.store.set_item(COMPANY_NAME_KEY, company.as_str())
    }

    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store rejects the removal.
    pub fn clear_company(&self) -> Result<(), Error> {
        self.store.remove_item(COMPANY_NAME_KEY)
    }

    /// Remove every credential and the tenant. Best-effort and idempotent.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove_cookie(cookies::ACCESS_TOKEN_COOKIE) {
            tracing::warn!(error = %e, "Failed to remove access token cookie");
        }
        for key in ITEM_KEYS {
            if let Err(e) = self.store.remove_item(key) {
                tracing::warn!(error = %e, key, "Failed to remove stored credential");
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&dyn CredentialStore) -> Result<Option<T>, Error>) -> Option<T> {
        f(self.store.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Credential store read failed");
            None
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("company", &self.company())
            .finish_non_exhaustive()
    }
}
