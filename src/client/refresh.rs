use serde::{Deserialize, Serialize};

use std::sync::atomic::Ordering;

use super::{ApiClient, endpoint};
use crate::error::Error;
use crate::types::{AccessToken, RefreshToken};

const REFRESH_PATH: &str = "/users/refresh_token/";

/// Why the access token could not be refreshed.
///
/// Returned as a value; the request pipeline turns it into a forced sign-out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh token rejected with status {status}")]
    Rejected { status: u16 },

    #[error("refresh request failed: {0}")]
    Network(String),

    #[error("unexpected refresh response: {0}")]
    InvalidResponse(String),

    #[error("could not store refreshed token: {0}")]
    Store(String),
}

/// The backend names the field `refresh`, not `refresh_token`.
#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access: AccessToken,
    /// Present when the backend rotates refresh tokens.
    #[serde(default, alias = "refresh_token")]
    refresh: Option<RefreshToken>,
}

impl ApiClient {
    /// Exchange the stored refresh token for a new access token and store it.
    ///
    /// Serialized with the refreshes triggered by rejected requests.
    ///
    /// # Errors
    ///
    /// Returns a [`RefreshFailure`]. Nothing is signed out and the session is
    /// left untouched on failure; on success the new access token (and a
    /// rotated refresh token, if the backend sent one) is stored.
    pub async fn refresh_access_token(&self) -> Result<AccessToken, RefreshFailure> {
        let _flight = self.refresh_gate.lock().await;
        self.exchange_refresh_token().await
    }

    /// Refresh after `rejected` was answered with 401 for a request sent
    /// when `epoch` sign-outs had happened.
    ///
    /// Waits for any refresh already in flight. If that refresh succeeded,
    /// its token is reused; if it failed and signed out, the waiter shares
    /// the outcome instead of signing out again. A failed refresh of its own
    /// clears the session and triggers the navigator.
    pub(super) async fn refresh_after_rejection(
        &self,
        rejected: Option<&AccessToken>,
        epoch: u64,
    ) -> Result<AccessToken, Error> {
        let _flight = self.refresh_gate.lock().await;

        if self.sign_outs.load(Ordering::SeqCst) != epoch {
            tracing::debug!("Session already expired by a concurrent request");
            return Err(Error::SessionExpired);
        }
        if let Some(current) = self.session.access_token() {
            if rejected != Some(&current) {
                tracing::debug!("Access token already refreshed by a concurrent request");
                return Ok(current);
            }
        }
        self.exchange_refresh_token().await.map_err(|failure| {
            self.expire_session(&failure);
            Error::SessionExpired
        })
    }

    async fn exchange_refresh_token(&self) -> Result<AccessToken, RefreshFailure> {
        let refresh = self
            .session
            .refresh_token()
            .ok_or(RefreshFailure::MissingRefreshToken)?;

        let url = self
            .api_base()
            .and_then(|base| endpoint(&base, REFRESH_PATH))
            .map_err(|e| RefreshFailure::Network(e.to_string()))?;

        let mut request = self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh: refresh.as_str(),
            })
            .build()
            .map_err(|e| RefreshFailure::Network(e.to_string()))?;
        self.intercept(&mut request, None)
            .map_err(|e| RefreshFailure::Network(e.to_string()))?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| RefreshFailure::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshFailure::InvalidResponse(e.to_string()))?;

        self.session
            .store_access_token(&body.access)
            .map_err(|e| RefreshFailure::Store(e.to_string()))?;
        if let Some(rotated) = &body.refresh {
            self.session
                .store_refresh_token(rotated)
                .map_err(|e| RefreshFailure::Store(e.to_string()))?;
        }

        tracing::info!("Access token refreshed");
        Ok(body.access)
    }
}
