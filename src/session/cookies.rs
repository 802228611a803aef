use cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

pub(super) const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub(super) const ACCESS_TOKEN_TTL_DAYS: i64 = 30;

/// Create the access-token cookie.
pub(super) fn access_token_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token.to_string()))
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(ACCESS_TOKEN_TTL_DAYS))
        .expires(OffsetDateTime::now_utc() + Duration::days(ACCESS_TOKEN_TTL_DAYS))
        .build()
}

/// Whether a stored cookie is past its `Expires` date.
pub(super) fn is_expired(cookie: &Cookie<'_>) -> bool {
    cookie
        .expires_datetime()
        .is_some_and(|at| at <= OffsetDateTime::now_utc())
}
