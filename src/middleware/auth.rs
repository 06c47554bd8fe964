use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum_extra::extract::cookie::PrivateCookieJar;
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use super::session;
use crate::error::TimecapsuleError;
use crate::router::TimecapsuleState;
use crate::types::auth::AuthUser;

/// Access token presented with the request.
/// Accepts either:
/// - Header: `Authorization: Bearer <token>`
/// - The encrypted session cookie set at sign-in
pub fn presented_token(headers: &HeaderMap, state: &TimecapsuleState) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        let token = bearer.token().trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    let jar = PrivateCookieJar::from_headers(headers, state.cookie_key.clone());
    session::access_token(&jar)
}

/// A signed-in caller, verified against the auth service.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    pub user: AuthUser,
    pub access_token: String,
}

impl FromRequestParts<TimecapsuleState> for SessionAuth {
    type Rejection = TimecapsuleError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &TimecapsuleState,
    ) -> Result<Self, Self::Rejection> {
        let access_token =
            presented_token(&parts.headers, state).ok_or(TimecapsuleError::Unauthorized)?;

        let user = state
            .supabase
            .get_user(&access_token)
            .await
            .map_err(|e| match e {
                TimecapsuleError::Upstream { status, .. }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
                {
                    debug!("session token rejected by auth service");
                    TimecapsuleError::Unauthorized
                }
                other => other,
            })?;

        Ok(Self { user, access_token })
    }
}
