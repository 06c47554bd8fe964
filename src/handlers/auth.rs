use axum::{Json, extract::State, http::HeaderMap};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde_json::json;
use tracing::{info, warn};

use crate::error::TimecapsuleError;
use crate::middleware::auth::presented_token;
use crate::middleware::session;
use crate::router::TimecapsuleState;
use crate::service::validation;
use crate::types::api::{AuthResponse, RedirectResponse, SignInRequest, SignUpRequest};
use crate::types::auth::SignUpOutcome;

const AFTER_SIGN_IN: &str = "/dashboard";
const SIGN_IN_PAGE: &str = "/signin";

/// POST /api/auth/signin -> password sign-in; the session lands in private cookies.
pub async fn sign_in(
    State(state): State<TimecapsuleState>,
    jar: PrivateCookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<(PrivateCookieJar, Json<AuthResponse>), TimecapsuleError> {
    validation::sign_in(&req.email, &req.password)?;
    state.check_auth_quota(&req.email)?;

    let session = state
        .supabase
        .sign_in_with_password(req.email.trim(), &req.password)
        .await?;
    let jar = session::store_session(jar, &session, state.insecure_cookie);

    Ok((
        jar,
        Json(AuthResponse {
            user: session.user,
            redirect: AFTER_SIGN_IN.to_string(),
            confirmation_required: false,
        }),
    ))
}

/// POST /api/auth/signup -> form checks, then account creation with the
/// notification preference stored in the user's metadata.
pub async fn sign_up(
    State(state): State<TimecapsuleState>,
    jar: PrivateCookieJar,
    Json(req): Json<SignUpRequest>,
) -> Result<(PrivateCookieJar, Json<AuthResponse>), TimecapsuleError> {
    validation::sign_up(&req.email, &req.password, &req.confirm)?;
    state.check_auth_quota(&req.email)?;

    let outcome = state
        .supabase
        .sign_up(
            req.email.trim(),
            &req.password,
            json!({ "notify_on_release": req.notify }),
        )
        .await?;

    match outcome {
        SignUpOutcome::Session(session) => {
            let jar = session::store_session(jar, &session, state.insecure_cookie);
            Ok((
                jar,
                Json(AuthResponse {
                    user: session.user,
                    redirect: AFTER_SIGN_IN.to_string(),
                    confirmation_required: false,
                }),
            ))
        }
        SignUpOutcome::ConfirmationRequired(user) => Ok((
            jar,
            Json(AuthResponse {
                user,
                redirect: SIGN_IN_PAGE.to_string(),
                confirmation_required: true,
            }),
        )),
    }
}

/// POST /api/auth/signout -> revokes the session upstream when possible and
/// always clears the cookies.
pub async fn sign_out(
    State(state): State<TimecapsuleState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Json<RedirectResponse>) {
    if let Some(token) = presented_token(&headers, &state) {
        match state.supabase.sign_out(&token).await {
            Ok(()) => info!("session revoked"),
            Err(e) => warn!(error = %e, "session revoke failed; clearing cookies anyway"),
        }
    }
    (
        session::clear_session(jar),
        Json(RedirectResponse {
            redirect: SIGN_IN_PAGE.to_string(),
        }),
    )
}
