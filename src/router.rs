use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::Key;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::Config;
use crate::error::TimecapsuleError;
use crate::handlers::{account, auth, capsules, feed, health};
use crate::supabase::SupabaseClient;

/// Keys tracked by the auth limiter before idle ones are dropped.
const LIMITER_SHRINK_AT: usize = 10_000;

#[derive(Clone)]
pub struct TimecapsuleState {
    pub supabase: SupabaseClient,
    pub cookie_key: Key,
    pub insecure_cookie: bool,
    pub max_upload_bytes: usize,
    auth_limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl TimecapsuleState {
    pub fn new(supabase: SupabaseClient, cfg: &Config) -> Self {
        Self {
            supabase,
            cookie_key: cfg.cookie_key(),
            insecure_cookie: cfg.session.insecure_cookie,
            max_upload_bytes: cfg.basic.max_upload_bytes,
            auth_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(cfg.auth_quota()))),
        }
    }

    /// Sign-in and sign-up attempts share a budget per email address,
    /// compared trimmed and lowercased.
    pub fn check_auth_quota(&self, email: &str) -> Result<(), TimecapsuleError> {
        let key = email.trim().to_lowercase();
        let checked = self.auth_limiter.check_key(&key);
        if self.auth_limiter.len() > LIMITER_SHRINK_AT {
            self.auth_limiter.retain_recent();
        }
        checked.map_err(|_| {
            warn!(email = %key, "auth attempt rate limit reached");
            TimecapsuleError::RateLimited
        })
    }
}

impl FromRef<TimecapsuleState> for Key {
    fn from_ref(state: &TimecapsuleState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn timecapsule_router(state: TimecapsuleState) -> Router {
    let uploads = Router::new()
        .route("/api/capsules", post(capsules::create_capsule))
        .route("/api/capsules/{id}/items", post(capsules::add_item))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/me", get(account::me))
        .route("/api/me/email", put(account::change_email))
        .route("/api/me/password", put(account::change_password))
        .route("/api/me/capsules", get(capsules::my_capsules))
        .route("/api/feed", get(feed::public_feed))
        .route("/api/reveal-options", get(feed::reveal_options))
        .route(
            "/api/capsules/{id}/members",
            get(capsules::list_members).post(capsules::add_member),
        )
        .merge(uploads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
