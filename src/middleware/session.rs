use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use time::Duration;

use crate::types::auth::Session;

pub const ACCESS_COOKIE: &str = "tc_access_token";
pub const REFRESH_COOKIE: &str = "tc_refresh_token";

/// Used when the auth service omits `expires_in`.
const DEFAULT_ACCESS_SECS: i64 = 60 * 60;
const REFRESH_DAYS: i64 = 30;

pub fn store_session(jar: PrivateCookieJar, session: &Session, insecure: bool) -> PrivateCookieJar {
    let access_age = Duration::seconds(session.expires_in.unwrap_or(DEFAULT_ACCESS_SECS).max(0));
    jar.add(build_cookie(
        ACCESS_COOKIE,
        session.access_token.clone(),
        access_age,
        insecure,
    ))
    .add(build_cookie(
        REFRESH_COOKIE,
        session.refresh_token.clone(),
        Duration::days(REFRESH_DAYS),
        insecure,
    ))
}

pub fn clear_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(ACCESS_COOKIE))
        .remove(clear_cookie(REFRESH_COOKIE))
}

pub fn access_token(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(ACCESS_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}

fn build_cookie(name: &str, value: String, max_age: Duration, insecure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(!insecure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
