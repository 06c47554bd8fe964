use std::num::NonZeroU32;
use std::sync::LazyLock;
use std::time::Duration;

use axum_extra::extract::cookie::Key;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::TimecapsuleError;

/// Process-wide configuration, resolved once from defaults and the environment.
pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: invalid timecapsule configuration"));

/// Bucket the add-capsule flow uploads into.
pub const DEFAULT_MEDIA_BUCKET: &str = "capsule-media";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub basic: BasicConfig,
    pub supabase: SupabaseConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub port: u16,
    pub loglevel: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: Url,
    pub anon_key: String,
    /// Bypasses row-level security. Only used for admin reads and the health probe.
    pub service_role_key: Option<String>,
    pub media_bucket: String,
    pub request_timeout_secs: u64,
    pub proxy: Option<Url>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// At least 64 bytes; shorter or missing secrets fall back to a per-process key.
    pub cookie_secret: Option<String>,
    pub insecure_cookie: bool,
    pub auth_attempts_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            basic: BasicConfig {
                listen_addr: "0.0.0.0".to_string(),
                port: 5000,
                loglevel: "info".to_string(),
                max_upload_bytes: 50 * 1024 * 1024,
            },
            supabase: SupabaseConfig {
                url: Url::parse("http://localhost:54321").expect("static url"),
                anon_key: String::new(),
                service_role_key: None,
                media_bucket: DEFAULT_MEDIA_BUCKET.to_string(),
                request_timeout_secs: 15,
                proxy: None,
            },
            session: SessionConfig {
                cookie_secret: None,
                insecure_cookie: false,
                auth_attempts_per_minute: 30,
            },
        }
    }
}

impl Config {
    /// Defaults, then the unprefixed variables the hosted service documents
    /// (`SUPABASE_URL`, `PORT`, ...), then `TIMECAPSULE_*` overrides.
    pub fn load() -> Result<Self, TimecapsuleError> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(well_known_env())
            .merge(Env::prefixed("TIMECAPSULE_").filter_map(|key| {
                let mapped = match key.as_str().to_ascii_lowercase().as_str() {
                    "listen_addr" => "basic.listen_addr",
                    "port" => "basic.port",
                    "loglevel" => "basic.loglevel",
                    "max_upload_bytes" => "basic.max_upload_bytes",
                    "media_bucket" => "supabase.media_bucket",
                    "request_timeout_secs" => "supabase.request_timeout_secs",
                    "proxy" => "supabase.proxy",
                    "cookie_secret" => "session.cookie_secret",
                    "insecure_cookie" => "session.insecure_cookie",
                    "auth_attempts_per_minute" => "session.auth_attempts_per_minute",
                    _ => return None,
                };
                Some(mapped.into())
            }))
            .extract()
            .map_err(|e| TimecapsuleError::Config(e.to_string()))
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.basic.listen_addr, self.basic.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.supabase.request_timeout_secs.max(1))
    }

    pub fn auth_quota(&self) -> NonZeroU32 {
        NonZeroU32::new(self.session.auth_attempts_per_minute).unwrap_or(NonZeroU32::MIN)
    }

    pub fn cookie_key(&self) -> Key {
        match self.session.cookie_secret.as_deref() {
            Some(secret) => Key::try_from(secret.as_bytes()).unwrap_or_else(|_| {
                warn!("cookie secret shorter than 64 bytes; sessions will not survive a restart");
                Key::generate()
            }),
            None => Key::generate(),
        }
    }
}

fn well_known_env() -> Env {
    Env::raw().filter_map(|key| {
        let mapped = match key.as_str().to_ascii_uppercase().as_str() {
            "SUPABASE_URL" => "supabase.url",
            "SUPABASE_ANON_KEY" => "supabase.anon_key",
            "SUPABASE_SERVICE_ROLE_KEY" => "supabase.service_role_key",
            "PORT" => "basic.port",
            _ => return None,
        };
        Some(mapped.into())
    })
}
