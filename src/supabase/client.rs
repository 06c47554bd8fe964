use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder};
use tracing::warn;
use url::Url;

use crate::config::Config;
use crate::error::{IsRetryable, TimecapsuleError, UpstreamErrorBody};

/// Which key a request is made with.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    /// Public anon key; row-level security applies as an anonymous caller.
    Anon,
    /// Service-role key when configured; bypasses row-level security.
    Admin,
    /// A signed-in user's access token; row-level security applies as that user.
    User(&'a str),
}

#[derive(Clone)]
pub struct SupabaseClient {
    pub(super) http: reqwest::Client,
    base: Url,
    anon_key: Arc<str>,
    service_key: Option<Arc<str>>,
    pub(super) bucket: Arc<str>,
}

pub(super) fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(3)
        .with_jitter()
}

impl SupabaseClient {
    /// Create a client with a preconfigured HTTP client.
    pub fn new(cfg: &Config) -> Result<Self, TimecapsuleError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("timecapsule/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(cfg.request_timeout());
        if let Some(proxy_url) = cfg.supabase.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        let http = builder.build()?;

        let mut base = cfg.supabase.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http,
            base,
            anon_key: Arc::from(cfg.supabase.anon_key.as_str()),
            service_key: cfg
                .supabase
                .service_role_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(Arc::from),
            bucket: Arc::from(cfg.supabase.media_bucket.as_str()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn has_service_key(&self) -> bool {
        self.service_key.is_some()
    }

    pub(super) fn endpoint(&self, path: &str) -> Result<Url, TimecapsuleError> {
        Ok(self.base.join(path)?)
    }

    /// Builds a request carrying the `apikey` and bearer headers for `cred`.
    pub(super) fn request(&self, method: Method, url: Url, cred: Credential<'_>) -> RequestBuilder {
        let (apikey, token) = match cred {
            Credential::Anon => (self.anon_key.as_ref(), self.anon_key.as_ref()),
            Credential::Admin => {
                let key = self.service_key.as_deref().unwrap_or(&self.anon_key);
                (key, key)
            }
            Credential::User(token) => (self.anon_key.as_ref(), token),
        };
        self.http
            .request(method, url)
            .header("apikey", apikey)
            .bearer_auth(token)
    }

    /// Sends and turns any non-2xx answer into `TimecapsuleError::Upstream`
    /// carrying the service's own message.
    pub(super) async fn send(
        &self,
        req: RequestBuilder,
    ) -> Result<reqwest::Response, TimecapsuleError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<UpstreamErrorBody>(&body)
            .ok()
            .and_then(UpstreamErrorBody::into_message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Upstream error")
                    .to_string()
            });
        Err(TimecapsuleError::Upstream { status, message })
    }
}

/// Runs an idempotent upstream call, retrying transient failures.
pub(super) async fn with_retry<T, F, Fut>(
    operation: &'static str,
    call: F,
) -> Result<T, TimecapsuleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TimecapsuleError>>,
{
    call.retry(default_retry_policy())
        .when(|e: &TimecapsuleError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(operation, error = %err, "retrying upstream call after {:?}", dur);
        })
        .await
}
