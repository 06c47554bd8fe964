use axum::body::Bytes;
use reqwest::Method;
use tracing::{info, warn};
use url::Url;

use super::client::{Credential, SupabaseClient, with_retry};
use crate::error::TimecapsuleError;

/// Shown in place of a text note whose file could not be loaded.
pub const TEXT_PLACEHOLDER: &str = "[ Could not load text ]";

/// Largest text note body that is loaded.
pub const MAX_TEXT_BYTES: usize = 1024 * 1024;

impl SupabaseClient {
    pub fn media_bucket(&self) -> &str {
        &self.bucket
    }

    /// Uploads to the media bucket at `path` and returns the object's public URL.
    pub async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        cred: Credential<'_>,
    ) -> Result<Url, TimecapsuleError> {
        let url = self.object_url(&["storage", "v1", "object"], path)?;
        let size = bytes.len();
        let req = self
            .request(Method::POST, url, cred)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send(req).await?;
        info!(bucket = %self.bucket, path, size, "uploaded object");
        self.public_url(path)
    }

    /// `{url}/storage/v1/object/public/{bucket}/{path}`, each segment percent-encoded.
    pub fn public_url(&self, path: &str) -> Result<Url, TimecapsuleError> {
        self.object_url(&["storage", "v1", "object", "public"], path)
    }

    /// Downloads a text note from the media bucket, reading at most
    /// [`MAX_TEXT_BYTES`]. Any failure, or a URL outside the bucket, yields
    /// [`TEXT_PLACEHOLDER`].
    pub async fn fetch_text(&self, url: &str) -> String {
        if !self.is_media_url(url) {
            warn!(url, "text note outside the media bucket; not fetched");
            return TEXT_PLACEHOLDER.to_string();
        }
        let fetched = with_retry("fetch_text", || async {
            let mut resp = self.http.get(url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(TimecapsuleError::Upstream {
                    status,
                    message: format!("text fetch returned {status}"),
                });
            }
            if resp
                .content_length()
                .is_some_and(|len| len > MAX_TEXT_BYTES as u64)
            {
                return Err(TimecapsuleError::PayloadTooLarge);
            }
            let mut body = Vec::new();
            while let Some(chunk) = resp.chunk().await? {
                if body.len() + chunk.len() > MAX_TEXT_BYTES {
                    return Err(TimecapsuleError::PayloadTooLarge);
                }
                body.extend_from_slice(&chunk);
            }
            Ok(String::from_utf8_lossy(&body).into_owned())
        })
        .await;

        fetched.unwrap_or_else(|e| {
            warn!(url, error = %e, "could not load text content");
            TEXT_PLACEHOLDER.to_string()
        })
    }

    /// Same origin as the service and under `/storage/v1/object/public/{bucket}/`.
    fn is_media_url(&self, url: &str) -> bool {
        let (Ok(target), Ok(prefix)) = (Url::parse(url), self.public_url("")) else {
            return false;
        };
        target.origin() == prefix.origin()
            && target.path().starts_with(&format!("{}/", prefix.path()))
    }

    fn object_url(&self, prefix: &[&str], path: &str) -> Result<Url, TimecapsuleError> {
        let mut url = self.base_url().clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(prefix)
            .push(&self.bucket)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}
