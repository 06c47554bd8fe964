use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;

use crate::error::TimecapsuleError;
use crate::service::capsules::{ItemForm, UploadedFile};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// The add-capsule form, read from `multipart/form-data`.
///
/// Fields: `file` (optional), `title`, `caption`, `tags`, `reveal_months`,
/// `is_public` (defaults to public). Unknown fields are skipped.
pub struct CapsuleForm(pub ItemForm);

impl<S> FromRequest<S> for CapsuleForm
where
    S: Send + Sync,
{
    type Rejection = TimecapsuleError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| TimecapsuleError::validation(rejection.body_text()))?;

        let mut form = ItemForm {
            is_public: true,
            ..Default::default()
        };

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                "file" => form.file = read_file(field).await?,
                "title" => form.title = Some(read_text(field).await?),
                "caption" => form.caption = read_text(field).await?,
                "tags" => form.tags = read_text(field).await?,
                "reveal_months" => {
                    let raw = read_text(field).await?;
                    let months = raw.trim().parse::<u32>().map_err(|_| {
                        TimecapsuleError::validation("Please choose a reveal period.")
                    })?;
                    form.reveal_months = Some(months);
                }
                "is_public" => form.is_public = parse_flag(&read_text(field).await?)?,
                _ => {}
            }
        }
        Ok(CapsuleForm(form))
    }
}

/// A browser submits an empty, nameless part when no file was picked.
async fn read_file(field: Field<'_>) -> Result<Option<UploadedFile>, TimecapsuleError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?;
    if bytes.is_empty() && file_name.is_empty() {
        return Ok(None);
    }
    Ok(Some(UploadedFile {
        file_name,
        content_type,
        bytes,
    }))
}

async fn read_text(field: Field<'_>) -> Result<String, TimecapsuleError> {
    field.text().await.map_err(multipart_error)
}

fn multipart_error(e: MultipartError) -> TimecapsuleError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        TimecapsuleError::PayloadTooLarge
    } else {
        e.into()
    }
}

fn parse_flag(raw: &str) -> Result<bool, TimecapsuleError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" => Ok(false),
        _ => Err(TimecapsuleError::validation("Visibility must be true or false.")),
    }
}
