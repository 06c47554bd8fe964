use tracing::info;

use super::validation;
use crate::error::TimecapsuleError;
use crate::supabase::SupabaseClient;
use crate::types::api::{ProfileResponse, StatusMessage};
use crate::types::auth::{AuthUser, UserAttributes};

pub const EMAIL_CHANGE_SENT: &str = "Check your new inbox for a confirmation link.";
pub const PASSWORD_UPDATED: &str = "Password updated successfully.";

pub fn profile(user: &AuthUser) -> ProfileResponse {
    ProfileResponse {
        id: user.id.clone(),
        email: user.email.clone().unwrap_or_default(),
        username: user.display_name(),
    }
}

pub async fn change_email(
    client: &SupabaseClient,
    access_token: &str,
    new_email: &str,
) -> Result<StatusMessage, TimecapsuleError> {
    validation::change_email(new_email)?;
    let attributes = UserAttributes {
        email: Some(new_email.trim().to_string()),
        ..Default::default()
    };
    let user = client.update_user(access_token, &attributes).await?;
    info!(user_id = %user.id, "email change requested");
    Ok(StatusMessage {
        message: EMAIL_CHANGE_SENT.to_string(),
    })
}

/// The current password is required by the form but, as on the settings page,
/// the service itself authorizes the change through the session.
pub async fn change_password(
    client: &SupabaseClient,
    access_token: &str,
    current: &str,
    new: &str,
    confirm: &str,
) -> Result<StatusMessage, TimecapsuleError> {
    validation::change_password(current, new, confirm)?;
    let attributes = UserAttributes {
        password: Some(new.to_string()),
        ..Default::default()
    };
    let user = client.update_user(access_token, &attributes).await?;
    info!(user_id = %user.id, "password changed");
    Ok(StatusMessage {
        message: PASSWORD_UPDATED.to_string(),
    })
}
