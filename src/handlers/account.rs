use axum::{Json, extract::State};

use crate::error::TimecapsuleError;
use crate::middleware::auth::SessionAuth;
use crate::router::TimecapsuleState;
use crate::service::account;
use crate::types::api::{ChangeEmailRequest, ChangePasswordRequest, ProfileResponse, StatusMessage};

pub async fn me(auth: SessionAuth) -> Json<ProfileResponse> {
    Json(account::profile(&auth.user))
}

pub async fn change_email(
    State(state): State<TimecapsuleState>,
    auth: SessionAuth,
    Json(req): Json<ChangeEmailRequest>,
) -> Result<Json<StatusMessage>, TimecapsuleError> {
    let msg = account::change_email(&state.supabase, &auth.access_token, &req.new_email).await?;
    Ok(Json(msg))
}

pub async fn change_password(
    State(state): State<TimecapsuleState>,
    auth: SessionAuth,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<StatusMessage>, TimecapsuleError> {
    let msg = account::change_password(
        &state.supabase,
        &auth.access_token,
        &req.current_password,
        &req.new_password,
        &req.confirm_password,
    )
    .await?;
    Ok(Json(msg))
}
