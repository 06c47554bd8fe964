use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::db::models::CapsuleMember;
use crate::error::TimecapsuleError;
use crate::middleware::auth::SessionAuth;
use crate::middleware::capsule_form::CapsuleForm;
use crate::router::TimecapsuleState;
use crate::service::capsules;
use crate::types::api::{AddMemberRequest, CapsuleView, CapsulesResponse, ItemView};

/// GET /api/me/capsules
pub async fn my_capsules(
    State(state): State<TimecapsuleState>,
    auth: SessionAuth,
) -> Result<Json<CapsulesResponse>, TimecapsuleError> {
    let capsules = capsules::my_capsules(&state.supabase, &auth.user).await?;
    Ok(Json(CapsulesResponse { capsules }))
}

/// POST /api/capsules (multipart)
pub async fn create_capsule(
    State(state): State<TimecapsuleState>,
    auth: SessionAuth,
    CapsuleForm(form): CapsuleForm,
) -> Result<(StatusCode, Json<CapsuleView>), TimecapsuleError> {
    let capsule = capsules::create_capsule(
        &state.supabase,
        &auth.user,
        &auth.access_token,
        form,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(capsule)))
}

/// POST /api/capsules/{id}/items (multipart)
pub async fn add_item(
    State(state): State<TimecapsuleState>,
    auth: SessionAuth,
    Path(capsule_id): Path<String>,
    CapsuleForm(form): CapsuleForm,
) -> Result<(StatusCode, Json<ItemView>), TimecapsuleError> {
    let item = capsules::add_item(
        &state.supabase,
        &auth.user,
        &auth.access_token,
        &capsule_id,
        form,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_members(
    State(state): State<TimecapsuleState>,
    auth: SessionAuth,
    Path(capsule_id): Path<String>,
) -> Result<Json<Vec<CapsuleMember>>, TimecapsuleError> {
    let members =
        capsules::list_members(&state.supabase, &auth.user, &auth.access_token, &capsule_id)
            .await?;
    Ok(Json(members))
}

pub async fn add_member(
    State(state): State<TimecapsuleState>,
    auth: SessionAuth,
    Path(capsule_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<CapsuleMember>), TimecapsuleError> {
    let member = capsules::add_member(
        &state.supabase,
        &auth.user,
        &auth.access_token,
        &capsule_id,
        &req.user_id,
        &req.role,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(member)))
}
