use axum::{
    Json,
    extract::{Query, State},
};

use crate::error::TimecapsuleError;
use crate::router::TimecapsuleState;
use crate::service::feed;
use crate::service::reveal::{REVEAL_OPTIONS, RevealOption};
use crate::types::api::{FeedQuery, FeedResponse};

/// GET /api/feed?search= -> released public items, filtered by tag when searching.
pub async fn public_feed(
    State(state): State<TimecapsuleState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, TimecapsuleError> {
    let resp = feed::public_feed(&state.supabase, query.search.as_deref()).await?;
    Ok(Json(resp))
}

pub async fn reveal_options() -> Json<&'static [RevealOption]> {
    Json(&REVEAL_OPTIONS)
}
