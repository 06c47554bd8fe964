use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{FileKind, Tag};
use crate::types::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm: String,
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: AuthUser,
    /// Page the client navigates to next.
    pub redirect: String,
    #[serde(default)]
    pub confirmation_required: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedirectResponse {
    pub redirect: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    #[serde(default)]
    pub new_email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Success text shown inline under a settings form.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemView {
    pub id: String,
    pub file_url: Option<String>,
    pub file_type: FileKind,
    pub caption: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Vec<Tag>,
    /// Body of a text note, fetched from its file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedItem {
    #[serde(flatten)]
    pub item: ItemView,
    pub capsule_title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
    pub count: usize,
    /// `N results for "q"`, present while searching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapsuleView {
    pub id: String,
    pub title: String,
    pub unlock_at: DateTime<Utc>,
    pub unlock_label: String,
    pub is_released: bool,
    pub is_public_on_release: bool,
    pub item_count: usize,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CapsulesResponse {
    pub capsules: Vec<CapsuleView>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
    #[serde(default = "default_member_role")]
    pub role: String,
}

fn default_member_role() -> String {
    "viewer".to_string()
}
