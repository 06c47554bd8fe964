//! Capsule creation, the owner's capsule list, and capsule membership.

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};
use url::Url;

use super::feed::{ITEM_SELECT, enrich_item};
use super::{media, reveal};
use crate::db::models::{
    CapsuleItemRow, CapsuleMember, CapsuleRow, FileKind, NewCapsule, NewCapsuleItem,
    NewCapsuleMember, NewItemTag, NewTag, Tag, UserCapsuleRow,
};
use crate::error::TimecapsuleError;
use crate::supabase::{Credential, SupabaseClient};
use crate::types::api::{CapsuleView, ItemView};
use crate::types::auth::AuthUser;

pub const DEFAULT_TITLE: &str = "Untitled capsule";
const NOTE_FILE_NAME: &str = "note.txt";
const NOTE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Fields of the add-capsule form.
#[derive(Debug, Clone, Default)]
pub struct ItemForm {
    pub title: Option<String>,
    pub caption: String,
    pub tags: String,
    pub reveal_months: Option<u32>,
    pub is_public: bool,
    pub file: Option<UploadedFile>,
}

impl ItemForm {
    /// The written caption, or the raw tag text when no caption was written.
    fn stored_caption(&self) -> Option<String> {
        [self.caption.trim(), self.tags.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// What gets uploaded for an item: the attached file, or the caption as a text note.
struct PendingMedia {
    path: String,
    kind: FileKind,
    content_type: String,
    bytes: Bytes,
    note: Option<String>,
}

fn pending_media(form: &ItemForm, now: DateTime<Utc>) -> Result<PendingMedia, TimecapsuleError> {
    let millis = now.timestamp_millis();
    match &form.file {
        Some(file) => Ok(PendingMedia {
            path: media::object_path(millis, &file.file_name),
            kind: FileKind::from_mime(&file.content_type)?,
            content_type: file.content_type.clone(),
            bytes: file.bytes.clone(),
            note: None,
        }),
        None => {
            let note = form.caption.trim();
            if note.is_empty() {
                return Err(TimecapsuleError::validation(
                    "Write something or attach a file.",
                ));
            }
            Ok(PendingMedia {
                path: media::object_path(millis, NOTE_FILE_NAME),
                kind: FileKind::Text,
                content_type: NOTE_CONTENT_TYPE.to_string(),
                bytes: Bytes::from(note.to_string()),
                note: Some(note.to_string()),
            })
        }
    }
}

/// Uploads the media into the bucket; nothing is written to the tables yet.
async fn upload_media(
    client: &SupabaseClient,
    access_token: &str,
    media: &PendingMedia,
) -> Result<Url, TimecapsuleError> {
    client
        .upload(
            &media.path,
            media.bytes.clone(),
            &media.content_type,
            Credential::User(access_token),
        )
        .await
}

/// Inserts the item row for already uploaded media and links its tags.
async fn record_item(
    client: &SupabaseClient,
    access_token: &str,
    capsule_id: &str,
    form: &ItemForm,
    media: PendingMedia,
    file_url: Url,
) -> Result<ItemView, TimecapsuleError> {
    let new_item = NewCapsuleItem {
        capsule_id: capsule_id.to_string(),
        file_url: file_url.to_string(),
        file_type: media.kind,
        caption: form.stored_caption(),
    };
    let item: CapsuleItemRow = client
        .insert("capsule_items", &[new_item], Credential::User(access_token))
        .await?
        .into_iter()
        .next()
        .ok_or(TimecapsuleError::NotFound("inserted capsule item"))?;

    let tags = attach_tags(client, access_token, &item.id, &form.tags).await?;
    info!(capsule_id, item_id = %item.id, kind = ?item.file_type, tags = tags.len(), "capsule item stored");

    Ok(ItemView {
        id: item.id,
        file_url: Some(item.file_url),
        file_type: item.file_type,
        caption: item.caption,
        created_at: item.created_at,
        tags,
        text_content: media.note,
    })
}

/// Upserts the parsed tag names (unique on `name`) and links them to the item.
async fn attach_tags(
    client: &SupabaseClient,
    access_token: &str,
    item_id: &str,
    raw_tags: &str,
) -> Result<Vec<Tag>, TimecapsuleError> {
    let names = media::parse_tags(raw_tags);
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let cred = Credential::User(access_token);
    let new_tags: Vec<NewTag> = names.into_iter().map(|name| NewTag { name }).collect();
    let tags: Vec<Tag> = client.upsert("tags", &new_tags, "name", cred).await?;

    let links: Vec<NewItemTag> = tags
        .iter()
        .map(|t| NewItemTag {
            capsule_item_id: item_id.to_string(),
            tag_id: t.id.clone(),
        })
        .collect();
    let _: Vec<serde_json::Value> = client.insert("capsule_item_tags", &links, cred).await?;
    Ok(tags)
}

/// Creates a capsule holding one item. The capsule row is only written once
/// the media is in the bucket, so an invalid form or a rejected upload leaves
/// no capsule behind.
pub async fn create_capsule(
    client: &SupabaseClient,
    user: &AuthUser,
    access_token: &str,
    form: ItemForm,
    now: DateTime<Utc>,
) -> Result<CapsuleView, TimecapsuleError> {
    let months = reveal::reveal_months(form.reveal_months)?;
    let unlock_at = reveal::unlock_at(now, months)?;
    let media = pending_media(&form, now)?;
    let file_url = upload_media(client, access_token, &media).await?;

    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    let new_capsule = NewCapsule {
        owner_id: user.id.clone(),
        title,
        unlock_at,
        is_released: false,
        is_public_on_release: form.is_public,
    };
    let capsule: CapsuleRow = client
        .insert("capsules", &[new_capsule], Credential::User(access_token))
        .await?
        .into_iter()
        .next()
        .ok_or(TimecapsuleError::NotFound("inserted capsule"))?;
    info!(capsule_id = %capsule.id, owner_id = %user.id, months, "capsule created");

    let item = record_item(client, access_token, &capsule.id, &form, media, file_url).await?;

    Ok(CapsuleView {
        unlock_label: reveal::unlock_label(capsule.unlock_at, capsule.is_released),
        id: capsule.id,
        title: capsule.title,
        unlock_at: capsule.unlock_at,
        is_released: capsule.is_released,
        is_public_on_release: capsule.is_public_on_release,
        item_count: 1,
        items: vec![item],
    })
}

/// Adds one more item to a capsule the caller owns.
pub async fn add_item(
    client: &SupabaseClient,
    user: &AuthUser,
    access_token: &str,
    capsule_id: &str,
    form: ItemForm,
    now: DateTime<Utc>,
) -> Result<ItemView, TimecapsuleError> {
    let media = pending_media(&form, now)?;
    let capsule = owned_capsule(client, user, access_token, capsule_id).await?;
    let file_url = upload_media(client, access_token, &media).await?;
    record_item(client, access_token, &capsule.id, &form, media, file_url).await
}

/// The caller's capsules, newest first, with text notes loaded.
pub async fn my_capsules(
    client: &SupabaseClient,
    user: &AuthUser,
) -> Result<Vec<CapsuleView>, TimecapsuleError> {
    let rows: Vec<UserCapsuleRow> = client
        .select(
            "capsules",
            &[
                (
                    "select",
                    format!(
                        "id,title,unlock_at,is_released,is_public_on_release,capsule_items({ITEM_SELECT})"
                    ),
                ),
                ("owner_id", format!("eq.{}", user.id)),
                ("order", "created_at.desc".to_string()),
            ],
            Credential::Admin,
        )
        .await?;

    let capsules = join_all(rows.into_iter().map(|row| async move {
        let items = join_all(
            row.capsule_items
                .into_iter()
                .map(|item| enrich_item(client, item)),
        )
        .await;
        CapsuleView {
            unlock_label: reveal::unlock_label(row.unlock_at, row.is_released),
            id: row.id,
            title: row.title,
            unlock_at: row.unlock_at,
            is_released: row.is_released,
            is_public_on_release: row.is_public_on_release,
            item_count: items.len(),
            items,
        }
    }))
    .await;
    Ok(capsules)
}

async fn owned_capsule(
    client: &SupabaseClient,
    user: &AuthUser,
    access_token: &str,
    capsule_id: &str,
) -> Result<CapsuleRow, TimecapsuleError> {
    let rows: Vec<CapsuleRow> = client
        .select(
            "capsules",
            &[
                ("select", "*".to_string()),
                ("id", format!("eq.{capsule_id}")),
                ("limit", "1".to_string()),
            ],
            Credential::User(access_token),
        )
        .await?;
    let capsule = rows
        .into_iter()
        .next()
        .ok_or(TimecapsuleError::NotFound("capsule"))?;
    if capsule.owner_id != user.id {
        warn!(capsule_id, user_id = %user.id, "capsule access by non-owner refused");
        return Err(TimecapsuleError::Forbidden);
    }
    Ok(capsule)
}

pub async fn list_members(
    client: &SupabaseClient,
    user: &AuthUser,
    access_token: &str,
    capsule_id: &str,
) -> Result<Vec<CapsuleMember>, TimecapsuleError> {
    let capsule = owned_capsule(client, user, access_token, capsule_id).await?;
    client
        .select(
            "capsule_members",
            &[
                ("select", "*".to_string()),
                ("capsule_id", format!("eq.{}", capsule.id)),
                ("order", "created_at.asc".to_string()),
            ],
            Credential::User(access_token),
        )
        .await
}

pub async fn add_member(
    client: &SupabaseClient,
    user: &AuthUser,
    access_token: &str,
    capsule_id: &str,
    member_user_id: &str,
    role: &str,
) -> Result<CapsuleMember, TimecapsuleError> {
    let member_user_id = member_user_id.trim();
    if member_user_id.is_empty() {
        return Err(TimecapsuleError::validation("Please choose someone to add."));
    }
    if member_user_id == user.id {
        return Err(TimecapsuleError::validation("You already own this capsule."));
    }
    let capsule = owned_capsule(client, user, access_token, capsule_id).await?;
    let member = NewCapsuleMember {
        capsule_id: capsule.id,
        user_id: member_user_id.to_string(),
        role: role.trim().to_string(),
    };
    let stored: CapsuleMember = client
        .insert("capsule_members", &[member], Credential::User(access_token))
        .await?
        .into_iter()
        .next()
        .ok_or(TimecapsuleError::NotFound("inserted member"))?;
    info!(capsule_id, member = %stored.user_id, role = %stored.role, "capsule member added");
    Ok(stored)
}
