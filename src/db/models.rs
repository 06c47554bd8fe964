use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TimecapsuleError;

/// Kind of a capsule item, derived from the uploaded file's MIME type.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Text,
    /// Stored rows with a null or unrecognized type. Never produced for uploads.
    #[default]
    Other,
}

/// Accepts the bare kind (`image`), a full MIME type (`image/png`) as older
/// rows hold, or null.
impl<'de> Deserialize<'de> for FileKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .and_then(|s| FileKind::from_mime(s).ok())
            .unwrap_or_default())
    }
}

impl FileKind {
    pub fn from_mime(mime: &str) -> Result<Self, TimecapsuleError> {
        let top = mime
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match top.as_str() {
            "image" => Ok(FileKind::Image),
            "video" => Ok(FileKind::Video),
            "audio" => Ok(FileKind::Audio),
            "text" => Ok(FileKind::Text),
            _ => Err(TimecapsuleError::UnsupportedMedia(mime.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapsuleRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub unlock_at: DateTime<Utc>,
    pub is_released: bool,
    pub is_public_on_release: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCapsule {
    pub owner_id: String,
    pub title: String,
    pub unlock_at: DateTime<Utc>,
    pub is_released: bool,
    pub is_public_on_release: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapsuleItemRow {
    pub id: String,
    pub capsule_id: String,
    pub file_url: String,
    pub file_type: FileKind,
    pub caption: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCapsuleItem {
    pub capsule_id: String,
    pub file_url: String,
    pub file_type: FileKind,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTag {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewItemTag {
    pub capsule_item_id: String,
    pub tag_id: String,
}

/// One `capsule_item_tags` row with its tag embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemTagLink {
    pub tags: Option<Tag>,
}

/// A capsule item as embedded in a select, tags included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedItem {
    pub id: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_type: FileKind,
    pub caption: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub capsule_item_tags: Vec<ItemTagLink>,
}

impl EmbeddedItem {
    pub fn tags(&self) -> Vec<Tag> {
        self.capsule_item_tags
            .iter()
            .filter_map(|link| link.tags.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedCapsule {
    pub title: String,
    pub is_released: bool,
    pub is_public_on_release: bool,
}

/// Row shape of the public feed select (`capsule_items` with its capsule inner-joined).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedItemRow {
    #[serde(flatten)]
    pub item: EmbeddedItem,
    pub capsules: FeedCapsule,
}

/// Row shape of the owner's capsule select (`capsules` with items embedded).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCapsuleRow {
    pub id: String,
    pub title: String,
    pub unlock_at: DateTime<Utc>,
    pub is_released: bool,
    pub is_public_on_release: bool,
    #[serde(default)]
    pub capsule_items: Vec<EmbeddedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapsuleMember {
    pub capsule_id: String,
    pub user_id: String,
    pub role: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCapsuleMember {
    pub capsule_id: String,
    pub user_id: String,
    pub role: String,
}
