//! Public feed: released, public capsule items, newest first, searchable by tag.

use futures::future::join_all;
use tracing::{debug, info};

use crate::db::models::{EmbeddedItem, FeedItemRow, FileKind};
use crate::error::TimecapsuleError;
use crate::supabase::{Credential, SupabaseClient, TEXT_PLACEHOLDER};
use crate::types::api::{FeedItem, FeedResponse, ItemView};

pub(crate) const ITEM_SELECT: &str =
    "id,file_url,file_type,caption,created_at,capsule_item_tags(tags(id,name))";

const FEED_SELECT: &str = "id,file_url,file_type,caption,created_at,\
    capsules!inner(title,is_released,is_public_on_release),\
    capsule_item_tags(tags(id,name))";

pub async fn public_feed(
    client: &SupabaseClient,
    search: Option<&str>,
) -> Result<FeedResponse, TimecapsuleError> {
    let rows: Vec<FeedItemRow> = client
        .select(
            "capsule_items",
            &[
                ("select", FEED_SELECT.to_string()),
                ("capsules.is_released", "eq.true".to_string()),
                ("capsules.is_public_on_release", "eq.true".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
            Credential::Admin,
        )
        .await?;

    // The inner join already filters, but rows are re-checked in case the
    // embedded filter is dropped by a proxy or an older PostgREST.
    let rows: Vec<FeedItemRow> = rows
        .into_iter()
        .filter(|r| r.capsules.is_released && r.capsules.is_public_on_release)
        .collect();

    let items = join_all(rows.into_iter().map(|row| async move {
        FeedItem {
            item: enrich_item(client, row.item).await,
            capsule_title: row.capsules.title,
        }
    }))
    .await;

    let search = search.unwrap_or_default();
    let items = filter_by_tag(items, search);
    let summary = (!search.trim().is_empty()).then(|| result_summary(items.len(), search));
    info!(count = items.len(), search, "public feed served");

    Ok(FeedResponse {
        count: items.len(),
        items,
        summary,
    })
}

/// Fetches the body of text items; other kinds pass through untouched.
pub(crate) async fn enrich_item(client: &SupabaseClient, item: EmbeddedItem) -> ItemView {
    let text_content = match (item.file_type, item.file_url.as_deref()) {
        (FileKind::Text, Some(url)) => Some(client.fetch_text(url).await),
        (FileKind::Text, None) => Some(TEXT_PLACEHOLDER.to_string()),
        _ => None,
    };
    let tags = item.tags();
    ItemView {
        id: item.id,
        file_url: item.file_url,
        file_type: item.file_type,
        caption: item.caption,
        created_at: item.created_at,
        tags,
        text_content,
    }
}

/// Blank search keeps everything; otherwise any tag name must contain the
/// search, ignoring case.
pub fn filter_by_tag(items: Vec<FeedItem>, search: &str) -> Vec<FeedItem> {
    if search.trim().is_empty() {
        return items;
    }
    let needle = search.to_lowercase();
    let kept: Vec<FeedItem> = items
        .into_iter()
        .filter(|fi| {
            fi.item
                .tags
                .iter()
                .any(|t| t.name.to_lowercase().contains(&needle))
        })
        .collect();
    debug!(search, kept = kept.len(), "tag filter applied");
    kept
}

pub fn result_summary(count: usize, search: &str) -> String {
    let noun = if count == 1 { "result" } else { "results" };
    format!("{count} {noun} for \u{201c}{search}\u{201d}")
}
