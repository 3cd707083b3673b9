use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::datetime::iso_timestamp_serde;
use crate::filter::FilterState;
use crate::ops::next_id;

pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// A named snapshot of a query and filter state. Lives until deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: u64,
    pub name: String,

    #[serde(default)]
    pub query: String,

    #[serde(default)]
    pub filters: FilterState,

    #[serde(with = "iso_timestamp_serde")]
    pub created_at: DateTime<Utc>,
}

/// Stores a new saved search at the front of the list.
#[tracing::instrument(skip(saved, filters, now))]
pub fn save_search(
    saved: &[SavedSearch],
    name: &str,
    query: &str,
    filters: &FilterState,
    now: DateTime<Utc>,
) -> (Vec<SavedSearch>, u64) {
    let id = next_id(saved.iter().map(|s| s.id), now);
    let mut out = Vec::with_capacity(saved.len() + 1);
    out.push(SavedSearch {
        id,
        name: name.trim().to_string(),
        query: query.to_string(),
        filters: filters.clone(),
        created_at: now,
    });
    out.extend(saved.iter().cloned());
    info!(id, "saved search");
    (out, id)
}

#[tracing::instrument(skip(saved))]
pub fn delete_saved_search(saved: &[SavedSearch], id: u64) -> Vec<SavedSearch> {
    let out: Vec<SavedSearch> = saved.iter().filter(|s| s.id != id).cloned().collect();
    info!(removed = saved.len() - out.len(), "deleted saved search");
    out
}

/// Pushes a submitted query onto the recent list: newest first, no
/// duplicates, at most `limit` entries. Empty queries are not recorded.
pub fn record_recent(recent: &[String], query: &str, limit: usize) -> Vec<String> {
    if query.is_empty() || recent.iter().any(|q| q == query) {
        return recent.to_vec();
    }

    let mut out = Vec::with_capacity(limit);
    out.push(query.to_string());
    out.extend(recent.iter().take(limit.saturating_sub(1)).cloned());
    out.truncate(limit);
    debug!(query, len = out.len(), "recorded recent search");
    out
}
