//! Guided-search pacing (§4.9): search-missing and search-cutoff-unmet. Both variants
//! share the same exclude/pace/cap/trigger shape; only the wanted-list query differs.

use crate::config::ResolvedJobConfig;
use crate::domain::{CuratorKind, WantedKind};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Run one search variant for one curator. `queue_detail_item_ids` is the set of
/// detail-item ids already present in the curator's current normal queue.
pub async fn run(
    curator: &dyn CuratorGateway,
    kind: WantedKind,
    config: &ResolvedJobConfig,
    queue_detail_item_ids: &HashSet<i64>,
    now: DateTime<Utc>,
) -> Result<usize> {
    if !config.enabled {
        return Ok(0);
    }
    if !curator.kind().supports_search() {
        debug!(curator = curator.name(), kind = ?curator.kind(), "curator kind does not support guided search");
        return Ok(0);
    }

    let wanted = curator.list_wanted(kind).await?;
    if wanted.is_empty() {
        debug!(curator = curator.name(), "nothing wanted, skipping search");
        return Ok(0);
    }

    let min_days = chrono::Duration::days(config.min_days_between_searches);
    let candidates: Vec<i64> = wanted
        .into_iter()
        .filter(|w| !queue_detail_item_ids.contains(&w.detail_item_id))
        .filter(|w| match w.last_search_time {
            Some(last) => last + min_days <= now,
            None => true,
        })
        .take(config.max_concurrent_searches as usize)
        .map(|w| w.detail_item_id)
        .collect();

    if candidates.is_empty() {
        return Ok(0);
    }

    curator.command_search(&candidates).await?;
    Ok(candidates.len())
}
