//! Removal job family (§4.4) and the shared outer loop every job runs under.

pub mod bad_files;
pub mod failed_downloads;
pub mod failed_imports;
pub mod metadata_missing;
pub mod missing_files;
pub mod orphans;
pub mod slow;
pub mod stalled;
pub mod unmonitored;

use crate::action_dispatcher::{self, DispatchContext};
use crate::config::ResolvedJobConfig;
use crate::domain::{DownloadGrouping, DownloadId, QueueItem, Scope};
use crate::error::Result;
use crate::gateway::{CuratorGateway, DownloadClientGateway};
use crate::queue_fetcher;
use crate::strike_filter;
use crate::tracker::Tracker;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Configured download clients, keyed by their exact configured name (how curators
/// report their bindings).
pub type DownloadClients = HashMap<String, Arc<dyn DownloadClientGateway>>;

/// A removal job: a predicate that turns a scoped queue snapshot into offending
/// download groups, plus the metadata the outer loop needs to run it.
///
/// `predicate` returns already-grouped offenders rather than a flat item list: most
/// jobs group trivially after filtering, but `remove_unmonitored`'s cohort rule and
/// `remove_bad_files`'s torrent-level rule both need to reason about whole groups
/// while deciding what is offending, so grouping is pushed into the predicate itself
/// and the outer loop treats its output uniformly.
#[async_trait]
pub trait RemovalJob: Send + Sync {
    /// Stable name; doubles as the strike-tracker key.
    fn name(&self) -> &'static str;
    /// Which queue scope this job's predicate runs against.
    fn scope(&self) -> Scope;
    /// Whether a removal triggered by this job also blocklists the download.
    fn blocklist_on_removal(&self) -> bool;
    /// Whether this job participates in strike tracking at all.
    fn uses_strikes(&self) -> bool;

    /// Evaluate the predicate and return offending, already-grouped downloads.
    #[allow(clippy::too_many_arguments)]
    async fn predicate(
        &self,
        items: &[QueueItem],
        tracker: &mut Tracker,
        config: &ResolvedJobConfig,
        curator: &dyn CuratorGateway,
        clients: &DownloadClients,
        timer_minutes: u64,
    ) -> Result<Vec<DownloadGrouping>>;
}

/// The fixed execution order named in §5: later jobs observe `Tracker.deleted` left by
/// earlier ones.
pub fn ordered_jobs() -> Vec<Box<dyn RemovalJob>> {
    vec![
        Box::new(bad_files::BadFiles),
        Box::new(failed_imports::FailedImports),
        Box::new(failed_downloads::FailedDownloads),
        Box::new(metadata_missing::MetadataMissing),
        Box::new(missing_files::MissingFiles),
        Box::new(orphans::Orphans),
        Box::new(slow::Slow),
        Box::new(stalled::Stalled),
        Box::new(unmonitored::Unmonitored),
    ]
}

/// Run one job's full outer loop (§4.4): fetch, predicate, de-protect, strike-filter,
/// dispatch. Returns the number of downloads acted upon.
#[allow(clippy::too_many_arguments)]
pub async fn run_job(
    job: &dyn RemovalJob,
    curator: &dyn CuratorGateway,
    clients: &DownloadClients,
    tracker: &mut Tracker,
    config: &ResolvedJobConfig,
    ignored_download_clients: &[String],
    timer_minutes: u64,
    dispatch_ctx: &DispatchContext,
) -> Result<usize> {
    if !config.enabled {
        return Ok(0);
    }

    let queue = queue_fetcher::fetch(curator, job.scope(), ignored_download_clients).await?;
    let queue_download_ids: HashSet<DownloadId> =
        queue.iter().map(|item| item.download_id.clone()).collect();

    let mut groups = job
        .predicate(&queue, tracker, config, curator, clients, timer_minutes)
        .await?;

    groups.retain(|g| !tracker.protected.contains(&g.download_id));

    if let Some(max_strikes) = config.max_strikes {
        groups = strike_filter::apply(tracker, job.name(), max_strikes, groups, &queue_download_ids);
    }

    let acted = groups.len();
    if acted > 0 {
        info!(job = job.name(), count = acted, "dispatching offending downloads");
    }
    action_dispatcher::dispatch(groups, job.blocklist_on_removal(), tracker, curator, clients, dispatch_ctx).await?;
    Ok(acted)
}
