//! CycleScheduler (§4.10): the top-level tick loop.
//!
//! `CycleScheduler → for each curator → ClientGateway.refreshSessions →
//! Tracker.refreshPrivateProtected → QueueFetcher.get(scope) → each RemovalJob.predicate
//! → StrikeFilter → ActionDispatcher → ClientGateway.mutate → SearchJobs → sleep`.

use crate::action_dispatcher::{self, DispatchContext};
use crate::config::Config;
use crate::domain::{Scope, WantedKind};
use crate::error::Result;
use crate::gateway::{CuratorGateway, DownloadClientGateway};
use crate::jobs::{self, DownloadClients};
use crate::queue_fetcher;
use crate::search_jobs;
use crate::tracker::Tracker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// One configured curator plus the subset of download clients its queue entries can
/// reference.
pub struct CuratorUnit {
    pub gateway: Arc<dyn CuratorGateway>,
    pub download_clients: DownloadClients,
    pub tracker: Tracker,
}

/// Owns every curator's [`Tracker`] for the process lifetime and drives the tick loop.
pub struct CycleScheduler {
    config: Config,
    curators: Vec<CuratorUnit>,
    torrent_clients: Vec<Arc<dyn DownloadClientGateway>>,
}

impl CycleScheduler {
    pub fn new(config: Config, curators: Vec<CuratorUnit>, torrent_clients: Vec<Arc<dyn DownloadClientGateway>>) -> Self {
        Self {
            config,
            curators,
            torrent_clients,
        }
    }

    /// Run forever, one tick per `general.timer` minutes, until a termination signal
    /// interrupts the sleep.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.tick().await;

            let sleep_secs = self.config.general.timer * 60;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(sleep_secs)) => {}
                _ = wait_for_signal() => {
                    info!("shutdown signal received, exiting");
                    return Ok(());
                }
            }
        }
    }

    async fn tick(&mut self) {
        for client in &self.torrent_clients {
            if let Err(err) = client.ensure_session().await {
                warn!(client = client.name(), error = %err, "session refresh failed");
            }
        }

        let dispatch_ctx = DispatchContext {
            private_tracker_handling: self.config.general.private_tracker_handling,
            public_tracker_handling: self.config.general.public_tracker_handling,
            obsolete_tag: self.config.general.obsolete_tag.clone(),
        };

        for curator in &mut self.curators {
            run_curator_cycle(curator, &self.config, &dispatch_ctx).await;
        }
    }
}

#[instrument(skip_all, fields(curator = curator.gateway.name()))]
async fn run_curator_cycle(curator: &mut CuratorUnit, config: &Config, dispatch_ctx: &DispatchContext) {
    curator.tracker.begin_cycle();

    for client in curator.download_clients.values() {
        match client.probe_connected().await {
            Ok(true) => {}
            Ok(false) => {
                warn!(client = client.name(), "download client disconnected, skipping curator this cycle");
                return;
            }
            Err(err) => {
                warn!(client = client.name(), error = %err, "download client unreachable, skipping curator this cycle");
                return;
            }
        }
    }

    let jobs = jobs::ordered_jobs();
    let resolved: Vec<_> = jobs
        .iter()
        .map(|job| (job, config.resolved_job(job.name(), job.uses_strikes())))
        .collect();
    let any_enabled = resolved.iter().any(|(_, cfg)| cfg.enabled);

    let queue = match queue_fetcher::fetch(
        curator.gateway.as_ref(),
        Scope::Normal,
        &config.general.ignored_download_clients,
    )
    .await
    {
        Ok(queue) => queue,
        Err(err) => {
            warn!(error = %err, "queue fetch failed, skipping curator this cycle");
            return;
        }
    };

    if any_enabled && !queue.is_empty() {
        if let Err(err) = refresh_private_protected(curator, &config.general.protected_tag).await {
            warn!(error = %err, "failed to refresh private/protected classification");
        }
        for (job, job_config) in &resolved {
            if !job_config.enabled {
                continue;
            }
            match jobs::run_job(
                job.as_ref(),
                curator.gateway.as_ref(),
                &curator.download_clients,
                &mut curator.tracker,
                job_config,
                &config.general.ignored_download_clients,
                config.general.timer,
                dispatch_ctx,
            )
            .await
            {
                Ok(count) if count > 0 => info!(job = job.name(), count, "acted on offending downloads"),
                Ok(_) => {}
                Err(err) => warn!(job = job.name(), error = %err, "job failed"),
            }
        }
    } else if queue.is_empty() && resolved.iter().any(|(job, _)| job.uses_strikes()) {
        curator.tracker.recover_all();
    }

    run_search_jobs(curator, config).await;
}

async fn refresh_private_protected(curator: &mut CuratorUnit, protected_tag: &str) -> Result<()> {
    let mut protected = std::collections::HashSet::new();
    let mut private = std::collections::HashSet::new();
    for client in curator.download_clients.values() {
        let ids = client.list_items(&[]).await?;
        for item in ids {
            if item.tags.iter().any(|t| t.eq_ignore_ascii_case(protected_tag)) {
                protected.insert(item.download_id.clone());
            }
            if item.is_private == Some(true) {
                private.insert(item.download_id);
            }
        }
    }
    curator.tracker.refresh_private_protected(protected, private);
    Ok(())
}

async fn run_search_jobs(curator: &mut CuratorUnit, config: &Config) {
    let missing_config = config.resolved_job("search_missing", false);
    let cutoff_config = config.resolved_job("search_cutoff_unmet", false);
    if !missing_config.enabled && !cutoff_config.enabled {
        return;
    }

    let queue = match queue_fetcher::fetch(curator.gateway.as_ref(), Scope::Normal, &config.general.ignored_download_clients).await {
        Ok(queue) => queue,
        Err(err) => {
            warn!(error = %err, "queue fetch failed, skipping search jobs this cycle");
            return;
        }
    };
    let in_queue: std::collections::HashSet<i64> = queue.iter().filter_map(|item| item.detail_item_id).collect();
    let now = chrono::Utc::now();

    if missing_config.enabled {
        if let Err(err) = search_jobs::run(curator.gateway.as_ref(), WantedKind::Missing, &missing_config, &in_queue, now).await {
            warn!(error = %err, "search-missing failed");
        }
    }
    if cutoff_config.enabled {
        if let Err(err) = search_jobs::run(curator.gateway.as_ref(), WantedKind::CutoffUnmet, &cutoff_config, &in_queue, now).await {
            warn!(error = %err, "search-cutoff-unmet failed");
        }
    }
}

/// Wait for a termination signal, matching the teacher's Unix/non-Unix split.
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigint.recv() => info!("received SIGINT"),
            }
        }
        _ => {
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.ok();
}
