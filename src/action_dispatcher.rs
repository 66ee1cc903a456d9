//! Handling-mode decision and execution for offending download groups (§4.8).
//!
//! Every removal job funnels its surviving offending groups through [`dispatch`],
//! which is the one place that decides remove vs. tag-as-obsolete vs. skip and the one
//! place that records a download as handled for the rest of the cycle.

use crate::config::TrackerHandlingConfig;
use crate::domain::{DownloadClientKind, DownloadGrouping, Protocol, TrackerHandling};
use crate::error::Result;
use crate::gateway::CuratorGateway;
use crate::jobs::DownloadClients;
use crate::tracker::Tracker;
use tracing::info;

/// The handling-mode inputs the dispatcher needs, read once per cycle from
/// [`crate::config::GeneralConfig`].
pub struct DispatchContext {
    /// Handling mode for offending downloads whose tracker is private.
    pub private_tracker_handling: TrackerHandlingConfig,
    /// Handling mode for offending downloads whose tracker is public (or unknown).
    pub public_tracker_handling: TrackerHandlingConfig,
    /// Tag applied instead of removal when handling mode is `tag_as_obsolete`.
    pub obsolete_tag: String,
}

/// Dispatch every offending group: decide remove/tag/skip, execute it, and fence the
/// download from later jobs in the same cycle via `Tracker.deleted`.
pub async fn dispatch(
    groups: Vec<DownloadGrouping>,
    blocklist_on_removal: bool,
    tracker: &mut Tracker,
    curator: &dyn CuratorGateway,
    clients: &DownloadClients,
    ctx: &DispatchContext,
) -> Result<()> {
    for group in groups {
        if tracker.deleted.contains(&group.download_id) {
            continue;
        }

        let mode = handling_mode(&group, tracker, clients, ctx);
        execute(&group, mode, blocklist_on_removal, curator, clients, ctx).await?;

        for message in &group.removal_messages {
            info!(download_id = %group.download_id, message, "removal message");
        }

        tracker.deleted.insert(group.download_id.clone());
    }
    Ok(())
}

/// Non-torrent downloads are always removed outright (the private/public distinction
/// is meaningless without a tracker). A torrent whose configured download client is
/// missing, or isn't a torrent-p2p client, can never be tagged, and neither can any
/// torrent if no torrent-p2p client is configured at all — those fall back to removal
/// before the private/public distinction is even consulted. Otherwise torrent downloads
/// consult `Tracker.private` and the corresponding configured handling mode.
fn handling_mode(group: &DownloadGrouping, tracker: &Tracker, clients: &DownloadClients, ctx: &DispatchContext) -> TrackerHandling {
    if group.protocol() != Protocol::TorrentP2p {
        return TrackerHandling::Remove;
    }
    let client_is_torrent_p2p = clients
        .get(group.download_client_name())
        .is_some_and(|c| c.kind() == DownloadClientKind::TorrentP2p);
    let any_torrent_p2p_client_configured = clients.values().any(|c| c.kind() == DownloadClientKind::TorrentP2p);
    if !client_is_torrent_p2p || !any_torrent_p2p_client_configured {
        return TrackerHandling::Remove;
    }
    if tracker.private.contains(&group.download_id) {
        ctx.private_tracker_handling
    } else {
        ctx.public_tracker_handling
    }
}

async fn execute(
    group: &DownloadGrouping,
    mode: TrackerHandling,
    blocklist_on_removal: bool,
    curator: &dyn CuratorGateway,
    clients: &DownloadClients,
    ctx: &DispatchContext,
) -> Result<()> {
    match mode {
        TrackerHandling::Remove => {
            curator
                .remove_queue_entry(group.first_queue_entry_id(), blocklist_on_removal)
                .await?;
        }
        TrackerHandling::TagAsObsolete => {
            for client in clients.values().filter(|c| c.kind() == DownloadClientKind::TorrentP2p) {
                client
                    .apply_tag(&ctx.obsolete_tag, std::slice::from_ref(&group.download_id))
                    .await?;
            }
        }
        TrackerHandling::Skip => {}
    }
    Ok(())
}
