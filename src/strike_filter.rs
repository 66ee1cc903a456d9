//! Generic "N consecutive cycles before action" rule, shared by every removal job that
//! declares a `maxStrikes`.

use crate::domain::{DownloadGrouping, DownloadId, StrikeRecord};
use crate::tracker::Tracker;
use std::collections::HashSet;
use tracing::{debug, info};

/// How a downloadId's strike record changed this cycle, for logging.
#[derive(Debug, PartialEq, Eq)]
pub enum StrikeClassification {
    /// No longer offending; tracking was paused, so the record is left alone.
    Paused,
    /// No longer offending and no longer in the queue at all; record deleted.
    RemovedFromQueue,
    /// No longer offending and still in the queue; record deleted.
    Recovered,
    /// First offense; strikes == 1.
    Added,
    /// Repeat offense; strikes > 1.
    Incremented,
}

/// Runs the recover/increment/filter state machine for one job's strike map against
/// this cycle's offending groups and full queue.
pub fn apply(
    tracker: &mut Tracker,
    job_name: &'static str,
    max_strikes: u32,
    offending: Vec<DownloadGrouping>,
    queue_download_ids: &HashSet<DownloadId>,
) -> Vec<DownloadGrouping> {
    let offending_ids: HashSet<DownloadId> =
        offending.iter().map(|g| g.download_id.clone()).collect();

    recover(tracker, job_name, &offending_ids, queue_download_ids);
    increment(tracker, job_name, &offending);
    filter_strike_exceeds(tracker, job_name, max_strikes, offending)
}

/// For every tracked downloadId not in this cycle's offending set: leave it alone if
/// tracking is paused, otherwise delete the record (classified as recovered, or
/// removed-from-queue if the download vanished from the queue entirely).
fn recover(
    tracker: &mut Tracker,
    job_name: &'static str,
    offending_ids: &HashSet<DownloadId>,
    queue_download_ids: &HashSet<DownloadId>,
) {
    let strikes = tracker.strikes_for(job_name);
    let tracked: Vec<DownloadId> = strikes.keys().cloned().collect();
    for download_id in tracked {
        if offending_ids.contains(&download_id) {
            continue;
        }
        let record = &strikes[&download_id];
        if record.tracking_paused {
            debug!(job = job_name, download_id = %download_id, "strike tracking paused");
            continue;
        }
        let classification = if queue_download_ids.contains(&download_id) {
            StrikeClassification::Recovered
        } else {
            StrikeClassification::RemovedFromQueue
        };
        info!(job = job_name, download_id = %download_id, ?classification, "strike record cleared");
        strikes.remove(&download_id);
    }
}

/// For every downloadId in this cycle's offending set, increment its strike count
/// (creating a fresh record at strikes=1 if none exists yet).
fn increment(tracker: &mut Tracker, job_name: &'static str, offending: &[DownloadGrouping]) {
    let strikes = tracker.strikes_for(job_name);
    for group in offending {
        let record = strikes
            .entry(group.download_id.clone())
            .or_insert_with(|| StrikeRecord {
                job_name,
                download_id: group.download_id.clone(),
                title: group.items[0].title.clone(),
                strikes: 0,
                tracking_paused: false,
                pause_reason: None,
            });
        if record.tracking_paused {
            // Saturate-paused downloads neither accrue nor recover this cycle.
            continue;
        }
        record.strikes += 1;
        let classification = if record.strikes == 1 {
            StrikeClassification::Added
        } else {
            StrikeClassification::Incremented
        };
        debug!(job = job_name, download_id = %group.download_id, strikes = record.strikes, ?classification, "strike recorded");
    }
}

/// Retain only groups whose strike count now strictly exceeds `max_strikes` — the
/// first exceeding cycle is the one that triggers removal.
fn filter_strike_exceeds(
    tracker: &mut Tracker,
    job_name: &'static str,
    max_strikes: u32,
    offending: Vec<DownloadGrouping>,
) -> Vec<DownloadGrouping> {
    let strikes = tracker.strikes_for(job_name);
    offending
        .into_iter()
        .filter(|group| {
            strikes
                .get(&group.download_id)
                .map(|r| !r.tracking_paused && r.strikes > max_strikes)
                .unwrap_or(false)
        })
        .collect()
}

/// Mark a download's strike tracking as paused (e.g. bandwidth saturation), so it
/// neither accrues further strikes nor is recovered while the condition holds.
pub fn pause(tracker: &mut Tracker, job_name: &'static str, download_id: &str, title: &str, reason: &str) {
    let strikes = tracker.strikes_for(job_name);
    let record = strikes
        .entry(download_id.to_string())
        .or_insert_with(|| StrikeRecord {
            job_name,
            download_id: download_id.to_string(),
            title: title.to_string(),
            strikes: 0,
            tracking_paused: false,
            pause_reason: None,
        });
    record.tracking_paused = true;
    record.pause_reason = Some(reason.to_string());
}

/// Clear a download's pause flag, letting it accrue/recover normally again.
pub fn unpause(tracker: &mut Tracker, job_name: &'static str, download_id: &str) {
    if let Some(record) = tracker.strikes_for(job_name).get_mut(download_id) {
        record.tracking_paused = false;
        record.pause_reason = None;
    }
}
