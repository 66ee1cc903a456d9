//! Per-curator, in-memory cross-cycle state.
//!
//! A [`Tracker`] is owned exclusively by the scheduler for the duration of one
//! curator's cycle. Nothing here is persisted; restarting the process simply restarts
//! every strike counter and progress sample from zero, which is a correctness-neutral
//! reset per the design notes.

use crate::domain::{DownloadId, StrikeRecord};
use std::collections::{HashMap, HashSet};

/// Cross-cycle state for a single curator.
#[derive(Debug, Default)]
pub struct Tracker {
    /// Downloads the user has marked "keep" at the download client. Never removed or
    /// tagged, regardless of job verdicts.
    pub protected: HashSet<DownloadId>,
    /// Downloads whose torrent is marked private at the tracker.
    pub private: HashSet<DownloadId>,
    /// Downloads already acted upon (removed or tagged) during the current curator
    /// cycle. Cleared at the start of every cycle; fences later jobs in the same
    /// cycle from acting on the same download twice.
    pub deleted: HashSet<DownloadId>,
    /// Downloads whose torrent files have already been checked by `remove_bad_files`
    /// and found to need no further action, so they are skipped next cycle unless
    /// their availability regresses.
    pub extension_checked: HashSet<DownloadId>,
    /// Per-download byte-progress anchor, used by `remove_slow` to compute a
    /// per-cycle delta speed.
    pub progress_by_download_id: HashMap<DownloadId, u64>,
    /// Per-job strike records: `defective[job_name][download_id]`.
    pub defective: HashMap<&'static str, HashMap<DownloadId, StrikeRecord>>,
}

impl Tracker {
    /// Create an empty tracker for a freshly configured curator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the per-cycle fence at the start of a curator's cycle. Per-cycle state
    /// (`deleted`) starts empty every cycle; everything else is genuinely cross-cycle
    /// and survives.
    pub fn begin_cycle(&mut self) {
        self.deleted.clear();
    }

    /// Replace the protected/private sets from a fresh read of download-client tags
    /// and torrent privacy flags. Called once per cycle, before removal jobs run.
    pub fn refresh_private_protected(&mut self, protected: HashSet<DownloadId>, private: HashSet<DownloadId>) {
        self.protected = protected;
        self.private = private;
    }

    /// Strike records for one job, creating the inner map on first use.
    pub fn strikes_for(&mut self, job_name: &'static str) -> &mut HashMap<DownloadId, StrikeRecord> {
        self.defective.entry(job_name).or_default()
    }

    /// All downloads with no strike records outstanding for any job are unaffected;
    /// this clears every strike record for a curator whose queue went empty, since
    /// there is nothing left to have recovered against.
    pub fn recover_all(&mut self) {
        self.defective.clear();
    }
}
