//! # queue-warden
//!
//! A long-running maintenance daemon for media-library curator applications (Radarr,
//! Sonarr, Lidarr, Readarr, and their specialized-content analogues) that delegate
//! downloads to external torrent and Usenet clients.
//!
//! Curators accumulate pathological queue entries over time: stalled transfers,
//! throughput that has collapsed below a usable floor, downloads stuck importing,
//! orphaned entries with no backing media item, items the user has unmonitored. This
//! crate periodically inspects each configured curator's queue, classifies every entry
//! against a configurable rule set, and removes, blocklists, or tags the offenders —
//! while honoring per-download protection tags and private-tracker handling rules, and
//! requiring repeated detection across cycles before acting.
//!
//! ## Quick start
//!
//! ```no_run
//! use queue_warden::config::Config;
//! use queue_warden::bootstrap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(std::path::Path::new("queue-warden.yaml"))?;
//!     let mut scheduler = bootstrap::build_scheduler(config).await?;
//!     scheduler.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Handling-mode decision and execution for offending download groups.
pub mod action_dispatcher;
/// Process wiring: turns a loaded [`config::Config`] into a running [`scheduler::CycleScheduler`].
pub mod bootstrap;
/// Configuration tree and loading.
pub mod config;
/// Optional on-disk deletion watcher, bridging filesystem events to curator refreshes.
pub mod deletion_bridge;
/// Core domain types.
pub mod domain;
/// Crate-wide error type.
pub mod error;
/// Capability façades over curator and download-client backends.
pub mod gateway;
/// Removal job family and the shared outer loop every job runs under.
pub mod jobs;
/// Queue retrieval and normalization.
pub mod queue_fetcher;
/// Top-level tick loop.
pub mod scheduler;
/// Guided-search pacing.
pub mod search_jobs;
/// Generic strike-tracking state machine shared by every removal job.
pub mod strike_filter;
#[cfg(test)]
mod test_support;
/// Per-curator, in-memory cross-cycle state.
pub mod tracker;
