//! Configuration tree and loading.
//!
//! The tree mirrors the YAML shape of the original implementation this daemon
//! replaces: `general`, `jobDefaults`, `jobs`, `instances`, `downloadClients`. Every
//! optional field carries the default named in the external-interface contract, so a
//! config file only needs to state what it overrides.

use crate::domain::CuratorKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_timer() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_obsolete_tag() -> String {
    "obsolete".into()
}
fn default_protected_tag() -> String {
    "Keep".into()
}
fn default_max_strikes() -> u32 {
    3
}
fn default_min_speed_kbs() -> f64 {
    100.0
}
fn default_max_concurrent_searches() -> u32 {
    3
}
fn default_min_days_between_searches() -> i64 {
    7
}
fn default_message_patterns() -> Vec<String> {
    vec!["*".into()]
}

/// Log verbosity. `Verbose` sits between `Debug` and `Info`: it enables the routine
/// per-item classification logging (strike increments, recoveries) that `Info` alone
/// suppresses, without the full per-HTTP-call detail `Debug` turns on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Everything, including per-HTTP-call detail.
    Debug,
    /// Routine per-item classification plus anything `Info` shows.
    Verbose,
    /// Cycle/curator summaries and warnings/errors only.
    Info,
}

impl LogLevel {
    /// The `tracing`/`EnvFilter` directive string this level maps to.
    pub fn as_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "info,queue_warden=debug",
            LogLevel::Info => "info",
        }
    }
}

/// How offending downloads are handled, as configured (not the same type as
/// [`crate::domain::TrackerHandling`]'s wire-neutral form, but deserializes to it).
pub type TrackerHandlingConfig = crate::domain::TrackerHandling;

/// `general` section of the config tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralConfig {
    /// Log verbosity.
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    /// Suppress all mutating backend calls; reads proceed normally.
    #[serde(default)]
    pub test_run: bool,
    /// Minutes between cycles.
    #[serde(default = "default_timer")]
    pub timer: u64,
    /// Whether to verify TLS certificates on backend HTTP calls.
    #[serde(default = "default_true")]
    pub ssl_verification: bool,
    /// Download client names to exclude from every queue fetch.
    #[serde(default)]
    pub ignored_download_clients: Vec<String>,
    /// Handling mode for offending downloads on private trackers.
    pub private_tracker_handling: TrackerHandlingConfig,
    /// Handling mode for offending downloads on public trackers.
    pub public_tracker_handling: TrackerHandlingConfig,
    /// Tag applied instead of removal when handling mode is `tag_as_obsolete`.
    #[serde(default = "default_obsolete_tag")]
    pub obsolete_tag: String,
    /// Download-client tag that marks a download as never-to-be-acted-upon.
    #[serde(default = "default_protected_tag")]
    pub protected_tag: String,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// `jobDefaults` section: values every job falls back to unless it overrides them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefaults {
    /// Consecutive offending cycles required before action.
    #[serde(default = "default_max_strikes")]
    pub max_strikes: u32,
    /// Minimum acceptable per-cycle throughput in KB/s for `remove_slow`.
    #[serde(default = "default_min_speed_kbs")]
    pub min_speed_kbs: f64,
    /// Maximum items searched per `SearchJobs` invocation.
    #[serde(default = "default_max_concurrent_searches")]
    pub max_concurrent_searches: u32,
    /// Minimum days between searches of the same wanted item.
    #[serde(default = "default_min_days_between_searches")]
    pub min_days_between_searches: i64,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            max_strikes: default_max_strikes(),
            min_speed_kbs: default_min_speed_kbs(),
            max_concurrent_searches: default_max_concurrent_searches(),
            min_days_between_searches: default_min_days_between_searches(),
        }
    }
}

/// Per-job override. Deserializes from either a bare boolean (enable/disable with
/// defaults) or an object (enable plus explicit overrides).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobSetting {
    /// `jobName: true` / `jobName: false`.
    Enabled(bool),
    /// `jobName: { enabled: true, maxStrikes: 5, ... }`.
    #[serde(rename_all = "camelCase")]
    Detailed {
        /// Whether the job is enabled.
        enabled: bool,
        /// Override for `jobDefaults.maxStrikes`.
        max_strikes: Option<u32>,
        /// Override for `jobDefaults.minSpeedKBs` (only meaningful for `remove_slow`).
        min_speed_kbs: Option<f64>,
        /// Override for `jobDefaults.maxConcurrentSearches` (search jobs only).
        max_concurrent_searches: Option<u32>,
        /// Override for `jobDefaults.minDaysBetweenSearches` (search jobs only).
        min_days_between_searches: Option<i64>,
        /// Override for `jobDefaults.messagePatterns` (`remove_failed_imports` only).
        message_patterns: Option<Vec<String>>,
    },
}

/// A job's fully resolved configuration, after merging its [`JobSetting`] against
/// [`JobDefaults`]. Every field the scheduler needs is present and concrete.
#[derive(Clone, Debug)]
pub struct ResolvedJobConfig {
    /// Whether the job should run this cycle.
    pub enabled: bool,
    /// Consecutive offending cycles required before action, if the job uses strikes.
    pub max_strikes: Option<u32>,
    /// Minimum acceptable throughput in KB/s (`remove_slow` only).
    pub min_speed_kbs: f64,
    /// Maximum concurrent searches (search jobs only).
    pub max_concurrent_searches: u32,
    /// Minimum days between searches (search jobs only).
    pub min_days_between_searches: i64,
    /// Glob patterns matched against failed-import status messages.
    pub message_patterns: Vec<String>,
}

impl JobSetting {
    /// Merge this setting against the shared defaults, producing a concrete
    /// per-job configuration. Jobs that do not use strikes (e.g. `remove_orphans`)
    /// should ignore `max_strikes` in their own logic regardless of what this reports.
    pub fn resolve(&self, defaults: &JobDefaults, uses_strikes: bool) -> ResolvedJobConfig {
        match self {
            JobSetting::Enabled(enabled) => ResolvedJobConfig {
                enabled: *enabled,
                max_strikes: uses_strikes.then_some(defaults.max_strikes),
                min_speed_kbs: defaults.min_speed_kbs,
                max_concurrent_searches: defaults.max_concurrent_searches,
                min_days_between_searches: defaults.min_days_between_searches,
                message_patterns: default_message_patterns(),
            },
            JobSetting::Detailed {
                enabled,
                max_strikes,
                min_speed_kbs,
                max_concurrent_searches,
                min_days_between_searches,
                message_patterns,
            } => ResolvedJobConfig {
                enabled: *enabled,
                max_strikes: uses_strikes.then_some(max_strikes.unwrap_or(defaults.max_strikes)),
                min_speed_kbs: min_speed_kbs.unwrap_or(defaults.min_speed_kbs),
                max_concurrent_searches: max_concurrent_searches
                    .unwrap_or(defaults.max_concurrent_searches),
                min_days_between_searches: min_days_between_searches
                    .unwrap_or(defaults.min_days_between_searches),
                message_patterns: message_patterns
                    .clone()
                    .unwrap_or_else(default_message_patterns),
            },
        }
    }
}

/// One configured curator instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    /// Base URL of the curator's API.
    pub base_url: String,
    /// API key for the curator.
    pub api_key: String,
}

/// One configured download client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadClientConfig {
    /// Base URL of the download client's API.
    pub base_url: String,
    /// Name, must match exactly what curators report for their download client binding.
    pub name: String,
    /// Username, if the client requires authentication.
    #[serde(default)]
    pub username: Option<String>,
    /// Password, if the client requires authentication.
    #[serde(default)]
    pub password: Option<String>,
}

/// Top-level configuration tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// `general` section.
    pub general: GeneralConfig,
    /// `jobDefaults` section.
    #[serde(default)]
    pub job_defaults: JobDefaults,
    /// `jobs` section: per-job name to setting.
    #[serde(default)]
    pub jobs: HashMap<String, JobSetting>,
    /// `instances` section: per-curator-kind list of instances.
    pub instances: HashMap<CuratorKind, Vec<InstanceConfig>>,
    /// `downloadClients` section: per-client-kind list of clients.
    #[serde(default)]
    pub download_clients: HashMap<crate::domain::DownloadClientKind, Vec<DownloadClientConfig>>,
}

impl Config {
    /// Load configuration from a YAML file, then apply `QUEUE_WARDEN__SECTION__FIELD`
    /// environment variable overrides for scalar fields, matching the
    /// `<SECTION>__<FIELD>` convention named in the external interfaces.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut config: Config = serde_yaml::from_str(&contents).map_err(|e| Error::ConfigInvalid {
            message: format!("failed to parse {}: {e}", path.display()),
        })?;

        if let Ok(test_run) = std::env::var("QUEUE_WARDEN__GENERAL__TEST_RUN") {
            config.general.test_run = test_run.eq_ignore_ascii_case("true") || test_run == "1";
        }
        if let Ok(timer) = std::env::var("QUEUE_WARDEN__GENERAL__TIMER") {
            config.general.timer = timer.parse().map_err(|_| Error::ConfigInvalid {
                message: format!("QUEUE_WARDEN__GENERAL__TIMER must be an integer, got {timer:?}"),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Resolve a job's configuration by name, honoring whether it uses strikes at all.
    pub fn resolved_job(&self, name: &str, uses_strikes: bool) -> ResolvedJobConfig {
        match self.jobs.get(name) {
            Some(setting) => setting.resolve(&self.job_defaults, uses_strikes),
            None => ResolvedJobConfig {
                enabled: false,
                max_strikes: uses_strikes.then_some(self.job_defaults.max_strikes),
                min_speed_kbs: self.job_defaults.min_speed_kbs,
                max_concurrent_searches: self.job_defaults.max_concurrent_searches,
                min_days_between_searches: self.job_defaults.min_days_between_searches,
                message_patterns: default_message_patterns(),
            },
        }
    }

    /// Validate cross-field invariants that serde's field-level defaults cannot
    /// express: at least one curator instance, every download client referenced by
    /// name must exist, `timer` must be at least a minute.
    fn validate(&self) -> Result<()> {
        if self.instances.values().all(|v| v.is_empty()) {
            return Err(Error::ConfigInvalid {
                message: "no curator instances configured".into(),
            });
        }
        if self.general.timer == 0 {
            return Err(Error::ConfigInvalid {
                message: "general.timer must be at least 1 minute".into(),
            });
        }
        let mut seen_names = std::collections::HashSet::new();
        for clients in self.download_clients.values() {
            for client in clients {
                if !seen_names.insert(client.name.clone()) {
                    return Err(Error::ConfigInvalid {
                        message: format!("duplicate download client name {:?}", client.name),
                    });
                }
            }
        }
        Ok(())
    }
}
