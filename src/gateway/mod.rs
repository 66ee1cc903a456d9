//! Capability façades over curator and download-client backends.
//!
//! The core never speaks a vendor's wire format directly; it calls the methods named
//! in the capability contracts below, implemented once here against a generic
//! HTTP+JSON backend. Test-run interception of mutating calls is enforced centrally in
//! [`HttpCuratorGateway`] and [`HttpDownloadClientGateway`] so every removal job
//! benefits without opting in.

pub mod curator;
pub mod download_client;

pub use curator::{CuratorGateway, CuratorProbe, HttpCuratorGateway};
pub use download_client::{DownloadClientGateway, HttpDownloadClientGateway};

use std::time::Duration;

/// HTTP timeout applied to every backend call, per the concurrency model's bounded
/// suspension-point contract.
pub const BACKEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the shared `reqwest` client used by both gateway implementations, honoring
/// the configured TLS verification policy.
pub fn build_http_client(ssl_verification: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(BACKEND_TIMEOUT)
        .danger_accept_invalid_certs(!ssl_verification)
        .build()
}
