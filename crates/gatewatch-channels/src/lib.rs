//! # Gatewatch Channels
//! HTTP clients for the services Gatewatch talks to.
//!
//! - [`access::HttpAccessSource`]: recently changed access records
//! - [`whatsapp::WhatsAppNotifier`]: entry/exit alerts and plain messages
//! - [`directory::HttpUserDirectory`]: person lookup by run

pub mod access;
pub mod directory;
pub mod whatsapp;

pub use access::HttpAccessSource;
pub use directory::HttpUserDirectory;
pub use whatsapp::WhatsAppNotifier;

use std::time::Duration;

use gatewatch_core::error::{GatewatchError, Result};

/// Build a client with the collaborator's request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| GatewatchError::Http(format!("client build failed: {e}")))
}

/// `base` + `path`, tolerating a trailing slash on the base.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
