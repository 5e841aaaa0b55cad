//! # Gatewatch Core
//!
//! Shared vocabulary for the access watcher: the subscription / event / delta
//! model, the collaborator traits the reconciliation engine is written
//! against, the error type, and the configuration tree.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::GatewatchConfig;
pub use error::{GatewatchError, Result};
pub use traits::{AccessSource, NotificationChannel, TrackStore, UserDirectory};
pub use types::{
    AccessEvent, Delta, DeltaKind, DirectoryUser, TrackKind, TrackedSubscription,
};
