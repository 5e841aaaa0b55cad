//! Collaborator traits — the seams between the reconciliation engine and the
//! outside world. Concrete adapters live in `gatewatch-db` and
//! `gatewatch-channels`; tests substitute in-memory doubles.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AccessEvent, Delta, DirectoryUser, TrackKind, TrackedSubscription};

/// Persisted subscriptions and their last-notified timestamps.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Every subscription of the given kind.
    async fn list_by_kind(&self, kind: TrackKind) -> Result<Vec<TrackedSubscription>>;

    /// Subscriptions owned by one chat.
    async fn list_by_chat(&self, chat_id: i64, kind: TrackKind) -> Result<Vec<TrackedSubscription>>;

    /// Set `last_entry_at` for every row whose subject id is a key of
    /// `updates`, in a single statement. Empty map is a no-op.
    async fn bulk_update_entry(
        &self,
        updates: &BTreeMap<String, String>,
        kind: TrackKind,
    ) -> Result<()>;

    /// Exit counterpart of [`TrackStore::bulk_update_entry`].
    async fn bulk_update_exit(
        &self,
        updates: &BTreeMap<String, String>,
        kind: TrackKind,
    ) -> Result<()>;

    /// Insert unless `(chat_id, run, kind)` already exists. Returns whether a
    /// row was written.
    async fn create(&self, sub: &TrackedSubscription) -> Result<bool>;

    /// Delete by run, compared case-insensitively. Returns rows removed.
    async fn remove_by_run(&self, chat_id: i64, run: &str, kind: TrackKind) -> Result<usize>;
}

/// Access-control API.
#[async_trait]
pub trait AccessSource: Send + Sync {
    /// Latest batch of recently changed access records.
    async fn fetch_recent(&self) -> Result<Vec<AccessEvent>>;
}

/// Outbound chat notifications.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver one entry/exit alert. The template is chosen by `delta.kind`.
    async fn notify(&self, delta: &Delta) -> Result<()>;

    /// Deliver a plain text message to a chat.
    async fn send_message(&self, chat_id: &str, message: &str) -> Result<()>;
}

/// Person lookup by run.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_run(&self, run: &str) -> Result<Option<DirectoryUser>>;
}
