//! Notification fan-out. Every delivery is attempted and settled; failures are counted.

use std::sync::Arc;

use futures::future::join_all;
use gatewatch_core::traits::NotificationChannel;
use gatewatch_core::types::{Delta, DeltaKind};
use serde::Serialize;

/// Settlement counts for one batch. `fulfilled + rejected` equals the batch size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub fulfilled: usize,
    pub rejected: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.fulfilled + self.rejected
    }
}

/// Sends delta batches through a [`NotificationChannel`].
#[derive(Clone)]
pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
}

impl NotificationDispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self { channel }
    }

    /// Launch every delivery concurrently and wait for all of them.
    pub async fn send(&self, deltas: &[Delta], kind: DeltaKind) -> DispatchSummary {
        if deltas.is_empty() {
            return DispatchSummary::default();
        }

        let results = join_all(deltas.iter().map(|delta| self.channel.notify(delta))).await;

        let summary = deltas
            .iter()
            .zip(results)
            .fold(DispatchSummary::default(), |mut acc, (delta, result)| {
                match result {
                    Ok(()) => acc.fulfilled += 1,
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ {kind} notification failed for chat {} ({}): {e}",
                            delta.chat_id,
                            delta.run
                        );
                        acc.rejected += 1;
                    }
                }
                acc
            });

        tracing::debug!(
            "📨 {kind} batch settled: {} ok, {} failed",
            summary.fulfilled,
            summary.rejected
        );
        summary
    }
}
