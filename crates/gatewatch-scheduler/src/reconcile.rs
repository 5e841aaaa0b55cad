//! Access reconciliation — diff a batch of access events against the stored
//! subscriptions, advance the stored timestamps, alert the subscribers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use gatewatch_core::error::Result;
use gatewatch_core::traits::TrackStore;
use gatewatch_core::types::{AccessEvent, Delta, DeltaKind, TrackKind, TrackedSubscription};
use serde::Serialize;

use crate::dispatch::NotificationDispatcher;

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub entry_notified: usize,
    pub entry_succeeded: usize,
    pub entry_failed: usize,
    pub exit_notified: usize,
    pub exit_succeeded: usize,
    pub exit_failed: usize,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.entry_notified == 0 && self.exit_notified == 0
    }
}

/// What a batch changes: deltas to send and the store writes that record them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeltaSet {
    pub entries: Vec<Delta>,
    pub exits: Vec<Delta>,
    /// subject id → entry timestamp to persist
    pub entry_updates: BTreeMap<String, String>,
    /// subject id → exit timestamp to persist
    pub exit_updates: BTreeMap<String, String>,
}

impl DeltaSet {
    /// Pair each subscription with the first event, in batch order, that
    /// differs from what the subscriber last saw. Entry and exit are judged
    /// independently, so one subscription may appear in both lists.
    pub fn compute(subs: &[TrackedSubscription], events: &[AccessEvent]) -> Self {
        let mut by_subject: HashMap<&str, Vec<&AccessEvent>> = HashMap::new();
        for event in events {
            by_subject.entry(event.subject_id.as_str()).or_default().push(event);
        }

        let mut set = Self::default();
        for sub in subs {
            let Some(candidates) = by_subject.get(sub.subject_id.as_str()) else {
                continue;
            };

            let entry = candidates
                .iter()
                .copied()
                .find(|e| sub.last_entry_at.as_deref() != Some(e.entry_at.as_str()));
            if let Some(event) = entry {
                set.entry_updates
                    .entry(sub.subject_id.clone())
                    .or_insert_with(|| event.entry_at.clone());
                set.entries.push(Delta::new(sub, event, DeltaKind::Entry));
            }

            let exit = candidates.iter().copied().find_map(|e| {
                let at = e.exit_at.as_deref()?;
                (sub.last_exit_at.as_deref() != Some(at)).then_some((e, at))
            });
            if let Some((event, at)) = exit {
                set.exit_updates
                    .entry(sub.subject_id.clone())
                    .or_insert_with(|| at.to_string());
                set.exits.push(Delta::new(sub, event, DeltaKind::Exit));
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.exits.is_empty()
    }
}

/// Runs one reconciliation pass against a [`TrackStore`].
pub struct AccessReconciler {
    store: Arc<dyn TrackStore>,
    dispatcher: NotificationDispatcher,
    kind: TrackKind,
}

impl AccessReconciler {
    pub fn new(store: Arc<dyn TrackStore>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            store,
            dispatcher,
            kind: TrackKind::Track,
        }
    }

    /// Diff, persist, then notify.
    ///
    /// The stored timestamps advance before delivery is attempted, so a failed
    /// delivery is counted but never re-sent on a later tick. A store failure
    /// aborts before anything is sent.
    pub async fn reconcile(&self, events: &[AccessEvent]) -> Result<ReconcileOutcome> {
        if events.is_empty() {
            return Ok(ReconcileOutcome::default());
        }

        let subs = self.store.list_by_kind(self.kind).await?;
        let set = DeltaSet::compute(&subs, events);

        if set.is_empty() {
            tracing::debug!(
                "🔍 {} events against {} subscriptions: nothing new",
                events.len(),
                subs.len()
            );
            return Ok(ReconcileOutcome::default());
        }

        // Both bulk writes are no-ops on an empty map.
        self.store.bulk_update_entry(&set.entry_updates, self.kind).await?;
        self.store.bulk_update_exit(&set.exit_updates, self.kind).await?;

        let entry = self.dispatcher.send(&set.entries, DeltaKind::Entry).await;
        let exit = self.dispatcher.send(&set.exits, DeltaKind::Exit).await;

        let outcome = ReconcileOutcome {
            entry_notified: set.entries.len(),
            entry_succeeded: entry.fulfilled,
            entry_failed: entry.rejected,
            exit_notified: set.exits.len(),
            exit_succeeded: exit.fulfilled,
            exit_failed: exit.rejected,
        };

        tracing::info!(
            "🔔 Reconciled: entry {}/{} ok ({} failed), exit {}/{} ok ({} failed)",
            outcome.entry_succeeded,
            outcome.entry_notified,
            outcome.entry_failed,
            outcome.exit_succeeded,
            outcome.exit_notified,
            outcome.exit_failed
        );
        Ok(outcome)
    }
}
