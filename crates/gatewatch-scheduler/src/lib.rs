//! # Gatewatch Scheduler
//!
//! The reconciliation core and the loop that drives it.
//!
//! ```text
//! PollScheduler (sleep → tick → sleep, never overlapping)
//!   └── tick: AccessSource::fetch_recent()
//!         └── AccessReconciler::reconcile(events)
//!               ├── TrackStore::bulk_update_entry / bulk_update_exit
//!               └── NotificationDispatcher::send (entry batch, then exit batch)
//! ```

pub mod dispatch;
pub mod engine;
pub mod reconcile;
pub mod window;

pub use dispatch::{DispatchSummary, NotificationDispatcher};
pub use engine::{LoopStats, PollScheduler};
pub use reconcile::{AccessReconciler, DeltaSet, ReconcileOutcome};
pub use window::{QuietWindow, pacing_delay, parse_offset, seconds_until_active};
