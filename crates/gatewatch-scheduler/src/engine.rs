//! Poll loop — sleep until the next tick is allowed, tick, repeat.
//! One task, so ticks never overlap; an overrunning tick just shortens the
//! next sleep to zero.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use gatewatch_core::config::PollConfig;
use gatewatch_core::error::Result;
use gatewatch_core::traits::AccessSource;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::reconcile::{AccessReconciler, ReconcileOutcome};
use crate::window::{QuietWindow, pacing_delay, parse_offset, seconds_until_active};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Sleeping,
    Ticking,
}

/// What a finished poll loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: usize,
    /// Quiet windows entered (each logged once).
    pub pauses: usize,
}

/// Drives [`AccessReconciler`] from an [`AccessSource`] on a fixed cadence,
/// outside a daily quiet window.
pub struct PollScheduler {
    source: Arc<dyn AccessSource>,
    reconciler: Arc<AccessReconciler>,
    window: QuietWindow,
    offset: FixedOffset,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(
        source: Arc<dyn AccessSource>,
        reconciler: Arc<AccessReconciler>,
        window: QuietWindow,
        offset: FixedOffset,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            reconciler,
            window,
            offset,
            interval,
        }
    }

    /// Build from the `[poll]` config section. Fails on a bad offset or time.
    pub fn from_config(
        source: Arc<dyn AccessSource>,
        reconciler: Arc<AccessReconciler>,
        config: &PollConfig,
    ) -> Result<Self> {
        let window = QuietWindow::parse(&config.quiet_start, &config.quiet_end)?;
        let offset = parse_offset(&config.time_zone)?;
        Ok(Self::new(
            source,
            reconciler,
            window,
            offset,
            Duration::from_secs(config.interval_secs),
        ))
    }

    /// One fetch + reconcile. An empty batch skips reconciliation.
    pub async fn tick(&self) -> Result<ReconcileOutcome> {
        let events = self.source.fetch_recent().await?;
        if events.is_empty() {
            tracing::debug!("📭 No recent access events");
            return Ok(ReconcileOutcome::default());
        }
        self.reconciler.reconcile(&events).await
    }

    /// Delay before the next tick: the larger of the quiet-window remainder
    /// and what is left of the interval since `last_start`.
    fn next_delay(&self, quiet_secs: u64, last_start: Option<Instant>) -> Duration {
        let pacing = last_start
            .map(|start| pacing_delay(start.elapsed(), self.interval))
            .unwrap_or(Duration::ZERO);
        pacing.max(Duration::from_secs(quiet_secs))
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    /// Shutdown is only observed between ticks; a running tick always finishes.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> LoopStats {
        self.run_with_clock(shutdown, Utc::now).await
    }

    /// [`PollScheduler::run`] with the wall clock supplied by `clock`.
    /// The quiet window and pacing are re-evaluated after every sleep.
    pub async fn run_with_clock<C>(
        &self,
        mut shutdown: watch::Receiver<bool>,
        clock: C,
    ) -> LoopStats
    where
        C: Fn() -> DateTime<Utc>,
    {
        tracing::info!(
            "⏰ Poll loop started (every {}s, quiet {}–{} at UTC{})",
            self.interval.as_secs(),
            self.window.start.format("%H:%M"),
            self.window.end.format("%H:%M"),
            self.offset
        );

        let mut stats = LoopStats::default();
        let mut phase = Phase::Sleeping;
        let mut last_start: Option<Instant> = None;
        let mut paused = false;

        loop {
            match phase {
                Phase::Sleeping => {
                    if *shutdown.borrow() {
                        break;
                    }

                    let quiet = seconds_until_active(clock(), self.offset, &self.window);
                    if quiet > 0 && !paused {
                        tracing::info!("😴 paused for {:.2} hours", quiet as f64 / 3600.0);
                        stats.pauses += 1;
                    }
                    paused = quiet > 0;

                    let delay = self.next_delay(quiet, last_start);
                    if delay.is_zero() {
                        phase = Phase::Ticking;
                        continue;
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Phase::Ticking => {
                    last_start = Some(Instant::now());
                    stats.ticks += 1;
                    if let Err(e) = self.tick().await {
                        tracing::error!("❌ Tick failed: {e}");
                    }
                    phase = Phase::Sleeping;
                }
            }
        }

        tracing::info!("🛑 Poll loop stopped after {} ticks", stats.ticks);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::NotificationDispatcher;
    use async_trait::async_trait;
    use gatewatch_core::error::GatewatchError;
    use gatewatch_core::traits::NotificationChannel;
    use gatewatch_core::types::{AccessEvent, Delta};
    use gatewatch_db::SqliteTrackStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        events: Vec<AccessEvent>,
        fail: bool,
    }

    impl CountingSource {
        fn new(events: Vec<AccessEvent>) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), events, fail: false })
        }
    }

    #[async_trait]
    impl AccessSource for CountingSource {
        async fn fetch_recent(&self) -> Result<Vec<AccessEvent>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GatewatchError::access("connection refused"));
            }
            Ok(self.events.clone())
        }
    }

    #[derive(Default)]
    struct CountingChannel {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        async fn notify(&self, _delta: &Delta) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_message(&self, _chat_id: &str, _message: &str) -> Result<()> {
            Ok(())
        }
    }

    fn reconciler(channel: Arc<CountingChannel>) -> Arc<AccessReconciler> {
        let store = Arc::new(SqliteTrackStore::in_memory().unwrap());
        Arc::new(AccessReconciler::new(store, NotificationDispatcher::new(channel)))
    }

    fn scheduler(source: Arc<dyn AccessSource>, window: QuietWindow) -> PollScheduler {
        PollScheduler::new(
            source,
            reconciler(Arc::new(CountingChannel::default())),
            window,
            parse_offset("UTC").unwrap(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_from_config() {
        let source = CountingSource::new(vec![]);
        let sched = PollScheduler::from_config(
            source.clone(),
            reconciler(Arc::new(CountingChannel::default())),
            &PollConfig::default(),
        )
        .unwrap();
        assert_eq!(sched.interval, Duration::from_secs(5));
        assert_eq!(sched.offset.local_minus_utc(), -3 * 3600);

        let bad = PollConfig {
            time_zone: "Mars/Olympus".into(),
            ..PollConfig::default()
        };
        assert!(
            PollScheduler::from_config(
                source,
                reconciler(Arc::new(CountingChannel::default())),
                &bad
            )
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_empty_fetch_skips_reconcile() {
        let source = CountingSource::new(vec![]);
        let sched = scheduler(source.clone(), QuietWindow::disabled());
        let outcome = sched.tick().await.unwrap();
        assert!(outcome.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tick_propagates_fetch_error() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            events: vec![],
            fail: true,
        });
        let sched = scheduler(source, QuietWindow::disabled());
        assert!(sched.tick().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_delay_prefers_larger_wait() {
        let sched = scheduler(CountingSource::new(vec![]), QuietWindow::disabled());
        assert_eq!(sched.next_delay(0, None), Duration::ZERO);

        let start = Instant::now();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(sched.next_delay(0, Some(start)), Duration::from_secs(3));
        assert_eq!(sched.next_delay(60, Some(start)), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(sched.next_delay(0, Some(start)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_paces_ticks_and_stops_on_shutdown() {
        let source = CountingSource::new(vec![]);
        let sched = Arc::new(scheduler(source.clone(), QuietWindow::disabled()));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.run(rx).await })
        };

        // ticks at t = 0, 5, 10
        tokio::time::sleep(Duration::from_secs(12)).await;
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats, LoopStats { ticks: 3, pauses: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_going_after_failed_tick() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            events: vec![],
            fail: true,
        });
        let sched = Arc::new(scheduler(source.clone(), QuietWindow::disabled()));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.run(rx).await })
        };

        tokio::time::sleep(Duration::from_secs(7)).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sleeps_through_quiet_window() {
        let source = CountingSource::new(vec![]);
        let window = QuietWindow::parse("23:00", "05:30").unwrap();
        let sched = Arc::new(scheduler(source.clone(), window));
        let (tx, rx) = watch::channel(false);

        // wall clock follows the paused tokio clock, starting 2s before the window
        let base = "2024-01-02T22:59:58Z".parse::<DateTime<Utc>>().unwrap();
        let origin = Instant::now();
        let clock = move || base + chrono::Duration::from_std(origin.elapsed()).unwrap();

        let handle = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.run_with_clock(rx, clock).await })
        };

        // t=0 ticks; t=5 is 23:00:03, inside the window
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // a spurious wake-up mid-window neither ticks nor logs a second pause
        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // 05:30:00 is t=23402
        tokio::time::sleep(Duration::from_secs(23403 - 7200)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        let stats = handle.await.unwrap();
        assert_eq!(stats, LoopStats { ticks: 2, pauses: 1 });
    }
}
