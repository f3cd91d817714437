//! Cluster registry readiness watchdog
//!
//! The registry API may be installed after this process starts. Rather than
//! re-registering capabilities at runtime, the process checks the registry
//! once at startup and, if it is missing, polls until it shows up and then
//! hands control to an `on_ready` callback. The composition root decides
//! what readiness means for the process; the daemon exits so its supervisor
//! restarts it with the registry available.

use clusterplace_core::{ClusterPlaceError, ClusterPlaceResult, Selector, WatchdogConfig};
use clusterplace_registry::ClusterRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Default interval between readiness checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How a polling task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The registry became ready and `on_ready` was invoked
    Ready,
    /// Shutdown was signalled before the registry became ready
    Cancelled,
}

/// Check the registry with an unfiltered list.
///
/// Any successful list, even an empty one, means ready. Every error counts
/// as not ready.
pub async fn is_registry_ready(registry: &dyn ClusterRegistry) -> bool {
    match registry.list(&Selector::everything()).await {
        Ok(clusters) => {
            info!(
                registry = registry.name(),
                clusters = clusters.len(),
                "Cluster registry ready"
            );
            true
        }
        Err(e) => {
            warn!(registry = registry.name(), error = %e, "Cluster registry not ready");
            false
        }
    }
}

/// Polls the cluster registry until it becomes ready
pub struct RegistryWatchdog {
    registry: Arc<dyn ClusterRegistry>,
    interval: Duration,
}

impl RegistryWatchdog {
    /// Create a watchdog checking every `interval`; a zero interval is rejected
    pub fn new(registry: Arc<dyn ClusterRegistry>, interval: Duration) -> ClusterPlaceResult<Self> {
        if interval.is_zero() {
            return Err(ClusterPlaceError::Config(
                "registry watchdog poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self { registry, interval })
    }

    /// Create a watchdog from configuration
    pub fn from_config(
        registry: Arc<dyn ClusterRegistry>,
        config: &WatchdogConfig,
    ) -> ClusterPlaceResult<Self> {
        config.validate()?;
        Self::new(registry, config.poll_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check once, and start polling only if the registry is not ready yet.
    ///
    /// Returns `None` when the registry is already ready; no task is spawned
    /// and `on_ready` is never called. Otherwise returns the handle of the
    /// polling task, which calls `on_ready` once on the first successful
    /// check.
    pub async fn start<F>(
        self,
        shutdown: watch::Receiver<bool>,
        on_ready: F,
    ) -> Option<JoinHandle<WatchOutcome>>
    where
        F: FnOnce() + Send + 'static,
    {
        if is_registry_ready(self.registry.as_ref()).await {
            return None;
        }

        Some(tokio::spawn(async move { self.run(shutdown, on_ready).await }))
    }

    /// Poll until the registry is ready or shutdown is signalled.
    ///
    /// The first check here runs one full interval after the startup check,
    /// not immediately. A shutdown signalled while a check is in flight wins
    /// over that check succeeding.
    #[instrument(skip_all, fields(interval_secs = self.interval.as_secs()))]
    pub async fn run<F>(&self, mut shutdown: watch::Receiver<bool>, on_ready: F) -> WatchOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        info!("Watching for cluster registry");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the startup check already ran
        interval.tick().await;

        loop {
            if *shutdown.borrow_and_update() {
                debug!("Registry watchdog shutting down");
                return WatchOutcome::Cancelled;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    // A dropped sender means the owner is gone
                    if changed.is_err() {
                        debug!("Shutdown sender dropped, registry watchdog exiting");
                        return WatchOutcome::Cancelled;
                    }
                }
                _ = interval.tick() => {
                    if is_registry_ready(self.registry.as_ref()).await {
                        if *shutdown.borrow() {
                            debug!("Cluster registry ready after shutdown, not signalling");
                            return WatchOutcome::Cancelled;
                        }
                        info!("Cluster registry became ready");
                        on_ready();
                        return WatchOutcome::Ready;
                    }
                }
            }
        }
    }
}

/// Check the registry at startup and watch for it if it is missing.
///
/// See [`RegistryWatchdog::start`].
pub async fn detect_cluster_registry<F>(
    registry: Arc<dyn ClusterRegistry>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
    on_ready: F,
) -> ClusterPlaceResult<Option<JoinHandle<WatchOutcome>>>
where
    F: FnOnce() + Send + 'static,
{
    Ok(RegistryWatchdog::new(registry, interval)?
        .start(shutdown, on_ready)
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clusterplace_core::{Cluster, ClusterPlaceError, ClusterPlaceResult};
    use clusterplace_registry::InMemoryRegistry;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::{oneshot, Notify};

    /// Registry that fails the first `failures` lists, then succeeds
    struct FlakyRegistry {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyRegistry {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClusterRegistry for FlakyRegistry {
        async fn list(&self, _selector: &Selector) -> ClusterPlaceResult<Vec<Cluster>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(ClusterPlaceError::Network("connection refused".to_string()))
            } else {
                Ok(Vec::new())
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_is_registry_ready() {
        let registry = InMemoryRegistry::new();
        assert!(is_registry_ready(&registry).await);

        registry.set_available(false);
        assert!(!is_registry_ready(&registry).await);
    }

    #[tokio::test]
    async fn test_not_found_is_not_ready() {
        struct Missing;

        #[async_trait]
        impl ClusterRegistry for Missing {
            async fn list(&self, _selector: &Selector) -> ClusterPlaceResult<Vec<Cluster>> {
                Err(ClusterPlaceError::NotFound("clusters".to_string()))
            }

            fn name(&self) -> &'static str {
                "missing"
            }
        }

        assert!(!is_registry_ready(&Missing).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_third_check() {
        let registry = Arc::new(FlakyRegistry::new(2));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (ready_tx, mut ready_rx) = oneshot::channel();

        let counter = registry.clone();
        let handle = detect_cluster_registry(registry.clone(), DEFAULT_POLL_INTERVAL, shutdown_rx, move || {
            let _ = ready_tx.send(counter.calls());
        })
        .await
        .unwrap()
        .expect("polling task should start");

        assert_eq!(registry.calls(), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(registry.calls(), 2);
        assert!(ready_rx.try_recv().is_err());

        assert_eq!(handle.await.unwrap(), WatchOutcome::Ready);
        assert_eq!(ready_rx.await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediately_ready_starts_no_task() {
        let registry = Arc::new(FlakyRegistry::new(0));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        let handle = detect_cluster_registry(registry.clone(), DEFAULT_POLL_INTERVAL, shutdown_rx, move || {
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert!(handle.is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_ready() {
        // would succeed on the first polled check
        let registry = Arc::new(FlakyRegistry::new(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        let handle = detect_cluster_registry(registry.clone(), DEFAULT_POLL_INTERVAL, shutdown_rx, move || {
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap()
        .expect("polling task should start");

        shutdown_tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), WatchOutcome::Cancelled);
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(registry.calls(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_cancels() {
        let registry = Arc::new(FlakyRegistry::new(u32::MAX));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = detect_cluster_registry(registry, DEFAULT_POLL_INTERVAL, shutdown_rx, || {})
            .await
            .unwrap()
            .expect("polling task should start");

        drop(shutdown_tx);
        assert_eq!(handle.await.unwrap(), WatchOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_installed_later() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.set_available(false);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = oneshot::channel();

        let watchdog = RegistryWatchdog::from_config(
            registry.clone(),
            &WatchdogConfig {
                enabled: true,
                poll_interval_secs: 30,
            },
        )
        .unwrap();
        assert_eq!(watchdog.interval(), Duration::from_secs(30));

        let handle = watchdog
            .start(shutdown_rx, move || {
                let _ = ready_tx.send(());
            })
            .await
            .expect("polling task should start");

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert!(!handle.is_finished());

        registry.set_available(true);
        assert_eq!(handle.await.unwrap(), WatchOutcome::Ready);
        assert!(ready_rx.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_rejected() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.set_available(false);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = detect_cluster_registry(registry.clone(), Duration::ZERO, shutdown_rx, || {}).await;
        assert!(matches!(result, Err(ClusterPlaceError::Config(_))));

        let result = RegistryWatchdog::from_config(
            registry,
            &WatchdogConfig {
                enabled: true,
                poll_interval_secs: 0,
            },
        );
        assert!(matches!(result, Err(ClusterPlaceError::Config(_))));
    }

    /// Registry that fails once, then holds every later list until released
    struct GatedRegistry {
        calls: AtomicU32,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ClusterRegistry for GatedRegistry {
        async fn list(&self, _selector: &Selector) -> ClusterPlaceResult<Vec<Cluster>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ClusterPlaceError::Network("connection refused".to_string()));
            }
            self.started.notify_one();
            self.release.notified().await;
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_in_flight_check_skips_on_ready() {
        let registry = Arc::new(GatedRegistry {
            calls: AtomicU32::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        let handle = detect_cluster_registry(registry.clone(), DEFAULT_POLL_INTERVAL, shutdown_rx, move || {
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap()
        .expect("polling task should start");

        registry.started.notified().await;
        shutdown_tx.send(true).unwrap();
        registry.release.notify_one();

        assert_eq!(handle.await.unwrap(), WatchOutcome::Cancelled);
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 2);
    }
}
