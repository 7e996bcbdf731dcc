//! Health monitor
//!
//! While the cluster is Running, a ticker evaluates layered checks and
//! reports a lost connection after a run of failed service probes:
//!
//! 1. Service reachability: probe the coordinator endpoint. Success ends
//!    the tick and resets the failure counter.
//! 2. Cluster liveness: ask the backend whether coordinator and workers run.
//! 3. Authentication: only when the cluster is not running.
//! 4. Internet reachability: only when authentication fails, debounced.
//!
//! Only check 1 drives the failure counter; checks 2-4 fill in the
//! diagnostics carried by the connection-lost event.

use crate::context::PersistedCluster;
use crate::factory::ProviderFactory;
use serde::Serialize;
use simfleet_cloud::{CloudProvider, ServiceProbe};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

/// Last known answers of checks 2-4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionDiagnostics {
    pub internet_available: bool,
    pub authenticated: bool,
    pub cluster_running: bool,
}

impl Default for ConnectionDiagnostics {
    fn default() -> Self {
        Self {
            internet_available: true,
            authenticated: true,
            cluster_running: true,
        }
    }
}

/// Smooths internet readings: the reported value only flips once `window`
/// consecutive readings agree on the new value.
#[derive(Debug, Clone)]
pub struct InternetDebounce {
    window: usize,
    readings: VecDeque<bool>,
    reported: bool,
}

impl InternetDebounce {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            readings: VecDeque::with_capacity(window),
            reported: true,
        }
    }

    /// Record a raw reading and return the reported value
    pub fn record(&mut self, reading: bool) -> bool {
        if self.readings.len() == self.window {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);

        if self.readings.len() == self.window && self.readings.iter().all(|r| *r == reading) {
            self.reported = reading;
        }
        self.reported
    }

    pub fn reported(&self) -> bool {
        self.reported
    }
}

/// Result of one health tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Healthy,
    Degraded { failures: u32 },
    ConnectionLost(ConnectionDiagnostics),
}

/// Counter and diagnostic state carried across ticks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    threshold: u32,
    failures: u32,
    diagnostics: ConnectionDiagnostics,
    internet: InternetDebounce,
}

impl HealthCheck {
    pub fn new(threshold: u32, internet_window: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: 0,
            diagnostics: ConnectionDiagnostics::default(),
            internet: InternetDebounce::new(internet_window),
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn diagnostics(&self) -> ConnectionDiagnostics {
        self.diagnostics
    }

    /// Run the layered checks once against `target`
    pub async fn tick(
        &mut self,
        target: Option<&PersistedCluster>,
        factory: &dyn ProviderFactory,
        probe: &dyn ServiceProbe,
    ) -> TickOutcome {
        let url = target.and_then(|cluster| cluster.session.server_url());

        if let Some(url) = url {
            if probe.service_available(url).await {
                if self.failures > 0 {
                    tracing::info!(url, "Coordinator service reachable again");
                }
                self.failures = 0;
                return TickOutcome::Healthy;
            }
            tracing::debug!(url, "Coordinator service probe failed");
        } else {
            tracing::debug!("No coordinator endpoint to probe");
        }

        if let Some(cluster) = target {
            match factory.build(&cluster.settings, Some(&cluster.session)) {
                Ok(provider) => self.diagnose(provider.as_ref()).await,
                Err(e) => {
                    tracing::error!(error = %e, "Cannot build provider for health check");
                    self.diagnostics.cluster_running = false;
                }
            }
        } else {
            self.diagnostics.cluster_running = false;
        }

        self.failures += 1;
        if self.failures >= self.threshold {
            self.failures = 0;
            tracing::warn!(diagnostics = ?self.diagnostics, "Connection to cluster lost");
            return TickOutcome::ConnectionLost(self.diagnostics);
        }

        tracing::warn!(
            failures = self.failures,
            threshold = self.threshold,
            "Cluster health degraded"
        );
        TickOutcome::Degraded {
            failures: self.failures,
        }
    }

    async fn diagnose(&mut self, provider: &dyn CloudProvider) {
        let running = match provider.cluster_running().await {
            Ok(running) => running,
            Err(e) => {
                tracing::debug!(error = %e, "Liveness query failed");
                false
            }
        };
        self.diagnostics.cluster_running = running;
        if running {
            return;
        }

        let authenticated = match provider.check_auth().await {
            Ok(status) => status.authenticated,
            Err(e) => {
                tracing::debug!(error = %e, "Authentication check failed");
                false
            }
        };
        self.diagnostics.authenticated = authenticated;
        if authenticated {
            return;
        }

        let reading = provider.internet_available().await;
        self.diagnostics.internet_available = self.internet.record(reading);
    }
}

/// Handle to a running health monitor task. Dropping it stops the task.
#[derive(Debug)]
pub struct HealthMonitor {
    stop: Option<oneshot::Sender<()>>,
}

impl HealthMonitor {
    /// Spawn the ticker. The first check runs one `period` after spawning.
    /// `on_lost` runs at most once, after which the task exits.
    ///
    /// `target` is the settings/session pair the orchestrator loaded when
    /// monitoring started. Ticks check that snapshot and never re-read the
    /// project context; the orchestrator restarts the monitor whenever the
    /// pair changes.
    pub fn spawn<F>(
        mut check: HealthCheck,
        target: Option<PersistedCluster>,
        factory: Arc<dyn ProviderFactory>,
        probe: Arc<dyn ServiceProbe>,
        period: Duration,
        on_lost: F,
    ) -> Self
    where
        F: FnOnce(ConnectionDiagnostics) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut on_lost = Some(on_lost);

            tracing::debug!(period_secs = period.as_secs(), "Health monitor started");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let outcome = check
                            .tick(target.as_ref(), factory.as_ref(), probe.as_ref())
                            .await;
                        if let TickOutcome::ConnectionLost(diagnostics) = outcome {
                            if let Some(on_lost) = on_lost.take() {
                                on_lost(diagnostics);
                            }
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Health monitor stopped");
        });

        Self {
            stop: Some(stop_tx),
        }
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCloud;
    use simfleet_cloud::{CloudKind, CloudSettings, VagrantSettings};

    fn target(cloud: &ScriptedCloud) -> PersistedCluster {
        PersistedCluster {
            settings: CloudSettings::LocalVirtualized(VagrantSettings::default()),
            session: cloud.session_for(CloudKind::LocalVirtualized),
        }
    }

    #[test]
    fn test_debounce_ignores_single_blip() {
        let mut debounce = InternetDebounce::new(3);
        for reading in [false, false, false] {
            debounce.record(reading);
        }
        assert!(!debounce.reported());

        for reading in [true, false, true] {
            debounce.record(reading);
        }
        assert!(!debounce.reported());

        let mut debounce = InternetDebounce::new(3);
        for reading in [false, true, false] {
            debounce.record(reading);
        }
        assert!(debounce.reported());
    }

    #[test]
    fn test_debounce_flips_on_three_agreeing_readings() {
        let mut debounce = InternetDebounce::new(3);
        assert!(debounce.record(false));
        assert!(debounce.record(false));
        assert!(!debounce.record(false));

        assert!(!debounce.record(true));
        assert!(!debounce.record(true));
        assert!(debounce.record(true));
    }

    #[tokio::test]
    async fn test_three_failures_emit_once() {
        let cloud = ScriptedCloud::new();
        cloud.script().service_available = false;
        let target = target(&cloud);
        let mut check = HealthCheck::new(3, 3);
        let factory = cloud.factory();
        let probe = cloud.probe();

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            outcomes.push(
                check
                    .tick(Some(&target), factory.as_ref(), probe.as_ref())
                    .await,
            );
        }

        assert_eq!(outcomes[0], TickOutcome::Degraded { failures: 1 });
        assert_eq!(outcomes[1], TickOutcome::Degraded { failures: 2 });
        assert!(matches!(outcomes[2], TickOutcome::ConnectionLost(_)));
        assert_eq!(check.failures(), 0);
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let cloud = ScriptedCloud::new();
        let target = target(&cloud);
        let mut check = HealthCheck::new(3, 3);
        let factory = cloud.factory();
        let probe = cloud.probe();

        cloud.script().service_available = false;
        for _ in 0..2 {
            check
                .tick(Some(&target), factory.as_ref(), probe.as_ref())
                .await;
        }
        assert_eq!(check.failures(), 2);

        cloud.script().service_available = true;
        let outcome = check
            .tick(Some(&target), factory.as_ref(), probe.as_ref())
            .await;
        assert_eq!(outcome, TickOutcome::Healthy);
        assert_eq!(check.failures(), 0);
    }

    #[tokio::test]
    async fn test_healthy_probe_skips_backend_queries() {
        let cloud = ScriptedCloud::new();
        let target = target(&cloud);
        let mut check = HealthCheck::new(3, 3);

        check
            .tick(Some(&target), cloud.factory().as_ref(), cloud.probe().as_ref())
            .await;
        assert_eq!(cloud.builds(), 0);
    }

    #[tokio::test]
    async fn test_diagnostics_layering() {
        let cloud = ScriptedCloud::new();
        let target = target(&cloud);
        let mut check = HealthCheck::new(10, 3);
        let factory = cloud.factory();
        let probe = cloud.probe();

        {
            let mut script = cloud.script();
            script.service_available = false;
            script.workers_running = false;
            script.authenticated = false;
            script.internet = false;
        }

        for _ in 0..2 {
            check
                .tick(Some(&target), factory.as_ref(), probe.as_ref())
                .await;
        }
        let diagnostics = check.diagnostics();
        assert!(!diagnostics.cluster_running);
        assert!(!diagnostics.authenticated);
        assert!(diagnostics.internet_available);

        check
            .tick(Some(&target), factory.as_ref(), probe.as_ref())
            .await;
        assert!(!check.diagnostics().internet_available);
    }

    #[tokio::test]
    async fn test_running_cluster_leaves_auth_and_internet_alone() {
        let cloud = ScriptedCloud::new();
        let target = target(&cloud);
        let mut check = HealthCheck::new(3, 3);

        {
            let mut script = cloud.script();
            script.service_available = false;
            script.authenticated = false;
        }

        check
            .tick(Some(&target), cloud.factory().as_ref(), cloud.probe().as_ref())
            .await;
        assert_eq!(check.diagnostics(), ConnectionDiagnostics::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_reports_after_three_periods() {
        let cloud = ScriptedCloud::new();
        cloud.script().service_available = false;
        let (tx, rx) = oneshot::channel();

        let started = Instant::now();
        let _monitor = HealthMonitor::spawn(
            HealthCheck::new(3, 3),
            Some(target(&cloud)),
            cloud.factory(),
            cloud.probe(),
            Duration::from_secs(5),
            move |diagnostics| {
                let _ = tx.send(diagnostics);
            },
        );

        rx.await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert_eq!(cloud.probe_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_monitor_never_reports() {
        let cloud = ScriptedCloud::new();
        cloud.script().service_available = false;
        let (tx, mut rx) = oneshot::channel();

        let mut monitor = HealthMonitor::spawn(
            HealthCheck::new(3, 3),
            Some(target(&cloud)),
            cloud.factory(),
            cloud.probe(),
            Duration::from_secs(5),
            move |diagnostics| {
                let _ = tx.send(diagnostics);
            },
        );

        tokio::time::sleep(Duration::from_secs(11)).await;
        monitor.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(cloud.probe_count(), 2);
    }
}
