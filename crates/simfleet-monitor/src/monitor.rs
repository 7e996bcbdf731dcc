//! Lifecycle orchestrator
//!
//! `CloudMonitor` owns the cluster status. It runs as a single task that
//! receives commands from `CloudMonitorHandle`s, completion reports from
//! workers, and connection-lost reports from the health monitor, and
//! applies them one at a time. Only this task touches the project context.

use crate::context::{PersistedCluster, ProjectContext};
use crate::factory::ProviderFactory;
use crate::health::{ConnectionDiagnostics, HealthCheck, HealthMonitor};
use crate::status::CloudStatus;
use crate::workers::{self, StartedCluster, WarmUp, WorkerKind, WorkerReport};
use async_trait::async_trait;
use simfleet_cloud::{HttpServiceProbe, ServiceProbe};
use simfleet_config::MonitorSettings;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

const EVENT_CAPACITY: usize = 64;

/// Notification published by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudEvent {
    /// Emitted once per actual status transition
    StatusChanged(CloudStatus),
    /// The health monitor gave up on the running cluster
    ConnectionLost(ConnectionDiagnostics),
    /// A recovery teardown finished
    Recovered,
}

/// Asked whether the session should be cleared after a lost connection.
///
/// Recovery always clears the session; the answer is only logged.
#[async_trait]
pub trait ConnectionLostHandler: Send + Sync {
    async fn clear_session(&self, diagnostics: ConnectionDiagnostics) -> bool;
}

/// Handler that logs the diagnostics and agrees to clear the session
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConnectionLost;

#[async_trait]
impl ConnectionLostHandler for LogConnectionLost {
    async fn clear_session(&self, diagnostics: ConnectionDiagnostics) -> bool {
        tracing::warn!(
            internet_available = diagnostics.internet_available,
            authenticated = diagnostics.authenticated,
            cluster_running = diagnostics.cluster_running,
            "Cluster connection lost"
        );
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Toggle,
    Start,
    Stop,
    Reconnect,
    Recover,
    Shutdown,
}

enum Message {
    Command(Command, oneshot::Sender<bool>),
    Worker(WorkerReport),
    ConnectionLost {
        generation: u64,
        diagnostics: ConnectionDiagnostics,
    },
}

/// Builder for the orchestrator task
pub struct CloudMonitor {
    context: Arc<dyn ProjectContext>,
    factory: Arc<dyn ProviderFactory>,
    probe: Option<Arc<dyn ServiceProbe>>,
    handler: Arc<dyn ConnectionLostHandler>,
    settings: MonitorSettings,
}

impl CloudMonitor {
    pub fn new(context: Arc<dyn ProjectContext>, factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            context,
            factory,
            probe: None,
            handler: Arc::new(LogConnectionLost),
            settings: MonitorSettings::default(),
        }
    }

    /// Probe used for the post-start warm-up and health checks.
    /// Defaults to an HTTP probe with the configured timeout.
    pub fn with_probe(mut self, probe: Arc<dyn ServiceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn ConnectionLostHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start the orchestrator on its own task, in status Stopped
    pub fn spawn(self) -> CloudMonitorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CloudStatus::Stopped);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let probe: Arc<dyn ServiceProbe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpServiceProbe::new(self.settings.probe_timeout())),
        };

        let orchestrator = Orchestrator {
            context: self.context,
            factory: self.factory,
            probe,
            handler: self.handler,
            settings: self.settings,
            status: status_tx,
            events: events.clone(),
            tx: tx.downgrade(),
            health: None,
            generation: 0,
            recovering: false,
        };
        tokio::spawn(orchestrator.run(rx));

        CloudMonitorHandle {
            tx,
            status: status_rx,
            events,
        }
    }
}

/// Cloneable handle to a running orchestrator.
///
/// Command methods return whether the command was accepted in the current
/// status. The orchestrator exits after `shutdown` or once every handle is
/// dropped and in-flight workers have reported.
#[derive(Clone)]
pub struct CloudMonitorHandle {
    tx: mpsc::UnboundedSender<Message>,
    status: watch::Receiver<CloudStatus>,
    events: broadcast::Sender<CloudEvent>,
}

impl CloudMonitorHandle {
    /// Start when Stopped, stop when Running, otherwise ignored
    pub async fn toggle(&self) -> bool {
        self.send(Command::Toggle).await
    }

    pub async fn start(&self) -> bool {
        self.send(Command::Start).await
    }

    pub async fn stop(&self) -> bool {
        self.send(Command::Stop).await
    }

    /// Re-attach to a persisted cluster, if there is one
    pub async fn reconnect_if_possible(&self) -> bool {
        self.send(Command::Reconnect).await
    }

    /// Tear down the cluster and end in Stopped
    pub async fn recover(&self) -> bool {
        self.send(Command::Recover).await
    }

    pub async fn shutdown(&self) {
        self.send(Command::Shutdown).await;
    }

    pub fn status(&self) -> CloudStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CloudEvent> {
        self.events.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<CloudStatus> {
        self.status.clone()
    }

    /// Wait until the status equals `status`.
    /// Returns false if the orchestrator exits first.
    pub async fn wait_for(&self, status: CloudStatus) -> bool {
        self.wait_until(|current| current == status).await.is_some()
    }

    /// Wait until the status satisfies `predicate` and return it
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(CloudStatus) -> bool,
    ) -> Option<CloudStatus> {
        let mut rx = self.status.clone();
        let status = rx.wait_for(|status| predicate(*status)).await.ok()?;
        Some(*status)
    }

    async fn send(&self, command: Command) -> bool {
        let (ack, rx) = oneshot::channel();
        if self.tx.send(Message::Command(command, ack)).is_err() {
            tracing::debug!(?command, "Orchestrator is gone");
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

struct Orchestrator {
    context: Arc<dyn ProjectContext>,
    factory: Arc<dyn ProviderFactory>,
    probe: Arc<dyn ServiceProbe>,
    handler: Arc<dyn ConnectionLostHandler>,
    settings: MonitorSettings,
    status: watch::Sender<CloudStatus>,
    events: broadcast::Sender<CloudEvent>,
    tx: mpsc::WeakUnboundedSender<Message>,
    health: Option<HealthMonitor>,
    generation: u64,
    recovering: bool,
}

impl Orchestrator {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        tracing::debug!("Orchestrator started");
        while let Some(message) = rx.recv().await {
            match message {
                Message::Command(Command::Shutdown, ack) => {
                    self.stop_health();
                    let _ = ack.send(true);
                    break;
                }
                Message::Command(command, ack) => {
                    let accepted = self.handle_command(command).await;
                    let _ = ack.send(accepted);
                }
                Message::Worker(report) => self.handle_report(report).await,
                Message::ConnectionLost {
                    generation,
                    diagnostics,
                } => self.handle_connection_lost(generation, diagnostics).await,
            }
        }
        tracing::debug!("Orchestrator stopped");
    }

    fn current(&self) -> CloudStatus {
        *self.status.borrow()
    }

    /// Publish a transition; setting the current value again is a no-op
    fn set_status(&self, next: CloudStatus) {
        let current = self.current();
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            tracing::warn!(from = %current, to = %next, "Unexpected status transition");
        }

        self.status.send_replace(next);
        tracing::info!(from = %current, to = %next, "Cluster status changed");
        let _ = self.events.send(CloudEvent::StatusChanged(next));
    }

    async fn handle_command(&mut self, command: Command) -> bool {
        let status = self.current();
        let accepted = match command {
            Command::Toggle => match status {
                CloudStatus::Stopped => self.start().await,
                CloudStatus::Running => self.stop().await,
                _ => false,
            },
            Command::Start => self.start().await,
            Command::Stop => self.stop().await,
            Command::Reconnect => self.reconnect().await,
            Command::Recover => self.recover().await,
            Command::Shutdown => true,
        };

        if !accepted {
            tracing::debug!(?command, %status, recovering = self.recovering, "Command ignored");
        }
        accepted
    }

    async fn start(&mut self) -> bool {
        if self.current() != CloudStatus::Stopped || self.recovering {
            return false;
        }

        self.set_status(CloudStatus::Starting);
        let settings = self.context.default_settings().await;
        let warm_up = WarmUp {
            attempts: self.settings.service_probe_attempts,
            pause: self.settings.service_probe_pause(),
        };
        let work = workers::start_cloud(self.factory.clone(), self.probe.clone(), settings, warm_up);
        self.spawn_worker(WorkerKind::Start, async move {
            WorkerReport::Started(work.await)
        });
        true
    }

    async fn stop(&mut self) -> bool {
        if self.current() != CloudStatus::Running {
            return false;
        }

        self.stop_health();
        self.set_status(CloudStatus::Stopping);
        let cluster = PersistedCluster::load(self.context.as_ref()).await;
        let work = workers::stop_cloud(self.factory.clone(), cluster);
        self.spawn_worker(WorkerKind::Stop, async move {
            WorkerReport::Stopped(work.await)
        });
        true
    }

    async fn reconnect(&mut self) -> bool {
        if self.current() != CloudStatus::Stopped || self.recovering {
            return false;
        }
        let Some(cluster) = PersistedCluster::load(self.context.as_ref()).await else {
            return false;
        };

        self.set_status(CloudStatus::Starting);
        let work = workers::reconnect_cloud(self.factory.clone(), Some(cluster));
        self.spawn_worker(WorkerKind::Reconnect, async move {
            WorkerReport::Reconnected(work.await)
        });
        true
    }

    async fn recover(&mut self) -> bool {
        if self.recovering {
            return false;
        }
        match self.current() {
            CloudStatus::Running => {
                self.stop_health();
                self.set_status(CloudStatus::Error);
            }
            CloudStatus::Error | CloudStatus::Stopped => {}
            CloudStatus::Starting | CloudStatus::Stopping => return false,
        }

        self.recovering = true;
        let cluster = PersistedCluster::load(self.context.as_ref()).await;
        let work = workers::recover_cloud(self.factory.clone(), cluster);
        self.spawn_worker(WorkerKind::Recover, async move {
            work.await;
            WorkerReport::Recovered
        });
        true
    }

    async fn handle_report(&mut self, report: WorkerReport) {
        match report {
            WorkerReport::Started(Ok(started)) => self.on_started(started).await,
            WorkerReport::Started(Err(e)) => {
                if e.is_fatal() {
                    tracing::error!(error = %e, "Cluster start aborted");
                } else {
                    tracing::warn!(error = %e, "Cluster start failed");
                }
                if self.current() == CloudStatus::Starting {
                    self.set_status(CloudStatus::Stopped);
                }
            }
            WorkerReport::Stopped(result) => {
                if let Err(e) = result {
                    if e.is_fatal() {
                        tracing::error!(error = %e, "Cluster stop aborted");
                    } else {
                        tracing::warn!(error = %e, "Cluster stop failed");
                    }
                }
                self.clear_cluster().await;
                self.set_status(CloudStatus::Stopped);
            }
            WorkerReport::Reconnected(status) => {
                if self.current() != CloudStatus::Starting {
                    tracing::debug!(%status, "Discarding stale reconnect result");
                    return;
                }
                if status == CloudStatus::Running {
                    self.set_status(CloudStatus::Running);
                    self.start_health().await;
                } else {
                    self.set_status(CloudStatus::Stopped);
                }
            }
            WorkerReport::Recovered => {
                self.recovering = false;
                match self.current() {
                    CloudStatus::Error | CloudStatus::Stopped => {
                        self.clear_cluster().await;
                        self.set_status(CloudStatus::Stopped);
                    }
                    status => tracing::debug!(%status, "Recovery finished after status moved on"),
                }
                let _ = self.events.send(CloudEvent::Recovered);
            }
        }
    }

    async fn on_started(&mut self, started: StartedCluster) {
        if self.current() != CloudStatus::Starting {
            tracing::warn!(status = %self.current(), "Discarding start result");
            return;
        }

        let StartedCluster { settings, session } = started;
        tracing::info!(
            kind = %settings.kind(),
            server_url = session.server_url().unwrap_or("-"),
            "Cluster started"
        );
        self.context.set_settings(Some(settings)).await;
        self.context.set_session(Some(session)).await;
        if let Err(e) = self.context.persist().await {
            tracing::warn!(error = %e, "Failed to persist cluster state");
        }

        self.set_status(CloudStatus::Running);
        self.start_health().await;
    }

    async fn handle_connection_lost(&mut self, generation: u64, diagnostics: ConnectionDiagnostics) {
        if generation != self.generation || self.current() != CloudStatus::Running {
            tracing::debug!(generation, "Discarding stale connection-lost report");
            return;
        }

        self.health = None;
        self.set_status(CloudStatus::Error);
        let _ = self.events.send(CloudEvent::ConnectionLost(diagnostics));

        let handler = self.handler.clone();
        tokio::spawn(async move {
            let clear = handler.clear_session(diagnostics).await;
            tracing::info!(clear, "Connection-lost decision received");
        });

        self.recover().await;
    }

    async fn clear_cluster(&self) {
        self.context.set_settings(None).await;
        self.context.set_session(None).await;
        if let Err(e) = self.context.persist().await {
            tracing::warn!(error = %e, "Failed to persist cleared cluster state");
        }
    }

    async fn start_health(&mut self) {
        self.stop_health();
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        let target = PersistedCluster::load(self.context.as_ref()).await;

        self.health = Some(HealthMonitor::spawn(
            HealthCheck::new(self.settings.failure_threshold, self.settings.internet_debounce),
            target,
            self.factory.clone(),
            self.probe.clone(),
            self.settings.health_period(),
            move |diagnostics| {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Message::ConnectionLost {
                        generation,
                        diagnostics,
                    });
                }
            },
        ));
    }

    fn stop_health(&mut self) {
        if let Some(mut health) = self.health.take() {
            health.stop();
        }
    }

    fn spawn_worker<F>(&self, kind: WorkerKind, work: F)
    where
        F: Future<Output = WorkerReport> + Send + 'static,
    {
        let Some(tx) = self.tx.upgrade() else {
            tracing::warn!(worker = %kind, "No handle left to receive worker report");
            return;
        };
        workers::spawn(kind, work, move |report| {
            let _ = tx.send(Message::Worker(report));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCloud;
    use simfleet_cloud::{CloudSession, CloudSettings, Result, VagrantSettings};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory project context
    #[derive(Default)]
    struct MemoryContext {
        pair: Mutex<(Option<CloudSettings>, Option<CloudSession>)>,
        persisted: Mutex<u32>,
    }

    #[async_trait]
    impl ProjectContext for MemoryContext {
        async fn default_settings(&self) -> CloudSettings {
            CloudSettings::LocalVirtualized(VagrantSettings::default())
        }

        async fn settings(&self) -> Option<CloudSettings> {
            self.pair.lock().unwrap().0.clone()
        }

        async fn set_settings(&self, settings: Option<CloudSettings>) {
            self.pair.lock().unwrap().0 = settings;
        }

        async fn session(&self) -> Option<CloudSession> {
            self.pair.lock().unwrap().1.clone()
        }

        async fn set_session(&self, session: Option<CloudSession>) {
            self.pair.lock().unwrap().1 = session;
        }

        async fn persist(&self) -> Result<()> {
            *self.persisted.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn spawn_monitor(cloud: &ScriptedCloud) -> (Arc<MemoryContext>, CloudMonitorHandle) {
        let context = Arc::new(MemoryContext::default());
        let handle = CloudMonitor::new(context.clone(), cloud.factory())
            .with_probe(cloud.probe())
            .spawn();
        (context, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_ignored_while_starting() {
        let cloud = ScriptedCloud::new();
        cloud.script().server_delay = Duration::from_secs(30);
        let (_context, handle) = spawn_monitor(&cloud);

        assert!(handle.toggle().await);
        assert_eq!(handle.status(), CloudStatus::Starting);
        assert!(!handle.toggle().await);
        assert!(!handle.start().await);
        assert!(!handle.stop().await);
        assert!(!handle.recover().await);

        assert!(handle.wait_for(CloudStatus::Running).await);
        assert_eq!(
            cloud
                .calls()
                .iter()
                .filter(|c| **c == "request_start_server")
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_requires_persisted_pair() {
        let cloud = ScriptedCloud::new();
        let (_context, handle) = spawn_monitor(&cloud);

        assert!(!handle.reconnect_if_possible().await);
        assert_eq!(handle.status(), CloudStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_persists_pair() {
        let cloud = ScriptedCloud::new();
        let (context, handle) = spawn_monitor(&cloud);

        assert!(handle.start().await);
        assert!(handle.wait_for(CloudStatus::Running).await);

        let cluster = PersistedCluster::load(context.as_ref()).await.unwrap();
        assert_eq!(cluster.session.server_url(), Some(cloud.server_url().as_str()));
        assert_eq!(*context.persisted.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_checks_pair_loaded_at_start() {
        let cloud = ScriptedCloud::new();
        let (context, handle) = spawn_monitor(&cloud);

        assert!(handle.start().await);
        assert!(handle.wait_for(CloudStatus::Running).await);
        let probes_at_start = cloud.probe_count();

        context.set_settings(None).await;
        context.set_session(None).await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(handle.status(), CloudStatus::Running);
        assert!(cloud.probe_count() >= probes_at_start + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_from_stopped_keeps_status() {
        let cloud = ScriptedCloud::new();
        let (_context, handle) = spawn_monitor(&cloud);
        let mut events = handle.subscribe();

        assert!(handle.recover().await);
        assert_eq!(events.recv().await.unwrap(), CloudEvent::Recovered);

        assert_eq!(handle.status(), CloudStatus::Stopped);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_rejects_later_commands() {
        let cloud = ScriptedCloud::new();
        let (_context, handle) = spawn_monitor(&cloud);

        handle.shutdown().await;
        assert!(!handle.start().await);
        assert_eq!(handle.status(), CloudStatus::Stopped);
    }
}
