//! End-to-end lifecycle tests against the scripted backend

use async_trait::async_trait;
use simfleet_cloud::{CloudKind, CloudSettings, VagrantSettings};
use simfleet_config::MonitorSettings;
use simfleet_monitor::testing::ScriptedCloud;
use simfleet_monitor::{
    CloudEvent, CloudMonitor, CloudMonitorHandle, CloudStatus, ConnectionDiagnostics,
    ConnectionLostHandler, FileProjectContext, PersistedCluster, ProjectContext,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

fn defaults() -> CloudSettings {
    CloudSettings::LocalVirtualized(VagrantSettings::default())
}

struct Harness {
    _dir: TempDir,
    root: std::path::PathBuf,
    cloud: ScriptedCloud,
    context: Arc<FileProjectContext>,
    handle: CloudMonitorHandle,
    events: broadcast::Receiver<CloudEvent>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_handler(None).await
    }

    async fn with_handler(handler: Option<Arc<dyn ConnectionLostHandler>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let cloud = ScriptedCloud::new();
        let context = Arc::new(FileProjectContext::open(&root, defaults()).await.unwrap());

        let mut monitor = CloudMonitor::new(context.clone(), cloud.factory())
            .with_probe(cloud.probe())
            .with_settings(MonitorSettings::default());
        if let Some(handler) = handler {
            monitor = monitor.with_handler(handler);
        }
        let handle = monitor.spawn();
        let events = handle.subscribe();

        Self {
            _dir: dir,
            root,
            cloud,
            context,
            handle,
            events,
        }
    }

    /// Store a pair as if a previous run had started a cluster
    async fn seed_cluster(&self) {
        self.context.set_settings(Some(defaults())).await;
        self.context
            .set_session(Some(self.cloud.session_for(CloudKind::LocalVirtualized)))
            .await;
        self.context.persist().await.unwrap();
    }

    fn drain(&mut self) -> Vec<CloudEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    async fn on_disk(&self) -> Option<PersistedCluster> {
        let reopened = FileProjectContext::open(&self.root, defaults()).await.unwrap();
        PersistedCluster::load(&reopened).await
    }
}

fn statuses(events: &[CloudEvent]) -> Vec<CloudStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            CloudEvent::StatusChanged(status) => Some(*status),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_start_then_stop() {
    let mut h = Harness::new().await;

    assert!(h.handle.start().await);
    assert!(h.handle.wait_for(CloudStatus::Running).await);

    let cluster = h.on_disk().await.expect("pair persisted after start");
    assert_eq!(cluster.settings, defaults());
    assert_eq!(cluster.session.server_url(), Some(h.cloud.server_url().as_str()));

    assert!(h.handle.stop().await);
    assert!(h.handle.wait_for(CloudStatus::Stopped).await);
    assert!(h.on_disk().await.is_none());

    assert_eq!(
        statuses(&h.drain()),
        vec![
            CloudStatus::Starting,
            CloudStatus::Running,
            CloudStatus::Stopping,
            CloudStatus::Stopped,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_toggle_cycles_without_duplicate_events() {
    let mut h = Harness::new().await;

    for _ in 0..2 {
        assert!(h.handle.toggle().await);
        assert!(h.handle.wait_for(CloudStatus::Running).await);
        assert!(h.handle.toggle().await);
        assert!(h.handle.wait_for(CloudStatus::Stopped).await);
    }

    let events = h.drain();
    assert_eq!(events.len(), 8);
    for pair in statuses(&events).windows(2) {
        assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
    }
}

#[tokio::test(start_paused = true)]
async fn test_rejected_start_returns_to_stopped() {
    let mut h = Harness::new().await;
    h.cloud.script().accept_server_start = false;

    assert!(h.handle.start().await);
    assert!(h.handle.wait_for(CloudStatus::Stopped).await);

    assert_eq!(
        statuses(&h.drain()),
        vec![CloudStatus::Starting, CloudStatus::Stopped]
    );
    assert!(h.on_disk().await.is_none());
    assert!(h.cloud.calls().contains(&"request_terminate"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_stopped_is_ignored() {
    let mut h = Harness::new().await;

    assert!(!h.handle.stop().await);
    assert!(!h.handle.stop().await);
    assert_eq!(h.handle.status(), CloudStatus::Stopped);
    assert!(h.drain().is_empty());
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_to_running_cluster() {
    let mut h = Harness::new().await;
    h.seed_cluster().await;

    assert!(h.handle.reconnect_if_possible().await);
    assert!(h.handle.wait_for(CloudStatus::Running).await);

    assert_eq!(
        statuses(&h.drain()),
        vec![CloudStatus::Starting, CloudStatus::Running]
    );
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_to_partial_cluster_stops() {
    let mut h = Harness::new().await;
    h.seed_cluster().await;
    h.cloud.script().workers_running = false;

    assert!(h.handle.reconnect_if_possible().await);
    assert!(h.handle.wait_for(CloudStatus::Stopped).await);

    assert_eq!(
        statuses(&h.drain()),
        vec![CloudStatus::Starting, CloudStatus::Stopped]
    );
    assert!(h.on_disk().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_partial_cluster_is_torn_down_before_new_start() {
    let mut h = Harness::new().await;
    h.seed_cluster().await;
    h.cloud.script().workers_running = false;

    assert!(h.handle.reconnect_if_possible().await);
    assert!(h.handle.wait_for(CloudStatus::Stopped).await);
    h.drain();

    assert!(h.handle.recover().await);
    assert_eq!(h.events.recv().await.unwrap(), CloudEvent::Recovered);
    assert!(h.on_disk().await.is_none());

    assert!(h.handle.start().await);
    assert!(h.handle.wait_for(CloudStatus::Running).await);

    assert_eq!(
        h.cloud.calls(),
        vec![
            "request_terminate",
            "wait_for_terminated",
            "request_start_server",
            "wait_for_server",
            "request_start_workers",
            "wait_for_workers",
        ]
    );
    assert!(h.on_disk().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_lost_connection_recovers_to_stopped() {
    let mut h = Harness::new().await;

    assert!(h.handle.start().await);
    assert!(h.handle.wait_for(CloudStatus::Running).await);
    h.drain();

    {
        let mut script = h.cloud.script();
        script.service_available = false;
        script.workers_running = false;
    }

    assert!(h.handle.wait_for(CloudStatus::Stopped).await);

    let events = h.drain();
    assert_eq!(
        events,
        vec![
            CloudEvent::StatusChanged(CloudStatus::Error),
            CloudEvent::ConnectionLost(ConnectionDiagnostics {
                internet_available: true,
                authenticated: true,
                cluster_running: false,
            }),
            CloudEvent::StatusChanged(CloudStatus::Stopped),
            CloudEvent::Recovered,
        ]
    );
    assert!(h.on_disk().await.is_none());
    assert!(h.cloud.calls().contains(&"request_terminate"));
}

#[tokio::test(start_paused = true)]
async fn test_two_failures_then_success_keeps_running() {
    let mut h = Harness::new().await;

    assert!(h.handle.start().await);
    assert!(h.handle.wait_for(CloudStatus::Running).await);
    h.drain();

    h.cloud.script().service_available = false;
    tokio::time::sleep(Duration::from_secs(11)).await;
    h.cloud.script().service_available = true;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.handle.status(), CloudStatus::Running);
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_silences_health_monitor() {
    let mut h = Harness::new().await;

    assert!(h.handle.start().await);
    assert!(h.handle.wait_for(CloudStatus::Running).await);
    let probes = h.cloud.probe_count();

    assert!(h.handle.stop().await);
    assert!(h.handle.wait_for(CloudStatus::Stopped).await);
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.cloud.probe_count(), probes);
    assert_eq!(statuses(&h.drain()).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_manual_recover_from_running() {
    let mut h = Harness::new().await;

    assert!(h.handle.start().await);
    assert!(h.handle.wait_for(CloudStatus::Running).await);
    h.drain();

    assert!(h.handle.recover().await);
    assert!(h.handle.wait_for(CloudStatus::Stopped).await);

    assert_eq!(
        statuses(&h.drain()),
        vec![CloudStatus::Error, CloudStatus::Stopped]
    );
    assert!(h.on_disk().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_recover_clears_stale_cluster_when_stopped() {
    let mut h = Harness::new().await;
    h.seed_cluster().await;

    assert!(h.handle.recover().await);
    assert_eq!(h.events.recv().await.unwrap(), CloudEvent::Recovered);

    assert_eq!(h.handle.status(), CloudStatus::Stopped);
    assert!(h.drain().is_empty());
    assert!(h.on_disk().await.is_none());
    assert_eq!(
        h.cloud.calls(),
        vec!["request_terminate", "wait_for_terminated"]
    );
}

struct RecordingHandler {
    seen: Mutex<Vec<ConnectionDiagnostics>>,
}

#[async_trait]
impl ConnectionLostHandler for RecordingHandler {
    async fn clear_session(&self, diagnostics: ConnectionDiagnostics) -> bool {
        self.seen.lock().unwrap().push(diagnostics);
        false
    }
}

#[tokio::test(start_paused = true)]
async fn test_handler_is_asked_but_recovery_still_clears() {
    let handler = Arc::new(RecordingHandler {
        seen: Mutex::new(Vec::new()),
    });
    let h = Harness::with_handler(Some(handler.clone())).await;

    assert!(h.handle.start().await);
    assert!(h.handle.wait_for(CloudStatus::Running).await);

    h.cloud.script().service_available = false;
    assert!(h.handle.wait_for(CloudStatus::Stopped).await);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(handler.seen.lock().unwrap().len(), 1);
    assert!(h.on_disk().await.is_none());
}
