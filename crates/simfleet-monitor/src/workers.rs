//! Lifecycle workers
//!
//! Each worker performs one bounded sequence of provider calls on its own
//! task and reports back through a `WorkerReport`. Workers never touch the
//! project context; the orchestrator hands them everything they need and
//! commits their results itself.

use crate::context::PersistedCluster;
use crate::factory::ProviderFactory;
use crate::status::CloudStatus;
use simfleet_cloud::{CloudError, CloudProvider, CloudSession, CloudSettings, Result, ServiceProbe};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Kind of lifecycle worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Start,
    Stop,
    Reconnect,
    Recover,
}

impl WorkerKind {
    /// Report delivered when the worker task dies before reporting
    fn aborted(self, error: CloudError) -> WorkerReport {
        match self {
            WorkerKind::Start => WorkerReport::Started(Err(error)),
            WorkerKind::Stop => WorkerReport::Stopped(Err(error)),
            WorkerKind::Reconnect => WorkerReport::Reconnected(CloudStatus::Stopped),
            WorkerKind::Recover => WorkerReport::Recovered,
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerKind::Start => write!(f, "start"),
            WorkerKind::Stop => write!(f, "stop"),
            WorkerKind::Reconnect => write!(f, "reconnect"),
            WorkerKind::Recover => write!(f, "recover"),
        }
    }
}

/// A started cluster, ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct StartedCluster {
    pub settings: CloudSettings,
    pub session: CloudSession,
}

/// Completion of a worker
#[derive(Debug)]
pub enum WorkerReport {
    Started(Result<StartedCluster>),
    Stopped(Result<()>),
    Reconnected(CloudStatus),
    Recovered,
}

/// Post-start service probe schedule
#[derive(Debug, Clone, Copy)]
pub struct WarmUp {
    pub attempts: u32,
    pub pause: Duration,
}

impl Default for WarmUp {
    fn default() -> Self {
        Self {
            attempts: 15,
            pause: Duration::from_secs(3),
        }
    }
}

/// Run `work` on its own task and hand its report to `done`.
///
/// A panic inside the worker is folded into a failure report, so `done`
/// always runs exactly once.
pub fn spawn<F, D>(kind: WorkerKind, work: F, done: D)
where
    F: Future<Output = WorkerReport> + Send + 'static,
    D: FnOnce(WorkerReport) + Send + 'static,
{
    tokio::spawn(async move {
        tracing::debug!(worker = %kind, "Worker started");
        let report = match tokio::spawn(work).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(worker = %kind, error = %e, "Worker task failed");
                kind.aborted(CloudError::WorkerPanicked(e.to_string()))
            }
        };
        tracing::debug!(worker = %kind, "Worker finished");
        done(report);
    });
}

/// Bring up a new cluster from fresh settings
pub async fn start_cloud(
    factory: Arc<dyn ProviderFactory>,
    probe: Arc<dyn ServiceProbe>,
    settings: CloudSettings,
    warm_up: WarmUp,
) -> Result<StartedCluster> {
    let mut provider = factory.build(&settings, None)?;

    if let Err(e) = bring_up(provider.as_mut()).await {
        tracing::warn!(error = %e, "Cluster start failed, tearing down");
        terminate_quietly(provider.as_mut()).await;
        return Err(e);
    }

    let Some(session) = provider.session() else {
        tracing::warn!("Backend reported no session after start, tearing down");
        terminate_quietly(provider.as_mut()).await;
        return Err(CloudError::MissingSession);
    };

    if let Some(url) = session.server_url() {
        warm_up_service(probe.as_ref(), url, warm_up).await;
    }

    Ok(StartedCluster {
        settings: provider.settings(),
        session,
    })
}

async fn bring_up(provider: &mut dyn CloudProvider) -> Result<()> {
    if !provider.request_start_server().await? {
        return Err(CloudError::StartRejected("coordinator".to_string()));
    }
    provider.wait_for_server().await?;

    if !provider.request_start_workers().await? {
        return Err(CloudError::StartRejected("worker pool".to_string()));
    }
    provider.wait_for_workers().await
}

async fn terminate_quietly(provider: &mut dyn CloudProvider) {
    let result = async {
        if provider.request_terminate().await? {
            provider.wait_for_terminated().await?;
        }
        Ok::<_, CloudError>(())
    }
    .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, "Best-effort teardown failed");
    }
}

/// Probe the coordinator service until it answers or attempts run out.
/// Returns whether it answered; running out is not an error.
pub async fn warm_up_service(probe: &dyn ServiceProbe, url: &str, warm_up: WarmUp) -> bool {
    for attempt in 1..=warm_up.attempts {
        if probe.service_available(url).await {
            tracing::info!(url, attempt, "Coordinator service available");
            return true;
        }
        if attempt < warm_up.attempts {
            tokio::time::sleep(warm_up.pause).await;
        }
    }

    tracing::warn!(url, attempts = warm_up.attempts, "Coordinator service did not answer");
    false
}

/// Tear down the persisted cluster; no cluster is a successful no-op
pub async fn stop_cloud(
    factory: Arc<dyn ProviderFactory>,
    cluster: Option<PersistedCluster>,
) -> Result<()> {
    let Some(cluster) = cluster else {
        tracing::debug!("No persisted cluster, nothing to stop");
        return Ok(());
    };

    let mut provider = factory.build(&cluster.settings, Some(&cluster.session))?;

    if !provider.request_terminate().await? {
        return Err(CloudError::TerminateRejected);
    }
    provider.wait_for_terminated().await
}

/// Inspect the persisted cluster without starting or stopping anything
pub async fn reconnect_cloud(
    factory: Arc<dyn ProviderFactory>,
    cluster: Option<PersistedCluster>,
) -> CloudStatus {
    let Some(cluster) = cluster else {
        return CloudStatus::Stopped;
    };

    let provider = match factory.build(&cluster.settings, Some(&cluster.session)) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!(error = %e, "Cannot reconnect to persisted cluster");
            return CloudStatus::Stopped;
        }
    };

    match provider.cluster_running().await {
        Ok(true) => CloudStatus::Running,
        Ok(false) => {
            tracing::info!("Persisted cluster is not running");
            CloudStatus::Stopped
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cluster liveness query failed");
            CloudStatus::Stopped
        }
    }
}

/// Best-effort teardown after a lost connection; failures are swallowed
pub async fn recover_cloud(factory: Arc<dyn ProviderFactory>, cluster: Option<PersistedCluster>) {
    if let Err(e) = stop_cloud(factory, cluster).await {
        tracing::warn!(error = %e, fatal = e.is_fatal(), "Teardown during recovery failed");
    }
}
