use crate::utils;
use colored::Colorize;
use simfleet_monitor::{CloudEvent, CloudMonitorHandle, CloudStatus};
use tokio::sync::broadcast;

pub async fn handle(handle: &CloudMonitorHandle, watch: bool) -> anyhow::Result<()> {
    let mut events = handle.subscribe();

    // A persisted cluster that is still alive is adopted instead of started twice
    if adopt_persisted(handle, &mut events).await {
        println!("{}", "Cluster is already running".green());
        return follow(handle, &mut events, watch).await;
    }

    println!("{}", "Starting cluster...".blue());
    if !handle.start().await {
        anyhow::bail!("Cannot start while the cluster is {}", handle.status());
    }

    match utils::settle(handle, &mut events).await {
        CloudStatus::Running => {
            println!("{} Cluster is up", "✓".green());
            follow(handle, &mut events, watch).await
        }
        status => anyhow::bail!("Cluster failed to start (status: {})", status),
    }
}

/// Reattach to the persisted cluster and return whether it is running.
/// A cluster that is only partly alive is torn down and cleared first, so
/// the next start does not overwrite a pair that still owns resources.
async fn adopt_persisted(
    handle: &CloudMonitorHandle,
    events: &mut broadcast::Receiver<CloudEvent>,
) -> bool {
    if !handle.reconnect_if_possible().await {
        return false;
    }

    println!("{}", "Checking persisted cluster...".blue());
    if utils::settle(handle, events).await == CloudStatus::Running {
        return true;
    }

    println!(
        "{}",
        "Persisted cluster is not fully running, tearing it down".yellow()
    );
    if handle.recover().await {
        utils::recovered(events).await;
    }
    false
}

async fn follow(
    handle: &CloudMonitorHandle,
    events: &mut broadcast::Receiver<CloudEvent>,
    watch: bool,
) -> anyhow::Result<()> {
    if watch {
        utils::watch(handle, events).await
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simfleet_cloud::{CloudKind, CloudSettings, VagrantSettings};
    use simfleet_monitor::testing::ScriptedCloud;
    use simfleet_monitor::{CloudMonitor, FileProjectContext, PersistedCluster, ProjectContext};
    use std::sync::Arc;

    fn defaults() -> CloudSettings {
        CloudSettings::LocalVirtualized(VagrantSettings::default())
    }

    async fn seeded_monitor(
        root: &std::path::Path,
        cloud: &ScriptedCloud,
    ) -> (Arc<FileProjectContext>, CloudMonitorHandle) {
        let context = Arc::new(FileProjectContext::open(root, defaults()).await.unwrap());
        context.set_settings(Some(defaults())).await;
        context
            .set_session(Some(cloud.session_for(CloudKind::LocalVirtualized)))
            .await;
        context.persist().await.unwrap();

        let handle = CloudMonitor::new(context.clone(), cloud.factory())
            .with_probe(cloud.probe())
            .spawn();
        (context, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_up_adopts_running_cluster() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cloud = ScriptedCloud::new();
        let (_context, handle) = seeded_monitor(temp_dir.path(), &cloud).await;

        handle_up(&handle).await;

        assert_eq!(handle.status(), CloudStatus::Running);
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_up_tears_down_partial_cluster_before_starting() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cloud = ScriptedCloud::new();
        cloud.script().workers_running = false;
        let (context, handle) = seeded_monitor(temp_dir.path(), &cloud).await;

        handle_up(&handle).await;

        assert_eq!(handle.status(), CloudStatus::Running);
        let calls = cloud.calls();
        let position = |call| calls.iter().position(|c| *c == call).unwrap();
        assert!(position("wait_for_terminated") < position("request_start_server"));
        assert!(PersistedCluster::load(context.as_ref()).await.is_some());
    }

    async fn handle_up(monitor: &CloudMonitorHandle) {
        handle(monitor, false).await.unwrap();
    }
}
