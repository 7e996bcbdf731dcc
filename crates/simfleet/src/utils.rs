use colored::{ColoredString, Colorize};
use simfleet_monitor::{CloudEvent, CloudMonitorHandle, CloudStatus};
use tokio::sync::broadcast::{self, error::RecvError};

/// Colored status label
pub fn status_label(status: CloudStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        CloudStatus::Running => label.green().bold(),
        CloudStatus::Starting | CloudStatus::Stopping => label.yellow(),
        CloudStatus::Stopped => label.dimmed(),
        CloudStatus::Error => label.red().bold(),
    }
}

pub fn print_status(status: CloudStatus) {
    println!("  → {}", status_label(status));
}

/// Print transitions until one lands on a settled status, and return it
pub async fn settle(
    handle: &CloudMonitorHandle,
    events: &mut broadcast::Receiver<CloudEvent>,
) -> CloudStatus {
    loop {
        match events.recv().await {
            Ok(CloudEvent::StatusChanged(status)) => {
                print_status(status);
                if status.is_settled() {
                    return status;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Missed status events");
                let status = handle.status();
                if status.is_settled() {
                    return status;
                }
            }
            Err(RecvError::Closed) => return handle.status(),
        }
    }
}

/// Wait for the next `Recovered` event
pub async fn recovered(events: &mut broadcast::Receiver<CloudEvent>) {
    loop {
        match events.recv().await {
            Ok(CloudEvent::Recovered) | Err(RecvError::Closed) => return,
            Ok(CloudEvent::StatusChanged(status)) => print_status(status),
            Ok(CloudEvent::ConnectionLost(_)) | Err(RecvError::Lagged(_)) => {}
        }
    }
}

/// Follow the running cluster until Ctrl-C or until it ends up Stopped
pub async fn watch(
    handle: &CloudMonitorHandle,
    events: &mut broadcast::Receiver<CloudEvent>,
) -> anyhow::Result<()> {
    println!(
        "{}",
        "Monitoring cluster health, press Ctrl-C to detach".dimmed()
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                println!();
                println!("{}", "Detached; the cluster keeps running".yellow());
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(CloudEvent::StatusChanged(status)) => print_status(status),
                Ok(CloudEvent::Recovered) => {
                    if handle.status() == CloudStatus::Stopped {
                        println!("{}", "Cluster was torn down after losing connection".red());
                        return Ok(());
                    }
                }
                Ok(CloudEvent::ConnectionLost(_)) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simfleet_cloud::{CloudSettings, VagrantSettings};
    use simfleet_monitor::testing::ScriptedCloud;
    use simfleet_monitor::{CloudMonitor, FileProjectContext};
    use std::sync::Arc;

    #[test]
    fn test_status_label_text() {
        colored::control::set_override(false);
        assert_eq!(status_label(CloudStatus::Running).to_string(), "running");
        assert_eq!(status_label(CloudStatus::Error).to_string(), "error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_returns_running_after_start() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cloud = ScriptedCloud::new();
        let context = FileProjectContext::open(
            temp_dir.path(),
            CloudSettings::LocalVirtualized(VagrantSettings::default()),
        )
        .await
        .unwrap();
        let handle = CloudMonitor::new(Arc::new(context), cloud.factory())
            .with_probe(cloud.probe())
            .spawn();

        let mut events = handle.subscribe();
        assert!(handle.start().await);
        assert_eq!(settle(&handle, &mut events).await, CloudStatus::Running);

        assert!(handle.stop().await);
        assert_eq!(settle(&handle, &mut events).await, CloudStatus::Stopped);
    }
}
