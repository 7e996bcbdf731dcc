use crate::utils;
use colored::Colorize;
use simfleet_monitor::{CloudMonitorHandle, CloudStatus};

pub async fn handle(handle: &CloudMonitorHandle, force: bool) -> anyhow::Result<()> {
    let mut events = handle.subscribe();

    if !handle.reconnect_if_possible().await {
        println!("{}", "No cluster to tear down".dimmed());
        return Ok(());
    }

    println!("{}", "Checking persisted cluster...".blue());
    let status = utils::settle(handle, &mut events).await;

    if status == CloudStatus::Running {
        println!("{}", "Stopping cluster...".yellow());
        if !handle.stop().await {
            anyhow::bail!("Cannot stop while the cluster is {}", handle.status());
        }
        utils::settle(handle, &mut events).await;
        println!("{} Cluster stopped", "✓".green());
        return Ok(());
    }

    if !force {
        println!(
            "{}",
            "Cluster does not look running; use --force to tear down what is left".yellow()
        );
        return Ok(());
    }

    println!("{}", "Tearing down remaining resources...".yellow());
    if !handle.recover().await {
        anyhow::bail!("Cannot tear down while the cluster is {}", handle.status());
    }
    utils::recovered(&mut events).await;
    println!("{} Session cleared", "✓".green());
    Ok(())
}
