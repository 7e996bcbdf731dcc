use crate::utils;
use colored::Colorize;
use simfleet_monitor::{CloudMonitorHandle, CloudStatus};

pub async fn handle(handle: &CloudMonitorHandle, watch: bool) -> anyhow::Result<()> {
    let mut events = handle.subscribe();

    if !handle.reconnect_if_possible().await {
        println!("{}", "No persisted cluster to reconnect to".dimmed());
        return Ok(());
    }

    match utils::settle(handle, &mut events).await {
        CloudStatus::Running => {
            println!("{} Reconnected", "✓".green());
            if watch {
                utils::watch(handle, &mut events).await?;
            }
        }
        _ => println!(
            "{}",
            "Persisted cluster is not running; `simfleet down --force` clears it".yellow()
        ),
    }
    Ok(())
}
