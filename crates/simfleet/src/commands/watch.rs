use crate::utils;
use colored::Colorize;
use simfleet_monitor::{CloudMonitorHandle, CloudStatus};

pub async fn handle(handle: &CloudMonitorHandle) -> anyhow::Result<()> {
    let mut events = handle.subscribe();

    if handle.reconnect_if_possible().await
        && utils::settle(handle, &mut events).await == CloudStatus::Running
    {
        return utils::watch(handle, &mut events).await;
    }

    anyhow::bail!("No running cluster to watch; start one with `simfleet up`")
}
