use crate::utils;
use colored::Colorize;
use simfleet_cloud::CloudState;
use simfleet_monitor::workers::reconnect_cloud;
use simfleet_monitor::{BackendFactory, CloudStatus, FileProjectContext, PersistedCluster};
use std::sync::Arc;

pub async fn handle(context: &FileProjectContext, check: bool, json: bool) -> anyhow::Result<()> {
    let state = context.snapshot().await;

    let live = if check {
        let cluster = PersistedCluster::load(context).await;
        Some(reconnect_cloud(Arc::new(BackendFactory), cluster).await)
    } else {
        None
    };

    if json {
        let mut value = serde_json::to_value(&state)?;
        if let Some(status) = live {
            value["status"] = serde_json::to_value(status)?;
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_state(&state, live);
    }
    Ok(())
}

fn print_state(state: &CloudState, live: Option<CloudStatus>) {
    let (Some(settings), Some(session)) = (&state.settings, &state.session) else {
        println!("{}", "No cluster attached to this project".dimmed());
        return;
    };

    println!("{}", "Attached cluster:".bold());
    println!("  backend:     {}", settings.kind().to_string().cyan());
    println!(
        "  coordinator: {}",
        session.server_url().unwrap_or("-").cyan()
    );
    for url in session.worker_urls() {
        println!("  worker:      {}", url.cyan());
    }
    println!(
        "  updated:     {}",
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(status) = live {
        println!("  status:      {}", utils::status_label(status));
    }
}
