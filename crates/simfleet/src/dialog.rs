use async_trait::async_trait;
use colored::Colorize;
use simfleet_monitor::{ConnectionDiagnostics, ConnectionLostHandler};

/// Prints the connection-lost diagnostics to the terminal
pub struct TerminalDialog;

fn check_line(label: &str, ok: bool) -> String {
    let mark = if ok { "✓".green() } else { "✗".red() };
    format!("  {} {}", mark, label)
}

/// Hint for the first failing layer
fn hint(diagnostics: &ConnectionDiagnostics) -> &'static str {
    if !diagnostics.internet_available {
        "This machine appears to be offline."
    } else if !diagnostics.authenticated {
        "Backend credentials were rejected; check your AWS profile or Vagrant install."
    } else if !diagnostics.cluster_running {
        "The backend reports the cluster is no longer running."
    } else {
        "The coordinator service stopped answering."
    }
}

#[async_trait]
impl ConnectionLostHandler for TerminalDialog {
    async fn clear_session(&self, diagnostics: ConnectionDiagnostics) -> bool {
        println!();
        println!("{}", "Lost connection to the cluster".red().bold());
        println!("{}", check_line("internet reachable", diagnostics.internet_available));
        println!("{}", check_line("credentials valid", diagnostics.authenticated));
        println!("{}", check_line("cluster running", diagnostics.cluster_running));
        println!("{}", hint(&diagnostics).yellow());
        println!("{}", "Tearing down the cluster and clearing the session".dimmed());
        true
    }
}
