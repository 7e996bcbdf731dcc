//! vagrant CLI wrapper
//!
//! Wraps the vagrant commands run inside a machine's Vagrantfile directory.

use crate::error::{Result, VagrantError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// A vagrant command running in the background
pub type PendingCommand = JoinHandle<Result<String>>;

/// vagrant CLI wrapper
#[derive(Debug, Clone, Default)]
pub struct Vagrant;

impl Vagrant {
    pub fn new() -> Self {
        Self
    }

    /// Check that vagrant is installed
    pub async fn check_installed(&self) -> Result<String> {
        let output = Command::new("vagrant")
            .arg("--version")
            .output()
            .await
            .map_err(|_| VagrantError::VagrantNotFound)?;

        if !output.status.success() {
            return Err(VagrantError::VagrantNotFound);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a vagrant command in `dir` and return stdout
    pub async fn run_command(dir: &Path, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("vagrant");
        cmd.args(args);
        cmd.current_dir(dir);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: vagrant {} (in {})", args.join(" "), dir.display());

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VagrantError::CommandFailed(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Start a command without waiting for it
    pub fn spawn(&self, dir: &Path, args: &[&str]) -> PendingCommand {
        let dir = dir.to_path_buf();
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        tokio::spawn(async move {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            Self::run_command(&dir, &args).await
        })
    }

    /// Wait for a background command to finish
    pub async fn finish(pending: PendingCommand) -> Result<String> {
        pending
            .await
            .map_err(|e| VagrantError::TaskAborted(e.to_string()))?
    }

    pub fn up(&self, dir: &Path) -> PendingCommand {
        self.spawn(dir, &["up"])
    }

    pub fn halt(&self, dir: &Path) -> PendingCommand {
        self.spawn(dir, &["halt"])
    }

    pub fn destroy(&self, dir: &Path) -> PendingCommand {
        self.spawn(dir, &["destroy", "--force"])
    }

    /// Machine states reported by `vagrant status`
    pub async fn status(&self, dir: &Path) -> Result<Vec<MachineStatus>> {
        let output = Self::run_command(dir, &["status", "--machine-readable"]).await?;
        Ok(parse_machine_status(&output, dir))
    }

    /// Every machine in `dir` is running
    pub async fn is_running(&self, dir: &Path) -> Result<bool> {
        let machines = self.status(dir).await?;
        Ok(!machines.is_empty() && machines.iter().all(MachineStatus::is_running))
    }
}

/// State of one machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineStatus {
    pub dir: PathBuf,
    pub name: String,
    pub state: String,
}

impl MachineStatus {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Parse `timestamp,target,type,data` lines, keeping the `state` entries
pub fn parse_machine_status(output: &str, dir: &Path) -> Vec<MachineStatus> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(4, ',');
            let _timestamp = fields.next()?;
            let target = fields.next()?;
            let kind = fields.next()?;
            let data = fields.next()?;
            (kind == "state" && !target.is_empty()).then(|| MachineStatus {
                dir: dir.to_path_buf(),
                name: target.to_string(),
                state: data.trim().to_string(),
            })
        })
        .collect()
}
