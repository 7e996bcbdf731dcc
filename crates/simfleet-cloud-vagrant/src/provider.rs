//! Vagrant provider implementation

use crate::error::VagrantError;
use crate::vagrant::{PendingCommand, Vagrant};
use async_trait::async_trait;
use simfleet_cloud::{
    AuthStatus, CloudKind, CloudProvider, CloudSession, CloudSettings, HttpServiceProbe,
    VagrantSession, VagrantSettings,
};
use std::path::Path;

/// Local-virtualized provider
pub struct VagrantProvider {
    vagrant: Vagrant,
    settings: VagrantSettings,
    session: Option<VagrantSession>,
    pending_server: Option<PendingCommand>,
    pending_workers: Option<PendingCommand>,
    pending_terminate: Vec<PendingCommand>,
    probe: HttpServiceProbe,
}

impl VagrantProvider {
    pub fn new(settings: VagrantSettings) -> Self {
        Self {
            vagrant: Vagrant::new(),
            settings,
            session: None,
            pending_server: None,
            pending_workers: None,
            pending_terminate: Vec::new(),
            probe: HttpServiceProbe::default(),
        }
    }

    /// Bind to an existing cluster
    pub fn with_session(settings: VagrantSettings, session: VagrantSession) -> Self {
        Self {
            session: Some(session),
            ..Self::new(settings)
        }
    }

    fn session_mut(&mut self) -> &mut VagrantSession {
        self.session.get_or_insert_with(VagrantSession::default)
    }

    async fn finish_up(
        &self,
        pending: Option<PendingCommand>,
        dir: &Path,
    ) -> simfleet_cloud::Result<()> {
        if let Some(pending) = pending {
            Vagrant::finish(pending).await?;
        }
        if !self.vagrant.is_running(dir).await? {
            return Err(VagrantError::MachineNotRunning(dir.to_path_buf()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for VagrantProvider {
    fn kind(&self) -> CloudKind {
        CloudKind::LocalVirtualized
    }

    fn settings(&self) -> CloudSettings {
        CloudSettings::LocalVirtualized(self.settings.clone())
    }

    fn session(&self) -> Option<CloudSession> {
        self.session.clone().map(CloudSession::LocalVirtualized)
    }

    async fn request_start_server(&mut self) -> simfleet_cloud::Result<bool> {
        if self.pending_server.is_some() {
            return Ok(false);
        }
        tracing::info!(dir = %self.settings.server_path.display(), "Starting coordinator machine");
        self.pending_server = Some(self.vagrant.up(&self.settings.server_path));
        Ok(true)
    }

    async fn wait_for_server(&mut self) -> simfleet_cloud::Result<()> {
        let pending = self.pending_server.take();
        self.finish_up(pending, &self.settings.server_path).await?;

        let url = self.settings.server_url.clone();
        self.session_mut().server_url = Some(url);
        tracing::info!("Coordinator machine running");
        Ok(())
    }

    async fn request_start_workers(&mut self) -> simfleet_cloud::Result<bool> {
        if self.pending_workers.is_some() {
            return Ok(false);
        }
        tracing::info!(dir = %self.settings.worker_path.display(), "Starting worker machine");
        self.pending_workers = Some(self.vagrant.up(&self.settings.worker_path));
        Ok(true)
    }

    async fn wait_for_workers(&mut self) -> simfleet_cloud::Result<()> {
        let pending = self.pending_workers.take();
        self.finish_up(pending, &self.settings.worker_path).await?;

        let url = self.settings.worker_url.clone();
        self.session_mut().worker_urls = vec![url];
        tracing::info!("Worker machine running");
        Ok(())
    }

    async fn request_terminate(&mut self) -> simfleet_cloud::Result<bool> {
        if !self.pending_terminate.is_empty() {
            return Ok(false);
        }

        for dir in [&self.settings.server_path, &self.settings.worker_path] {
            let pending = if self.settings.halt_on_stop {
                self.vagrant.halt(dir)
            } else {
                self.vagrant.destroy(dir)
            };
            self.pending_terminate.push(pending);
        }
        tracing::info!(halt = self.settings.halt_on_stop, "Termination requested");
        Ok(true)
    }

    async fn wait_for_terminated(&mut self) -> simfleet_cloud::Result<()> {
        let mut first_error = None;
        for pending in self.pending_terminate.drain(..) {
            if let Err(e) = Vagrant::finish(pending).await {
                tracing::warn!(error = %e, "vagrant teardown command failed");
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e.into());
        }

        self.session = None;
        Ok(())
    }

    async fn server_running(&self) -> simfleet_cloud::Result<bool> {
        Ok(self.vagrant.is_running(&self.settings.server_path).await?)
    }

    async fn workers_running(&self) -> simfleet_cloud::Result<bool> {
        Ok(self.vagrant.is_running(&self.settings.worker_path).await?)
    }

    async fn internet_available(&self) -> bool {
        self.probe.reachable(&self.settings.internet_check_url).await
    }

    async fn check_auth(&self) -> simfleet_cloud::Result<AuthStatus> {
        match self.vagrant.check_installed().await {
            Ok(version) => Ok(AuthStatus::ok(format!("local ({})", version))),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }
}
