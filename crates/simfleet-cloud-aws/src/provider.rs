//! EC2 provider implementation

use crate::ec2::{Ec2Cli, InstanceInfo, RunInstancesConfig};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use simfleet_cloud::{
    AuthStatus, AwsSession, AwsSettings, CloudKind, CloudProvider, CloudSession, CloudSettings,
    HttpServiceProbe,
};
use std::time::Duration;

/// Managed-cloud provider
pub struct AwsProvider {
    ec2: Ec2Cli,
    settings: AwsSettings,
    session: AwsSession,
    probe: HttpServiceProbe,
}

impl AwsProvider {
    pub fn new(settings: AwsSettings) -> Self {
        Self {
            ec2: Ec2Cli::new(&settings.region),
            settings,
            session: AwsSession::default(),
            probe: HttpServiceProbe::default(),
        }
    }

    /// Bind to an existing cluster
    pub fn with_session(settings: AwsSettings, session: AwsSession) -> Self {
        Self {
            session,
            ..Self::new(settings)
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings.poll_interval_secs.max(1))
    }

    fn launch_config(&self, role: &str, instance_type: &str, count: u32) -> RunInstancesConfig {
        RunInstancesConfig {
            cluster_name: self.settings.cluster_name.clone(),
            role: role.to_string(),
            image_id: self.settings.ami.clone(),
            instance_type: instance_type.to_string(),
            count,
            key_name: self.settings.key_name.clone(),
            security_group: self.settings.security_group.clone(),
        }
    }

    fn all_instance_ids(&self) -> Vec<String> {
        self.session
            .server_id
            .iter()
            .chain(self.session.worker_ids.iter())
            .cloned()
            .collect()
    }

    /// Poll until every instance is running, then return them
    async fn wait_until_running(&self, ids: &[String]) -> Result<Vec<InstanceInfo>> {
        loop {
            let instances = self.ec2.describe_instances(ids).await?;

            if let Some(failed) = instances.iter().find(|i| i.is_failed_start()) {
                return Err(AwsError::UnexpectedState {
                    id: failed.instance_id.clone(),
                    state: failed.state.name.clone(),
                });
            }

            // IDs not yet visible to describe-instances stay pending
            let ready = instances.len() == ids.len()
                && instances
                    .iter()
                    .all(|i| i.is_running() && i.public_host().is_some());
            if ready {
                return Ok(instances);
            }

            tracing::debug!(pending = ids.len(), "Waiting for instances to run");
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    async fn all_running(&self, ids: &[String]) -> Result<bool> {
        let instances = self.ec2.describe_instances(ids).await?;
        Ok(instances.len() == ids.len() && instances.iter().all(InstanceInfo::is_running))
    }
}

#[async_trait]
impl CloudProvider for AwsProvider {
    fn kind(&self) -> CloudKind {
        CloudKind::ManagedCloud
    }

    fn settings(&self) -> CloudSettings {
        CloudSettings::ManagedCloud(self.settings.clone())
    }

    fn session(&self) -> Option<CloudSession> {
        if self.session == AwsSession::default() {
            None
        } else {
            Some(CloudSession::ManagedCloud(self.session.clone()))
        }
    }

    async fn request_start_server(&mut self) -> simfleet_cloud::Result<bool> {
        if self.session.server_id.is_some() {
            tracing::warn!("Coordinator already requested");
            return Ok(false);
        }

        let config = self.launch_config("server", &self.settings.server_instance_type, 1);
        let launched = self.ec2.run_instances(&config).await?;
        let server = launched
            .into_iter()
            .next()
            .ok_or_else(|| AwsError::CommandFailed("run-instances returned nothing".to_string()))?;

        tracing::info!(instance = %server.instance_id, "Coordinator instance launched");
        self.session.server_id = Some(server.instance_id);
        Ok(true)
    }

    async fn wait_for_server(&mut self) -> simfleet_cloud::Result<()> {
        let id = self
            .session
            .server_id
            .clone()
            .ok_or_else(|| AwsError::InstanceNotFound("coordinator".to_string()))?;

        let instances = self.wait_until_running(std::slice::from_ref(&id)).await?;
        let host = instances
            .first()
            .and_then(InstanceInfo::public_host)
            .ok_or_else(|| AwsError::InstanceNotFound(id.clone()))?;

        self.session.server_url = Some(format!("http://{}:{}", host, self.settings.service_port));
        tracing::info!(instance = %id, url = ?self.session.server_url, "Coordinator running");
        Ok(())
    }

    async fn request_start_workers(&mut self) -> simfleet_cloud::Result<bool> {
        if !self.session.worker_ids.is_empty() {
            tracing::warn!("Worker pool already requested");
            return Ok(false);
        }
        if self.settings.worker_count == 0 {
            return Ok(true);
        }

        let config = self.launch_config(
            "worker",
            &self.settings.worker_instance_type,
            self.settings.worker_count,
        );
        let launched = self.ec2.run_instances(&config).await?;

        tracing::info!(count = launched.len(), "Worker instances launched");
        self.session.worker_ids = launched.into_iter().map(|i| i.instance_id).collect();
        Ok(true)
    }

    async fn wait_for_workers(&mut self) -> simfleet_cloud::Result<()> {
        let ids = self.session.worker_ids.clone();
        let instances = self.wait_until_running(&ids).await?;

        self.session.worker_urls = instances
            .iter()
            .filter_map(InstanceInfo::public_host)
            .map(|host| format!("http://{}", host))
            .collect();
        tracing::info!(count = ids.len(), "Worker pool running");
        Ok(())
    }

    async fn request_terminate(&mut self) -> simfleet_cloud::Result<bool> {
        let ids = self.all_instance_ids();
        self.ec2.terminate_instances(&ids).await?;
        tracing::info!(count = ids.len(), "Termination requested");
        Ok(true)
    }

    async fn wait_for_terminated(&mut self) -> simfleet_cloud::Result<()> {
        let ids = self.all_instance_ids();

        loop {
            // Forgotten IDs come back as an empty list and count as terminated
            let instances = self.ec2.describe_instances(&ids).await?;
            if instances.iter().all(InstanceInfo::is_terminated) {
                break;
            }
            tracing::debug!("Waiting for instances to terminate");
            tokio::time::sleep(self.poll_interval()).await;
        }

        self.session = AwsSession::default();
        Ok(())
    }

    async fn server_running(&self) -> simfleet_cloud::Result<bool> {
        match &self.session.server_id {
            Some(id) => Ok(self.all_running(std::slice::from_ref(id)).await?),
            None => Ok(false),
        }
    }

    async fn workers_running(&self) -> simfleet_cloud::Result<bool> {
        if self.session.worker_ids.is_empty() {
            return Ok(self.settings.worker_count == 0);
        }
        Ok(self.all_running(&self.session.worker_ids).await?)
    }

    async fn internet_available(&self) -> bool {
        self.probe.reachable(&self.settings.internet_check_url).await
    }

    async fn check_auth(&self) -> simfleet_cloud::Result<AuthStatus> {
        match self.ec2.caller_identity().await {
            Ok(identity) => Ok(AuthStatus::ok(format!(
                "{} ({})",
                identity.arn, identity.account
            ))),
            Err(AwsError::AwsCliNotFound) => Ok(AuthStatus::failed("aws CLI is not installed")),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }
}
