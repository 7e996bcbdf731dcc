//! Scripted in-memory backend for tests
//!
//! `ScriptedCloud` acts as provider factory and service probe at once.
//! Tests flip fields of its `Script` to steer what the backend answers and
//! read back the lifecycle calls it received.

use crate::factory::ProviderFactory;
use async_trait::async_trait;
use simfleet_cloud::{
    AuthStatus, AwsSession, CloudError, CloudKind, CloudProvider, CloudSession, CloudSettings,
    Result, ServiceProbe, VagrantSession, ensure_matching,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Backend behavior and call log
#[derive(Debug)]
pub struct Script {
    pub accept_server_start: bool,
    pub accept_workers_start: bool,
    pub accept_terminate: bool,
    /// Delay inside `wait_for_server`
    pub server_delay: Duration,
    /// Delay inside `wait_for_terminated`
    pub terminate_delay: Duration,
    pub server_running: bool,
    pub workers_running: bool,
    pub authenticated: bool,
    /// Internet readings consumed before falling back to `internet`
    pub internet_readings: VecDeque<bool>,
    pub internet: bool,
    pub service_available: bool,
    /// Number of probes that fail before `service_available` applies
    pub service_available_after: u32,
    pub server_url: String,
    /// Leave the provider without a session after `wait_for_server`
    pub withhold_session: bool,
    calls: Vec<&'static str>,
    probes: u32,
    builds: u32,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            accept_server_start: true,
            accept_workers_start: true,
            accept_terminate: true,
            server_delay: Duration::ZERO,
            terminate_delay: Duration::ZERO,
            server_running: true,
            workers_running: true,
            authenticated: true,
            internet_readings: VecDeque::new(),
            internet: true,
            service_available: true,
            service_available_after: 0,
            server_url: "http://10.0.0.1:8080".to_string(),
            withhold_session: false,
            calls: Vec::new(),
            probes: 0,
            builds: 0,
        }
    }
}

/// Shared handle to a scripted backend
#[derive(Debug, Clone, Default)]
pub struct ScriptedCloud {
    script: Arc<Mutex<Script>>,
}

impl ScriptedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn factory(&self) -> Arc<dyn ProviderFactory> {
        Arc::new(self.clone())
    }

    pub fn probe(&self) -> Arc<dyn ServiceProbe> {
        Arc::new(self.clone())
    }

    /// Lifecycle calls received so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.script().calls.clone()
    }

    pub fn probe_count(&self) -> u32 {
        self.script().probes
    }

    /// Providers built by the factory so far
    pub fn builds(&self) -> u32 {
        self.script().builds
    }

    pub fn server_url(&self) -> String {
        self.script().server_url.clone()
    }

    /// Session the scripted backend hands out for `kind`
    pub fn session_for(&self, kind: CloudKind) -> CloudSession {
        let server_url = Some(self.server_url());
        match kind {
            CloudKind::ManagedCloud => CloudSession::ManagedCloud(AwsSession {
                server_id: Some("i-scripted".to_string()),
                server_url,
                ..Default::default()
            }),
            CloudKind::LocalVirtualized => CloudSession::LocalVirtualized(VagrantSession {
                server_url,
                worker_urls: Vec::new(),
            }),
        }
    }

    fn record(&self, call: &'static str) {
        self.script().calls.push(call);
    }
}

impl ProviderFactory for ScriptedCloud {
    fn build(
        &self,
        settings: &CloudSettings,
        session: Option<&CloudSession>,
    ) -> Result<Box<dyn CloudProvider>> {
        ensure_matching(settings, session)?;
        self.script().builds += 1;
        Ok(Box::new(ScriptedProvider {
            cloud: self.clone(),
            settings: settings.clone(),
            session: session.cloned(),
        }))
    }
}

#[async_trait]
impl ServiceProbe for ScriptedCloud {
    async fn service_available(&self, _url: &str) -> bool {
        let mut script = self.script();
        script.probes += 1;
        script.probes > script.service_available_after && script.service_available
    }
}

/// Provider handed out by `ScriptedCloud`
#[derive(Debug)]
pub struct ScriptedProvider {
    cloud: ScriptedCloud,
    settings: CloudSettings,
    session: Option<CloudSession>,
}

#[async_trait]
impl CloudProvider for ScriptedProvider {
    fn kind(&self) -> CloudKind {
        self.settings.kind()
    }

    fn settings(&self) -> CloudSettings {
        self.settings.clone()
    }

    fn session(&self) -> Option<CloudSession> {
        self.session.clone()
    }

    async fn request_start_server(&mut self) -> Result<bool> {
        self.cloud.record("request_start_server");
        Ok(self.cloud.script().accept_server_start)
    }

    async fn wait_for_server(&mut self) -> Result<()> {
        self.cloud.record("wait_for_server");
        let delay = self.cloud.script().server_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let withhold = {
            let mut script = self.cloud.script();
            script.server_running = true;
            script.withhold_session
        };
        if !withhold {
            self.session = Some(self.cloud.session_for(self.settings.kind()));
        }
        Ok(())
    }

    async fn request_start_workers(&mut self) -> Result<bool> {
        self.cloud.record("request_start_workers");
        Ok(self.cloud.script().accept_workers_start)
    }

    async fn wait_for_workers(&mut self) -> Result<()> {
        self.cloud.record("wait_for_workers");
        if !self.cloud.script().server_running {
            return Err(CloudError::ApiError("workers without coordinator".to_string()));
        }
        self.cloud.script().workers_running = true;
        Ok(())
    }

    async fn request_terminate(&mut self) -> Result<bool> {
        self.cloud.record("request_terminate");
        Ok(self.cloud.script().accept_terminate)
    }

    async fn wait_for_terminated(&mut self) -> Result<()> {
        self.cloud.record("wait_for_terminated");
        let delay = self.cloud.script().terminate_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.cloud.script();
        script.server_running = false;
        script.workers_running = false;
        Ok(())
    }

    async fn server_running(&self) -> Result<bool> {
        Ok(self.cloud.script().server_running)
    }

    async fn workers_running(&self) -> Result<bool> {
        Ok(self.cloud.script().workers_running)
    }

    async fn internet_available(&self) -> bool {
        let mut script = self.cloud.script();
        let fallback = script.internet;
        script.internet_readings.pop_front().unwrap_or(fallback)
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        if self.cloud.script().authenticated {
            Ok(AuthStatus::ok("scripted"))
        } else {
            Ok(AuthStatus::failed("scripted credentials rejected"))
        }
    }
}
