//! Provider factory
//!
//! Providers are never persisted; every operation that needs the backend
//! builds a fresh one from the settings/session pair.

use simfleet_cloud::{CloudProvider, CloudSession, CloudSettings, Result, ensure_matching};
use simfleet_cloud_aws::AwsProvider;
use simfleet_cloud_vagrant::VagrantProvider;

/// Builds providers bound to a settings value and an optional session
pub trait ProviderFactory: Send + Sync {
    /// Fails with `CloudError::KindMismatch` when the session belongs to
    /// another backend than the settings.
    fn build(
        &self,
        settings: &CloudSettings,
        session: Option<&CloudSession>,
    ) -> Result<Box<dyn CloudProvider>>;
}

/// Factory over the real backends
#[derive(Debug, Clone, Default)]
pub struct BackendFactory;

impl ProviderFactory for BackendFactory {
    fn build(
        &self,
        settings: &CloudSettings,
        session: Option<&CloudSession>,
    ) -> Result<Box<dyn CloudProvider>> {
        if let Err(e) = ensure_matching(settings, session) {
            tracing::error!(error = %e, "Refusing to build provider");
            return Err(e);
        }

        let provider: Box<dyn CloudProvider> = match (settings, session) {
            (CloudSettings::ManagedCloud(s), Some(CloudSession::ManagedCloud(session))) => {
                Box::new(AwsProvider::with_session(s.clone(), session.clone()))
            }
            (CloudSettings::ManagedCloud(s), _) => Box::new(AwsProvider::new(s.clone())),
            (CloudSettings::LocalVirtualized(s), Some(CloudSession::LocalVirtualized(session))) => {
                Box::new(VagrantProvider::with_session(s.clone(), session.clone()))
            }
            (CloudSettings::LocalVirtualized(s), _) => Box::new(VagrantProvider::new(s.clone())),
        };

        tracing::debug!(kind = %provider.kind(), bound = session.is_some(), "Built provider");
        Ok(provider)
    }
}
