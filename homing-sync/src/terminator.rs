use std::sync::Arc;

use homing_common::IdentityProvider;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignOutOutcome {
    /// The provider accepted the request; the identity clears once the provider reports it.
    Requested,
    Failed,
}

/// Asks the identity provider to end the session. It never clears the identity itself.
#[derive(Clone)]
pub struct SessionTerminator {
    provider: Arc<dyn IdentityProvider>,
}

impl SessionTerminator {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    pub async fn sign_out(&self) -> SignOutOutcome {
        match self.provider.sign_out().await {
            Ok(()) => {
                tracing::info!("user signed out");
                SignOutOutcome::Requested
            }
            Err(error) => {
                tracing::error!(%error, "sign out failed");
                SignOutOutcome::Failed
            }
        }
    }
}
