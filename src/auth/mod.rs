//! Sign-in state and role resolution.

pub mod gate;
pub mod local;

pub use gate::{AppUser, AuthGate};
pub use local::LocalAuthProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::Subscription;
use crate::error::MonitorResult;

/// The signed-in account as the identity provider knows it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

pub type AuthCallback = Box<dyn Fn(Option<AuthIdentity>) + Send + Sync + 'static>;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> MonitorResult<AuthIdentity>;

    async fn sign_out(&self) -> MonitorResult<()>;

    fn current_user(&self) -> Option<AuthIdentity>;

    /// Calls `callback` with the current state right away and again on every
    /// sign-in or sign-out until the subscription ends.
    fn on_auth_state_changed(&self, callback: AuthCallback) -> Subscription;
}
