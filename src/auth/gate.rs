use std::sync::Arc;

use serde::Serialize;

use super::{AuthIdentity, AuthProvider};
use crate::db::models::{Role, UserProfile};
use crate::db::{Collection, Database};
use crate::error::{MonitorError, MonitorResult};

/// A signed-in identity joined with its `users` profile.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    pub identity: AuthIdentity,
    /// Missing until the user has picked a role.
    pub profile: Option<UserProfile>,
}

impl AppUser {
    pub fn uid(&self) -> &str {
        &self.identity.uid
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|profile| profile.role)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.full_name.as_deref())
            .or(self.identity.display_name.as_deref())
    }

    pub fn require(&self, role: Role) -> MonitorResult<()> {
        match self.role() {
            Some(actual) if actual == role => Ok(()),
            Some(actual) => Err(MonitorError::Auth(format!(
                "{} access required, signed in as {}",
                role.as_str(),
                actual.as_str()
            ))),
            None => Err(MonitorError::Auth("no role assigned to this account".into())),
        }
    }
}

#[derive(Clone)]
pub struct AuthGate {
    provider: Arc<dyn AuthProvider>,
    db: Database,
}

impl AuthGate {
    pub fn new(provider: Arc<dyn AuthProvider>, db: Database) -> Self {
        Self { provider, db }
    }

    pub fn provider(&self) -> &Arc<dyn AuthProvider> {
        &self.provider
    }

    /// Resolves the signed-in user, or `None` when nobody is signed in.
    pub async fn current(&self) -> MonitorResult<Option<AppUser>> {
        let Some(identity) = self.provider.current_user() else {
            return Ok(None);
        };
        let profile = self
            .db
            .get_as::<UserProfile>(Collection::Users, &identity.uid)
            .await?;
        Ok(Some(AppUser { identity, profile }))
    }

    /// First sign-in: stores the profile with the chosen role. An existing
    /// profile is kept as it is.
    pub async fn complete_sign_up(&self, role: Role) -> MonitorResult<AppUser> {
        let user = self
            .current()
            .await?
            .ok_or_else(|| MonitorError::Auth("not signed in".into()))?;
        if user.profile.is_some() {
            return Ok(user);
        }

        let profile = UserProfile {
            uid: user.identity.uid.clone(),
            email: user.identity.email.clone(),
            full_name: user.identity.display_name.clone(),
            role,
        };
        self.db
            .set(Collection::Users, &profile.uid, &profile, false)
            .await?;
        Ok(AppUser {
            identity: user.identity,
            profile: Some(profile),
        })
    }

    pub async fn require_role(&self, role: Role) -> MonitorResult<AppUser> {
        let user = self
            .current()
            .await?
            .ok_or_else(|| MonitorError::Auth("not signed in".into()))?;
        user.require(role)?;
        Ok(user)
    }
}
