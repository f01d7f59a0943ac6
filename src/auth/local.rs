use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{AuthCallback, AuthIdentity, AuthProvider};
use crate::db::Subscription;
use crate::error::{MonitorError, MonitorResult};

struct Account {
    identity: AuthIdentity,
    password: String,
}

/// In-process account table for the CLI and tests. Credentials live only in
/// memory for the lifetime of the provider.
pub struct LocalAuthProvider {
    accounts: RwLock<HashMap<String, Account>>,
    state: watch::Sender<Option<AuthIdentity>>,
}

impl Default for LocalAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuthProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts: RwLock::new(HashMap::new()),
            state,
        }
    }

    pub fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> MonitorResult<AuthIdentity> {
        let key = email.trim().to_ascii_lowercase();
        if key.is_empty() || password.is_empty() {
            return Err(MonitorError::InvalidInput(
                "email and password are required".into(),
            ));
        }

        let mut accounts = match self.accounts.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if accounts.contains_key(&key) {
            return Err(MonitorError::InvalidInput(format!(
                "account {key} already exists"
            )));
        }

        let identity = AuthIdentity {
            uid: Uuid::new_v4().to_string(),
            email: Some(key.clone()),
            display_name: display_name.map(str::to_string),
        };
        accounts.insert(
            key,
            Account {
                identity: identity.clone(),
                password: password.to_string(),
            },
        );
        Ok(identity)
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> MonitorResult<AuthIdentity> {
        let key = email.trim().to_ascii_lowercase();
        let identity = {
            let accounts = match self.accounts.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match accounts.get(&key) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(MonitorError::Auth("invalid email or password".into())),
            }
        };

        log::info!("Signed in {}", identity.uid);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> MonitorResult<()> {
        if let Some(previous) = self.state.send_replace(None) {
            log::info!("Signed out {}", previous.uid);
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthIdentity> {
        self.state.borrow().clone()
    }

    fn on_auth_state_changed(&self, callback: AuthCallback) -> Subscription {
        let mut state_rx = self.state.subscribe();
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let initial = state_rx.borrow_and_update().clone();
            callback(initial);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = state_rx.borrow_and_update().clone();
                        callback(current);
                    }
                }
            }
        });

        Subscription::new(cancel_token, handle)
    }
}
