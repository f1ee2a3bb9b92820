//! Identity collaborator.
//!
//! Flows never depend on who is signed in; they only get a read-only
//! [`AuthState`]. The provider is the single writer of that state.

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{FlowError, Result};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const SUPPORTED_PROVIDERS: &[&str] = &["google"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Identity asserted by a federated provider after its own sign-in flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FederatedIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Read-only view of the signed-in user, updated by the provider only
#[derive(Debug, Clone)]
pub struct AuthState {
    rx: watch::Receiver<Option<AuthUser>>,
}

impl AuthState {
    pub fn current(&self) -> Option<AuthUser> {
        self.rx.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the next sign-in / sign-out and return the new user
    pub async fn changed(&mut self) -> Option<AuthUser> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        self.rx.borrow_and_update().clone()
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_provider(
        &self,
        provider: &str,
        identity: FederatedIdentity,
    ) -> Result<AuthUser>;

    async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<AuthUser>;

    async fn sign_up_with_email(&self, email: &str, password: &str) -> Result<AuthUser>;

    async fn sign_out(&self) -> Result<()>;

    async fn current_user(&self) -> Option<AuthUser>;

    fn subscribe(&self) -> AuthState;
}

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    credential: Option<Credential>,
}

#[derive(Debug, Clone)]
struct Credential {
    salt: [u8; 16],
    digest: blake3::Hash,
}

impl Credential {
    fn new(password: &str) -> Self {
        let salt = *Uuid::new_v4().as_bytes();
        Self {
            salt,
            digest: Self::digest(&salt, password),
        }
    }

    fn digest(salt: &[u8; 16], password: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize()
    }

    fn verify(&self, password: &str) -> bool {
        // blake3::Hash equality is constant time
        Self::digest(&self.salt, password) == self.digest
    }
}

/// Accounts known to the in-memory provider, shared by every signed-in client
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Arc<DashMap<String, Account>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// In-process stand-in for the hosted identity service.
///
/// One provider tracks one client's sign-in state; the account registry behind
/// it can be shared.
///
/// Passwords get a single salted pass of blake3, a fast hash. Not meant for
/// real credentials; use it for local runs and tests.
#[derive(Debug)]
pub struct InMemoryAuthProvider {
    registry: AccountRegistry,
    state: watch::Sender<Option<AuthUser>>,
}

impl InMemoryAuthProvider {
    pub fn new(registry: AccountRegistry) -> Self {
        let (state, _) = watch::channel(None);
        Self { registry, state }
    }

    fn normalize_email(email: &str) -> Result<String> {
        let email = email.trim().to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
            _ => Err(FlowError::AuthFailure(format!("invalid email: {email}"))),
        }
    }

    fn publish(&self, user: Option<AuthUser>) {
        self.state.send_replace(user);
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_in_with_provider(
        &self,
        provider: &str,
        identity: FederatedIdentity,
    ) -> Result<AuthUser> {
        if !SUPPORTED_PROVIDERS.contains(&provider) {
            warn!(provider = %provider, "Unsupported identity provider");
            return Err(FlowError::AuthFailure(format!(
                "unsupported provider: {provider}"
            )));
        }
        if identity.subject.trim().is_empty() {
            return Err(FlowError::AuthFailure("missing subject".to_string()));
        }

        let key = format!("{provider}:{}", identity.subject);
        let user = self
            .registry
            .accounts
            .entry(key)
            .or_insert_with(|| Account {
                user: AuthUser {
                    id: Uuid::new_v4().to_string(),
                    email: identity.email.clone(),
                    name: identity.name.clone(),
                    avatar_url: identity.avatar_url.clone(),
                },
                credential: None,
            })
            .user
            .clone();

        info!(user_id = %user.id, provider = %provider, "Signed in with provider");
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = Self::normalize_email(email)?;
        let user = self
            .registry
            .accounts
            .get(&email)
            .filter(|account| {
                account
                    .credential
                    .as_ref()
                    .is_some_and(|credential| credential.verify(password))
            })
            .map(|account| account.user.clone())
            .ok_or_else(|| FlowError::AuthFailure("wrong email or password".to_string()))?;

        info!(user_id = %user.id, "Signed in with email");
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up_with_email(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = Self::normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FlowError::AuthFailure(format!(
                "password must have at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.clone()),
            name: None,
            avatar_url: None,
        };
        match self.registry.accounts.entry(email) {
            Entry::Occupied(_) => {
                return Err(FlowError::AuthFailure("account already exists".to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(Account {
                    user: user.clone(),
                    credential: Some(Credential::new(password)),
                });
            }
        }

        // signing up leaves the client signed out
        info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(user) = self.state.borrow().as_ref() {
            info!(user_id = %user.id, "Signed out");
        }
        self.publish(None);
        Ok(())
    }

    async fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> AuthState {
        AuthState {
            rx: self.state.subscribe(),
        }
    }
}
