use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use payd_auth::{IdentityState, Traits};
use payd_core::IdentityId;

use super::{IdentityProvider, LoginFlow, ProviderError, ProviderIdentity};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct IdentityRecord {
    state: IdentityState,
    traits: Value,
    email: String,
    password: String,
}

/// In-memory identity provider.
///
/// Intended for tests/dev. Mirrors the statuses a Kratos deployment returns
/// for the cases the service maps (409, 400, 404), and can be told to fail
/// the next create/update call with an arbitrary status.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    identities: RwLock<HashMap<IdentityId, IdentityRecord>>,
    flows: Mutex<u64>,
    fail_next_create: Mutex<Option<u16>>,
    fail_next_update: Mutex<Option<u16>>,
    update_calls: AtomicUsize,
    login_calls: AtomicUsize,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_identity` call fail with `status`.
    pub fn fail_next_create(&self, status: u16) {
        *lock(&self.fail_next_create) = Some(status);
    }

    /// Make the next `update_identity` call fail with `status`.
    pub fn fail_next_update(&self, status: u16) {
        *lock(&self.fail_next_update) = Some(status);
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Raw traits currently stored for `id`.
    pub fn traits_of(&self, id: IdentityId) -> Option<Value> {
        self.read().get(&id).map(|r| r.traits.clone())
    }

    pub fn state_of(&self, id: IdentityId) -> Option<IdentityState> {
        self.read().get(&id).map(|r| r.state)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<IdentityId, IdentityRecord>> {
        self.identities.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<IdentityId, IdentityRecord>> {
        self.identities.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn take_injected(slot: &Mutex<Option<u16>>) -> Result<(), ProviderError> {
    match lock(slot).take() {
        Some(status) => Err(ProviderError::status(status, "injected failure")),
        None => Ok(()),
    }
}

// Same shape check the provider's identity schema applies to the `email` trait.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_identity(
        &self,
        traits: &Traits,
        password: &str,
        state: IdentityState,
    ) -> Result<IdentityId, ProviderError> {
        take_injected(&self.fail_next_create)?;

        if !looks_like_email(&traits.email) {
            return Err(ProviderError::status(400, format!("\"{}\" is not valid \"email\"", traits.email)));
        }

        let mut identities = self.write();
        if identities.values().any(|r| r.email == traits.email) {
            return Err(ProviderError::status(409, "an identity with the same identifier already exists"));
        }

        let id = IdentityId::new();
        identities.insert(
            id,
            IdentityRecord {
                state,
                traits: traits.to_json(),
                email: traits.email.clone(),
                password: password.to_string(),
            },
        );
        Ok(id)
    }

    async fn get_identity(&self, id: IdentityId) -> Result<ProviderIdentity, ProviderError> {
        let identities = self.read();
        let record = identities
            .get(&id)
            .ok_or_else(|| ProviderError::status(404, "identity not found"))?;
        Ok(ProviderIdentity {
            id,
            state: record.state,
            traits: record.traits.clone(),
        })
    }

    async fn update_identity(
        &self,
        id: IdentityId,
        traits: &Traits,
        password: &str,
        state: IdentityState,
    ) -> Result<(), ProviderError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        take_injected(&self.fail_next_update)?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProviderError::status(400, "password does not meet the policy"));
        }

        let mut identities = self.write();
        let record = identities
            .get_mut(&id)
            .ok_or_else(|| ProviderError::status(404, "identity not found"))?;
        record.state = state;
        record.traits = traits.to_json();
        record.email = traits.email.clone();
        record.password = password.to_string();
        Ok(())
    }

    async fn create_login_flow(&self) -> Result<LoginFlow, ProviderError> {
        let mut counter = lock(&self.flows);
        *counter += 1;
        Ok(LoginFlow {
            id: format!("flow-{}", *counter),
        })
    }

    async fn submit_login_flow(
        &self,
        _flow: &LoginFlow,
        identifier: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);

        let identities = self.read();
        identities
            .iter()
            .find(|(_, r)| r.email == identifier && r.password == password)
            .map(|(id, r)| ProviderIdentity {
                id: *id,
                state: r.state,
                traits: r.traits.clone(),
            })
            .ok_or_else(|| ProviderError::status(400, "the provided credentials are invalid"))
    }
}
