//! Identity provider boundary.
//!
//! The provider owns identities (email, privilege role, primary role, state,
//! password). This module defines the contract the service needs from it;
//! `kratos` speaks to a real Ory Kratos deployment and `in_memory` backs
//! tests and local development.

pub mod in_memory;
pub mod kratos;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use payd_auth::{IdentityState, Traits};
use payd_core::IdentityId;

pub use in_memory::InMemoryIdentityProvider;
pub use kratos::KratosClient;

/// Identity record as returned by the provider.
///
/// `traits` is left untyped here; callers run it through [`Traits::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderIdentity {
    pub id: IdentityId,
    pub state: IdentityState,
    pub traits: Value,
}

/// Handle of a started password login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFlow {
    pub id: String,
}

/// Identity provider failure.
///
/// `Status` keeps the HTTP status so callers can map the statuses they know
/// (409, 400, 404) and treat the rest as internal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("identity provider responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("identity provider unreachable: {0}")]
    Transport(String),

    #[error("unexpected identity provider payload: {0}")]
    Payload(String),
}

impl ProviderError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an identity; returns the provider-assigned id.
    async fn create_identity(
        &self,
        traits: &Traits,
        password: &str,
        state: IdentityState,
    ) -> Result<IdentityId, ProviderError>;

    async fn get_identity(&self, id: IdentityId) -> Result<ProviderIdentity, ProviderError>;

    /// Replace traits, password and state of an existing identity.
    async fn update_identity(
        &self,
        id: IdentityId,
        traits: &Traits,
        password: &str,
        state: IdentityState,
    ) -> Result<(), ProviderError>;

    async fn create_login_flow(&self) -> Result<LoginFlow, ProviderError>;

    /// Submit password credentials to a login flow; returns the session identity.
    async fn submit_login_flow(
        &self,
        flow: &LoginFlow,
        identifier: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    async fn create_identity(
        &self,
        traits: &Traits,
        password: &str,
        state: IdentityState,
    ) -> Result<IdentityId, ProviderError> {
        (**self).create_identity(traits, password, state).await
    }

    async fn get_identity(&self, id: IdentityId) -> Result<ProviderIdentity, ProviderError> {
        (**self).get_identity(id).await
    }

    async fn update_identity(
        &self,
        id: IdentityId,
        traits: &Traits,
        password: &str,
        state: IdentityState,
    ) -> Result<(), ProviderError> {
        (**self).update_identity(id, traits, password, state).await
    }

    async fn create_login_flow(&self) -> Result<LoginFlow, ProviderError> {
        (**self).create_login_flow().await
    }

    async fn submit_login_flow(
        &self,
        flow: &LoginFlow,
        identifier: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        (**self).submit_login_flow(flow, identifier, password).await
    }
}
