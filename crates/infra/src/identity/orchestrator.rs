use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use payd_auth::{
    Identity, IdentityState, PrivilegeRole, Role, SessionIdentity, SessionTokenCodec, Traits,
    TraitsError,
};
use payd_core::{EmployeeId, IdentityId, RoleId};

use super::{IdentityError, IdentityService, RegisterRequest};
use crate::provider::{IdentityProvider, ProviderError, ProviderIdentity};
use crate::role_cache::RoleCatalog;
use crate::store::{EmployeeStatus, EmployeeStore, NewEmployee, StoreError, TxHandle};

/// Credential set on freshly registered identities; replaced at activation.
pub const PLACEHOLDER_CREDENTIAL: &str = "123456";

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(900);

/// Primary role recorded for admins, who have no responsibility-tier role.
const ADMIN_PRIMARY_ROLE: RoleId = RoleId::new(0);

/// Coordinates the identity provider, the employee store, the role catalog
/// and the session codec.
///
/// Every operation runs to completion on the caller's task with no internal
/// timeout; callers bound them by dropping the future.
pub struct IdentityOrchestrator<P, S> {
    provider: P,
    store: S,
    roles: Arc<dyn RoleCatalog>,
    codec: SessionTokenCodec,
    session_ttl: Duration,
}

impl<P, S> core::fmt::Debug for IdentityOrchestrator<P, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityOrchestrator")
            .field("codec", &self.codec)
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

impl<P, S> IdentityOrchestrator<P, S>
where
    P: IdentityProvider,
    S: EmployeeStore,
{
    pub fn new(provider: P, store: S, roles: Arc<dyn RoleCatalog>, codec: SessionTokenCodec) -> Self {
        Self {
            provider,
            store,
            roles,
            codec,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Check a registration request against the current role snapshot and
    /// return the primary role to record.
    pub fn validate_registration(&self, request: &RegisterRequest) -> Result<RoleId, IdentityError> {
        match (request.is_admin, request.primary_role) {
            (true, Some(_)) => Err(IdentityError::Validation(
                "primary_role must not be set for admins".to_string(),
            )),
            (true, None) => Ok(ADMIN_PRIMARY_ROLE),
            (false, None) => Err(IdentityError::Validation(
                "primary_role is required for employees".to_string(),
            )),
            (false, Some(id)) if !self.roles.contains(id) => Err(IdentityError::UnknownRole(id)),
            (false, Some(id)) => Ok(id),
        }
    }

    /// Register an inactive identity holding the placeholder credential.
    #[instrument(skip(self, request), fields(email = %request.email, is_admin = request.is_admin))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<IdentityId, IdentityError> {
        let primary_role = self.validate_registration(request)?;
        let traits = Traits::registration(
            request.email.clone(),
            PrivilegeRole::from_admin_flag(request.is_admin),
            primary_role,
        );

        let id = self
            .provider
            .create_identity(&traits, PLACEHOLDER_CREDENTIAL, IdentityState::Inactive)
            .await
            .map_err(|err| match err.status_code() {
                Some(409) => IdentityError::AlreadyExists,
                Some(400) => IdentityError::InvalidEmail,
                _ => provider_failure("create_identity", err),
            })?;

        info!(identity_id = %id, "identity registered");
        Ok(id)
    }

    /// Pre-activation lookup. An identity that is already active is
    /// reported as [`IdentityError::AlreadyExists`].
    #[instrument(skip(self))]
    pub async fn get_identity(&self, id: IdentityId) -> Result<Identity, IdentityError> {
        let remote = self.load_identity(id).await?;
        if remote.state == IdentityState::Active {
            return Err(IdentityError::AlreadyExists);
        }
        parse_identity(remote)
    }

    /// Lookup in any state.
    pub async fn fetch_identity(&self, id: IdentityId) -> Result<Identity, IdentityError> {
        parse_identity(self.load_identity(id).await?)
    }

    async fn load_identity(&self, id: IdentityId) -> Result<ProviderIdentity, IdentityError> {
        self.provider
            .get_identity(id)
            .await
            .map_err(|err| match err.status_code() {
                Some(404) => IdentityError::NotFound,
                _ => provider_failure("get_identity", err),
            })
    }

    /// Create the employee row and activate the identity.
    ///
    /// The local transaction stays open across the provider update and is
    /// committed only if the update succeeds. If the commit itself fails
    /// after the provider accepted the update the two systems disagree; that
    /// case is logged with both ids and reported as an internal error.
    #[instrument(skip(self, name, password), fields(identity_id = %id))]
    pub async fn activate(
        &self,
        id: IdentityId,
        name: &str,
        password: &str,
    ) -> Result<EmployeeId, IdentityError> {
        let identity = self.get_identity(id).await?;

        let mut tx = self
            .store
            .begin_transaction()
            .await
            .map_err(|e| store_failure("begin_transaction", e))?;

        match self.link_employee(&mut tx, &identity, name, password).await {
            Ok(employee_id) => {
                if let Err(err) = self.store.commit(&mut tx).await {
                    error!(
                        identity_id = %id,
                        employee_id = %employee_id,
                        error = %err,
                        "identity is active in the provider but the employee row was not committed"
                    );
                    return Err(IdentityError::Store(err));
                }
                info!(employee_id = %employee_id, "identity activated");
                Ok(employee_id)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback(&mut tx).await {
                    warn!(error = %rollback_err, "rollback after failed activation failed");
                }
                Err(err)
            }
        }
    }

    async fn link_employee(
        &self,
        tx: &mut TxHandle<S::Tx>,
        identity: &Identity,
        name: &str,
        password: &str,
    ) -> Result<EmployeeId, IdentityError> {
        let employee = NewEmployee {
            name: name.to_string(),
            status: EmployeeStatus::Active,
            role_id: identity.primary_role,
        };
        let employee_id = self
            .store
            .create_employee(tx, &employee)
            .await
            .map_err(|e| store_failure("create_employee", e))?;

        let traits = identity.traits().with_employee(employee_id);
        self.provider
            .update_identity(identity.id, &traits, password, IdentityState::Active)
            .await
            .map_err(|err| match err.status_code() {
                Some(400) => IdentityError::InvalidPassword,
                _ => provider_failure("update_identity", err),
            })?;

        Ok(employee_id)
    }

    /// Password login. The identity must be active and linked to an
    /// employee row; the result carries the row's name and primary role.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, IdentityError> {
        let flow = self
            .provider
            .create_login_flow()
            .await
            .map_err(|e| provider_failure("create_login_flow", e))?;

        let session = self
            .provider
            .submit_login_flow(&flow, username, password)
            .await
            .map_err(|err| match err.status_code() {
                Some(400) => IdentityError::InvalidCredential,
                _ => provider_failure("submit_login_flow", err),
            })?;

        if session.state != IdentityState::Active {
            return Err(IdentityError::NotYetActivatingAccount);
        }

        let traits = Traits::parse(&session.traits).map_err(|e| malformed_traits(session.id, e))?;
        let employee_id = traits
            .require_employee_id()
            .map_err(|e| malformed_traits(session.id, e))?;

        let employee = self
            .store
            .select_employee_by_id(employee_id)
            .await
            .map_err(|e| store_failure("select_employee_by_id", e))?;

        Ok(Identity {
            id: session.id,
            email: traits.email,
            role: traits.role,
            primary_role: employee.primary_role,
            state: IdentityState::Active,
            employee_id: Some(employee.id),
            employee_name: Some(employee.name),
        })
    }

    pub fn issue_session(&self, identity: &Identity) -> Result<String, IdentityError> {
        self.codec
            .issue(identity, self.session_ttl)
            .map_err(IdentityError::from)
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionIdentity, IdentityError> {
        self.codec.verify(token).map_err(IdentityError::from)
    }

    /// Register and activate an admin account unless one with this email
    /// already exists. Returns the new employee id, or `None` when skipped.
    #[instrument(skip(self, name, password))]
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Option<EmployeeId>, IdentityError> {
        let id = match self.register(&RegisterRequest::admin(email)).await {
            Ok(id) => id,
            Err(IdentityError::AlreadyExists) => {
                info!("admin account already exists; skipping bootstrap");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.activate(id, name, password).await.map(Some)
    }
}

#[async_trait]
impl<P, S> IdentityService for IdentityOrchestrator<P, S>
where
    P: IdentityProvider + 'static,
    S: EmployeeStore + 'static,
{
    async fn register(&self, request: RegisterRequest) -> Result<IdentityId, IdentityError> {
        IdentityOrchestrator::register(self, &request).await
    }

    async fn activate(
        &self,
        id: IdentityId,
        name: &str,
        password: &str,
    ) -> Result<EmployeeId, IdentityError> {
        IdentityOrchestrator::activate(self, id, name, password).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<Identity, IdentityError> {
        IdentityOrchestrator::login(self, username, password).await
    }

    fn issue_session(&self, identity: &Identity) -> Result<String, IdentityError> {
        IdentityOrchestrator::issue_session(self, identity)
    }

    fn verify_session(&self, token: &str) -> Result<SessionIdentity, IdentityError> {
        IdentityOrchestrator::verify_session(self, token)
    }

    fn roles(&self) -> Vec<Role> {
        self.roles.roles()
    }
}

fn parse_identity(remote: ProviderIdentity) -> Result<Identity, IdentityError> {
    let traits = Traits::parse(&remote.traits).map_err(|e| malformed_traits(remote.id, e))?;
    Ok(Identity::from_traits(remote.id, remote.state, traits))
}

fn provider_failure(operation: &'static str, err: ProviderError) -> IdentityError {
    error!(operation, error = %err, "unhandled identity provider failure");
    IdentityError::Internal(format!("{operation}: {err}"))
}

fn store_failure(operation: &'static str, err: StoreError) -> IdentityError {
    error!(operation, error = %err, "employee store failure");
    IdentityError::Store(err)
}

fn malformed_traits(id: IdentityId, err: TraitsError) -> IdentityError {
    error!(identity_id = %id, error = %err, "identity provider returned malformed traits");
    IdentityError::Internal(format!("malformed traits for identity {id}: {err}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::provider::InMemoryIdentityProvider;
    use crate::store::InMemoryStore;

    type Orchestrator = IdentityOrchestrator<Arc<InMemoryIdentityProvider>, Arc<InMemoryStore>>;

    fn setup() -> (Orchestrator, Arc<InMemoryIdentityProvider>, Arc<InMemoryStore>) {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryStore::new());
        let roles: Arc<dyn RoleCatalog> = Arc::new(vec![Role::new(1, "Cashier"), Role::new(2, "Cook")]);
        let codec = SessionTokenCodec::new(b"orchestrator-test").unwrap();
        let orchestrator =
            IdentityOrchestrator::new(Arc::clone(&provider), Arc::clone(&store), roles, codec);
        (orchestrator, provider, store)
    }

    #[test]
    fn registration_rules() {
        let (orchestrator, _, _) = setup();

        assert_eq!(
            orchestrator.validate_registration(&RegisterRequest::admin("a@b.com")),
            Ok(RoleId::new(0))
        );
        assert_eq!(
            orchestrator.validate_registration(&RegisterRequest::employee("a@b.com", RoleId::new(2))),
            Ok(RoleId::new(2))
        );
        assert_eq!(
            orchestrator.validate_registration(&RegisterRequest::employee("a@b.com", RoleId::new(9))),
            Err(IdentityError::UnknownRole(RoleId::new(9)))
        );

        let admin_with_role = RegisterRequest {
            primary_role: Some(RoleId::new(1)),
            ..RegisterRequest::admin("a@b.com")
        };
        assert!(matches!(
            orchestrator.validate_registration(&admin_with_role),
            Err(IdentityError::Validation(_))
        ));

        let employee_without_role = RegisterRequest {
            is_admin: false,
            ..RegisterRequest::admin("a@b.com")
        };
        assert!(matches!(
            orchestrator.validate_registration(&employee_without_role),
            Err(IdentityError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn register_maps_provider_statuses() {
        let (orchestrator, provider, _) = setup();
        let request = RegisterRequest::employee("a@b.com", RoleId::new(1));

        let id = orchestrator.register(&request).await.unwrap();
        assert_eq!(provider.state_of(id), Some(IdentityState::Inactive));
        assert_eq!(
            provider.traits_of(id),
            Some(json!({ "email": "a@b.com", "role": "employee", "primary_role": 1 }))
        );

        assert_eq!(orchestrator.register(&request).await, Err(IdentityError::AlreadyExists));
        assert_eq!(
            orchestrator
                .register(&RegisterRequest::employee("nope", RoleId::new(1)))
                .await,
            Err(IdentityError::InvalidEmail)
        );

        provider.fail_next_create(502);
        assert!(matches!(
            orchestrator
                .register(&RegisterRequest::employee("c@d.com", RoleId::new(1)))
                .await,
            Err(IdentityError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn unknown_role_never_reaches_the_provider() {
        let (orchestrator, _, _) = setup();
        let err = orchestrator
            .register(&RegisterRequest::employee("a@b.com", RoleId::new(42)))
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::UnknownRole(RoleId::new(42)));

        // The email is still free.
        assert!(
            orchestrator
                .register(&RegisterRequest::employee("a@b.com", RoleId::new(1)))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn get_identity_reports_missing_and_active_identities() {
        let (orchestrator, _, _) = setup();
        assert_eq!(
            orchestrator.get_identity(IdentityId::new()).await,
            Err(IdentityError::NotFound)
        );

        let id = orchestrator.register(&RegisterRequest::admin("a@b.com")).await.unwrap();
        let identity = orchestrator.get_identity(id).await.unwrap();
        assert_eq!(identity.state, IdentityState::Inactive);
        assert_eq!(identity.role, PrivilegeRole::Admin);

        orchestrator.activate(id, "Alice", "secret123").await.unwrap();
        assert_eq!(orchestrator.get_identity(id).await, Err(IdentityError::AlreadyExists));
        assert_eq!(
            orchestrator.activate(id, "Alice", "secret123").await,
            Err(IdentityError::AlreadyExists)
        );
    }

    #[tokio::test]
    async fn activation_rolls_back_when_the_row_cannot_be_written() {
        let (orchestrator, provider, store) = setup();
        let id = orchestrator.register(&RegisterRequest::admin("a@b.com")).await.unwrap();

        store.set_fail_create(true);
        let err = orchestrator.activate(id, "Alice", "secret123").await.unwrap_err();
        assert!(matches!(err, IdentityError::Store(StoreError::Database { .. })));
        assert_eq!(provider.update_calls(), 0);
        assert_eq!(provider.state_of(id), Some(IdentityState::Inactive));
    }

    #[tokio::test]
    async fn failed_commit_after_provider_update_is_internal() {
        let (orchestrator, provider, store) = setup();
        let id = orchestrator.register(&RegisterRequest::admin("a@b.com")).await.unwrap();

        store.set_fail_commit(true);
        let err = orchestrator.activate(id, "Alice", "secret123").await.unwrap_err();
        assert_eq!(err.kind(), payd_core::ErrorKind::Internal);
        assert_eq!(store.employee_count(), 0);
        // The provider already accepted the update.
        assert_eq!(provider.state_of(id), Some(IdentityState::Active));
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_unknown_user() {
        let (orchestrator, _, _) = setup();
        let id = orchestrator.register(&RegisterRequest::admin("a@b.com")).await.unwrap();
        orchestrator.activate(id, "Alice", "secret123").await.unwrap();

        assert_eq!(
            orchestrator.login("a@b.com", "wrong-pass").await,
            Err(IdentityError::InvalidCredential)
        );
        assert_eq!(
            orchestrator.login("x@y.com", "secret123").await,
            Err(IdentityError::InvalidCredential)
        );
    }

    #[tokio::test]
    async fn login_needs_a_linked_employee_row() {
        let (orchestrator, provider, store) = setup();
        // Active identity whose traits were never linked to an employee.
        let traits = Traits::registration("a@b.com", PrivilegeRole::Employee, RoleId::new(1));
        provider
            .create_identity(&traits, "secret123", IdentityState::Active)
            .await
            .unwrap();

        let err = orchestrator.login("a@b.com", "secret123").await.unwrap_err();
        assert!(matches!(err, IdentityError::Internal(_)));
        assert_eq!(store.select_calls(), 0);

        // Linked to a row that does not exist.
        let traits = Traits::registration("b@c.com", PrivilegeRole::Employee, RoleId::new(1))
            .with_employee(EmployeeId::new(77));
        provider
            .create_identity(&traits, "secret123", IdentityState::Active)
            .await
            .unwrap();
        assert_eq!(
            orchestrator.login("b@c.com", "secret123").await,
            Err(IdentityError::Store(StoreError::EmployeeNotFound(EmployeeId::new(77))))
        );
    }

    #[tokio::test]
    async fn sessions_round_trip_through_the_codec() {
        let (orchestrator, _, _) = setup();
        let orchestrator = orchestrator.with_session_ttl(Duration::from_secs(60));
        let id = orchestrator
            .register(&RegisterRequest::employee("a@b.com", RoleId::new(2)))
            .await
            .unwrap();
        orchestrator.activate(id, "Bob", "secret123").await.unwrap();

        let identity = orchestrator.login("a@b.com", "secret123").await.unwrap();
        assert_eq!(identity.employee_name.as_deref(), Some("Bob"));
        assert_eq!(identity.primary_role, RoleId::new(2));

        let token = orchestrator.issue_session(&identity).unwrap();
        let session = orchestrator.verify_session(&token).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.role(), "employee");
        assert_eq!(session.employee_name, "Bob");

        assert!(matches!(
            orchestrator.verify_session("garbage"),
            Err(IdentityError::Token(_))
        ));
    }

    #[tokio::test]
    async fn bootstrap_admin_is_idempotent() {
        let (orchestrator, _, store) = setup();

        let first = orchestrator
            .bootstrap_admin("root@example.com", "Root", "secret123")
            .await
            .unwrap();
        assert_eq!(first, Some(EmployeeId::new(1)));

        let second = orchestrator
            .bootstrap_admin("root@example.com", "Root", "secret123")
            .await
            .unwrap();
        assert_eq!(second, None);
        assert_eq!(store.employee_count(), 1);

        let admin = orchestrator.login("root@example.com", "secret123").await.unwrap();
        assert!(admin.is_admin());
    }
}
