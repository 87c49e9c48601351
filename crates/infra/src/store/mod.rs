//! Local relational persistence: employees and the role catalog.
//!
//! Writes go through an explicit [`TxHandle`] returned by
//! [`EmployeeStore::begin_transaction`] and passed to every call that belongs
//! to the transaction. The handle owns the underlying transaction, so it is
//! released on every exit path: committed, rolled back, or dropped (which
//! discards uncommitted work).

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use payd_auth::Role;
use payd_core::{EmployeeId, ErrorKind, RoleId};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "ACTIVE",
            EmployeeStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(EmployeeStatus::Active),
            "INACTIVE" => Some(EmployeeStatus::Inactive),
            _ => None,
        }
    }
}

impl core::fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local employee row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub status: EmployeeStatus,
    /// Responsibility-tier role id (`role_id` column).
    pub primary_role: RoleId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmployee {
    pub name: String,
    pub status: EmployeeStatus,
    pub role_id: RoleId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("employee {0} not found")]
    EmployeeNotFound(EmployeeId),

    #[error("no transaction was begun on this handle")]
    NotATransaction,

    #[error("transaction is already resolved")]
    TransactionClosed,

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    #[error("failed to decode row: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::EmployeeNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

/// Observable state of a [`TxHandle`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TxStatus {
    NotStarted,
    Open,
    Committed,
    RolledBack,
}

/// Scoped transaction handle.
///
/// Resolving a handle twice is a no-op; resolving one that was never begun is
/// [`StoreError::NotATransaction`].
#[derive(Debug)]
pub struct TxHandle<T> {
    state: TxState<T>,
}

#[derive(Debug)]
enum TxState<T> {
    NotStarted,
    Open(T),
    Committed,
    RolledBack,
}

impl<T> TxHandle<T> {
    /// A handle with no transaction behind it.
    pub fn not_started() -> Self {
        Self {
            state: TxState::NotStarted,
        }
    }

    pub fn open(tx: T) -> Self {
        Self {
            state: TxState::Open(tx),
        }
    }

    pub fn status(&self) -> TxStatus {
        match self.state {
            TxState::NotStarted => TxStatus::NotStarted,
            TxState::Open(_) => TxStatus::Open,
            TxState::Committed => TxStatus::Committed,
            TxState::RolledBack => TxStatus::RolledBack,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, TxState::Open(_))
    }

    /// The live transaction, for store calls that write through it.
    pub fn get_mut(&mut self) -> Result<&mut T, StoreError> {
        match &mut self.state {
            TxState::Open(tx) => Ok(tx),
            _ => Err(StoreError::TransactionClosed),
        }
    }

    /// Move the transaction out for committing. `Ok(None)` means the handle
    /// is already resolved and there is nothing to do.
    pub fn take_for_commit(&mut self) -> Result<Option<T>, StoreError> {
        self.take(TxState::Committed)
    }

    pub fn take_for_rollback(&mut self) -> Result<Option<T>, StoreError> {
        self.take(TxState::RolledBack)
    }

    /// Record that a commit attempt failed and the transaction is gone.
    pub fn mark_rolled_back(&mut self) {
        self.state = TxState::RolledBack;
    }

    fn take(&mut self, resolved: TxState<T>) -> Result<Option<T>, StoreError> {
        match std::mem::replace(&mut self.state, resolved) {
            TxState::Open(tx) => Ok(Some(tx)),
            TxState::NotStarted => {
                self.state = TxState::NotStarted;
                Err(StoreError::NotATransaction)
            }
            previous @ (TxState::Committed | TxState::RolledBack) => {
                self.state = previous;
                Ok(None)
            }
        }
    }
}

impl<T> Drop for TxHandle<T> {
    fn drop(&mut self) {
        if self.is_open() {
            tracing::debug!("transaction handle dropped while open; discarding uncommitted work");
        }
    }
}

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    /// Backend transaction owned by a [`TxHandle`].
    type Tx: Send;

    async fn begin_transaction(&self) -> Result<TxHandle<Self::Tx>, StoreError>;

    async fn create_employee(
        &self,
        tx: &mut TxHandle<Self::Tx>,
        employee: &NewEmployee,
    ) -> Result<EmployeeId, StoreError>;

    async fn select_employee_by_id(&self, id: EmployeeId) -> Result<Employee, StoreError>;

    async fn update_employee_status(
        &self,
        id: EmployeeId,
        status: EmployeeStatus,
    ) -> Result<(), StoreError>;

    async fn commit(&self, tx: &mut TxHandle<Self::Tx>) -> Result<(), StoreError>;

    async fn rollback(&self, tx: &mut TxHandle<Self::Tx>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Full role catalog ordered by id.
    async fn list_all_roles(&self) -> Result<Vec<Role>, StoreError>;
}

#[async_trait]
impl<T: EmployeeStore + ?Sized> EmployeeStore for Arc<T> {
    type Tx = T::Tx;

    async fn begin_transaction(&self) -> Result<TxHandle<Self::Tx>, StoreError> {
        (**self).begin_transaction().await
    }

    async fn create_employee(
        &self,
        tx: &mut TxHandle<Self::Tx>,
        employee: &NewEmployee,
    ) -> Result<EmployeeId, StoreError> {
        (**self).create_employee(tx, employee).await
    }

    async fn select_employee_by_id(&self, id: EmployeeId) -> Result<Employee, StoreError> {
        (**self).select_employee_by_id(id).await
    }

    async fn update_employee_status(
        &self,
        id: EmployeeId,
        status: EmployeeStatus,
    ) -> Result<(), StoreError> {
        (**self).update_employee_status(id, status).await
    }

    async fn commit(&self, tx: &mut TxHandle<Self::Tx>) -> Result<(), StoreError> {
        (**self).commit(tx).await
    }

    async fn rollback(&self, tx: &mut TxHandle<Self::Tx>) -> Result<(), StoreError> {
        (**self).rollback(tx).await
    }
}

#[async_trait]
impl<T: RoleStore + ?Sized> RoleStore for Arc<T> {
    async fn list_all_roles(&self) -> Result<Vec<Role>, StoreError> {
        (**self).list_all_roles().await
    }
}
