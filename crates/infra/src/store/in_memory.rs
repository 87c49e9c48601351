use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use payd_auth::Role;
use payd_core::EmployeeId;

use super::{
    Employee, EmployeeStatus, EmployeeStore, NewEmployee, RoleStore, StoreError, TxHandle,
};

/// Staged writes of an in-memory transaction.
///
/// Rows become visible only on commit; dropping or rolling back discards them.
#[derive(Debug, Default)]
pub struct InMemoryTx {
    staged: Vec<Employee>,
}

/// In-memory employee + role store.
///
/// Intended for tests/dev. Ids are handed out like a database sequence:
/// starting at 1 and never reused, even when the inserting transaction rolls
/// back.
#[derive(Debug)]
pub struct InMemoryStore {
    employees: RwLock<BTreeMap<EmployeeId, Employee>>,
    roles: RwLock<Vec<Role>>,
    next_id: AtomicI32,
    fail_create: AtomicBool,
    fail_commit: AtomicBool,
    fail_roles: AtomicBool,
    select_calls: AtomicUsize,
    role_reads: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            employees: RwLock::default(),
            roles: RwLock::default(),
            next_id: AtomicI32::new(1),
            fail_create: AtomicBool::new(false),
            fail_commit: AtomicBool::new(false),
            fail_roles: AtomicBool::new(false),
            select_calls: AtomicUsize::new(0),
            role_reads: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles(roles: Vec<Role>) -> Self {
        let store = Self::default();
        store.set_roles(roles);
        store
    }

    /// Replace the role catalog.
    pub fn set_roles(&self, roles: Vec<Role>) {
        *self.roles.write().unwrap_or_else(|e| e.into_inner()) = roles;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_roles(&self, fail: bool) {
        self.fail_roles.store(fail, Ordering::SeqCst);
    }

    /// Number of `select_employee_by_id` calls so far.
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn role_reads(&self) -> usize {
        self.role_reads.load(Ordering::SeqCst)
    }

    /// Committed employee rows.
    /// Explicit rollbacks that discarded an open transaction.
    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn employee_count(&self) -> usize {
        self.employees.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn unavailable(operation: &'static str) -> StoreError {
        StoreError::Database {
            operation,
            message: "store unavailable".to_string(),
        }
    }
}

#[async_trait]
impl EmployeeStore for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin_transaction(&self) -> Result<TxHandle<Self::Tx>, StoreError> {
        Ok(TxHandle::open(InMemoryTx::default()))
    }

    async fn create_employee(
        &self,
        tx: &mut TxHandle<Self::Tx>,
        employee: &NewEmployee,
    ) -> Result<EmployeeId, StoreError> {
        let tx = tx.get_mut()?;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::unavailable("create_employee"));
        }

        let id = EmployeeId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        tx.staged.push(Employee {
            id,
            name: employee.name.clone(),
            status: employee.status,
            primary_role: employee.role_id,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn select_employee_by_id(&self, id: EmployeeId) -> Result<Employee, StoreError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.employees
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(StoreError::EmployeeNotFound(id))
    }

    async fn update_employee_status(
        &self,
        id: EmployeeId,
        status: EmployeeStatus,
    ) -> Result<(), StoreError> {
        let mut employees = self.employees.write().unwrap_or_else(|e| e.into_inner());
        let employee = employees
            .get_mut(&id)
            .ok_or(StoreError::EmployeeNotFound(id))?;
        employee.status = status;
        Ok(())
    }

    async fn commit(&self, tx: &mut TxHandle<Self::Tx>) -> Result<(), StoreError> {
        let Some(inner) = tx.take_for_commit()? else {
            return Ok(());
        };
        if self.fail_commit.load(Ordering::SeqCst) {
            tx.mark_rolled_back();
            return Err(Self::unavailable("commit"));
        }

        let mut employees = self.employees.write().unwrap_or_else(|e| e.into_inner());
        for employee in inner.staged {
            employees.insert(employee.id, employee);
        }
        Ok(())
    }

    async fn rollback(&self, tx: &mut TxHandle<Self::Tx>) -> Result<(), StoreError> {
        if tx.take_for_rollback()?.is_some() {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn list_all_roles(&self) -> Result<Vec<Role>, StoreError> {
        self.role_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(Self::unavailable("list_all_roles"));
        }
        Ok(self.roles.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payd_core::RoleId;

    use crate::store::TxStatus;

    fn new_employee(name: &str) -> NewEmployee {
        NewEmployee {
            name: name.to_string(),
            status: EmployeeStatus::Active,
            role_id: RoleId::new(2),
        }
    }

    #[tokio::test]
    async fn rows_are_invisible_until_commit() {
        let store = InMemoryStore::new();
        let mut tx = store.begin_transaction().await.unwrap();
        let id = store.create_employee(&mut tx, &new_employee("Alice")).await.unwrap();
        assert_eq!(id, EmployeeId::new(1));

        assert_eq!(
            store.select_employee_by_id(id).await,
            Err(StoreError::EmployeeNotFound(id))
        );

        store.commit(&mut tx).await.unwrap();
        let row = store.select_employee_by_id(id).await.unwrap();
        assert_eq!(row.name, "Alice");
        assert_eq!(row.status, EmployeeStatus::Active);
        assert_eq!(row.primary_role, RoleId::new(2));

        // Second resolution is a no-op.
        store.commit(&mut tx).await.unwrap();
        store.rollback(&mut tx).await.unwrap();
        assert_eq!(tx.status(), TxStatus::Committed);
    }

    #[tokio::test]
    async fn rollback_and_drop_discard_staged_rows() {
        let store = InMemoryStore::new();

        let mut tx = store.begin_transaction().await.unwrap();
        store.create_employee(&mut tx, &new_employee("Bob")).await.unwrap();
        store.rollback(&mut tx).await.unwrap();

        {
            let mut dropped = store.begin_transaction().await.unwrap();
            store.create_employee(&mut dropped, &new_employee("Carol")).await.unwrap();
        }

        assert_eq!(store.employee_count(), 0);
        // Only the explicit rollback is counted; the dropped handle is not.
        assert_eq!(store.rollbacks(), 1);

        // Ids are not reused after a rollback.
        let mut tx = store.begin_transaction().await.unwrap();
        let id = store.create_employee(&mut tx, &new_employee("Dan")).await.unwrap();
        assert_eq!(id, EmployeeId::new(3));
    }

    #[tokio::test]
    async fn closed_or_unstarted_handles_are_rejected() {
        let store = InMemoryStore::new();

        let mut never = TxHandle::not_started();
        assert_eq!(store.commit(&mut never).await, Err(StoreError::NotATransaction));
        assert_eq!(store.rollback(&mut never).await, Err(StoreError::NotATransaction));

        let mut tx = store.begin_transaction().await.unwrap();
        store.rollback(&mut tx).await.unwrap();
        assert_eq!(
            store.create_employee(&mut tx, &new_employee("Eve")).await,
            Err(StoreError::TransactionClosed)
        );
    }

    #[tokio::test]
    async fn status_can_change_after_creation() {
        let store = InMemoryStore::new();
        let mut tx = store.begin_transaction().await.unwrap();
        let id = store.create_employee(&mut tx, &new_employee("Fay")).await.unwrap();
        store.commit(&mut tx).await.unwrap();

        store.update_employee_status(id, EmployeeStatus::Inactive).await.unwrap();
        assert_eq!(
            store.select_employee_by_id(id).await.unwrap().status,
            EmployeeStatus::Inactive
        );
        assert_eq!(
            store
                .update_employee_status(EmployeeId::new(99), EmployeeStatus::Active)
                .await,
            Err(StoreError::EmployeeNotFound(EmployeeId::new(99)))
        );
    }

    #[tokio::test]
    async fn roles_come_back_in_catalog_order() {
        let store = InMemoryStore::with_roles(vec![Role::new(1, "Cashier"), Role::new(2, "Cook")]);
        let roles = store.list_all_roles().await.unwrap();
        assert_eq!(roles, vec![Role::new(1, "Cashier"), Role::new(2, "Cook")]);

        store.set_fail_roles(true);
        assert!(store.list_all_roles().await.is_err());
    }
}
