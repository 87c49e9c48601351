//! Postgres-backed employee and role stores.
//!
//! Expected schema: see [`SCHEMA`]. `employees.role_id` carries no foreign
//! key: admins are recorded with primary role `0`, which has no catalog row.
//!
//! Transactions run at READ COMMITTED. Reads outside a transaction go
//! straight to the pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, instrument};

use payd_auth::Role;
use payd_core::{EmployeeId, RoleId};

use super::{
    Employee, EmployeeStatus, EmployeeStore, NewEmployee, RoleStore, StoreError, TxHandle,
};
use crate::config::DatabaseConfig;

/// Tables the stores read and write.
pub const SCHEMA: &str = r#"
CREATE TABLE roles (
    id   SERIAL PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE employees (
    id         SERIAL PRIMARY KEY,
    name       TEXT NOT NULL,
    status     TEXT NOT NULL,
    role_id    INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// Employee + role store over a shared connection pool.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool from configuration and check it with one round trip.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EmployeeStore for PostgresStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin_transaction(&self) -> Result<TxHandle<Self::Tx>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        Ok(TxHandle::open(tx))
    }

    #[instrument(skip(self, tx, employee), fields(role_id = %employee.role_id))]
    async fn create_employee(
        &self,
        tx: &mut TxHandle<Self::Tx>,
        employee: &NewEmployee,
    ) -> Result<EmployeeId, StoreError> {
        let tx = tx.get_mut()?;
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO employees (name, status, role_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&employee.name)
        .bind(employee.status.as_str())
        .bind(employee.role_id.get())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("create_employee", e))?;

        debug!(employee_id = id, "employee row inserted");
        Ok(EmployeeId::new(id))
    }

    async fn select_employee_by_id(&self, id: EmployeeId) -> Result<Employee, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, status, role_id, created_at
            FROM employees
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_employee_by_id", e))?
        .ok_or(StoreError::EmployeeNotFound(id))?;

        employee_from_row(&row)
    }

    async fn update_employee_status(
        &self,
        id: EmployeeId,
        status: EmployeeStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE employees SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_employee_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EmployeeNotFound(id));
        }
        Ok(())
    }

    async fn commit(&self, tx: &mut TxHandle<Self::Tx>) -> Result<(), StoreError> {
        let Some(inner) = tx.take_for_commit()? else {
            return Ok(());
        };
        if let Err(e) = inner.commit().await {
            // A failed COMMIT leaves nothing to roll back; the server has
            // already aborted the transaction.
            tx.mark_rolled_back();
            return Err(map_sqlx_error("commit", e));
        }
        Ok(())
    }

    async fn rollback(&self, tx: &mut TxHandle<Self::Tx>) -> Result<(), StoreError> {
        match tx.take_for_rollback()? {
            Some(inner) => inner
                .rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    async fn list_all_roles(&self) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_all_roles", e))?;

        rows.iter()
            .map(|row| {
                let id: i32 = row.try_get("id").map_err(decode_error)?;
                let name: String = row.try_get("name").map_err(decode_error)?;
                Ok(Role::new(RoleId::new(id), name))
            })
            .collect()
    }
}

fn employee_from_row(row: &PgRow) -> Result<Employee, StoreError> {
    let status_raw: String = row.try_get("status").map_err(decode_error)?;
    let status = EmployeeStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown employee status {status_raw:?}")))?;

    Ok(Employee {
        id: EmployeeId::new(row.try_get::<i32, _>("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        status,
        primary_role: RoleId::new(row.try_get::<i32, _>("role_id").map_err(decode_error)?),
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(decode_error)?,
    })
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Decode(err.to_string())
}

/// Map SQLx errors to store errors, keeping the operation name.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    let message = match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => format!("{} (sqlstate {code})", db_err.message()),
            None => db_err.message().to_string(),
        },
        sqlx::Error::PoolClosed => "connection pool closed".to_string(),
        sqlx::Error::PoolTimedOut => "timed out acquiring a connection".to_string(),
        other => other.to_string(),
    };
    StoreError::Database { operation, message }
}
