//! PostgreSQL adapter for the approval store.
//!
//! The transactional source-of-truth backend. The full record travels
//! as JSONB; the columns the guarded update and sweep queries filter on
//! are mirrored alongside it. Guarded updates take a row lock inside a
//! transaction so two concurrent actors on the same record serialize:
//! exactly one passes the guard.

use crate::traits::{ApprovalStore, PendingFilter, RecordPatch, UpdateGuard};
use crate::{StorageError, StorageResult};
use approval_types::{
    ApprovalRecord, ApprovalRecordId, ExpenseId, PaymentStatus, StageStatus, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

/// PostgreSQL-backed approval store adapter.
#[derive(Clone)]
pub struct PostgresApprovalStore {
    pool: PgPool,
}

impl PostgresApprovalStore {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS approval_records (
                id TEXT PRIMARY KEY,
                expense_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                stage_number INTEGER NOT NULL,
                stage_status TEXT NOT NULL,
                stage_deadline TIMESTAMPTZ,
                delegated_to TEXT,
                escalated_to TEXT,
                record JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (expense_id, stage_number)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS expense_payments (
                expense_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_approval_records_overdue
                ON approval_records (stage_deadline)
                WHERE stage_status IN ('pending', 'delegated') AND escalated_to IS NULL
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ApprovalStore for PostgresApprovalStore {
    async fn create_workflow(
        &self,
        records: Vec<ApprovalRecord>,
        payment_status: Option<PaymentStatus>,
    ) -> StorageResult<()> {
        if records.is_empty() {
            return Err(StorageError::InvalidInput(
                "workflow must contain at least one record".to_string(),
            ));
        }
        let expense_id = records[0].expense_id.clone();
        if records.iter().any(|r| r.expense_id != expense_id) {
            return Err(StorageError::InvalidInput(
                "all workflow records must share one expense".to_string(),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        for record in &records {
            let record_json = serde_json::to_value(record)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO approval_records
                    (id, expense_id, organization_id, stage_number, stage_status,
                     stage_deadline, delegated_to, escalated_to, record, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, NULL, NULL, $7, $8, $8)
                "#,
            )
            .bind(record.id.0.clone())
            .bind(record.expense_id.0.clone())
            .bind(record.organization_id.0.clone())
            .bind(record.stage_number as i32)
            .bind(stage_status_to_str(record.stage_status))
            .bind(record.stage_deadline)
            .bind(record_json)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_conflict)?;
        }

        if let Some(status) = payment_status {
            sqlx::query(
                r#"
                INSERT INTO expense_payments (expense_id, status, updated_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (expense_id) DO UPDATE SET status = $2, updated_at = $3
                "#,
            )
            .bind(expense_id.0.clone())
            .bind(payment_status_to_str(status))
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: &ApprovalRecordId) -> StorageResult<Option<ApprovalRecord>> {
        let row = sqlx::query("SELECT record FROM approval_records WHERE id = $1")
            .bind(id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(row_to_record).transpose()
    }

    async fn list_for_expense(
        &self,
        expense_id: &ExpenseId,
    ) -> StorageResult<Vec<ApprovalRecord>> {
        let rows = sqlx::query(
            "SELECT record FROM approval_records WHERE expense_id = $1 ORDER BY stage_number",
        )
        .bind(expense_id.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn find_stage(
        &self,
        expense_id: &ExpenseId,
        stage_number: u32,
    ) -> StorageResult<Option<ApprovalRecord>> {
        let row = sqlx::query(
            "SELECT record FROM approval_records WHERE expense_id = $1 AND stage_number = $2",
        )
        .bind(expense_id.0.clone())
        .bind(stage_number as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(row_to_record).transpose()
    }

    async fn update_guarded(
        &self,
        id: &ApprovalRecordId,
        guard: UpdateGuard,
        patch: RecordPatch,
    ) -> StorageResult<ApprovalRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let row = sqlx::query("SELECT record FROM approval_records WHERE id = $1 FOR UPDATE")
            .bind(id.0.clone())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut record = row
            .map(row_to_record)
            .transpose()?
            .ok_or_else(|| StorageError::NotFound(format!("approval record {} not found", id)))?;

        if !guard.admits(&record) {
            return Err(StorageError::Conflict(format!(
                "approval record {} is {:?}, guard requires {:?}",
                id, record.stage_status, guard.statuses
            )));
        }

        patch.apply_to(&mut record, Utc::now());
        let record_json = serde_json::to_value(&record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE approval_records
               SET record = $1,
                   stage_status = $2,
                   stage_deadline = $3,
                   delegated_to = $4,
                   escalated_to = $5,
                   updated_at = $6
             WHERE id = $7
            "#,
        )
        .bind(record_json)
        .bind(stage_status_to_str(record.stage_status))
        .bind(record.stage_deadline)
        .bind(record.delegated_to.as_ref().map(|u| u.0.clone()))
        .bind(record.escalated_to.as_ref().map(|u| u.0.clone()))
        .bind(record.updated_at)
        .bind(id.0.clone())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(record)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> StorageResult<Vec<ApprovalRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT record FROM approval_records
             WHERE stage_status IN ('pending', 'delegated')
               AND stage_deadline < $1
               AND escalated_to IS NULL
             ORDER BY stage_deadline
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn find_pending_for_user(
        &self,
        user: &UserId,
        filter: PendingFilter,
    ) -> StorageResult<Vec<ApprovalRecord>> {
        // Snapshot membership lives inside the JSONB document; fetch the
        // live candidates and filter on the deserialized record.
        let rows = if let Some(org) = filter.organization_id {
            sqlx::query(
                r#"
                SELECT record FROM approval_records
                 WHERE stage_status IN ('pending', 'delegated', 'escalated')
                   AND organization_id = $1
                 ORDER BY stage_deadline
                "#,
            )
            .bind(org.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT record FROM approval_records
                 WHERE stage_status IN ('pending', 'delegated', 'escalated')
                 ORDER BY stage_deadline
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        let records = rows
            .into_iter()
            .map(row_to_record)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(records.into_iter().filter(|r| r.is_awaiting(user)).collect())
    }

    async fn set_payment_status(
        &self,
        expense_id: &ExpenseId,
        status: PaymentStatus,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO expense_payments (expense_id, status, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (expense_id) DO UPDATE SET status = $2, updated_at = $3
            "#,
        )
        .bind(expense_id.0.clone())
        .bind(payment_status_to_str(status))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn payment_status(
        &self,
        expense_id: &ExpenseId,
    ) -> StorageResult<Option<PaymentStatus>> {
        let row = sqlx::query("SELECT status FROM expense_payments WHERE expense_id = $1")
            .bind(expense_id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(|r| {
            let status: String = r
                .try_get("status")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            payment_status_from_str(&status)
        })
        .transpose()
    }
}

fn row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<ApprovalRecord> {
    let value: serde_json::Value = row
        .try_get("record")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn stage_status_to_str(status: StageStatus) -> &'static str {
    match status {
        StageStatus::NotStarted => "not_started",
        StageStatus::Pending => "pending",
        StageStatus::Approved => "approved",
        StageStatus::Rejected => "rejected",
        StageStatus::Delegated => "delegated",
        StageStatus::Escalated => "escalated",
    }
}

fn payment_status_to_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::PendingApproval => "pending_approval",
        PaymentStatus::Approved => "approved",
        PaymentStatus::Rejected => "rejected",
    }
}

fn payment_status_from_str(status: &str) -> StorageResult<PaymentStatus> {
    match status {
        "pending_approval" => Ok(PaymentStatus::PendingApproval),
        "approved" => Ok(PaymentStatus::Approved),
        "rejected" => Ok(PaymentStatus::Rejected),
        other => Err(StorageError::Serialization(format!(
            "unknown payment status: {other}"
        ))),
    }
}

fn map_sqlx_conflict(error: sqlx::Error) -> StorageError {
    if let Some(db_error) = error.as_database_error() {
        if db_error.is_unique_violation() {
            return StorageError::Conflict(db_error.to_string());
        }
    }
    StorageError::Backend(error.to_string())
}
