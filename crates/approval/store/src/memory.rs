//! In-memory reference implementation of the approval store.
//!
//! This adapter is deterministic and test-friendly. Production
//! deployments should use a transactional backend (e.g. PostgreSQL) for
//! source-of-truth data.

use crate::traits::{ApprovalStore, PendingFilter, RecordPatch, UpdateGuard};
use crate::{StorageError, StorageResult};
use approval_types::{ApprovalRecord, ApprovalRecordId, ExpenseId, PaymentStatus, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory approval store adapter.
#[derive(Default)]
pub struct InMemoryApprovalStore {
    records: RwLock<HashMap<ApprovalRecordId, ApprovalRecord>>,
    payments: RwLock<HashMap<ExpenseId, PaymentStatus>>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
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

        let mut guard = self
            .records
            .write()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;

        // Validate everything before the first insert so failure leaves
        // no partial stage set behind.
        for record in &records {
            if guard.contains_key(&record.id) {
                return Err(StorageError::Conflict(format!(
                    "approval record {} already exists",
                    record.id
                )));
            }
            if guard
                .values()
                .any(|existing| existing.expense_id == record.expense_id)
            {
                return Err(StorageError::Conflict(format!(
                    "expense {} already has a workflow",
                    record.expense_id
                )));
            }
        }

        for record in records {
            guard.insert(record.id.clone(), record);
        }
        drop(guard);

        if let Some(status) = payment_status {
            let mut payments = self
                .payments
                .write()
                .map_err(|_| StorageError::Backend("payments lock poisoned".to_string()))?;
            payments.insert(expense_id, status);
        }
        Ok(())
    }

    async fn get(&self, id: &ApprovalRecordId) -> StorageResult<Option<ApprovalRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn list_for_expense(
        &self,
        expense_id: &ExpenseId,
    ) -> StorageResult<Vec<ApprovalRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|r| &r.expense_id == expense_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|r| r.stage_number);
        Ok(values)
    }

    async fn find_stage(
        &self,
        expense_id: &ExpenseId,
        stage_number: u32,
    ) -> StorageResult<Option<ApprovalRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .find(|r| &r.expense_id == expense_id && r.stage_number == stage_number)
            .cloned())
    }

    async fn update_guarded(
        &self,
        id: &ApprovalRecordId,
        update_guard: UpdateGuard,
        patch: RecordPatch,
    ) -> StorageResult<ApprovalRecord> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        let record = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("approval record {} not found", id)))?;

        if !update_guard.admits(record) {
            return Err(StorageError::Conflict(format!(
                "approval record {} is {:?}, guard requires {:?}",
                id, record.stage_status, update_guard.statuses
            )));
        }

        patch.apply_to(record, Utc::now());
        Ok(record.clone())
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> StorageResult<Vec<ApprovalRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|r| r.is_overdue(now))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|r| r.stage_deadline);
        Ok(values)
    }

    async fn find_pending_for_user(
        &self,
        user: &UserId,
        filter: PendingFilter,
    ) -> StorageResult<Vec<ApprovalRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|r| r.is_awaiting(user))
            .filter(|r| {
                filter
                    .organization_id
                    .as_ref()
                    .map(|org| &r.organization_id == org)
                    .unwrap_or(true)
            })
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|r| r.stage_deadline);
        Ok(values)
    }

    async fn set_payment_status(
        &self,
        expense_id: &ExpenseId,
        status: PaymentStatus,
    ) -> StorageResult<()> {
        let mut guard = self
            .payments
            .write()
            .map_err(|_| StorageError::Backend("payments lock poisoned".to_string()))?;
        guard.insert(expense_id.clone(), status);
        Ok(())
    }

    async fn payment_status(
        &self,
        expense_id: &ExpenseId,
    ) -> StorageResult<Option<PaymentStatus>> {
        let guard = self
            .payments
            .read()
            .map_err(|_| StorageError::Backend("payments lock poisoned".to_string()))?;
        Ok(guard.get(expense_id).copied())
    }
}
