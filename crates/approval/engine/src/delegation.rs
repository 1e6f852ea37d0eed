//! Delegation: actor-initiated reassignment of one stage's duty
//!
//! Delegation adds eligibility for the delegate without rewriting the
//! approver snapshot or advancing the stage sequence. Stages can opt
//! out (`allow_delegation = false` — executive stages always do).

use crate::{ApprovalError, ApprovalResult, NotificationGateway};
use approval_store::{ApprovalStore, RecordPatch, StorageError, UpdateGuard};
use approval_types::{ApprovalRecord, ApprovalRecordId, StageStatus, UserId};
use chrono::Utc;
use std::sync::Arc;

/// Reassigns an in-flight stage's approval duty
pub struct DelegationManager {
    store: Arc<dyn ApprovalStore>,
    notifier: Arc<dyn NotificationGateway>,
}

impl DelegationManager {
    pub fn new(store: Arc<dyn ApprovalStore>, notifier: Arc<dyn NotificationGateway>) -> Self {
        Self { store, notifier }
    }

    /// Delegate one pending record to another user.
    pub async fn delegate(
        &self,
        record_id: &ApprovalRecordId,
        delegate_user: &UserId,
        delegating_user: &UserId,
        reason: impl Into<String>,
    ) -> ApprovalResult<ApprovalRecord> {
        let record = self
            .store
            .get(record_id)
            .await?
            .ok_or_else(ApprovalError::record_not_found)?;

        if record.stage_status != StageStatus::Pending {
            return Err(ApprovalError::already_processed());
        }
        if !record.in_approver_snapshot(delegating_user) {
            return Err(ApprovalError::not_authorized());
        }
        if !record.allow_delegation {
            return Err(ApprovalError::Validation(
                "Delegation is not allowed for this approval stage".to_string(),
            ));
        }
        if delegate_user == delegating_user {
            return Err(ApprovalError::Validation(
                "Cannot delegate an approval to yourself".to_string(),
            ));
        }

        let now = Utc::now();
        let updated = self
            .store
            .update_guarded(
                record_id,
                UpdateGuard::status(StageStatus::Pending),
                RecordPatch {
                    stage_status: Some(StageStatus::Delegated),
                    delegated_to: Some(delegate_user.clone()),
                    delegated_by: Some(delegating_user.clone()),
                    delegated_at: Some(now),
                    delegation_reason: Some(reason.into()),
                    ..RecordPatch::default()
                },
            )
            .await
            .map_err(|error| match error {
                StorageError::Conflict(_) => ApprovalError::already_processed(),
                StorageError::NotFound(_) => ApprovalError::record_not_found(),
                other => ApprovalError::Storage(other),
            })?;

        tracing::info!(
            expense_id = %updated.expense_id,
            stage = updated.stage_number,
            from = %delegating_user,
            to = %delegate_user,
            "approval delegated"
        );

        if let Err(error) = self.notifier.notify_delegation(&updated, delegate_user).await {
            tracing::warn!(
                expense_id = %updated.expense_id,
                error = %error,
                "delegation notification failed"
            );
        }
        Ok(updated)
    }
}
