//! Decision processing: one approve/reject against one record
//!
//! Checks run in a fixed order — existence, status, authorization,
//! payload — and the decision itself lands as a single guarded update,
//! so two concurrent calls on the same record race safely: exactly one
//! succeeds, the other observes the conflict.

use crate::{ApprovalError, ApprovalResult, NotificationGateway, ProgressionEngine};
use approval_store::{ApprovalStore, RecordPatch, StorageError, UpdateGuard};
use approval_types::{ApprovalRecord, ApprovalRecordId, StageStatus, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ── Decision Payload ─────────────────────────────────────────────────

/// The two terminal decisions an approver can make
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approved,
    Rejected,
}

/// One approve/reject request against one approval record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub action: DecisionAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl DecisionRequest {
    pub fn approve(approved_amount: Option<f64>) -> Self {
        Self {
            action: DecisionAction::Approved,
            notes: None,
            approved_amount,
            rejection_reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Rejected,
            notes: None,
            approved_amount: None,
            rejection_reason: Some(reason.into()),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn validate(&self) -> ApprovalResult<()> {
        if let Some(amount) = self.approved_amount {
            if amount < 0.0 {
                return Err(ApprovalError::Validation(
                    "Approved amount must not be negative".to_string(),
                ));
            }
        }
        if self.action == DecisionAction::Rejected
            && self
                .rejection_reason
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(ApprovalError::Validation(
                "Rejection reason is required".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Decision Processor ───────────────────────────────────────────────

/// Validates and applies decisions, then hands off to progression
pub struct DecisionProcessor {
    store: Arc<dyn ApprovalStore>,
    progression: ProgressionEngine,
}

impl DecisionProcessor {
    pub fn new(store: Arc<dyn ApprovalStore>, notifier: Arc<dyn NotificationGateway>) -> Self {
        Self {
            progression: ProgressionEngine::new(store.clone(), notifier),
            store,
        }
    }

    /// Apply one decision. Exactly one record is mutated here; the
    /// progression engine may activate the next stage's record.
    pub async fn decide(
        &self,
        record_id: &ApprovalRecordId,
        request: &DecisionRequest,
        acting_user: &UserId,
    ) -> ApprovalResult<ApprovalRecord> {
        let record = self
            .store
            .get(record_id)
            .await?
            .ok_or_else(ApprovalError::record_not_found)?;

        if !record.stage_status.is_live() {
            return Err(ApprovalError::already_processed());
        }
        if !record.is_authorized(acting_user) {
            return Err(ApprovalError::not_authorized());
        }
        request.validate()?;

        let now = Utc::now();
        let patch = match request.action {
            DecisionAction::Approved => RecordPatch {
                stage_status: Some(StageStatus::Approved),
                approver_id: Some(acting_user.clone()),
                approved_at: Some(now),
                approval_notes: request.notes.clone(),
                approved_amount: request.approved_amount,
                ..RecordPatch::default()
            },
            DecisionAction::Rejected => RecordPatch {
                stage_status: Some(StageStatus::Rejected),
                approver_id: Some(acting_user.clone()),
                rejected_at: Some(now),
                approval_notes: request.notes.clone(),
                rejection_reason: request.rejection_reason.clone(),
                ..RecordPatch::default()
            },
        };

        let guard = UpdateGuard::statuses(vec![
            StageStatus::Pending,
            StageStatus::Delegated,
            StageStatus::Escalated,
        ]);
        let updated = self
            .store
            .update_guarded(record_id, guard, patch)
            .await
            .map_err(|error| match error {
                // Lost the race: someone else decided first.
                StorageError::Conflict(_) => ApprovalError::already_processed(),
                StorageError::NotFound(_) => ApprovalError::record_not_found(),
                other => ApprovalError::Storage(other),
            })?;

        tracing::info!(
            expense_id = %updated.expense_id,
            stage = updated.stage_number,
            approver = %acting_user,
            action = ?request.action,
            "stage decision applied"
        );

        self.progression.advance(&updated).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::{make_workflow_records, RecordingNotifier};
    use approval_store::InMemoryApprovalStore;
    use approval_types::{ExpenseId, PaymentStatus};

    async fn seeded(stages: u32) -> (Arc<InMemoryApprovalStore>, DecisionProcessor, Vec<ApprovalRecord>) {
        let store = Arc::new(InMemoryApprovalStore::new());
        let records = make_workflow_records("exp-1", stages);
        store
            .create_workflow(records.clone(), Some(PaymentStatus::PendingApproval))
            .await
            .unwrap();
        let processor = DecisionProcessor::new(store.clone(), Arc::new(RecordingNotifier::new()));
        (store, processor, records)
    }

    fn manager() -> UserId {
        UserId::new("mgr-1")
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let (_store, processor, _records) = seeded(1).await;
        let result = processor
            .decide(
                &ApprovalRecordId::new("missing"),
                &DecisionRequest::approve(None),
                &manager(),
            )
            .await;
        match result {
            Err(ApprovalError::NotFound(message)) => {
                assert_eq!(message, "Approval record not found");
            }
            other => panic!("expected NotFound, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_user_is_rejected() {
        let (_store, processor, records) = seeded(1).await;
        let result = processor
            .decide(
                &records[0].id,
                &DecisionRequest::approve(None),
                &UserId::new("intruder"),
            )
            .await;
        match result {
            Err(ApprovalError::Authorization(message)) => {
                assert_eq!(message, "User is not authorized to approve this expense");
            }
            other => panic!("expected Authorization, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn test_second_decision_conflicts_and_preserves_first() {
        let (store, processor, records) = seeded(1).await;

        let first = processor
            .decide(
                &records[0].id,
                &DecisionRequest::approve(Some(150.0)).with_notes("Looks fine"),
                &manager(),
            )
            .await
            .unwrap();
        assert_eq!(first.stage_status, StageStatus::Approved);

        let replay = processor
            .decide(
                &records[0].id,
                &DecisionRequest::reject("changed my mind"),
                &manager(),
            )
            .await;
        match replay {
            Err(ApprovalError::Conflict(message)) => {
                assert_eq!(message, "Approval has already been processed");
            }
            other => panic!("expected Conflict, got {:?}", other.map(|r| r.id)),
        }

        // The first decision's terminal fields are unchanged.
        let current = store.get(&records[0].id).await.unwrap().unwrap();
        assert_eq!(current.stage_status, StageStatus::Approved);
        assert_eq!(current.approved_amount, Some(150.0));
        assert_eq!(current.approval_notes.as_deref(), Some("Looks fine"));
        assert!(current.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn test_not_started_stage_cannot_be_decided() {
        let (_store, processor, records) = seeded(2).await;
        let result = processor
            .decide(&records[1].id, &DecisionRequest::approve(None), &manager())
            .await;
        assert!(matches!(result, Err(ApprovalError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rejection_requires_reason() {
        let (_store, processor, records) = seeded(1).await;
        let result = processor
            .decide(&records[0].id, &DecisionRequest::reject("  "), &manager())
            .await;
        assert!(matches!(result, Err(ApprovalError::Validation(_))));
    }

    #[tokio::test]
    async fn test_negative_amount_is_invalid() {
        let (_store, processor, records) = seeded(1).await;
        let result = processor
            .decide(
                &records[0].id,
                &DecisionRequest::approve(Some(-10.0)),
                &manager(),
            )
            .await;
        assert!(matches!(result, Err(ApprovalError::Validation(_))));
    }

    #[tokio::test]
    async fn test_approval_advances_to_next_stage() {
        let (store, processor, records) = seeded(2).await;
        processor
            .decide(&records[0].id, &DecisionRequest::approve(None), &manager())
            .await
            .unwrap();

        let listed = store
            .list_for_expense(&ExpenseId::new("exp-1"))
            .await
            .unwrap();
        assert_eq!(listed[0].stage_status, StageStatus::Approved);
        assert_eq!(listed[1].stage_status, StageStatus::Pending);
        // At most one live record at any time.
        assert_eq!(listed.iter().filter(|r| r.is_live()).count(), 1);
    }

    #[tokio::test]
    async fn test_delegate_may_decide_delegated_record() {
        let (store, processor, records) = seeded(1).await;
        store
            .update_guarded(
                &records[0].id,
                UpdateGuard::status(StageStatus::Pending),
                RecordPatch {
                    stage_status: Some(StageStatus::Delegated),
                    delegated_to: Some(UserId::new("deputy")),
                    delegated_by: Some(manager()),
                    ..RecordPatch::default()
                },
            )
            .await
            .unwrap();

        let updated = processor
            .decide(
                &records[0].id,
                &DecisionRequest::approve(None),
                &UserId::new("deputy"),
            )
            .await
            .unwrap();
        assert_eq!(updated.stage_status, StageStatus::Approved);
        assert_eq!(updated.approver_id, Some(UserId::new("deputy")));
    }
}
