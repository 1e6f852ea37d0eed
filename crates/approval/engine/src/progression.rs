//! Stage progression: advance or terminate after a terminal decision
//!
//! The only component that reads `total_stages` to decide termination,
//! and it reads it from the record snapshot — a workflow's shape is
//! immutable once instantiated. Rejected stages terminate the whole
//! workflow; later records are left `NotStarted` as part of the audit
//! trail, never cancelled or deleted.

use crate::{ApprovalError, ApprovalResult, NotificationGateway};
use approval_store::{ApprovalStore, RecordPatch, UpdateGuard};
use approval_types::{ApprovalRecord, PaymentStatus, StageStatus};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Advances workflows after each stage's terminal decision
pub struct ProgressionEngine {
    store: Arc<dyn ApprovalStore>,
    notifier: Arc<dyn NotificationGateway>,
}

impl ProgressionEngine {
    pub fn new(store: Arc<dyn ApprovalStore>, notifier: Arc<dyn NotificationGateway>) -> Self {
        Self { store, notifier }
    }

    /// Act on a record that just reached a terminal decision.
    pub async fn advance(&self, record: &ApprovalRecord) -> ApprovalResult<()> {
        match record.stage_status {
            StageStatus::Rejected => {
                self.store
                    .set_payment_status(&record.expense_id, PaymentStatus::Rejected)
                    .await?;
                tracing::info!(
                    expense_id = %record.expense_id,
                    stage = record.stage_number,
                    "workflow rejected"
                );
                Ok(())
            }
            StageStatus::Approved if record.is_final_stage() => {
                self.store
                    .set_payment_status(&record.expense_id, PaymentStatus::Approved)
                    .await?;
                tracing::info!(
                    expense_id = %record.expense_id,
                    stages = record.total_stages,
                    "workflow completed"
                );
                Ok(())
            }
            StageStatus::Approved => self.start_next_stage(record).await,
            other => Err(ApprovalError::Validation(format!(
                "progression requires a terminal stage decision, found {:?}",
                other
            ))),
        }
    }

    /// Activate stage n+1: the write-once transition out of `NotStarted`.
    ///
    /// No other actor ever writes to a not-yet-started record, so this
    /// guarded update cannot race with decisions or escalation.
    async fn start_next_stage(&self, record: &ApprovalRecord) -> ApprovalResult<()> {
        let next_number = record.stage_number + 1;
        let next = self
            .store
            .find_stage(&record.expense_id, next_number)
            .await?
            .ok_or_else(|| {
                ApprovalError::NotFound(format!(
                    "stage {} of expense {} not found",
                    next_number, record.expense_id
                ))
            })?;

        let now = Utc::now();
        let updated = self
            .store
            .update_guarded(
                &next.id,
                UpdateGuard::status(StageStatus::NotStarted),
                RecordPatch {
                    stage_status: Some(StageStatus::Pending),
                    stage_started_at: Some(now),
                    stage_deadline: Some(now + Duration::hours(next.deadline_hours)),
                    ..RecordPatch::default()
                },
            )
            .await?;

        tracing::info!(
            expense_id = %record.expense_id,
            stage = next_number,
            stage_name = %updated.stage_name,
            "next approval stage started"
        );

        if let Err(error) = self
            .notifier
            .notify_stage_start(&updated, &updated.required_approvers)
            .await
        {
            tracing::warn!(
                expense_id = %record.expense_id,
                error = %error,
                "stage start notification failed"
            );
        }
        Ok(())
    }
}
