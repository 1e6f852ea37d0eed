//! Escalation sweep: deadline-triggered reassignment
//!
//! Finds live records past their deadline that have never escalated,
//! resolves a target through the directory (the responsible actor's own
//! manager), and applies the escalation as a guarded update that
//! re-checks the deadline and `escalated_to IS NULL`. Overlapping
//! sweeps and racing decisions are therefore safe: each record
//! escalates at most once. The host application owns scheduling; this
//! is a plain callable.

use crate::{ApprovalResult, ApproverDirectory, NotificationGateway};
use approval_store::{ApprovalStore, RecordPatch, StorageError, UpdateGuard};
use approval_types::{ApprovalRecord, StageStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Sweeps overdue stages and reassigns them up the hierarchy
pub struct EscalationSweeper {
    store: Arc<dyn ApprovalStore>,
    directory: Arc<dyn ApproverDirectory>,
    notifier: Arc<dyn NotificationGateway>,
}

impl EscalationSweeper {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        directory: Arc<dyn ApproverDirectory>,
        notifier: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
        }
    }

    /// Run one sweep. Returns the count of successful escalations, not
    /// the count attempted: records without a target, records that
    /// raced away, and per-record failures are skipped and the sweep
    /// continues.
    pub async fn run(&self) -> ApprovalResult<usize> {
        let now = Utc::now();
        let overdue = self.store.find_overdue(now).await?;
        let scanned = overdue.len();

        let mut escalated = 0;
        for record in overdue {
            match self.escalate(&record, now).await {
                Ok(true) => escalated += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        record_id = %record.id,
                        expense_id = %record.expense_id,
                        error = %error,
                        "escalation failed, continuing sweep"
                    );
                }
            }
        }

        tracing::info!(scanned, escalated, "escalation sweep complete");
        Ok(escalated)
    }

    async fn escalate(&self, record: &ApprovalRecord, now: DateTime<Utc>) -> ApprovalResult<bool> {
        let Some(actor) = record.responsible_actor() else {
            tracing::warn!(
                record_id = %record.id,
                "overdue record has no responsible actor, skipping"
            );
            return Ok(false);
        };

        let Some(target) = self.directory.escalation_target(actor).await? else {
            tracing::info!(
                record_id = %record.id,
                actor = %actor,
                "no escalation target found, skipping"
            );
            return Ok(false);
        };

        let overdue_hours = record
            .stage_deadline
            .map(|deadline| (now - deadline).num_hours())
            .unwrap_or(0);
        let reason = format!(
            "Stage '{}' is {} hour(s) past its deadline; escalated to {}",
            record.stage_name, overdue_hours, target.name
        );

        let result = self
            .store
            .update_guarded(
                &record.id,
                UpdateGuard::overdue(now),
                RecordPatch {
                    stage_status: Some(StageStatus::Escalated),
                    escalated_to: Some(target.id.clone()),
                    escalated_at: Some(now),
                    escalation_reason: Some(reason),
                    ..RecordPatch::default()
                },
            )
            .await;

        let updated = match result {
            Ok(updated) => updated,
            // A decision or a concurrent sweep got there first.
            Err(StorageError::Conflict(_)) | Err(StorageError::NotFound(_)) => return Ok(false),
            Err(other) => return Err(other.into()),
        };

        tracing::info!(
            expense_id = %updated.expense_id,
            stage = updated.stage_number,
            target = %target.id,
            "overdue approval escalated"
        );

        if let Err(error) = self.notifier.notify_escalation(&updated, &target).await {
            tracing::warn!(
                expense_id = %updated.expense_id,
                error = %error,
                "escalation notification failed"
            );
        }
        Ok(true)
    }
}
