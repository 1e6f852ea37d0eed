//! Store trait and the guarded-update vocabulary
//!
//! Every mutation of a live record goes through [`ApprovalStore::update_guarded`]:
//! a single conditional update ("update where id = X and stage_status in (...)
//! and ...") so that two concurrent actors race safely — exactly one
//! succeeds, the other observes a conflict. Idempotency comes from this
//! discipline, not from retries.

use crate::StorageResult;
use approval_types::{
    ApprovalRecord, ApprovalRecordId, ExpenseId, OrganizationId, PaymentStatus, StageStatus, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ── Update Guard ─────────────────────────────────────────────────────

/// The WHERE clause of a conditional record update.
#[derive(Debug, Clone, Default)]
pub struct UpdateGuard {
    /// Current status must be one of these
    pub statuses: Vec<StageStatus>,
    /// Stage deadline must exist and be strictly before this instant
    pub deadline_before: Option<DateTime<Utc>>,
    /// `escalated_to` must be unset
    pub not_escalated: bool,
}

impl UpdateGuard {
    /// Require exactly one current status.
    pub fn status(status: StageStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    /// Require one of several current statuses.
    pub fn statuses(statuses: Vec<StageStatus>) -> Self {
        Self {
            statuses,
            ..Self::default()
        }
    }

    /// The escalation sweep guard: live, past deadline, never escalated.
    pub fn overdue(now: DateTime<Utc>) -> Self {
        Self {
            statuses: vec![StageStatus::Pending, StageStatus::Delegated],
            deadline_before: Some(now),
            not_escalated: true,
        }
    }

    /// Whether the guard admits the record's current state.
    pub fn admits(&self, record: &ApprovalRecord) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&record.stage_status) {
            return false;
        }
        if let Some(cutoff) = self.deadline_before {
            match record.stage_deadline {
                Some(deadline) if deadline < cutoff => {}
                _ => return false,
            }
        }
        if self.not_escalated && record.escalated_to.is_some() {
            return false;
        }
        true
    }
}

// ── Record Patch ─────────────────────────────────────────────────────

/// Field updates applied by a guarded update. Unset fields are left
/// untouched; `updated_at` is always stamped.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub stage_status: Option<StageStatus>,
    pub stage_started_at: Option<DateTime<Utc>>,
    pub stage_deadline: Option<DateTime<Utc>>,

    pub approver_id: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub approval_notes: Option<String>,
    pub approved_amount: Option<f64>,
    pub rejection_reason: Option<String>,

    pub delegated_to: Option<UserId>,
    pub delegated_by: Option<UserId>,
    pub delegated_at: Option<DateTime<Utc>>,
    pub delegation_reason: Option<String>,

    pub escalated_to: Option<UserId>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub escalation_reason: Option<String>,
}

impl RecordPatch {
    /// Apply the patch in place, stamping `updated_at`.
    pub fn apply_to(&self, record: &mut ApprovalRecord, now: DateTime<Utc>) {
        if let Some(status) = self.stage_status {
            record.stage_status = status;
        }
        if let Some(at) = self.stage_started_at {
            record.stage_started_at = Some(at);
        }
        if let Some(deadline) = self.stage_deadline {
            record.stage_deadline = Some(deadline);
        }
        if let Some(ref id) = self.approver_id {
            record.approver_id = Some(id.clone());
        }
        if let Some(at) = self.approved_at {
            record.approved_at = Some(at);
        }
        if let Some(at) = self.rejected_at {
            record.rejected_at = Some(at);
        }
        if let Some(ref notes) = self.approval_notes {
            record.approval_notes = Some(notes.clone());
        }
        if let Some(amount) = self.approved_amount {
            record.approved_amount = Some(amount);
        }
        if let Some(ref reason) = self.rejection_reason {
            record.rejection_reason = Some(reason.clone());
        }
        if let Some(ref to) = self.delegated_to {
            record.delegated_to = Some(to.clone());
        }
        if let Some(ref by) = self.delegated_by {
            record.delegated_by = Some(by.clone());
        }
        if let Some(at) = self.delegated_at {
            record.delegated_at = Some(at);
        }
        if let Some(ref reason) = self.delegation_reason {
            record.delegation_reason = Some(reason.clone());
        }
        if let Some(ref to) = self.escalated_to {
            record.escalated_to = Some(to.clone());
        }
        if let Some(at) = self.escalated_at {
            record.escalated_at = Some(at);
        }
        if let Some(ref reason) = self.escalation_reason {
            record.escalation_reason = Some(reason.clone());
        }
        record.updated_at = now;
    }
}

// ── Query Filters ────────────────────────────────────────────────────

/// Filters for the pending-approvals-for-user query.
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    pub organization_id: Option<OrganizationId>,
}

// ── Store Trait ──────────────────────────────────────────────────────

/// Storage interface for approval records and expense payment status.
///
/// Implementations must provide all-or-nothing semantics for
/// [`create_workflow`](Self::create_workflow) and single-statement
/// atomicity for [`update_guarded`](Self::update_guarded).
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Insert all stage records of one workflow atomically, optionally
    /// setting the owning expense's payment status in the same
    /// transaction. Fails with `Conflict` if any record id or
    /// (expense, stage) pair already exists; nothing is visible on
    /// failure.
    async fn create_workflow(
        &self,
        records: Vec<ApprovalRecord>,
        payment_status: Option<PaymentStatus>,
    ) -> StorageResult<()>;

    /// Get one record by id.
    async fn get(&self, id: &ApprovalRecordId) -> StorageResult<Option<ApprovalRecord>>;

    /// All records for an expense, in stage order.
    async fn list_for_expense(&self, expense_id: &ExpenseId)
        -> StorageResult<Vec<ApprovalRecord>>;

    /// The record at one stage position of an expense's workflow.
    async fn find_stage(
        &self,
        expense_id: &ExpenseId,
        stage_number: u32,
    ) -> StorageResult<Option<ApprovalRecord>>;

    /// Atomic conditional update. Returns the updated record; `NotFound`
    /// if no such record, `Conflict` if the guard rejects its current
    /// state.
    async fn update_guarded(
        &self,
        id: &ApprovalRecordId,
        guard: UpdateGuard,
        patch: RecordPatch,
    ) -> StorageResult<ApprovalRecord>;

    /// Live records past their deadline and not yet escalated.
    async fn find_overdue(&self, now: DateTime<Utc>) -> StorageResult<Vec<ApprovalRecord>>;

    /// Records currently awaiting the given user: pending stages whose
    /// snapshot contains them, plus stages delegated or escalated to
    /// them. Soonest deadline first.
    async fn find_pending_for_user(
        &self,
        user: &UserId,
        filter: PendingFilter,
    ) -> StorageResult<Vec<ApprovalRecord>>;

    /// Set the expense's payment status.
    async fn set_payment_status(
        &self,
        expense_id: &ExpenseId,
        status: PaymentStatus,
    ) -> StorageResult<()>;

    /// The expense's payment status, if this engine has written one.
    async fn payment_status(&self, expense_id: &ExpenseId)
        -> StorageResult<Option<PaymentStatus>>;
}
