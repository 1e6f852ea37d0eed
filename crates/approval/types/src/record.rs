//! Approval records: persisted stage instances
//!
//! One [`ApprovalRecord`] row exists per stage of one expense's
//! workflow. Records are created in bulk when the workflow is
//! instantiated, mutated in place by decisions, delegation, and
//! escalation, and never deleted — they are the audit trail.

use crate::{Approver, ExpenseId, OrganizationId, StageCondition, UserId, WorkflowTemplateId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── Record Identifier ────────────────────────────────────────────────

/// Unique identifier for an approval record
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalRecordId(pub String);

impl ApprovalRecordId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ApprovalRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Stage Status ─────────────────────────────────────────────────────

/// Lifecycle status of one stage record.
///
/// Only one record per expense is live (pending/delegated/escalated) at
/// a time; later stages wait in `NotStarted` until the progression
/// engine activates them. Approved and rejected are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Created but not yet activated by progression
    #[default]
    NotStarted,
    /// Live: awaiting a decision from the approver snapshot
    Pending,
    Approved,
    Rejected,
    /// Live: reassigned by an approver; the delegate may also act
    Delegated,
    /// Live: reassigned past-deadline; the escalation target may also act
    Escalated,
}

impl StageStatus {
    /// Terminal for this record: no further decisions accepted
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Awaiting an actor's decision
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Delegated | Self::Escalated)
    }
}

// ── Risk Level ───────────────────────────────────────────────────────

/// Coarse risk classification computed at instantiation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

// ── Approval Record ──────────────────────────────────────────────────

/// One persisted stage instance of one expense's workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: ApprovalRecordId,
    pub expense_id: ExpenseId,
    pub organization_id: OrganizationId,
    /// Source template, `None` for the built-in policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowTemplateId>,

    // Position
    pub stage_number: u32,
    pub total_stages: u32,
    pub stage_name: String,
    /// Extension point; the built-in policy never sets it
    pub is_parallel_approval: bool,

    // Authorization snapshot: copied at creation, never re-resolved
    pub required_approvers: Vec<Approver>,

    // Policy snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_limit: Option<f64>,
    pub can_modify_amount: bool,
    pub allow_delegation: bool,
    pub deadline_hours: i64,
    pub escalation_hours: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approval_conditions: Vec<StageCondition>,
    pub risk_level: RiskLevel,

    // Lifecycle
    pub stage_status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_deadline: Option<DateTime<Utc>>,

    // Decision outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    // Delegation trail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated_to: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_reason: Option<String>,

    // Escalation trail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_to: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<String>,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRecord {
    /// Create a not-yet-started record for one planned stage.
    ///
    /// The stage snapshot (approvers, limits, timing) is copied in full;
    /// progression activates the record later without consulting the
    /// plan again.
    pub fn from_stage(
        expense_id: ExpenseId,
        organization_id: OrganizationId,
        workflow_id: Option<WorkflowTemplateId>,
        total_stages: u32,
        stage: &crate::WorkflowStage,
        risk_level: RiskLevel,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApprovalRecordId::generate(),
            expense_id,
            organization_id,
            workflow_id,
            stage_number: stage.stage_number,
            total_stages,
            stage_name: stage.stage_name.clone(),
            is_parallel_approval: false,
            required_approvers: stage.required_approvers.clone(),
            approval_limit: stage.approval_limit,
            can_modify_amount: stage.can_modify_amount,
            allow_delegation: stage.allow_delegation,
            deadline_hours: stage.deadline_hours,
            escalation_hours: stage.escalation_hours,
            approval_conditions: stage.conditions.clone(),
            risk_level,
            stage_status: StageStatus::NotStarted,
            stage_started_at: None,
            stage_deadline: None,
            approver_id: None,
            approved_at: None,
            rejected_at: None,
            approval_notes: None,
            approved_amount: None,
            rejection_reason: None,
            delegated_to: None,
            delegated_by: None,
            delegated_at: None,
            delegation_reason: None,
            escalated_to: None,
            escalated_at: None,
            escalation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create the single terminal record of an auto-approved workflow
    pub fn auto_approved(
        expense_id: ExpenseId,
        organization_id: OrganizationId,
        workflow_id: Option<WorkflowTemplateId>,
        notes: impl Into<String>,
        risk_level: RiskLevel,
        now: DateTime<Utc>,
    ) -> Self {
        let stage = crate::WorkflowStage::new(1, "Auto Approval");
        let mut record = Self::from_stage(
            expense_id,
            organization_id,
            workflow_id,
            1,
            &stage,
            risk_level,
            now,
        );
        record.stage_status = StageStatus::Approved;
        record.stage_started_at = Some(now);
        record.approved_at = Some(now);
        record.approval_notes = Some(notes.into());
        record
    }

    /// Make this record live: pending, with its deadline computed from
    /// the snapshot's `deadline_hours`.
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.stage_status = StageStatus::Pending;
        self.stage_started_at = Some(now);
        self.stage_deadline = Some(now + Duration::hours(self.deadline_hours));
        self.updated_at = now;
    }

    // ── Query methods ────────────────────────────────────────────────

    /// Awaiting a decision (pending, delegated, or escalated)
    pub fn is_live(&self) -> bool {
        self.stage_status.is_live()
    }

    /// The final stage of its workflow
    pub fn is_final_stage(&self) -> bool {
        self.stage_number == self.total_stages
    }

    /// Whether the user appears in the creation-time approver snapshot
    pub fn in_approver_snapshot(&self, user: &UserId) -> bool {
        self.required_approvers.iter().any(|a| &a.id == user)
    }

    /// Whether the user may decide this record.
    ///
    /// The snapshot stays authoritative; delegation and escalation add
    /// eligibility for the new actor through the trail fields rather
    /// than rewriting the snapshot.
    pub fn is_authorized(&self, user: &UserId) -> bool {
        self.in_approver_snapshot(user)
            || self.delegated_to.as_ref() == Some(user)
            || self.escalated_to.as_ref() == Some(user)
    }

    /// Whether this record is currently waiting on the given user:
    /// a pending stage whose snapshot contains them, or a stage
    /// delegated or escalated to them.
    pub fn is_awaiting(&self, user: &UserId) -> bool {
        match self.stage_status {
            StageStatus::Pending => self.in_approver_snapshot(user),
            StageStatus::Delegated => self.delegated_to.as_ref() == Some(user),
            StageStatus::Escalated => self.escalated_to.as_ref() == Some(user),
            _ => false,
        }
    }

    /// The user currently responsible for acting on this record:
    /// the escalation target, else the delegate, else the first
    /// snapshot approver.
    pub fn responsible_actor(&self) -> Option<&UserId> {
        self.escalated_to
            .as_ref()
            .or(self.delegated_to.as_ref())
            .or_else(|| self.required_approvers.first().map(|a| &a.id))
    }

    /// Past its deadline and not yet escalated
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_live()
            && self.escalated_to.is_none()
            && self.stage_deadline.map(|d| d < now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Approver, ApproverRole, WorkflowStage};

    fn make_record() -> ApprovalRecord {
        let stage = WorkflowStage::new(1, "Manager Approval").with_approvers(vec![
            Approver::new("mgr-1", "Mo", "mo@example.com", ApproverRole::Manager),
            Approver::new("mgr-2", "Lee", "lee@example.com", ApproverRole::Manager),
        ]);
        ApprovalRecord::from_stage(
            ExpenseId::new("exp-1"),
            OrganizationId::new("org-1"),
            None,
            2,
            &stage,
            RiskLevel::Low,
            Utc::now(),
        )
    }

    #[test]
    fn test_new_record_is_not_started() {
        let record = make_record();
        assert_eq!(record.stage_status, StageStatus::NotStarted);
        assert!(record.stage_started_at.is_none());
        assert!(record.stage_deadline.is_none());
        assert!(!record.is_live());
    }

    #[test]
    fn test_activate_sets_deadline_from_snapshot() {
        let mut record = make_record();
        let now = Utc::now();
        record.activate(now);

        assert_eq!(record.stage_status, StageStatus::Pending);
        assert_eq!(record.stage_started_at, Some(now));
        assert_eq!(record.stage_deadline, Some(now + Duration::hours(48)));
        assert!(record.is_live());
    }

    #[test]
    fn test_authorization_uses_snapshot() {
        let record = make_record();
        assert!(record.is_authorized(&UserId::new("mgr-1")));
        assert!(record.is_authorized(&UserId::new("mgr-2")));
        assert!(!record.is_authorized(&UserId::new("intruder")));
    }

    #[test]
    fn test_delegation_adds_eligibility() {
        let mut record = make_record();
        record.delegated_to = Some(UserId::new("deputy"));

        // The delegate is eligible and so is the original snapshot.
        assert!(record.is_authorized(&UserId::new("deputy")));
        assert!(record.is_authorized(&UserId::new("mgr-1")));
    }

    #[test]
    fn test_responsible_actor_precedence() {
        let mut record = make_record();
        assert_eq!(record.responsible_actor(), Some(&UserId::new("mgr-1")));

        record.delegated_to = Some(UserId::new("deputy"));
        assert_eq!(record.responsible_actor(), Some(&UserId::new("deputy")));

        record.escalated_to = Some(UserId::new("boss"));
        assert_eq!(record.responsible_actor(), Some(&UserId::new("boss")));
    }

    #[test]
    fn test_overdue_detection() {
        let mut record = make_record();
        let now = Utc::now();

        // Not started: never overdue.
        assert!(!record.is_overdue(now));

        record.activate(now - Duration::hours(72));
        assert!(record.is_overdue(now));

        // Escalated records are not re-escalated.
        record.escalated_to = Some(UserId::new("boss"));
        assert!(!record.is_overdue(now));
    }

    #[test]
    fn test_auto_approved_record() {
        let record = ApprovalRecord::auto_approved(
            ExpenseId::new("exp-1"),
            OrganizationId::new("org-1"),
            None,
            "Amount $25.00 is under auto-approval limit of $200.00",
            RiskLevel::Low,
            Utc::now(),
        );
        assert_eq!(record.stage_status, StageStatus::Approved);
        assert_eq!(record.stage_number, 1);
        assert_eq!(record.total_stages, 1);
        assert!(record.approved_at.is_some());
        assert!(record.approval_notes.is_some());
    }

    #[test]
    fn test_status_predicates() {
        assert!(StageStatus::Approved.is_terminal());
        assert!(StageStatus::Rejected.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(StageStatus::Pending.is_live());
        assert!(StageStatus::Delegated.is_live());
        assert!(StageStatus::Escalated.is_live());
        assert!(!StageStatus::NotStarted.is_live());
        assert_eq!(StageStatus::default(), StageStatus::NotStarted);
    }
}
