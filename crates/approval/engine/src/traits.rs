//! External collaborator interfaces
//!
//! The engine consumes, never implements, these: the organization's
//! directory (who is a manager/finance approver/executive), the
//! notification dispatcher, and the organization template store.

use crate::ApprovalResult;
use approval_types::{
    ApprovalRecord, Approver, ApproverRole, Expense, OrganizationId, PaymentMethod, User, UserId,
    WorkflowTemplate,
};
use async_trait::async_trait;

/// Resolves role-based approver sets for a submitting user's
/// organizational context.
///
/// Resolved sets are snapshots: the engine copies them onto stage
/// records at creation time and never re-resolves on decisions.
#[async_trait]
pub trait ApproverDirectory: Send + Sync {
    /// All approvers who may act for the role on this user's submissions.
    async fn resolve_approvers(
        &self,
        role: ApproverRole,
        user: &User,
    ) -> ApprovalResult<Vec<Approver>>;

    /// The escalation target for an overdue stage's responsible actor,
    /// e.g. that actor's own manager. `None` means no target exists.
    async fn escalation_target(&self, user: &UserId) -> ApprovalResult<Option<Approver>>;
}

/// Fire-and-forget notification dispatch.
///
/// Callers swallow and log failures; a failed notification never fails
/// the operation that triggered it.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify_stage_start(
        &self,
        record: &ApprovalRecord,
        approvers: &[Approver],
    ) -> ApprovalResult<()>;

    async fn notify_delegation(
        &self,
        record: &ApprovalRecord,
        delegate: &UserId,
    ) -> ApprovalResult<()>;

    async fn notify_escalation(
        &self,
        record: &ApprovalRecord,
        target: &Approver,
    ) -> ApprovalResult<()>;
}

/// Read-only access to organization-defined workflow templates.
///
/// Selection policy (most specific match, highest priority) is the
/// store's concern; the engine only asks whether anything applies.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn find_applicable_template(
        &self,
        organization_id: &OrganizationId,
        expense: &Expense,
        payment_method: &PaymentMethod,
    ) -> ApprovalResult<Option<WorkflowTemplate>>;
}
