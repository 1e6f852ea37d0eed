//! The approval service: one facade over the whole engine
//!
//! Composes the determiner, instantiator, decision processor,
//! delegation manager, and escalation sweeper behind the operations
//! the request-handling layer exposes. The service owns no state of
//! its own; everything lives in the store.

use crate::{
    ApprovalResult, ApproverDirectory, DecisionProcessor, DecisionRequest, DelegationManager,
    EscalationSweeper, NotificationGateway, PolicyConfig, TemplateSource, WorkflowDeterminer,
    WorkflowInstantiator,
};
use approval_store::{ApprovalStore, PendingFilter};
use approval_types::{
    ApprovalRecord, ApprovalRecordId, Expense, ExpenseId, PaymentMethod, User, UserId,
};
use std::sync::Arc;

/// The engine's public surface
pub struct ApprovalService {
    store: Arc<dyn ApprovalStore>,
    determiner: WorkflowDeterminer,
    instantiator: WorkflowInstantiator,
    decisions: DecisionProcessor,
    delegations: DelegationManager,
    sweeper: EscalationSweeper,
}

impl ApprovalService {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        directory: Arc<dyn ApproverDirectory>,
        notifier: Arc<dyn NotificationGateway>,
        templates: Arc<dyn TemplateSource>,
        config: PolicyConfig,
    ) -> Self {
        Self {
            determiner: WorkflowDeterminer::new(templates, directory.clone(), config.clone()),
            instantiator: WorkflowInstantiator::new(store.clone(), notifier.clone(), config),
            decisions: DecisionProcessor::new(store.clone(), notifier.clone()),
            delegations: DelegationManager::new(store.clone(), notifier.clone()),
            sweeper: EscalationSweeper::new(store.clone(), directory, notifier),
            store,
        }
    }

    /// Determine the workflow for a submission and persist it: the full
    /// submission → stage records pipeline.
    pub async fn determine_and_create_workflow(
        &self,
        expense: &Expense,
        payment_method: &PaymentMethod,
        user: &User,
    ) -> ApprovalResult<Vec<ApprovalRecord>> {
        let config = self
            .determiner
            .determine(expense, payment_method, user)
            .await?;
        self.instantiator.instantiate(expense, &config, user).await
    }

    /// Apply one approve/reject decision.
    pub async fn decide(
        &self,
        record_id: &ApprovalRecordId,
        request: &DecisionRequest,
        acting_user: &UserId,
    ) -> ApprovalResult<ApprovalRecord> {
        self.decisions.decide(record_id, request, acting_user).await
    }

    /// Delegate one pending record to another user.
    pub async fn delegate(
        &self,
        record_id: &ApprovalRecordId,
        delegate_user: &UserId,
        delegating_user: &UserId,
        reason: impl Into<String>,
    ) -> ApprovalResult<ApprovalRecord> {
        self.delegations
            .delegate(record_id, delegate_user, delegating_user, reason)
            .await
    }

    /// Run one escalation sweep; the host owns the schedule.
    pub async fn run_escalation_sweep(&self) -> ApprovalResult<usize> {
        self.sweeper.run().await
    }

    /// Records currently awaiting the given user.
    pub async fn pending_approvals_for_user(
        &self,
        user: &UserId,
        filter: PendingFilter,
    ) -> ApprovalResult<Vec<ApprovalRecord>> {
        Ok(self.store.find_pending_for_user(user, filter).await?)
    }

    /// The full audit trail for one expense, in stage order.
    pub async fn approval_history(
        &self,
        expense_id: &ExpenseId,
    ) -> ApprovalResult<Vec<ApprovalRecord>> {
        Ok(self.store.list_for_expense(expense_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::{make_expense, make_user, RecordingNotifier, StaticDirectory, StaticTemplates};
    use crate::ApprovalError;
    use approval_store::InMemoryApprovalStore;
    use approval_types::{PaymentMethodType, PaymentStatus, StageStatus};

    fn make_service(store: Arc<InMemoryApprovalStore>) -> ApprovalService {
        ApprovalService::new(
            store,
            Arc::new(StaticDirectory::fully_staffed()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(StaticTemplates::none()),
            PolicyConfig::default(),
        )
    }

    fn card() -> PaymentMethod {
        PaymentMethod::new(PaymentMethodType::CreditCard)
    }

    #[tokio::test]
    async fn scenario_a_small_card_expense_auto_approves() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let service = make_service(store.clone());
        let expense = make_expense(25.0);

        let records = service
            .determine_and_create_workflow(&expense, &card(), &make_user())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stage_status, StageStatus::Approved);
        assert_eq!(
            store.payment_status(&expense.id).await.unwrap(),
            Some(PaymentStatus::Approved)
        );
    }

    #[tokio::test]
    async fn scenario_b_single_stage_workflow_completes_on_approval() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let service = make_service(store.clone());
        let expense = make_expense(150.0);

        // $150 on an instrument flagged requires-approval: one manager
        // stage, no finance review.
        let method = card().requiring_approval();
        let records = service
            .determine_and_create_workflow(&expense, &method, &make_user())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stage_name, "Manager Approval");
        assert_eq!(records[0].stage_status, StageStatus::Pending);

        service
            .decide(
                &records[0].id,
                &DecisionRequest::approve(Some(150.0)),
                &UserId::new("mgr-1"),
            )
            .await
            .unwrap();
        assert_eq!(
            store.payment_status(&expense.id).await.unwrap(),
            Some(PaymentStatus::Approved)
        );
    }

    #[tokio::test]
    async fn scenario_c_two_stage_workflow_progresses_then_completes() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let service = make_service(store.clone());
        let expense = make_expense(2500.0);

        let records = service
            .determine_and_create_workflow(&expense, &card(), &make_user())
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stage_name, "Manager Approval");
        assert_eq!(records[1].stage_name, "Finance Review");
        assert_eq!(records[0].stage_status, StageStatus::Pending);
        assert_eq!(records[1].stage_status, StageStatus::NotStarted);

        service
            .decide(
                &records[0].id,
                &DecisionRequest::approve(Some(2500.0)),
                &UserId::new("mgr-1"),
            )
            .await
            .unwrap();

        let history = service.approval_history(&expense.id).await.unwrap();
        assert_eq!(history[0].stage_status, StageStatus::Approved);
        assert_eq!(history[1].stage_status, StageStatus::Pending);
        assert_eq!(
            store.payment_status(&expense.id).await.unwrap(),
            Some(PaymentStatus::PendingApproval)
        );

        service
            .decide(
                &history[1].id,
                &DecisionRequest::approve(Some(2500.0)),
                &UserId::new("fin-1"),
            )
            .await
            .unwrap();
        assert_eq!(
            store.payment_status(&expense.id).await.unwrap(),
            Some(PaymentStatus::Approved)
        );
    }

    #[tokio::test]
    async fn scenario_d_executive_stage_forbids_delegation() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let service = make_service(store.clone());
        let expense = make_expense(7500.0);

        let records = service
            .determine_and_create_workflow(&expense, &card(), &make_user())
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].stage_name, "Executive Approval");
        assert!(!records[2].allow_delegation);

        // Walk the workflow to the executive stage.
        service
            .decide(
                &records[0].id,
                &DecisionRequest::approve(None),
                &UserId::new("mgr-1"),
            )
            .await
            .unwrap();
        service
            .decide(
                &records[1].id,
                &DecisionRequest::approve(None),
                &UserId::new("fin-1"),
            )
            .await
            .unwrap();

        let result = service
            .delegate(
                &records[2].id,
                &UserId::new("deputy"),
                &UserId::new("exec-1"),
                "conflict of interest",
            )
            .await;
        assert!(matches!(result, Err(ApprovalError::Validation(_))));
    }

    #[tokio::test]
    async fn rejection_short_circuits_and_leaves_later_stages_untouched() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let service = make_service(store.clone());
        let expense = make_expense(7500.0);

        let records = service
            .determine_and_create_workflow(&expense, &card(), &make_user())
            .await
            .unwrap();
        assert_eq!(records.len(), 3);

        service
            .decide(
                &records[0].id,
                &DecisionRequest::reject("Out of policy"),
                &UserId::new("mgr-1"),
            )
            .await
            .unwrap();

        assert_eq!(
            store.payment_status(&expense.id).await.unwrap(),
            Some(PaymentStatus::Rejected)
        );
        let history = service.approval_history(&expense.id).await.unwrap();
        assert_eq!(history[0].stage_status, StageStatus::Rejected);
        assert_eq!(history[1].stage_status, StageStatus::NotStarted);
        assert_eq!(history[2].stage_status, StageStatus::NotStarted);
    }

    #[tokio::test]
    async fn delegation_scopes_to_one_record() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let service = make_service(store.clone());
        let expense = make_expense(2500.0);

        let records = service
            .determine_and_create_workflow(&expense, &card(), &make_user())
            .await
            .unwrap();

        service
            .delegate(
                &records[0].id,
                &UserId::new("deputy"),
                &UserId::new("mgr-1"),
                "On leave",
            )
            .await
            .unwrap();

        // The deputy may decide stage 1...
        service
            .decide(
                &records[0].id,
                &DecisionRequest::approve(None),
                &UserId::new("deputy"),
            )
            .await
            .unwrap();

        // ...but holds no authority on stage 2.
        let result = service
            .decide(
                &records[1].id,
                &DecisionRequest::approve(None),
                &UserId::new("deputy"),
            )
            .await;
        assert!(matches!(result, Err(ApprovalError::Authorization(_))));
    }

    #[tokio::test]
    async fn pending_queue_follows_the_live_stage() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let service = make_service(store.clone());
        let expense = make_expense(2500.0);

        let records = service
            .determine_and_create_workflow(&expense, &card(), &make_user())
            .await
            .unwrap();

        let manager_queue = service
            .pending_approvals_for_user(&UserId::new("mgr-1"), PendingFilter::default())
            .await
            .unwrap();
        assert_eq!(manager_queue.len(), 1);

        let finance_queue = service
            .pending_approvals_for_user(&UserId::new("fin-1"), PendingFilter::default())
            .await
            .unwrap();
        assert!(finance_queue.is_empty());

        service
            .decide(
                &records[0].id,
                &DecisionRequest::approve(None),
                &UserId::new("mgr-1"),
            )
            .await
            .unwrap();

        let finance_queue = service
            .pending_approvals_for_user(&UserId::new("fin-1"), PendingFilter::default())
            .await
            .unwrap();
        assert_eq!(finance_queue.len(), 1);
        assert_eq!(finance_queue[0].stage_name, "Finance Review");
    }
}
