//! Workflow instantiation: plan in, persisted records out
//!
//! Turns a [`WorkflowConfig`] into stage records inside one all-or-
//! nothing store transaction, or performs immediate auto-approval.
//! Only stage 1 is live at creation; every later stage waits in
//! `NotStarted` until progression activates it.

use crate::{ApprovalResult, NotificationGateway, PolicyConfig};
use approval_store::ApprovalStore;
use approval_types::{
    ApprovalRecord, Expense, PaymentStatus, RiskLevel, User, WorkflowConfig,
};
use chrono::Utc;
use std::sync::Arc;

/// Classify the spend risk of one stage record.
///
/// Pure: amount against the stage's approval ceiling, falling back to
/// the high-value threshold for uncapped stages.
pub fn assess_risk(amount: f64, approval_limit: Option<f64>, high_value_threshold: f64) -> RiskLevel {
    match approval_limit {
        Some(limit) if amount > limit => RiskLevel::High,
        Some(limit) if amount > limit * 0.5 => RiskLevel::Medium,
        Some(_) => RiskLevel::Low,
        None if amount > high_value_threshold => RiskLevel::Medium,
        None => RiskLevel::Low,
    }
}

/// Persists workflow plans as stage records
pub struct WorkflowInstantiator {
    store: Arc<dyn ApprovalStore>,
    notifier: Arc<dyn NotificationGateway>,
    config: PolicyConfig,
}

impl WorkflowInstantiator {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        notifier: Arc<dyn NotificationGateway>,
        config: PolicyConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Instantiate the plan for one expense.
    ///
    /// Zero-stage plans (auto-approval, or a template whose stages all
    /// skipped) insert a single terminal approved record and mark the
    /// expense approved in the same transaction. Staged plans insert one
    /// record per stage and mark the expense pending approval; the
    /// stage-1 start notification goes out after commit, best-effort.
    pub async fn instantiate(
        &self,
        expense: &Expense,
        config: &WorkflowConfig,
        user: &User,
    ) -> ApprovalResult<Vec<ApprovalRecord>> {
        let now = Utc::now();

        if config.is_empty() {
            let notes = config
                .auto_approval_reason
                .clone()
                .unwrap_or_else(|| "No approval stages applied".to_string());
            let record = ApprovalRecord::auto_approved(
                expense.id.clone(),
                expense.organization_id.clone(),
                config.workflow_id.clone(),
                notes,
                assess_risk(expense.amount, None, self.config.high_value_threshold),
                now,
            );
            self.store
                .create_workflow(vec![record.clone()], Some(PaymentStatus::Approved))
                .await?;
            tracing::info!(
                expense_id = %expense.id,
                submitted_by = %user.id,
                "expense approved without stages"
            );
            return Ok(vec![record]);
        }

        let mut records = Vec::with_capacity(config.stages.len());
        for stage in &config.stages {
            let risk = assess_risk(
                expense.amount,
                stage.approval_limit,
                self.config.high_value_threshold,
            );
            let mut record = ApprovalRecord::from_stage(
                expense.id.clone(),
                expense.organization_id.clone(),
                config.workflow_id.clone(),
                config.total_stages,
                stage,
                risk,
                now,
            );
            if stage.stage_number == 1 {
                record.activate(now);
            }
            records.push(record);
        }

        self.store
            .create_workflow(records.clone(), Some(PaymentStatus::PendingApproval))
            .await?;
        tracing::info!(
            expense_id = %expense.id,
            submitted_by = %user.id,
            workflow = %config.workflow_name,
            stages = config.total_stages,
            "approval workflow created"
        );

        let first = &records[0];
        if let Err(error) = self
            .notifier
            .notify_stage_start(first, &first.required_approvers)
            .await
        {
            tracing::warn!(
                expense_id = %expense.id,
                error = %error,
                "stage start notification failed"
            );
        }

        Ok(records)
    }
}
