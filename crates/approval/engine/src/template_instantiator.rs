//! Template instantiation: conditions in, stages out
//!
//! Evaluates each template stage's conditions against the submission
//! context; stages whose conditions fail are skipped entirely and do
//! not count toward `total_stages`. Approver rules resolve through the
//! directory into the concrete snapshot the stage record will carry.

use crate::{ApprovalResult, ApproverDirectory};
use approval_types::{
    ApproverRule, ConditionContext, Expense, PaymentMethod, User, WorkflowConfig, WorkflowStage,
    WorkflowTemplate, WorkflowType,
};

/// Turns an organization template into a workflow plan for one submission
#[derive(Clone, Debug, Default)]
pub struct TemplateInstantiator;

impl TemplateInstantiator {
    pub fn new() -> Self {
        Self
    }

    /// Emit the stages that apply to this submission, in template order.
    ///
    /// An all-skipped template yields a zero-stage, non-auto-approved
    /// config: "nothing to approve", distinct from auto-approval in
    /// `workflow_type` but equivalent in effect.
    pub async fn instantiate(
        &self,
        template: &WorkflowTemplate,
        expense: &Expense,
        payment_method: &PaymentMethod,
        user: &User,
        directory: &dyn ApproverDirectory,
    ) -> ApprovalResult<WorkflowConfig> {
        let ctx = ConditionContext::new(expense, payment_method, user);
        let mut stages = Vec::new();

        for spec in &template.stages {
            if !spec.conditions.iter().all(|c| c.evaluate(&ctx)) {
                tracing::debug!(
                    template = %template.id,
                    stage = %spec.name,
                    "stage conditions not met, skipping"
                );
                continue;
            }

            let approvers = match &spec.approver_rule {
                ApproverRule::Role(role) => directory.resolve_approvers(*role, user).await?,
                ApproverRule::Explicit(approvers) => approvers.clone(),
            };
            if approvers.is_empty() {
                tracing::warn!(
                    template = %template.id,
                    stage = %spec.name,
                    "approver rule resolved to nobody, omitting stage"
                );
                continue;
            }

            let stage_number = stages.len() as u32 + 1;
            let mut stage = WorkflowStage::new(stage_number, &spec.name)
                .with_description(&spec.description)
                .with_approvers(approvers)
                .with_deadlines(spec.deadline_hours, spec.escalation_hours)
                .with_conditions(spec.conditions.clone());
            stage.minimum_approvers = spec.minimum_approvers;
            stage.requires_all_approvers = spec.requires_all_approvers;
            stage.approval_limit = spec.approval_limit;
            stage.can_modify_amount = spec.can_modify_amount;
            stage.allow_delegation = spec.allow_delegation;
            stages.push(stage);
        }

        Ok(WorkflowConfig::staged(
            Some(template.id.clone()),
            &template.name,
            WorkflowType::Template,
            stages,
        )
        .with_notification_config(template.notification_config.clone()))
    }
}
