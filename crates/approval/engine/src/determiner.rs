//! Workflow determination: template or default policy
//!
//! "No template found" is the common case, not an error — most
//! organizations run entirely on the default policy.

use crate::{
    ApprovalResult, ApproverDirectory, DefaultPolicyBuilder, PolicyConfig, TemplateInstantiator,
    TemplateSource,
};
use approval_types::{Expense, PaymentMethod, User, WorkflowConfig};
use std::sync::Arc;

/// Decides which workflow plan applies to a submission
pub struct WorkflowDeterminer {
    templates: Arc<dyn TemplateSource>,
    directory: Arc<dyn ApproverDirectory>,
    default_policy: DefaultPolicyBuilder,
    template_instantiator: TemplateInstantiator,
}

impl WorkflowDeterminer {
    pub fn new(
        templates: Arc<dyn TemplateSource>,
        directory: Arc<dyn ApproverDirectory>,
        config: PolicyConfig,
    ) -> Self {
        Self {
            templates,
            directory,
            default_policy: DefaultPolicyBuilder::new(config),
            template_instantiator: TemplateInstantiator::new(),
        }
    }

    /// Produce the plan for one submission: the organization's matching
    /// template if one applies, the default policy otherwise.
    pub async fn determine(
        &self,
        expense: &Expense,
        payment_method: &PaymentMethod,
        user: &User,
    ) -> ApprovalResult<WorkflowConfig> {
        match self
            .templates
            .find_applicable_template(&expense.organization_id, expense, payment_method)
            .await?
        {
            Some(template) => {
                tracing::info!(
                    expense_id = %expense.id,
                    template = %template.id,
                    "applying organization workflow template"
                );
                self.template_instantiator
                    .instantiate(
                        &template,
                        expense,
                        payment_method,
                        user,
                        self.directory.as_ref(),
                    )
                    .await
            }
            None => {
                self.default_policy
                    .build(expense, payment_method, user, self.directory.as_ref())
                    .await
            }
        }
    }
}
