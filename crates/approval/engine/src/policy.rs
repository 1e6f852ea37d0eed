//! The built-in default approval policy
//!
//! When no organization template applies, amount and payment-type
//! thresholds decide between auto-approval and a 1–3 stage workflow
//! (manager → finance → executive). Thresholds live in an explicit
//! [`PolicyConfig`] value object passed in at construction, so tests
//! and multi-tenant overrides can vary them without process-wide state.

use crate::{ApprovalError, ApprovalResult, ApproverDirectory};
use approval_types::{
    ApproverRole, Expense, PaymentMethod, PaymentMethodType, User, WorkflowConfig, WorkflowStage,
    WorkflowType,
};
use std::collections::HashMap;

// ── Policy Configuration ─────────────────────────────────────────────

/// Threshold and timing configuration for the default policy
#[derive(Clone, Debug)]
pub struct PolicyConfig {
    /// Exclusive upper bound for auto-approval, per payment type.
    /// An amount equal to the threshold requires approval.
    pub auto_approval_thresholds: HashMap<PaymentMethodType, f64>,
    /// Above this, a Finance Review stage is added
    pub high_value_threshold: f64,
    /// Above this, an Executive Approval stage is added.
    /// The observed contract only pins 2500 (no stage) and 7500 (stage);
    /// 5000 is the documented choice in between.
    pub executive_threshold: f64,
    /// Manager-stage ceiling when the payment method carries no limit
    pub default_approval_limit: f64,
    pub stage_deadline_hours: i64,
    pub stage_escalation_hours: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let mut auto_approval_thresholds = HashMap::new();
        auto_approval_thresholds.insert(PaymentMethodType::PersonReimbursement, 50.0);
        auto_approval_thresholds.insert(PaymentMethodType::CreditCard, 200.0);
        auto_approval_thresholds.insert(PaymentMethodType::PurchaseOrder, 0.0);
        auto_approval_thresholds.insert(PaymentMethodType::DirectVendor, 100.0);

        Self {
            auto_approval_thresholds,
            high_value_threshold: 1000.0,
            executive_threshold: 5000.0,
            default_approval_limit: 5000.0,
            stage_deadline_hours: 48,
            stage_escalation_hours: 24,
        }
    }
}

impl PolicyConfig {
    /// The auto-approval threshold for a payment type (0.0 if unlisted)
    pub fn auto_approval_threshold(&self, method_type: PaymentMethodType) -> f64 {
        self.auto_approval_thresholds
            .get(&method_type)
            .copied()
            .unwrap_or(0.0)
    }
}

// ── Default Policy Builder ───────────────────────────────────────────

/// Builds the default workflow plan for one submission
#[derive(Clone, Debug)]
pub struct DefaultPolicyBuilder {
    config: PolicyConfig,
}

impl DefaultPolicyBuilder {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// The auto-approval decision, as a pure function of the amount and
    /// payment instrument. `Some(reason)` means no stages are needed.
    /// Purchase orders and requires-approval instruments never qualify.
    pub fn auto_approval_reason(&self, amount: f64, method: &PaymentMethod) -> Option<String> {
        if method.method_type == PaymentMethodType::PurchaseOrder || method.requires_approval {
            return None;
        }
        let threshold = self.config.auto_approval_threshold(method.method_type);
        if amount < threshold {
            Some(format!(
                "Amount ${:.2} is under auto-approval limit of ${:.2}",
                amount, threshold
            ))
        } else {
            None
        }
    }

    fn needs_finance_review(&self, amount: f64, method: &PaymentMethod) -> bool {
        amount > self.config.high_value_threshold
            || method.method_type == PaymentMethodType::PurchaseOrder
    }

    fn needs_executive_approval(&self, amount: f64) -> bool {
        amount > self.config.executive_threshold
    }

    /// Build the default plan: auto-approval or 1–3 stages.
    ///
    /// For fixed `(amount, payment type, requires_approval)` and a fixed
    /// directory answer, the resulting stage names and count are
    /// deterministic.
    pub async fn build(
        &self,
        expense: &Expense,
        method: &PaymentMethod,
        user: &User,
        directory: &dyn ApproverDirectory,
    ) -> ApprovalResult<WorkflowConfig> {
        if let Some(reason) = self.auto_approval_reason(expense.amount, method) {
            return Ok(WorkflowConfig::auto_approved(reason));
        }

        let mut stages = Vec::new();

        let managers = directory
            .resolve_approvers(ApproverRole::Manager, user)
            .await?;
        if managers.is_empty() {
            // A stage nobody could ever clear would silently strand the
            // expense; an empty reporting line is a directory problem.
            return Err(ApprovalError::Directory(format!(
                "no manager approvers found for user {}",
                user.id
            )));
        }
        let manager_limit = method
            .approval_limit
            .unwrap_or(self.config.default_approval_limit);
        stages.push(
            WorkflowStage::new(1, "Manager Approval")
                .with_description("Reporting-line review of the submitted expense")
                .with_approvers(managers)
                .with_approval_limit(manager_limit)
                .with_deadlines(
                    self.config.stage_deadline_hours,
                    self.config.stage_escalation_hours,
                ),
        );

        if self.needs_finance_review(expense.amount, method) {
            let finance = directory
                .resolve_approvers(ApproverRole::Finance, user)
                .await?;
            if finance.is_empty() {
                tracing::warn!(
                    expense_id = %expense.id,
                    "no finance approvers found, omitting Finance Review stage"
                );
            } else {
                stages.push(
                    WorkflowStage::new(stages.len() as u32 + 1, "Finance Review")
                        .with_description("Finance-team review of high-value spend")
                        .with_approvers(finance)
                        .with_deadlines(
                            self.config.stage_deadline_hours,
                            self.config.stage_escalation_hours,
                        ),
                );
            }
        }

        if self.needs_executive_approval(expense.amount) {
            let executives = directory
                .resolve_approvers(ApproverRole::Executive, user)
                .await?;
            if executives.is_empty() {
                tracing::warn!(
                    expense_id = %expense.id,
                    "no executive approvers found, omitting Executive Approval stage"
                );
            } else {
                // Executives cannot delegate: a deliberate control.
                stages.push(
                    WorkflowStage::new(stages.len() as u32 + 1, "Executive Approval")
                        .with_description("Executive sign-off on major spend")
                        .with_approvers(executives)
                        .with_deadlines(
                            self.config.stage_deadline_hours,
                            self.config.stage_escalation_hours,
                        )
                        .no_delegation(),
                );
            }
        }

        Ok(WorkflowConfig::staged(
            None,
            "Default Approval Workflow",
            WorkflowType::Default,
            stages,
        ))
    }
}
