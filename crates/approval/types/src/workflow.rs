//! Workflow plans: the output of determination
//!
//! A [`WorkflowConfig`] is the in-memory, not-yet-persisted plan the
//! determiner produces for one expense: either an auto-approval
//! decision or an ordered list of [`WorkflowStage`]s. The instantiator
//! turns the plan into persisted stage records; the plan itself is
//! never stored.

use crate::{Approver, StageCondition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Template Identifier ──────────────────────────────────────────────

/// Unique identifier for an organization-defined workflow template
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowTemplateId(pub String);

impl WorkflowTemplateId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for WorkflowTemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow Type ────────────────────────────────────────────────────

/// How the workflow plan was sourced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// Zero stages, approved at creation
    AutoApproval,
    /// The built-in amount/payment-type policy
    Default,
    /// An organization-defined template
    Template,
}

// ── Workflow Stage (plan) ────────────────────────────────────────────

/// One planned approval stage, before persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowStage {
    /// 1-based position in the stage sequence
    pub stage_number: u32,
    pub stage_name: String,
    pub description: String,
    /// Eligible approvers, resolved at plan time
    pub required_approvers: Vec<Approver>,
    /// How many of the eligible approvers must act (any one by default)
    pub minimum_approvers: u32,
    pub requires_all_approvers: bool,
    /// Monetary ceiling this stage may approve without further escalation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_limit: Option<f64>,
    pub can_modify_amount: bool,
    pub deadline_hours: i64,
    pub escalation_hours: i64,
    pub allow_delegation: bool,
    /// Predicates that admitted this stage (template stages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StageCondition>,
}

impl WorkflowStage {
    pub fn new(stage_number: u32, stage_name: impl Into<String>) -> Self {
        Self {
            stage_number,
            stage_name: stage_name.into(),
            description: String::new(),
            required_approvers: Vec::new(),
            minimum_approvers: 1,
            requires_all_approvers: false,
            approval_limit: None,
            can_modify_amount: false,
            deadline_hours: 48,
            escalation_hours: 24,
            allow_delegation: true,
            conditions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_approvers(mut self, approvers: Vec<Approver>) -> Self {
        self.required_approvers = approvers;
        self
    }

    pub fn with_approval_limit(mut self, limit: f64) -> Self {
        self.approval_limit = Some(limit);
        self
    }

    pub fn with_deadlines(mut self, deadline_hours: i64, escalation_hours: i64) -> Self {
        self.deadline_hours = deadline_hours;
        self.escalation_hours = escalation_hours;
        self
    }

    pub fn can_modify_amount(mut self) -> Self {
        self.can_modify_amount = true;
        self
    }

    pub fn no_delegation(mut self) -> Self {
        self.allow_delegation = false;
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<StageCondition>) -> Self {
        self.conditions = conditions;
        self
    }
}

// ── Workflow Config (plan) ───────────────────────────────────────────

/// The determined approval plan for one expense
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Set for template-sourced plans, `None` for the built-in policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowTemplateId>,
    pub workflow_name: String,
    pub workflow_type: WorkflowType,
    pub total_stages: u32,
    pub stages: Vec<WorkflowStage>,
    pub auto_approved: bool,
    /// Present iff `auto_approved`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_approval_reason: Option<String>,
    /// Opaque passthrough to the notification gateway
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub notification_config: Value,
}

impl WorkflowConfig {
    /// An auto-approval plan: zero stages, approved at creation
    pub fn auto_approved(reason: impl Into<String>) -> Self {
        Self {
            workflow_id: None,
            workflow_name: "Auto Approval".to_string(),
            workflow_type: WorkflowType::AutoApproval,
            total_stages: 0,
            stages: Vec::new(),
            auto_approved: true,
            auto_approval_reason: Some(reason.into()),
            notification_config: Value::Null,
        }
    }

    /// A staged plan from the given source
    pub fn staged(
        workflow_id: Option<WorkflowTemplateId>,
        workflow_name: impl Into<String>,
        workflow_type: WorkflowType,
        stages: Vec<WorkflowStage>,
    ) -> Self {
        Self {
            workflow_id,
            workflow_name: workflow_name.into(),
            workflow_type,
            total_stages: stages.len() as u32,
            stages,
            auto_approved: false,
            auto_approval_reason: None,
            notification_config: Value::Null,
        }
    }

    pub fn with_notification_config(mut self, config: Value) -> Self {
        self.notification_config = config;
        self
    }

    /// A plan with nothing to approve: auto-approved, or every template
    /// stage's conditions evaluated false.
    pub fn is_empty(&self) -> bool {
        self.total_stages == 0
    }
}
