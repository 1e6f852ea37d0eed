//! Organization-defined workflow templates
//!
//! Templates are authored per organization and held by the template
//! store (an external collaborator — read-only to this engine). Each
//! template stage carries conditions deciding whether it applies to a
//! given submission, and an approver rule the directory resolves into a
//! concrete approver set at instantiation time.

use crate::{Approver, ApproverRole, OrganizationId, StageCondition, WorkflowTemplateId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A multi-stage approval template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: WorkflowTemplateId,
    pub organization_id: OrganizationId,
    pub name: String,
    /// Ordered stage specs; conditions decide which apply per submission
    pub stages: Vec<TemplateStage>,
    /// Opaque passthrough to the notification gateway
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub notification_config: Value,
}

impl WorkflowTemplate {
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id: WorkflowTemplateId::generate(),
            organization_id,
            name: name.into(),
            stages: Vec::new(),
            notification_config: Value::Null,
        }
    }

    pub fn with_stage(mut self, stage: TemplateStage) -> Self {
        self.stages.push(stage);
        self
    }
}

/// One stage spec within a template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateStage {
    pub name: String,
    pub description: String,
    pub approver_rule: ApproverRule,
    pub minimum_approvers: u32,
    pub requires_all_approvers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_limit: Option<f64>,
    pub can_modify_amount: bool,
    pub deadline_hours: i64,
    pub escalation_hours: i64,
    pub allow_delegation: bool,
    /// All must hold for the stage to be included
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StageCondition>,
}

impl TemplateStage {
    pub fn new(name: impl Into<String>, approver_rule: ApproverRule) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            approver_rule,
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

    pub fn with_approval_limit(mut self, limit: f64) -> Self {
        self.approval_limit = Some(limit);
        self
    }

    pub fn with_deadlines(mut self, deadline_hours: i64, escalation_hours: i64) -> Self {
        self.deadline_hours = deadline_hours;
        self.escalation_hours = escalation_hours;
        self
    }

    pub fn no_delegation(mut self) -> Self {
        self.allow_delegation = false;
        self
    }

    pub fn with_condition(mut self, condition: StageCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// How a template stage's approver set is produced
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRule {
    /// Resolve a role through the approver directory at instantiation
    Role(ApproverRole),
    /// A fixed approver list authored into the template
    Explicit(Vec<Approver>),
}
