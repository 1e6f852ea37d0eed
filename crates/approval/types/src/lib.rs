//! Approval workflow domain types for LedgerFlow
//!
//! The shared vocabulary of the approval engine: expenses and payment
//! instruments, approvers and their roles, workflow plans
//! ([`WorkflowConfig`]/[`WorkflowStage`]), organization templates with
//! data-driven [`StageCondition`]s, and the persisted [`ApprovalRecord`]
//! stage rows.
//!
//! This crate is pure data: no I/O, no storage, no policy. The engine
//! crate owns behavior; the store crate owns persistence.

#![deny(unsafe_code)]

pub mod approver;
pub mod condition;
pub mod expense;
pub mod record;
pub mod template;
pub mod workflow;

pub use approver::{Approver, ApproverRole, User, UserId};
pub use condition::{ConditionContext, ConditionOperator, StageCondition};
pub use expense::{
    Expense, ExpenseId, OrganizationId, PaymentMethod, PaymentMethodType, PaymentStatus,
};
pub use record::{ApprovalRecord, ApprovalRecordId, RiskLevel, StageStatus};
pub use template::{ApproverRule, TemplateStage, WorkflowTemplate};
pub use workflow::{WorkflowConfig, WorkflowStage, WorkflowTemplateId, WorkflowType};
