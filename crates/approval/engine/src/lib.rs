//! LedgerFlow Approval Workflow Engine
//!
//! Given a submitted expense and the payment instrument used, the
//! engine decides which human approval stages must clear, persists
//! them as independently progressable stage records, processes
//! approve/reject/delegate decisions with authorization and
//! idempotency guarantees, and escalates stages that go stale.
//!
//! # Key Principle
//!
//! **Every mutation of a live record is one guarded conditional
//! update.** Two concurrent actors on the same record race safely:
//! exactly one succeeds, the other observes a conflict. No retries, no
//! cross-record locks.
//!
//! # Architecture
//!
//! [`ApprovalService`] composes specialized components:
//!
//! - [`WorkflowDeterminer`] — template or built-in default policy
//! - [`DefaultPolicyBuilder`] — amount/payment-type thresholds → 0–3 stages
//! - [`TemplateInstantiator`] — condition-gated template stages
//! - [`WorkflowInstantiator`] — plan → persisted stage records, all-or-nothing
//! - [`DecisionProcessor`] — one approve/reject, checked in fixed order
//! - [`ProgressionEngine`] — advance, complete, or reject the workflow
//! - [`DelegationManager`] — actor-initiated reassignment
//! - [`EscalationSweeper`] — deadline-triggered reassignment, host-scheduled
//!
//! External collaborators (consumed, never implemented here):
//! [`ApproverDirectory`], [`NotificationGateway`], [`TemplateSource`],
//! and the store behind `approval_store::ApprovalStore`.

#![deny(unsafe_code)]

pub mod decision;
pub mod delegation;
pub mod determiner;
pub mod errors;
pub mod escalation;
pub mod instantiator;
pub mod policy;
pub mod progression;
pub mod service;
pub mod template_instantiator;
pub mod traits;

#[cfg(test)]
pub(crate) mod support;

// Re-export main types
pub use decision::{DecisionAction, DecisionProcessor, DecisionRequest};
pub use delegation::DelegationManager;
pub use determiner::WorkflowDeterminer;
pub use errors::{ApprovalError, ApprovalResult};
pub use escalation::EscalationSweeper;
pub use instantiator::{assess_risk, WorkflowInstantiator};
pub use policy::{DefaultPolicyBuilder, PolicyConfig};
pub use progression::ProgressionEngine;
pub use service::ApprovalService;
pub use template_instantiator::TemplateInstantiator;
pub use traits::{ApproverDirectory, NotificationGateway, TemplateSource};
