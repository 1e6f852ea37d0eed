//! Expenses and payment instruments
//!
//! The engine consumes expenses produced upstream (capture/OCR is out of
//! scope); it reads the amount and the payment instrument to decide the
//! approval route, and writes back only the payment status.

use crate::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for an expense
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpenseId(pub String);

impl ExpenseId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an organization (tenant)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Expense ──────────────────────────────────────────────────────────

/// A submitted expense awaiting an approval route
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub organization_id: OrganizationId,
    /// Amount in the organization's base currency
    pub amount: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        organization_id: OrganizationId,
        amount: f64,
        description: impl Into<String>,
        submitted_by: UserId,
    ) -> Self {
        Self {
            id: ExpenseId::generate(),
            organization_id,
            amount,
            description: description.into(),
            category: None,
            submitted_by,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

// ── Payment Method ───────────────────────────────────────────────────

/// The payment instrument an expense was incurred against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    PersonReimbursement,
    CreditCard,
    PurchaseOrder,
    DirectVendor,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonReimbursement => "person_reimbursement",
            Self::CreditCard => "credit_card",
            Self::PurchaseOrder => "purchase_order",
            Self::DirectVendor => "direct_vendor",
        }
    }
}

impl std::fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment instrument details relevant to workflow determination
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub method_type: PaymentMethodType,
    /// Instrument-level override: always route through approval
    pub requires_approval: bool,
    /// Ceiling this instrument may approve at the manager stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_limit: Option<f64>,
}

impl PaymentMethod {
    pub fn new(method_type: PaymentMethodType) -> Self {
        Self {
            method_type,
            requires_approval: false,
            approval_limit: None,
        }
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn with_approval_limit(mut self, limit: f64) -> Self {
        self.approval_limit = Some(limit);
        self
    }
}

// ── Payment Status ───────────────────────────────────────────────────

/// The expense's payment status as written by the approval engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingApproval,
    Approved,
    Rejected,
}
