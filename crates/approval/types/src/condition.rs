//! Stage conditions: data, not code
//!
//! Template stages carry predicate trees evaluated against the
//! submission context before the stage is included in a workflow.
//! Conditions are a small tagged expression type so they can be stored
//! with the template, shipped over the wire, and unit-tested
//! independently of the instantiator.

use crate::{Expense, PaymentMethod, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Condition Expressions ────────────────────────────────────────────

/// A predicate over the submission context
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCondition {
    /// Compare a context field against a literal value
    Compare {
        /// Dotted field path, e.g. `expense.amount` or `payment_method.type`
        field: String,
        operator: ConditionOperator,
        value: Value,
    },
    /// All sub-conditions must hold
    All(Vec<StageCondition>),
    /// At least one sub-condition must hold
    Any(Vec<StageCondition>),
    /// Negation
    Not(Box<StageCondition>),
}

/// Comparison operators for [`StageCondition::Compare`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Field value appears in the literal array
    In,
    /// Field string contains the literal substring
    Contains,
}

impl StageCondition {
    /// Shorthand for a single comparison
    pub fn compare(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self::Compare {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluate this condition against a submission context.
    ///
    /// Pure: no side effects, no I/O. An unknown field path evaluates to
    /// false rather than erroring, so templates referencing fields a
    /// given submission lacks simply skip the stage.
    pub fn evaluate(&self, ctx: &ConditionContext<'_>) -> bool {
        match self {
            Self::Compare {
                field,
                operator,
                value,
            } => match ctx.field(field) {
                Some(actual) => compare(&actual, *operator, value),
                None => false,
            },
            Self::All(conditions) => conditions.iter().all(|c| c.evaluate(ctx)),
            Self::Any(conditions) => conditions.iter().any(|c| c.evaluate(ctx)),
            Self::Not(condition) => !condition.evaluate(ctx),
        }
    }
}

fn compare(actual: &Value, operator: ConditionOperator, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Eq => values_equal(actual, expected),
        ConditionOperator::Ne => !values_equal(actual, expected),
        ConditionOperator::Gt => numeric(actual, expected, |a, b| a > b),
        ConditionOperator::Gte => numeric(actual, expected, |a, b| a >= b),
        ConditionOperator::Lt => numeric(actual, expected, |a, b| a < b),
        ConditionOperator::Lte => numeric(actual, expected, |a, b| a <= b),
        ConditionOperator::In => expected
            .as_array()
            .map(|items| items.iter().any(|item| values_equal(actual, item)))
            .unwrap_or(false),
        ConditionOperator::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
            (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
            _ => false,
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    // Numbers compare numerically so `100` and `100.0` are equal.
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn numeric(a: &Value, b: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => cmp(x, y),
        _ => false,
    }
}

// ── Condition Context ────────────────────────────────────────────────

/// The submission context conditions are evaluated against
#[derive(Clone, Copy, Debug)]
pub struct ConditionContext<'a> {
    pub expense: &'a Expense,
    pub payment_method: &'a PaymentMethod,
    pub user: &'a User,
}

impl<'a> ConditionContext<'a> {
    pub fn new(expense: &'a Expense, payment_method: &'a PaymentMethod, user: &'a User) -> Self {
        Self {
            expense,
            payment_method,
            user,
        }
    }

    /// Resolve a dotted field path to its current value.
    ///
    /// Returns `None` for unknown paths and for optional fields that are
    /// unset on this submission.
    pub fn field(&self, path: &str) -> Option<Value> {
        match path {
            "expense.amount" => Some(self.expense.amount.into()),
            "expense.description" => Some(self.expense.description.clone().into()),
            "expense.category" => self.expense.category.clone().map(Value::from),
            "payment_method.type" => Some(self.payment_method.method_type.as_str().into()),
            "payment_method.requires_approval" => Some(self.payment_method.requires_approval.into()),
            "payment_method.approval_limit" => self.payment_method.approval_limit.map(Value::from),
            "user.id" => Some(self.user.id.0.clone().into()),
            "user.email" => Some(self.user.email.clone().into()),
            "user.department" => self.user.department.clone().map(Value::from),
            _ => None,
        }
    }
}
