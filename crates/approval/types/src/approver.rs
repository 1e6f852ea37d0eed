//! Approvers and the submitting-user context
//!
//! An [`Approver`] is one entry in a stage's eligible-approver snapshot.
//! The snapshot is copied onto the stage record at creation time and
//! never re-resolved, so later directory changes cannot retroactively
//! alter who may act.

use serde::{Deserialize, Serialize};

// ── User Identifier ──────────────────────────────────────────────────

/// Unique identifier for a platform user
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Approver Roles ───────────────────────────────────────────────────

/// The organizational role an approver acts under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRole {
    /// The submitter's reporting line
    Manager,
    /// Finance-team reviewers
    Finance,
    /// Executive sign-off
    Executive,
}

impl ApproverRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Finance => "finance",
            Self::Executive => "executive",
        }
    }
}

impl std::fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Approver ─────────────────────────────────────────────────────────

/// One eligible approver, as resolved by the directory at stage creation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Approver {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: ApproverRole,
}

impl Approver {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: ApproverRole,
    ) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            email: email.into(),
            role,
        }
    }
}

// ── Submitting User ──────────────────────────────────────────────────

/// The submitting user's organizational context.
///
/// Passed to the directory for role resolution and to condition
/// evaluation; never persisted by this engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            email: email.into(),
            department: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approver_role_names() {
        assert_eq!(ApproverRole::Manager.as_str(), "manager");
        assert_eq!(ApproverRole::Finance.as_str(), "finance");
        assert_eq!(ApproverRole::Executive.as_str(), "executive");
    }

    #[test]
    fn test_user_id() {
        let id = UserId::generate();
        assert!(!id.0.is_empty());

        let named = UserId::new("user-1");
        assert_eq!(format!("{}", named), "user-1");
    }

    #[test]
    fn test_user_builder() {
        let user = User::new("u-1", "Dana", "dana@example.com").with_department("Engineering");
        assert_eq!(user.department.as_deref(), Some("Engineering"));
    }
}
