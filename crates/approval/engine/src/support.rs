//! Shared fixtures and collaborator doubles for engine tests.

use crate::{ApprovalError, ApprovalResult, ApproverDirectory, NotificationGateway, TemplateSource};
use approval_types::{
    ApprovalRecord, ApprovalRecordId, Approver, ApproverRole, Expense, ExpenseId, OrganizationId,
    PaymentMethod, RiskLevel, User, UserId, WorkflowStage, WorkflowTemplate,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Mutex;

pub(crate) fn make_user() -> User {
    User::new("u-1", "Dana", "dana@example.com").with_department("Sales")
}

pub(crate) fn make_expense(amount: f64) -> Expense {
    Expense::new(
        OrganizationId::new("org-1"),
        amount,
        "Team offsite",
        UserId::new("u-1"),
    )
}

/// Stage records for one expense, stage 1 live, approver snapshot
/// `mgr-1`.
pub(crate) fn make_workflow_records(expense: &str, stages: u32) -> Vec<ApprovalRecord> {
    let now = Utc::now();
    (1..=stages)
        .map(|n| {
            let stage = WorkflowStage::new(n, format!("Stage {}", n)).with_approvers(vec![
                Approver::new("mgr-1", "Morgan", "morgan@example.com", ApproverRole::Manager),
            ]);
            let mut record = ApprovalRecord::from_stage(
                ExpenseId::new(expense),
                OrganizationId::new("org-1"),
                None,
                stages,
                &stage,
                RiskLevel::Low,
                now,
            );
            if n == 1 {
                record.activate(now);
            }
            record
        })
        .collect()
}

// ── Directory Double ─────────────────────────────────────────────────

pub(crate) struct StaticDirectory {
    managers: Vec<Approver>,
    finance: Vec<Approver>,
    executives: Vec<Approver>,
    escalation_boss: Option<Approver>,
    failing_actors: HashSet<String>,
}

impl StaticDirectory {
    pub(crate) fn fully_staffed() -> Self {
        Self {
            managers: vec![Approver::new(
                "mgr-1",
                "Morgan",
                "morgan@example.com",
                ApproverRole::Manager,
            )],
            finance: vec![Approver::new(
                "fin-1",
                "Farid",
                "farid@example.com",
                ApproverRole::Finance,
            )],
            executives: vec![Approver::new(
                "exec-1",
                "Evelyn",
                "evelyn@example.com",
                ApproverRole::Executive,
            )],
            escalation_boss: Some(Approver::new(
                "boss-1",
                "Blair",
                "blair@example.com",
                ApproverRole::Manager,
            )),
            failing_actors: HashSet::new(),
        }
    }

    pub(crate) fn without_executives() -> Self {
        Self {
            executives: Vec::new(),
            ..Self::fully_staffed()
        }
    }

    pub(crate) fn without_hierarchy() -> Self {
        Self {
            escalation_boss: None,
            ..Self::fully_staffed()
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            managers: Vec::new(),
            finance: Vec::new(),
            executives: Vec::new(),
            escalation_boss: None,
            failing_actors: HashSet::new(),
        }
    }

    /// Escalation target lookups for this actor fail.
    pub(crate) fn failing_for(mut self, actor: &str) -> Self {
        self.failing_actors.insert(actor.to_string());
        self
    }
}

#[async_trait]
impl ApproverDirectory for StaticDirectory {
    async fn resolve_approvers(
        &self,
        role: ApproverRole,
        _user: &User,
    ) -> ApprovalResult<Vec<Approver>> {
        Ok(match role {
            ApproverRole::Manager => self.managers.clone(),
            ApproverRole::Finance => self.finance.clone(),
            ApproverRole::Executive => self.executives.clone(),
        })
    }

    async fn escalation_target(&self, user: &UserId) -> ApprovalResult<Option<Approver>> {
        if self.failing_actors.contains(&user.0) {
            return Err(ApprovalError::Directory(format!(
                "hierarchy lookup failed for {}",
                user
            )));
        }
        Ok(self.escalation_boss.clone())
    }
}

// ── Notifier Double ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub(crate) enum NotificationEvent {
    StageStart {
        record_id: ApprovalRecordId,
        stage_number: u32,
        approvers: Vec<UserId>,
    },
    Delegation {
        record_id: ApprovalRecordId,
        delegate: UserId,
    },
    Escalation {
        record_id: ApprovalRecordId,
        target: UserId,
    },
}

pub(crate) struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
    failing: bool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// Every dispatch fails; instantiation and decisions must still
    /// succeed.
    pub(crate) fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub(crate) fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: NotificationEvent) -> ApprovalResult<()> {
        if self.failing {
            return Err(ApprovalError::Notification(
                "notification gateway unavailable".to_string(),
            ));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn notify_stage_start(
        &self,
        record: &ApprovalRecord,
        approvers: &[Approver],
    ) -> ApprovalResult<()> {
        self.record(NotificationEvent::StageStart {
            record_id: record.id.clone(),
            stage_number: record.stage_number,
            approvers: approvers.iter().map(|a| a.id.clone()).collect(),
        })
    }

    async fn notify_delegation(
        &self,
        record: &ApprovalRecord,
        delegate: &UserId,
    ) -> ApprovalResult<()> {
        self.record(NotificationEvent::Delegation {
            record_id: record.id.clone(),
            delegate: delegate.clone(),
        })
    }

    async fn notify_escalation(
        &self,
        record: &ApprovalRecord,
        target: &Approver,
    ) -> ApprovalResult<()> {
        self.record(NotificationEvent::Escalation {
            record_id: record.id.clone(),
            target: target.id.clone(),
        })
    }
}

// ── Template Source Double ───────────────────────────────────────────

pub(crate) struct StaticTemplates {
    template: Option<WorkflowTemplate>,
}

impl StaticTemplates {
    pub(crate) fn none() -> Self {
        Self { template: None }
    }

    pub(crate) fn always(template: WorkflowTemplate) -> Self {
        Self {
            template: Some(template),
        }
    }
}

#[async_trait]
impl TemplateSource for StaticTemplates {
    async fn find_applicable_template(
        &self,
        _organization_id: &OrganizationId,
        _expense: &Expense,
        _payment_method: &PaymentMethod,
    ) -> ApprovalResult<Option<WorkflowTemplate>> {
        Ok(self.template.clone())
    }
}
