use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::reference::{GroupId, UserId, UserRole};
use crate::domain::request::RequestId;
use crate::domain::workflow::{ApprovalMode, RuleId, VotingMode};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
    /// Not yet activated in a sequential chain; not actionable.
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Escalated)
    }
}

/// One runtime approval gate for a specific request, derived from a
/// triggered rule that requires approval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveApprovalStep {
    pub id: StepId,
    pub request_id: RequestId,
    pub rule_id: Option<RuleId>,
    pub rule_name: String,
    pub order: i32,
    pub status: StepStatus,
    pub received_approvals: u32,
    pub received_rejections: u32,
    pub required_count: u32,
    pub required_group_id: Option<GroupId>,
    pub required_role: Option<UserRole>,
    pub specific_approver_id: Option<UserId>,
    pub mode: ApprovalMode,
    pub voting_mode: Option<VotingMode>,
    pub sla_hours: Option<i64>,
    pub due_at: Option<DateTime<Utc>>,
    pub escalate_to_group_id: Option<GroupId>,
    /// Optimistic-locking counter; every persisted update must bump it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Approve,
    Reject,
    Escalate,
}

/// Immutable audit record of one decision by one approver against one step.
/// Append-only; never updated or rolled back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub id: ActionId,
    pub step_id: StepId,
    pub request_id: RequestId,
    pub approver_id: UserId,
    pub action: ActionKind,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
