use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::reference::{CategoryId, GroupId, ProjectId, RiskRating, UserId, UserRole};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Inactive,
}

/// Named container of ordered approval rules. `department_scope = None`
/// marks the global default workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub department_scope: Option<String>,
    pub status: WorkflowStatus,
    pub rules: Vec<ApprovalRule>,
}

impl Workflow {
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Threshold,
    Cumulative,
    Variance,
    Vendor,
    Category,
    Project,
    Compliance,
    Sod,
    AutoApprove,
    // recognized but not evaluated; skipped with a warning
    DualControl,
    Sla,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RequireApproval,
    AutoApprove,
    AutoReject,
    Escalate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Sequential,
    Parallel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingMode {
    Unanimous,
    Majority,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CumulativePeriod {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceBaseField {
    PoAmount,
    QuoteAmount,
}

/// One rule instance belonging to a workflow. Type-specific parameters are
/// optional; an evaluator that finds its parameters missing reports
/// not-triggered rather than failing the workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: RuleId,
    pub workflow_id: WorkflowId,
    pub name: String,
    pub rule_type: RuleType,
    pub order: i32,
    pub active: bool,

    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub cumulative_period: Option<CumulativePeriod>,
    pub cumulative_limit: Option<Decimal>,
    /// Fractional variance tolerance, e.g. 0.05 for 5%.
    pub variance_pct: Option<Decimal>,
    pub variance_base_field: Option<VarianceBaseField>,
    pub vendor_is_new: bool,
    pub vendor_risk_ratings: Vec<RiskRating>,
    pub category_id: Option<CategoryId>,
    pub project_id: Option<ProjectId>,
    pub requires_compliance_review: bool,
    pub requires_legal_review: bool,
    pub prevent_self_approval: bool,
    pub prevent_creator_approval: bool,

    pub action_type: ActionType,
    pub required_group_id: Option<GroupId>,
    pub required_role: Option<UserRole>,
    pub specific_approver_id: Option<UserId>,
    pub approval_mode: Option<ApprovalMode>,
    pub required_approvals: Option<u32>,
    pub voting_mode: Option<VotingMode>,
    pub sla_hours: Option<i64>,
    pub escalate_to_group_id: Option<GroupId>,
}

impl ApprovalRule {
    /// A rule with every type-specific parameter unset. Tests and fixtures
    /// fill in only the fields a given rule type reads.
    pub fn new(
        id: impl Into<String>,
        workflow_id: impl Into<String>,
        name: impl Into<String>,
        rule_type: RuleType,
        order: i32,
        action_type: ActionType,
    ) -> Self {
        Self {
            id: RuleId(id.into()),
            workflow_id: WorkflowId(workflow_id.into()),
            name: name.into(),
            rule_type,
            order,
            active: true,
            min_amount: None,
            max_amount: None,
            cumulative_period: None,
            cumulative_limit: None,
            variance_pct: None,
            variance_base_field: None,
            vendor_is_new: false,
            vendor_risk_ratings: Vec::new(),
            category_id: None,
            project_id: None,
            requires_compliance_review: false,
            requires_legal_review: false,
            prevent_self_approval: false,
            prevent_creator_approval: false,
            action_type,
            required_group_id: None,
            required_role: None,
            specific_approver_id: None,
            approval_mode: None,
            required_approvals: None,
            voting_mode: None,
            sla_hours: None,
            escalate_to_group_id: None,
        }
    }
}
