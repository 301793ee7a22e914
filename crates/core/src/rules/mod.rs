//! Rule evaluators: stateless functions from (rule, context) to a verdict.
//!
//! Every evaluator is a pure function; the cumulative totals it reads were
//! computed upstream by the context builder, which is where any store I/O
//! already happened.

mod evaluators;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::reference::{GroupId, Project, SpendCategory, User, UserId, UserRole, Vendor};
use crate::domain::request::PaymentRequest;
use crate::domain::workflow::{
    ActionType, ApprovalMode, ApprovalRule, RuleId, RuleType, VotingMode,
};

/// Requester's cumulative approved spend, precomputed per period.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeTotals {
    pub daily: Decimal,
    pub weekly: Decimal,
    pub monthly: Decimal,
}

/// Policy knobs the compliance evaluator reads; sourced from configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    pub high_risk_countries: Vec<String>,
    pub legal_review_threshold: Decimal,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self { high_risk_countries: Vec::new(), legal_review_threshold: Decimal::from(100_000) }
    }
}

/// Everything an evaluator might need, assembled before evaluation starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub request: PaymentRequest,
    pub requester: User,
    pub vendor: Option<Vendor>,
    pub category: Option<SpendCategory>,
    pub project: Option<Project>,
    pub cumulative: CumulativeTotals,
    pub policy: PolicySettings,
}

/// Approver-targeting requirement carried by a triggered rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    pub group_id: Option<GroupId>,
    pub role: Option<UserRole>,
    pub specific_approver_id: Option<UserId>,
    pub mode: ApprovalMode,
    pub required_count: u32,
    pub voting_mode: Option<VotingMode>,
    pub sla_hours: Option<i64>,
    pub escalate_to_group_id: Option<GroupId>,
}

impl ApprovalRequirement {
    pub fn from_rule(rule: &ApprovalRule) -> Self {
        Self {
            group_id: rule.required_group_id.clone(),
            role: rule.required_role,
            specific_approver_id: rule.specific_approver_id.clone(),
            mode: rule.approval_mode.unwrap_or(ApprovalMode::Sequential),
            required_count: rule.required_approvals.unwrap_or(1).max(1),
            voting_mode: rule.voting_mode,
            sla_hours: rule.sla_hours,
            escalate_to_group_id: rule.escalate_to_group_id.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub rule_type: RuleType,
    pub triggered: bool,
    pub reason: String,
    pub action: Option<ActionType>,
    pub requirement: Option<ApprovalRequirement>,
}

impl RuleEvaluation {
    fn not_triggered(rule: &ApprovalRule, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            rule_type: rule.rule_type,
            triggered: false,
            reason: reason.into(),
            action: None,
            requirement: None,
        }
    }

    fn triggered(rule: &ApprovalRule, reason: impl Into<String>) -> Self {
        let requirement = (rule.action_type == ActionType::RequireApproval)
            .then(|| ApprovalRequirement::from_rule(rule));
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            rule_type: rule.rule_type,
            triggered: true,
            reason: reason.into(),
            action: Some(rule.action_type),
            requirement,
        }
    }

    fn with_specific_approver(mut self, approver_id: UserId) -> Self {
        if let Some(requirement) = &mut self.requirement {
            requirement.specific_approver_id = Some(approver_id);
        }
        self
    }
}

/// Dispatch by rule type. Returns `None` for recognized-but-unevaluated
/// types (`dual_control`, `sla`); the orchestrator skips those with a
/// warning instead of failing the workflow.
pub fn evaluate_rule(rule: &ApprovalRule, ctx: &EvaluationContext) -> Option<RuleEvaluation> {
    let evaluation = match rule.rule_type {
        RuleType::Threshold => evaluators::evaluate_threshold(rule, ctx),
        RuleType::Cumulative => evaluators::evaluate_cumulative(rule, ctx),
        RuleType::Variance => evaluators::evaluate_variance(rule, ctx),
        RuleType::Vendor => evaluators::evaluate_vendor(rule, ctx),
        RuleType::Category => evaluators::evaluate_category(rule, ctx),
        RuleType::Project => evaluators::evaluate_project(rule, ctx),
        RuleType::Compliance => evaluators::evaluate_compliance(rule, ctx),
        RuleType::Sod => evaluators::evaluate_sod(rule, ctx),
        RuleType::AutoApprove => evaluators::evaluate_auto_approve(rule, ctx),
        RuleType::DualControl | RuleType::Sla => return None,
    };
    Some(evaluation)
}
