//! Rule-engine orchestrator: runs a workflow's rules in order and folds the
//! verdicts into a single decision.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::workflow::{ActionType, RuleId, Workflow};
use crate::rules::{evaluate_rule, ApprovalRequirement, EvaluationContext, RuleEvaluation};

/// One approval gate to materialize, derived from a triggered
/// `require_approval` rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub rule_id: RuleId,
    pub rule_name: String,
    /// Re-numbered from 0 across the require-approval rules only.
    pub order: i32,
    pub requirement: ApprovalRequirement,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEvaluation {
    /// Every verdict, triggered or not, retained for audit.
    pub evaluations: Vec<RuleEvaluation>,
    pub triggered_rules: Vec<RuleEvaluation>,
    pub required_steps: Vec<StepDefinition>,
    pub auto_approve: bool,
    pub auto_reject: bool,
    pub auto_reject_reason: Option<String>,
}

impl WorkflowEvaluation {
    pub fn requires_manual_approval(&self) -> bool {
        !self.auto_approve && !self.auto_reject && !self.required_steps.is_empty()
    }
}

/// Evaluate every active rule of `workflow` in ascending order and decide.
///
/// Precedence is a deliberate safety bias: reject beats approve beats manual
/// steps. Rules evaluated after a rejecting rule are still collected for
/// audit but add no steps.
pub fn evaluate_workflow(
    workflow: &Workflow,
    ctx: &EvaluationContext,
    now: DateTime<Utc>,
) -> WorkflowEvaluation {
    let mut rules: Vec<_> = workflow.rules.iter().filter(|rule| rule.active).collect();
    rules.sort_by_key(|rule| rule.order);

    let mut evaluations = Vec::with_capacity(rules.len());
    for rule in rules {
        match evaluate_rule(rule, ctx) {
            Some(evaluation) => evaluations.push(evaluation),
            None => {
                tracing::warn!(
                    rule_id = %rule.id.0,
                    rule_type = ?rule.rule_type,
                    workflow_id = %workflow.id.0,
                    "no evaluator registered for rule type; rule skipped"
                );
            }
        }
    }

    let triggered_rules: Vec<RuleEvaluation> =
        evaluations.iter().filter(|evaluation| evaluation.triggered).cloned().collect();

    if let Some(rejecting) = triggered_rules
        .iter()
        .find(|evaluation| evaluation.action == Some(ActionType::AutoReject))
    {
        return WorkflowEvaluation {
            auto_reject_reason: Some(rejecting.reason.clone()),
            evaluations,
            triggered_rules,
            required_steps: Vec::new(),
            auto_approve: false,
            auto_reject: true,
        };
    }

    let unanimous_auto_approve = !triggered_rules.is_empty()
        && triggered_rules
            .iter()
            .all(|evaluation| evaluation.action == Some(ActionType::AutoApprove));
    if unanimous_auto_approve {
        return WorkflowEvaluation {
            evaluations,
            triggered_rules,
            required_steps: Vec::new(),
            auto_approve: true,
            auto_reject: false,
            auto_reject_reason: None,
        };
    }

    let required_steps = build_required_steps(&triggered_rules, now);
    WorkflowEvaluation {
        evaluations,
        triggered_rules,
        required_steps,
        auto_approve: false,
        auto_reject: false,
        auto_reject_reason: None,
    }
}

fn build_required_steps(
    triggered_rules: &[RuleEvaluation],
    now: DateTime<Utc>,
) -> Vec<StepDefinition> {
    triggered_rules
        .iter()
        .filter(|evaluation| evaluation.action == Some(ActionType::RequireApproval))
        .filter_map(|evaluation| evaluation.requirement.clone().map(|req| (evaluation, req)))
        .enumerate()
        .map(|(index, (evaluation, requirement))| StepDefinition {
            rule_id: evaluation.rule_id.clone(),
            rule_name: evaluation.rule_name.clone(),
            order: index as i32,
            due_at: requirement.sla_hours.map(|hours| now + Duration::hours(hours)),
            requirement,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::reference::{User, UserId, UserRole};
    use crate::domain::request::{PaymentRequest, RequestId, RequestStatus};
    use crate::domain::workflow::{
        ActionType, ApprovalRule, RuleType, Workflow, WorkflowId, WorkflowStatus,
    };
    use crate::rules::{CumulativeTotals, EvaluationContext, PolicySettings};

    use super::evaluate_workflow;

    fn context(amount: i64) -> EvaluationContext {
        let now = Utc::now();
        EvaluationContext {
            request: PaymentRequest {
                id: RequestId("PR-1".to_string()),
                invoice_number: None,
                description: None,
                amount: Decimal::from(amount),
                currency: "USD".to_string(),
                status: RequestStatus::Draft,
                requester_id: UserId("u-requester".to_string()),
                vendor_id: None,
                category_id: None,
                project_id: None,
                workflow_id: None,
                po_amount: None,
                quote_amount: None,
                submitted_at: None,
                completed_at: None,
                created_at: now,
                updated_at: now,
            },
            requester: User {
                id: UserId("u-requester".to_string()),
                name: "Riley Requester".to_string(),
                role: UserRole::Employee,
                department: Some("Finance".to_string()),
            },
            vendor: None,
            category: None,
            project: None,
            cumulative: CumulativeTotals::default(),
            policy: PolicySettings::default(),
        }
    }

    fn threshold_rule(id: &str, order: i32, action: ActionType) -> ApprovalRule {
        // no min/max: triggers for any non-negative amount
        ApprovalRule::new(id, "WF-1", format!("rule {id}"), RuleType::Threshold, order, action)
    }

    fn workflow(rules: Vec<ApprovalRule>) -> Workflow {
        Workflow {
            id: WorkflowId("WF-1".to_string()),
            name: "Finance approvals".to_string(),
            department_scope: Some("Finance".to_string()),
            status: WorkflowStatus::Active,
            rules,
        }
    }

    #[test]
    fn reject_beats_everything_else() {
        let workflow = workflow(vec![
            threshold_rule("R-approve", 0, ActionType::RequireApproval),
            threshold_rule("R-reject", 1, ActionType::AutoReject),
            threshold_rule("R-late", 2, ActionType::RequireApproval),
        ]);

        let result = evaluate_workflow(&workflow, &context(1_000), Utc::now());
        assert!(result.auto_reject);
        assert!(!result.auto_approve);
        assert!(result.required_steps.is_empty());
        assert!(result.auto_reject_reason.is_some());
        // later rules are still evaluated for audit
        assert_eq!(result.evaluations.len(), 3);
    }

    #[test]
    fn auto_approve_requires_unanimity_among_triggered_rules() {
        let workflow = workflow(vec![
            threshold_rule("R-auto", 0, ActionType::AutoApprove),
            threshold_rule("R-manual", 1, ActionType::RequireApproval),
        ]);

        let result = evaluate_workflow(&workflow, &context(1_000), Utc::now());
        assert!(!result.auto_approve);
        assert!(!result.auto_reject);
        assert_eq!(result.required_steps.len(), 1);
        assert_eq!(result.required_steps[0].rule_id.0, "R-manual");
    }

    #[test]
    fn unanimous_auto_approve_short_circuits_steps() {
        let workflow = workflow(vec![
            threshold_rule("R-auto-1", 0, ActionType::AutoApprove),
            threshold_rule("R-auto-2", 1, ActionType::AutoApprove),
        ]);

        let result = evaluate_workflow(&workflow, &context(1_000), Utc::now());
        assert!(result.auto_approve);
        assert!(result.required_steps.is_empty());
    }

    #[test]
    fn no_triggered_rules_means_no_auto_decision() {
        let mut narrow = threshold_rule("R-narrow", 0, ActionType::AutoApprove);
        narrow.min_amount = Some(Decimal::from(1_000_000));
        let workflow = workflow(vec![narrow]);

        let result = evaluate_workflow(&workflow, &context(10), Utc::now());
        assert!(!result.auto_approve);
        assert!(!result.auto_reject);
        assert!(result.required_steps.is_empty());
        assert!(!result.requires_manual_approval());
    }

    #[test]
    fn steps_are_renumbered_from_zero_with_sla_due_dates() {
        let mut gapped = threshold_rule("R-first", 3, ActionType::RequireApproval);
        gapped.sla_hours = Some(48);
        let workflow = workflow(vec![
            threshold_rule("R-auto", 1, ActionType::AutoApprove),
            gapped,
            threshold_rule("R-second", 7, ActionType::RequireApproval),
        ]);

        let now = Utc::now();
        let result = evaluate_workflow(&workflow, &context(1_000), now);
        assert_eq!(result.required_steps.len(), 2);
        assert_eq!(result.required_steps[0].order, 0);
        assert_eq!(result.required_steps[0].rule_id.0, "R-first");
        assert_eq!(result.required_steps[0].due_at, Some(now + Duration::hours(48)));
        assert_eq!(result.required_steps[1].order, 1);
        assert_eq!(result.required_steps[1].due_at, None);
    }

    #[test]
    fn unknown_rule_types_are_skipped_not_fatal() {
        let workflow = workflow(vec![
            threshold_rule("R-known", 0, ActionType::RequireApproval),
            ApprovalRule::new("R-sla", "WF-1", "sla watchdog", RuleType::Sla, 1, ActionType::Escalate),
        ]);

        let result = evaluate_workflow(&workflow, &context(1_000), Utc::now());
        assert_eq!(result.evaluations.len(), 1);
        assert_eq!(result.required_steps.len(), 1);
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let mut inactive = threshold_rule("R-off", 0, ActionType::AutoReject);
        inactive.active = false;
        let workflow = workflow(vec![inactive, threshold_rule("R-on", 1, ActionType::RequireApproval)]);

        let result = evaluate_workflow(&workflow, &context(1_000), Utc::now());
        assert!(!result.auto_reject);
        assert_eq!(result.evaluations.len(), 1);
    }
}
