//! Approval-step state machine.
//!
//! Pure transition functions over [`ActiveApprovalStep`] values; persistence
//! and sibling-step bookkeeping belong to the approval service. Steps start
//! `Pending` (first in the chain) or `Skipped` (awaiting sequential
//! activation) and end `Approved`, `Rejected` or `Escalated`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::reference::{GroupId, User, UserId};
use crate::domain::request::RequestId;
use crate::domain::step::{ActionKind, ActiveApprovalStep, StepId, StepStatus};
use crate::engine::StepDefinition;
use crate::errors::DomainError;

/// Materialize step records from the orchestrator's definitions. Only the
/// first step is activated; the rest wait as `Skipped` until the chain
/// reaches them.
pub fn materialize_steps(
    request_id: &RequestId,
    definitions: &[StepDefinition],
    now: DateTime<Utc>,
) -> Vec<ActiveApprovalStep> {
    definitions
        .iter()
        .enumerate()
        .map(|(index, definition)| ActiveApprovalStep {
            id: StepId(Uuid::new_v4().to_string()),
            request_id: request_id.clone(),
            rule_id: Some(definition.rule_id.clone()),
            rule_name: definition.rule_name.clone(),
            order: definition.order,
            status: if index == 0 { StepStatus::Pending } else { StepStatus::Skipped },
            received_approvals: 0,
            received_rejections: 0,
            required_count: definition.requirement.required_count,
            required_group_id: definition.requirement.group_id.clone(),
            required_role: definition.requirement.role,
            specific_approver_id: definition.requirement.specific_approver_id.clone(),
            mode: definition.requirement.mode,
            voting_mode: definition.requirement.voting_mode,
            sla_hours: definition.requirement.sla_hours,
            due_at: definition.due_at,
            escalate_to_group_id: definition.requirement.escalate_to_group_id.clone(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

/// Segregation-of-duties gate. Runs before any action, unconditionally: a
/// requester never acts on their own request, whether or not the workflow
/// declares an explicit sod rule (`sod_active`).
pub fn can_user_approve(
    approver_id: &UserId,
    requester_id: &UserId,
    sod_active: bool,
) -> Result<(), DomainError> {
    let _ = sod_active;
    if approver_id == requester_id {
        return Err(DomainError::SelfApproval { approver_id: approver_id.0.clone() });
    }
    Ok(())
}

/// Who may act on the current step, in priority order: specific approver,
/// then required role, then required group, then the manager-and-above
/// fallback. Executives always qualify for the first two tiers.
pub fn is_eligible_approver(
    step: &ActiveApprovalStep,
    approver: &User,
    approver_groups: &[GroupId],
) -> bool {
    if let Some(specific) = &step.specific_approver_id {
        return approver.id == *specific || approver.role.overrides_step_targeting();
    }
    if let Some(required_role) = step.required_role {
        return approver.role == required_role || approver.role.overrides_step_targeting();
    }
    if let Some(group) = &step.required_group_id {
        return approver_groups.contains(group);
    }
    approver.role.is_default_approver()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Approval counted but the step still needs more approvers.
    InProgress,
    Approved,
    Rejected,
    Escalated,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepTransition {
    pub step: ActiveApprovalStep,
    pub outcome: StepOutcome,
}

/// Apply one action to a pending step, yielding the updated record.
pub fn apply_action(
    step: &ActiveApprovalStep,
    kind: ActionKind,
    now: DateTime<Utc>,
) -> Result<StepTransition, DomainError> {
    if step.status != StepStatus::Pending {
        return Err(DomainError::StepNotActionable {
            step_id: step.id.0.clone(),
            status: step.status,
        });
    }

    let mut next = step.clone();
    next.version += 1;
    next.updated_at = now;

    let outcome = match kind {
        ActionKind::Reject => {
            next.received_rejections += 1;
            next.status = StepStatus::Rejected;
            StepOutcome::Rejected
        }
        ActionKind::Escalate => {
            next.status = StepStatus::Escalated;
            StepOutcome::Escalated
        }
        ActionKind::Approve => {
            next.received_approvals += 1;
            if next.received_approvals >= next.required_count {
                next.status = StepStatus::Approved;
                StepOutcome::Approved
            } else {
                StepOutcome::InProgress
            }
        }
    };

    Ok(StepTransition { step: next, outcome })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestAdvance {
    /// Other pending steps remain; the request stays pending.
    AwaitRemaining,
    /// Sequential chain continues: activate this skipped step.
    ActivateStep(StepId),
    /// No pending or skipped steps remain; the request is approved.
    RequestApproved,
}

/// After a step completes as approved, inspect the full (post-update) step
/// list and decide the request-level follow-up.
pub fn advance_after_approval(steps: &[ActiveApprovalStep]) -> RequestAdvance {
    if steps.iter().any(|step| step.status == StepStatus::Pending) {
        return RequestAdvance::AwaitRemaining;
    }

    steps
        .iter()
        .filter(|step| step.status == StepStatus::Skipped)
        .min_by_key(|step| step.order)
        .map(|step| RequestAdvance::ActivateStep(step.id.clone()))
        .unwrap_or(RequestAdvance::RequestApproved)
}

/// Escalation retarget: when an escalated step names a target group, a fresh
/// step aimed at that group takes its place in the chain. Without a target
/// the request simply stays pending.
pub fn escalation_successor(
    step: &ActiveApprovalStep,
    now: DateTime<Utc>,
) -> Option<ActiveApprovalStep> {
    let target = step.escalate_to_group_id.clone()?;
    Some(ActiveApprovalStep {
        id: StepId(Uuid::new_v4().to_string()),
        request_id: step.request_id.clone(),
        rule_id: step.rule_id.clone(),
        rule_name: format!("{} (escalated)", step.rule_name),
        order: step.order,
        status: StepStatus::Pending,
        received_approvals: 0,
        received_rejections: 0,
        required_count: step.required_count,
        required_group_id: Some(target),
        required_role: None,
        specific_approver_id: None,
        mode: step.mode,
        voting_mode: step.voting_mode,
        sla_hours: step.sla_hours,
        due_at: step.sla_hours.map(|hours| now + chrono::Duration::hours(hours)),
        // cleared so an escalated successor cannot re-escalate in a loop
        escalate_to_group_id: None,
        version: 0,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::reference::{GroupId, User, UserId, UserRole};
    use crate::domain::request::RequestId;
    use crate::domain::step::{ActionKind, ActiveApprovalStep, StepId, StepStatus};
    use crate::domain::workflow::ApprovalMode;
    use crate::errors::DomainError;

    use super::{
        advance_after_approval, apply_action, can_user_approve, escalation_successor,
        is_eligible_approver, RequestAdvance, StepOutcome,
    };

    fn step(id: &str, order: i32, status: StepStatus) -> ActiveApprovalStep {
        let now = Utc::now();
        ActiveApprovalStep {
            id: StepId(id.to_string()),
            request_id: RequestId("PR-1".to_string()),
            rule_id: None,
            rule_name: "amount threshold".to_string(),
            order,
            status,
            received_approvals: 0,
            received_rejections: 0,
            required_count: 1,
            required_group_id: None,
            required_role: None,
            specific_approver_id: None,
            mode: ApprovalMode::Sequential,
            voting_mode: None,
            sla_hours: None,
            due_at: None,
            escalate_to_group_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn user(id: &str, role: UserRole) -> User {
        User { id: UserId(id.to_string()), name: id.to_string(), role, department: None }
    }

    #[test]
    fn sod_gate_rejects_self_approval_regardless_of_declared_policy() {
        let requester = UserId("u-1".to_string());
        for sod_active in [true, false] {
            let error = can_user_approve(&requester, &requester, sod_active)
                .expect_err("self approval must fail");
            assert!(matches!(error, DomainError::SelfApproval { .. }));
        }
        can_user_approve(&UserId("u-2".to_string()), &requester, true).expect("distinct approver");
    }

    #[test]
    fn eligibility_prefers_specific_approver() {
        let mut gated = step("STEP-1", 0, StepStatus::Pending);
        gated.specific_approver_id = Some(UserId("u-named".to_string()));
        // a matching role is not enough once a specific approver is named
        gated.required_role = Some(UserRole::Manager);

        assert!(is_eligible_approver(&gated, &user("u-named", UserRole::Employee), &[]));
        assert!(!is_eligible_approver(&gated, &user("u-other", UserRole::Manager), &[]));
        assert!(is_eligible_approver(&gated, &user("u-exec", UserRole::Executive), &[]));
    }

    #[test]
    fn eligibility_falls_through_role_then_group_then_default() {
        let mut by_role = step("STEP-1", 0, StepStatus::Pending);
        by_role.required_role = Some(UserRole::SeniorManager);
        assert!(is_eligible_approver(&by_role, &user("u-1", UserRole::SeniorManager), &[]));
        assert!(is_eligible_approver(&by_role, &user("u-2", UserRole::Executive), &[]));
        assert!(!is_eligible_approver(&by_role, &user("u-3", UserRole::Manager), &[]));

        let mut by_group = step("STEP-2", 0, StepStatus::Pending);
        by_group.required_group_id = Some(GroupId("g-finance".to_string()));
        let member_groups = [GroupId("g-finance".to_string())];
        assert!(is_eligible_approver(&by_group, &user("u-1", UserRole::Employee), &member_groups));
        assert!(!is_eligible_approver(&by_group, &user("u-2", UserRole::Manager), &[]));

        let open = step("STEP-3", 0, StepStatus::Pending);
        assert!(is_eligible_approver(&open, &user("u-1", UserRole::Manager), &[]));
        assert!(is_eligible_approver(&open, &user("u-2", UserRole::SeniorManager), &[]));
        assert!(is_eligible_approver(&open, &user("u-3", UserRole::Executive), &[]));
        assert!(!is_eligible_approver(&open, &user("u-4", UserRole::Employee), &[]));
    }

    #[test]
    fn parallel_step_stays_pending_until_quorum() {
        let mut quorum = step("STEP-1", 0, StepStatus::Pending);
        quorum.mode = ApprovalMode::Parallel;
        quorum.required_count = 2;

        let first = apply_action(&quorum, ActionKind::Approve, Utc::now()).expect("first approve");
        assert_eq!(first.outcome, StepOutcome::InProgress);
        assert_eq!(first.step.received_approvals, 1);
        assert_eq!(first.step.status, StepStatus::Pending);
        assert_eq!(first.step.version, 1);

        let second =
            apply_action(&first.step, ActionKind::Approve, Utc::now()).expect("second approve");
        assert_eq!(second.outcome, StepOutcome::Approved);
        assert_eq!(second.step.status, StepStatus::Approved);
        assert_eq!(second.step.version, 2);
    }

    #[test]
    fn reject_is_terminal_for_the_step() {
        let transition =
            apply_action(&step("STEP-1", 0, StepStatus::Pending), ActionKind::Reject, Utc::now())
                .expect("reject");
        assert_eq!(transition.outcome, StepOutcome::Rejected);
        assert_eq!(transition.step.status, StepStatus::Rejected);
        assert_eq!(transition.step.received_rejections, 1);
    }

    #[test]
    fn non_pending_steps_are_not_actionable() {
        for status in [StepStatus::Skipped, StepStatus::Approved, StepStatus::Rejected] {
            let error = apply_action(&step("STEP-1", 0, status), ActionKind::Approve, Utc::now())
                .expect_err("must not act");
            assert!(matches!(error, DomainError::StepNotActionable { .. }));
        }
    }

    #[test]
    fn approval_advance_activates_next_skipped_step() {
        let steps = vec![
            step("STEP-1", 0, StepStatus::Approved),
            step("STEP-2", 1, StepStatus::Skipped),
            step("STEP-3", 2, StepStatus::Skipped),
        ];
        assert_eq!(
            advance_after_approval(&steps),
            RequestAdvance::ActivateStep(StepId("STEP-2".to_string()))
        );
    }

    #[test]
    fn approval_advance_waits_on_other_pending_steps() {
        let steps = vec![
            step("STEP-1", 0, StepStatus::Approved),
            step("STEP-2", 1, StepStatus::Pending),
        ];
        assert_eq!(advance_after_approval(&steps), RequestAdvance::AwaitRemaining);
    }

    #[test]
    fn approval_advance_approves_request_when_chain_is_done() {
        let steps = vec![
            step("STEP-1", 0, StepStatus::Approved),
            step("STEP-2", 1, StepStatus::Approved),
        ];
        assert_eq!(advance_after_approval(&steps), RequestAdvance::RequestApproved);
    }

    #[test]
    fn escalation_successor_retargets_declared_group() {
        let mut escalatable = step("STEP-1", 0, StepStatus::Pending);
        escalatable.escalate_to_group_id = Some(GroupId("g-directors".to_string()));
        escalatable.required_role = Some(UserRole::Manager);
        escalatable.received_approvals = 1;
        escalatable.required_count = 2;

        let successor =
            escalation_successor(&escalatable, Utc::now()).expect("successor for declared target");
        assert_eq!(successor.required_group_id, Some(GroupId("g-directors".to_string())));
        assert_eq!(successor.required_role, None);
        assert_eq!(successor.status, StepStatus::Pending);
        assert_eq!(successor.received_approvals, 0);
        assert_eq!(successor.escalate_to_group_id, None);

        let untargeted = step("STEP-2", 0, StepStatus::Pending);
        assert!(escalation_successor(&untargeted, Utc::now()).is_none());
    }
}
