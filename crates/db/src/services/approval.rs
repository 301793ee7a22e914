use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use payflow_core::audit::{AuditEvent, AuditOutcome, AuditSink, AuditStage};
use payflow_core::domain::request::RequestStatus;
use payflow_core::domain::step::{
    ActionId, ActionKind, ActiveApprovalStep, ApprovalAction, StepId, StepStatus,
};
use payflow_core::errors::DomainError;
use payflow_core::steps::{
    advance_after_approval, apply_action, can_user_approve, escalation_successor,
    is_eligible_approver, RequestAdvance, StepOutcome,
};

use super::{Principal, ServiceError};
use crate::repositories::Store;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub step: ActiveApprovalStep,
    pub step_outcome: StepOutcome,
    /// Request status after the decision was applied.
    pub request_status: RequestStatus,
    /// Skipped step activated by this approval, if the chain advanced.
    pub activated_step: Option<StepId>,
    /// Replacement step created by an escalation retarget.
    pub escalated_to: Option<StepId>,
}

/// Applies one approver decision to a step and carries out the request-level
/// consequences: chain advancement, escalation retargeting and terminal
/// request transitions.
pub struct ApprovalService {
    store: Store,
    audit: Arc<dyn AuditSink>,
}

impl ApprovalService {
    pub fn new(store: Store, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub async fn decide(
        &self,
        step_id: &StepId,
        principal: &Principal,
        kind: ActionKind,
        comment: Option<String>,
    ) -> Result<DecisionOutcome, ServiceError> {
        let step = self
            .store
            .steps
            .find_by_id(step_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("step", &step_id.0))?;
        let mut request = self
            .store
            .requests
            .find_by_id(&step.request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("request", &step.request_id.0))?;
        let approver = self
            .store
            .reference
            .find_user(&principal.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", &principal.user_id.0))?;

        // authorization gates run before anything is written
        can_user_approve(&approver.id, &request.requester_id, true)?;
        let approver_groups = self.store.reference.groups_for_user(&approver.id).await?;
        if !is_eligible_approver(&step, &approver, &approver_groups) {
            return Err(DomainError::IneligibleApprover {
                approver_id: approver.id.0.clone(),
                step_id: step.id.0.clone(),
            }
            .into());
        }

        let now = Utc::now();
        let transition = apply_action(&step, kind, now)?;
        self.store.steps.update_versioned(&transition.step, step.version).await?;

        // the decision log is written only after the step update wins its
        // version check, so every logged action was actually applied
        self.store
            .actions
            .append(ApprovalAction {
                id: ActionId(Uuid::new_v4().to_string()),
                step_id: step.id.clone(),
                request_id: request.id.clone(),
                approver_id: approver.id.clone(),
                action: kind,
                comment,
                created_at: now,
            })
            .await?;

        let mut activated_step = None;
        let mut escalated_to = None;

        match transition.outcome {
            StepOutcome::Rejected => {
                // one rejection ends the whole request
                request.transition_to(RequestStatus::Rejected)?;
                request.completed_at = Some(now);
                request.updated_at = now;
                self.store.requests.save(request.clone()).await?;
            }
            StepOutcome::Approved => {
                let steps = self.store.steps.list_for_request(&request.id).await?;
                match advance_after_approval(&steps) {
                    RequestAdvance::AwaitRemaining => {}
                    RequestAdvance::ActivateStep(next_id) => {
                        if let Some(next) = steps.iter().find(|step| step.id == next_id) {
                            let mut activated = next.clone();
                            activated.status = StepStatus::Pending;
                            activated.version += 1;
                            activated.updated_at = now;
                            self.store.steps.update_versioned(&activated, next.version).await?;
                            activated_step = Some(next_id);
                        }
                    }
                    RequestAdvance::RequestApproved => {
                        request.transition_to(RequestStatus::Approved)?;
                        request.completed_at = Some(now);
                        request.updated_at = now;
                        self.store.requests.save(request.clone()).await?;
                    }
                }
            }
            StepOutcome::Escalated => {
                if let Some(successor) = escalation_successor(&transition.step, now) {
                    self.store.steps.insert(successor.clone()).await?;
                    escalated_to = Some(successor.id);
                } else {
                    tracing::warn!(
                        step_id = %step.id.0,
                        "escalated step has no target group; request stays pending"
                    );
                }
            }
            StepOutcome::InProgress => {}
        }

        tracing::info!(
            step_id = %step.id.0,
            request_id = %request.id.0,
            approver = %approver.id.0,
            outcome = ?transition.outcome,
            "approval decision applied"
        );
        let stage = match transition.outcome {
            StepOutcome::Escalated => AuditStage::Escalation,
            _ => AuditStage::Decision,
        };
        self.audit.emit(
            AuditEvent::new(
                request.id.clone(),
                approver.id.clone(),
                stage,
                "step.decision_applied",
                match transition.outcome {
                    StepOutcome::Rejected => AuditOutcome::Denied,
                    _ => AuditOutcome::Applied,
                },
            )
            .with_step(step.id.clone())
            .with_metadata("outcome", format!("{:?}", transition.outcome)),
        );

        Ok(DecisionOutcome {
            step: transition.step,
            step_outcome: transition.outcome,
            request_status: request.status,
            activated_step,
            escalated_to,
        })
    }
}
