use thiserror::Error;

use crate::domain::request::RequestStatus;
use crate::domain::step::StepStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid request transition from {from:?} to {to:?}")]
    InvalidRequestTransition { from: RequestStatus, to: RequestStatus },
    #[error("step `{step_id}` is not actionable in status {status:?}")]
    StepNotActionable { step_id: String, status: StepStatus },
    #[error("approver `{approver_id}` may not act on their own request")]
    SelfApproval { approver_id: String },
    #[error("approver `{approver_id}` is not eligible to act on step `{step_id}`")]
    IneligibleApprover { approver_id: String, step_id: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Authorization failures are terminal for the action but must never
    /// mutate step or request state.
    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, Self::SelfApproval { .. } | Self::IneligibleApprover { .. })
    }
}
