//! Store-backed engine services: the glue between the pure evaluation and
//! state-machine functions in `payflow_core` and the repositories here.

use thiserror::Error;

use payflow_core::domain::reference::UserId;
use payflow_core::errors::DomainError;

use crate::repositories::RepositoryError;

pub mod approval;
pub mod context;
pub mod contracts;
pub mod resolver;
pub mod submission;

pub use approval::{ApprovalService, DecisionOutcome};
pub use context::ContextBuilder;
pub use contracts::ContractMatcher;
pub use resolver::WorkflowResolver;
pub use submission::{SubmissionOutcome, SubmissionService};

/// The authenticated identity behind a service call. Approver identity is
/// taken from here, never from request payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: UserId(user_id.into()) }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("user `{user_id}` may not {action}")]
    Forbidden { user_id: String, action: &'static str },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ServiceError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }
}
