use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::reference::{CategoryId, ProjectId, UserId, VendorId};
use crate::domain::workflow::WorkflowId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: RequestId,
    pub invoice_number: Option<String>,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: RequestStatus,
    pub requester_id: UserId,
    pub vendor_id: Option<VendorId>,
    pub category_id: Option<CategoryId>,
    pub project_id: Option<ProjectId>,
    pub workflow_id: Option<WorkflowId>,
    /// Purchase-order amount used as a variance base when present.
    pub po_amount: Option<Decimal>,
    /// Quoted amount used as a variance base when present.
    pub quote_amount: Option<Decimal>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self.status, next),
            (RequestStatus::Draft, RequestStatus::Pending)
                // auto decisions at submission skip the pending stage
                | (RequestStatus::Draft, RequestStatus::Approved)
                | (RequestStatus::Draft, RequestStatus::Rejected)
                | (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
        )
    }

    pub fn transition_to(&mut self, next: RequestStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidRequestTransition { from: self.status, to: next })
    }
}
