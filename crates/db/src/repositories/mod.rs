use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use payflow_core::domain::reference::{
    CategoryId, GroupId, Project, ProjectId, SpendCategory, User, UserGroup, UserId, Vendor,
    VendorContract, VendorId,
};
use payflow_core::domain::request::{PaymentRequest, RequestId};
use payflow_core::domain::step::{ActiveApprovalStep, ApprovalAction, StepId};
use payflow_core::domain::workflow::{Workflow, WorkflowId};

pub mod contract;
pub mod memory;
pub mod reference;
pub mod request;
pub mod step;
pub mod workflow;

pub use contract::SqlContractRepository;
pub use memory::{
    InMemoryActionRepository, InMemoryContractRepository, InMemoryReferenceRepository,
    InMemoryRequestRepository, InMemoryStepRepository, InMemoryWorkflowRepository,
};
pub use reference::SqlReferenceRepository;
pub use request::SqlRequestRepository;
pub use step::{SqlActionRepository, SqlStepRepository};
pub use workflow::SqlWorkflowRepository;

use crate::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("stale update for step `{step_id}`: stored version no longer {expected}")]
    VersionConflict { step_id: String, expected: i64 },
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId)
        -> Result<Option<PaymentRequest>, RepositoryError>;

    async fn save(&self, request: PaymentRequest) -> Result<(), RepositoryError>;

    /// Sum of this requester's request amounts that received at least one
    /// approve action at or after `since`. Feeds cumulative-limit rules.
    async fn approved_total_since(
        &self,
        requester_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Loads the workflow with its rules ordered by rule order.
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError>;

    /// Active workflow for an exact department scope; `None` selects the
    /// global default (no scope).
    async fn find_active_for_department(
        &self,
        department: Option<&str>,
    ) -> Result<Option<Workflow>, RepositoryError>;

    async fn save(&self, workflow: Workflow) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait StepRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &StepId,
    ) -> Result<Option<ActiveApprovalStep>, RepositoryError>;

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ActiveApprovalStep>, RepositoryError>;

    async fn insert(&self, step: ActiveApprovalStep) -> Result<(), RepositoryError>;

    /// Writes the updated step only when the stored version still equals
    /// `expected_version`; a lost race surfaces as `VersionConflict`.
    async fn update_versioned(
        &self,
        step: &ActiveApprovalStep,
        expected_version: i64,
    ) -> Result<(), RepositoryError>;
}

/// Append-only decision log. Rows are never updated or deleted.
#[async_trait]
pub trait ActionRepository: Send + Sync {
    async fn append(&self, action: ApprovalAction) -> Result<(), RepositoryError>;

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError>;
}

#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_vendor(&self, id: &VendorId) -> Result<Option<Vendor>, RepositoryError>;
    async fn find_category(
        &self,
        id: &CategoryId,
    ) -> Result<Option<SpendCategory>, RepositoryError>;
    async fn find_project(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError>;
    async fn groups_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>, RepositoryError>;

    async fn save_user(&self, user: User) -> Result<(), RepositoryError>;
    async fn save_vendor(&self, vendor: Vendor) -> Result<(), RepositoryError>;
    async fn save_category(&self, category: SpendCategory) -> Result<(), RepositoryError>;
    async fn save_project(&self, project: Project) -> Result<(), RepositoryError>;
    async fn save_group(&self, group: UserGroup) -> Result<(), RepositoryError>;
    async fn add_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn list_for_vendor(
        &self,
        vendor_id: &VendorId,
    ) -> Result<Vec<VendorContract>, RepositoryError>;

    async fn save(&self, contract: VendorContract) -> Result<(), RepositoryError>;
}

/// Repository bundle handed to the services; cloning shares the handles.
#[derive(Clone)]
pub struct Store {
    pub requests: Arc<dyn RequestRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub steps: Arc<dyn StepRepository>,
    pub actions: Arc<dyn ActionRepository>,
    pub reference: Arc<dyn ReferenceRepository>,
    pub contracts: Arc<dyn ContractRepository>,
}

impl Store {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            requests: Arc::new(SqlRequestRepository::new(pool.clone())),
            workflows: Arc::new(SqlWorkflowRepository::new(pool.clone())),
            steps: Arc::new(SqlStepRepository::new(pool.clone())),
            actions: Arc::new(SqlActionRepository::new(pool.clone())),
            reference: Arc::new(SqlReferenceRepository::new(pool.clone())),
            contracts: Arc::new(SqlContractRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        // the request repository reads the action log to compute
        // cumulative approved totals, so the two share state
        let actions = Arc::new(InMemoryActionRepository::default());
        Self {
            requests: Arc::new(InMemoryRequestRepository::new(actions.clone())),
            workflows: Arc::new(InMemoryWorkflowRepository::default()),
            steps: Arc::new(InMemoryStepRepository::default()),
            actions,
            reference: Arc::new(InMemoryReferenceRepository::default()),
            contracts: Arc::new(InMemoryContractRepository::default()),
        }
    }
}
