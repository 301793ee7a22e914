pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod services;

pub use connection::{connect, connect_in_memory, DbPool};
pub use fixtures::SeedDataset;
pub use repositories::{
    ActionRepository, ContractRepository, ReferenceRepository, RepositoryError,
    RequestRepository, StepRepository, Store, WorkflowRepository,
};
pub use services::{
    ApprovalService, ContextBuilder, ContractMatcher, DecisionOutcome, Principal, ServiceError,
    SubmissionOutcome, SubmissionService, WorkflowResolver,
};
