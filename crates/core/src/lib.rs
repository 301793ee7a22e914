pub mod audit;
pub mod config;
pub mod contracts;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod rules;
pub mod steps;

pub use contracts::{
    match_contract, match_contract_with_default, ContractMatch, DEFAULT_CONTRACT_VARIANCE,
};
pub use domain::reference::{
    CategoryId, ContractId, ContractStatus, GroupId, Project, ProjectId, RiskRating,
    SpendCategory, User, UserGroup, UserId, UserRole, Vendor, VendorContract, VendorId,
};
pub use domain::request::{PaymentRequest, RequestId, RequestStatus};
pub use domain::step::{ActionId, ActionKind, ActiveApprovalStep, ApprovalAction, StepId, StepStatus};
pub use domain::workflow::{
    ActionType, ApprovalMode, ApprovalRule, CumulativePeriod, RuleId, RuleType, VarianceBaseField,
    VotingMode, Workflow, WorkflowId, WorkflowStatus,
};
pub use engine::{evaluate_workflow, StepDefinition, WorkflowEvaluation};
pub use errors::DomainError;
pub use rules::{
    evaluate_rule, ApprovalRequirement, CumulativeTotals, EvaluationContext, PolicySettings,
    RuleEvaluation,
};
pub use steps::{
    advance_after_approval, apply_action, can_user_approve, escalation_successor,
    is_eligible_approver, materialize_steps, RequestAdvance, StepOutcome, StepTransition,
};
