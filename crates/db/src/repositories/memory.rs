use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use payflow_core::domain::reference::{
    CategoryId, GroupId, Project, ProjectId, SpendCategory, User, UserGroup, UserId, Vendor,
    VendorContract, VendorId,
};
use payflow_core::domain::request::{PaymentRequest, RequestId};
use payflow_core::domain::step::{ActionKind, ActiveApprovalStep, ApprovalAction, StepId};
use payflow_core::domain::workflow::{Workflow, WorkflowId};

use super::{
    ActionRepository, ContractRepository, ReferenceRepository, RepositoryError,
    RequestRepository, StepRepository, WorkflowRepository,
};

#[derive(Default)]
pub struct InMemoryActionRepository {
    actions: RwLock<Vec<ApprovalAction>>,
}

#[async_trait::async_trait]
impl ActionRepository for InMemoryActionRepository {
    async fn append(&self, action: ApprovalAction) -> Result<(), RepositoryError> {
        let mut actions = self.actions.write().await;
        actions.push(action);
        Ok(())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError> {
        let actions = self.actions.read().await;
        let mut matching: Vec<ApprovalAction> =
            actions.iter().filter(|action| action.request_id == *request_id).cloned().collect();
        matching.sort_by_key(|action| action.created_at);
        Ok(matching)
    }
}

pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, PaymentRequest>>,
    // shared with the action repository so cumulative totals see the
    // same decision log
    actions: Arc<InMemoryActionRepository>,
}

impl InMemoryRequestRepository {
    pub fn new(actions: Arc<InMemoryActionRepository>) -> Self {
        Self { requests: RwLock::new(HashMap::new()), actions }
    }
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<PaymentRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: PaymentRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn approved_total_since(
        &self,
        requester_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError> {
        let approved_requests: HashSet<String> = {
            let actions = self.actions.actions.read().await;
            actions
                .iter()
                .filter(|action| action.action == ActionKind::Approve && action.created_at >= since)
                .map(|action| action.request_id.0.clone())
                .collect()
        };

        let requests = self.requests.read().await;
        Ok(requests
            .values()
            .filter(|request| {
                request.requester_id == *requester_id && approved_requests.contains(&request.id.0)
            })
            .map(|request| request.amount)
            .sum())
    }
}

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<HashMap<String, Workflow>>,
}

#[async_trait::async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&id.0).cloned().map(with_ordered_rules))
    }

    async fn find_active_for_department(
        &self,
        department: Option<&str>,
    ) -> Result<Option<Workflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        let mut candidates: Vec<&Workflow> = workflows
            .values()
            .filter(|workflow| {
                workflow.is_active() && workflow.department_scope.as_deref() == department
            })
            .collect();
        candidates.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(candidates.first().map(|workflow| with_ordered_rules((*workflow).clone())))
    }

    async fn save(&self, workflow: Workflow) -> Result<(), RepositoryError> {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id.0.clone(), workflow);
        Ok(())
    }
}

fn with_ordered_rules(mut workflow: Workflow) -> Workflow {
    workflow.rules.sort_by_key(|rule| rule.order);
    workflow
}

#[derive(Default)]
pub struct InMemoryStepRepository {
    steps: RwLock<HashMap<String, ActiveApprovalStep>>,
}

#[async_trait::async_trait]
impl StepRepository for InMemoryStepRepository {
    async fn find_by_id(
        &self,
        id: &StepId,
    ) -> Result<Option<ActiveApprovalStep>, RepositoryError> {
        let steps = self.steps.read().await;
        Ok(steps.get(&id.0).cloned())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ActiveApprovalStep>, RepositoryError> {
        let steps = self.steps.read().await;
        let mut matching: Vec<ActiveApprovalStep> =
            steps.values().filter(|step| step.request_id == *request_id).cloned().collect();
        matching.sort_by_key(|step| (step.order, step.created_at));
        Ok(matching)
    }

    async fn insert(&self, step: ActiveApprovalStep) -> Result<(), RepositoryError> {
        let mut steps = self.steps.write().await;
        steps.insert(step.id.0.clone(), step);
        Ok(())
    }

    async fn update_versioned(
        &self,
        step: &ActiveApprovalStep,
        expected_version: i64,
    ) -> Result<(), RepositoryError> {
        let mut steps = self.steps.write().await;
        match steps.get_mut(&step.id.0) {
            Some(stored) if stored.version == expected_version => {
                *stored = step.clone();
                Ok(())
            }
            _ => Err(RepositoryError::VersionConflict {
                step_id: step.id.0.clone(),
                expected: expected_version,
            }),
        }
    }
}

#[derive(Default)]
pub struct InMemoryReferenceRepository {
    users: RwLock<HashMap<String, User>>,
    vendors: RwLock<HashMap<String, Vendor>>,
    categories: RwLock<HashMap<String, SpendCategory>>,
    projects: RwLock<HashMap<String, Project>>,
    groups: RwLock<HashMap<String, UserGroup>>,
    memberships: RwLock<HashSet<(String, String)>>,
}

#[async_trait::async_trait]
impl ReferenceRepository for InMemoryReferenceRepository {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id.0).cloned())
    }

    async fn find_vendor(&self, id: &VendorId) -> Result<Option<Vendor>, RepositoryError> {
        Ok(self.vendors.read().await.get(&id.0).cloned())
    }

    async fn find_category(
        &self,
        id: &CategoryId,
    ) -> Result<Option<SpendCategory>, RepositoryError> {
        Ok(self.categories.read().await.get(&id.0).cloned())
    }

    async fn find_project(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        Ok(self.projects.read().await.get(&id.0).cloned())
    }

    async fn groups_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>, RepositoryError> {
        let memberships = self.memberships.read().await;
        let mut groups: Vec<GroupId> = memberships
            .iter()
            .filter(|(_, member)| *member == user_id.0)
            .map(|(group, _)| GroupId(group.clone()))
            .collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(groups)
    }

    async fn save_user(&self, user: User) -> Result<(), RepositoryError> {
        self.users.write().await.insert(user.id.0.clone(), user);
        Ok(())
    }

    async fn save_vendor(&self, vendor: Vendor) -> Result<(), RepositoryError> {
        self.vendors.write().await.insert(vendor.id.0.clone(), vendor);
        Ok(())
    }

    async fn save_category(&self, category: SpendCategory) -> Result<(), RepositoryError> {
        self.categories.write().await.insert(category.id.0.clone(), category);
        Ok(())
    }

    async fn save_project(&self, project: Project) -> Result<(), RepositoryError> {
        self.projects.write().await.insert(project.id.0.clone(), project);
        Ok(())
    }

    async fn save_group(&self, group: UserGroup) -> Result<(), RepositoryError> {
        self.groups.write().await.insert(group.id.0.clone(), group);
        Ok(())
    }

    async fn add_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), RepositoryError> {
        self.memberships.write().await.insert((group_id.0.clone(), user_id.0.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryContractRepository {
    contracts: RwLock<HashMap<String, VendorContract>>,
}

#[async_trait::async_trait]
impl ContractRepository for InMemoryContractRepository {
    async fn list_for_vendor(
        &self,
        vendor_id: &VendorId,
    ) -> Result<Vec<VendorContract>, RepositoryError> {
        let contracts = self.contracts.read().await;
        let mut matching: Vec<VendorContract> = contracts
            .values()
            .filter(|contract| contract.vendor_id == *vendor_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(matching)
    }

    async fn save(&self, contract: VendorContract) -> Result<(), RepositoryError> {
        self.contracts.write().await.insert(contract.id.0.clone(), contract);
        Ok(())
    }
}
