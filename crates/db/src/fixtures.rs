//! Canonical seed dataset for demos and integration tests: a small org,
//! two vendors at opposite ends of the risk scale, and a department
//! workflow next to the global default.

use rust_decimal::Decimal;

use payflow_core::domain::reference::{
    CategoryId, ContractId, ContractStatus, GroupId, Project, ProjectId, RiskRating,
    SpendCategory, User, UserGroup, UserId, UserRole, Vendor, VendorContract, VendorId,
};
use payflow_core::domain::workflow::{
    ActionType, ApprovalMode, ApprovalRule, CumulativePeriod, RuleType, Workflow, WorkflowId,
    WorkflowStatus,
};

use crate::repositories::{RepositoryError, Store};

pub struct SeedDataset {
    pub users: Vec<User>,
    pub groups: Vec<UserGroup>,
    pub memberships: Vec<(GroupId, UserId)>,
    pub vendors: Vec<Vendor>,
    pub categories: Vec<SpendCategory>,
    pub projects: Vec<Project>,
    pub contracts: Vec<VendorContract>,
    pub workflows: Vec<Workflow>,
}

impl Default for SeedDataset {
    fn default() -> Self {
        let users = vec![
            user("u-employee", "Riley Chen", UserRole::Employee, Some("Finance")),
            user("u-manager", "Morgan Diaz", UserRole::Manager, Some("Finance")),
            user("u-senior", "Alex Okafor", UserRole::SeniorManager, Some("Finance")),
            user("u-exec", "Jordan Park", UserRole::Executive, None),
            user("u-compliance", "Sasha Ivanov", UserRole::Manager, Some("Compliance")),
        ];

        let groups = vec![
            UserGroup { id: GroupId("g-finance".to_string()), name: "Finance Approvers".to_string() },
            UserGroup { id: GroupId("g-directors".to_string()), name: "Directors".to_string() },
            UserGroup { id: GroupId("g-compliance".to_string()), name: "Compliance".to_string() },
        ];

        let memberships = vec![
            (GroupId("g-finance".to_string()), UserId("u-manager".to_string())),
            (GroupId("g-finance".to_string()), UserId("u-senior".to_string())),
            (GroupId("g-directors".to_string()), UserId("u-senior".to_string())),
            (GroupId("g-directors".to_string()), UserId("u-exec".to_string())),
            (GroupId("g-compliance".to_string()), UserId("u-compliance".to_string())),
        ];

        let vendors = vec![
            Vendor {
                id: VendorId("V-acme".to_string()),
                name: "Acme Office Supply".to_string(),
                risk_rating: RiskRating::Low,
                is_new: false,
                country: Some("US".to_string()),
                requires_compliance_review: false,
            },
            Vendor {
                id: VendorId("V-frontier".to_string()),
                name: "Frontier Logistics".to_string(),
                risk_rating: RiskRating::High,
                is_new: true,
                country: Some("RU".to_string()),
                requires_compliance_review: true,
            },
        ];

        let categories = vec![SpendCategory {
            id: CategoryId("C-it".to_string()),
            name: "IT Equipment".to_string(),
            default_approver_id: Some(UserId("u-senior".to_string())),
        }];

        let projects = vec![Project {
            id: ProjectId("P-migration".to_string()),
            name: "Data Center Migration".to_string(),
            project_manager_id: Some(UserId("u-manager".to_string())),
        }];

        let contracts = vec![VendorContract {
            id: ContractId("CT-acme-2026".to_string()),
            vendor_id: VendorId("V-acme".to_string()),
            status: ContractStatus::Active,
            contract_amount: Decimal::from(24_000),
            allowed_variance_pct: Some(Decimal::new(5, 2)),
        }];

        let workflows = vec![finance_workflow(), global_workflow()];

        Self { users, groups, memberships, vendors, categories, projects, contracts, workflows }
    }
}

impl SeedDataset {
    pub async fn apply(&self, store: &Store) -> Result<(), RepositoryError> {
        for user in &self.users {
            store.reference.save_user(user.clone()).await?;
        }
        for group in &self.groups {
            store.reference.save_group(group.clone()).await?;
        }
        for (group_id, user_id) in &self.memberships {
            store.reference.add_group_member(group_id, user_id).await?;
        }
        for vendor in &self.vendors {
            store.reference.save_vendor(vendor.clone()).await?;
        }
        for category in &self.categories {
            store.reference.save_category(category.clone()).await?;
        }
        for project in &self.projects {
            store.reference.save_project(project.clone()).await?;
        }
        for contract in &self.contracts {
            store.contracts.save(contract.clone()).await?;
        }
        for workflow in &self.workflows {
            store.workflows.save(workflow.clone()).await?;
        }
        Ok(())
    }
}

fn user(id: &str, name: &str, role: UserRole, department: Option<&str>) -> User {
    User {
        id: UserId(id.to_string()),
        name: name.to_string(),
        role,
        department: department.map(str::to_string),
    }
}

fn finance_workflow() -> Workflow {
    let id = "WF-finance";

    let mut threshold = ApprovalRule::new(
        "R-fin-threshold",
        id,
        "amounts over 10k need a manager",
        RuleType::Threshold,
        1,
        ActionType::RequireApproval,
    );
    threshold.min_amount = Some(Decimal::from(10_000));
    threshold.required_role = Some(UserRole::Manager);
    threshold.sla_hours = Some(48);
    threshold.escalate_to_group_id = Some(GroupId("g-directors".to_string()));

    let mut large = ApprovalRule::new(
        "R-fin-large",
        id,
        "amounts over 100k need two senior sign-offs",
        RuleType::Threshold,
        2,
        ActionType::RequireApproval,
    );
    large.min_amount = Some(Decimal::from(100_000));
    large.required_group_id = Some(GroupId("g-directors".to_string()));
    large.approval_mode = Some(ApprovalMode::Parallel);
    large.required_approvals = Some(2);

    let mut vendor = ApprovalRule::new(
        "R-fin-vendor",
        id,
        "new or high-risk vendors need review",
        RuleType::Vendor,
        3,
        ActionType::RequireApproval,
    );
    vendor.vendor_is_new = true;
    vendor.vendor_risk_ratings = vec![RiskRating::High];
    vendor.required_group_id = Some(GroupId("g-finance".to_string()));

    let mut compliance = ApprovalRule::new(
        "R-fin-compliance",
        id,
        "compliance review",
        RuleType::Compliance,
        4,
        ActionType::RequireApproval,
    );
    compliance.requires_compliance_review = true;
    compliance.requires_legal_review = true;
    compliance.required_group_id = Some(GroupId("g-compliance".to_string()));

    let mut cumulative = ApprovalRule::new(
        "R-fin-cumulative",
        id,
        "monthly spend cap per requester",
        RuleType::Cumulative,
        5,
        ActionType::RequireApproval,
    );
    cumulative.cumulative_period = Some(CumulativePeriod::Monthly);
    cumulative.cumulative_limit = Some(Decimal::from(250_000));
    cumulative.required_role = Some(UserRole::SeniorManager);

    let mut sod = ApprovalRule::new(
        "R-fin-sod",
        id,
        "requesters never approve their own spend",
        RuleType::Sod,
        6,
        ActionType::RequireApproval,
    );
    sod.prevent_self_approval = true;

    Workflow {
        id: WorkflowId(id.to_string()),
        name: "Finance approvals".to_string(),
        department_scope: Some("Finance".to_string()),
        status: WorkflowStatus::Active,
        rules: vec![threshold, large, vendor, compliance, cumulative, sod],
    }
}

fn global_workflow() -> Workflow {
    let id = "WF-global";

    let mut small = ApprovalRule::new(
        "R-glob-auto",
        id,
        "auto-approve small spend with established vendors",
        RuleType::AutoApprove,
        0,
        ActionType::AutoApprove,
    );
    small.max_amount = Some(Decimal::from(1_000));

    let mut threshold = ApprovalRule::new(
        "R-glob-threshold",
        id,
        "any spend over 5k needs a manager",
        RuleType::Threshold,
        1,
        ActionType::RequireApproval,
    );
    threshold.min_amount = Some(Decimal::from(5_000));
    threshold.required_role = Some(UserRole::Manager);

    let mut block = ApprovalRule::new(
        "R-glob-block",
        id,
        "reject anything over 1M outright",
        RuleType::Threshold,
        2,
        ActionType::AutoReject,
    );
    block.min_amount = Some(Decimal::from(1_000_000));

    Workflow {
        id: WorkflowId(id.to_string()),
        name: "Default approvals".to_string(),
        department_scope: None,
        status: WorkflowStatus::Active,
        rules: vec![small, threshold, block],
    }
}

#[cfg(test)]
mod tests {
    use payflow_core::domain::reference::{GroupId, UserId, VendorId};
    use payflow_core::domain::workflow::WorkflowId;

    use super::SeedDataset;
    use crate::repositories::Store;

    #[tokio::test]
    async fn seed_applies_cleanly_to_an_in_memory_store() {
        let store = Store::in_memory();
        SeedDataset::default().apply(&store).await.expect("apply");

        let workflow = store
            .workflows
            .find_by_id(&WorkflowId("WF-finance".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(workflow.rules.len(), 6);

        let groups = store
            .reference
            .groups_for_user(&UserId("u-senior".to_string()))
            .await
            .expect("groups");
        assert!(groups.contains(&GroupId("g-directors".to_string())));

        let contracts = store
            .contracts
            .list_for_vendor(&VendorId("V-acme".to_string()))
            .await
            .expect("contracts");
        assert_eq!(contracts.len(), 1);
    }

    #[tokio::test]
    async fn seed_is_idempotent_against_sql_store() {
        let pool = crate::connect_in_memory()
            .await
            .expect("connect");
        crate::migrations::run_pending(&pool).await.expect("migrations");
        let store = Store::sql(pool);

        let seed = SeedDataset::default();
        seed.apply(&store).await.expect("first apply");
        seed.apply(&store).await.expect("second apply");

        let workflow = store
            .workflows
            .find_by_id(&WorkflowId("WF-global".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(workflow.rules.len(), 3);
    }
}
