use sqlx::Row;

use payflow_core::domain::reference::{CategoryId, GroupId, ProjectId, RiskRating, UserId};
use payflow_core::domain::workflow::{
    ActionType, ApprovalMode, ApprovalRule, CumulativePeriod, RuleId, RuleType, VarianceBaseField,
    VotingMode, Workflow, WorkflowId, WorkflowStatus,
};

use super::reference::{parse_user_role, user_role_as_str};
use super::request::parse_decimal;
use super::{RepositoryError, WorkflowRepository};
use crate::DbPool;

pub struct SqlWorkflowRepository {
    pool: DbPool,
}

impl SqlWorkflowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_rules(&self, workflow_id: &str) -> Result<Vec<ApprovalRule>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, workflow_id, name, rule_type, rule_order, active, min_amount, max_amount,
                    cumulative_period, cumulative_limit, variance_pct, variance_base_field,
                    vendor_is_new, vendor_risk_ratings, category_id, project_id,
                    requires_compliance_review, requires_legal_review, prevent_self_approval,
                    prevent_creator_approval, action_type, required_group_id, required_role,
                    specific_approver_id, approval_mode, required_approvals, voting_mode,
                    sla_hours, escalate_to_group_id
             FROM approval_rule WHERE workflow_id = ? ORDER BY rule_order ASC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_rule).collect::<Result<Vec<_>, _>>()
    }
}

fn parse_workflow_status(s: &str) -> WorkflowStatus {
    match s {
        "active" => WorkflowStatus::Active,
        _ => WorkflowStatus::Inactive,
    }
}

fn workflow_status_as_str(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Active => "active",
        WorkflowStatus::Inactive => "inactive",
    }
}

fn parse_rule_type(s: &str) -> Result<RuleType, RepositoryError> {
    match s {
        "threshold" => Ok(RuleType::Threshold),
        "cumulative" => Ok(RuleType::Cumulative),
        "variance" => Ok(RuleType::Variance),
        "vendor" => Ok(RuleType::Vendor),
        "category" => Ok(RuleType::Category),
        "project" => Ok(RuleType::Project),
        "compliance" => Ok(RuleType::Compliance),
        "sod" => Ok(RuleType::Sod),
        "auto_approve" => Ok(RuleType::AutoApprove),
        "dual_control" => Ok(RuleType::DualControl),
        "sla" => Ok(RuleType::Sla),
        other => Err(RepositoryError::Decode(format!("unknown rule type `{other}`"))),
    }
}

fn rule_type_as_str(rule_type: RuleType) -> &'static str {
    match rule_type {
        RuleType::Threshold => "threshold",
        RuleType::Cumulative => "cumulative",
        RuleType::Variance => "variance",
        RuleType::Vendor => "vendor",
        RuleType::Category => "category",
        RuleType::Project => "project",
        RuleType::Compliance => "compliance",
        RuleType::Sod => "sod",
        RuleType::AutoApprove => "auto_approve",
        RuleType::DualControl => "dual_control",
        RuleType::Sla => "sla",
    }
}

fn parse_action_type(s: &str) -> Result<ActionType, RepositoryError> {
    match s {
        "require_approval" => Ok(ActionType::RequireApproval),
        "auto_approve" => Ok(ActionType::AutoApprove),
        "auto_reject" => Ok(ActionType::AutoReject),
        "escalate" => Ok(ActionType::Escalate),
        other => Err(RepositoryError::Decode(format!("unknown action type `{other}`"))),
    }
}

fn action_type_as_str(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::RequireApproval => "require_approval",
        ActionType::AutoApprove => "auto_approve",
        ActionType::AutoReject => "auto_reject",
        ActionType::Escalate => "escalate",
    }
}

pub(crate) fn parse_approval_mode(s: &str) -> ApprovalMode {
    match s {
        "parallel" => ApprovalMode::Parallel,
        _ => ApprovalMode::Sequential,
    }
}

pub(crate) fn approval_mode_as_str(mode: ApprovalMode) -> &'static str {
    match mode {
        ApprovalMode::Sequential => "sequential",
        ApprovalMode::Parallel => "parallel",
    }
}

pub(crate) fn parse_voting_mode(s: &str) -> VotingMode {
    match s {
        "majority" => VotingMode::Majority,
        _ => VotingMode::Unanimous,
    }
}

pub(crate) fn voting_mode_as_str(mode: VotingMode) -> &'static str {
    match mode {
        VotingMode::Unanimous => "unanimous",
        VotingMode::Majority => "majority",
    }
}

fn parse_cumulative_period(s: &str) -> CumulativePeriod {
    match s {
        "daily" => CumulativePeriod::Daily,
        "weekly" => CumulativePeriod::Weekly,
        _ => CumulativePeriod::Monthly,
    }
}

fn cumulative_period_as_str(period: CumulativePeriod) -> &'static str {
    match period {
        CumulativePeriod::Daily => "daily",
        CumulativePeriod::Weekly => "weekly",
        CumulativePeriod::Monthly => "monthly",
    }
}

fn parse_variance_base(s: &str) -> VarianceBaseField {
    match s {
        "quote_amount" => VarianceBaseField::QuoteAmount,
        _ => VarianceBaseField::PoAmount,
    }
}

fn variance_base_as_str(base: VarianceBaseField) -> &'static str {
    match base {
        VarianceBaseField::PoAmount => "po_amount",
        VarianceBaseField::QuoteAmount => "quote_amount",
    }
}

fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRule, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let workflow_id: String = row.try_get("workflow_id").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let rule_type_str: String = row.try_get("rule_type").map_err(decode)?;
    let rule_order: i32 = row.try_get("rule_order").map_err(decode)?;
    let active: bool = row.try_get("active").map_err(decode)?;
    let min_amount: Option<String> = row.try_get("min_amount").map_err(decode)?;
    let max_amount: Option<String> = row.try_get("max_amount").map_err(decode)?;
    let cumulative_period: Option<String> = row.try_get("cumulative_period").map_err(decode)?;
    let cumulative_limit: Option<String> = row.try_get("cumulative_limit").map_err(decode)?;
    let variance_pct: Option<String> = row.try_get("variance_pct").map_err(decode)?;
    let variance_base: Option<String> = row.try_get("variance_base_field").map_err(decode)?;
    let vendor_is_new: bool = row.try_get("vendor_is_new").map_err(decode)?;
    let risk_ratings_json: String = row.try_get("vendor_risk_ratings").map_err(decode)?;
    let category_id: Option<String> = row.try_get("category_id").map_err(decode)?;
    let project_id: Option<String> = row.try_get("project_id").map_err(decode)?;
    let requires_compliance_review: bool =
        row.try_get("requires_compliance_review").map_err(decode)?;
    let requires_legal_review: bool = row.try_get("requires_legal_review").map_err(decode)?;
    let prevent_self_approval: bool = row.try_get("prevent_self_approval").map_err(decode)?;
    let prevent_creator_approval: bool =
        row.try_get("prevent_creator_approval").map_err(decode)?;
    let action_type_str: String = row.try_get("action_type").map_err(decode)?;
    let required_group_id: Option<String> = row.try_get("required_group_id").map_err(decode)?;
    let required_role: Option<String> = row.try_get("required_role").map_err(decode)?;
    let specific_approver_id: Option<String> =
        row.try_get("specific_approver_id").map_err(decode)?;
    let approval_mode: Option<String> = row.try_get("approval_mode").map_err(decode)?;
    let required_approvals: Option<i64> = row.try_get("required_approvals").map_err(decode)?;
    let voting_mode: Option<String> = row.try_get("voting_mode").map_err(decode)?;
    let sla_hours: Option<i64> = row.try_get("sla_hours").map_err(decode)?;
    let escalate_to_group_id: Option<String> =
        row.try_get("escalate_to_group_id").map_err(decode)?;

    let vendor_risk_ratings: Vec<RiskRating> = serde_json::from_str(&risk_ratings_json)
        .map_err(|e| RepositoryError::Decode(format!("bad risk rating list: {e}")))?;

    Ok(ApprovalRule {
        id: RuleId(id),
        workflow_id: WorkflowId(workflow_id),
        name,
        rule_type: parse_rule_type(&rule_type_str)?,
        order: rule_order,
        active,
        min_amount: min_amount.as_deref().map(parse_decimal).transpose()?,
        max_amount: max_amount.as_deref().map(parse_decimal).transpose()?,
        cumulative_period: cumulative_period.as_deref().map(parse_cumulative_period),
        cumulative_limit: cumulative_limit.as_deref().map(parse_decimal).transpose()?,
        variance_pct: variance_pct.as_deref().map(parse_decimal).transpose()?,
        variance_base_field: variance_base.as_deref().map(parse_variance_base),
        vendor_is_new,
        vendor_risk_ratings,
        category_id: category_id.map(CategoryId),
        project_id: project_id.map(ProjectId),
        requires_compliance_review,
        requires_legal_review,
        prevent_self_approval,
        prevent_creator_approval,
        action_type: parse_action_type(&action_type_str)?,
        required_group_id: required_group_id.map(GroupId),
        required_role: required_role.as_deref().map(parse_user_role),
        specific_approver_id: specific_approver_id.map(UserId),
        approval_mode: approval_mode.as_deref().map(parse_approval_mode),
        required_approvals: required_approvals.map(|count| count.max(0) as u32),
        voting_mode: voting_mode.as_deref().map(parse_voting_mode),
        sla_hours,
        escalate_to_group_id: escalate_to_group_id.map(GroupId),
    })
}

#[async_trait::async_trait]
impl WorkflowRepository for SqlWorkflowRepository {
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, department_scope, status FROM workflow WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
        let workflow_id: String = row.try_get("id").map_err(decode)?;
        let name: String = row.try_get("name").map_err(decode)?;
        let department_scope: Option<String> = row.try_get("department_scope").map_err(decode)?;
        let status: String = row.try_get("status").map_err(decode)?;

        let rules = self.load_rules(&workflow_id).await?;
        Ok(Some(Workflow {
            id: WorkflowId(workflow_id),
            name,
            department_scope,
            status: parse_workflow_status(&status),
            rules,
        }))
    }

    async fn find_active_for_department(
        &self,
        department: Option<&str>,
    ) -> Result<Option<Workflow>, RepositoryError> {
        let row = if let Some(department) = department {
            sqlx::query(
                "SELECT id FROM workflow
                 WHERE status = 'active' AND department_scope = ?
                 ORDER BY id ASC LIMIT 1",
            )
            .bind(department)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id FROM workflow
                 WHERE status = 'active' AND department_scope IS NULL
                 ORDER BY id ASC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?
        };

        match row {
            Some(row) => {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                self.find_by_id(&WorkflowId(id)).await
            }
            None => Ok(None),
        }
    }

    async fn save(&self, workflow: Workflow) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO workflow (id, name, department_scope, status)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 department_scope = excluded.department_scope,
                 status = excluded.status",
        )
        .bind(&workflow.id.0)
        .bind(&workflow.name)
        .bind(&workflow.department_scope)
        .bind(workflow_status_as_str(workflow.status))
        .execute(&mut *tx)
        .await?;

        // rules are replaced wholesale with the workflow
        sqlx::query("DELETE FROM approval_rule WHERE workflow_id = ?")
            .bind(&workflow.id.0)
            .execute(&mut *tx)
            .await?;

        for rule in &workflow.rules {
            let risk_ratings_json = serde_json::to_string(&rule.vendor_risk_ratings)
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            sqlx::query(
                "INSERT INTO approval_rule (id, workflow_id, name, rule_type, rule_order, active,
                     min_amount, max_amount, cumulative_period, cumulative_limit, variance_pct,
                     variance_base_field, vendor_is_new, vendor_risk_ratings, category_id,
                     project_id, requires_compliance_review, requires_legal_review,
                     prevent_self_approval, prevent_creator_approval, action_type,
                     required_group_id, required_role, specific_approver_id, approval_mode,
                     required_approvals, voting_mode, sla_hours, escalate_to_group_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&rule.id.0)
            .bind(&workflow.id.0)
            .bind(&rule.name)
            .bind(rule_type_as_str(rule.rule_type))
            .bind(rule.order)
            .bind(rule.active)
            .bind(rule.min_amount.map(|amount| amount.to_string()))
            .bind(rule.max_amount.map(|amount| amount.to_string()))
            .bind(rule.cumulative_period.map(cumulative_period_as_str))
            .bind(rule.cumulative_limit.map(|amount| amount.to_string()))
            .bind(rule.variance_pct.map(|pct| pct.to_string()))
            .bind(rule.variance_base_field.map(variance_base_as_str))
            .bind(rule.vendor_is_new)
            .bind(risk_ratings_json)
            .bind(rule.category_id.as_ref().map(|id| id.0.clone()))
            .bind(rule.project_id.as_ref().map(|id| id.0.clone()))
            .bind(rule.requires_compliance_review)
            .bind(rule.requires_legal_review)
            .bind(rule.prevent_self_approval)
            .bind(rule.prevent_creator_approval)
            .bind(action_type_as_str(rule.action_type))
            .bind(rule.required_group_id.as_ref().map(|id| id.0.clone()))
            .bind(rule.required_role.map(user_role_as_str))
            .bind(rule.specific_approver_id.as_ref().map(|id| id.0.clone()))
            .bind(rule.approval_mode.map(approval_mode_as_str))
            .bind(rule.required_approvals.map(|count| count as i64))
            .bind(rule.voting_mode.map(voting_mode_as_str))
            .bind(rule.sla_hours)
            .bind(rule.escalate_to_group_id.as_ref().map(|id| id.0.clone()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use payflow_core::domain::reference::{GroupId, RiskRating, UserRole};
    use payflow_core::domain::workflow::{
        ActionType, ApprovalMode, ApprovalRule, CumulativePeriod, RuleType, Workflow, WorkflowId,
        WorkflowStatus,
    };

    use super::SqlWorkflowRepository;
    use crate::repositories::WorkflowRepository;
    use crate::{connect_in_memory, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_workflow(id: &str, department: Option<&str>) -> Workflow {
        let mut threshold = ApprovalRule::new(
            format!("{id}-threshold"),
            id,
            "large amounts need a manager",
            RuleType::Threshold,
            2,
            ActionType::RequireApproval,
        );
        threshold.min_amount = Some(Decimal::from(10_000));
        threshold.required_role = Some(UserRole::Manager);
        threshold.sla_hours = Some(48);
        threshold.escalate_to_group_id = Some(GroupId("g-directors".to_string()));

        let mut vendor = ApprovalRule::new(
            format!("{id}-vendor"),
            id,
            "risky vendors",
            RuleType::Vendor,
            1,
            ActionType::RequireApproval,
        );
        vendor.vendor_risk_ratings = vec![RiskRating::Medium, RiskRating::High];
        vendor.approval_mode = Some(ApprovalMode::Parallel);
        vendor.required_approvals = Some(2);

        let mut cumulative = ApprovalRule::new(
            format!("{id}-cumulative"),
            id,
            "monthly spend cap",
            RuleType::Cumulative,
            3,
            ActionType::RequireApproval,
        );
        cumulative.cumulative_period = Some(CumulativePeriod::Monthly);
        cumulative.cumulative_limit = Some(Decimal::from(250_000));

        Workflow {
            id: WorkflowId(id.to_string()),
            name: "Purchasing approvals".to_string(),
            department_scope: department.map(str::to_string),
            status: WorkflowStatus::Active,
            rules: vec![threshold, vendor, cumulative],
        }
    }

    #[tokio::test]
    async fn round_trip_preserves_rules_in_order() {
        let pool = setup().await;
        let repo = SqlWorkflowRepository::new(pool);
        let workflow = sample_workflow("WF-1", Some("Finance"));
        repo.save(workflow.clone()).await.expect("save");

        let found = repo.find_by_id(&workflow.id).await.expect("find").expect("present");
        assert_eq!(found.rules.len(), 3);
        // loaded ordered by rule order, not insertion order
        assert_eq!(found.rules[0].rule_type, RuleType::Vendor);
        assert_eq!(found.rules[0].vendor_risk_ratings, vec![RiskRating::Medium, RiskRating::High]);
        assert_eq!(found.rules[1].required_role, Some(UserRole::Manager));
        assert_eq!(found.rules[1].escalate_to_group_id, Some(GroupId("g-directors".to_string())));
        assert_eq!(found.rules[2].cumulative_limit, Some(Decimal::from(250_000)));
    }

    #[tokio::test]
    async fn save_replaces_the_rule_set() {
        let pool = setup().await;
        let repo = SqlWorkflowRepository::new(pool);
        let mut workflow = sample_workflow("WF-1", None);
        repo.save(workflow.clone()).await.expect("first save");

        workflow.rules.truncate(1);
        repo.save(workflow.clone()).await.expect("second save");

        let found = repo.find_by_id(&workflow.id).await.expect("find").expect("present");
        assert_eq!(found.rules.len(), 1);
    }

    #[tokio::test]
    async fn department_lookup_falls_back_to_global_default() {
        let pool = setup().await;
        let repo = SqlWorkflowRepository::new(pool);
        let mut scoped = sample_workflow("WF-finance", Some("Finance"));
        scoped.status = WorkflowStatus::Inactive;
        repo.save(scoped).await.expect("save scoped");
        repo.save(sample_workflow("WF-global", None)).await.expect("save global");

        // inactive scoped workflow is never selected
        let for_finance =
            repo.find_active_for_department(Some("Finance")).await.expect("lookup");
        assert!(for_finance.is_none());

        let global = repo.find_active_for_department(None).await.expect("lookup");
        assert_eq!(global.expect("global present").id, WorkflowId("WF-global".to_string()));
    }
}
