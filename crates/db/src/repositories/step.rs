use sqlx::Row;

use payflow_core::domain::reference::{GroupId, UserId};
use payflow_core::domain::request::RequestId;
use payflow_core::domain::step::{
    ActionId, ActionKind, ActiveApprovalStep, ApprovalAction, StepId, StepStatus,
};
use payflow_core::domain::workflow::RuleId;

use super::reference::{parse_user_role, user_role_as_str};
use super::request::{parse_optional_dt, parse_required_dt};
use super::workflow::{
    approval_mode_as_str, parse_approval_mode, parse_voting_mode, voting_mode_as_str,
};
use super::{ActionRepository, RepositoryError, StepRepository};
use crate::DbPool;

pub struct SqlStepRepository {
    pool: DbPool,
}

impl SqlStepRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_step_status(s: &str) -> StepStatus {
    match s {
        "approved" => StepStatus::Approved,
        "rejected" => StepStatus::Rejected,
        "escalated" => StepStatus::Escalated,
        "skipped" => StepStatus::Skipped,
        _ => StepStatus::Pending,
    }
}

fn step_status_as_str(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::Approved => "approved",
        StepStatus::Rejected => "rejected",
        StepStatus::Escalated => "escalated",
        StepStatus::Skipped => "skipped",
    }
}

pub(crate) fn parse_action_kind(s: &str) -> ActionKind {
    match s {
        "reject" => ActionKind::Reject,
        "escalate" => ActionKind::Escalate,
        _ => ActionKind::Approve,
    }
}

pub(crate) fn action_kind_as_str(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Approve => "approve",
        ActionKind::Reject => "reject",
        ActionKind::Escalate => "escalate",
    }
}

const STEP_COLUMNS: &str = "id, request_id, rule_id, rule_name, step_order, status, \
    received_approvals, received_rejections, required_count, required_group_id, required_role, \
    specific_approver_id, mode, voting_mode, sla_hours, due_at, escalate_to_group_id, version, \
    created_at, updated_at";

fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> Result<ActiveApprovalStep, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let request_id: String = row.try_get("request_id").map_err(decode)?;
    let rule_id: Option<String> = row.try_get("rule_id").map_err(decode)?;
    let rule_name: String = row.try_get("rule_name").map_err(decode)?;
    let step_order: i32 = row.try_get("step_order").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let received_approvals: i64 = row.try_get("received_approvals").map_err(decode)?;
    let received_rejections: i64 = row.try_get("received_rejections").map_err(decode)?;
    let required_count: i64 = row.try_get("required_count").map_err(decode)?;
    let required_group_id: Option<String> = row.try_get("required_group_id").map_err(decode)?;
    let required_role: Option<String> = row.try_get("required_role").map_err(decode)?;
    let specific_approver_id: Option<String> =
        row.try_get("specific_approver_id").map_err(decode)?;
    let mode: String = row.try_get("mode").map_err(decode)?;
    let voting_mode: Option<String> = row.try_get("voting_mode").map_err(decode)?;
    let sla_hours: Option<i64> = row.try_get("sla_hours").map_err(decode)?;
    let due_at: Option<String> = row.try_get("due_at").map_err(decode)?;
    let escalate_to_group_id: Option<String> =
        row.try_get("escalate_to_group_id").map_err(decode)?;
    let version: i64 = row.try_get("version").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode)?;

    Ok(ActiveApprovalStep {
        id: StepId(id),
        request_id: RequestId(request_id),
        rule_id: rule_id.map(RuleId),
        rule_name,
        order: step_order,
        status: parse_step_status(&status),
        received_approvals: received_approvals.max(0) as u32,
        received_rejections: received_rejections.max(0) as u32,
        required_count: required_count.max(0) as u32,
        required_group_id: required_group_id.map(GroupId),
        required_role: required_role.as_deref().map(parse_user_role),
        specific_approver_id: specific_approver_id.map(UserId),
        mode: parse_approval_mode(&mode),
        voting_mode: voting_mode.as_deref().map(parse_voting_mode),
        sla_hours,
        due_at: parse_optional_dt(due_at),
        escalate_to_group_id: escalate_to_group_id.map(GroupId),
        version,
        created_at: parse_required_dt(&created_at)?,
        updated_at: parse_required_dt(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl StepRepository for SqlStepRepository {
    async fn find_by_id(
        &self,
        id: &StepId,
    ) -> Result<Option<ActiveApprovalStep>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {STEP_COLUMNS} FROM approval_step WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_step(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ActiveApprovalStep>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM approval_step
             WHERE request_id = ? ORDER BY step_order ASC, created_at ASC"
        ))
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_step).collect::<Result<Vec<_>, _>>()
    }

    async fn insert(&self, step: ActiveApprovalStep) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO approval_step (id, request_id, rule_id, rule_name, step_order, status,
                 received_approvals, received_rejections, required_count, required_group_id,
                 required_role, specific_approver_id, mode, voting_mode, sla_hours, due_at,
                 escalate_to_group_id, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&step.id.0)
        .bind(&step.request_id.0)
        .bind(step.rule_id.as_ref().map(|id| id.0.clone()))
        .bind(&step.rule_name)
        .bind(step.order)
        .bind(step_status_as_str(step.status))
        .bind(step.received_approvals as i64)
        .bind(step.received_rejections as i64)
        .bind(step.required_count as i64)
        .bind(step.required_group_id.as_ref().map(|id| id.0.clone()))
        .bind(step.required_role.map(user_role_as_str))
        .bind(step.specific_approver_id.as_ref().map(|id| id.0.clone()))
        .bind(approval_mode_as_str(step.mode))
        .bind(step.voting_mode.map(voting_mode_as_str))
        .bind(step.sla_hours)
        .bind(step.due_at.map(|dt| dt.to_rfc3339()))
        .bind(step.escalate_to_group_id.as_ref().map(|id| id.0.clone()))
        .bind(step.version)
        .bind(step.created_at.to_rfc3339())
        .bind(step.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_versioned(
        &self,
        step: &ActiveApprovalStep,
        expected_version: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE approval_step SET
                 status = ?,
                 received_approvals = ?,
                 received_rejections = ?,
                 required_group_id = ?,
                 required_role = ?,
                 specific_approver_id = ?,
                 due_at = ?,
                 escalate_to_group_id = ?,
                 version = ?,
                 updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(step_status_as_str(step.status))
        .bind(step.received_approvals as i64)
        .bind(step.received_rejections as i64)
        .bind(step.required_group_id.as_ref().map(|id| id.0.clone()))
        .bind(step.required_role.map(user_role_as_str))
        .bind(step.specific_approver_id.as_ref().map(|id| id.0.clone()))
        .bind(step.due_at.map(|dt| dt.to_rfc3339()))
        .bind(step.escalate_to_group_id.as_ref().map(|id| id.0.clone()))
        .bind(step.version)
        .bind(step.updated_at.to_rfc3339())
        .bind(&step.id.0)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::VersionConflict {
                step_id: step.id.0.clone(),
                expected: expected_version,
            });
        }
        Ok(())
    }
}

pub struct SqlActionRepository {
    pool: DbPool,
}

impl SqlActionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_action(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalAction, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let step_id: String = row.try_get("step_id").map_err(decode)?;
    let request_id: String = row.try_get("request_id").map_err(decode)?;
    let approver_id: String = row.try_get("approver_id").map_err(decode)?;
    let action: String = row.try_get("action").map_err(decode)?;
    let comment: Option<String> = row.try_get("comment").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;

    Ok(ApprovalAction {
        id: ActionId(id),
        step_id: StepId(step_id),
        request_id: RequestId(request_id),
        approver_id: UserId(approver_id),
        action: parse_action_kind(&action),
        comment,
        created_at: parse_required_dt(&created_at)?,
    })
}

#[async_trait::async_trait]
impl ActionRepository for SqlActionRepository {
    async fn append(&self, action: ApprovalAction) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO approval_action (id, step_id, request_id, approver_id, action, comment,
                                          created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&action.id.0)
        .bind(&action.step_id.0)
        .bind(&action.request_id.0)
        .bind(&action.approver_id.0)
        .bind(action_kind_as_str(action.action))
        .bind(&action.comment)
        .bind(action.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, step_id, request_id, approver_id, action, comment, created_at
             FROM approval_action WHERE request_id = ? ORDER BY created_at ASC",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_action).collect::<Result<Vec<_>, _>>()
    }
}
