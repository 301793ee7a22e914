use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use payflow_core::domain::reference::{CategoryId, ProjectId, UserId, VendorId};
use payflow_core::domain::request::{PaymentRequest, RequestId, RequestStatus};
use payflow_core::domain::workflow::WorkflowId;

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_request_status(s: &str) -> RequestStatus {
    match s {
        "pending" => RequestStatus::Pending,
        "approved" => RequestStatus::Approved,
        "rejected" => RequestStatus::Rejected,
        _ => RequestStatus::Draft,
    }
}

pub(crate) fn request_status_as_str(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Draft => "draft",
        RequestStatus::Pending => "pending",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
    }
}

pub(crate) fn parse_decimal(s: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(s).map_err(|e| RepositoryError::Decode(format!("bad decimal `{s}`: {e}")))
}

pub(crate) fn parse_required_dt(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{s}`: {e}")))
}

pub(crate) fn parse_optional_dt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<PaymentRequest, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let invoice_number: Option<String> = row.try_get("invoice_number").map_err(decode)?;
    let description: Option<String> = row.try_get("description").map_err(decode)?;
    let amount_str: String = row.try_get("amount").map_err(decode)?;
    let currency: String = row.try_get("currency").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let requester_id: String = row.try_get("requester_id").map_err(decode)?;
    let vendor_id: Option<String> = row.try_get("vendor_id").map_err(decode)?;
    let category_id: Option<String> = row.try_get("category_id").map_err(decode)?;
    let project_id: Option<String> = row.try_get("project_id").map_err(decode)?;
    let workflow_id: Option<String> = row.try_get("workflow_id").map_err(decode)?;
    let po_amount: Option<String> = row.try_get("po_amount").map_err(decode)?;
    let quote_amount: Option<String> = row.try_get("quote_amount").map_err(decode)?;
    let submitted_at: Option<String> = row.try_get("submitted_at").map_err(decode)?;
    let completed_at: Option<String> = row.try_get("completed_at").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode)?;

    Ok(PaymentRequest {
        id: RequestId(id),
        invoice_number,
        description,
        amount: parse_decimal(&amount_str)?,
        currency,
        status: parse_request_status(&status_str),
        requester_id: UserId(requester_id),
        vendor_id: vendor_id.map(VendorId),
        category_id: category_id.map(CategoryId),
        project_id: project_id.map(ProjectId),
        workflow_id: workflow_id.map(WorkflowId),
        po_amount: po_amount.as_deref().map(parse_decimal).transpose()?,
        quote_amount: quote_amount.as_deref().map(parse_decimal).transpose()?,
        submitted_at: parse_optional_dt(submitted_at),
        completed_at: parse_optional_dt(completed_at),
        created_at: parse_required_dt(&created_at)?,
        updated_at: parse_required_dt(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<PaymentRequest>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, invoice_number, description, amount, currency, status, requester_id,
                    vendor_id, category_id, project_id, workflow_id, po_amount, quote_amount,
                    submitted_at, completed_at, created_at, updated_at
             FROM payment_request WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: PaymentRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO payment_request (id, invoice_number, description, amount, currency,
                                          status, requester_id, vendor_id, category_id,
                                          project_id, workflow_id, po_amount, quote_amount,
                                          submitted_at, completed_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 invoice_number = excluded.invoice_number,
                 description = excluded.description,
                 amount = excluded.amount,
                 currency = excluded.currency,
                 status = excluded.status,
                 vendor_id = excluded.vendor_id,
                 category_id = excluded.category_id,
                 project_id = excluded.project_id,
                 workflow_id = excluded.workflow_id,
                 po_amount = excluded.po_amount,
                 quote_amount = excluded.quote_amount,
                 submitted_at = excluded.submitted_at,
                 completed_at = excluded.completed_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&request.id.0)
        .bind(&request.invoice_number)
        .bind(&request.description)
        .bind(request.amount.to_string())
        .bind(&request.currency)
        .bind(request_status_as_str(request.status))
        .bind(&request.requester_id.0)
        .bind(request.vendor_id.as_ref().map(|id| id.0.clone()))
        .bind(request.category_id.as_ref().map(|id| id.0.clone()))
        .bind(request.project_id.as_ref().map(|id| id.0.clone()))
        .bind(request.workflow_id.as_ref().map(|id| id.0.clone()))
        .bind(request.po_amount.map(|amount| amount.to_string()))
        .bind(request.quote_amount.map(|amount| amount.to_string()))
        .bind(request.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(request.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn approved_total_since(
        &self,
        requester_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError> {
        // amounts are TEXT; summed here instead of in SQL to keep decimal
        // precision
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT pr.amount FROM payment_request pr
             WHERE pr.requester_id = ?
               AND EXISTS (
                   SELECT 1 FROM approval_action aa
                   WHERE aa.request_id = pr.id
                     AND aa.action = 'approve'
                     AND aa.created_at >= ?)",
        )
        .bind(&requester_id.0)
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut total = Decimal::ZERO;
        for row in &rows {
            let amount: String =
                row.try_get("amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            total += parse_decimal(&amount)?;
        }
        Ok(total)
    }
}
