use sqlx::Row;

use payflow_core::domain::reference::{ContractId, ContractStatus, VendorContract, VendorId};

use super::request::parse_decimal;
use super::{ContractRepository, RepositoryError};
use crate::DbPool;

pub struct SqlContractRepository {
    pool: DbPool,
}

impl SqlContractRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_contract_status(s: &str) -> ContractStatus {
    match s {
        "active" => ContractStatus::Active,
        "terminated" => ContractStatus::Terminated,
        _ => ContractStatus::Expired,
    }
}

pub(crate) fn contract_status_as_str(status: ContractStatus) -> &'static str {
    match status {
        ContractStatus::Active => "active",
        ContractStatus::Expired => "expired",
        ContractStatus::Terminated => "terminated",
    }
}

fn row_to_contract(row: &sqlx::sqlite::SqliteRow) -> Result<VendorContract, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let vendor_id: String = row.try_get("vendor_id").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let contract_amount: String = row.try_get("contract_amount").map_err(decode)?;
    let allowed_variance_pct: Option<String> =
        row.try_get("allowed_variance_pct").map_err(decode)?;

    Ok(VendorContract {
        id: ContractId(id),
        vendor_id: VendorId(vendor_id),
        status: parse_contract_status(&status),
        contract_amount: parse_decimal(&contract_amount)?,
        allowed_variance_pct: allowed_variance_pct.as_deref().map(parse_decimal).transpose()?,
    })
}

#[async_trait::async_trait]
impl ContractRepository for SqlContractRepository {
    async fn list_for_vendor(
        &self,
        vendor_id: &VendorId,
    ) -> Result<Vec<VendorContract>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, vendor_id, status, contract_amount, allowed_variance_pct
             FROM vendor_contract WHERE vendor_id = ? ORDER BY id ASC",
        )
        .bind(&vendor_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_contract).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, contract: VendorContract) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO vendor_contract (id, vendor_id, status, contract_amount,
                                          allowed_variance_pct)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 contract_amount = excluded.contract_amount,
                 allowed_variance_pct = excluded.allowed_variance_pct",
        )
        .bind(&contract.id.0)
        .bind(&contract.vendor_id.0)
        .bind(contract_status_as_str(contract.status))
        .bind(contract.contract_amount.to_string())
        .bind(contract.allowed_variance_pct.map(|pct| pct.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use payflow_core::domain::reference::{
        ContractId, ContractStatus, RiskRating, Vendor, VendorContract, VendorId,
    };

    use super::SqlContractRepository;
    use crate::repositories::{ContractRepository, ReferenceRepository, SqlReferenceRepository};
    use crate::{connect_in_memory, migrations};

    #[tokio::test]
    async fn round_trip_preserves_variance_tolerance() {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let vendor_id = VendorId("V-1".to_string());
        SqlReferenceRepository::new(pool.clone())
            .save_vendor(Vendor {
                id: vendor_id.clone(),
                name: "Acme".to_string(),
                risk_rating: RiskRating::Low,
                is_new: false,
                country: None,
                requires_compliance_review: false,
            })
            .await
            .expect("save vendor");

        let repo = SqlContractRepository::new(pool);
        repo.save(VendorContract {
            id: ContractId("CT-1".to_string()),
            vendor_id: vendor_id.clone(),
            status: ContractStatus::Active,
            contract_amount: Decimal::from(120_000),
            allowed_variance_pct: Some(Decimal::new(3, 2)),
        })
        .await
        .expect("save contract");

        let contracts = repo.list_for_vendor(&vendor_id).await.expect("list");
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].allowed_variance_pct, Some(Decimal::new(3, 2)));
        assert_eq!(contracts[0].status, ContractStatus::Active);
    }
}
