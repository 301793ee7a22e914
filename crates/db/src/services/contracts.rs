use rust_decimal::Decimal;

use payflow_core::config::EngineConfig;
use payflow_core::contracts::{match_contract_with_default, ContractMatch, DEFAULT_CONTRACT_VARIANCE};
use payflow_core::domain::request::PaymentRequest;

use super::ServiceError;
use crate::repositories::Store;

/// Checks a request against the vendor's contracts; the first matching
/// contract wins.
pub struct ContractMatcher {
    store: Store,
    default_variance: Decimal,
}

impl ContractMatcher {
    pub fn new(store: Store) -> Self {
        Self { store, default_variance: DEFAULT_CONTRACT_VARIANCE }
    }

    pub fn from_config(store: Store, engine: &EngineConfig) -> Self {
        Self { store, default_variance: engine.default_contract_variance_pct }
    }

    pub async fn match_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<ContractMatch, ServiceError> {
        let Some(vendor_id) = &request.vendor_id else {
            return Ok(ContractMatch::no_match("request names no vendor"));
        };

        let contracts = self.store.contracts.list_for_vendor(vendor_id).await?;
        if contracts.is_empty() {
            return Ok(ContractMatch::no_match(format!(
                "vendor `{}` has no contracts",
                vendor_id.0
            )));
        }

        let mut last = ContractMatch::no_match("no contract matched");
        for contract in &contracts {
            let result = match_contract_with_default(request.amount, contract, self.default_variance);
            if result.matched {
                return Ok(result);
            }
            last = result;
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use payflow_core::domain::reference::{
        ContractId, ContractStatus, UserId, VendorContract, VendorId,
    };
    use payflow_core::domain::request::{PaymentRequest, RequestId, RequestStatus};

    use super::ContractMatcher;
    use crate::repositories::Store;

    fn request(amount: i64, vendor: Option<&str>) -> PaymentRequest {
        let now = Utc::now();
        PaymentRequest {
            id: RequestId("PR-1".to_string()),
            invoice_number: None,
            description: None,
            amount: Decimal::from(amount),
            currency: "USD".to_string(),
            status: RequestStatus::Draft,
            requester_id: UserId("u-req".to_string()),
            vendor_id: vendor.map(|v| VendorId(v.to_string())),
            category_id: None,
            project_id: None,
            workflow_id: None,
            po_amount: None,
            quote_amount: None,
            submitted_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn contract(id: &str, vendor: &str, amount: i64, status: ContractStatus) -> VendorContract {
        VendorContract {
            id: ContractId(id.to_string()),
            vendor_id: VendorId(vendor.to_string()),
            status,
            contract_amount: Decimal::from(amount),
            allowed_variance_pct: None,
        }
    }

    #[tokio::test]
    async fn first_matching_contract_wins() {
        let store = Store::in_memory();
        store
            .contracts
            .save(contract("CT-1", "V-1", 50_000, ContractStatus::Expired))
            .await
            .expect("save");
        store
            .contracts
            .save(contract("CT-2", "V-1", 10_000, ContractStatus::Active))
            .await
            .expect("save");

        let matcher = ContractMatcher::new(store);
        let result = matcher.match_request(&request(10_200, Some("V-1"))).await.expect("match");
        assert!(result.matched);
        assert_eq!(result.contract_id, Some(ContractId("CT-2".to_string())));
    }

    #[tokio::test]
    async fn vendorless_requests_never_match() {
        let matcher = ContractMatcher::new(Store::in_memory());
        let result = matcher.match_request(&request(10_000, None)).await.expect("match");
        assert!(!result.matched);
    }

    #[tokio::test]
    async fn configured_default_variance_tightens_the_match() {
        let store = Store::in_memory();
        store
            .contracts
            .save(contract("CT-1", "V-1", 10_000, ContractStatus::Active))
            .await
            .expect("save");

        let mut config = payflow_core::config::AppConfig::default();
        config.engine.default_contract_variance_pct = Decimal::new(1, 2);

        // 3% over the contract amount passes the built-in 5% default but
        // not the configured 1%
        let matcher = ContractMatcher::from_config(store.clone(), &config.engine);
        let result = matcher.match_request(&request(10_300, Some("V-1"))).await.expect("match");
        assert!(!result.matched);

        let lenient = ContractMatcher::new(store);
        let result = lenient.match_request(&request(10_300, Some("V-1"))).await.expect("match");
        assert!(result.matched);
    }

    #[tokio::test]
    async fn out_of_tolerance_amount_reports_the_deviation() {
        let store = Store::in_memory();
        store
            .contracts
            .save(contract("CT-1", "V-1", 10_000, ContractStatus::Active))
            .await
            .expect("save");

        let matcher = ContractMatcher::new(store);
        let result = matcher.match_request(&request(20_000, Some("V-1"))).await.expect("match");
        assert!(!result.matched);
        assert!(result.reason.contains("tolerance"));
    }
}
