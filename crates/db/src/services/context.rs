use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

use payflow_core::domain::request::PaymentRequest;
use payflow_core::rules::{CumulativeTotals, EvaluationContext, PolicySettings};

use super::ServiceError;
use crate::repositories::Store;

/// Assembles everything the rule evaluators need before evaluation starts:
/// resolved reference records plus the requester's cumulative approved
/// spend per period.
pub struct ContextBuilder {
    store: Store,
    policy: PolicySettings,
}

impl ContextBuilder {
    pub fn new(store: Store, policy: PolicySettings) -> Self {
        Self { store, policy }
    }

    pub async fn build(
        &self,
        request: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<EvaluationContext, ServiceError> {
        let requester = self
            .store
            .reference
            .find_user(&request.requester_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", &request.requester_id.0))?;

        let vendor = match &request.vendor_id {
            Some(id) => Some(
                self.store
                    .reference
                    .find_vendor(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("vendor", &id.0))?,
            ),
            None => None,
        };
        let category = match &request.category_id {
            Some(id) => Some(
                self.store
                    .reference
                    .find_category(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("category", &id.0))?,
            ),
            None => None,
        };
        let project = match &request.project_id {
            Some(id) => Some(
                self.store
                    .reference
                    .find_project(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("project", &id.0))?,
            ),
            None => None,
        };

        let cumulative = self.cumulative_totals(request, now).await?;

        Ok(EvaluationContext {
            request: request.clone(),
            requester,
            vendor,
            category,
            project,
            cumulative,
            policy: self.policy.clone(),
        })
    }

    /// Period windows are UTC calendar boundaries; weeks start Monday.
    async fn cumulative_totals(
        &self,
        request: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<CumulativeTotals, ServiceError> {
        let today = now.date_naive();
        let day_start = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
        let week_start =
            day_start - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let month_start =
            Utc.from_utc_datetime(&today.with_day(1).unwrap_or(today).and_time(NaiveTime::MIN));

        let requester = &request.requester_id;
        Ok(CumulativeTotals {
            daily: self.store.requests.approved_total_since(requester, day_start).await?,
            weekly: self.store.requests.approved_total_since(requester, week_start).await?,
            monthly: self.store.requests.approved_total_since(requester, month_start).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use payflow_core::domain::reference::{
        RiskRating, User, UserId, UserRole, Vendor, VendorId,
    };
    use payflow_core::domain::request::{PaymentRequest, RequestId, RequestStatus};
    use payflow_core::domain::step::{ActionId, ActionKind, ApprovalAction, StepId};
    use payflow_core::rules::PolicySettings;

    use super::ContextBuilder;
    use crate::repositories::Store;
    use crate::services::ServiceError;

    fn request(id: &str, requester: &str, amount: i64, vendor: Option<&str>) -> PaymentRequest {
        let now = Utc::now();
        PaymentRequest {
            id: RequestId(id.to_string()),
            invoice_number: None,
            description: None,
            amount: Decimal::from(amount),
            currency: "USD".to_string(),
            status: RequestStatus::Draft,
            requester_id: UserId(requester.to_string()),
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

    async fn seed_requester(store: &Store, id: &str) {
        store
            .reference
            .save_user(User {
                id: UserId(id.to_string()),
                name: "Riley".to_string(),
                role: UserRole::Employee,
                department: Some("Finance".to_string()),
            })
            .await
            .expect("save user");
    }

    #[tokio::test]
    async fn resolves_vendor_and_counts_cumulative_spend() {
        let store = Store::in_memory();
        seed_requester(&store, "u-req").await;
        store
            .reference
            .save_vendor(Vendor {
                id: VendorId("V-1".to_string()),
                name: "Acme".to_string(),
                risk_rating: RiskRating::Low,
                is_new: false,
                country: None,
                requires_compliance_review: false,
            })
            .await
            .expect("save vendor");

        // a previously approved request by the same user, earlier today
        let now = Utc::now();
        let prior = request("PR-prior", "u-req", 4_000, None);
        store.requests.save(prior.clone()).await.expect("save prior");
        store
            .actions
            .append(ApprovalAction {
                id: ActionId("ACT-1".to_string()),
                step_id: StepId("STEP-1".to_string()),
                request_id: prior.id,
                approver_id: UserId("u-boss".to_string()),
                action: ActionKind::Approve,
                comment: None,
                created_at: now,
            })
            .await
            .expect("append");

        let builder = ContextBuilder::new(store, PolicySettings::default());
        let ctx = builder
            .build(&request("PR-new", "u-req", 1_000, Some("V-1")), now)
            .await
            .expect("build");

        assert_eq!(ctx.vendor.as_ref().map(|v| v.id.0.as_str()), Some("V-1"));
        assert_eq!(ctx.cumulative.daily, Decimal::from(4_000));
        assert_eq!(ctx.cumulative.monthly, Decimal::from(4_000));
        assert_eq!(ctx.requester.role, UserRole::Employee);
    }

    #[tokio::test]
    async fn missing_vendor_reference_is_an_error() {
        let store = Store::in_memory();
        seed_requester(&store, "u-req").await;

        let builder = ContextBuilder::new(store, PolicySettings::default());
        let result =
            builder.build(&request("PR-1", "u-req", 1_000, Some("V-missing")), Utc::now()).await;
        assert!(matches!(result, Err(ServiceError::NotFound { entity: "vendor", .. })));
    }
}
