use std::sync::Arc;

use chrono::Utc;

use payflow_core::audit::{AuditEvent, AuditOutcome, AuditSink, AuditStage};
use payflow_core::config::EngineConfig;
use payflow_core::domain::request::{RequestId, RequestStatus};
use payflow_core::domain::step::ActiveApprovalStep;
use payflow_core::engine::evaluate_workflow;
use payflow_core::rules::PolicySettings;
use payflow_core::steps::materialize_steps;

use super::{ContextBuilder, Principal, ServiceError, WorkflowResolver};
use crate::repositories::Store;

#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionOutcome {
    /// No active workflow applies; the request stays in draft for manual
    /// routing.
    NoWorkflow,
    AutoApproved { reasons: Vec<String> },
    AutoRejected { reason: String },
    /// The request is pending. `steps` may be empty when no rule
    /// triggered; such requests await a manual decision.
    AwaitingApproval { steps: Vec<ActiveApprovalStep> },
}

/// Takes a draft request through workflow resolution, rule evaluation and
/// either an auto decision or step materialization.
pub struct SubmissionService {
    store: Store,
    resolver: WorkflowResolver,
    context: ContextBuilder,
    audit: Arc<dyn AuditSink>,
}

impl SubmissionService {
    pub fn new(store: Store, policy: PolicySettings, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            resolver: WorkflowResolver::new(store.clone()),
            context: ContextBuilder::new(store.clone(), policy),
            store,
            audit,
        }
    }

    /// Policy knobs come straight from the `[engine]` config section.
    pub fn from_config(store: Store, engine: &EngineConfig, audit: Arc<dyn AuditSink>) -> Self {
        Self::new(store, engine.policy_settings(), audit)
    }

    pub async fn submit(
        &self,
        request_id: &RequestId,
        principal: &Principal,
    ) -> Result<SubmissionOutcome, ServiceError> {
        let mut request = self
            .store
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("request", &request_id.0))?;

        if principal.user_id != request.requester_id {
            return Err(ServiceError::Forbidden {
                user_id: principal.user_id.0.clone(),
                action: "submit a request they did not create",
            });
        }
        if request.status != RequestStatus::Draft {
            return Err(payflow_core::errors::DomainError::InvalidRequestTransition {
                from: request.status,
                to: RequestStatus::Pending,
            }
            .into());
        }

        let now = Utc::now();
        let ctx = self.context.build(&request, now).await?;

        let Some(workflow) = self.resolver.resolve_for(&ctx.requester).await? else {
            tracing::info!(request_id = %request.id.0, "no active workflow for requester");
            self.emit(&request.id, principal, "request.no_workflow", AuditOutcome::Applied, None);
            return Ok(SubmissionOutcome::NoWorkflow);
        };

        let evaluation = evaluate_workflow(&workflow, &ctx, now);
        request.workflow_id = Some(workflow.id.clone());
        request.submitted_at = Some(now);
        request.updated_at = now;

        if evaluation.auto_reject {
            let reason = evaluation
                .auto_reject_reason
                .unwrap_or_else(|| "rejected by workflow rule".to_string());
            request.transition_to(RequestStatus::Rejected)?;
            request.completed_at = Some(now);
            self.store.requests.save(request).await?;
            tracing::info!(request_id = %request_id.0, %reason, "request auto-rejected");
            self.emit(
                request_id,
                principal,
                "request.auto_rejected",
                AuditOutcome::Denied,
                Some(("reason", reason.clone())),
            );
            return Ok(SubmissionOutcome::AutoRejected { reason });
        }

        if evaluation.auto_approve {
            let reasons: Vec<String> = evaluation
                .triggered_rules
                .iter()
                .map(|evaluation| evaluation.reason.clone())
                .collect();
            request.transition_to(RequestStatus::Approved)?;
            request.completed_at = Some(now);
            self.store.requests.save(request).await?;
            tracing::info!(request_id = %request_id.0, "request auto-approved");
            self.emit(request_id, principal, "request.auto_approved", AuditOutcome::Applied, None);
            return Ok(SubmissionOutcome::AutoApproved { reasons });
        }

        let steps = materialize_steps(request_id, &evaluation.required_steps, now);
        for step in &steps {
            self.store.steps.insert(step.clone()).await?;
        }
        request.transition_to(RequestStatus::Pending)?;
        self.store.requests.save(request).await?;
        tracing::info!(
            request_id = %request_id.0,
            steps = steps.len(),
            "request submitted for approval"
        );
        self.emit(
            request_id,
            principal,
            "request.submitted",
            AuditOutcome::Applied,
            Some(("steps", steps.len().to_string())),
        );
        Ok(SubmissionOutcome::AwaitingApproval { steps })
    }

    fn emit(
        &self,
        request_id: &RequestId,
        principal: &Principal,
        event_type: &str,
        outcome: AuditOutcome,
        metadata: Option<(&str, String)>,
    ) {
        let mut event = AuditEvent::new(
            request_id.clone(),
            principal.user_id.clone(),
            AuditStage::Submission,
            event_type,
            outcome,
        );
        if let Some((key, value)) = metadata {
            event = event.with_metadata(key, value);
        }
        self.audit.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use payflow_core::audit::InMemoryAuditSink;
    use payflow_core::config::AppConfig;
    use payflow_core::domain::reference::{RiskRating, User, UserId, UserRole, Vendor, VendorId};
    use payflow_core::domain::request::{PaymentRequest, RequestId, RequestStatus};
    use payflow_core::domain::step::StepStatus;
    use payflow_core::domain::workflow::{
        ActionType, ApprovalRule, RuleType, Workflow, WorkflowId, WorkflowStatus,
    };
    use payflow_core::rules::PolicySettings;

    use super::{SubmissionOutcome, SubmissionService};
    use crate::repositories::Store;
    use crate::services::{Principal, ServiceError};

    fn draft_request(id: &str, requester: &str, amount: i64) -> PaymentRequest {
        let now = Utc::now();
        PaymentRequest {
            id: RequestId(id.to_string()),
            invoice_number: Some(format!("INV-{id}")),
            description: None,
            amount: Decimal::from(amount),
            currency: "USD".to_string(),
            status: RequestStatus::Draft,
            requester_id: UserId(requester.to_string()),
            vendor_id: None,
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

    async fn seed_requester(store: &Store) {
        store
            .reference
            .save_user(User {
                id: UserId("u-req".to_string()),
                name: "Riley".to_string(),
                role: UserRole::Employee,
                department: Some("Finance".to_string()),
            })
            .await
            .expect("save user");
    }

    fn threshold_rule(id: &str, order: i32, action: ActionType, min: Option<i64>) -> ApprovalRule {
        let mut rule = ApprovalRule::new(
            id,
            "WF-1",
            format!("rule {id}"),
            RuleType::Threshold,
            order,
            action,
        );
        rule.min_amount = min.map(Decimal::from);
        rule
    }

    async fn seed_workflow(store: &Store, rules: Vec<ApprovalRule>) {
        store
            .workflows
            .save(Workflow {
                id: WorkflowId("WF-1".to_string()),
                name: "Finance approvals".to_string(),
                department_scope: Some("Finance".to_string()),
                status: WorkflowStatus::Active,
                rules,
            })
            .await
            .expect("save workflow");
    }

    fn service(store: &Store) -> (SubmissionService, InMemoryAuditSink) {
        let sink = InMemoryAuditSink::default();
        let service = SubmissionService::new(
            store.clone(),
            PolicySettings::default(),
            Arc::new(sink.clone()),
        );
        (service, sink)
    }

    #[tokio::test]
    async fn materializes_steps_and_marks_request_pending() {
        let store = Store::in_memory();
        seed_requester(&store).await;
        seed_workflow(
            &store,
            vec![
                threshold_rule("R-low", 0, ActionType::RequireApproval, None),
                threshold_rule("R-high", 1, ActionType::RequireApproval, Some(10_000)),
            ],
        )
        .await;
        store.requests.save(draft_request("PR-1", "u-req", 25_000)).await.expect("save");

        let (service, sink) = service(&store);
        let outcome = service
            .submit(&RequestId("PR-1".to_string()), &Principal::new("u-req"))
            .await
            .expect("submit");

        let SubmissionOutcome::AwaitingApproval { steps } = outcome else {
            panic!("expected steps");
        };
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].status, StepStatus::Pending);
        assert_eq!(steps[1].status, StepStatus::Skipped);

        let stored = store
            .requests
            .find_by_id(&RequestId("PR-1".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.workflow_id, Some(WorkflowId("WF-1".to_string())));
        assert!(stored.submitted_at.is_some());
        assert!(sink.events().iter().any(|event| event.event_type == "request.submitted"));
    }

    #[tokio::test]
    async fn auto_reject_wins_and_completes_the_request() {
        let store = Store::in_memory();
        seed_requester(&store).await;
        seed_workflow(
            &store,
            vec![
                threshold_rule("R-manual", 0, ActionType::RequireApproval, None),
                threshold_rule("R-block", 1, ActionType::AutoReject, Some(50_000)),
            ],
        )
        .await;
        store.requests.save(draft_request("PR-1", "u-req", 75_000)).await.expect("save");

        let (service, _) = service(&store);
        let outcome = service
            .submit(&RequestId("PR-1".to_string()), &Principal::new("u-req"))
            .await
            .expect("submit");

        assert!(matches!(outcome, SubmissionOutcome::AutoRejected { .. }));
        let stored = store
            .requests
            .find_by_id(&RequestId("PR-1".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.status, RequestStatus::Rejected);
        assert!(stored.completed_at.is_some());
        let steps =
            store.steps.list_for_request(&RequestId("PR-1".to_string())).await.expect("list");
        assert!(steps.is_empty());
    }

    #[tokio::test]
    async fn unanimous_auto_approve_completes_the_request() {
        let store = Store::in_memory();
        seed_requester(&store).await;
        seed_workflow(&store, vec![threshold_rule("R-auto", 0, ActionType::AutoApprove, None)])
            .await;
        store.requests.save(draft_request("PR-1", "u-req", 500)).await.expect("save");

        let (service, _) = service(&store);
        let outcome = service
            .submit(&RequestId("PR-1".to_string()), &Principal::new("u-req"))
            .await
            .expect("submit");

        let SubmissionOutcome::AutoApproved { reasons } = outcome else {
            panic!("expected auto approval");
        };
        assert_eq!(reasons.len(), 1);
        let stored = store
            .requests
            .find_by_id(&RequestId("PR-1".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn engine_config_policy_reaches_rule_evaluation() {
        let store = Store::in_memory();
        seed_requester(&store).await;
        store
            .reference
            .save_vendor(Vendor {
                id: VendorId("V-remote".to_string()),
                name: "Remote Partner".to_string(),
                risk_rating: RiskRating::Low,
                is_new: false,
                country: Some("Freedonia".to_string()),
                requires_compliance_review: false,
            })
            .await
            .expect("save vendor");
        let compliance = ApprovalRule::new(
            "R-comp",
            "WF-1",
            "compliance review",
            RuleType::Compliance,
            0,
            ActionType::RequireApproval,
        );
        seed_workflow(&store, vec![compliance]).await;
        let mut request = draft_request("PR-1", "u-req", 500);
        request.vendor_id = Some(VendorId("V-remote".to_string()));
        store.requests.save(request).await.expect("save");

        let mut config = AppConfig::default();
        config.engine.high_risk_countries = vec!["Freedonia".to_string()];
        let service = SubmissionService::from_config(
            store.clone(),
            &config.engine,
            Arc::new(InMemoryAuditSink::default()),
        );

        let outcome = service
            .submit(&RequestId("PR-1".to_string()), &Principal::new("u-req"))
            .await
            .expect("submit");
        let SubmissionOutcome::AwaitingApproval { steps } = outcome else {
            panic!("expected a compliance step");
        };
        assert_eq!(steps.len(), 1);
    }

    #[tokio::test]
    async fn missing_workflow_leaves_request_in_draft() {
        let store = Store::in_memory();
        seed_requester(&store).await;
        store.requests.save(draft_request("PR-1", "u-req", 500)).await.expect("save");

        let (service, _) = service(&store);
        let outcome = service
            .submit(&RequestId("PR-1".to_string()), &Principal::new("u-req"))
            .await
            .expect("submit");
        assert_eq!(outcome, SubmissionOutcome::NoWorkflow);

        let stored = store
            .requests
            .find_by_id(&RequestId("PR-1".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.status, RequestStatus::Draft);
    }

    #[tokio::test]
    async fn only_the_requester_may_submit() {
        let store = Store::in_memory();
        seed_requester(&store).await;
        store.requests.save(draft_request("PR-1", "u-req", 500)).await.expect("save");

        let (service, _) = service(&store);
        let result =
            service.submit(&RequestId("PR-1".to_string()), &Principal::new("u-other")).await;
        assert!(matches!(result, Err(ServiceError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn resubmitting_a_pending_request_fails() {
        let store = Store::in_memory();
        seed_requester(&store).await;
        let mut request = draft_request("PR-1", "u-req", 500);
        request.status = RequestStatus::Pending;
        store.requests.save(request).await.expect("save");

        let (service, _) = service(&store);
        let result =
            service.submit(&RequestId("PR-1".to_string()), &Principal::new("u-req")).await;
        assert!(matches!(result, Err(ServiceError::Domain(_))));
    }
}
