//! Decision trail emitted by the engine services. Events are keyed by the
//! request they belong to; the request id is the correlation key across
//! submission and approval events.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::reference::UserId;
use crate::domain::request::RequestId;
use crate::domain::step::StepId;

/// Where in the request lifecycle the event was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Submission,
    Decision,
    Escalation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Applied,
    Denied,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub request_id: RequestId,
    /// Set when the event concerns one approval step rather than the
    /// request as a whole.
    pub step_id: Option<StepId>,
    pub actor: UserId,
    pub stage: AuditStage,
    pub event_type: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        request_id: RequestId,
        actor: UserId,
        stage: AuditStage,
        event_type: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id,
            step_id: None,
            actor,
            stage,
            event_type: event_type.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_step(mut self, step_id: StepId) -> Self {
        self.step_id = Some(step_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Buffering sink for tests and demos. Reads survive a poisoned lock.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forwards every event to the installed tracing subscriber.
#[derive(Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            request_id = %event.request_id.0,
            step_id = event.step_id.as_ref().map(|id| id.0.as_str()),
            actor = %event.actor.0,
            event_type = %event.event_type,
            stage = ?event.stage,
            outcome = ?event.outcome,
            "audit event"
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditEvent, AuditOutcome, AuditSink, AuditStage, InMemoryAuditSink};
    use crate::domain::reference::UserId;
    use crate::domain::request::RequestId;
    use crate::domain::step::StepId;

    fn decision_event(event_type: &str) -> AuditEvent {
        AuditEvent::new(
            RequestId("PR-2026-0042".to_owned()),
            UserId("u-approver".to_owned()),
            AuditStage::Decision,
            event_type,
            AuditOutcome::Applied,
        )
    }

    #[test]
    fn in_memory_sink_records_step_scoped_events() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            decision_event("step.decision_applied")
                .with_step(StepId("STEP-1".to_owned()))
                .with_metadata("outcome", "Approved"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].request_id.0, "PR-2026-0042");
        assert_eq!(events[0].step_id.as_ref().map(|id| id.0.as_str()), Some("STEP-1"));
        assert_eq!(events[0].actor.0, "u-approver");
        assert!(events[0].metadata.contains_key("outcome"));
    }

    #[test]
    fn every_event_gets_its_own_id() {
        assert_ne!(decision_event("a").id, decision_event("b").id);
    }
}
