use payflow_core::domain::reference::User;
use payflow_core::domain::workflow::Workflow;

use super::ServiceError;
use crate::repositories::Store;

/// Picks the workflow governing a requester: their department's active
/// workflow when one exists, otherwise the global default.
pub struct WorkflowResolver {
    store: Store,
}

impl WorkflowResolver {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn resolve_for(&self, requester: &User) -> Result<Option<Workflow>, ServiceError> {
        if let Some(department) = &requester.department {
            if let Some(workflow) =
                self.store.workflows.find_active_for_department(Some(department)).await?
            {
                tracing::debug!(
                    workflow_id = %workflow.id.0,
                    department = %department,
                    "resolved department workflow"
                );
                return Ok(Some(workflow));
            }
        }
        Ok(self.store.workflows.find_active_for_department(None).await?)
    }
}
