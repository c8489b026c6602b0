use super::{param_or, DirectiveHandler, ToolError, ToolOutput, ToolSpec};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const DEFAULT_PROCESSING_TIME: Duration = Duration::from_millis(1500);

/// Sets up an approval workflow
pub struct CreateApprovalFlowTool {
    processing_time: Duration,
}

impl CreateApprovalFlowTool {
    pub fn new(processing_time: Duration) -> Self {
        Self { processing_time }
    }
}

impl Default for CreateApprovalFlowTool {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESSING_TIME)
    }
}

#[async_trait]
impl DirectiveHandler for CreateApprovalFlowTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "create_approval_flow",
            status: "Creating Approval Flow",
            message: "Setting up your approval workflow...",
        }
    }

    async fn execute(&self, parameters: &IndexMap<String, String>) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(self.processing_time).await;

        let workflow_id = Uuid::new_v4().to_string();
        let flow_name = param_or(parameters, "flow_name", "Approval Workflow");
        info!("Created approval workflow {} ({})", workflow_id, flow_name);

        Ok(
            ToolOutput::new(format!("/workflows/{workflow_id}/approval_flow.json"))
                .with_field("workflow_id", workflow_id)
                .with_field("flow_name", flow_name),
        )
    }
}
