//! Automation-execution provider: triggers workflows and reports execution
//! status. Stands in for a workflow engine or browser-automation runner.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use switchboard_gateway::ToolProvider;
use switchboard_types::{FieldSpec, InputSchema, ProviderFailure, ToolDescriptor};

pub struct AutomationProvider {
    /// Execution id -> workflow id, for status lookups of runs we started.
    executions: Mutex<HashMap<String, String>>,
}

impl AutomationProvider {
    pub fn new() -> Self {
        Self {
            executions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for AutomationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for AutomationProvider {
    fn id(&self) -> &str {
        "automation"
    }

    fn display_name(&self) -> &str {
        "Automation Provider"
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "trigger_workflow",
                "Trigger a workflow run with optional input data",
                InputSchema::object()
                    .field("workflowId", FieldSpec::string().describe("Workflow to run"))
                    .field("data", FieldSpec::object().describe("Input payload for the run"))
                    .require("workflowId"),
            ),
            ToolDescriptor::new(
                "get_workflow_status",
                "Get the status of a workflow execution",
                InputSchema::object()
                    .field("executionId", FieldSpec::string())
                    .require("executionId"),
            ),
        ]
    }

    async fn execute(
        &self,
        tool_name: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ProviderFailure> {
        match tool_name {
            "trigger_workflow" => {
                let workflow_id = params
                    .get("workflowId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let execution_id = Uuid::new_v4().to_string();
                self.executions
                    .lock()
                    .await
                    .insert(execution_id.clone(), workflow_id.clone());
                Ok(json!({
                    "executionId": execution_id,
                    "workflowId": workflow_id,
                    "status": "running",
                }))
            }
            "get_workflow_status" => {
                let execution_id = params
                    .get("executionId")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let executions = self.executions.lock().await;
                match executions.get(execution_id) {
                    Some(workflow_id) => Ok(json!({
                        "executionId": execution_id,
                        "workflowId": workflow_id,
                        "status": "success",
                        "finished": true,
                    })),
                    None => Err(ProviderFailure::new(format!(
                        "unknown execution '{execution_id}'"
                    ))),
                }
            }
            other => Err(ProviderFailure::new(format!("unknown tool '{other}'"))),
        }
    }
}
