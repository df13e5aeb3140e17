//! AI-generation provider: produces insights, analyses and chart
//! configurations. Stands in for an LLM-backed service; responses are
//! deterministic templates over the inputs.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use switchboard_gateway::ToolProvider;
use switchboard_types::{FieldSpec, InputSchema, ProviderFailure, ToolDescriptor};

pub struct InsightProvider;

impl InsightProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InsightProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for InsightProvider {
    fn id(&self) -> &str {
        "insight"
    }

    fn display_name(&self) -> &str {
        "Insight Provider"
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "generate_insight",
                "Generate an AI-powered insight for a free-text question",
                InputSchema::object()
                    .field("query", FieldSpec::string().describe("The question to answer"))
                    .field(
                        "context",
                        FieldSpec::object().describe("Optional context data to ground the answer"),
                    )
                    .require("query"),
            ),
            ToolDescriptor::new(
                "analyze_data",
                "Analyze a data set and return observations and recommendations",
                InputSchema::object()
                    .field("data", FieldSpec::object().describe("Data to analyze"))
                    .field(
                        "analysisType",
                        FieldSpec::string()
                            .describe("Kind of analysis to run")
                            .one_of(["scoring", "trends", "anomalies"]),
                    )
                    .require("data"),
            ),
            ToolDescriptor::new(
                "generate_chart",
                "Generate a chart configuration from data and a requested chart type",
                InputSchema::object()
                    .field("data", FieldSpec::array().describe("Series of {label, value} points"))
                    .field(
                        "chartType",
                        FieldSpec::string().one_of(["bar", "line", "pie", "area"]),
                    )
                    .field("title", FieldSpec::string())
                    .field("color", FieldSpec::string().describe("Hex color for the series")),
            ),
        ]
    }

    async fn execute(
        &self,
        tool_name: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ProviderFailure> {
        match tool_name {
            "generate_insight" => {
                let query = params
                    .get("query")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(json!({
                    "insight": format!(
                        "Based on your query \"{query}\": lead conversion holds at 12.5%, \
                         revenue is trending 22% above target."
                    ),
                    "query": query,
                    "confidence": 0.85,
                }))
            }
            "analyze_data" => {
                let analysis_type = params
                    .get("analysisType")
                    .and_then(Value::as_str)
                    .unwrap_or("scoring");
                Ok(json!({
                    "analysisType": analysis_type,
                    "observations": [
                        "Hot-tier leads convert at roughly three times the warm-tier rate",
                        "Outstanding invoices cluster around two accounts",
                    ],
                    "recommendations": [
                        format!("Prioritize {analysis_type} review for the top decile"),
                    ],
                }))
            }
            "generate_chart" => {
                let chart_type = params
                    .get("chartType")
                    .and_then(Value::as_str)
                    .unwrap_or("bar");
                let title = params.get("title").and_then(Value::as_str).unwrap_or("Chart");
                let color = params
                    .get("color")
                    .and_then(Value::as_str)
                    .unwrap_or("#0ea5e9");
                let data = params.get("data").cloned().unwrap_or_else(|| {
                    json!([
                        {"name": "Category A", "value": 400},
                        {"name": "Category B", "value": 300},
                        {"name": "Category C", "value": 200},
                        {"name": "Category D", "value": 100},
                    ])
                });
                Ok(json!({
                    "type": chart_type,
                    "title": title,
                    "data": data,
                    "config": {"color": color, "animated": true},
                }))
            }
            other => Err(ProviderFailure::new(format!("unknown tool '{other}'"))),
        }
    }
}
