//! Data-query provider: serves lead, customer, invoice and metric lookups
//! over an in-process mock dataset.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use switchboard_gateway::ToolProvider;
use switchboard_types::{FieldSpec, InputSchema, ProviderFailure, ToolDescriptor};

pub struct DatabaseProvider;

impl DatabaseProvider {
    pub fn new() -> Self {
        Self
    }

    fn leads() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "John Smith", "company": "Acme Corp", "tier": "hot", "status": "new", "score": 85}),
            json!({"id": 2, "name": "Jane Doe", "company": "Startup.io", "tier": "warm", "status": "contacted", "score": 62}),
            json!({"id": 3, "name": "Bob Wilson", "company": "Enterprise Inc", "tier": "hot", "status": "qualified", "score": 92}),
            json!({"id": 4, "name": "Alice Chen", "company": "Globex", "tier": "cold", "status": "new", "score": 31}),
        ]
    }

    fn customers() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Acme Corp", "status": "active", "ltv": 5200}),
            json!({"id": 2, "name": "Initech", "status": "active", "ltv": 3100}),
            json!({"id": 3, "name": "Umbrella LLC", "status": "churned", "ltv": 900}),
        ]
    }

    fn invoices() -> Vec<Value> {
        vec![
            json!({"id": 101, "customer": "Acme Corp", "status": "paid", "amount": 12000}),
            json!({"id": 102, "customer": "Initech", "status": "outstanding", "amount": 4700}),
            json!({"id": 103, "customer": "Umbrella LLC", "status": "paid", "amount": 900}),
        ]
    }

    fn filter_by(rows: Vec<Value>, field: &str, wanted: Option<&Value>) -> Vec<Value> {
        match wanted {
            Some(value) => rows
                .into_iter()
                .filter(|row| row.get(field) == Some(value))
                .collect(),
            None => rows,
        }
    }

    fn limit(rows: Vec<Value>, params: &Map<String, Value>) -> Vec<Value> {
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(50) as usize;
        rows.into_iter().take(limit).collect()
    }
}

impl Default for DatabaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for DatabaseProvider {
    fn id(&self) -> &str {
        "database"
    }

    fn display_name(&self) -> &str {
        "Database Provider"
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "get_leads",
                "Fetch leads with optional filters for tier, status, and limit",
                InputSchema::object()
                    .field(
                        "tier",
                        FieldSpec::string()
                            .describe("Filter by lead tier")
                            .one_of(["hot", "warm", "cold"]),
                    )
                    .field("status", FieldSpec::string().describe("Filter by lead status"))
                    .field(
                        "limit",
                        FieldSpec::number().describe("Maximum number of leads to return"),
                    ),
            ),
            ToolDescriptor::new(
                "get_lead_stats",
                "Aggregated lead statistics including counts by tier and average score",
                InputSchema::object(),
            ),
            ToolDescriptor::new(
                "get_customers",
                "Fetch customers with optional filters",
                InputSchema::object()
                    .field("status", FieldSpec::string().describe("Filter by customer status"))
                    .field(
                        "limit",
                        FieldSpec::number().describe("Maximum number of customers to return"),
                    ),
            ),
            ToolDescriptor::new(
                "get_invoices",
                "Fetch invoices with optional filters",
                InputSchema::object()
                    .field("status", FieldSpec::string().describe("Filter by invoice status"))
                    .field(
                        "limit",
                        FieldSpec::number().describe("Maximum number of invoices to return"),
                    ),
            ),
            ToolDescriptor::new(
                "get_dashboard_metrics",
                "All dashboard metrics in a single call for overview displays",
                InputSchema::object(),
            ),
        ]
    }

    async fn execute(
        &self,
        tool_name: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ProviderFailure> {
        match tool_name {
            "get_leads" => {
                let rows = Self::filter_by(Self::leads(), "tier", params.get("tier"));
                let rows = Self::filter_by(rows, "status", params.get("status"));
                let rows = Self::limit(rows, &params);
                let count = rows.len();
                Ok(json!({"leads": rows, "count": count}))
            }
            "get_lead_stats" => Ok(json!({
                "total": 127,
                "hot": 15,
                "warm": 45,
                "cold": 67,
                "avgScore": 42.5,
                "newToday": 6,
            })),
            "get_customers" => {
                let rows = Self::filter_by(Self::customers(), "status", params.get("status"));
                let rows = Self::limit(rows, &params);
                let count = rows.len();
                Ok(json!({"customers": rows, "count": count}))
            }
            "get_invoices" => {
                let rows = Self::filter_by(Self::invoices(), "status", params.get("status"));
                let rows = Self::limit(rows, &params);
                let count = rows.len();
                Ok(json!({"invoices": rows, "count": count}))
            }
            "get_dashboard_metrics" => Ok(json!({
                "leads": {"total": 127, "hot": 15, "warm": 45, "cold": 67, "avgScore": 42.5},
                "revenue": {"total": 245000, "paid": 198000, "outstanding": 47000},
                "customers": {"total": 89, "active": 72, "avgLtv": 4250},
                "content": {"total": 45, "published": 38, "aiGenerated": 22},
            })),
            other => Err(ProviderFailure::new(format!("unknown tool '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_get_leads_filters_by_tier() {
        let provider = DatabaseProvider::new();
        let result = provider
            .execute("get_leads", params(json!({"tier": "hot"})))
            .await
            .unwrap();
        let leads = result["leads"].as_array().unwrap();
        assert_eq!(leads.len(), 2);
        assert!(leads.iter().all(|l| l["tier"] == "hot"));
    }

    #[tokio::test]
    async fn test_get_leads_respects_limit() {
        let provider = DatabaseProvider::new();
        let result = provider
            .execute("get_leads", params(json!({"limit": 1})))
            .await
            .unwrap();
        assert_eq!(result["count"], 1);
    }

    #[tokio::test]
    async fn test_get_dashboard_metrics_shape() {
        let provider = DatabaseProvider::new();
        let result = provider
            .execute("get_dashboard_metrics", Map::new())
            .await
            .unwrap();
        assert_eq!(result["leads"]["total"], 127);
        assert_eq!(result["revenue"]["total"], 245000);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails() {
        let provider = DatabaseProvider::new();
        let err = provider.execute("drop_tables", Map::new()).await.unwrap_err();
        assert!(err.message.contains("drop_tables"));
    }

    #[test]
    fn test_tool_names_unique() {
        let provider = DatabaseProvider::new();
        let tools = provider.list_tools();
        let mut names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }
}
