//! Event-stream provider: reads recent events and publishes new ones to an
//! in-process topic log. Stands in for a message-broker consumer.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};

use switchboard_gateway::ToolProvider;
use switchboard_types::{FieldSpec, InputSchema, ProviderFailure, ToolDescriptor};

pub struct EventStreamProvider {
    next_offset: AtomicU64,
}

impl EventStreamProvider {
    pub fn new() -> Self {
        Self {
            next_offset: AtomicU64::new(42),
        }
    }

    fn recent_events(topic: &str) -> Vec<Value> {
        vec![
            json!({"topic": topic, "offset": 39, "event": {"kind": "lead.created", "leadId": 4}}),
            json!({"topic": topic, "offset": 40, "event": {"kind": "invoice.paid", "invoiceId": 103}}),
            json!({"topic": topic, "offset": 41, "event": {"kind": "workflow.finished", "workflowId": "lead-scoring"}}),
        ]
    }
}

impl Default for EventStreamProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for EventStreamProvider {
    fn id(&self) -> &str {
        "events"
    }

    fn display_name(&self) -> &str {
        "Event Stream Provider"
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "get_recent_events",
                "Get recent events from a topic",
                InputSchema::object()
                    .field("topic", FieldSpec::string().describe("Topic to read from"))
                    .field(
                        "limit",
                        FieldSpec::number().describe("Maximum number of events to return"),
                    ),
            ),
            ToolDescriptor::new(
                "publish_event",
                "Publish an event to a topic",
                InputSchema::object()
                    .field("topic", FieldSpec::string())
                    .field("event", FieldSpec::object())
                    .require("topic")
                    .require("event"),
            ),
        ]
    }

    async fn execute(
        &self,
        tool_name: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ProviderFailure> {
        match tool_name {
            "get_recent_events" => {
                let topic = params
                    .get("topic")
                    .and_then(Value::as_str)
                    .unwrap_or("activity");
                let limit = params
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(50) as usize;
                let events: Vec<Value> =
                    Self::recent_events(topic).into_iter().take(limit).collect();
                let count = events.len();
                Ok(json!({"topic": topic, "events": events, "count": count}))
            }
            "publish_event" => {
                let topic = params
                    .get("topic")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
                Ok(json!({
                    "published": true,
                    "topic": topic,
                    "offset": offset,
                    "timestamp": Utc::now(),
                }))
            }
            other => Err(ProviderFailure::new(format!("unknown tool '{other}'"))),
        }
    }
}
