use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ──────────────────── Provider Types ────────────────────

/// Connection status of a capability provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    /// Not reachable; only an explicit reconnect handshake leaves this state.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Live and accepting tool calls.
    Connected,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderStatus::Disconnected => write!(f, "disconnected"),
            ProviderStatus::Connecting => write!(f, "connecting"),
            ProviderStatus::Connected => write!(f, "connected"),
        }
    }
}

/// One line of the registry snapshot pushed on a streaming session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub id: String,
    pub name: String,
    pub status: ProviderStatus,
    pub tool_count: usize,
}

/// One line of the synchronous status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusEntry {
    pub id: String,
    pub display_name: String,
    pub status: ProviderStatus,
    pub tool_count: usize,
}

/// Response shape of the registry snapshot request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub providers: Vec<ProviderStatusEntry>,
    pub connected_count: usize,
    pub timestamp: DateTime<Utc>,
}

// ──────────────────── Tool Descriptors ────────────────────

/// Metadata for one callable tool offered by a provider.
///
/// Immutable once registered — a provider replaces its whole tool set on
/// reconnect, never a single descriptor in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique within the owning provider.
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A tool annotated with its owning provider, as returned by flattened listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub provider_id: String,
    pub name: String,
    pub description: String,
}

// ──────────────────── Input Schemas ────────────────────

/// Value type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Whether a JSON value satisfies this type. `integer` is strict:
    /// a fractional number does not pass.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        };
        write!(f, "{name}")
    }
}

/// Declaration of a single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Closed set of allowed values, when the field is an enumeration.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            description: None,
            allowed: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn array() -> Self {
        Self::new(FieldType::Array)
    }

    pub fn object() -> Self {
        Self::new(FieldType::Object)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Structural schema validating a tool call's parameters before dispatch.
///
/// Serialized form stays compatible with the JSON-Schema-style objects
/// providers publish: `{type: "object", properties, required,
/// additionalProperties}`. An absent `additionalProperties` leaves the
/// schema open — unknown fields are tolerated for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(
        rename = "additionalProperties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<bool>,
}

fn object_type() -> String {
    "object".to_string()
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::object()
    }
}

impl InputSchema {
    /// An empty open object schema (accepts anything).
    pub fn object() -> Self {
        Self {
            schema_type: object_type(),
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.properties.insert(name.into(), spec);
        self
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    /// Mark the schema closed: unknown fields become violations.
    pub fn closed(mut self) -> Self {
        self.additional_properties = Some(false);
        self
    }

    /// Check `params` against this schema, reporting the first violation.
    ///
    /// Required fields are checked in declaration order, then declared fields
    /// for type and enum membership, then (closed schemas only) unknown keys.
    pub fn validate(&self, params: &Map<String, Value>) -> Result<(), SchemaViolation> {
        for name in &self.required {
            if !params.contains_key(name) {
                return Err(SchemaViolation::MissingRequired { field: name.clone() });
            }
        }

        for (name, spec) in &self.properties {
            let Some(value) = params.get(name) else {
                continue;
            };
            if !spec.field_type.matches(value) {
                return Err(SchemaViolation::WrongType {
                    field: name.clone(),
                    expected: spec.field_type,
                });
            }
            if let Some(allowed) = &spec.allowed
                && !allowed.contains(value)
            {
                return Err(SchemaViolation::NotAllowed { field: name.clone() });
            }
        }

        if self.additional_properties == Some(false) {
            for key in params.keys() {
                if !self.properties.contains_key(key) {
                    return Err(SchemaViolation::UnknownField { field: key.clone() });
                }
            }
        }

        Ok(())
    }
}

/// First violated field of a parameter validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("missing required field '{field}'")]
    MissingRequired { field: String },
    #[error("field '{field}' must be of type {expected}")]
    WrongType { field: String, expected: FieldType },
    #[error("field '{field}' is not one of the allowed values")]
    NotAllowed { field: String },
    #[error("unknown field '{field}' not permitted by closed schema")]
    UnknownField { field: String },
}

impl SchemaViolation {
    /// The violated field's name.
    pub fn field(&self) -> &str {
        match self {
            SchemaViolation::MissingRequired { field }
            | SchemaViolation::WrongType { field, .. }
            | SchemaViolation::NotAllowed { field }
            | SchemaViolation::UnknownField { field } => field,
        }
    }
}

// ──────────────────── Tool Calls ────────────────────

/// A single tool invocation, routed through the gateway. Ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub provider_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Classification of a failed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ProviderNotFound,
    ProviderUnavailable,
    ProviderBusy,
    ToolNotFound,
    InvalidParams,
    Timeout,
    ProviderError,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ProviderNotFound => "ProviderNotFound",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::ProviderBusy => "ProviderBusy",
            ErrorKind::ToolNotFound => "ToolNotFound",
            ErrorKind::InvalidParams => "InvalidParams",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ProviderError => "ProviderError",
            ErrorKind::Internal => "Internal",
        };
        write!(f, "{name}")
    }
}

/// Structured error carried by a failed [`ToolCallResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Normalized envelope every dispatched call resolves to.
///
/// Exactly one of `payload` and `error` is populated; build results through
/// [`ToolCallResult::ok`] and [`ToolCallResult::fail`] to keep it that way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub success: bool,
    pub provider_id: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CallError>,
    pub timestamp: DateTime<Utc>,
}

impl ToolCallResult {
    pub fn ok(provider_id: impl Into<String>, tool_name: impl Into<String>, payload: Value) -> Self {
        Self {
            success: true,
            provider_id: provider_id.into(),
            tool_name: tool_name.into(),
            payload: Some(payload),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn fail(
        provider_id: impl Into<String>,
        tool_name: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            provider_id: provider_id.into(),
            tool_name: tool_name.into(),
            payload: None,
            error: Some(CallError {
                kind,
                message: message.into(),
            }),
            timestamp: Utc::now(),
        }
    }

    /// The error kind, for failed results.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Failure reported by a provider's execution entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderFailure {
    pub message: String,
}

impl ProviderFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ──────────────────── Stream Events ────────────────────

/// Server-to-client events pushed on a streaming session.
///
/// The stream is status-only: tool call results are returned synchronously
/// to the caller and never travel on this channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Emitted exactly once, when the session opens.
    Connection {
        servers: Vec<ProviderSummary>,
        timestamp: DateTime<Utc>,
    },
    /// Periodic liveness signal for the transport.
    Heartbeat { timestamp: DateTime<Utc> },
}
