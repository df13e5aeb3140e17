//! The provider boundary: one trait every backend capability source implements.
//!
//! Real providers (a database query executor, an LLM client, an automation
//! runner, an event-stream reader) live in their own crates and plug in here;
//! the gateway never sees their internals.
//!
//! Use `&self` for all methods — implementations should use interior
//! mutability (e.g. `Mutex`, `RwLock`) for any mutable state.

use async_trait::async_trait;
use serde_json::{Map, Value};

use switchboard_types::{ProviderFailure, ToolDescriptor};

/// A backend capability source offering a named set of callable tools.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Stable identifier, unique across the registry.
    fn id(&self) -> &str;

    /// Human-readable label.
    fn display_name(&self) -> &str;

    /// The provider's tool catalog. Fetched during the connect handshake;
    /// the whole set replaces any previously installed one.
    fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Execute one named tool with already-validated parameters.
    ///
    /// Implementations must not block indefinitely — the gateway bounds the
    /// call with a local timeout either way, but an abandoned call keeps
    /// occupying the provider's in-flight capacity until it returns.
    async fn execute(
        &self,
        tool_name: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ProviderFailure>;

    /// Cheap liveness probe used by the gateway's monitor to refresh the
    /// provider's heartbeat. In-process providers are always reachable.
    async fn ping(&self) -> Result<(), ProviderFailure> {
        Ok(())
    }
}
