//! switchboard-gateway: capability-provider tool gateway.
//!
//! Provides:
//! - Provider registry: in-memory catalog of providers, status, tool sets
//! - Tool dispatcher: schema-validated, timeout-bounded call routing
//! - Streaming sessions: SSE push of registry snapshots and heartbeats
//! - Gateway façade composing the three, plus the HTTP surface
//! - Provider liveness monitoring (heartbeat refresh + staleness expiry)

pub mod dispatch;
pub mod handlers;
pub mod provider;
pub mod registry;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use switchboard_config::{LivenessConfig, StreamConfig, SwitchboardConfig};
use switchboard_types::{
    GatewayStatus, ProviderStatus, ProviderStatusEntry, ProviderSummary, ToolCallRequest,
    ToolCallResult,
};

pub use provider::ToolProvider;

use dispatch::Dispatcher;
use registry::{AnnotatedTool, ProviderRegistry, RegistryError};
use session::StreamSession;

/// The single entry surface other code should use: composes the registry,
/// the dispatcher and session construction without adding state of its own.
pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    dispatcher: Dispatcher,
    stream: StreamConfig,
    max_in_flight: usize,
}

impl Gateway {
    pub fn new(config: &SwitchboardConfig) -> Self {
        let registry = Arc::new(ProviderRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone(), config.dispatch.clone());
        Self {
            registry,
            dispatcher,
            stream: config.stream.clone(),
            max_in_flight: config.dispatch.max_in_flight_per_provider,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Add a provider to the registry in `disconnected` state.
    pub async fn register_provider(
        &self,
        provider: Arc<dyn ToolProvider>,
    ) -> Result<(), RegistryError> {
        self.registry.register(provider, self.max_in_flight).await
    }

    /// The explicit connect handshake: `connecting`, install the provider's
    /// tool set, `connected`, heartbeat stamped. Also the reconnect path for
    /// a provider that dropped to `disconnected`.
    pub async fn connect_provider(&self, provider_id: &str) -> Result<(), RegistryError> {
        self.registry
            .set_status(provider_id, ProviderStatus::Connecting)
            .await?;
        let executor = self.registry.executor(provider_id).await?;
        let tools = executor.list_tools();
        let tool_count = tools.len();
        self.registry.install_tools(provider_id, tools).await?;
        self.registry
            .set_status(provider_id, ProviderStatus::Connected)
            .await?;
        self.registry.mark_heartbeat(provider_id, Utc::now()).await?;

        info!(provider = %provider_id, tools = tool_count, "Provider connected");
        Ok(())
    }

    /// Registry snapshot plus the derived connected count.
    pub async fn status(&self) -> GatewayStatus {
        let providers: Vec<ProviderStatusEntry> = self
            .registry
            .list_providers()
            .await
            .into_iter()
            .map(|conn| ProviderStatusEntry {
                id: conn.id,
                display_name: conn.display_name,
                status: conn.status,
                tool_count: conn.tools.len(),
            })
            .collect();
        let connected_count = providers
            .iter()
            .filter(|p| p.status == ProviderStatus::Connected)
            .count();
        GatewayStatus {
            providers,
            connected_count,
            timestamp: Utc::now(),
        }
    }

    /// Tool listing, optionally filtered to one provider.
    pub async fn tools(
        &self,
        provider_id: Option<&str>,
    ) -> Result<Vec<AnnotatedTool>, RegistryError> {
        self.registry.list_tools(provider_id).await
    }

    /// Dispatch one tool call.
    pub async fn call(&self, request: ToolCallRequest) -> ToolCallResult {
        self.dispatcher.dispatch(request).await
    }

    /// Convenience for programmatic callers: an absent params mapping
    /// defaults to empty. The only shape normalization the façade does.
    pub async fn call_tool(
        &self,
        provider_id: &str,
        tool_name: &str,
        params: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> ToolCallResult {
        self.call(ToolCallRequest {
            provider_id: provider_id.to_string(),
            tool_name: tool_name.to_string(),
            params: params.unwrap_or_default(),
        })
        .await
    }

    /// Open a streaming session carrying the current registry snapshot.
    pub async fn open_session(&self) -> StreamSession {
        let snapshot: Vec<ProviderSummary> = self
            .registry
            .list_providers()
            .await
            .into_iter()
            .map(|conn| ProviderSummary {
                id: conn.id,
                name: conn.display_name,
                status: conn.status,
                tool_count: conn.tools.len(),
            })
            .collect();
        StreamSession::open(snapshot, self.stream.heartbeat_interval())
    }
}

/// Build the gateway router.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .route("/api/tools", get(handlers::tools))
        .route("/api/call", post(handlers::call))
        .route("/api/stream", get(handlers::stream))
        .with_state(gateway)
}

/// Periodically refresh heartbeats of reachable providers and expire the
/// stale ones. Runs until the gateway process exits.
pub fn spawn_liveness_monitor(
    registry: Arc<ProviderRegistry>,
    config: LivenessConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.check_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let now = Utc::now();
            for conn in registry.list_providers().await {
                if conn.status != ProviderStatus::Connected {
                    continue;
                }
                match registry.executor(&conn.id).await {
                    Ok(executor) => match executor.ping().await {
                        Ok(()) => {
                            let _ = registry.mark_heartbeat(&conn.id, now).await;
                        }
                        Err(e) => {
                            warn!(provider = %conn.id, "Provider ping failed: {e}");
                        }
                    },
                    Err(_) => continue,
                }
            }

            for id in registry.expire_stale(now, config.heartbeat_timeout()).await {
                warn!(provider = %id, "Provider heartbeat timed out, marking disconnected");
            }
        }
    })
}

/// Start the gateway server.
///
/// Registers and connects the given providers, starts the liveness monitor,
/// binds the router and serves until shutdown.
pub async fn start_gateway(
    config: SwitchboardConfig,
    providers: Vec<Arc<dyn ToolProvider>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;

    let gateway = Arc::new(Gateway::new(&config));
    for provider in providers {
        let id = provider.id().to_string();
        gateway.register_provider(provider).await?;
        if let Err(e) = gateway.connect_provider(&id).await {
            warn!(provider = %id, "Initial connect failed, provider stays disconnected: {e}");
        }
    }

    let _monitor = spawn_liveness_monitor(gateway.registry().clone(), config.liveness.clone());

    let app = router(gateway);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Gateway listening on {addr}");
    info!("  Status:  http://{addr}/api/status");
    info!("  Tools:   http://{addr}/api/tools");
    info!("  Call:    http://{addr}/api/call");
    info!("  Stream:  http://{addr}/api/stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchboard_types::{ErrorKind, InputSchema, ProviderFailure, StreamEvent, ToolDescriptor};

    struct DemoProvider {
        id: String,
        display_name: String,
        calls: AtomicUsize,
    }

    impl DemoProvider {
        fn new(id: &str, display_name: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                display_name: display_name.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ToolProvider for DemoProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn display_name(&self) -> &str {
            &self.display_name
        }

        fn list_tools(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor::new(
                "get_metrics",
                "Aggregated metrics, no parameters",
                InputSchema::object(),
            )]
        }

        async fn execute(
            &self,
            _tool_name: &str,
            _params: Map<String, Value>,
        ) -> Result<Value, ProviderFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"revenue": {"total": 245000}}))
        }
    }

    /// Registry with `{db: connected, ai: disconnected}`.
    async fn mixed_gateway() -> (Arc<Gateway>, Arc<DemoProvider>, Arc<DemoProvider>) {
        let gateway = Arc::new(Gateway::new(&SwitchboardConfig::default()));
        let db = DemoProvider::new("db", "Database Provider");
        let ai = DemoProvider::new("ai", "Insight Provider");

        gateway.register_provider(db.clone()).await.unwrap();
        gateway.register_provider(ai.clone()).await.unwrap();
        gateway.connect_provider("db").await.unwrap();
        // ai stays registered but never handshakes

        (gateway, db, ai)
    }

    #[tokio::test]
    async fn test_call_on_disconnected_provider() {
        let (gateway, _db, ai) = mixed_gateway().await;

        let result = gateway.call_tool("ai", "anything", None).await;
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::ProviderUnavailable));
        assert_eq!(ai.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_call_with_empty_params_succeeds() {
        let (gateway, db, _ai) = mixed_gateway().await;

        let result = gateway.call_tool("db", "get_metrics", None).await;
        assert!(result.success);
        assert_eq!(result.payload.unwrap()["revenue"]["total"], 245000);
        assert_eq!(db.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_unknown_tool_on_connected_provider() {
        let (gateway, _db, _ai) = mixed_gateway().await;

        let result = gateway.call_tool("db", "does_not_exist", None).await;
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::ToolNotFound));
    }

    #[tokio::test]
    async fn test_status_counts_connected() {
        let (gateway, _db, _ai) = mixed_gateway().await;

        let status = gateway.status().await;
        assert_eq!(status.providers.len(), 2);
        assert_eq!(status.connected_count, 1);
    }

    #[tokio::test]
    async fn test_reconnect_restores_calls() {
        let (gateway, _db, ai) = mixed_gateway().await;

        gateway.connect_provider("ai").await.unwrap();
        let result = gateway.call_tool("ai", "get_metrics", None).await;
        assert!(result.success);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_snapshot_reflects_registry() {
        let (gateway, _db, _ai) = mixed_gateway().await;

        let mut session = gateway.open_session().await;
        let Some(StreamEvent::Connection { servers, .. }) = session.next_event().await else {
            panic!("expected connection event");
        };
        assert_eq!(servers.len(), 2);
        let db = servers.iter().find(|s| s.id == "db").unwrap();
        assert_eq!(db.status, ProviderStatus::Connected);
        assert_eq!(db.tool_count, 1);
        let ai = servers.iter().find(|s| s.id == "ai").unwrap();
        assert_eq!(ai.status, ProviderStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_close_leaves_calls_untouched() {
        let (gateway, _db, _ai) = mixed_gateway().await;

        let session = gateway.open_session().await;
        session.close();

        let result = gateway.call_tool("db", "get_metrics", None).await;
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_monitor_refreshes_heartbeats() {
        let (gateway, _db, _ai) = mixed_gateway().await;
        let registry = gateway.registry().clone();

        let before = registry.get_provider("db").await.unwrap().last_heartbeat;
        let _monitor = spawn_liveness_monitor(registry.clone(), LivenessConfig::default());

        tokio::time::sleep(std::time::Duration::from_secs(20)).await;

        let after = registry.get_provider("db").await.unwrap().last_heartbeat;
        assert!(after > before);
        assert_eq!(
            registry.get_provider("db").await.unwrap().status,
            ProviderStatus::Connected
        );
    }
}
