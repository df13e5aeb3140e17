//! Tool dispatch: turns a [`ToolCallRequest`] into a [`ToolCallResult`].
//!
//! Every failure mode resolves to a normal failure envelope — nothing
//! escapes the dispatcher, and every call returns within the configured
//! timeout bound. No retries happen here; retrying is a caller concern so
//! non-idempotent tools stay side-effect-safe.

use std::sync::Arc;

use tracing::{error, warn};

use switchboard_config::DispatchConfig;
use switchboard_types::{ErrorKind, ProviderStatus, ToolCallRequest, ToolCallResult};

use crate::registry::{ProviderRegistry, RegistryError};

pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    /// Dispatch one call: look up the provider, gate on its status, validate
    /// parameters against the tool's schema, then execute under the
    /// per-provider concurrency cap and the call timeout.
    pub async fn dispatch(&self, request: ToolCallRequest) -> ToolCallResult {
        let ToolCallRequest {
            provider_id,
            tool_name,
            params,
        } = request;

        let handle = match self.registry.dispatch_handle(&provider_id, &tool_name).await {
            Ok(handle) => handle,
            Err(RegistryError::NotFound(_)) => {
                return ToolCallResult::fail(
                    &provider_id,
                    &tool_name,
                    ErrorKind::ProviderNotFound,
                    format!("provider '{provider_id}' not found"),
                );
            }
            Err(e) => {
                error!(provider = %provider_id, tool = %tool_name, "Registry lookup failed: {e}");
                return ToolCallResult::fail(
                    &provider_id,
                    &tool_name,
                    ErrorKind::Internal,
                    e.to_string(),
                );
            }
        };

        // Fail fast on anything not connected; the caller retries after a
        // reconnect if it wants to.
        if handle.status != ProviderStatus::Connected {
            return ToolCallResult::fail(
                &provider_id,
                &tool_name,
                ErrorKind::ProviderUnavailable,
                format!("provider '{provider_id}' is {}", handle.status),
            );
        }

        let Some(descriptor) = handle.descriptor else {
            return ToolCallResult::fail(
                &provider_id,
                &tool_name,
                ErrorKind::ToolNotFound,
                format!("provider '{provider_id}' has no tool '{tool_name}'"),
            );
        };

        if let Err(violation) = descriptor.input_schema.validate(&params) {
            return ToolCallResult::fail(
                &provider_id,
                &tool_name,
                ErrorKind::InvalidParams,
                violation.to_string(),
            );
        }

        let permit = match handle.limiter.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                return ToolCallResult::fail(
                    &provider_id,
                    &tool_name,
                    ErrorKind::ProviderBusy,
                    format!("provider '{provider_id}' is at its in-flight call limit"),
                );
            }
        };

        // The permit travels into the task: a timed-out call that is still
        // running at the provider keeps counting against its cap until the
        // provider actually finishes.
        let executor = handle.executor;
        let task_tool = tool_name.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            executor.execute(&task_tool, params).await
        });

        match tokio::time::timeout(self.config.call_timeout(), task).await {
            // Timeout: the join handle is dropped, not aborted — the
            // in-flight call is abandoned locally, never cancelled at the
            // provider.
            Err(_) => {
                warn!(
                    provider = %provider_id,
                    tool = %tool_name,
                    timeout_ms = self.config.call_timeout_ms,
                    "Tool call timed out"
                );
                ToolCallResult::fail(
                    &provider_id,
                    &tool_name,
                    ErrorKind::Timeout,
                    format!(
                        "call to '{tool_name}' exceeded {} ms",
                        self.config.call_timeout_ms
                    ),
                )
            }
            Ok(Err(join_err)) => {
                error!(
                    provider = %provider_id,
                    tool = %tool_name,
                    "Provider task failed: {join_err}"
                );
                ToolCallResult::fail(
                    &provider_id,
                    &tool_name,
                    ErrorKind::Internal,
                    "provider task failed unexpectedly",
                )
            }
            Ok(Ok(Err(failure))) => {
                warn!(
                    provider = %provider_id,
                    tool = %tool_name,
                    "Provider reported failure: {failure}"
                );
                ToolCallResult::fail(
                    &provider_id,
                    &tool_name,
                    ErrorKind::ProviderError,
                    failure.message,
                )
            }
            Ok(Ok(Ok(payload))) => ToolCallResult::ok(provider_id, tool_name, payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use switchboard_types::{FieldSpec, InputSchema, ProviderFailure, ToolDescriptor};
    use tokio::sync::Notify;

    use crate::provider::ToolProvider;

    /// Scriptable provider: counts invocations, optionally delays or fails.
    struct SpyProvider {
        id: String,
        calls: AtomicUsize,
        delay: Option<Duration>,
        failure: Option<String>,
        started: Notify,
    }

    impl SpyProvider {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                calls: AtomicUsize::new(0),
                delay: None,
                failure: None,
                started: Notify::new(),
            })
        }

        fn slow(id: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                calls: AtomicUsize::new(0),
                delay: Some(delay),
                failure: None,
                started: Notify::new(),
            })
        }

        fn failing(id: &str, message: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                calls: AtomicUsize::new(0),
                delay: None,
                failure: Some(message.to_string()),
                started: Notify::new(),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolProvider for SpyProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn display_name(&self) -> &str {
            "Spy"
        }

        fn list_tools(&self) -> Vec<ToolDescriptor> {
            vec![
                ToolDescriptor::new("get_metrics", "Metrics with no params", InputSchema::object()),
                ToolDescriptor::new(
                    "generate_insight",
                    "Insight requiring a query",
                    InputSchema::object()
                        .field("query", FieldSpec::string())
                        .require("query"),
                ),
            ]
        }

        async fn execute(
            &self,
            tool_name: &str,
            _params: Map<String, Value>,
        ) -> Result<Value, ProviderFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.failure {
                return Err(ProviderFailure::new(message.clone()));
            }
            Ok(json!({"tool": tool_name}))
        }
    }

    async fn dispatcher_with(
        provider: Arc<SpyProvider>,
        connected: bool,
        config: DispatchConfig,
    ) -> Dispatcher {
        let registry = Arc::new(ProviderRegistry::new());
        let id = provider.id().to_string();
        registry
            .register(provider.clone(), config.max_in_flight_per_provider)
            .await
            .unwrap();
        registry
            .set_status(&id, ProviderStatus::Connecting)
            .await
            .unwrap();
        registry
            .install_tools(&id, provider.list_tools())
            .await
            .unwrap();
        if connected {
            registry
                .set_status(&id, ProviderStatus::Connected)
                .await
                .unwrap();
        } else {
            registry
                .set_status(&id, ProviderStatus::Connected)
                .await
                .unwrap();
            registry
                .set_status(&id, ProviderStatus::Disconnected)
                .await
                .unwrap();
        }
        Dispatcher::new(registry, config)
    }

    fn request(provider: &str, tool: &str, params: Value) -> ToolCallRequest {
        ToolCallRequest {
            provider_id: provider.to_string(),
            tool_name: tool.to_string(),
            params: params.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let registry = Arc::new(ProviderRegistry::new());
        let dispatcher = Dispatcher::new(registry, DispatchConfig::default());

        let result = dispatcher.dispatch(request("ghost", "anything", json!({}))).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::ProviderNotFound));
        assert_eq!(result.provider_id, "ghost");
    }

    #[tokio::test]
    async fn test_disconnected_provider_never_invoked() {
        let provider = SpyProvider::new("ai");
        let dispatcher = dispatcher_with(provider.clone(), false, DispatchConfig::default()).await;

        let result = dispatcher
            .dispatch(request("ai", "get_metrics", json!({})))
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::ProviderUnavailable));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let provider = SpyProvider::new("db");
        let dispatcher = dispatcher_with(provider, true, DispatchConfig::default()).await;

        let result = dispatcher
            .dispatch(request("db", "drop_everything", json!({})))
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::ToolNotFound));
    }

    #[tokio::test]
    async fn test_missing_required_param_never_invoked() {
        let provider = SpyProvider::new("ai");
        let dispatcher = dispatcher_with(provider.clone(), true, DispatchConfig::default()).await;

        let result = dispatcher
            .dispatch(request("ai", "generate_insight", json!({})))
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidParams));
        let message = result.error.unwrap().message;
        assert!(message.contains("query"), "message should name the field: {message}");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_call() {
        let provider = SpyProvider::new("db");
        let dispatcher = dispatcher_with(provider.clone(), true, DispatchConfig::default()).await;

        let result = dispatcher
            .dispatch(request("db", "get_metrics", json!({})))
            .await;
        assert!(result.success);
        assert_eq!(result.payload.unwrap()["tool"], "get_metrics");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_wrapped() {
        let provider = SpyProvider::failing("db", "connection pool exhausted");
        let dispatcher = dispatcher_with(provider, true, DispatchConfig::default()).await;

        let result = dispatcher
            .dispatch(request("db", "get_metrics", json!({})))
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::ProviderError));
        assert_eq!(result.error.unwrap().message, "connection pool exhausted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_latency() {
        let provider = SpyProvider::slow("db", Duration::from_secs(3600));
        let config = DispatchConfig {
            call_timeout_ms: 200,
            ..Default::default()
        };
        let dispatcher = dispatcher_with(provider, true, config).await;

        let before = tokio::time::Instant::now();
        let result = dispatcher
            .dispatch(request("db", "get_metrics", json!({})))
            .await;
        let elapsed = before.elapsed();

        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(400), "resolved at {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_when_at_in_flight_cap() {
        let provider = SpyProvider::slow("db", Duration::from_secs(60));
        let config = DispatchConfig {
            call_timeout_ms: 120_000,
            max_in_flight_per_provider: 1,
        };
        let dispatcher = Arc::new(dispatcher_with(provider.clone(), true, config).await);

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(request("db", "get_metrics", json!({})))
                    .await
            })
        };
        provider.started.notified().await;

        let second = dispatcher
            .dispatch(request("db", "get_metrics", json!({})))
            .await;
        assert_eq!(second.error_kind(), Some(ErrorKind::ProviderBusy));

        let first = first.await.unwrap();
        assert!(first.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_does_not_block_fast_one() {
        let slow = SpyProvider::slow("slow", Duration::from_secs(1));
        let fast = SpyProvider::new("fast");

        let registry = Arc::new(ProviderRegistry::new());
        for provider in [slow.clone(), fast.clone()] {
            let id = provider.id().to_string();
            registry.register(provider.clone(), 4).await.unwrap();
            registry
                .set_status(&id, ProviderStatus::Connecting)
                .await
                .unwrap();
            registry
                .install_tools(&id, provider.list_tools())
                .await
                .unwrap();
            registry
                .set_status(&id, ProviderStatus::Connected)
                .await
                .unwrap();
        }
        let dispatcher = Arc::new(Dispatcher::new(registry, DispatchConfig::default()));

        let slow_call = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(request("slow", "get_metrics", json!({})))
                    .await
            })
        };
        slow.started.notified().await;

        let before = tokio::time::Instant::now();
        let fast_result = dispatcher
            .dispatch(request("fast", "get_metrics", json!({})))
            .await;
        assert!(fast_result.success);
        assert!(
            before.elapsed() < Duration::from_millis(500),
            "fast provider waited on slow one"
        );

        let slow_result = slow_call.await.unwrap();
        assert!(slow_result.success);
    }
}
