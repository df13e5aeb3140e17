//! In-memory provider catalog: the single source of truth for which
//! providers exist, their live status, and their tool sets.
//!
//! Locking is per provider: the outer map lock is held only to find the
//! entry, so reads/writes to different providers never contend, while all
//! access to one provider's record is mutually exclusive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};

use switchboard_types::{ProviderStatus, ToolDescriptor};

use crate::provider::ToolProvider;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("provider not found: {0}")]
    NotFound(String),
    #[error("provider already registered: {0}")]
    AlreadyRegistered(String),
    #[error("illegal status transition for provider '{id}': {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ProviderStatus,
        to: ProviderStatus,
    },
    #[error("duplicate tool name '{name}' for provider '{id}'")]
    DuplicateTool { id: String, name: String },
}

/// Snapshot of one provider's connection record.
#[derive(Debug, Clone)]
pub struct ProviderConnection {
    pub id: String,
    pub display_name: String,
    pub status: ProviderStatus,
    pub tools: Vec<ToolDescriptor>,
    pub last_heartbeat: DateTime<Utc>,
}

/// A tool annotated with its owning provider id.
#[derive(Debug, Clone)]
pub struct AnnotatedTool {
    pub provider_id: String,
    pub descriptor: ToolDescriptor,
}

/// Everything the dispatcher needs for one call, captured in a single
/// registry read so the call path never holds a lock while executing.
pub struct DispatchHandle {
    pub status: ProviderStatus,
    /// Descriptor of the requested tool, if the provider has it.
    pub descriptor: Option<ToolDescriptor>,
    pub executor: Arc<dyn ToolProvider>,
    pub limiter: Arc<Semaphore>,
}

struct ProviderEntry {
    conn: ProviderConnection,
    executor: Arc<dyn ToolProvider>,
    limiter: Arc<Semaphore>,
}

/// Owns the set of [`ProviderConnection`] records. Providers are never
/// deleted while the gateway runs — a dead one sits in `disconnected`
/// until an explicit reconnect handshake.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<RwLock<ProviderEntry>>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Add a provider in `disconnected` state with an empty tool set.
    /// `max_in_flight` bounds concurrent calls dispatched to it.
    pub async fn register(
        &self,
        executor: Arc<dyn ToolProvider>,
        max_in_flight: usize,
    ) -> Result<(), RegistryError> {
        let id = executor.id().to_string();
        let mut providers = self.providers.write().await;
        if providers.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }

        let entry = ProviderEntry {
            conn: ProviderConnection {
                id: id.clone(),
                display_name: executor.display_name().to_string(),
                status: ProviderStatus::Disconnected,
                tools: Vec::new(),
                last_heartbeat: Utc::now(),
            },
            executor,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
        };
        providers.insert(id, Arc::new(RwLock::new(entry)));
        Ok(())
    }

    async fn entry(&self, provider_id: &str) -> Result<Arc<RwLock<ProviderEntry>>, RegistryError> {
        self.providers
            .read()
            .await
            .get(provider_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(provider_id.to_string()))
    }

    /// Snapshot of every provider record. No side effects.
    pub async fn list_providers(&self) -> Vec<ProviderConnection> {
        let entries: Vec<_> = self.providers.read().await.values().cloned().collect();
        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            result.push(entry.read().await.conn.clone());
        }
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Snapshot of one provider record.
    pub async fn get_provider(&self, provider_id: &str) -> Result<ProviderConnection, RegistryError> {
        let entry = self.entry(provider_id).await?;
        let conn = entry.read().await.conn.clone();
        Ok(conn)
    }

    /// Tools of one provider, or the flattened catalog across all of them.
    pub async fn list_tools(
        &self,
        provider_id: Option<&str>,
    ) -> Result<Vec<AnnotatedTool>, RegistryError> {
        match provider_id {
            Some(id) => {
                let conn = self.get_provider(id).await?;
                Ok(conn
                    .tools
                    .into_iter()
                    .map(|descriptor| AnnotatedTool {
                        provider_id: conn.id.clone(),
                        descriptor,
                    })
                    .collect())
            }
            None => {
                let mut result = Vec::new();
                for conn in self.list_providers().await {
                    result.extend(conn.tools.into_iter().map(|descriptor| AnnotatedTool {
                        provider_id: conn.id.clone(),
                        descriptor,
                    }));
                }
                Ok(result)
            }
        }
    }

    /// Refresh a provider's liveness timestamp. Never changes status: a
    /// heartbeat alone does not resurrect a disconnected provider — only
    /// the explicit reconnect handshake does.
    pub async fn mark_heartbeat(
        &self,
        provider_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let entry = self.entry(provider_id).await?;
        entry.write().await.conn.last_heartbeat = now;
        Ok(())
    }

    /// Explicit status transition, driven by connection-management logic.
    ///
    /// Exactly the state machine's edges are accepted; same-state sets are
    /// idempotent no-ops, anything else is an error.
    pub async fn set_status(
        &self,
        provider_id: &str,
        status: ProviderStatus,
    ) -> Result<(), RegistryError> {
        let entry = self.entry(provider_id).await?;
        let mut entry = entry.write().await;
        let from = entry.conn.status;
        if !transition_allowed(from, status) {
            return Err(RegistryError::InvalidTransition {
                id: provider_id.to_string(),
                from,
                to: status,
            });
        }
        entry.conn.status = status;
        Ok(())
    }

    /// Replace a provider's whole tool set during the connect handshake.
    /// Descriptors are immutable once installed; names must be unique
    /// within the provider.
    pub async fn install_tools(
        &self,
        provider_id: &str,
        tools: Vec<ToolDescriptor>,
    ) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(RegistryError::DuplicateTool {
                    id: provider_id.to_string(),
                    name: tool.name.clone(),
                });
            }
        }

        let entry = self.entry(provider_id).await?;
        entry.write().await.conn.tools = tools;
        Ok(())
    }

    /// The executor handle backing a provider.
    pub async fn executor(
        &self,
        provider_id: &str,
    ) -> Result<Arc<dyn ToolProvider>, RegistryError> {
        let entry = self.entry(provider_id).await?;
        let executor = entry.read().await.executor.clone();
        Ok(executor)
    }

    /// One-read capture of everything a call needs: status, the requested
    /// tool's descriptor, the executor and the in-flight limiter.
    pub async fn dispatch_handle(
        &self,
        provider_id: &str,
        tool_name: &str,
    ) -> Result<DispatchHandle, RegistryError> {
        let entry = self.entry(provider_id).await?;
        let entry = entry.read().await;
        Ok(DispatchHandle {
            status: entry.conn.status,
            descriptor: entry
                .conn
                .tools
                .iter()
                .find(|t| t.name == tool_name)
                .cloned(),
            executor: entry.executor.clone(),
            limiter: entry.limiter.clone(),
        })
    }

    /// Transition connected providers whose last heartbeat is older than
    /// `timeout` to `disconnected`. Returns the expired ids.
    pub async fn expire_stale(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<String> {
        let cutoff = now - chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero());
        let entries: Vec<_> = self.providers.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for entry in entries {
            let mut entry = entry.write().await;
            if entry.conn.status == ProviderStatus::Connected && entry.conn.last_heartbeat < cutoff
            {
                entry.conn.status = ProviderStatus::Disconnected;
                expired.push(entry.conn.id.clone());
            }
        }
        expired
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn transition_allowed(from: ProviderStatus, to: ProviderStatus) -> bool {
    use ProviderStatus::*;
    from == to
        || matches!(
            (from, to),
            (Disconnected, Connecting) | (Connecting, Connected) | (Connected, Disconnected)
        )
}
