//! Demo capability providers for the switchboard gateway.
//!
//! Each provider implements [`ToolProvider`] over in-process mock data and
//! stands in for a real backend: a database query executor, an LLM client,
//! a workflow runner, an event-stream reader. Swapping one out for the real
//! thing never touches the gateway.

pub mod automation;
pub mod database;
pub mod events;
pub mod insight;

use std::sync::Arc;

use switchboard_gateway::ToolProvider;

pub use automation::AutomationProvider;
pub use database::DatabaseProvider;
pub use events::EventStreamProvider;
pub use insight::InsightProvider;

/// The full demo provider set, ready to register with a gateway.
pub fn demo_providers() -> Vec<Arc<dyn ToolProvider>> {
    vec![
        Arc::new(DatabaseProvider::new()),
        Arc::new(InsightProvider::new()),
        Arc::new(AutomationProvider::new()),
        Arc::new(EventStreamProvider::new()),
    ]
}
