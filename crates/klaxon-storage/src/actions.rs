//! Action dispatch. The engine hands fired actions to [`ActionsService`],
//! which delivers each one to every registered plugin listener as soon as it
//! arrives. A failing listener is logged and skipped; it never blocks the
//! others or the caller.

use async_trait::async_trait;
use klaxon_common::action::Action;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Result, StorageError};

/// Plugin-side sink for fired actions.
#[async_trait]
pub trait ActionListener: Send + Sync {
    /// Name used in dispatch logs.
    fn name(&self) -> &str;

    async fn process(&self, action: &Action) -> anyhow::Result<()>;
}

/// Fans fired actions out to the registered listeners.
#[derive(Default)]
pub struct ActionsService {
    listeners: RwLock<Vec<Arc<dyn ActionListener>>>,
}

impl ActionsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_listener(&self, listener: Arc<dyn ActionListener>) {
        tracing::info!(listener = listener.name(), "Action listener registered");
        self.listeners.write().await.push(listener);
    }

    /// Delivers one action to every listener.
    pub async fn send(&self, action: Action) -> Result<()> {
        if action.tenant_id.is_empty() || action.action_plugin.is_empty() || action.action_id.is_empty() {
            return Err(StorageError::Validation(
                "action tenantId, plugin and actionId must not be empty".to_string(),
            ));
        }

        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            if let Err(e) = listener.process(&action).await {
                tracing::error!(
                    listener = listener.name(),
                    action_id = %action.action_id,
                    error = %e,
                    "Failed to process action"
                );
            }
        }
        Ok(())
    }
}
