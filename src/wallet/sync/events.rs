//! Event system for wallet synchronization.
//!
//! The sync pipeline emits an event at each stage: start, encryption, address preparation,
//! remote save, commit, and failure. Registered handlers observe them for logging, metrics or
//! UI progress without the pipeline knowing about any of those concerns.

use crate::wallet::WalletSyncError;
use tracing::{error, info, warn};

/// Events that occur during wallet synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync was started for the given wrapper
    SyncStarted { guid: String, version: u32 },
    /// The body was encoded, encrypted, verified and checksummed
    PayloadEncrypted { checksum: String, length: usize },
    /// Lookahead addresses were prepared (`count` may be zero on best-effort failure)
    AddressesPrepared { count: usize },
    /// The backend acknowledged the save
    PayloadSaved { checksum: String },
    /// Local state now reflects the saved payload
    SyncCompleted { guid: String, checksum: String },
    /// The sync failed; local state was not modified
    SyncFailed { guid: String, error: String },
}

/// Trait for handling sync events.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    async fn handle(&self, event: &SyncEvent) -> Result<(), WalletSyncError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order. A failing handler is logged and skipped; it
/// never aborts the sync.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a new event handler.
    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.handlers.push(handler);
    }

    /// Dispatch an event to all registered handlers.
    pub async fn dispatch(&self, event: &SyncEvent) {
        for handler in &self.handlers {
            if let Err(e) = handler.handle(event).await {
                error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }
}

/// Logs every sync event through `tracing`.
pub struct TracingEventHandler;

#[async_trait::async_trait]
impl SyncEventHandler for TracingEventHandler {
    async fn handle(&self, event: &SyncEvent) -> Result<(), WalletSyncError> {
        match event {
            SyncEvent::SyncStarted { guid, version } => {
                info!("Sync started for {} at version {}", guid, version)
            }
            SyncEvent::PayloadEncrypted { checksum, length } => {
                info!("Payload encrypted ({} bytes, checksum {})", length, checksum)
            }
            SyncEvent::AddressesPrepared { count } => {
                info!("Prepared {} sync pub key addresses", count)
            }
            SyncEvent::PayloadSaved { checksum } => {
                info!("Backend accepted payload {}", checksum)
            }
            SyncEvent::SyncCompleted { guid, checksum } => {
                info!("Sync completed for {} with checksum {}", guid, checksum)
            }
            SyncEvent::SyncFailed { guid, error } => {
                warn!("Sync failed for {}: {}", guid, error)
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TracingEventHandler"
    }
}
