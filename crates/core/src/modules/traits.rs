use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::output::network_config::NetworkConfig;
use crate::show::show::CuelistId;

/// Unique identifier for each module type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Output,
}

/// Key/value status a module keeps up to date while it runs.
///
/// Shared so the console can still read it after the module moved into its task.
pub type ModuleStatus = Arc<RwLock<HashMap<String, String>>>;

/// Events the console sends to a running module
#[derive(Debug, Clone)]
pub enum ModuleEvent {
    /// Jump a cuelist's running fade to its end
    SkipFade(CuelistId),
    /// sACN priority for every universe (0-200)
    SetPriority(u8),
    /// Replace the interface setup
    SetNetworkConfig(NetworkConfig),
    /// Render ticks per second; out of range rates are ignored
    SetTickRate(f64),
    Shutdown,
}

/// Messages modules report back to the console
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleMessage {
    Status(String),
    Error(String),
}

/// Trait that all async modules must implement
#[async_trait]
pub trait AsyncModule: Send + Sync {
    /// Get the unique identifier for this module
    fn id(&self) -> ModuleId;

    /// Initialize the module (called once at startup)
    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Start the module's main loop
    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Shutdown the module gracefully
    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Handle to the module's status map
    fn status(&self) -> ModuleStatus;
}
