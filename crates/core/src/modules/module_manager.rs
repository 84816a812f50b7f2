use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage, ModuleStatus};

const EVENT_QUEUE: usize = 64;
const MESSAGE_QUEUE: usize = 256;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {0:?} failed to initialize: {1}")]
    Initialize(ModuleId, String),
    #[error("modules are already running")]
    AlreadyRunning,
    #[error("module {0:?} is not running")]
    NotRunning(ModuleId),
}

struct RunningModule {
    events: mpsc::Sender<ModuleEvent>,
    task: JoinHandle<()>,
}

/// Runs each registered module on its own task and routes console events to it.
///
/// Modules report back over one shared message channel. Their status maps stay readable here
/// for the whole lifetime of the manager, before and after `start`.
pub struct ModuleManager {
    registered: Vec<Box<dyn AsyncModule>>,
    running: HashMap<ModuleId, RunningModule>,
    statuses: HashMap<ModuleId, ModuleStatus>,
    message_tx: mpsc::Sender<ModuleMessage>,
    message_rx: Option<mpsc::Receiver<ModuleMessage>>,
}

impl ModuleManager {
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(MESSAGE_QUEUE);
        Self {
            registered: Vec::new(),
            running: HashMap::new(),
            statuses: HashMap::new(),
            message_tx,
            message_rx: Some(message_rx),
        }
    }

    pub fn register_module(&mut self, module: Box<dyn AsyncModule>) {
        self.statuses.insert(module.id(), module.status());
        self.registered.push(module);
    }

    /// Initialize every module that has not been started yet, stopping at the first failure.
    pub async fn initialize(&mut self) -> Result<(), ModuleError> {
        for module in &mut self.registered {
            let id = module.id();
            module.initialize().await.map_err(|e| {
                log::error!("Failed to initialize module {:?}: {}", id, e);
                ModuleError::Initialize(id, e.to_string())
            })?;
            log::info!("Module {:?} initialized", id);
        }
        Ok(())
    }

    /// Move every registered module onto its own task.
    pub fn start(&mut self) -> Result<(), ModuleError> {
        if !self.running.is_empty() {
            return Err(ModuleError::AlreadyRunning);
        }

        for mut module in self.registered.drain(..) {
            let id = module.id();
            let (events, event_rx) = mpsc::channel(EVENT_QUEUE);
            let message_tx = self.message_tx.clone();

            let task = tokio::spawn(async move {
                if let Err(e) = module.run(event_rx, message_tx.clone()).await {
                    log::error!("Module {:?} stopped: {}", id, e);
                    let _ = message_tx
                        .send(ModuleMessage::Error(format!("Module {:?} stopped: {}", id, e)))
                        .await;
                }
                if let Err(e) = module.shutdown().await {
                    log::error!("Module {:?} shutdown error: {}", id, e);
                }
            });

            self.running.insert(id, RunningModule { events, task });
        }
        Ok(())
    }

    pub async fn send(&self, module: ModuleId, event: ModuleEvent) -> Result<(), ModuleError> {
        let running = self
            .running
            .get(&module)
            .ok_or(ModuleError::NotRunning(module))?;
        running
            .events
            .send(event)
            .await
            .map_err(|_| ModuleError::NotRunning(module))
    }

    /// Only the first call returns the receiver.
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<ModuleMessage>> {
        self.message_rx.take()
    }

    /// Ask every running module to stop and wait for its task to finish.
    pub async fn shutdown(&mut self) {
        for (id, running) in self.running.drain() {
            if running.events.send(ModuleEvent::Shutdown).await.is_err() {
                log::debug!("Module {:?} already stopped", id);
            }
            if let Err(e) = running.task.await {
                log::error!("Module {:?} task failed: {}", id, e);
            }
        }
        log::info!("All modules stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_empty()
    }

    /// Current status of one module.
    pub fn status(&self, module: ModuleId) -> Option<HashMap<String, String>> {
        self.statuses.get(&module).map(|status| status.read().clone())
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}
