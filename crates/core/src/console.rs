use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use prism_fixtures::{FixtureId, ModelId};
use tokio::sync::{mpsc, watch};

use crate::config::ConfigManager;
use crate::cue::cue::{Cuelist, PlaybackError};
use crate::messages::{ConsoleCommand, ConsoleEvent, Settings};
use crate::modules::{ModuleEvent, ModuleId, ModuleManager, ModuleMessage, OutputModule};
use crate::output::mapper::PreviewRecord;
use crate::output::network_config::{NetworkConfig, OutputInterface};
use crate::show::show::{CueId, CuelistId, Show};
use crate::show::show_manager::ShowManager;
use crate::show::SharedShow;

pub struct LightingConsole {
    // Core components
    show: SharedShow,
    show_manager: ShowManager,

    // Async module system
    module_manager: ModuleManager,
    message_rx: Option<mpsc::Receiver<ModuleMessage>>,
    preview_rx: watch::Receiver<Vec<PreviewRecord>>,

    // Settings
    settings: Settings,
    network_config: NetworkConfig,

    // System state
    is_running: bool,
}

impl LightingConsole {
    pub fn new(settings: Settings) -> Result<Self, anyhow::Error> {
        let network_config = ConfigManager::network_config(&settings)?;
        Self::with_show(Show::new("Untitled Show"), settings, network_config)
    }

    pub fn with_show(
        show: Show,
        settings: Settings,
        network_config: NetworkConfig,
    ) -> Result<Self, anyhow::Error> {
        let show = Arc::new(RwLock::new(show));

        let output = OutputModule::new(show.clone(), network_config.clone(), settings.tick_rate_hz)
            .with_source_name(&settings.sacn_source_name)
            .with_priority(settings.sacn_priority);
        let preview_rx = output.preview_receiver();

        let mut module_manager = ModuleManager::new();
        module_manager.register_module(Box::new(output));

        Ok(Self {
            show,
            show_manager: ShowManager::from_current_dir()?,
            module_manager,
            message_rx: None,
            preview_rx,
            settings,
            network_config,
            is_running: false,
        })
    }

    /// Initialize the console and start the output module
    pub async fn initialize(&mut self) -> Result<(), anyhow::Error> {
        log::info!("Initializing lighting console...");

        // Initialize all modules
        self.module_manager
            .initialize()
            .await
            .map_err(|e| anyhow::anyhow!("Module initialization failed: {}", e))?;

        // Start all modules
        self.module_manager
            .start()
            .map_err(|e| anyhow::anyhow!("Module start failed: {}", e))?;

        // Store message receiver for main loop processing
        if let Some(message_rx) = self.module_manager.take_message_receiver() {
            self.message_rx = Some(message_rx);
        }

        self.is_running = true;
        log::info!("Lighting console initialized successfully");
        Ok(())
    }

    /// Shutdown the console
    pub async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if !self.is_running {
            return Ok(());
        }

        log::info!("Shutting down lighting console...");

        self.module_manager.shutdown().await;

        self.is_running = false;
        log::info!("Lighting console shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn show(&self) -> SharedShow {
        self.show.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.network_config
    }

    /// Resolved state of every fixture as of the last tick
    pub fn preview(&self) -> Vec<PreviewRecord> {
        self.preview_rx.borrow().clone()
    }

    pub fn preview_receiver(&self) -> watch::Receiver<Vec<PreviewRecord>> {
        self.preview_rx.clone()
    }

    /// Output counters and settings as last reported by the output module
    pub fn output_status(&self) -> HashMap<String, String> {
        self.module_manager
            .status(ModuleId::Output)
            .unwrap_or_default()
    }

    fn playback<F>(&self, cuelist: CuelistId, action: &str, op: F) -> Result<ConsoleEvent, anyhow::Error>
    where
        F: FnOnce(&mut Cuelist) -> Result<(), PlaybackError>,
    {
        let mut show = self.show.write();
        let list = show.cuelist_mut(cuelist)?;
        op(&mut *list).map_err(|e| anyhow::anyhow!("Cuelist {} {}: {}", cuelist, action, e))?;

        log::info!(
            "Cuelist {} {} -> cue {}",
            cuelist,
            action,
            list.current_cue
                .map_or_else(|| "released".to_string(), |cue| cue.to_string())
        );
        Ok(ConsoleEvent::CueChanged {
            cuelist,
            cue: list.current_cue,
        })
    }

    pub fn go(&self, cuelist: CuelistId) -> Result<ConsoleEvent, anyhow::Error> {
        self.playback(cuelist, "go", |list| list.go().map(|_| ()))
    }

    pub fn back(&self, cuelist: CuelistId) -> Result<ConsoleEvent, anyhow::Error> {
        self.playback(cuelist, "back", |list| list.back().map(|_| ()))
    }

    pub fn go_to(&self, cuelist: CuelistId, cue: CueId) -> Result<ConsoleEvent, anyhow::Error> {
        self.playback(cuelist, "go to", |list| list.go_to(cue).map(|_| ()))
    }

    pub fn release(&self, cuelist: CuelistId) -> Result<ConsoleEvent, anyhow::Error> {
        self.playback(cuelist, "release", |list| list.release())
    }

    pub async fn skip_fade(&self, cuelist: CuelistId) -> Result<ConsoleEvent, anyhow::Error> {
        self.show.read().cuelist(cuelist)?;
        self.send_to_output(ModuleEvent::SkipFade(cuelist)).await?;
        Ok(ConsoleEvent::FadeSkipped { cuelist })
    }

    pub async fn set_sacn_priority(&mut self, priority: u8) -> Result<ConsoleEvent, anyhow::Error> {
        let priority = priority.min(crate::output::sacn::MAX_PRIORITY);
        self.send_to_output(ModuleEvent::SetPriority(priority)).await?;
        self.settings.sacn_priority = priority;
        Ok(ConsoleEvent::SacnPriorityChanged { priority })
    }

    pub async fn set_tick_rate(&mut self, rate: f64) -> Result<ConsoleEvent, anyhow::Error> {
        if !ConfigManager::tick_rate_in_range(rate) {
            anyhow::bail!("Tick rate {} is outside 1-120Hz", rate);
        }
        self.send_to_output(ModuleEvent::SetTickRate(rate)).await?;
        self.settings.tick_rate_hz = rate;
        Ok(ConsoleEvent::TickRateChanged { rate })
    }

    /// Send unrouted universes out of `interface`, or stop sending them with `None`.
    pub async fn select_interface(
        &mut self,
        interface: Option<Ipv4Addr>,
    ) -> Result<ConsoleEvent, anyhow::Error> {
        let mut network_config = self.network_config.clone();
        match interface {
            Some(address) => {
                let idx = match network_config
                    .interfaces
                    .iter()
                    .position(|i| i.address == address)
                {
                    Some(idx) => idx,
                    None => network_config
                        .add_interface(OutputInterface::new(&address.to_string(), address)),
                };
                network_config.set_default_interface(Some(idx));
            }
            None => network_config.set_default_interface(None),
        }

        self.send_to_output(ModuleEvent::SetNetworkConfig(network_config.clone()))
            .await?;
        self.settings.sacn_interface = interface.map(|address| address.to_string());
        let description = network_config.describe();
        self.network_config = network_config;
        Ok(ConsoleEvent::OutputConfigured { description })
    }

    pub fn patch_fixture(
        &self,
        fixture: FixtureId,
        universe: u16,
        address: u16,
    ) -> Result<ConsoleEvent, anyhow::Error> {
        self.show.write().patch_fixture(fixture, universe, address)?;
        log::info!("Patched fixture {} at {}.{}", fixture, universe, address);
        Ok(ConsoleEvent::FixturePatched { fixture })
    }

    pub fn set_model_channels(
        &self,
        model: ModelId,
        channels: &str,
    ) -> Result<ConsoleEvent, anyhow::Error> {
        self.show.write().set_model_channels(model, channels)?;
        Ok(ConsoleEvent::ModelUpdated { model })
    }

    pub fn load_show(&mut self, path: &Path) -> Result<String, anyhow::Error> {
        let show = self.show_manager.load_show(path)?;
        let name = show.name.clone();
        *self.show.write() = show;
        self.settings.show_file = Some(path.to_path_buf());
        Ok(name)
    }

    pub fn save_show(&mut self) -> Result<PathBuf, anyhow::Error> {
        let show = self.show.read().clone();
        self.show_manager.save_show(&show)
    }

    async fn send_to_output(&self, event: ModuleEvent) -> Result<(), anyhow::Error> {
        self.module_manager.send(ModuleId::Output, event).await?;
        Ok(())
    }

    pub async fn process_command(
        &mut self,
        command: ConsoleCommand,
    ) -> Result<ConsoleEvent, anyhow::Error> {
        use ConsoleCommand::*;

        log::debug!("Processing command: {:?}", command);

        match command {
            Initialize => {
                self.initialize().await?;
                Ok(ConsoleEvent::Initialized)
            }
            Shutdown => {
                self.shutdown().await?;
                Ok(ConsoleEvent::ShutdownComplete)
            }

            // Show management
            LoadShow { path } => {
                let name = self.load_show(&path)?;
                Ok(ConsoleEvent::ShowLoaded { name })
            }
            SaveShow => {
                let path = self.save_show()?;
                Ok(ConsoleEvent::ShowSaved { path })
            }

            // Patch
            PatchFixture {
                fixture,
                universe,
                address,
            } => self.patch_fixture(fixture, universe, address),
            SetModelChannels { model, channels } => self.set_model_channels(model, &channels),

            // Playback
            Go { cuelist } => self.go(cuelist),
            Back { cuelist } => self.back(cuelist),
            GoToCue { cuelist, cue } => self.go_to(cuelist, cue),
            Release { cuelist } => self.release(cuelist),
            SkipFade { cuelist } => self.skip_fade(cuelist).await,

            // Output
            SetSacnPriority { priority } => self.set_sacn_priority(priority).await,
            SelectInterface { interface } => self.select_interface(interface).await,
            SetTickRate { rate } => self.set_tick_rate(rate).await,
        }
    }

    /// Drain pending module messages. Errors come back as events, status lines are logged.
    pub fn process_messages(&mut self) -> Vec<ConsoleEvent> {
        let mut events = Vec::new();

        let Some(rx) = self.message_rx.as_mut() else {
            return events;
        };

        while let Ok(message) = rx.try_recv() {
            if let Some(event) = Self::module_message(message) {
                events.push(event);
            }
        }
        events
    }

    fn module_message(message: ModuleMessage) -> Option<ConsoleEvent> {
        match message {
            ModuleMessage::Status(status) => {
                log::info!("Module status: {}", status);
                None
            }
            ModuleMessage::Error(error) => {
                log::error!("Module error: {}", error);
                Some(ConsoleEvent::Error { message: error })
            }
        }
    }

    pub async fn run_with_channels(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<ConsoleCommand>,
        event_tx: mpsc::UnboundedSender<ConsoleEvent>,
    ) -> Result<(), anyhow::Error> {
        log::info!("Console run_with_channels starting...");

        if !self.is_running {
            self.initialize().await?;
            let _ = event_tx.send(ConsoleEvent::Initialized);
        }

        loop {
            tokio::select! {
                // Process commands
                command = command_rx.recv() => {
                    let Some(command) = command else {
                        log::info!("Command channel closed");
                        self.shutdown().await?;
                        break;
                    };

                    if let ConsoleCommand::Shutdown = command {
                        log::info!("Received shutdown command");
                        self.shutdown().await?;
                        let _ = event_tx.send(ConsoleEvent::ShutdownComplete);
                        break;
                    }

                    match self.process_command(command).await {
                        Ok(event) => {
                            let _ = event_tx.send(event);
                        }
                        Err(e) => {
                            log::error!("Command processing error: {}", e);
                            let _ = event_tx.send(ConsoleEvent::Error {
                                message: format!("Command processing error: {}", e)
                            });
                        }
                    }
                }

                // Process module messages (if available)
                Some(message) = async {
                    if let Some(rx) = self.message_rx.as_mut() {
                        rx.recv().await
                    } else {
                        // Return a future that never resolves if no receiver
                        std::future::pending().await
                    }
                } => {
                    if let Some(event) = Self::module_message(message) {
                        let _ = event_tx.send(event);
                    }
                }
            }
        }

        log::info!("Console run_with_channels completed");
        Ok(())
    }
}
