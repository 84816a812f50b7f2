use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, Instant, Interval, MissedTickBehavior};

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage, ModuleStatus};
use crate::config::ConfigManager;
use crate::output::mapper::PreviewRecord;
use crate::output::network_config::NetworkConfig;
use crate::output::sacn::{SacnSender, DEFAULT_PRIORITY};
use crate::render::engine::RenderEngine;
use crate::show::SharedShow;

fn tick_interval(tick_rate: f64) -> Interval {
    let mut ticker = interval(Duration::from_secs_f64(1.0 / tick_rate));
    // A late tick is dropped rather than run twice back to back
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Renders the show every tick and sends the result over sACN.
pub struct OutputModule {
    show: SharedShow,
    engine: RenderEngine,
    sender: Option<SacnSender>,
    network_config: NetworkConfig,
    source_name: String,
    priority: u8,
    preview_tx: watch::Sender<Vec<PreviewRecord>>,
    frames_sent: u64,
    packets_sent: u64,
    status: ModuleStatus,
}

impl OutputModule {
    pub fn new(show: SharedShow, network_config: NetworkConfig, tick_rate: f64) -> Self {
        let (preview_tx, _) = watch::channel(Vec::new());
        Self {
            show,
            engine: RenderEngine::new(tick_rate),
            sender: None,
            network_config,
            source_name: "Prism".to_string(),
            priority: DEFAULT_PRIORITY,
            preview_tx,
            frames_sent: 0,
            packets_sent: 0,
            status: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn set_status(&self, key: &str, value: String) {
        self.status.write().insert(key.to_string(), value);
    }

    pub fn with_source_name(mut self, source_name: &str) -> Self {
        self.source_name = source_name.to_string();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Latest preview records, updated every tick. This is the only place previews are published.
    pub fn preview_receiver(&self) -> watch::Receiver<Vec<PreviewRecord>> {
        self.preview_tx.subscribe()
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Render one frame from the shared show and send it.
    ///
    /// The show's read lock is held while rendering only; encoding and sending work on the
    /// frame's own buffers.
    pub fn tick(&mut self) -> Vec<PreviewRecord> {
        let frame = {
            let show = self.show.read();
            self.engine.render(&show)
        };

        if let Some(sender) = self.sender.as_mut() {
            self.packets_sent += sender.send(&frame.universes) as u64;
        }
        self.frames_sent += 1;

        self.preview_tx.send_replace(frame.preview.clone());
        frame.preview
    }

    fn handle_event(&mut self, event: ModuleEvent) {
        match event {
            ModuleEvent::SkipFade(cuelist) => {
                log::debug!("Skipping fade of cuelist {}", cuelist);
                self.engine.skip_fade(cuelist);
            }
            ModuleEvent::SetPriority(priority) => {
                self.priority = priority;
                if let Some(sender) = self.sender.as_mut() {
                    sender.set_priority(priority);
                    self.priority = sender.priority();
                }
                self.set_status("priority", self.priority.to_string());
            }
            ModuleEvent::SetNetworkConfig(network_config) => {
                self.set_status("interfaces", network_config.describe());
                if let Some(sender) = self.sender.as_mut() {
                    sender.set_network_config(network_config.clone());
                }
                self.network_config = network_config;
            }
            ModuleEvent::SetTickRate(rate) => {
                self.apply_tick_rate(rate);
            }
            ModuleEvent::Shutdown => {}
        }
    }

    /// Change the render rate. Rates outside 1-120Hz are logged and ignored; returns whether
    /// the rate changed.
    fn apply_tick_rate(&mut self, rate: f64) -> bool {
        if !ConfigManager::tick_rate_in_range(rate) {
            log::warn!("Ignoring tick rate {}Hz, keeping {}Hz", rate, self.engine.tick_rate());
            return false;
        }
        log::info!("Output tick rate changed to {}Hz", rate);
        self.engine.set_tick_rate(rate);
        self.set_status("tick_rate", rate.to_string());
        true
    }
}

#[async_trait]
impl AsyncModule for OutputModule {
    fn id(&self) -> ModuleId {
        ModuleId::Output
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!(
            "Initializing sACN output on {}",
            self.network_config.describe()
        );

        let mut sender = SacnSender::new(&self.source_name, self.network_config.clone());
        sender.set_priority(self.priority);
        self.priority = sender.priority();
        self.sender = Some(sender);

        self.set_status("source", self.source_name.clone());
        self.set_status("priority", self.priority.to_string());
        self.set_status("interfaces", self.network_config.describe());
        self.set_status("tick_rate", self.engine.tick_rate().to_string());
        self.set_status("status", "initialized".to_string());

        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.sender.is_none() {
            return Err("Output module not initialized".into());
        }

        let mut ticker = tick_interval(self.engine.tick_rate());
        let mut last_report = Instant::now();

        log::info!("Output module started, running at {}Hz", self.engine.tick_rate());
        self.set_status("status", "running".to_string());

        // Send initial status
        let _ = tx
            .send(ModuleMessage::Status(format!(
                "sACN output running at {}Hz",
                self.engine.tick_rate()
            )))
            .await;

        loop {
            tokio::select! {
                // Handle incoming events
                event = rx.recv() => {
                    match event {
                        Some(ModuleEvent::Shutdown) | None => {
                            log::info!("Output module received shutdown signal");
                            break;
                        }
                        Some(ModuleEvent::SetTickRate(rate)) => {
                            if self.apply_tick_rate(rate) {
                                ticker = tick_interval(rate);
                            }
                        }
                        Some(event) => self.handle_event(event),
                    }
                }

                // Render and send at regular intervals
                _ = ticker.tick() => {
                    let started = Instant::now();
                    self.tick();
                    let elapsed = started.elapsed();
                    if elapsed.as_secs_f64() > 1.0 / self.engine.tick_rate() {
                        log::debug!("Render tick overran: {:?}", elapsed);
                    }

                    if last_report.elapsed() >= Duration::from_secs(5) {
                        last_report = Instant::now();
                        self.set_status("frames_sent", self.frames_sent.to_string());
                        self.set_status("packets_sent", self.packets_sent.to_string());

                        // The console may not be draining, never stall the tick for it
                        let _ = tx.try_send(ModuleMessage::Status(format!(
                            "sACN: {} frames rendered, {} packets sent",
                            self.frames_sent,
                            self.packets_sent
                        )));
                    }
                }
            }
        }

        log::info!(
            "Output module shutting down after {} frames",
            self.frames_sent
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sender = None;
        self.set_status("frames_sent", self.frames_sent.to_string());
        self.set_status("status", "shutdown".to_string());
        log::info!("Output module shutdown complete");
        Ok(())
    }

    fn status(&self) -> ModuleStatus {
        self.status.clone()
    }
}
