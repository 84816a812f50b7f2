use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use prism_fixtures::{FixtureId, ModelId};
use serde::{Deserialize, Serialize};

use crate::show::show::{CueId, CuelistId};

/// Commands sent to the console
#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    // System commands
    Initialize,
    Shutdown,

    // Show management
    LoadShow {
        path: PathBuf,
    },
    SaveShow,

    // Patch
    PatchFixture {
        fixture: FixtureId,
        universe: u16,
        address: u16,
    },
    SetModelChannels {
        model: ModelId,
        channels: String,
    },

    // Playback
    Go {
        cuelist: CuelistId,
    },
    Back {
        cuelist: CuelistId,
    },
    GoToCue {
        cuelist: CuelistId,
        cue: CueId,
    },
    Release {
        cuelist: CuelistId,
    },
    SkipFade {
        cuelist: CuelistId,
    },

    // Output
    SetSacnPriority {
        priority: u8,
    },
    SelectInterface {
        interface: Option<Ipv4Addr>,
    },
    SetTickRate {
        rate: f64,
    },
}

/// Events sent back from the console
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    // System events
    Initialized,
    ShutdownComplete,
    Error { message: String },

    // Show events
    ShowLoaded { name: String },
    ShowSaved { path: PathBuf },
    FixturePatched { fixture: FixtureId },
    ModelUpdated { model: ModelId },

    // Playback events
    CueChanged {
        cuelist: CuelistId,
        cue: Option<CueId>,
    },
    FadeSkipped { cuelist: CuelistId },

    // Output events
    SacnPriorityChanged { priority: u8 },
    OutputConfigured { description: String },
    TickRateChanged { rate: f64 },
}

/// Persisted console settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Render settings
    pub tick_rate_hz: f64,
    pub show_file: Option<PathBuf>,

    // Output settings (sACN)
    pub sacn_enabled: bool,
    pub sacn_priority: u8,
    pub sacn_source_name: String,
    /// IPv4 address of the interface every unrouted universe goes out on.
    pub sacn_interface: Option<String>,
    /// Universe -> IPv4 address of the interface it goes out on.
    pub universe_interfaces: HashMap<u16, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Render defaults
            tick_rate_hz: 40.0,
            show_file: None,

            // Output defaults
            sacn_enabled: true,
            sacn_priority: 100,
            sacn_source_name: "Prism".to_string(),
            sacn_interface: None,
            universe_interfaces: HashMap::new(),
        }
    }
}
