pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use console::LightingConsole;
pub use cue::cue::{Cue, CueGroupEntry, Cuelist, PlaybackError};
pub use effect::effect::{Effect, EffectClocks, EffectStep, StepPosition};
pub use messages::{ConsoleCommand, ConsoleEvent, Settings};
// Async module system exports
pub use modules::{
    AsyncModule, ModuleError, ModuleEvent, ModuleId, ModuleManager, ModuleMessage, ModuleStatus,
    OutputModule,
};
pub use output::mapper::{ChannelMapper, DmxUniverse, MappedOutput, PreviewRecord, UniverseBuffers};
pub use output::network_config::{NetworkConfig, OutputInterface};
pub use output::sacn::{SacnError, SacnPacket, SacnSender};
pub use preset::preset::{Color, HueSaturation, Intensity, Position, PositionValue, Raw, Rgb};
pub use render::engine::{RenderEngine, RenderedFrame};
pub use render::fade::{FadeController, FadePhase};
pub use render::state::{FixtureState, FixtureStates, RawChannel};
pub use show::show::{
    ColorId, CueId, CuelistId, EffectId, Group, GroupId, IntensityId, PositionId, RawId, Show,
    ShowError,
};
pub use show::show_manager::ShowManager;
pub use show::SharedShow;

mod config;
mod console;
mod cue;
mod effect;
pub mod messages;
mod modules;
pub mod output;
mod preset;
pub mod render;
mod show;
