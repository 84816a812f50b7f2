use serde::{Deserialize, Serialize};
use thiserror::Error;

mod channel;
mod fixture_library;

pub use channel::{Channel, ChannelFunction, ChannelLayout};
pub use fixture_library::ModelLibrary;

/// Number of channels in one DMX universe.
pub const DMX_CHANNELS: usize = 512;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureId(pub u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub u32);

impl std::fmt::Display for FixtureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("invalid channel function '{code}' at position {position}")]
    InvalidChannel { code: char, position: usize },
    #[error("channel layout is empty")]
    EmptyLayout,
    #[error("channel layout has {0} channels, a universe only holds 512")]
    LayoutTooLong(usize),
    #[error("DMX address {0} is outside 0..=512")]
    InvalidAddress(u16),
}

/// A fixture type: how its channels are laid out and how far it moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    pub channels: ChannelLayout,
    /// Full pan travel in degrees, centred on 0.
    pub pan_range: f64,
    /// Full tilt travel in degrees, centred on 0.
    pub tilt_range: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Model {
    pub fn new(id: ModelId, name: &str, channels: ChannelLayout) -> Self {
        Self {
            id,
            name: name.to_string(),
            channels,
            pan_range: 540.0,
            tilt_range: 270.0,
            min_zoom: 10.0,
            max_zoom: 40.0,
        }
    }

    /// Replace the channel layout from a channel string, rejecting invalid codes.
    /// The model is left untouched on error.
    pub fn set_channels(&mut self, channels: &str) -> Result<(), FixtureError> {
        self.channels = ChannelLayout::parse(channels)?;
        Ok(())
    }

    pub fn with_pan_tilt(mut self, pan_range: f64, tilt_range: f64) -> Self {
        self.pan_range = pan_range;
        self.tilt_range = tilt_range;
        self
    }

    pub fn with_zoom(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn footprint(&self) -> usize {
        self.channels.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: FixtureId,
    pub name: String,
    pub model: Option<ModelId>,
    pub universe: u16,
    /// 1-based DMX start address, 0 when unpatched.
    pub address: u16,
    /// Degrees added to pan after inversion, for fixtures hung rotated.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub invert_pan: bool,
}

impl Fixture {
    pub fn new(id: FixtureId, name: &str, model: Option<ModelId>) -> Self {
        Fixture {
            id,
            name: name.to_string(),
            model,
            universe: 1,
            address: 0,
            rotation: 0.0,
            invert_pan: false,
        }
    }

    pub fn patch(&mut self, universe: u16, address: u16) -> Result<(), FixtureError> {
        if address as usize > DMX_CHANNELS {
            return Err(FixtureError::InvalidAddress(address));
        }
        self.universe = universe;
        self.address = address;
        Ok(())
    }

    pub fn unpatch(&mut self) {
        self.address = 0;
    }

    pub fn is_patched(&self) -> bool {
        self.address != 0
    }

    /// Index of the fixture's first channel in a universe buffer.
    pub fn start_index(&self) -> Option<usize> {
        if self.is_patched() {
            Some(self.address as usize - 1)
        } else {
            None
        }
    }
}
