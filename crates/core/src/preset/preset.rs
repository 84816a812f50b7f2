use std::collections::BTreeMap;

use prism_fixtures::{Fixture, FixtureId, ModelId};
use serde::{Deserialize, Serialize};

use crate::show::show::{ColorId, IntensityId, PositionId, RawId};

/// Pick the most specific value for a fixture: its own override, then its model's, then the base.
fn resolve<'a, T>(
    base: &'a T,
    model_overrides: &'a BTreeMap<ModelId, T>,
    fixture_overrides: &'a BTreeMap<FixtureId, T>,
    fixture: &Fixture,
) -> &'a T {
    fixture_overrides
        .get(&fixture.id)
        .or_else(|| fixture.model.and_then(|m| model_overrides.get(&m)))
        .unwrap_or(base)
}

/// Dimmer level preset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intensity {
    pub id: IntensityId,
    pub name: String,
    /// Percent, 0-100.
    pub dimmer: f64,
    #[serde(default)]
    pub model_overrides: BTreeMap<ModelId, f64>,
    #[serde(default)]
    pub fixture_overrides: BTreeMap<FixtureId, f64>,
}

impl Intensity {
    pub fn new(id: IntensityId, name: &str, dimmer: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            dimmer,
            model_overrides: BTreeMap::new(),
            fixture_overrides: BTreeMap::new(),
        }
    }

    pub fn dimmer_for(&self, fixture: &Fixture) -> f64 {
        *resolve(
            &self.dimmer,
            &self.model_overrides,
            &self.fixture_overrides,
            fixture,
        )
    }
}

/// Resolved color in percent per emitter, plus how much of the common white to extract.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub quality: f64,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        red: 100.0,
        green: 100.0,
        blue: 100.0,
        quality: 0.0,
    };

    pub fn new(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red,
            green,
            blue,
            quality: 0.0,
        }
    }

    /// Fully saturated-at-value-100 HSV conversion.
    pub fn from_hue_saturation(hue: f64, saturation: f64, quality: f64) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let chroma = saturation.clamp(0.0, 100.0) / 100.0;
        let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
        let m = 1.0 - chroma;

        let (r, g, b) = match h as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };

        Self {
            red: (r + m) * 100.0,
            green: (g + m) * 100.0,
            blue: (b + m) * 100.0,
            quality,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HueSaturation {
    pub hue: f64,
    pub saturation: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub id: ColorId,
    pub name: String,
    /// Degrees, 0-359.
    pub hue: f64,
    pub saturation: f64,
    /// Percent of the common RGB minimum moved onto a white emitter.
    #[serde(default)]
    pub quality: f64,
    #[serde(default)]
    pub model_overrides: BTreeMap<ModelId, HueSaturation>,
    #[serde(default)]
    pub fixture_overrides: BTreeMap<FixtureId, HueSaturation>,
}

impl Color {
    pub fn new(id: ColorId, name: &str, hue: f64, saturation: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            hue,
            saturation,
            quality: 0.0,
            model_overrides: BTreeMap::new(),
            fixture_overrides: BTreeMap::new(),
        }
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = quality;
        self
    }

    pub fn rgb_for(&self, fixture: &Fixture) -> Rgb {
        let base = HueSaturation {
            hue: self.hue,
            saturation: self.saturation,
        };
        let hs = resolve(
            &base,
            &self.model_overrides,
            &self.fixture_overrides,
            fixture,
        );
        Rgb::from_hue_saturation(hs.hue, hs.saturation, self.quality)
    }
}

/// Pan/tilt/zoom in degrees, focus in percent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionValue {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
    pub focus: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub name: String,
    pub value: PositionValue,
    #[serde(default)]
    pub model_overrides: BTreeMap<ModelId, PositionValue>,
    #[serde(default)]
    pub fixture_overrides: BTreeMap<FixtureId, PositionValue>,
}

impl Position {
    pub fn new(id: PositionId, name: &str, value: PositionValue) -> Self {
        Self {
            id,
            name: name.to_string(),
            value,
            model_overrides: BTreeMap::new(),
            fixture_overrides: BTreeMap::new(),
        }
    }

    pub fn value_for(&self, fixture: &Fixture) -> PositionValue {
        *resolve(
            &self.value,
            &self.model_overrides,
            &self.fixture_overrides,
            fixture,
        )
    }
}

/// Direct channel bytes, keyed by offset from the fixture's start address.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Raw {
    pub id: RawId,
    pub name: String,
    pub channels: BTreeMap<u16, u8>,
    #[serde(default)]
    pub model_overrides: BTreeMap<ModelId, BTreeMap<u16, u8>>,
    #[serde(default)]
    pub fixture_overrides: BTreeMap<FixtureId, BTreeMap<u16, u8>>,
    /// Also applied when a later cue pre-positions a dark fixture.
    #[serde(default)]
    pub move_while_dark: bool,
    /// Crossfade toward the new byte instead of snapping.
    #[serde(default)]
    pub fade_with_cue: bool,
}

impl Raw {
    pub fn new(id: RawId, name: &str, channels: BTreeMap<u16, u8>) -> Self {
        Self {
            id,
            name: name.to_string(),
            channels,
            ..Default::default()
        }
    }

    /// Base channels with model then fixture overrides layered on top, entry by entry.
    pub fn channels_for(&self, fixture: &Fixture) -> BTreeMap<u16, u8> {
        let mut channels = self.channels.clone();
        if let Some(model_channels) = fixture.model.and_then(|m| self.model_overrides.get(&m)) {
            channels.extend(model_channels);
        }
        if let Some(fixture_channels) = self.fixture_overrides.get(&fixture.id) {
            channels.extend(fixture_channels);
        }
        channels
    }
}
