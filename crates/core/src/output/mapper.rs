use std::collections::{BTreeMap, HashMap};

use prism_fixtures::{ChannelFunction, ChannelLayout, Fixture, FixtureId, Model, DMX_CHANNELS};

use crate::preset::preset::{PositionValue, Rgb};
use crate::render::state::{nearest_turn, FixtureState, FixtureStates};
use crate::show::show::Show;

pub type DmxUniverse = [u8; DMX_CHANNELS];

/// One 512-byte buffer per universe that has at least one patched fixture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniverseBuffers {
    universes: BTreeMap<u16, DmxUniverse>,
}

impl UniverseBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn universe_mut(&mut self, universe: u16) -> &mut DmxUniverse {
        self.universes
            .entry(universe)
            .or_insert([0; DMX_CHANNELS])
    }

    pub fn get(&self, universe: u16) -> Option<&DmxUniverse> {
        self.universes.get(&universe)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &DmxUniverse)> {
        self.universes.iter().map(|(u, data)| (*u, data))
    }

    pub fn len(&self) -> usize {
        self.universes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }
}

/// What the visualizer needs to draw one fixture.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewRecord {
    pub fixture: FixtureId,
    /// 0.0-1.0 with the dimmer already applied.
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    /// Degrees.
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

#[derive(Clone, Debug, Default)]
pub struct MappedOutput {
    pub universes: UniverseBuffers,
    pub preview: Vec<PreviewRecord>,
}

/// 0-100 % onto the full 16-bit range.
pub fn percent_to_u16(percent: f64) -> u16 {
    (percent.clamp(0.0, 100.0) / 100.0 * 65535.0).round() as u16
}

/// Percent values for every function a layout can ask for.
#[derive(Clone, Copy, Debug, Default)]
struct ChannelValues {
    dimmer: f64,
    red: f64,
    green: f64,
    blue: f64,
    white: f64,
    pan: f64,
    tilt: f64,
    zoom: f64,
    focus: f64,
}

impl ChannelValues {
    fn value_of(&self, function: ChannelFunction) -> Option<u16> {
        let percent = match function {
            ChannelFunction::Dimmer => self.dimmer,
            ChannelFunction::Red => self.red,
            ChannelFunction::Green => self.green,
            ChannelFunction::Blue => self.blue,
            ChannelFunction::White => self.white,
            ChannelFunction::Cyan => 100.0 - self.red,
            ChannelFunction::Magenta => 100.0 - self.green,
            ChannelFunction::Yellow => 100.0 - self.blue,
            ChannelFunction::Pan => self.pan,
            ChannelFunction::Tilt => self.tilt,
            ChannelFunction::Zoom => self.zoom,
            ChannelFunction::Focus => self.focus,
            ChannelFunction::Zero | ChannelFunction::Full => return None,
        };
        Some(percent_to_u16(percent))
    }
}

/// Translates resolved fixture state into DMX bytes.
///
/// Remembers each fixture's last pan angle so that, when several turns of the pan range
/// reach the same direction, the head keeps to the one nearest where it already is.
#[derive(Debug, Default)]
pub struct ChannelMapper {
    pan_memory: HashMap<FixtureId, f64>,
}

impl ChannelMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, show: &Show, states: &FixtureStates) -> MappedOutput {
        let mut output = MappedOutput::default();
        let dimmer_only = ChannelLayout::dimmer_only();

        self.pan_memory.retain(|id, _| show.fixtures.contains_key(id));

        for fixture in show.fixtures.values() {
            let model = show.fixture_model(fixture);
            let layout = model.map_or(&dimmer_only, |m| &m.channels);
            let empty = FixtureState::default();
            let state = states.get(&fixture.id).unwrap_or(&empty);

            let position = state.position.unwrap_or(PositionValue {
                zoom: model.map_or(0.0, |m| m.min_zoom),
                ..Default::default()
            });
            let values = self.channel_values(fixture, model, layout, state, &position);
            output
                .preview
                .push(preview_record(fixture, state, &position));

            let Some(start) = fixture.start_index() else {
                continue;
            };
            let buffer = output.universes.universe_mut(fixture.universe);

            for (offset, channel) in layout.channels().iter().enumerate() {
                let idx = start + offset;
                if idx >= DMX_CHANNELS {
                    log::trace!("Fixture {} runs past the end of its universe", fixture.id);
                    break;
                }
                buffer[idx] = match channel.function {
                    ChannelFunction::Zero => 0,
                    ChannelFunction::Full => 255,
                    function => values
                        .value_of(function)
                        .map_or(0, |value| channel.byte_of(value)),
                };
            }

            for (offset, raw) in &state.raw {
                let idx = start + *offset as usize;
                if idx < DMX_CHANNELS {
                    buffer[idx] = raw.resolve(buffer[idx]);
                }
            }
        }

        output
    }

    fn channel_values(
        &mut self,
        fixture: &Fixture,
        model: Option<&Model>,
        layout: &ChannelLayout,
        state: &FixtureState,
        position: &PositionValue,
    ) -> ChannelValues {
        let dimmer = state.dimmer.unwrap_or(0.0).clamp(0.0, 100.0);
        let color = state.color.unwrap_or(Rgb::WHITE);
        let mut red = color.red.clamp(0.0, 100.0);
        let mut green = color.green.clamp(0.0, 100.0);
        let mut blue = color.blue.clamp(0.0, 100.0);
        let mut white = 0.0;

        if layout.contains(ChannelFunction::White) {
            white = red.min(green).min(blue) * color.quality.clamp(0.0, 100.0) / 100.0;
            red -= white;
            green -= white;
            blue -= white;
        }

        // Without a dimmer channel the emitters carry the intensity themselves
        if !layout.contains(ChannelFunction::Dimmer) {
            let scale = dimmer / 100.0;
            red *= scale;
            green *= scale;
            blue *= scale;
            white *= scale;
        }

        let mut values = ChannelValues {
            dimmer,
            red,
            green,
            blue,
            white,
            focus: position.focus.clamp(0.0, 100.0),
            ..Default::default()
        };

        if let Some(model) = model {
            if layout.contains(ChannelFunction::Pan) {
                values.pan = self.pan_percent(fixture, model.pan_range, position.pan);
            }
            values.tilt = range_percent(position.tilt, model.tilt_range);
            values.zoom = if model.max_zoom > model.min_zoom {
                ((position.zoom - model.min_zoom) / (model.max_zoom - model.min_zoom) * 100.0)
                    .clamp(0.0, 100.0)
            } else {
                0.0
            };
        }

        values
    }

    fn pan_percent(&mut self, fixture: &Fixture, range: f64, pan: f64) -> f64 {
        if range <= 0.0 {
            return 0.0;
        }

        let half = range / 2.0;
        let angle = if fixture.invert_pan { -pan } else { pan } + fixture.rotation;
        let last = self.pan_memory.get(&fixture.id).copied().unwrap_or(0.0);

        let lowest = ((-half - angle) / 360.0).ceil();
        let highest = ((half - angle) / 360.0).floor();
        let chosen = if lowest <= highest {
            let turns = ((last - angle) / 360.0).round().clamp(lowest, highest);
            angle + 360.0 * turns
        } else {
            nearest_turn(angle, 0.0).clamp(-half, half)
        };

        self.pan_memory.insert(fixture.id, chosen);
        ((chosen + half) / range * 100.0).clamp(0.0, 100.0)
    }
}

fn range_percent(value: f64, range: f64) -> f64 {
    if range <= 0.0 {
        return 0.0;
    }
    ((value + range / 2.0) / range * 100.0).clamp(0.0, 100.0)
}

fn preview_record(fixture: &Fixture, state: &FixtureState, position: &PositionValue) -> PreviewRecord {
    let color = state.color.unwrap_or(Rgb::WHITE);
    let level = state.dimmer.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0;
    let channel = |value: f64| value.clamp(0.0, 100.0) / 100.0 * level;

    PreviewRecord {
        fixture: fixture.id,
        red: channel(color.red),
        green: channel(color.green),
        blue: channel(color.blue),
        pan: position.pan,
        tilt: position.tilt,
        zoom: position.zoom,
    }
}
