use std::collections::BTreeMap;

use prism_fixtures::FixtureId;

use crate::preset::preset::{PositionValue, Rgb};

/// Resolved state for every fixture something is targeting.
pub type FixtureStates = BTreeMap<FixtureId, FixtureState>;

/// `target + 360°·k` closest to `reference`.
pub fn nearest_turn(target: f64, reference: f64) -> f64 {
    target + 360.0 * ((reference - target) / 360.0).round()
}

/// `current + (previous - current) * weight`
pub fn lerp(previous: f64, current: f64, weight: f64) -> f64 {
    current + (previous - current) * weight
}

/// A raw byte override, possibly mid-crossfade.
///
/// `None` on either side means "whatever the channel mapper computed", so a faded raw can
/// ease in from, or back out to, the mapped value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawChannel {
    pub target: Option<u8>,
    pub from: Option<u8>,
    /// Weight of `from`; 0.0 means fully at `target`.
    pub weight: f64,
    pub fade_with_cue: bool,
}

impl RawChannel {
    pub fn new(value: u8, fade_with_cue: bool) -> Self {
        Self {
            target: Some(value),
            from: None,
            weight: 0.0,
            fade_with_cue,
        }
    }

    pub fn resolve(&self, computed: u8) -> u8 {
        let target = self.target.unwrap_or(computed) as f64;
        let from = self.from.unwrap_or(computed) as f64;
        lerp(from, target, self.weight.clamp(0.0, 1.0))
            .round()
            .clamp(0.0, 255.0) as u8
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FixtureState {
    /// Percent.
    pub dimmer: Option<f64>,
    pub color: Option<Rgb>,
    pub position: Option<PositionValue>,
    /// Keyed by channel offset from the fixture's start address.
    pub raw: BTreeMap<u16, RawChannel>,
}

impl FixtureState {
    pub fn is_dark(&self) -> bool {
        self.dimmer.map_or(true, |d| d <= 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.dimmer.is_none() && self.color.is_none() && self.position.is_none() && self.raw.is_empty()
    }

    /// Stamp everything `other` sets on top of this state. Raw merges per channel.
    pub fn overlay(&mut self, other: &FixtureState) {
        if other.dimmer.is_some() {
            self.dimmer = other.dimmer;
        }
        if other.color.is_some() {
            self.color = other.color;
        }
        if other.position.is_some() {
            self.position = other.position;
        }
        for (channel, raw) in &other.raw {
            self.raw.insert(*channel, *raw);
        }
    }

    /// Interpolate between two states; `weight` is the share of `previous` (1.0 = all previous).
    ///
    /// A missing dimmer counts as 0 %, so fixtures fade in and out. Missing color or position
    /// holds the side that has one rather than fading through an invented value. Only raw
    /// channels flagged to fade with the cue are interpolated; the rest snap to `current`.
    pub fn blend(
        previous: Option<&FixtureState>,
        current: Option<&FixtureState>,
        weight: f64,
    ) -> FixtureState {
        let empty = FixtureState::default();
        let prev = previous.unwrap_or(&empty);
        let cur = current.unwrap_or(&empty);
        let weight = weight.clamp(0.0, 1.0);

        let dimmer = match (prev.dimmer, cur.dimmer) {
            (None, None) => None,
            (p, c) => Some(lerp(p.unwrap_or(0.0), c.unwrap_or(0.0), weight)),
        };

        let color = match (prev.color, cur.color) {
            (Some(p), Some(c)) => Some(Rgb {
                red: lerp(p.red, c.red, weight),
                green: lerp(p.green, c.green, weight),
                blue: lerp(p.blue, c.blue, weight),
                quality: lerp(p.quality, c.quality, weight),
            }),
            (p, c) => c.or(p),
        };

        let position = match (prev.position, cur.position) {
            (Some(p), Some(c)) => Some(PositionValue {
                pan: lerp(p.pan, nearest_turn(c.pan, p.pan), weight),
                tilt: lerp(p.tilt, c.tilt, weight),
                zoom: lerp(p.zoom, c.zoom, weight),
                focus: lerp(p.focus, c.focus, weight),
            }),
            (p, c) => c.or(p),
        };

        let mut raw = BTreeMap::new();
        for (channel, target) in &cur.raw {
            let blended = if target.fade_with_cue && weight > 0.0 {
                RawChannel {
                    target: target.target,
                    from: prev.raw.get(channel).and_then(|p| p.target),
                    weight,
                    fade_with_cue: true,
                }
            } else {
                *target
            };
            raw.insert(*channel, blended);
        }
        for (channel, old) in &prev.raw {
            if old.fade_with_cue && weight > 0.0 && !cur.raw.contains_key(channel) {
                raw.insert(
                    *channel,
                    RawChannel {
                        target: None,
                        from: old.target,
                        weight,
                        fade_with_cue: true,
                    },
                );
            }
        }

        FixtureState {
            dimmer,
            color,
            position,
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn positioned(pan: f64) -> FixtureState {
        FixtureState {
            position: Some(PositionValue {
                pan,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_nearest_turn() {
        assert_relative_eq!(nearest_turn(10.0, 350.0), 370.0);
        assert_relative_eq!(nearest_turn(350.0, 10.0), -10.0);
        assert_relative_eq!(nearest_turn(90.0, 100.0), 90.0);
    }

    #[test]
    fn test_midpoint_is_mean() {
        let prev = FixtureState {
            dimmer: Some(20.0),
            color: Some(Rgb::new(100.0, 0.0, 50.0)),
            ..Default::default()
        };
        let cur = FixtureState {
            dimmer: Some(80.0),
            color: Some(Rgb::new(0.0, 100.0, 50.0)),
            ..Default::default()
        };
        let mid = FixtureState::blend(Some(&prev), Some(&cur), 0.5);
        assert_relative_eq!(mid.dimmer.unwrap(), 50.0);
        let color = mid.color.unwrap();
        assert_relative_eq!(color.red, 50.0);
        assert_relative_eq!(color.green, 50.0);
        assert_relative_eq!(color.blue, 50.0);
    }

    #[test]
    fn test_pan_takes_short_way_round() {
        let mid = FixtureState::blend(Some(&positioned(350.0)), Some(&positioned(10.0)), 0.5);
        let pan = mid.position.unwrap().pan.rem_euclid(360.0);
        assert!(pan < 1.0 || pan > 359.0, "pan {} went the long way", pan);
    }

    #[test]
    fn test_missing_dimmer_fades_from_zero() {
        let cur = FixtureState {
            dimmer: Some(100.0),
            ..Default::default()
        };
        let state = FixtureState::blend(None, Some(&cur), 0.75);
        assert_relative_eq!(state.dimmer.unwrap(), 25.0);

        let out = FixtureState::blend(Some(&cur), None, 0.75);
        assert_relative_eq!(out.dimmer.unwrap(), 75.0);
    }

    #[test]
    fn test_missing_color_holds() {
        let prev = FixtureState {
            color: Some(Rgb::new(0.0, 0.0, 100.0)),
            ..Default::default()
        };
        let state = FixtureState::blend(Some(&prev), None, 0.5);
        assert_eq!(state.color, prev.color);
    }

    #[test]
    fn test_raw_fade_flag() {
        let mut prev = FixtureState::default();
        prev.raw.insert(1, RawChannel::new(0, true));
        prev.raw.insert(2, RawChannel::new(0, false));
        let mut cur = FixtureState::default();
        cur.raw.insert(1, RawChannel::new(200, true));
        cur.raw.insert(2, RawChannel::new(200, false));

        let state = FixtureState::blend(Some(&prev), Some(&cur), 0.5);
        assert_eq!(state.raw[&1].resolve(0), 100);
        assert_eq!(state.raw[&2].resolve(0), 200);
    }

    #[test]
    fn test_raw_fades_out_to_computed() {
        let mut prev = FixtureState::default();
        prev.raw.insert(4, RawChannel::new(255, true));

        let state = FixtureState::blend(Some(&prev), None, 0.25);
        // a quarter of the old byte over a computed 55
        assert_eq!(state.raw[&4].resolve(55), 105);
    }

    #[test]
    fn test_overlay() {
        let mut base = FixtureState {
            dimmer: Some(10.0),
            color: Some(Rgb::WHITE),
            ..Default::default()
        };
        base.raw.insert(1, RawChannel::new(1, false));
        let mut top = FixtureState {
            dimmer: Some(90.0),
            ..Default::default()
        };
        top.raw.insert(2, RawChannel::new(2, false));

        base.overlay(&top);
        assert_eq!(base.dimmer, Some(90.0));
        assert_eq!(base.color, Some(Rgb::WHITE));
        assert_eq!(base.raw.len(), 2);
    }
}
