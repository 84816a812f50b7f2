use std::collections::BTreeSet;

use prism_fixtures::{Fixture, FixtureId};

use crate::cue::cue::{Cue, CueGroupEntry, Cuelist};
use crate::effect::effect::{EffectClocks, EffectStep};
use crate::render::fade::FadeController;
use crate::render::snapshot::RenderSnapshot;
use crate::render::state::{FixtureState, FixtureStates, RawChannel};
use crate::show::show::{CuelistId, RawId};

/// What one cuelist contributes this tick, before merging.
#[derive(Clone, Debug, Default)]
pub struct CuelistLayer {
    pub cuelist: CuelistId,
    pub priority: i32,
    pub current: FixtureStates,
    /// Only present while the cuelist is fading.
    pub previous: Option<FixtureStates>,
    /// Share of `previous`, see `FadeController::blend`.
    pub blend: Option<f64>,
}

impl CuelistLayer {
    /// Stack this layer on `frame`, which holds everything of lower priority.
    ///
    /// While fading, both sides of the crossfade are taken over what lies beneath, so a
    /// fixture the new cue no longer targets eases to the lower cuelists' look instead of
    /// dropping to dark first.
    pub fn apply(&self, frame: &mut FixtureStates) {
        let (Some(previous), Some(weight)) = (&self.previous, self.blend) else {
            for (fixture, state) in &self.current {
                frame.entry(*fixture).or_default().overlay(state);
            }
            return;
        };

        let fixtures: BTreeSet<FixtureId> =
            self.current.keys().chain(previous.keys()).copied().collect();
        for fixture in fixtures {
            let below = frame.get(&fixture).cloned().unwrap_or_default();

            let mut from = below.clone();
            if let Some(state) = previous.get(&fixture) {
                from.overlay(state);
            }
            let mut to = below;
            if let Some(state) = self.current.get(&fixture) {
                to.overlay(state);
            }

            frame.insert(fixture, FixtureState::blend(Some(&from), Some(&to), weight));
        }
    }
}

/// Turns the cuelists of a snapshot into per-fixture state.
pub struct Compositor<'a> {
    snapshot: &'a RenderSnapshot<'a>,
    clocks: &'a EffectClocks,
    tick_rate: f64,
}

impl<'a> Compositor<'a> {
    pub fn new(snapshot: &'a RenderSnapshot<'a>, clocks: &'a EffectClocks, tick_rate: f64) -> Self {
        Self {
            snapshot,
            clocks,
            tick_rate,
        }
    }

    /// One layer per cuelist that has something to show, lowest priority first.
    pub fn layers(&self, fades: &FadeController) -> Vec<CuelistLayer> {
        let mut layers = Vec::new();
        for list in self.snapshot.cuelists() {
            let current = list
                .active_cue()
                .map(|cue| self.render_cue(list, cue))
                .unwrap_or_default();
            let blend = fades.blend(list.id);
            // Nothing to fade from means fading in from dark
            let previous = blend.map(|_| {
                list.previous()
                    .map(|cue| self.render_cue(list, cue))
                    .unwrap_or_default()
            });

            if current.is_empty() && previous.as_ref().map_or(true, |p| p.is_empty()) {
                continue;
            }

            layers.push(CuelistLayer {
                cuelist: list.id,
                priority: list.priority,
                current,
                previous,
                blend,
            });
        }
        layers
    }

    /// Resolve every layer and stack them; later (higher priority) layers win per attribute
    /// and per raw channel.
    pub fn compose(&self, fades: &FadeController) -> FixtureStates {
        let mut frame = FixtureStates::new();
        for layer in self.layers(fades) {
            layer.apply(&mut frame);
        }
        frame
    }

    /// Stamp a cue's group entries, effects included, onto the fixtures it targets.
    pub fn render_cue(&self, list: &Cuelist, cue: &Cue) -> FixtureStates {
        let mut states = FixtureStates::new();
        for (group, entry) in &cue.groups {
            for fixture in self.snapshot.show.group_fixtures(*group) {
                let state = states.entry(fixture.id).or_default();
                self.stamp_entry(state, entry, fixture);

                for effect_id in &entry.effects {
                    let Some(effect) = self.snapshot.show.effects.get(effect_id) else {
                        continue;
                    };
                    let frame = self.clocks.frame(*group, *effect_id);
                    let Some(at) = effect.position_at(frame, fixture.id, self.tick_rate) else {
                        continue;
                    };

                    let from = self.step_state(state, &effect.steps[at.step], fixture);
                    *state = if at.progress > 0.0 {
                        let to = self.step_state(state, &effect.steps[at.next], fixture);
                        FixtureState::blend(Some(&from), Some(&to), 1.0 - at.progress)
                    } else {
                        from
                    };
                }
            }
        }

        if list.move_while_dark {
            self.look_ahead(list, cue, &mut states);
        }
        states
    }

    fn stamp_entry(&self, state: &mut FixtureState, entry: &CueGroupEntry, fixture: &Fixture) {
        let show = self.snapshot.show;
        if let Some(intensity) = entry.intensity.and_then(|id| show.intensities.get(&id)) {
            state.dimmer = Some(intensity.dimmer_for(fixture));
        }
        if let Some(color) = entry.color.and_then(|id| show.colors.get(&id)) {
            state.color = Some(color.rgb_for(fixture));
        }
        if let Some(position) = entry.position.and_then(|id| show.positions.get(&id)) {
            state.position = Some(position.value_for(fixture));
        }
        for raw in &entry.raws {
            self.stamp_raw(state, *raw, fixture, false);
        }
    }

    fn stamp_raw(&self, state: &mut FixtureState, raw: RawId, fixture: &Fixture, dark_only: bool) {
        let Some(raw) = self.snapshot.show.raws.get(&raw) else {
            return;
        };
        if dark_only && !raw.move_while_dark {
            return;
        }
        for (channel, value) in raw.channels_for(fixture) {
            state
                .raw
                .insert(channel, RawChannel::new(value, raw.fade_with_cue));
        }
    }

    /// `base` with one effect step's attributes stamped over it.
    fn step_state(&self, base: &FixtureState, step: &EffectStep, fixture: &Fixture) -> FixtureState {
        let mut state = base.clone();
        let entry = CueGroupEntry {
            intensity: step.intensity,
            color: step.color,
            position: step.position,
            raws: step.raw.into_iter().collect(),
            effects: Vec::new(),
        };
        self.stamp_entry(&mut state, &entry, fixture);
        state
    }

    /// Pre-position dark fixtures that this cue leaves without a position from the first later
    /// cue that moves or colors them. Intensity is never taken from the later cue.
    fn look_ahead(&self, list: &Cuelist, cue: &Cue, states: &mut FixtureStates) {
        let show = self.snapshot.show;
        for (fixture_id, state) in states.iter_mut() {
            if !state.is_dark() || state.position.is_some() {
                continue;
            }
            let Some(fixture) = show.fixtures.get(fixture_id) else {
                continue;
            };

            for later in list.cues_after(cue.id) {
                let mut found = false;
                for (group, entry) in &later.groups {
                    if !show.group_fixtures(*group).any(|f| f.id == *fixture_id) {
                        continue;
                    }
                    if let Some(position) = entry.position.and_then(|id| show.positions.get(&id))
                    {
                        state.position = Some(position.value_for(fixture));
                        found = true;
                    }
                    if let Some(color) = entry.color.and_then(|id| show.colors.get(&id)) {
                        state.color = Some(color.rgb_for(fixture));
                        found = true;
                    }
                    if found {
                        for raw in &entry.raws {
                            self.stamp_raw(state, *raw, fixture, true);
                        }
                    }
                }
                if found {
                    log::trace!(
                        "Fixture {} pre-positioned from cue {} of cuelist {}",
                        fixture_id,
                        later.id,
                        list.id
                    );
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use approx::assert_relative_eq;
    use prism_fixtures::{ChannelLayout, FixtureId, Model, ModelId};

    use super::*;
    use crate::effect::effect::Effect;
    use crate::render::fade::FadePhase;
    use crate::preset::preset::{Color, Intensity, Position, PositionValue, Raw};
    use crate::show::show::{
        ColorId, CueId, EffectId, Group, GroupId, IntensityId, PositionId, Show,
    };

    fn base_show() -> Show {
        let mut show = Show::new("Compositor");
        show.add_model(Model::new(
            ModelId(1),
            "Spot",
            ChannelLayout::parse("DRGBPT").unwrap(),
        ));
        for id in 1..=4 {
            let mut fixture = Fixture::new(FixtureId(id), "Spot", Some(ModelId(1)));
            fixture.patch(1, 1 + (id as u16 - 1) * 6).unwrap();
            show.add_fixture(fixture);
        }
        show.add_group(Group::new(
            GroupId(1),
            "All",
            (1..=4).map(FixtureId).collect(),
        ));
        show.add_group(Group::new(GroupId(2), "First", vec![FixtureId(1)]));
        show.add_intensity(Intensity::new(IntensityId(1), "Full", 100.0));
        show.add_intensity(Intensity::new(IntensityId(2), "Half", 50.0));
        show.add_intensity(Intensity::new(IntensityId(3), "Off", 0.0));
        show.add_color(Color::new(ColorId(1), "Red", 0.0, 100.0));
        show.add_color(Color::new(ColorId(2), "Blue", 240.0, 100.0));
        show.add_position(Position::new(
            PositionId(1),
            "Stage",
            PositionValue {
                pan: 45.0,
                tilt: 30.0,
                ..Default::default()
            },
        ));
        show
    }

    fn compose(show: &Show) -> FixtureStates {
        let snapshot = RenderSnapshot::capture(show);
        let mut fades = FadeController::new(40.0);
        fades.observe(&snapshot);
        let clocks = EffectClocks::new();
        Compositor::new(&snapshot, &clocks, 40.0).compose(&fades)
    }

    fn playing(id: u32, priority: i32, cue: Cue) -> Cuelist {
        let mut list = Cuelist::new(CuelistId(id), "List", priority);
        list.add_cue(cue);
        list.go().unwrap();
        list
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_ids() {
        for (low_id, high_id) in [(1, 2), (2, 1)] {
            let mut show = base_show();
            show.add_cuelist(playing(
                low_id,
                0,
                Cue::new(CueId(1), "Low", 0.0).with_group(
                    GroupId(1),
                    CueGroupEntry::default()
                        .with_intensity(IntensityId(2))
                        .with_color(ColorId(1)),
                ),
            ));
            show.add_cuelist(playing(
                high_id,
                10,
                Cue::new(CueId(1), "High", 0.0).with_group(
                    GroupId(2),
                    CueGroupEntry::default().with_intensity(IntensityId(1)),
                ),
            ));

            let frame = compose(&show);
            assert_eq!(frame[&FixtureId(1)].dimmer, Some(100.0));
            // Color from the low cuelist survives where the high one sets none
            assert_relative_eq!(frame[&FixtureId(1)].color.unwrap().red, 100.0);
            assert_eq!(frame[&FixtureId(2)].dimmer, Some(50.0));
        }
    }

    #[test]
    fn test_raw_merges_per_channel() {
        let mut show = base_show();
        show.add_raw(Raw::new(RawId(1), "Low", BTreeMap::from([(4, 10), (5, 20)])));
        show.add_raw(Raw::new(RawId(2), "High", BTreeMap::from([(5, 99)])));
        show.add_cuelist(playing(
            1,
            0,
            Cue::new(CueId(1), "Low", 0.0)
                .with_group(GroupId(2), CueGroupEntry::default().with_raw(RawId(1))),
        ));
        show.add_cuelist(playing(
            2,
            5,
            Cue::new(CueId(1), "High", 0.0)
                .with_group(GroupId(2), CueGroupEntry::default().with_raw(RawId(2))),
        ));

        let raw = &compose(&show)[&FixtureId(1)].raw;
        assert_eq!(raw[&4].resolve(0), 10);
        assert_eq!(raw[&5].resolve(0), 99);
    }

    #[test]
    fn test_dangling_references_are_skipped() {
        let mut show = base_show();
        show.add_cuelist(playing(
            1,
            0,
            Cue::new(CueId(1), "Broken", 0.0)
                .with_group(
                    GroupId(9),
                    CueGroupEntry::default().with_intensity(IntensityId(1)),
                )
                .with_group(
                    GroupId(1),
                    CueGroupEntry::default()
                        .with_intensity(IntensityId(9))
                        .with_color(ColorId(2))
                        .with_effect(EffectId(9)),
                ),
        ));

        let frame = compose(&show);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame[&FixtureId(1)].dimmer, None);
        assert_relative_eq!(frame[&FixtureId(1)].color.unwrap().blue, 100.0);
    }

    #[test]
    fn test_fading_layer_blends_previous() {
        let mut show = base_show();
        let mut list = Cuelist::new(CuelistId(1), "Main", 0);
        list.add_cue(Cue::new(CueId(1), "Half", 0.0).with_group(
            GroupId(1),
            CueGroupEntry::default().with_intensity(IntensityId(2)),
        ));
        list.add_cue(Cue::new(CueId(2), "Full", 1.0).with_group(
            GroupId(1),
            CueGroupEntry::default().with_intensity(IntensityId(1)),
        ));
        list.go().unwrap();
        show.add_cuelist(list);

        let mut fades = FadeController::new(40.0);
        fades.observe(&RenderSnapshot::capture(&show));
        show.cuelist_mut(CuelistId(1)).unwrap().go().unwrap();

        let snapshot = RenderSnapshot::capture(&show);
        fades.observe(&snapshot);
        for _ in 0..20 {
            fades.complete_tick();
        }
        let clocks = EffectClocks::new();
        let compositor = Compositor::new(&snapshot, &clocks, 40.0);

        let layers = compositor.layers(&fades);
        assert_eq!(layers.len(), 1);
        assert!(layers[0].previous.is_some());

        let frame = compositor.compose(&fades);
        assert_relative_eq!(frame[&FixtureId(3)].dimmer.unwrap(), 75.0);
    }

    #[test]
    fn test_released_layer_fades_to_lower_priority() {
        let mut show = base_show();
        let mut top = Cuelist::new(CuelistId(1), "Top", 0);
        top.add_cue(Cue::new(CueId(1), "Full", 1.0).with_group(
            GroupId(1),
            CueGroupEntry::default().with_intensity(IntensityId(1)),
        ));
        top.go().unwrap();
        show.add_cuelist(top);
        show.add_cuelist(playing(
            2,
            -10,
            Cue::new(CueId(1), "Half", 0.0).with_group(
                GroupId(2),
                CueGroupEntry::default().with_intensity(IntensityId(2)),
            ),
        ));

        let mut fades = FadeController::new(40.0);
        fades.observe(&RenderSnapshot::capture(&show));
        fades.set_phase(CuelistId(1), FadePhase::Idle);
        show.cuelist_mut(CuelistId(1)).unwrap().release().unwrap();

        let snapshot = RenderSnapshot::capture(&show);
        fades.observe(&snapshot);
        for _ in 0..20 {
            fades.complete_tick();
        }
        let clocks = EffectClocks::new();
        let frame = Compositor::new(&snapshot, &clocks, 40.0).compose(&fades);

        // Halfway between the released 100 % and the 50 % underneath
        assert_relative_eq!(frame[&FixtureId(1)].dimmer.unwrap(), 75.0);
        // Nothing underneath: fades out
        assert_relative_eq!(frame[&FixtureId(2)].dimmer.unwrap(), 50.0);
    }

    #[test]
    fn test_effect_chase_overlays_cue() {
        let mut show = base_show();
        let mut effect = Effect::new(EffectId(1), "Chase", 0.1, 0.0)
            .with_step(EffectStep {
                intensity: Some(IntensityId(1)),
                ..Default::default()
            })
            .with_step(EffectStep {
                intensity: Some(IntensityId(3)),
                ..Default::default()
            });
        effect.spread_phase(&[FixtureId(1), FixtureId(2)]);
        show.add_effect(effect);
        show.add_cuelist(playing(
            1,
            0,
            Cue::new(CueId(1), "Chase", 0.0).with_group(
                GroupId(1),
                CueGroupEntry::default()
                    .with_color(ColorId(2))
                    .with_effect(EffectId(1)),
            ),
        ));

        let snapshot = RenderSnapshot::capture(&show);
        let mut fades = FadeController::new(40.0);
        fades.observe(&snapshot);
        let mut clocks = EffectClocks::new();
        clocks.advance(&snapshot.active_effects(|id| fades.is_fading(id)));

        let frame = Compositor::new(&snapshot, &clocks, 40.0).compose(&fades);
        assert_eq!(frame[&FixtureId(1)].dimmer, Some(100.0));
        assert_eq!(frame[&FixtureId(2)].dimmer, Some(0.0));
        assert_relative_eq!(frame[&FixtureId(2)].color.unwrap().blue, 100.0);

        for _ in 0..4 {
            clocks.advance(&HashSet::from([(GroupId(1), EffectId(1))]));
        }
        let frame = Compositor::new(&snapshot, &clocks, 40.0).compose(&fades);
        assert_eq!(frame[&FixtureId(1)].dimmer, Some(0.0));
        assert_eq!(frame[&FixtureId(2)].dimmer, Some(100.0));
    }

    #[test]
    fn test_move_while_dark_pre_positions() {
        let mut show = base_show();
        let mut gobo = Raw::new(RawId(1), "Gobo", BTreeMap::from([(6, 40)]));
        gobo.move_while_dark = true;
        show.add_raw(gobo);
        show.add_raw(Raw::new(RawId(2), "Strobe", BTreeMap::from([(7, 255)])));

        let mut list = Cuelist::new(CuelistId(1), "Main", 0);
        list.move_while_dark = true;
        list.add_cue(Cue::new(CueId(1), "Dark", 0.0).with_group(
            GroupId(1),
            CueGroupEntry::default().with_intensity(IntensityId(3)),
        ));
        list.add_cue(Cue::new(CueId(2), "Nothing", 0.0));
        list.add_cue(
            Cue::new(CueId(3), "Reveal", 0.0).with_group(
                GroupId(2),
                CueGroupEntry::default()
                    .with_intensity(IntensityId(1))
                    .with_position(PositionId(1))
                    .with_color(ColorId(2))
                    .with_raw(RawId(1))
                    .with_raw(RawId(2)),
            ),
        );
        list.go().unwrap();
        show.add_cuelist(list);

        let frame = compose(&show);
        let first = &frame[&FixtureId(1)];
        assert_eq!(first.dimmer, Some(0.0));
        assert_relative_eq!(first.position.unwrap().pan, 45.0);
        assert_relative_eq!(first.color.unwrap().blue, 100.0);
        assert_eq!(first.raw.get(&6).map(|r| r.resolve(0)), Some(40));
        assert!(!first.raw.contains_key(&7));

        // Not named by the later cue, left alone
        assert!(frame[&FixtureId(2)].position.is_none());

        show.cuelist_mut(CuelistId(1)).unwrap().move_while_dark = false;
        assert!(compose(&show)[&FixtureId(1)].position.is_none());
    }
}
