use std::collections::{BTreeMap, HashMap, HashSet};

use prism_fixtures::FixtureId;
use serde::{Deserialize, Serialize};

use crate::show::show::{ColorId, EffectId, GroupId, IntensityId, PositionId, RawId};

/// One step of a chase. Unset attributes leave the cue's own values alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectStep {
    #[serde(default)]
    pub intensity: Option<IntensityId>,
    #[serde(default)]
    pub color: Option<ColorId>,
    #[serde(default)]
    pub position: Option<PositionId>,
    #[serde(default)]
    pub raw: Option<RawId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub id: EffectId,
    pub name: String,
    pub steps: Vec<EffectStep>,
    /// Seconds each step is held before fading.
    pub step_hold: f64,
    /// Seconds spent fading into the following step.
    pub step_fade: f64,
    /// Per-fixture phase shift in degrees of one full cycle.
    #[serde(default)]
    pub phase_offsets: BTreeMap<FixtureId, f64>,
}

/// Where on the step sequence a fixture is for a given frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepPosition {
    pub step: usize,
    pub next: usize,
    /// 0.0 while holding, rising to 1.0 at the end of the step fade.
    pub progress: f64,
}

impl Effect {
    pub fn new(id: EffectId, name: &str, step_hold: f64, step_fade: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            steps: Vec::new(),
            step_hold,
            step_fade,
            phase_offsets: BTreeMap::new(),
        }
    }

    pub fn with_step(mut self, step: EffectStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Spread phase offsets evenly over the given fixtures, in order.
    pub fn spread_phase(&mut self, fixtures: &[FixtureId]) {
        let count = fixtures.len().max(1) as f64;
        for (idx, fixture) in fixtures.iter().enumerate() {
            self.phase_offsets
                .insert(*fixture, idx as f64 * 360.0 / count);
        }
    }

    fn step_frames(&self, tick_rate: f64) -> (u64, u64) {
        let hold = (self.step_hold.max(0.0) * tick_rate).round() as u64;
        let fade = (self.step_fade.max(0.0) * tick_rate).round() as u64;
        (hold, fade)
    }

    /// Length of one full cycle in frames.
    pub fn total_frames(&self, tick_rate: f64) -> u64 {
        let (hold, fade) = self.step_frames(tick_rate);
        (hold + fade).max(1) * self.steps.len() as u64
    }

    pub fn position_at(&self, frame: u64, fixture: FixtureId, tick_rate: f64) -> Option<StepPosition> {
        if self.steps.is_empty() {
            return None;
        }

        let (hold, fade) = self.step_frames(tick_rate);
        let step_len = (hold + fade).max(1);
        let total = self.total_frames(tick_rate);

        let phase = self
            .phase_offsets
            .get(&fixture)
            .copied()
            .unwrap_or(0.0)
            .rem_euclid(360.0);
        let offset = (phase / 360.0 * total as f64).round() as u64;

        let t = (frame + offset) % total;
        let step = (t / step_len) as usize;
        let within = t % step_len;

        let progress = if fade == 0 || within < hold {
            0.0
        } else {
            (within - hold + 1) as f64 / fade as f64
        };

        Some(StepPosition {
            step,
            next: (step + 1) % self.steps.len(),
            progress,
        })
    }
}

/// Frame counters of effects that are running somewhere.
///
/// A counter exists for a (group, effect) pair while any active cue on any cuelist references
/// it. It starts at frame 0 the tick the pair first shows up and is dropped the first tick
/// nothing references it any more.
#[derive(Debug, Default)]
pub struct EffectClocks {
    frames: HashMap<(GroupId, EffectId), u64>,
}

impl EffectClocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, active: &HashSet<(GroupId, EffectId)>) {
        self.frames.retain(|key, _| active.contains(key));
        for key in active {
            self.frames
                .entry(*key)
                .and_modify(|frame| *frame += 1)
                .or_insert(0);
        }
    }

    pub fn frame(&self, group: GroupId, effect: EffectId) -> u64 {
        self.frames.get(&(group, effect)).copied().unwrap_or(0)
    }

    pub fn is_running(&self, group: GroupId, effect: EffectId) -> bool {
        self.frames.contains_key(&(group, effect))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
