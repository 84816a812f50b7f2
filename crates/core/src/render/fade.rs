use std::collections::HashMap;

use crate::render::snapshot::RenderSnapshot;
use crate::show::show::{CueId, CuelistId};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FadePhase {
    Idle,
    Fading { remaining: u32, total: u32 },
}

#[derive(Clone, Copy, Debug)]
struct CuelistFade {
    observed: Option<CueId>,
    phase: FadePhase,
    /// Set by a skip; covers a pointer change the next `observe` has yet to see.
    skip_pending: bool,
}

/// Crossfade timers, one per cuelist.
///
/// A fade starts whenever a cuelist's current cue differs from the one seen last tick, however
/// it got there (go, back, jump or release). Counters persist across ticks and are only
/// touched by `observe`, `complete_tick` and `skip`.
pub struct FadeController {
    tick_rate: f64,
    fades: HashMap<CuelistId, CuelistFade>,
}

impl FadeController {
    pub fn new(tick_rate: f64) -> Self {
        Self {
            tick_rate,
            fades: HashMap::new(),
        }
    }

    pub fn tick_rate(&self) -> f64 {
        self.tick_rate
    }

    /// Only affects fades started after the change.
    pub fn set_tick_rate(&mut self, tick_rate: f64) {
        self.tick_rate = tick_rate;
    }

    /// Start fades for cuelists whose current cue moved and forget deleted cuelists.
    pub fn observe(&mut self, snapshot: &RenderSnapshot) {
        self.fades
            .retain(|id, _| snapshot.show.cuelists.contains_key(id));

        for list in snapshot.cuelists() {
            let fade = self.fades.entry(list.id).or_insert(CuelistFade {
                observed: None,
                phase: FadePhase::Idle,
                skip_pending: false,
            });
            let skipped = std::mem::take(&mut fade.skip_pending);
            if fade.observed == list.current_cue {
                continue;
            }

            fade.observed = list.current_cue;
            // Releasing fades out over the time of the cue being left
            let fade_seconds = list
                .active_cue()
                .or_else(|| list.previous())
                .map_or(0.0, |cue| cue.fade_seconds);
            let total = (fade_seconds.max(0.0) * self.tick_rate).round() as u32;

            fade.phase = if total == 0 || skipped {
                FadePhase::Idle
            } else {
                log::debug!(
                    "Cuelist {} fading to cue {:?} over {} frames",
                    list.id,
                    list.current_cue,
                    total
                );
                FadePhase::Fading {
                    remaining: total,
                    total,
                }
            };
        }
    }

    pub fn phase(&self, cuelist: CuelistId) -> FadePhase {
        self.fades
            .get(&cuelist)
            .map_or(FadePhase::Idle, |fade| fade.phase)
    }

    pub fn is_fading(&self, cuelist: CuelistId) -> bool {
        matches!(self.phase(cuelist), FadePhase::Fading { .. })
    }

    /// Share of the previous cue in the output, `remaining / total`, or `None` when idle.
    pub fn blend(&self, cuelist: CuelistId) -> Option<f64> {
        match self.phase(cuelist) {
            FadePhase::Fading { remaining, total } if total > 0 => {
                Some(remaining as f64 / total as f64)
            }
            _ => None,
        }
    }

    /// Count every running fade down by one frame.
    pub fn complete_tick(&mut self) {
        for fade in self.fades.values_mut() {
            if let FadePhase::Fading { remaining, total } = fade.phase {
                fade.phase = if remaining <= 1 {
                    FadePhase::Idle
                } else {
                    FadePhase::Fading {
                        remaining: remaining - 1,
                        total,
                    }
                };
            }
        }
    }

    /// Jump a running fade straight to its end. A cue change made since the last `observe`
    /// is covered too, so `go` followed by a skip before the next tick snaps the cue in.
    pub fn skip(&mut self, cuelist: CuelistId) {
        let fade = self.fades.entry(cuelist).or_insert(CuelistFade {
            observed: None,
            phase: FadePhase::Idle,
            skip_pending: false,
        });
        fade.phase = FadePhase::Idle;
        fade.skip_pending = true;
    }

    /// Force a specific fade position.
    pub fn set_phase(&mut self, cuelist: CuelistId, phase: FadePhase) {
        if let Some(fade) = self.fades.get_mut(&cuelist) {
            fade.phase = phase;
        }
    }
}
