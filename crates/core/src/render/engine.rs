use crate::effect::effect::EffectClocks;
use crate::output::mapper::{ChannelMapper, PreviewRecord, UniverseBuffers};
use crate::render::compositor::Compositor;
use crate::render::fade::FadeController;
use crate::render::snapshot::RenderSnapshot;
use crate::render::state::FixtureStates;
use crate::show::show::{CuelistId, Show};

/// Everything one tick produced.
#[derive(Clone, Debug, Default)]
pub struct RenderedFrame {
    pub universes: UniverseBuffers,
    pub preview: Vec<PreviewRecord>,
    pub fixtures: FixtureStates,
}

/// The per-tick pipeline: fades, effect clocks, compositing and channel mapping.
///
/// Holds all state that has to survive from one tick to the next; the show itself is only
/// borrowed for the duration of `render`.
pub struct RenderEngine {
    fades: FadeController,
    clocks: EffectClocks,
    mapper: ChannelMapper,
    frames: u64,
}

impl RenderEngine {
    pub fn new(tick_rate: f64) -> Self {
        Self {
            fades: FadeController::new(tick_rate),
            clocks: EffectClocks::new(),
            mapper: ChannelMapper::new(),
            frames: 0,
        }
    }

    pub fn tick_rate(&self) -> f64 {
        self.fades.tick_rate()
    }

    pub fn set_tick_rate(&mut self, tick_rate: f64) {
        self.fades.set_tick_rate(tick_rate);
    }

    pub fn fades(&self) -> &FadeController {
        &self.fades
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn skip_fade(&mut self, cuelist: CuelistId) {
        self.fades.skip(cuelist);
    }

    pub fn render(&mut self, show: &Show) -> RenderedFrame {
        let snapshot = RenderSnapshot::capture(show);
        self.fades.observe(&snapshot);

        let active = snapshot.active_effects(|id| self.fades.is_fading(id));
        self.clocks.advance(&active);

        let fixtures = Compositor::new(&snapshot, &self.clocks, self.fades.tick_rate())
            .compose(&self.fades);
        let mapped = self.mapper.map(show, &fixtures);

        self.fades.complete_tick();
        self.frames += 1;

        RenderedFrame {
            universes: mapped.universes,
            preview: mapped.preview,
            fixtures,
        }
    }
}
