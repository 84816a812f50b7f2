use std::collections::BTreeMap;

use prism_fixtures::{Fixture, FixtureError, FixtureId, Model, ModelId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cue::cue::{Cuelist, PlaybackError};
use crate::effect::effect::Effect;
use crate::preset::preset::{Color, Intensity, Position, Raw};

macro_rules! show_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
                Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub u32);

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

show_id!(
    GroupId,
    IntensityId,
    ColorId,
    PositionId,
    RawId,
    EffectId,
    CuelistId,
    /// Cues sort by id inside their cuelist.
    CueId,
);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub fixtures: Vec<FixtureId>,
}

impl Group {
    pub fn new(id: GroupId, name: &str, fixtures: Vec<FixtureId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            fixtures,
        }
    }
}

#[derive(Debug, Error)]
pub enum ShowError {
    #[error("unknown fixture {0}")]
    UnknownFixture(FixtureId),
    #[error("unknown model {0}")]
    UnknownModel(ModelId),
    #[error("unknown cuelist {0}")]
    UnknownCuelist(CuelistId),
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// The show database. Every cross reference is an id handle resolved through these tables, so
/// deleting an entity never leaves a dangling pointer behind: lookups of missing ids just
/// come back empty.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Show {
    pub name: String,
    pub version: String, // Schema version for future compatibility
    #[serde(default)]
    pub fixtures: BTreeMap<FixtureId, Fixture>,
    #[serde(default)]
    pub models: BTreeMap<ModelId, Model>,
    #[serde(default)]
    pub groups: BTreeMap<GroupId, Group>,
    #[serde(default)]
    pub intensities: BTreeMap<IntensityId, Intensity>,
    #[serde(default)]
    pub colors: BTreeMap<ColorId, Color>,
    #[serde(default)]
    pub positions: BTreeMap<PositionId, Position>,
    #[serde(default)]
    pub raws: BTreeMap<RawId, Raw>,
    #[serde(default)]
    pub effects: BTreeMap<EffectId, Effect>,
    #[serde(default)]
    pub cuelists: BTreeMap<CuelistId, Cuelist>,
}

impl Show {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        }
    }

    pub fn add_model(&mut self, model: Model) -> ModelId {
        let id = model.id;
        self.models.insert(id, model);
        id
    }

    pub fn add_fixture(&mut self, fixture: Fixture) -> FixtureId {
        let id = fixture.id;
        self.fixtures.insert(id, fixture);
        id
    }

    pub fn add_group(&mut self, group: Group) -> GroupId {
        let id = group.id;
        self.groups.insert(id, group);
        id
    }

    pub fn add_intensity(&mut self, intensity: Intensity) -> IntensityId {
        let id = intensity.id;
        self.intensities.insert(id, intensity);
        id
    }

    pub fn add_color(&mut self, color: Color) -> ColorId {
        let id = color.id;
        self.colors.insert(id, color);
        id
    }

    pub fn add_position(&mut self, position: Position) -> PositionId {
        let id = position.id;
        self.positions.insert(id, position);
        id
    }

    pub fn add_raw(&mut self, raw: Raw) -> RawId {
        let id = raw.id;
        self.raws.insert(id, raw);
        id
    }

    pub fn add_effect(&mut self, effect: Effect) -> EffectId {
        let id = effect.id;
        self.effects.insert(id, effect);
        id
    }

    pub fn add_cuelist(&mut self, cuelist: Cuelist) -> CuelistId {
        let id = cuelist.id;
        self.cuelists.insert(id, cuelist);
        id
    }

    /// Set a model's channel string. Invalid function codes are rejected here, at entry time,
    /// and the model keeps its previous layout.
    pub fn set_model_channels(&mut self, model: ModelId, channels: &str) -> Result<(), ShowError> {
        let model = self
            .models
            .get_mut(&model)
            .ok_or(ShowError::UnknownModel(model))?;
        model.set_channels(channels)?;
        Ok(())
    }

    pub fn patch_fixture(
        &mut self,
        fixture: FixtureId,
        universe: u16,
        address: u16,
    ) -> Result<(), ShowError> {
        let fixture = self
            .fixtures
            .get_mut(&fixture)
            .ok_or(ShowError::UnknownFixture(fixture))?;
        fixture.patch(universe, address)?;
        Ok(())
    }

    pub fn fixture_model(&self, fixture: &Fixture) -> Option<&Model> {
        fixture.model.and_then(|id| self.models.get(&id))
    }

    /// Fixtures of a group that still exist.
    pub fn group_fixtures(&self, group: GroupId) -> impl Iterator<Item = &Fixture> {
        self.groups
            .get(&group)
            .into_iter()
            .flat_map(|g| g.fixtures.iter())
            .filter_map(|id| self.fixtures.get(id))
    }

    pub fn cuelist(&self, id: CuelistId) -> Result<&Cuelist, ShowError> {
        self.cuelists.get(&id).ok_or(ShowError::UnknownCuelist(id))
    }

    pub fn cuelist_mut(&mut self, id: CuelistId) -> Result<&mut Cuelist, ShowError> {
        self.cuelists
            .get_mut(&id)
            .ok_or(ShowError::UnknownCuelist(id))
    }
}
