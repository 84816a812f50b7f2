use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::show::show::{ColorId, CueId, CuelistId, EffectId, GroupId, IntensityId, PositionId, RawId};

/// What a cue asks of one group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CueGroupEntry {
    #[serde(default)]
    pub intensity: Option<IntensityId>,
    #[serde(default)]
    pub color: Option<ColorId>,
    #[serde(default)]
    pub position: Option<PositionId>,
    #[serde(default)]
    pub raws: Vec<RawId>,
    #[serde(default)]
    pub effects: Vec<EffectId>,
}

impl CueGroupEntry {
    pub fn with_intensity(mut self, intensity: IntensityId) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_color(mut self, color: ColorId) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_position(mut self, position: PositionId) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_raw(mut self, raw: RawId) -> Self {
        self.raws.push(raw);
        self
    }

    pub fn with_effect(mut self, effect: EffectId) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub id: CueId,
    pub name: String,
    /// Crossfade time in seconds when this cue becomes current.
    pub fade_seconds: f64,
    #[serde(default)]
    pub groups: BTreeMap<GroupId, CueGroupEntry>,
}

impl Cue {
    pub fn new(id: CueId, name: &str, fade_seconds: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            fade_seconds,
            groups: BTreeMap::new(),
        }
    }

    pub fn with_group(mut self, group: GroupId, entry: CueGroupEntry) -> Self {
        self.groups.insert(group, entry);
        self
    }

    pub fn effect_refs(&self) -> impl Iterator<Item = (GroupId, EffectId)> + '_ {
        self.groups
            .iter()
            .flat_map(|(group, entry)| entry.effects.iter().map(move |effect| (*group, *effect)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("cuelist has no cues")]
    NoCues,
    #[error("no next cue")]
    NoNextCue,
    #[error("already at first cue")]
    AtFirstCue,
    #[error("no active cue")]
    NotActive,
    #[error("unknown cue {0}")]
    UnknownCue(CueId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cuelist {
    pub id: CuelistId,
    pub name: String,
    /// Higher priority wins where cuelists target the same fixture.
    pub priority: i32,
    /// Pre-position dark fixtures from later cues.
    #[serde(default)]
    pub move_while_dark: bool,
    #[serde(default)]
    pub cues: BTreeMap<CueId, Cue>,
    #[serde(default)]
    pub current_cue: Option<CueId>,
    #[serde(default)]
    pub previous_cue: Option<CueId>,
}

impl Cuelist {
    pub fn new(id: CuelistId, name: &str, priority: i32) -> Self {
        Self {
            id,
            name: name.to_string(),
            priority,
            move_while_dark: false,
            cues: BTreeMap::new(),
            current_cue: None,
            previous_cue: None,
        }
    }

    pub fn add_cue(&mut self, cue: Cue) -> CueId {
        let id = cue.id;
        self.cues.insert(id, cue);
        id
    }

    pub fn active_cue(&self) -> Option<&Cue> {
        self.current_cue.and_then(|id| self.cues.get(&id))
    }

    pub fn previous(&self) -> Option<&Cue> {
        self.previous_cue.and_then(|id| self.cues.get(&id))
    }

    /// Cues after `cue` in playback order.
    pub fn cues_after(&self, cue: CueId) -> impl Iterator<Item = &Cue> {
        use std::ops::Bound;

        self.cues
            .range((Bound::Excluded(cue), Bound::Unbounded))
            .map(|(_, cue)| cue)
    }

    /// Advance to the next cue, or start at the first one when nothing is active.
    pub fn go(&mut self) -> Result<&Cue, PlaybackError> {
        let next = match self.current_cue {
            Some(current) => self
                .cues_after(current)
                .next()
                .map(|cue| cue.id)
                .ok_or(PlaybackError::NoNextCue)?,
            None => *self.cues.keys().next().ok_or(PlaybackError::NoCues)?,
        };
        self.set_current(Some(next));
        self.active_cue().ok_or(PlaybackError::NotActive)
    }

    pub fn back(&mut self) -> Result<&Cue, PlaybackError> {
        let current = self.current_cue.ok_or(PlaybackError::NotActive)?;
        let previous = self
            .cues
            .range(..current)
            .next_back()
            .map(|(id, _)| *id)
            .ok_or(PlaybackError::AtFirstCue)?;
        self.set_current(Some(previous));
        self.active_cue().ok_or(PlaybackError::NotActive)
    }

    pub fn go_to(&mut self, cue: CueId) -> Result<&Cue, PlaybackError> {
        if !self.cues.contains_key(&cue) {
            return Err(PlaybackError::UnknownCue(cue));
        }
        self.set_current(Some(cue));
        self.active_cue().ok_or(PlaybackError::NotActive)
    }

    /// Stop the cuelist. Its last cue fades out over that cue's fade time.
    pub fn release(&mut self) -> Result<(), PlaybackError> {
        if self.current_cue.is_none() {
            return Err(PlaybackError::NotActive);
        }
        self.set_current(None);
        Ok(())
    }

    fn set_current(&mut self, cue: Option<CueId>) {
        self.previous_cue = self.current_cue;
        self.current_cue = cue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cuelist() -> Cuelist {
        let mut list = Cuelist::new(CuelistId(1), "Main", 0);
        list.add_cue(Cue::new(CueId(10), "Ten", 1.0));
        list.add_cue(Cue::new(CueId(20), "Twenty", 1.0));
        list.add_cue(Cue::new(CueId(30), "Thirty", 1.0));
        list
    }

    #[test]
    fn test_go_walks_cues_in_id_order() {
        let mut list = cuelist();
        assert_eq!(list.go().unwrap().id, CueId(10));
        assert_eq!(list.go().unwrap().id, CueId(20));
        assert_eq!(list.previous_cue, Some(CueId(10)));
        assert_eq!(list.go().unwrap().id, CueId(30));
        assert_eq!(list.go().unwrap_err(), PlaybackError::NoNextCue);
        assert_eq!(list.current_cue, Some(CueId(30)));
    }

    #[test]
    fn test_back_and_jump() {
        let mut list = cuelist();
        assert_eq!(list.back().unwrap_err(), PlaybackError::NotActive);

        list.go_to(CueId(30)).unwrap();
        assert_eq!(list.back().unwrap().id, CueId(20));
        assert_eq!(list.previous_cue, Some(CueId(30)));

        list.go_to(CueId(10)).unwrap();
        assert_eq!(list.back().unwrap_err(), PlaybackError::AtFirstCue);
        assert_eq!(
            list.go_to(CueId(15)).unwrap_err(),
            PlaybackError::UnknownCue(CueId(15))
        );
    }

    #[test]
    fn test_release_keeps_previous() {
        let mut list = cuelist();
        assert_eq!(list.release().unwrap_err(), PlaybackError::NotActive);
        list.go().unwrap();
        list.release().unwrap();
        assert_eq!(list.current_cue, None);
        assert_eq!(list.previous_cue, Some(CueId(10)));
        assert!(list.active_cue().is_none());
    }

    #[test]
    fn test_empty_cuelist() {
        let mut list = Cuelist::new(CuelistId(2), "Empty", 0);
        assert_eq!(list.go().unwrap_err(), PlaybackError::NoCues);
    }

    #[test]
    fn test_cues_after() {
        let list = cuelist();
        let after: Vec<_> = list.cues_after(CueId(10)).map(|c| c.id).collect();
        assert_eq!(after, vec![CueId(20), CueId(30)]);
    }
}
