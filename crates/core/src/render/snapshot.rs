use std::collections::HashSet;

use crate::cue::cue::{Cue, Cuelist};
use crate::show::show::{CuelistId, EffectId, GroupId, Show};

/// A read-only view of the show for one tick.
///
/// Built once while the show lock is held; every stage of the tick reads through it, so nothing
/// can change between compositing and channel mapping. Cuelists come pre-sorted in merge order
/// (ascending priority, then id) so the result never depends on storage order.
pub struct RenderSnapshot<'a> {
    pub show: &'a Show,
    cuelists: Vec<&'a Cuelist>,
}

impl<'a> RenderSnapshot<'a> {
    pub fn capture(show: &'a Show) -> Self {
        let mut cuelists: Vec<&Cuelist> = show.cuelists.values().collect();
        cuelists.sort_by_key(|list| (list.priority, list.id));
        Self { show, cuelists }
    }

    /// Cuelists in merge order, lowest priority first.
    pub fn cuelists(&self) -> &[&'a Cuelist] {
        &self.cuelists
    }

    /// Every (group, effect) pair referenced by a current cue, or by a previous cue of a
    /// cuelist that is still fading.
    pub fn active_effects(
        &self,
        is_fading: impl Fn(CuelistId) -> bool,
    ) -> HashSet<(GroupId, EffectId)> {
        let mut active = HashSet::new();
        for list in &self.cuelists {
            let mut cues: Vec<&Cue> = list.active_cue().into_iter().collect();
            if is_fading(list.id) {
                cues.extend(list.previous());
            }
            for cue in cues {
                active.extend(cue.effect_refs());
            }
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::cue::{CueGroupEntry, Cuelist};
    use crate::show::show::CueId;

    #[test]
    fn test_cuelists_sorted_by_priority_then_id() {
        let mut show = Show::new("Test");
        show.add_cuelist(Cuelist::new(CuelistId(1), "High", 10));
        show.add_cuelist(Cuelist::new(CuelistId(2), "Low", -5));
        show.add_cuelist(Cuelist::new(CuelistId(3), "Tie", 10));

        let snapshot = RenderSnapshot::capture(&show);
        let order: Vec<_> = snapshot.cuelists().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![CuelistId(2), CuelistId(1), CuelistId(3)]);
    }

    #[test]
    fn test_active_effects_include_fading_previous() {
        let mut list = Cuelist::new(CuelistId(1), "Main", 0);
        list.add_cue(Cue::new(CueId(1), "One", 0.0).with_group(
            GroupId(1),
            CueGroupEntry::default().with_effect(EffectId(7)),
        ));
        list.add_cue(Cue::new(CueId(2), "Two", 0.0).with_group(
            GroupId(2),
            CueGroupEntry::default().with_effect(EffectId(8)),
        ));
        list.go().unwrap();
        list.go().unwrap();

        let mut show = Show::new("Test");
        show.add_cuelist(list);
        let snapshot = RenderSnapshot::capture(&show);

        let idle = snapshot.active_effects(|_| false);
        assert_eq!(idle, HashSet::from([(GroupId(2), EffectId(8))]));

        let fading = snapshot.active_effects(|_| true);
        assert_eq!(fading.len(), 2);
    }
}
