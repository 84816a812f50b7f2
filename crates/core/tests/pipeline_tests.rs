use std::collections::BTreeMap;

use approx::assert_relative_eq;
use prism_core::output::sacn::{HEADER_LEN, PACKET_LEN};
use prism_core::{
    Color, ColorId, Cue, CueGroupEntry, CueId, Cuelist, CuelistId, Group, GroupId, Intensity,
    IntensityId, Position, PositionId, PositionValue, Raw, RawId, RenderEngine, SacnPacket, Show,
};
use prism_fixtures::{ChannelLayout, Fixture, FixtureId, Model, ModelId};

const TICK_RATE: f64 = 10.0;

fn show_with(channels: &str, address: u16) -> Show {
    let mut show = Show::new("Pipeline");
    show.add_model(Model::new(
        ModelId(1),
        "Test",
        ChannelLayout::parse(channels).unwrap(),
    ));
    let mut fixture = Fixture::new(FixtureId(1), "Test", Some(ModelId(1)));
    fixture.patch(1, address).unwrap();
    show.add_fixture(fixture);
    show.add_group(Group::new(GroupId(1), "All", vec![FixtureId(1)]));

    show.add_intensity(Intensity::new(IntensityId(1), "Full", 100.0));
    show.add_intensity(Intensity::new(IntensityId(2), "Low", 20.0));
    show.add_intensity(Intensity::new(IntensityId(3), "High", 80.0));
    show.add_color(Color::new(ColorId(1), "Red", 0.0, 100.0));
    show.add_color(Color::new(ColorId(2), "Blue", 240.0, 100.0));
    show
}

fn full(color: ColorId) -> CueGroupEntry {
    CueGroupEntry::default()
        .with_intensity(IntensityId(1))
        .with_color(color)
}

fn playing(id: u32, priority: i32, cue: Cue) -> Cuelist {
    let mut list = Cuelist::new(CuelistId(id), "List", priority);
    list.add_cue(cue);
    list.go().unwrap();
    list
}

#[test]
fn rgb_fixture_at_address_one_outputs_red() {
    let mut show = show_with("RGB", 1);
    show.add_cuelist(playing(
        1,
        0,
        Cue::new(CueId(1), "Red", 0.0).with_group(GroupId(1), full(ColorId(1))),
    ));

    let frame = RenderEngine::new(TICK_RATE).render(&show);
    let universe = frame.universes.get(1).unwrap();
    assert_eq!(&universe[0..3], &[255, 0, 0]);
    assert!(universe[3..].iter().all(|b| *b == 0));
}

#[test]
fn unpatched_fixture_writes_no_bytes() {
    let mut show = show_with("DRGB", 0);
    show.add_cuelist(playing(
        1,
        0,
        Cue::new(CueId(1), "Red", 0.0).with_group(GroupId(1), full(ColorId(1))),
    ));

    let frame = RenderEngine::new(TICK_RATE).render(&show);
    assert!(frame
        .universes
        .iter()
        .all(|(_, data)| data.iter().all(|b| *b == 0)));
    // Still shows up for the visualizer
    assert_eq!(frame.preview.len(), 1);
    assert_relative_eq!(frame.preview[0].red, 1.0);
}

#[test]
fn priority_merge_does_not_depend_on_cuelist_order() {
    let mut results = Vec::new();
    for (low_id, high_id) in [(1, 2), (2, 1)] {
        let mut show = show_with("DRGB", 1);
        show.add_cuelist(playing(
            low_id,
            1,
            Cue::new(CueId(1), "Red", 0.0).with_group(GroupId(1), full(ColorId(1))),
        ));
        show.add_cuelist(playing(
            high_id,
            5,
            Cue::new(CueId(1), "Blue", 0.0).with_group(
                GroupId(1),
                CueGroupEntry::default().with_color(ColorId(2)),
            ),
        ));

        let frame = RenderEngine::new(TICK_RATE).render(&show);
        results.push(frame.universes.get(1).unwrap()[0..4].to_vec());
    }

    assert_eq!(results[0], vec![255, 0, 0, 255]);
    assert_eq!(results[0], results[1]);
}

#[test]
fn crossfade_midpoint_is_the_mean() {
    let mut show = show_with("D", 1);
    let mut list = Cuelist::new(CuelistId(1), "Main", 0);
    list.add_cue(Cue::new(CueId(1), "Low", 0.0).with_group(
        GroupId(1),
        CueGroupEntry::default().with_intensity(IntensityId(2)),
    ));
    list.add_cue(Cue::new(CueId(2), "High", 1.0).with_group(
        GroupId(1),
        CueGroupEntry::default().with_intensity(IntensityId(3)),
    ));
    list.go().unwrap();
    show.add_cuelist(list);

    let mut engine = RenderEngine::new(TICK_RATE);
    let frame = engine.render(&show);
    assert_relative_eq!(frame.fixtures[&FixtureId(1)].dimmer.unwrap(), 20.0);

    show.cuelist_mut(CuelistId(1)).unwrap().go().unwrap();
    let levels: Vec<f64> = (0..11)
        .map(|_| engine.render(&show).fixtures[&FixtureId(1)].dimmer.unwrap())
        .collect();

    assert_relative_eq!(levels[0], 20.0);
    assert_relative_eq!(levels[5], 50.0);
    assert_relative_eq!(levels[10], 80.0);
}

#[test]
fn pan_crossfade_takes_the_short_way_round() {
    let mut show = show_with("DPT", 1);
    for (id, pan) in [(1, 350.0), (2, 10.0)] {
        show.add_position(Position::new(
            PositionId(id),
            "Pan",
            PositionValue {
                pan,
                ..Default::default()
            },
        ));
    }
    let mut list = Cuelist::new(CuelistId(1), "Main", 0);
    list.add_cue(Cue::new(CueId(1), "A", 0.0).with_group(
        GroupId(1),
        CueGroupEntry::default()
            .with_intensity(IntensityId(1))
            .with_position(PositionId(1)),
    ));
    list.add_cue(Cue::new(CueId(2), "B", 1.0).with_group(
        GroupId(1),
        CueGroupEntry::default()
            .with_intensity(IntensityId(1))
            .with_position(PositionId(2)),
    ));
    list.go().unwrap();
    show.add_cuelist(list);

    let mut engine = RenderEngine::new(TICK_RATE);
    engine.render(&show);
    show.cuelist_mut(CuelistId(1)).unwrap().go().unwrap();

    let pans: Vec<f64> = (0..6)
        .map(|_| {
            engine.render(&show).fixtures[&FixtureId(1)]
                .position
                .unwrap()
                .pan
        })
        .collect();

    let midpoint = pans[5].rem_euclid(360.0);
    assert!(midpoint < 1e-6 || midpoint > 360.0 - 1e-6, "pan {}", pans[5]);
    // Never swings back through the middle of the range
    assert!(pans.iter().all(|pan| (350.0 - 1e-6..=370.0 + 1e-6).contains(pan)));
}

#[test]
fn raw_channel_wins_over_mapped_value() {
    let mut show = show_with("DRGBW", 1);
    show.add_raw(Raw::new(RawId(1), "Five", BTreeMap::from([(4, 17)])));
    show.add_cuelist(playing(
        1,
        0,
        Cue::new(CueId(1), "Red", 0.0).with_group(
            GroupId(1),
            CueGroupEntry::default()
                .with_intensity(IntensityId(1))
                .with_color(ColorId(1))
                .with_raw(RawId(1)),
        ),
    ));

    let frame = RenderEngine::new(TICK_RATE).render(&show);
    assert_eq!(&frame.universes.get(1).unwrap()[0..5], &[255, 255, 0, 0, 17]);
}

#[test]
fn universe_one_packet_layout() {
    let mut show = show_with("RGB", 1);
    show.add_cuelist(playing(
        1,
        0,
        Cue::new(CueId(1), "Red", 0.0).with_group(GroupId(1), full(ColorId(1))),
    ));
    let frame = RenderEngine::new(TICK_RATE).render(&show);

    let mut packet = SacnPacket::new([7; 16], "Prism", 100);
    let bytes = packet.encode(1, 0, frame.universes.get(1).unwrap());

    assert_eq!(bytes.len(), PACKET_LEN);
    assert_eq!(&bytes[0..4], &[0x00, 0x10, 0x00, 0x00]);
    assert_eq!(&bytes[113..115], &[0x00, 0x01]);
    assert_eq!(&bytes[HEADER_LEN..HEADER_LEN + 3], &[255, 0, 0]);
}

#[test]
fn deleting_a_referenced_preset_is_harmless() {
    let mut show = show_with("DRGB", 1);
    show.add_cuelist(playing(
        1,
        0,
        Cue::new(CueId(1), "Red", 0.0).with_group(GroupId(1), full(ColorId(1))),
    ));
    let mut engine = RenderEngine::new(TICK_RATE);
    assert_eq!(engine.render(&show).universes.get(1).unwrap()[1], 255);

    show.colors.remove(&ColorId(1));
    show.groups.remove(&GroupId(1));
    let frame = engine.render(&show);
    assert!(frame.fixtures.is_empty());
    assert_eq!(frame.universes.get(1).unwrap()[0], 0);
}

#[test]
fn releasing_a_cuelist_eases_to_the_one_below() {
    let mut show = show_with("D", 1);
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
        Cue::new(CueId(1), "High", 0.0).with_group(
            GroupId(1),
            CueGroupEntry::default().with_intensity(IntensityId(3)),
        ),
    ));

    let mut engine = RenderEngine::new(TICK_RATE);
    engine.render(&show);
    engine.skip_fade(CuelistId(1));
    engine.render(&show);

    show.cuelist_mut(CuelistId(1)).unwrap().release().unwrap();
    let levels: Vec<u8> = (0..14)
        .map(|_| engine.render(&show).universes.get(1).unwrap()[0])
        .collect();

    assert_eq!(levels[0], 255);
    // 80 % of 255
    assert_eq!(levels[10], 204);
    assert_eq!(levels[13], 204);
    assert!(levels.windows(2).all(|w| w[0] >= w[1]));
    assert!(levels.iter().all(|level| *level >= 204));
}
