use prism_core::{
    Color, ColorId, Cue, CueGroupEntry, CueId, Cuelist, CuelistId, Effect, EffectId, EffectStep,
    Group, GroupId, Intensity, IntensityId, Position, PositionId, PositionValue, Show,
};
use prism_fixtures::{Fixture, FixtureId, ModelId, ModelLibrary};

const PARS: GroupId = GroupId(1);
const SPOTS: GroupId = GroupId(2);
const HOUSE: GroupId = GroupId(3);

const FULL: IntensityId = IntensityId(1);
const HALF: IntensityId = IntensityId(2);
const OFF: IntensityId = IntensityId(3);

const RED: ColorId = ColorId(1);
const BLUE: ColorId = ColorId(2);
const AMBER: ColorId = ColorId(3);
const WHITE: ColorId = ColorId(4);

const STAGE: PositionId = PositionId(1);
const AUDIENCE: PositionId = PositionId(2);

const CHASE: EffectId = EffectId(1);

/// A small rig to run without a show file: two PARs, two spots and a house dimmer.
pub fn demo_show() -> Result<Show, anyhow::Error> {
    let library = ModelLibrary::new();
    let mut show = Show::new("Demo");

    for (id, key) in [(1, "rgbw-par"), (2, "led-spot-60w"), (3, "dimmer")] {
        let model = library
            .instantiate(key, ModelId(id))
            .ok_or_else(|| anyhow::anyhow!("Model {} missing from library", key))?;
        show.add_model(model);
    }

    // patch fixtures
    for (id, name, model, address) in [
        (1, "Left PAR", 1, 1),
        (2, "Right PAR", 1, 8),
        (3, "Left Spot", 2, 18),
        (4, "Right Spot", 2, 28),
        (5, "House", 3, 40),
    ] {
        let mut fixture = Fixture::new(FixtureId(id), name, Some(ModelId(model)));
        fixture.patch(1, address)?;
        show.add_fixture(fixture);
    }
    // Hung facing upstage
    if let Some(fixture) = show.fixtures.get_mut(&FixtureId(4)) {
        fixture.rotation = 180.0;
    }

    show.add_group(Group::new(PARS, "PARs", vec![FixtureId(1), FixtureId(2)]));
    show.add_group(Group::new(SPOTS, "Spots", vec![FixtureId(3), FixtureId(4)]));
    show.add_group(Group::new(HOUSE, "House", vec![FixtureId(5)]));

    show.add_intensity(Intensity::new(FULL, "Full", 100.0));
    show.add_intensity(Intensity::new(HALF, "Half", 50.0));
    show.add_intensity(Intensity::new(OFF, "Off", 0.0));

    show.add_color(Color::new(RED, "Red", 0.0, 100.0));
    show.add_color(Color::new(BLUE, "Blue", 240.0, 100.0));
    show.add_color(Color::new(AMBER, "Amber", 30.0, 100.0));
    show.add_color(Color::new(WHITE, "White", 0.0, 0.0).with_quality(100.0));

    show.add_position(Position::new(
        STAGE,
        "Stage",
        PositionValue {
            tilt: 30.0,
            ..Default::default()
        },
    ));
    show.add_position(Position::new(
        AUDIENCE,
        "Audience",
        PositionValue {
            pan: 180.0,
            tilt: 60.0,
            ..Default::default()
        },
    ));

    let mut chase = Effect::new(CHASE, "PAR Chase", 0.5, 0.25)
        .with_step(EffectStep {
            intensity: Some(FULL),
            ..Default::default()
        })
        .with_step(EffectStep {
            intensity: Some(OFF),
            ..Default::default()
        });
    chase.spread_phase(&[FixtureId(1), FixtureId(2)]);
    show.add_effect(chase);

    let mut main = Cuelist::new(CuelistId(1), "Main", 0);
    main.move_while_dark = true;
    main.add_cue(
        Cue::new(CueId(1), "Preset", 0.0)
            .with_group(HOUSE, CueGroupEntry::default().with_intensity(FULL)),
    );
    main.add_cue(
        Cue::new(CueId(2), "Warm", 3.0)
            .with_group(PARS, CueGroupEntry::default().with_intensity(FULL).with_color(AMBER))
            .with_group(
                SPOTS,
                CueGroupEntry::default()
                    .with_intensity(HALF)
                    .with_color(WHITE)
                    .with_position(STAGE),
            )
            .with_group(HOUSE, CueGroupEntry::default().with_intensity(HALF)),
    );
    main.add_cue(
        Cue::new(CueId(3), "Blue", 5.0)
            .with_group(PARS, CueGroupEntry::default().with_intensity(FULL).with_color(BLUE))
            .with_group(
                SPOTS,
                CueGroupEntry::default()
                    .with_intensity(FULL)
                    .with_color(BLUE)
                    .with_position(AUDIENCE),
            ),
    );
    main.add_cue(
        Cue::new(CueId(4), "Chase", 2.0).with_group(
            PARS,
            CueGroupEntry::default()
                .with_intensity(FULL)
                .with_color(RED)
                .with_effect(CHASE),
        ),
    );
    main.add_cue(Cue::new(CueId(5), "Blackout", 3.0));
    show.add_cuelist(main);

    let mut specials = Cuelist::new(CuelistId(2), "Specials", 10);
    specials.add_cue(
        Cue::new(CueId(1), "Spots on stage", 1.0).with_group(
            SPOTS,
            CueGroupEntry::default()
                .with_intensity(FULL)
                .with_color(WHITE)
                .with_position(STAGE),
        ),
    );
    show.add_cuelist(specials);

    Ok(show)
}
