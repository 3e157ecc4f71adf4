use avian2d::{math::*, prelude::*};
use bevy::prelude::*;

use crate::game::ObjectKind;
use crate::settings::GameSettings;

pub struct SoundPlugin;

impl Plugin for SoundPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SoundCue>()
            .add_systems(FixedUpdate, detect_impacts)
            .add_systems(Update, play_cues);
    }
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Thump,
    Thump2,
    CannonFire,
    Boom,
    Tick,
    Win,
    Lose,
    Clang,
    Arr,
}

impl SoundCue {
    pub fn asset_path(self) -> &'static str {
        match self {
            SoundCue::Thump => "sounds/thump.ogg",
            SoundCue::Thump2 => "sounds/thump2.ogg",
            SoundCue::CannonFire => "sounds/cannonfire.ogg",
            SoundCue::Boom => "sounds/boom.ogg",
            SoundCue::Tick => "sounds/tick.ogg",
            SoundCue::Win => "sounds/win.ogg",
            SoundCue::Lose => "sounds/lose.ogg",
            SoundCue::Clang => "sounds/clang.ogg",
            SoundCue::Arr => "sounds/arr.ogg",
        }
    }

    /// The noise an object makes when it is hit hard.
    pub fn impact(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Ball | ObjectKind::Wheel => SoundCue::Thump,
            ObjectKind::Book | ObjectKind::CannonMount => SoundCue::Thump2,
            ObjectKind::CannonBarrel => SoundCue::Clang,
        }
    }
}

/// Velocity seen on the previous tick.
#[derive(Component, Default)]
pub struct PreviousVelocity(pub Vector);

/// Whether the change from `old` to `new` velocity counts as an impact.
pub fn is_impact(old: Vector, new: Vector, threshold: Scalar) -> bool {
    (old - new).length_squared() > threshold
}

/// Whether a body has an impulse waiting for the next physics step.
fn is_kicked(impulse: Option<&ExternalImpulse>) -> bool {
    impulse.is_some_and(|impulse| impulse.impulse() != Vector::ZERO)
}

type ImpactQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static ObjectKind,
        &'static LinearVelocity,
        Option<&'static ExternalImpulse>,
        Option<&'static mut PreviousVelocity>,
    ),
>;

fn detect_impacts(
    mut commands: Commands,
    settings: Res<GameSettings>,
    mut bodies: ImpactQuery,
    mut cues: EventWriter<SoundCue>,
) {
    for (entity, kind, velocity, impulse, previous) in &mut bodies {
        // A launch or recoil is not a collision. Start over once it has
        // been applied.
        if is_kicked(impulse) {
            if previous.is_some() {
                commands.entity(entity).remove::<PreviousVelocity>();
            }
            continue;
        }
        match previous {
            Some(mut previous) => {
                if is_impact(previous.0, velocity.0, settings.impact_threshold) {
                    cues.send(SoundCue::impact(*kind));
                }
                previous.0 = velocity.0;
            }
            None => {
                commands.entity(entity).insert(PreviousVelocity(velocity.0));
            }
        }
    }
}

fn play_cues(
    mut commands: Commands,
    mut cues: EventReader<SoundCue>,
    asset_server: Res<AssetServer>,
    settings: Res<GameSettings>,
) {
    if !settings.sound {
        cues.clear();
        return;
    }
    // Several books landing together make one thump, not ten.
    let mut played = Vec::new();
    for cue in cues.read() {
        if played.contains(cue) {
            continue;
        }
        played.push(*cue);
        commands.spawn((
            AudioPlayer::<AudioSource>(asset_server.load(cue.asset_path())),
            PlaybackSettings::DESPAWN,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_sounds_by_object_kind() {
        assert_eq!(SoundCue::impact(ObjectKind::Ball), SoundCue::Thump);
        assert_eq!(SoundCue::impact(ObjectKind::Book), SoundCue::Thump2);
        assert_eq!(SoundCue::impact(ObjectKind::CannonBarrel), SoundCue::Clang);
    }

    #[test]
    fn small_velocity_changes_are_quiet() {
        assert!(!is_impact(Vector::new(1.0, 0.0), Vector::new(0.0, 0.0), 400.0));
        assert!(is_impact(Vector::new(0.0, -25.0), Vector::new(0.0, 0.0), 400.0));
    }

    #[test]
    fn hard_landing_sends_a_cue() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_event::<SoundCue>()
            .insert_resource(GameSettings::default())
            .add_systems(Update, detect_impacts);
        let book = app
            .world_mut()
            .spawn((ObjectKind::Book, LinearVelocity(Vector::new(0.0, -30.0))))
            .id();
        app.update();
        app.update();
        assert!(app.world().resource::<Events<SoundCue>>().is_empty());

        app.world_mut().get_mut::<LinearVelocity>(book).unwrap().0 = Vector::ZERO;
        app.update();
        let events = app.world().resource::<Events<SoundCue>>();
        let cues: Vec<_> = events.get_cursor().read(events).copied().collect();
        assert_eq!(cues, vec![SoundCue::Thump2]);
    }

    #[test]
    fn launching_a_ball_is_not_an_impact() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_event::<SoundCue>()
            .insert_resource(GameSettings::default())
            .add_systems(Update, detect_impacts);
        let ball = app
            .world_mut()
            .spawn((
                ObjectKind::Ball,
                LinearVelocity(Vector::ZERO),
                ExternalImpulse::new(Vector::new(200.0, 0.0)).with_persistence(false),
            ))
            .id();

        let mut heard = Vec::new();
        let mut listen = |app: &mut App| {
            app.update();
            let events = app.world().resource::<Events<SoundCue>>();
            let mut cursor = events.get_cursor();
            heard.extend(cursor.read(events).copied());
        };
        listen(&mut app);

        // What the physics step does with a non-persistent impulse on a
        // ball of radius 1.6 and density 0.5.
        let mut entity = app.world_mut().entity_mut(ball);
        entity.insert(ExternalImpulse::default());
        entity.get_mut::<LinearVelocity>().unwrap().0 = Vector::new(49.7, 0.0);
        listen(&mut app);
        listen(&mut app);

        app.world_mut()
            .get_mut::<LinearVelocity>(ball)
            .unwrap()
            .0 = Vector::new(49.7, -0.2);
        listen(&mut app);

        assert!(heard.is_empty(), "unexpected cues {heard:?}");
    }

    #[test]
    fn impulse_restarts_velocity_tracking() {
        assert!(is_kicked(Some(&ExternalImpulse::new(Vector::X))));
        assert!(!is_kicked(Some(&ExternalImpulse::default())));
        assert!(!is_kicked(None));
    }
}
