use avian2d::{math::*, prelude::*};
use bevy::prelude::*;

use crate::player::{spawn_cannon, CannonStatus};
use crate::settings::GameSettings;
use crate::state::{GamePhase, LevelClock};

/// Render pixels per physics unit.
pub const PHYSICS_RESCALE: Scalar = 10.0;

/// Render world to physics world units.
pub fn rw2pw(x: Scalar) -> Scalar {
    x / PHYSICS_RESCALE
}

/// Physics world to render world units.
pub fn pw2rw(x: Scalar) -> Scalar {
    x * PHYSICS_RESCALE
}

/// Anything that belongs to the current level and goes away on restart.
#[derive(Component)]
pub struct LevelEntity;

/// The kinds of object that live in both the physics world and on screen.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Ball,
    Book,
    CannonBarrel,
    CannonMount,
    Wheel,
}

/// Half extents of a book, in physics units.
pub fn book_half_extents() -> Vector {
    Vector::new(rw2pw(27.0), rw2pw(32.0))
}

/// Shared meshes and materials for the round and triangular bodies.
#[derive(Resource, Clone, Default)]
pub struct LevelAssets {
    pub ball_mesh: Handle<Mesh>,
    pub ball_material: Handle<ColorMaterial>,
    pub wheel_mesh: Handle<Mesh>,
    pub wheel_material: Handle<ColorMaterial>,
    pub mount_mesh: Handle<Mesh>,
    pub mount_material: Handle<ColorMaterial>,
}

pub fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    mut next_phase: ResMut<NextState<GamePhase>>,
    settings: Res<GameSettings>,
) {
    let s = rw2pw(64.0);
    commands.insert_resource(LevelAssets {
        ball_mesh: meshes.add(Circle::new(rw2pw(16.0))),
        ball_material: materials.add(Color::srgb(0.15, 0.15, 0.15)),
        wheel_mesh: meshes.add(Circle::new(rw2pw(16.0))),
        wheel_material: materials.add(Color::srgb(0.45, 0.3, 0.15)),
        mount_mesh: meshes.add(Triangle2d::new(
            Vec2::new(-s, -s),
            Vec2::new(s, -s),
            Vec2::ZERO,
        )),
        mount_material: materials.add(Color::srgb(0.55, 0.35, 0.2)),
    });

    // One physics unit is ten pixels, origin at the bottom-left corner.
    let width = rw2pw(settings.world_width);
    let height = rw2pw(settings.world_height);
    commands.spawn((
        Camera2d,
        OrthographicProjection {
            scale: 1.0 / PHYSICS_RESCALE,
            ..OrthographicProjection::default_2d()
        },
        Transform::from_xyz(width / 2.0, height / 2.0, 0.0),
    ));

    next_phase.set(GamePhase::Playing);
}

/// Clears out the previous level and builds a fresh one.
pub fn begin_level(
    mut commands: Commands,
    level_entities: Query<Entity, With<LevelEntity>>,
    settings: Res<GameSettings>,
    assets: Res<LevelAssets>,
    mut status: ResMut<CannonStatus>,
    mut clock: ResMut<LevelClock>,
) {
    for entity in &level_entities {
        commands.entity(entity).despawn_recursive();
    }

    create_world_edges(&mut commands, &settings);
    create_tower(&mut commands, &settings);
    let rig = spawn_cannon(&mut commands, &assets);
    commands.insert_resource(rig);

    status.reset(&settings);
    clock.start();
    info!("Level started with {} tower layers", settings.tower_layers);
}

/// Ground, both side walls and the ledge the cannon sits on. There is no
/// ceiling; the walls run up to twice the screen height.
pub fn create_world_edges(commands: &mut Commands, settings: &GameSettings) {
    let w = rw2pw(settings.world_width);
    let h = rw2pw(2.0 * settings.world_height);
    let ledge = rw2pw(62.0);

    let edges = [
        (Vector::ZERO, Vector::new(w, 0.0)),
        (Vector::ZERO, Vector::new(0.0, h)),
        (Vector::new(w, 0.0), Vector::new(w, h)),
        (Vector::new(0.0, ledge), Vector::new(w / 2.0, ledge)),
    ];

    for (a, b) in edges {
        let midpoint = (a + b) / 2.0;
        commands.spawn((
            Sprite {
                color: Color::srgb(0.7, 0.7, 0.8),
                custom_size: Some((b - a).abs() + Vec2::splat(rw2pw(4.0))),
                ..default()
            },
            Transform::from_translation(midpoint.extend(0.0)),
            RigidBody::Static,
            Collider::segment(a - midpoint, b - midpoint),
            LevelEntity,
        ));
    }
}

/// Book centres for a tower of `layers` layers whose left column sits at
/// 70% of the world width. Even layers hold two books, odd layers one.
pub fn tower_positions(settings: &GameSettings) -> Vec<Vector> {
    let x = rw2pw(0.7 * settings.world_width);
    let mut positions = Vec::new();
    for i in 0..settings.tower_layers {
        let y = rw2pw(32.0 + 64.0 * i as Scalar);
        if i & 1 == 1 {
            positions.push(Vector::new(x + rw2pw(30.0), y));
        } else {
            positions.push(Vector::new(x, y));
            positions.push(Vector::new(x + rw2pw(60.0), y));
        }
    }
    positions
}

pub fn create_tower(commands: &mut Commands, settings: &GameSettings) {
    let half = book_half_extents();
    for position in tower_positions(settings) {
        commands.spawn((
            Sprite {
                color: Color::srgb(0.6, 0.1, 0.15),
                custom_size: Some(half * 2.0),
                ..default()
            },
            Transform::from_translation(position.extend(0.5)),
            RigidBody::Dynamic,
            Collider::rectangle(half.x * 2.0, half.y * 2.0),
            ColliderDensity(1.0),
            Restitution::new(0.3),
            ObjectKind::Book,
            LevelEntity,
        ));
    }
}

/// True when every book lies strictly below `win_height`.
///
/// Books only get a `Position` once the physics step has picked them up, so
/// a level with no books seen yet is still standing.
pub fn tower_toppled(book_heights: impl IntoIterator<Item = Scalar>, win_height: Scalar) -> bool {
    let mut seen = false;
    for y in book_heights {
        if y >= win_height {
            return false;
        }
        seen = true;
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::SoundCue;
    use crate::state::{LevelClock, LevelPlugin};
    use bevy::state::app::StatesPlugin;

    #[test]
    fn unit_conversions_round_trip() {
        assert_eq!(rw2pw(640.0), 64.0);
        assert_eq!(pw2rw(rw2pw(62.0)), 62.0);
    }

    #[test]
    fn tower_alternates_pairs_and_singles() {
        let settings = GameSettings::default();
        let positions = tower_positions(&settings);
        assert_eq!(positions.len(), 18);

        let x = rw2pw(0.7 * settings.world_width);
        assert_eq!(positions[0], Vector::new(x, 3.2));
        assert_eq!(positions[1], Vector::new(x + 6.0, 3.2));
        assert_eq!(positions[2], Vector::new(x + 3.0, 9.6));
        // Top layer (11) is odd, a single book.
        let top = positions.last().unwrap();
        assert!((top.y - rw2pw(32.0 + 64.0 * 11.0)).abs() < 1e-4);
        assert!((top.x - (x + 3.0)).abs() < 1e-4);
    }

    #[test]
    fn ten_layer_tower_has_fifteen_books() {
        let settings = GameSettings {
            tower_layers: 10,
            ..default()
        };
        assert_eq!(tower_positions(&settings).len(), 15);
    }

    #[test]
    fn toppled_only_when_every_book_is_low() {
        assert!(tower_toppled([1.0, 5.0, 19.1], 19.2));
        assert!(!tower_toppled([1.0, 19.2], 19.2));
        assert!(!tower_toppled(
            tower_positions(&GameSettings::default()).iter().map(|p| p.y),
            GameSettings::default().win_height()
        ));
        assert!(!tower_toppled(std::iter::empty(), 19.2));
    }

    fn level_app() -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, StatesPlugin))
            .insert_resource(GameSettings::default())
            .insert_resource(LevelAssets::default())
            .insert_resource(CannonStatus::new(&GameSettings::default()))
            .init_resource::<LevelClock>()
            .init_state::<GamePhase>()
            .add_systems(OnEnter(GamePhase::Playing), begin_level);
        app
    }

    fn count_kind(app: &mut App, kind: ObjectKind) -> usize {
        app.world_mut()
            .query::<&ObjectKind>()
            .iter(app.world())
            .filter(|k| **k == kind)
            .count()
    }

    #[test]
    fn entering_play_builds_the_level() {
        let mut app = level_app();
        app.world_mut()
            .resource_mut::<NextState<GamePhase>>()
            .set(GamePhase::Playing);
        app.update();

        assert_eq!(count_kind(&mut app, ObjectKind::Book), 18);
        assert_eq!(count_kind(&mut app, ObjectKind::Wheel), 2);
        assert_eq!(count_kind(&mut app, ObjectKind::CannonBarrel), 1);
        assert_eq!(count_kind(&mut app, ObjectKind::CannonMount), 1);
        let joints = app
            .world_mut()
            .query::<&RevoluteJoint>()
            .iter(app.world())
            .count();
        assert_eq!(joints, 3);
        assert!(app.world().get_resource::<crate::player::CannonRig>().is_some());
        assert!(app.world().resource::<LevelClock>().is_running());
    }

    #[test]
    fn restarting_replaces_the_old_level() {
        let mut app = level_app();
        app.world_mut()
            .resource_mut::<NextState<GamePhase>>()
            .set(GamePhase::Playing);
        app.update();
        let before = app
            .world_mut()
            .query_filtered::<Entity, With<LevelEntity>>()
            .iter(app.world())
            .count();

        app.world_mut()
            .resource_mut::<NextState<GamePhase>>()
            .set(GamePhase::Lost);
        app.update();
        app.world_mut()
            .resource_mut::<NextState<GamePhase>>()
            .set(GamePhase::Playing);
        app.update();

        let after = app
            .world_mut()
            .query_filtered::<Entity, With<LevelEntity>>()
            .iter(app.world())
            .count();
        assert_eq!(before, after);
        assert_eq!(count_kind(&mut app, ObjectKind::Book), 18);
    }

    #[test]
    fn fresh_level_is_still_in_play_before_physics_steps() {
        let mut app = App::new();
        app.add_plugins((
            MinimalPlugins,
            bevy::transform::TransformPlugin,
            StatesPlugin,
            bevy::asset::AssetPlugin::default(),
            bevy::scene::ScenePlugin,
            PhysicsPlugins::default(),
            LevelPlugin,
        ))
        .init_resource::<Assets<Mesh>>()
        .init_resource::<Assets<ColorMaterial>>()
        .add_event::<SoundCue>()
        .insert_resource(GameSettings::default())
        .insert_resource(CannonStatus::new(&GameSettings::default()))
        .add_systems(Startup, setup);

        for _ in 0..3 {
            app.update();
        }

        assert_eq!(
            *app.world().resource::<State<GamePhase>>().get(),
            GamePhase::Playing
        );
        assert_eq!(count_kind(&mut app, ObjectKind::Book), 18);
        assert_eq!(app.world().resource::<CannonStatus>().balls_fired(), 0);
    }
}
