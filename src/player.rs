use avian2d::{math::*, prelude::*};
use bevy::prelude::*;
use std::time::Duration;

use crate::game::{pw2rw, rw2pw, LevelAssets, LevelEntity, ObjectKind};
use crate::input::{gamepad_input, keyboard_input, pointer_input};
use crate::settings::GameSettings;
use crate::sound::SoundCue;
use crate::state::GamePhase;
use crate::weapons::{muzzle_impulse, muzzle_point, Cannonball, ReloadGate, Thermometer};

pub struct CannonPlugin;

impl Plugin for CannonPlugin {
    fn build(&self, app: &mut App) {
        let settings = app
            .world()
            .get_resource::<GameSettings>()
            .cloned()
            .unwrap_or_default();
        app.add_event::<CannonAction>()
            .insert_resource(CannonStatus::new(&settings))
            .add_systems(
                Update,
                (
                    keyboard_input,
                    gamepad_input,
                    pointer_input,
                    reload_cannon,
                    apply_cannon_actions.run_if(in_state(GamePhase::Playing)),
                )
                    .chain(),
            )
            .add_systems(
                FixedUpdate,
                (drive_wheel_motors, brake_barrel, cool_down_cannon)
                    .run_if(resource_exists::<CannonRig>),
            );
    }
}

// An event sent for a cannon control action.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum CannonAction {
    /// Rotate the barrel by this many radians, positive is up.
    Elevate(Scalar),
    /// Run the wheel motors at this speed, positive is left.
    Drive(Scalar),
    Fire,
}

// Collision layers. Cannon parts ignore each other until the cannon blows up.
#[derive(PhysicsLayer, Clone, Copy, Debug, Default)]
pub enum GameLayer {
    #[default]
    Default,
    Cannon,
}

const CANNON_X: Scalar = 300.0;
const CANNON_Y: Scalar = 62.0;

/// Distance from barrel centre to where a ball appears, in pixels.
const MUZZLE_REACH: Scalar = 85.0;

/// Highest elevation of the barrel above the mount.
const MAX_ELEVATION: Scalar = PI / 4.0;

const WHEEL_MAX_TORQUE: Scalar = 1000.0;

/// Torque per rad/s of speed error used to chase the motor target.
const MOTOR_GAIN: Scalar = 50.0;

const BARREL_BRAKE_TORQUE: Scalar = 1000.0;

pub fn barrel_half_extents() -> Vector {
    Vector::new(rw2pw(67.0), rw2pw(22.0))
}

/// Entities making up the cannon in the current level. Joints become `None`
/// once destroyed.
#[derive(Resource, Debug, Clone)]
pub struct CannonRig {
    pub mount: Entity,
    pub barrel: Entity,
    pub wheels: [Entity; 2],
    pub wheel_joints: [Option<Entity>; 2],
    pub barrel_joint: Option<Entity>,
}

impl CannonRig {
    pub fn parts(&self) -> [Entity; 4] {
        [self.mount, self.barrel, self.wheels[0], self.wheels[1]]
    }
}

/// Per-level cannon bookkeeping.
#[derive(Resource, Debug, Clone)]
pub struct CannonStatus {
    pub thermometer: Thermometer,
    shots: u32,
    exploded: bool,
    reload: ReloadGate,
}

impl CannonStatus {
    pub fn new(settings: &GameSettings) -> Self {
        Self {
            thermometer: Thermometer::default(),
            shots: 0,
            exploded: false,
            reload: ReloadGate::new(Duration::from_millis(settings.reload_millis)),
        }
    }

    pub fn reset(&mut self, settings: &GameSettings) {
        self.thermometer.reset();
        self.shots = 0;
        self.exploded = false;
        self.reload = ReloadGate::new(Duration::from_millis(settings.reload_millis));
    }

    pub fn balls_fired(&self) -> u32 {
        self.shots
    }

    pub fn is_dead(&self) -> bool {
        self.exploded
    }

    pub fn temperature(&self) -> f32 {
        self.thermometer.temperature
    }

    pub fn peak_temperature(&self) -> f32 {
        self.thermometer.peak
    }

    pub fn mark_exploded(&mut self) {
        self.exploded = true;
    }
}

/// Motor on a wheel axle. Disabled motors let the wheel roll freely.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct WheelMotor {
    pub speed: Scalar,
    pub max_torque: Scalar,
    pub enabled: bool,
}

impl Default for WheelMotor {
    fn default() -> Self {
        Self {
            speed: 0.0,
            max_torque: WHEEL_MAX_TORQUE,
            enabled: true,
        }
    }
}

/// Torque a motor applies to move from `current` towards `target` rad/s.
pub fn motor_torque(motor: &WheelMotor, current: Scalar) -> Scalar {
    if !motor.enabled {
        return 0.0;
    }
    ((motor.speed - current) * MOTOR_GAIN).clamp(-motor.max_torque, motor.max_torque)
}

/// Torque on the barrel from a speed-zero motor in the barrel joint, given
/// how fast the barrel spins relative to the mount. The mount gets the
/// opposite torque.
pub fn brake_torque(relative_spin: Scalar) -> Scalar {
    (-relative_spin * MOTOR_GAIN).clamp(-BARREL_BRAKE_TORQUE, BARREL_BRAKE_TORQUE)
}

// A bundle that contains the components shared by every cannon part.
#[derive(Bundle)]
pub struct CannonPartBundle {
    kind: ObjectKind,
    rigid_body: RigidBody,
    collider: Collider,
    density: ColliderDensity,
    restitution: Restitution,
    layers: CollisionLayers,
    level: LevelEntity,
}

impl CannonPartBundle {
    pub fn new(kind: ObjectKind, collider: Collider) -> Self {
        Self {
            kind,
            rigid_body: RigidBody::Dynamic,
            collider,
            density: ColliderDensity(1.0),
            restitution: Restitution::ZERO,
            layers: CollisionLayers::new(GameLayer::Cannon, GameLayer::Default),
            level: LevelEntity,
        }
    }

    pub fn with_material(mut self, density: Scalar, restitution: Scalar) -> Self {
        self.density = ColliderDensity(density);
        self.restitution = Restitution::new(restitution);
        self
    }
}

fn at(x: Scalar, y: Scalar, z: f32) -> Transform {
    Transform::from_xyz(rw2pw(x), rw2pw(y), z)
}

/// Builds mount, barrel, wheels and the three joints holding them together.
pub fn spawn_cannon(commands: &mut Commands, assets: &LevelAssets) -> CannonRig {
    let s = rw2pw(64.0);
    let mount_position = Vector::new(rw2pw(CANNON_X), rw2pw(CANNON_Y + 84.0));
    let mount = commands
        .spawn((
            Mesh2d(assets.mount_mesh.clone()),
            MeshMaterial2d(assets.mount_material.clone()),
            at(CANNON_X, CANNON_Y + 84.0, 2.0),
            CannonPartBundle::new(
                ObjectKind::CannonMount,
                Collider::triangle(Vector::new(-s, -s), Vector::new(s, -s), Vector::ZERO),
            )
            .with_material(1.0, 0.4),
            ExternalTorque::default().with_persistence(false),
        ))
        .id();

    let barrel_position = Vector::new(rw2pw(CANNON_X), rw2pw(CANNON_Y + 72.0));
    let half = barrel_half_extents();
    let barrel = commands
        .spawn((
            Sprite {
                color: Color::srgb(0.2, 0.2, 0.25),
                custom_size: Some(half * 2.0),
                ..default()
            },
            at(CANNON_X, CANNON_Y + 72.0, 1.0),
            CannonPartBundle::new(
                ObjectKind::CannonBarrel,
                Collider::rectangle(half.x * 2.0, half.y * 2.0),
            )
            .with_material(1.0, 0.2),
            ExternalTorque::default().with_persistence(false),
        ))
        .id();

    let wheel_offsets = [-30.0, 30.0];
    let wheels = wheel_offsets.map(|dx| {
        commands
            .spawn((
                Mesh2d(assets.wheel_mesh.clone()),
                MeshMaterial2d(assets.wheel_material.clone()),
                at(CANNON_X + dx, CANNON_Y + 16.0, 3.0),
                CannonPartBundle::new(ObjectKind::Wheel, Collider::circle(rw2pw(16.0)))
                    .with_material(0.8, 0.6),
                Friction::new(1.0),
                WheelMotor::default(),
                ExternalTorque::default().with_persistence(false),
            ))
            .id()
    });

    // Axles sit at the wheel centres. Compliance stands in for suspension.
    let wheel_joints = [0, 1].map(|i| {
        let wheel_position = Vector::new(
            rw2pw(CANNON_X + wheel_offsets[i]),
            rw2pw(CANNON_Y + 16.0),
        );
        let joint = commands
            .spawn((
                RevoluteJoint::new(mount, wheels[i])
                    .with_local_anchor_1(wheel_position - mount_position)
                    .with_local_anchor_2(Vector::ZERO)
                    .with_compliance(0.00001),
                LevelEntity,
            ))
            .id();
        Some(joint)
    });

    let barrel_joint = commands
        .spawn((
            RevoluteJoint::new(mount, barrel)
                .with_local_anchor_1(barrel_position - mount_position)
                .with_local_anchor_2(Vector::ZERO)
                .with_angle_limits(0.0, MAX_ELEVATION),
            LevelEntity,
        ))
        .id();

    CannonRig {
        mount,
        barrel,
        wheels,
        wheel_joints,
        barrel_joint: Some(barrel_joint),
    }
}

/// Wraps an angle into `(-PI, PI]`.
fn wrap_angle(angle: Scalar) -> Scalar {
    angle.sin().atan2(angle.cos())
}

/// New barrel elevation above the mount after rotating by `delta`, kept
/// inside the barrel joint's limits.
pub fn clamp_elevation(barrel_angle: Scalar, mount_angle: Scalar, delta: Scalar) -> Scalar {
    let elevation = wrap_angle(barrel_angle - mount_angle);
    (elevation + delta).clamp(0.0, MAX_ELEVATION)
}

/// Whether a world point lies inside a barrel at `position` rotated by `angle`.
pub fn barrel_contains(point: Vector, position: Vector, angle: Scalar) -> bool {
    let local = Vector::from_angle(-angle).rotate(point - position);
    let half = barrel_half_extents();
    local.x.abs() <= half.x && local.y.abs() <= half.y
}

type PartQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static Position,
        &'static mut Rotation,
        Option<&'static ComputedCenterOfMass>,
    ),
>;

/// Pushes `entity` with `impulse` applied at `offset` from its origin.
fn impulse(commands: &mut Commands, parts: &PartQuery, entity: Entity, impulse: Vector, offset: Vector) {
    let center = match parts.get(entity) {
        Ok((_, rotation, center_of_mass)) => {
            rotation.rotate(center_of_mass.map_or(Vector::ZERO, |c| c.0))
        }
        Err(_) => Vector::ZERO,
    };
    let mut kick = ExternalImpulse::default().with_persistence(false);
    kick.apply_impulse_at_point(impulse, offset, center);
    commands.entity(entity).insert(kick);
}

fn set_motors(motors: &mut Query<&mut WheelMotor>, rig: &CannonRig, speed: Scalar, enabled: bool) {
    for (wheel, joint) in rig.wheels.iter().zip(rig.wheel_joints.iter()) {
        if joint.is_none() {
            continue;
        }
        if let Ok(mut motor) = motors.get_mut(*wheel) {
            motor.speed = speed;
            motor.enabled = enabled;
        }
    }
}

/// Starts the wheels turning. Positive speeds move left.
pub fn start_moving_left(motors: &mut Query<&mut WheelMotor>, rig: &CannonRig, speed: Scalar) {
    set_motors(motors, rig, speed, true);
}

/// Stops driving and lets the wheels roll freely.
pub fn stop_moving(motors: &mut Query<&mut WheelMotor>, rig: &CannonRig) {
    set_motors(motors, rig, 0.0, false);
}

/// Breaks the joints, flings the parts apart and lets them collide.
pub fn explode(
    commands: &mut Commands,
    rig: &mut CannonRig,
    status: &mut CannonStatus,
    parts: &PartQuery,
    cues: &mut EventWriter<SoundCue>,
) {
    let joints = rig
        .wheel_joints
        .iter_mut()
        .chain(std::iter::once(&mut rig.barrel_joint));
    for joint in joints {
        if let Some(entity) = joint.take() {
            commands.entity(entity).despawn();
        }
    }

    impulse(commands, parts, rig.mount, Vector::new(0.0, 50.0), Vector::new(80.0, 80.0));
    impulse(commands, parts, rig.barrel, Vector::new(0.0, 100.0), Vector::new(40.0, 40.0));
    impulse(commands, parts, rig.wheels[0], Vector::new(-50.0, 200.0), Vector::new(1.0, 1.0));
    impulse(commands, parts, rig.wheels[1], Vector::new(50.0, 220.0), Vector::new(-1.0, -1.0));

    for part in rig.parts() {
        commands.entity(part).insert(CollisionLayers::default());
    }
    for wheel in rig.wheels {
        commands.entity(wheel).remove::<WheelMotor>();
    }

    status.mark_exploded();
    cues.send(SoundCue::Boom);
    warn!("Cannon overheated at {:.1} degrees", status.temperature());
}

fn apply_cannon_actions(
    mut commands: Commands,
    mut actions: EventReader<CannonAction>,
    rig: Option<ResMut<CannonRig>>,
    mut status: ResMut<CannonStatus>,
    settings: Res<GameSettings>,
    assets: Res<LevelAssets>,
    mut parts: PartQuery,
    mut motors: Query<&mut WheelMotor>,
    mut cues: EventWriter<SoundCue>,
) {
    let Some(mut rig) = rig else {
        actions.clear();
        return;
    };

    for action in actions.read() {
        match *action {
            CannonAction::Elevate(delta) => {
                if status.is_dead() {
                    continue;
                }
                let Ok((_, mount_rotation, _)) = parts.get(rig.mount) else {
                    continue;
                };
                let mount_angle = mount_rotation.as_radians();
                if let Ok((_, mut rotation, _)) = parts.get_mut(rig.barrel) {
                    let elevation = clamp_elevation(rotation.as_radians(), mount_angle, delta);
                    *rotation = Rotation::radians(mount_angle + elevation);
                }
            }
            CannonAction::Drive(speed) => {
                start_moving_left(&mut motors, &rig, speed);
            }
            CannonAction::Fire => {
                if fire(
                    &mut commands,
                    &mut rig,
                    &mut status,
                    &settings,
                    &assets,
                    &parts,
                    &mut motors,
                    &mut cues,
                ) {
                    cues.send(SoundCue::CannonFire);
                }
            }
        }
    }
}

/// Fires a ball if the cannon is intact and reloaded. Returns whether a
/// ball left the barrel.
#[allow(clippy::too_many_arguments)]
pub fn fire(
    commands: &mut Commands,
    rig: &mut CannonRig,
    status: &mut CannonStatus,
    settings: &GameSettings,
    assets: &LevelAssets,
    parts: &PartQuery,
    motors: &mut Query<&mut WheelMotor>,
    cues: &mut EventWriter<SoundCue>,
) -> bool {
    if status.is_dead() || !status.reload.is_ready() {
        return false;
    }
    let Ok((position, rotation, _)) = parts.get(rig.barrel) else {
        return false;
    };
    let (barrel_position, angle) = (position.0, rotation.as_radians());

    status.reload.trigger();
    status.thermometer.heat(settings.shot_heat);

    let muzzle = muzzle_point(barrel_position, angle, rw2pw(MUZZLE_REACH));
    if muzzle.y < 0.0 {
        // Barrel is in the ground.
        explode(commands, rig, status, parts, cues);
        return false;
    }

    stop_moving(motors, rig);
    let shot = muzzle_impulse(angle, settings.muzzle_impulse);
    commands.spawn((
        Mesh2d(assets.ball_mesh.clone()),
        MeshMaterial2d(assets.ball_material.clone()),
        Transform::from_translation(muzzle.extend(4.0)),
        RigidBody::Dynamic,
        Collider::circle(rw2pw(16.0)),
        ColliderDensity(0.5),
        Restitution::new(0.3),
        ExternalImpulse::new(shot).with_persistence(false),
        Cannonball,
        ObjectKind::Ball,
        LevelEntity,
    ));
    commands
        .entity(rig.barrel)
        .insert(ExternalImpulse::new(-settings.recoil_factor * shot).with_persistence(false));

    status.shots += 1;
    debug!(
        "Shot {} at {:.2} rad from ({:.0}, {:.0}) px",
        status.shots,
        angle,
        pw2rw(muzzle.x),
        pw2rw(muzzle.y)
    );
    true
}

fn reload_cannon(time: Res<Time>, mut status: ResMut<CannonStatus>) {
    status.reload.tick(time.delta());
}

/// Cools the barrel each tick and blows the cannon up when it is too hot.
fn cool_down_cannon(
    mut commands: Commands,
    mut rig: ResMut<CannonRig>,
    mut status: ResMut<CannonStatus>,
    settings: Res<GameSettings>,
    parts: PartQuery,
    mut cues: EventWriter<SoundCue>,
) {
    status.thermometer.cool_down(settings.cooling_divisor);
    if status.thermometer.is_overheated(settings.overheat_temperature) && !status.is_dead() {
        explode(&mut commands, &mut rig, &mut status, &parts, &mut cues);
    }
}

fn brake_barrel(rig: Res<CannonRig>, mut bodies: Query<(&AngularVelocity, &mut ExternalTorque)>) {
    if rig.barrel_joint.is_none() {
        return;
    }
    let Ok([(barrel_spin, mut barrel_torque), (mount_spin, mut mount_torque)]) =
        bodies.get_many_mut([rig.barrel, rig.mount])
    else {
        return;
    };
    let torque = brake_torque(barrel_spin.0 - mount_spin.0);
    *barrel_torque = ExternalTorque::new(torque).with_persistence(false);
    *mount_torque = ExternalTorque::new(-torque).with_persistence(false);
}

fn drive_wheel_motors(mut wheels: Query<(&WheelMotor, &AngularVelocity, &mut ExternalTorque)>) {
    for (motor, angular_velocity, mut torque) in &mut wheels {
        *torque = ExternalTorque::new(motor_torque(motor, angular_velocity.0)).with_persistence(false);
    }
}
