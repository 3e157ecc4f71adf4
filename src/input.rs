use avian2d::{math::*, prelude::*};
use bevy::{input::touch::Touches, prelude::*, window::PrimaryWindow};

use crate::hud::EasterEgg;
use crate::player::{barrel_contains, CannonAction, CannonRig};
use crate::settings::GameSettings;
use crate::sound::SoundCue;
use crate::state::GamePhase;

/// Wheel speed used when driving towards the pointer.
const POINTER_DRIVE_SPEED: Scalar = 1.0;

/// Rate at which a held aim key repeats, in steps per second.
const AIM_REPEAT_HZ: Scalar = 60.0;

/// Barrel rotation for one frame of holding an aim key. `direction` is +1
/// for up, -1 for down. A held key turns the barrel by `step` sixty times a
/// second whatever the frame rate.
pub fn held_elevation(direction: i8, step: Scalar, delta_secs: Scalar) -> Scalar {
    direction as Scalar * step * AIM_REPEAT_HZ * delta_secs
}

// Sends [`CannonAction`] events based on keyboard input.
pub fn keyboard_input(
    mut actions: EventWriter<CannonAction>,
    keyboard_input: Res<ButtonInput<KeyCode>>,
    phase: Res<State<GamePhase>>,
    mut next_phase: ResMut<NextState<GamePhase>>,
    mut egg: ResMut<EasterEgg>,
    mut cues: EventWriter<SoundCue>,
    mut exit: EventWriter<AppExit>,
    settings: Res<GameSettings>,
    time: Res<Time>,
) {
    if keyboard_input.just_pressed(KeyCode::Escape) {
        exit.send(AppExit::Success);
        return;
    }

    if keyboard_input.just_pressed(KeyCode::KeyR) && !egg.0 {
        egg.0 = true;
        cues.send(SoundCue::Arr);
    }

    match phase.get() {
        GamePhase::Playing => {
            let up = keyboard_input.pressed(KeyCode::ArrowUp);
            let down = keyboard_input.pressed(KeyCode::ArrowDown);
            let elevation = up as i8 - down as i8;
            if elevation != 0 {
                actions.send(CannonAction::Elevate(held_elevation(
                    elevation,
                    settings.barrel_step,
                    time.delta_secs(),
                )));
            }

            if keyboard_input.just_pressed(KeyCode::ArrowLeft) {
                actions.send(CannonAction::Drive(settings.drive_speed));
            }
            if keyboard_input.just_pressed(KeyCode::ArrowRight) {
                actions.send(CannonAction::Drive(-settings.drive_speed));
            }
            if keyboard_input.any_just_released([KeyCode::ArrowLeft, KeyCode::ArrowRight])
                && !keyboard_input.any_pressed([KeyCode::ArrowLeft, KeyCode::ArrowRight])
            {
                actions.send(CannonAction::Drive(0.0));
            }

            // Held space keeps firing as fast as the reload allows.
            if keyboard_input.pressed(KeyCode::Space) {
                actions.send(CannonAction::Fire);
            }
        }
        GamePhase::Won | GamePhase::Lost => {
            if keyboard_input.just_pressed(KeyCode::Enter) {
                next_phase.set(GamePhase::Playing);
            }
        }
        GamePhase::Loading => {}
    }
}

pub fn gamepad_input(
    mut actions: EventWriter<CannonAction>,
    gamepads: Query<&Gamepad>,
    phase: Res<State<GamePhase>>,
    mut next_phase: ResMut<NextState<GamePhase>>,
    settings: Res<GameSettings>,
    time: Res<Time>,
    mut driving: Local<bool>,
) {
    for gamepad in &gamepads {
        match phase.get() {
            GamePhase::Playing => {
                // Driving. Stick right moves right, which is a negative speed.
                let x = gamepad.get(GamepadAxis::LeftStickX).unwrap_or(0.0);
                if x.abs() > 0.1 {
                    actions.send(CannonAction::Drive(-x * settings.drive_speed));
                    *driving = true;
                } else if *driving {
                    actions.send(CannonAction::Drive(0.0));
                    *driving = false;
                }
                // Aiming
                let up = gamepad.pressed(GamepadButton::DPadUp);
                let down = gamepad.pressed(GamepadButton::DPadDown);
                let elevation = up as i8 - down as i8;
                if elevation != 0 {
                    actions.send(CannonAction::Elevate(held_elevation(
                        elevation,
                        settings.barrel_step,
                        time.delta_secs(),
                    )));
                }
                let fire = gamepad.get(GamepadButton::RightTrigger2).unwrap_or(0.0);
                if fire > 0.1 || gamepad.pressed(GamepadButton::South) {
                    actions.send(CannonAction::Fire);
                }
            }
            GamePhase::Won | GamePhase::Lost => {
                if gamepad.just_pressed(GamepadButton::Start) {
                    next_phase.set(GamePhase::Playing);
                }
            }
            GamePhase::Loading => {}
        }
    }
}

/// What the pointer did this frame, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerGesture {
    /// Pressed or dragged from `previous` to `current`.
    Held { current: Vector, previous: Vector },
    Released,
}

/// Turns a pointer gesture into a cannon action. Dragging on the barrel
/// turns it by the vertical drag distance; holding anywhere else drives
/// towards the pointer; letting go stops.
pub fn pointer_action(
    gesture: PointerGesture,
    barrel_position: Vector,
    barrel_angle: Scalar,
) -> Option<CannonAction> {
    match gesture {
        PointerGesture::Released => Some(CannonAction::Drive(0.0)),
        PointerGesture::Held { current, previous } => {
            if barrel_contains(current, barrel_position, barrel_angle) {
                let delta = current.y - previous.y;
                (delta != 0.0).then_some(CannonAction::Elevate(delta))
            } else if current.x > barrel_position.x {
                Some(CannonAction::Drive(-POINTER_DRIVE_SPEED))
            } else if current.x < barrel_position.x {
                Some(CannonAction::Drive(POINTER_DRIVE_SPEED))
            } else {
                None
            }
        }
    }
}

// Mouse and touch. Only the first touch counts.
pub fn pointer_input(
    mut actions: EventWriter<CannonAction>,
    mouse: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform)>,
    rig: Option<Res<CannonRig>>,
    barrels: Query<(&Position, &Rotation)>,
    phase: Res<State<GamePhase>>,
    mut last_cursor: Local<Option<Vec2>>,
) {
    if *phase.get() != GamePhase::Playing {
        return;
    }
    let Some(rig) = rig else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.get_single() else {
        return;
    };
    let to_world = |screen: Vec2| camera.viewport_to_world_2d(camera_transform, screen).ok();

    let gesture = if let Some(touch) = touches.iter().next() {
        match (to_world(touch.position()), to_world(touch.previous_position())) {
            (Some(current), Some(previous)) => Some(PointerGesture::Held { current, previous }),
            _ => None,
        }
    } else if touches.any_just_released() || mouse.just_released(MouseButton::Left) {
        *last_cursor = None;
        Some(PointerGesture::Released)
    } else if mouse.pressed(MouseButton::Left) {
        let cursor = windows
            .get_single()
            .ok()
            .and_then(|window| window.cursor_position())
            .and_then(to_world);
        let previous = last_cursor.or(cursor);
        *last_cursor = cursor;
        cursor
            .zip(previous)
            .map(|(current, previous)| PointerGesture::Held { current, previous })
    } else {
        None
    };

    let Some(gesture) = gesture else {
        return;
    };
    let Ok((position, rotation)) = barrels.get(rig.barrel) else {
        return;
    };
    if let Some(action) = pointer_action(gesture, position.0, rotation.as_radians()) {
        actions.send(action);
    }
}
