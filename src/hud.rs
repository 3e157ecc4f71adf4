//! Heads-up display: thermometer, clock, counters and the win/lose banner.
//!
//! The thermometer and clock are sprites placed in world space measured down
//! from the top of the screen; the text lives in the UI layer.

use avian2d::math::*;
use bevy::{prelude::*, sprite::Anchor};

use crate::game::rw2pw;
use crate::player::CannonStatus;
use crate::settings::GameSettings;
use crate::state::{GamePhase, LevelClock};

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EasterEgg>()
            .add_systems(Startup, spawn_hud)
            .add_systems(Update, (update_gauge, update_clock, update_labels));
    }
}

/// Set once the player finds the pirate. Survives restarts.
#[derive(Resource, Default)]
pub struct EasterEgg(pub bool);

#[derive(Component)]
pub struct GaugeNeedle {
    pub peak: bool,
}

#[derive(Component)]
pub struct ClockNeedle;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudLabel {
    Shots,
    Temperature,
    Boom,
    Banner,
    Pirate,
}

/// Horizontal needle position in pixels for a temperature.
pub fn needle_offset(temperature: f32) -> f32 {
    25.0 + (256.0 * temperature / 178.0).min(300.0)
}

/// Clockwise angle of the clock needle, one turn per minute.
pub fn clock_angle(seconds: u32) -> Scalar {
    (seconds % 60) as Scalar / 60.0 * 2.0 * PI
}

pub fn banner(phase: GamePhase, shots: u32, seconds: u32) -> Option<(String, Color)> {
    match phase {
        GamePhase::Won if shots == 1 => Some((
            format!("Win in 0:{seconds:02} with 1 Shot!"),
            Color::WHITE,
        )),
        GamePhase::Won => Some((
            format!("Win in 0:{seconds:02} with {shots} Shots!"),
            Color::WHITE,
        )),
        GamePhase::Lost => Some(("Loser!".to_string(), Color::srgb(0.75, 0.0, 0.0))),
        GamePhase::Loading | GamePhase::Playing => None,
    }
}

/// World position of a point given in pixels from the top-left corner.
fn from_top(settings: &GameSettings, x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(rw2pw(x), rw2pw(settings.world_height - y), z)
}

fn spawn_hud(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    settings: Res<GameSettings>,
) {
    // Thermometer
    commands.spawn((
        Sprite {
            color: Color::srgb(0.2, 0.22, 0.3),
            custom_size: Some(Vec2::new(rw2pw(310.0), rw2pw(18.0))),
            ..default()
        },
        Transform::from_translation(from_top(&settings, 175.0, 40.0, 10.0)),
    ));
    for (peak, color) in [(true, Color::srgb(1.0, 0.6, 0.0)), (false, Color::srgb(0.9, 0.1, 0.1))] {
        commands.spawn((
            Sprite {
                color,
                custom_size: Some(Vec2::new(rw2pw(4.0), rw2pw(26.0))),
                ..default()
            },
            Transform::from_translation(from_top(&settings, needle_offset(0.0), 40.0, 11.0)),
            GaugeNeedle { peak },
        ));
    }

    // Clock
    commands.spawn((
        Mesh2d(meshes.add(Circle::new(rw2pw(32.0)))),
        MeshMaterial2d(materials.add(Color::srgb(0.9, 0.9, 0.85))),
        Transform::from_translation(from_top(&settings, 350.0, 70.0, 10.0)),
    ));
    commands.spawn((
        Sprite {
            color: Color::BLACK,
            custom_size: Some(Vec2::new(rw2pw(3.0), rw2pw(28.0))),
            anchor: Anchor::BottomCenter,
            ..default()
        },
        Transform::from_translation(from_top(&settings, 350.0, 70.0, 11.0)),
        ClockNeedle,
    ));

    // Counters
    commands
        .spawn(Node {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            right: Val::Px(12.0),
            flex_direction: FlexDirection::Column,
            align_items: AlignItems::FlexEnd,
            ..default()
        })
        .with_children(|parent| {
            for label in [HudLabel::Shots, HudLabel::Temperature, HudLabel::Boom] {
                parent.spawn((
                    Text::default(),
                    TextFont {
                        font_size: 22.0,
                        ..default()
                    },
                    TextColor(Color::WHITE),
                    label,
                ));
            }
        });

    // Banner and pirate
    commands
        .spawn(Node {
            position_type: PositionType::Absolute,
            width: Val::Percent(100.0),
            top: Val::Percent(35.0),
            flex_direction: FlexDirection::Column,
            align_items: AlignItems::Center,
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::default(),
                TextFont {
                    font_size: 48.0,
                    ..default()
                },
                TextColor(Color::WHITE),
                HudLabel::Banner,
            ));
            parent.spawn((
                Text::default(),
                TextFont {
                    font_size: 32.0,
                    ..default()
                },
                TextColor(Color::srgb(0.95, 0.85, 0.2)),
                HudLabel::Pirate,
            ));
        });
}

fn update_gauge(
    status: Res<CannonStatus>,
    settings: Res<GameSettings>,
    mut needles: Query<(&GaugeNeedle, &mut Transform)>,
) {
    for (needle, mut transform) in &mut needles {
        let temperature = if needle.peak {
            status.peak_temperature()
        } else {
            status.temperature()
        };
        transform.translation.x = rw2pw(needle_offset(temperature));
        transform.translation.y = rw2pw(settings.world_height - 40.0);
    }
}

fn update_clock(clock: Res<LevelClock>, mut needles: Query<&mut Transform, With<ClockNeedle>>) {
    for mut transform in &mut needles {
        transform.rotation = Quat::from_rotation_z(-clock_angle(clock.whole_seconds()));
    }
}

fn update_labels(
    status: Res<CannonStatus>,
    clock: Res<LevelClock>,
    phase: Res<State<GamePhase>>,
    egg: Res<EasterEgg>,
    mut labels: Query<(&HudLabel, &mut Text, &mut TextColor)>,
) {
    for (label, mut text, mut color) in &mut labels {
        match label {
            HudLabel::Shots => text.0 = format!("Balls fired: {}", status.balls_fired()),
            HudLabel::Temperature => text.0 = format!("Temperature: {:.0}", status.temperature()),
            HudLabel::Boom => {
                text.0 = if status.is_dead() { "BOOM!".into() } else { String::new() };
            }
            HudLabel::Banner => match banner(*phase.get(), status.balls_fired(), clock.whole_seconds()) {
                Some((message, tint)) => {
                    text.0 = message;
                    color.0 = tint;
                }
                None => text.0.clear(),
            },
            HudLabel::Pirate => {
                text.0 = if egg.0 { "Arrr!".into() } else { String::new() };
            }
        }
    }
}
