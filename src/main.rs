//! Knock the book tower down with a cannon before the clock runs out.
//!
//! - Arrow keys aim and drive, space fires, enter restarts a finished level
//! - Gamepad and mouse/touch work too
//! - Fire too fast and the barrel overheats and blows up
//!
//! Tuning lives in `assets/settings.json`; see the `settings` module.

use avian2d::{math::*, prelude::*};
use bevy::prelude::*;

mod game;
mod hud;
mod input;
mod player;
mod settings;
mod sound;
mod state;
mod weapons;

use game::setup;
use hud::HudPlugin;
use player::CannonPlugin;
use settings::GameSettings;
use sound::SoundPlugin;
use state::LevelPlugin;

fn main() {
    let settings = GameSettings::load_or_default(GameSettings::path());
    let gravity = Gravity(Vector::NEG_Y * settings.gravity);
    let resolution = (settings.world_width, settings.world_height);

    App::new()
        // Settings go in first, the plugins read them while building.
        .insert_resource(settings)
        .add_plugins((
            DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Book Tower Cannon".into(),
                    resolution: resolution.into(),
                    resizable: false,
                    ..default()
                }),
                ..default()
            }),
            // The world is measured in meters, books and wheels are a few units across.
            PhysicsPlugins::default().with_length_unit(1.0),
            LevelPlugin,
            CannonPlugin,
            HudPlugin,
            SoundPlugin,
        ))
        .insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.1)))
        .insert_resource(gravity)
        .insert_resource(Time::<Fixed>::from_hz(60.0))
        .add_systems(Startup, setup)
        .run();
}
