use avian2d::prelude::*;
use bevy::prelude::*;
use std::time::Duration;

use crate::game::{begin_level, tower_toppled, ObjectKind};
use crate::player::CannonStatus;
use crate::settings::GameSettings;
use crate::sound::SoundCue;

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GamePhase>()
            .init_resource::<LevelClock>()
            .add_systems(OnEnter(GamePhase::Playing), begin_level)
            .add_systems(
                Update,
                (tick_clock, check_outcome)
                    .chain()
                    .run_if(in_state(GamePhase::Playing)),
            );
    }
}

#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GamePhase {
    /// Assets are being created; the first level has not been built yet.
    #[default]
    Loading,
    Playing,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

impl Outcome {
    pub fn phase(self) -> GamePhase {
        match self {
            Outcome::Won => GamePhase::Won,
            Outcome::Lost => GamePhase::Lost,
        }
    }
}

/// Time spent on the current level. Stops when the level is decided.
#[derive(Resource, Debug, Default)]
pub struct LevelClock {
    elapsed: Duration,
    running: bool,
}

impl LevelClock {
    pub fn start(&mut self) {
        self.elapsed = Duration::ZERO;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advances the clock. Returns true when a new whole second was reached.
    pub fn tick(&mut self, delta: Duration) -> bool {
        if !self.running {
            return false;
        }
        let before = self.whole_seconds();
        self.elapsed += delta;
        self.whole_seconds() != before
    }

    pub fn whole_seconds(&self) -> u32 {
        self.elapsed.as_secs() as u32
    }
}

/// Decides a level. Losing is checked first: a dead cannon or an expired
/// clock loses even if the tower came down on the same frame.
pub fn judge(cannon_dead: bool, seconds: u32, max_seconds: u32, toppled: bool) -> Option<Outcome> {
    if cannon_dead || seconds >= max_seconds {
        Some(Outcome::Lost)
    } else if toppled {
        Some(Outcome::Won)
    } else {
        None
    }
}

fn tick_clock(time: Res<Time>, mut clock: ResMut<LevelClock>, mut cues: EventWriter<SoundCue>) {
    if clock.tick(time.delta()) {
        cues.send(SoundCue::Tick);
    }
}

fn check_outcome(
    settings: Res<GameSettings>,
    status: Res<CannonStatus>,
    mut clock: ResMut<LevelClock>,
    objects: Query<(&ObjectKind, &Position)>,
    mut next_phase: ResMut<NextState<GamePhase>>,
    mut cues: EventWriter<SoundCue>,
) {
    if !clock.is_running() {
        return;
    }
    let books = objects
        .iter()
        .filter(|(kind, _)| **kind == ObjectKind::Book)
        .map(|(_, position)| position.y);
    let toppled = tower_toppled(books, settings.win_height());
    let seconds = clock.whole_seconds();

    let Some(outcome) = judge(status.is_dead(), seconds, settings.max_playing_time, toppled) else {
        return;
    };

    clock.stop();
    next_phase.set(outcome.phase());
    match outcome {
        Outcome::Won => {
            info!("Tower down in {seconds}s with {} shots", status.balls_fired());
            cues.send(SoundCue::Win);
        }
        Outcome::Lost => {
            info!("Level lost after {seconds}s");
            cues.send(SoundCue::Lose);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::state::app::StatesPlugin;

    #[test]
    fn losing_beats_winning() {
        assert_eq!(judge(true, 3, 60, true), Some(Outcome::Lost));
        assert_eq!(judge(false, 60, 60, true), Some(Outcome::Lost));
        assert_eq!(judge(false, 59, 60, true), Some(Outcome::Won));
        assert_eq!(judge(false, 59, 60, false), None);
    }

    #[test]
    fn clock_reports_whole_seconds_and_freezes_when_stopped() {
        let mut clock = LevelClock::default();
        assert!(!clock.tick(Duration::from_secs(5)));
        assert_eq!(clock.whole_seconds(), 0);

        clock.start();
        assert!(!clock.tick(Duration::from_millis(600)));
        assert!(clock.tick(Duration::from_millis(600)));
        assert_eq!(clock.whole_seconds(), 1);

        clock.stop();
        assert!(!clock.tick(Duration::from_secs(10)));
        assert_eq!(clock.whole_seconds(), 1);
    }

    fn outcome_app(status: CannonStatus) -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, StatesPlugin))
            .add_event::<SoundCue>()
            .insert_resource(GameSettings::default())
            .insert_resource(status)
            .init_resource::<LevelClock>()
            .insert_state(GamePhase::Playing)
            .add_systems(Update, check_outcome.run_if(in_state(GamePhase::Playing)));
        app.world_mut().resource_mut::<LevelClock>().start();
        app
    }

    fn phase(app: &App) -> GamePhase {
        *app.world().resource::<State<GamePhase>>().get()
    }

    #[test]
    fn fallen_books_win_the_level() {
        let mut app = outcome_app(CannonStatus::new(&GameSettings::default()));
        app.world_mut()
            .spawn((ObjectKind::Book, Position(Vec2::new(70.0, 3.2))));
        app.world_mut()
            .spawn((ObjectKind::Book, Position(Vec2::new(80.0, 30.0))));
        app.update();
        app.update();
        assert_eq!(phase(&app), GamePhase::Playing);

        let high_books: Vec<Entity> = app
            .world_mut()
            .query::<(Entity, &Position)>()
            .iter(app.world())
            .filter(|(_, p)| p.y > 20.0)
            .map(|(e, _)| e)
            .collect();
        for entity in high_books {
            app.world_mut().entity_mut(entity).insert(Position(Vec2::new(80.0, 3.2)));
        }
        app.update();
        app.update();
        assert_eq!(phase(&app), GamePhase::Won);
        assert!(!app.world().resource::<LevelClock>().is_running());
    }

    #[test]
    fn exploded_cannon_loses_the_level() {
        let mut status = CannonStatus::new(&GameSettings::default());
        status.mark_exploded();
        let mut app = outcome_app(status);
        app.world_mut()
            .spawn((ObjectKind::Book, Position(Vec2::new(80.0, 3.2))));
        app.update();
        app.update();
        assert_eq!(phase(&app), GamePhase::Lost);
    }
}
