use avian2d::math::*;
use bevy::prelude::*;
use std::time::Duration;

/// A ball fired from the cannon.
#[derive(Component)]
pub struct Cannonball;

/// Barrel temperature. Every shot heats it, every tick cools it a little.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thermometer {
    pub temperature: f32,
    /// Highest temperature seen this level.
    pub peak: f32,
}

impl Thermometer {
    pub fn heat(&mut self, amount: f32) {
        self.temperature += amount;
    }

    /// One tick of cooling. The peak is recorded before the decay.
    pub fn cool_down(&mut self, divisor: f32) {
        if self.temperature > self.peak {
            self.peak = self.temperature;
        }
        if self.temperature > 0.0 {
            self.temperature -= self.temperature / divisor;
        }
    }

    pub fn is_overheated(&self, limit: f32) -> bool {
        self.temperature >= limit
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Minimum spacing between shots.
#[derive(Debug, Clone)]
pub struct ReloadGate(Timer);

impl ReloadGate {
    /// A gate that is already open.
    pub fn new(reload: Duration) -> Self {
        let mut timer = Timer::new(reload, TimerMode::Once);
        timer.tick(reload);
        Self(timer)
    }

    pub fn tick(&mut self, delta: Duration) {
        self.0.tick(delta);
    }

    pub fn is_ready(&self) -> bool {
        self.0.finished()
    }

    /// Closes the gate until the reload time has passed again.
    pub fn trigger(&mut self) {
        self.0.reset();
    }
}

/// Where a ball leaves a barrel at `barrel_position` rotated by `barrel_angle`.
pub fn muzzle_point(barrel_position: Vector, barrel_angle: Scalar, reach: Scalar) -> Vector {
    barrel_position + Vector::from_angle(barrel_angle).rotate(Vector::new(reach, 0.0))
}

/// Impulse along the barrel.
pub fn muzzle_impulse(barrel_angle: Scalar, magnitude: Scalar) -> Vector {
    Vector::from_angle(barrel_angle) * magnitude
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn peak_is_recorded_before_cooling() {
        let mut thermometer = Thermometer::default();
        thermometer.heat(64.0);
        thermometer.cool_down(64.0);
        assert_eq!(thermometer.peak, 64.0);
        assert_eq!(thermometer.temperature, 63.0);
    }

    #[test]
    fn five_quick_shots_overheat_the_barrel() {
        // Shots every 250 ms at 60 ticks per second.
        let mut thermometer = Thermometer::default();
        let mut shots = 0;
        'firing: loop {
            thermometer.heat(50.0);
            shots += 1;
            for _ in 0..15 {
                thermometer.cool_down(64.0);
                if thermometer.is_overheated(150.0) {
                    break 'firing;
                }
            }
        }
        assert_eq!(shots, 5);
    }

    #[test]
    fn reload_gate_starts_open_and_reopens_after_delay() {
        let mut gate = ReloadGate::new(Duration::from_millis(250));
        assert!(gate.is_ready());
        gate.trigger();
        assert!(!gate.is_ready());
        gate.tick(Duration::from_millis(200));
        assert!(!gate.is_ready());
        gate.tick(Duration::from_millis(50));
        assert!(gate.is_ready());
    }

    #[test]
    fn muzzle_follows_barrel_rotation() {
        let level = muzzle_point(Vector::new(30.0, 13.4), 0.0, 8.5);
        assert!((level - Vector::new(38.5, 13.4)).length() < 1e-5);

        let raised = muzzle_point(Vector::ZERO, PI / 2.0, 8.5);
        assert!((raised - Vector::new(0.0, 8.5)).length() < 1e-4);

        let impulse = muzzle_impulse(PI / 4.0, 200.0);
        assert!((impulse.length() - 200.0).abs() < 1e-3);
        assert!((impulse.x - impulse.y).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn cooling_never_goes_negative_or_heats(start in 0.0f32..10_000.0, ticks in 0usize..500) {
            let mut thermometer = Thermometer::default();
            thermometer.heat(start);
            let mut previous = thermometer.temperature;
            for _ in 0..ticks {
                thermometer.cool_down(64.0);
                prop_assert!(thermometer.temperature >= 0.0);
                prop_assert!(thermometer.temperature <= previous);
                previous = thermometer.temperature;
            }
            if ticks > 0 {
                prop_assert!(thermometer.peak >= thermometer.temperature);
            }
        }
    }
}
