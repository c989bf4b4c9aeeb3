//! Time-bounded linear slide of a scalar toward a target.
//!
//! The same stepper drives camera repositioning, entity move-to commands and
//! [`Animation`](crate::animation::Animation) values. A slide configured over
//! `d` seconds moves by `|target - start| / (d * tick_rate)` per tick, where
//! the tick rate is the engine's, supplied on every step, and lands exactly on
//! the target on its last tick.

use serde::{Deserialize, Serialize};

/// Ticks per second when no engine configuration says otherwise.
pub const DEFAULT_TICK_RATE: f32 = 60.0;

/// Relative slack (as a fraction of one step) under which the remaining
/// distance of a timed slide is treated as its final step. Absorbs f32
/// accumulation error so a slide of N ticks ends on tick N instead of N + 1.
const SNAP_TOLERANCE: f32 = 1e-2;

/// Outcome of one [`Slide::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlideStep {
    /// The value moved toward the target this tick (possibly landing on it).
    Moved,
    /// The value already equals the target; the slide should be cleared.
    Done,
}

/// How fast a slide travels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SlideRate {
    /// Units per second, converted with the tick rate on each step.
    PerSecond(f32),
    /// Fixed units per tick.
    PerTick(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub target: f32,
    pub rate: SlideRate,
}

impl Slide {
    /// Slide from `from` to `to` over `seconds`. A zero (or negative)
    /// duration yields an instantaneous slide.
    pub fn over(from: f32, to: f32, seconds: f32) -> Self {
        let per_second = if seconds > 0.0 && seconds.is_finite() {
            (to - from).abs() / seconds
        } else {
            f32::INFINITY
        };
        Self {
            target: to,
            rate: SlideRate::PerSecond(per_second),
        }
    }

    /// Slide toward `target` at a fixed per-tick `speed`. Non-positive
    /// speeds snap.
    pub fn with_speed(target: f32, speed: f32) -> Self {
        Self {
            target,
            rate: SlideRate::PerTick(speed),
        }
    }

    /// Distance covered in one tick at `tick_rate` ticks per second.
    pub fn speed(&self, tick_rate: f32) -> f32 {
        match self.rate {
            SlideRate::PerSecond(per_second) => per_second / tick_rate,
            SlideRate::PerTick(speed) => speed,
        }
    }

    /// Move `value` one tick toward the target, never past it.
    pub fn step(&self, value: &mut f32, tick_rate: f32) -> SlideStep {
        if *value == self.target {
            return SlideStep::Done;
        }
        let speed = self.speed(tick_rate);
        let remaining = (self.target - *value).abs();
        *value = match self.rate {
            SlideRate::PerSecond(_) if remaining <= speed * (1.0 + SNAP_TOLERANCE) => self.target,
            _ => slide_toward(*value, self.target, speed),
        };
        SlideStep::Moved
    }
}

/// One slide step from `value` toward `target`: `min(speed, remaining)`.
pub fn slide_toward(value: f32, target: f32, speed: f32) -> f32 {
    let remaining = (target - value).abs();
    if speed.is_nan() || speed <= 0.0 || remaining <= speed {
        return target;
    }
    if target > value {
        value + speed
    } else {
        value - speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_completion(mut value: f32, slide: Slide, tick_rate: f32, limit: usize) -> (f32, usize) {
        let mut ticks = 0;
        while slide.step(&mut value, tick_rate) == SlideStep::Moved {
            ticks += 1;
            assert!(ticks <= limit, "slide did not converge");
        }
        (value, ticks)
    }

    #[test]
    fn zero_to_hundred_in_sixty_ticks() {
        let slide = Slide::over(0.0, 100.0, 1.0);
        let mut value = 0.0;
        for tick in 1..=60 {
            assert_eq!(slide.step(&mut value, DEFAULT_TICK_RATE), SlideStep::Moved);
            assert!(value <= 100.0, "overshoot at tick {tick}: {value}");
            if tick < 60 {
                assert!(value < 100.0, "arrived early at tick {tick}");
            }
        }
        assert_eq!(value, 100.0);
        assert_eq!(slide.step(&mut value, DEFAULT_TICK_RATE), SlideStep::Done);
    }

    #[test]
    fn never_overshoots_for_various_durations() {
        for seconds in [0.25_f32, 0.5, 1.0, 2.0, 3.0] {
            let slide = Slide::over(-40.0, 75.0, seconds);
            let mut value = -40.0;
            let mut prev = value;
            let mut ticks = 0;
            while slide.step(&mut value, DEFAULT_TICK_RATE) == SlideStep::Moved {
                ticks += 1;
                assert!(value >= prev, "not monotonic");
                assert!(value <= 75.0, "overshoot");
                prev = value;
            }
            assert_eq!(value, 75.0);
            assert_eq!(ticks, (seconds * DEFAULT_TICK_RATE).round() as usize);
        }
    }

    #[test]
    fn duration_follows_the_tick_rate() {
        let slide = Slide::over(0.0, 60.0, 1.0);
        assert_eq!(run_to_completion(0.0, slide, 30.0, 100), (60.0, 30));
        assert_eq!(run_to_completion(0.0, slide, 120.0, 200), (60.0, 120));
    }

    #[test]
    fn slides_downward() {
        let slide = Slide::over(10.0, -10.0, 0.5);
        let (value, ticks) = run_to_completion(10.0, slide, DEFAULT_TICK_RATE, 100);
        assert_eq!(value, -10.0);
        assert_eq!(ticks, 30);
    }

    #[test]
    fn zero_duration_snaps() {
        let slide = Slide::over(3.0, 90.0, 0.0);
        let mut value = 3.0;
        assert_eq!(slide.step(&mut value, DEFAULT_TICK_RATE), SlideStep::Moved);
        assert_eq!(value, 90.0);
        assert_eq!(slide.step(&mut value, DEFAULT_TICK_RATE), SlideStep::Done);
    }

    #[test]
    fn fixed_speed_clamps_final_step() {
        let slide = Slide::with_speed(12.0, 5.0);
        let mut value = 0.0;
        slide.step(&mut value, DEFAULT_TICK_RATE);
        assert_eq!(value, 5.0);
        slide.step(&mut value, DEFAULT_TICK_RATE);
        assert_eq!(value, 10.0);
        slide.step(&mut value, DEFAULT_TICK_RATE);
        assert_eq!(value, 12.0);
    }

    #[test]
    fn fixed_speed_never_steps_further_than_speed() {
        let slide = Slide::with_speed(10.005, 1.0);
        let mut value = 0.0;
        for _ in 0..10 {
            let before = value;
            slide.step(&mut value, DEFAULT_TICK_RATE);
            assert!(value - before <= 1.0);
        }
        assert!((value - 10.0).abs() < 1e-4);
        slide.step(&mut value, DEFAULT_TICK_RATE);
        assert_eq!(value, 10.005);
    }

    #[test]
    fn non_positive_speed_snaps() {
        assert_eq!(slide_toward(0.0, 8.0, 0.0), 8.0);
        assert_eq!(slide_toward(0.0, 8.0, f32::NAN), 8.0);
    }
}
