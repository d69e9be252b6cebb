use std::time::Instant;

/// Monotonic source of elapsed seconds, queried once per frame.
pub trait Clock {
    fn elapsed_secs(&mut self) -> f64;
}

/// Wall clock that starts counting on its first query.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    start: Option<Instant>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for MonotonicClock {
    fn elapsed_secs(&mut self) -> f64 {
        self.start.get_or_insert_with(Instant::now).elapsed().as_secs_f64()
    }
}

/// Clock advanced by hand. Used for headless rendering and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualClock {
    now: f64,
}

impl ManualClock {
    pub fn at(now: f64) -> Self {
        Self { now }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds.max(0.0);
    }
}

impl Clock for ManualClock {
    fn elapsed_secs(&mut self) -> f64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_starts_near_zero_and_never_decreases() {
        let mut clock = MonotonicClock::new();
        let first = clock.elapsed_secs();
        assert!(first < 1.0);
        let second = clock.elapsed_secs();
        assert!(second >= first);
    }

    #[test]
    fn manual_clock_only_moves_forward() {
        let mut clock = ManualClock::at(1.5);
        assert_eq!(clock.elapsed_secs(), 1.5);
        clock.advance(0.5);
        assert_eq!(clock.elapsed_secs(), 2.0);
        clock.advance(-3.0);
        assert_eq!(clock.elapsed_secs(), 2.0);
    }
}
