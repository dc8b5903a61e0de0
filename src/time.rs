use std::time::{Duration, Instant};

/// Frame clock. `tick` once at the top of a frame; everything after reads the same instant.
pub struct FrameClock {
    start: Instant,
    last: Instant,
    delta: Duration,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self { start, last: start, delta: Duration::ZERO, frames: 0 }
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let now = now.max(self.last);
        self.delta = now - self.last;
        self.last = now;
        self.frames = self.frames.wrapping_add(1);
        self.delta.as_secs_f32()
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Seconds since start as of the last tick; the animation parameter `t`.
    pub fn elapsed_seconds(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_reports_delta_and_elapsed() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        assert_eq!(clock.elapsed_seconds(), 0.0);
        let dt = clock.tick_at(start + Duration::from_millis(250));
        assert!((dt - 0.25).abs() < 1e-6);
        clock.tick_at(start + Duration::from_millis(400));
        assert!((clock.delta_seconds() - 0.15).abs() < 1e-6);
        assert!((clock.elapsed_seconds() - 0.4).abs() < 1e-6);
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn clock_never_runs_backwards() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start + Duration::from_secs(1));
        let dt = clock.tick_at(start);
        assert_eq!(dt, 0.0);
    }
}
