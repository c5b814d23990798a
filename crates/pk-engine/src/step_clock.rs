//! Tempo-relative step timing.

use core::time::Duration;
use pk_ir::{StepDivision, MAX_BPM, MIN_BPM, MIN_STEPS_PER_BEAT};

/// Tempo, beat subdivision and gate, with the derived step and gate lengths.
///
/// `step_time = 60 / bpm / steps` and `gate_duration = gate * step_time`,
/// recomputed on every setter so `gate_duration <= step_time` always holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepClock {
    bpm: f32,
    steps: f32,
    gate: f32,
    step_time: Duration,
    gate_duration: Duration,
}

impl StepClock {
    /// Create a clock. Out-of-range values are clamped.
    pub fn new(bpm: f32, steps: f32, gate: f32) -> Self {
        let mut clock = Self {
            bpm: 120.0,
            steps: 2.0,
            gate: 0.5,
            step_time: Duration::ZERO,
            gate_duration: Duration::ZERO,
        };
        clock.bpm = clamp_bpm(bpm);
        clock.steps = clamp_steps(steps);
        clock.gate = clamp_gate(gate);
        clock.recompute();
        clock
    }

    pub fn with_division(bpm: f32, division: StepDivision, gate: f32) -> Self {
        Self::new(bpm, division.steps_per_beat(), gate)
    }

    fn recompute(&mut self) {
        self.step_time = Duration::from_secs_f32(60.0 / self.bpm / self.steps);
        self.gate_duration = self.step_time.mul_f32(self.gate).min(self.step_time);
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = clamp_bpm(bpm);
        self.recompute();
    }

    /// Steps per beat.
    pub fn steps(&self) -> f32 {
        self.steps
    }

    /// Set steps per beat. Values below one step per whole note are raised.
    pub fn set_steps(&mut self, steps: f32) {
        self.steps = clamp_steps(steps);
        self.recompute();
    }

    pub fn set_division(&mut self, division: StepDivision) {
        self.set_steps(division.steps_per_beat());
    }

    pub fn gate(&self) -> f32 {
        self.gate
    }

    pub fn set_gate(&mut self, gate: f32) {
        self.gate = clamp_gate(gate);
        self.recompute();
    }

    pub fn step_time(&self) -> Duration {
        self.step_time
    }

    pub fn gate_duration(&self) -> Duration {
        self.gate_duration
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new(120.0, StepDivision::Eighth.steps_per_beat(), 0.5)
    }
}

fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_nan() {
        MIN_BPM
    } else {
        bpm.clamp(MIN_BPM, MAX_BPM)
    }
}

fn clamp_steps(steps: f32) -> f32 {
    if steps.is_nan() {
        MIN_STEPS_PER_BEAT
    } else {
        steps.max(MIN_STEPS_PER_BEAT)
    }
}

fn clamp_gate(gate: f32) -> f32 {
    pk_ir::clamp_velocity(gate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derived_durations() {
        let clock = StepClock::new(120.0, 1.0, 0.5);
        assert_relative_eq!(clock.step_time().as_secs_f32(), 0.5, epsilon = 1e-6);
        assert_relative_eq!(clock.gate_duration().as_secs_f32(), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn setters_recompute() {
        let mut clock = StepClock::new(120.0, 1.0, 0.5);
        clock.set_bpm(60.0);
        assert_relative_eq!(clock.step_time().as_secs_f32(), 1.0, epsilon = 1e-6);
        clock.set_division(StepDivision::Sixteenth);
        assert_relative_eq!(clock.step_time().as_secs_f32(), 0.25, epsilon = 1e-6);
        clock.set_gate(1.0);
        assert_eq!(clock.gate_duration(), clock.step_time());
    }

    #[test]
    fn invalid_values_are_clamped() {
        let clock = StepClock::new(0.0, 0.01, 2.0);
        assert_eq!(clock.bpm(), MIN_BPM);
        assert_eq!(clock.steps(), MIN_STEPS_PER_BEAT);
        assert_eq!(clock.gate(), 1.0);
        assert!(clock.gate_duration() <= clock.step_time());

        let clock = StepClock::new(-5.0, f32::NAN, -1.0);
        assert_eq!(clock.bpm(), MIN_BPM);
        assert_eq!(clock.gate(), 0.0);
        assert_eq!(clock.gate_duration(), Duration::ZERO);
    }
}
