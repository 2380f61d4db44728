use std::time::Instant;

/// Synthetic waveform height in [0, 0.9] for column `x` at animation time `t_ms`.
///
/// Two rectified sines at unrelated spatial and temporal rates, so the pattern
/// never visibly repeats across the surface.
pub fn demo_amplitude(x: f32, t_ms: f64) -> f32 {
    let x = x as f64;
    let s1 = (x / 25.0 + t_ms / 400.0).sin();
    let s2 = (x / 9.0 - t_ms / 250.0).sin();
    ((s1.abs() * 0.55 + s2.abs() * 0.45) * 0.9) as f32
}

/// Per-frame clock for the demo waveform.
#[derive(Debug, Default)]
pub struct DemoAnimator {
    started: Option<Instant>,
}

impl DemoAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the clock at `now`.
    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Milliseconds since start, or `None` once stopped.
    pub fn elapsed_ms(&self, now: Instant) -> Option<f64> {
        self.started
            .map(|started| now.saturating_duration_since(started).as_secs_f64() * 1000.0)
    }
}
