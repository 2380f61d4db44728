use std::sync::Arc;

/// Decoded audio data stored entirely in memory.
#[derive(Clone, Debug)]
pub struct AudioData {
    /// One sample vector per channel, normalized to [-1.0, 1.0].
    pub planes: Vec<Vec<f32>>,
    pub sample_rate: u32,
    /// Duration in seconds.
    pub duration: f64,
}

impl AudioData {
    pub fn new(planes: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = planes.first().map_or(0, Vec::len);
        let duration = if sample_rate > 0 {
            frames as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            planes,
            sample_rate,
            duration,
        }
    }

    /// Total number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Samples of the first channel; the waveform only ever looks at this one.
    pub fn channel0(&self) -> &[f32] {
        self.planes.first().map_or(&[], Vec::as_slice)
    }

    /// Sample at `frame` for `channel`, wrapping channels that don't exist.
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        if self.planes.is_empty() {
            return 0.0;
        }
        self.planes[channel % self.planes.len()]
            .get(frame)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Commands sent from the UI thread to the audio thread.
#[derive(Debug, Clone)]
pub enum AudioCommand {
    Load(Arc<AudioData>),
    Unload,
    Play,
    Pause,
    Seek(f64),
}

/// Events sent from the audio thread to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    PositionChanged(f64),
    PlaybackFinished,
    Error(String),
}

/// Snapshot of the playback primitive: position, length and pause flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            paused: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_follows_frames_and_rate() {
        let audio = AudioData::new(vec![vec![0.0; 44_100], vec![0.0; 44_100]], 22_050);
        assert_eq!(audio.num_frames(), 44_100);
        assert_eq!(audio.channels(), 2);
        assert!((audio.duration - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_wraps_missing_channels() {
        let audio = AudioData::new(vec![vec![0.25, -0.5]], 8_000);
        assert_eq!(audio.sample(1, 1), -0.5);
        assert_eq!(audio.sample(0, 7), 0.0);
        assert_eq!(audio.channel0(), &[0.25, -0.5]);
    }

    #[test]
    fn test_empty_audio_is_harmless() {
        let audio = AudioData::new(Vec::new(), 0);
        assert_eq!(audio.num_frames(), 0);
        assert_eq!(audio.duration, 0.0);
        assert!(audio.channel0().is_empty());
        assert_eq!(audio.sample(3, 3), 0.0);
    }
}
