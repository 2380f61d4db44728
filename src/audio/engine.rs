use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use super::types::{AudioCommand, AudioData, AudioEvent, PlaybackState};
use super::Transport;

/// How often (in output frames) to send position updates.
const POSITION_UPDATE_INTERVAL: usize = 2048;

struct EngineState {
    audio: Option<Arc<AudioData>>,
    /// Read position in source frames; fractional when rates differ.
    position: f64,
    playing: bool,
    output_sample_rate: u32,
    frames_since_update: usize,
}

impl EngineState {
    fn new(output_sample_rate: u32) -> Self {
        Self {
            audio: None,
            position: 0.0,
            playing: false,
            output_sample_rate,
            frames_since_update: 0,
        }
    }

    fn position_secs(&self) -> f64 {
        match &self.audio {
            Some(audio) if audio.sample_rate > 0 => self.position / audio.sample_rate as f64,
            _ => 0.0,
        }
    }

    fn handle_command(&mut self, cmd: AudioCommand, event_tx: &Sender<AudioEvent>) {
        match cmd {
            AudioCommand::Load(data) => {
                self.audio = Some(data);
                self.position = 0.0;
                self.playing = false;
                self.frames_since_update = 0;
            }
            AudioCommand::Unload => {
                self.audio = None;
                self.position = 0.0;
                self.playing = false;
            }
            AudioCommand::Play => {
                if let Some(audio) = &self.audio {
                    // Playing from the end starts over.
                    if self.position as usize >= audio.num_frames() {
                        self.position = 0.0;
                    }
                    self.playing = true;
                }
            }
            AudioCommand::Pause => {
                self.playing = false;
            }
            AudioCommand::Seek(time) => {
                if let Some(audio) = &self.audio {
                    let frame = (time.max(0.0) * audio.sample_rate as f64).floor();
                    self.position = frame.min(audio.num_frames() as f64);
                    let _ = event_tx.try_send(AudioEvent::PositionChanged(self.position_secs()));
                }
            }
        }
    }

    /// Fill the output buffer with the current track.
    fn fill_buffer(&mut self, output: &mut [f32], channels: u16, event_tx: &Sender<AudioEvent>) {
        let audio = match &self.audio {
            Some(a) if self.playing => a.clone(),
            _ => {
                output.fill(0.0);
                return;
            }
        };

        let out_channels = channels.max(1) as usize;
        let total_frames = audio.num_frames();
        let step = audio.sample_rate as f64 / self.output_sample_rate.max(1) as f64;

        for frame in output.chunks_mut(out_channels) {
            if !self.playing {
                frame.fill(0.0);
                continue;
            }

            let index = self.position as usize;
            if index >= total_frames {
                // Playback finished
                self.playing = false;
                self.position = total_frames as f64;
                let _ = event_tx.try_send(AudioEvent::PositionChanged(self.position_secs()));
                let _ = event_tx.try_send(AudioEvent::PlaybackFinished);
                frame.fill(0.0);
                continue;
            }

            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = audio.sample(c, index);
            }
            self.position += step;

            self.frames_since_update += 1;
            if self.frames_since_update >= POSITION_UPDATE_INTERVAL {
                self.frames_since_update = 0;
                let _ = event_tx.try_send(AudioEvent::PositionChanged(self.position_secs()));
            }
        }
    }
}

/// Spawn the audio engine thread and return command/event channels.
pub fn spawn_engine() -> Result<(Sender<AudioCommand>, Receiver<AudioEvent>)> {
    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<AudioCommand>(64);
    let (event_tx, event_rx) = crossbeam_channel::bounded::<AudioEvent>(256);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No audio output device found"))?;

    let config = device
        .default_output_config()
        .context("Failed to get output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels();
    let sample_format = config.sample_format();
    log::info!("Audio output: {sample_rate} Hz, {channels} channels, {sample_format:?}");

    let mut state = EngineState::new(sample_rate);
    let event_tx_clone = event_tx.clone();

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(cmd) = cmd_rx.try_recv() {
                        state.handle_command(cmd, &event_tx_clone);
                    }
                    state.fill_buffer(data, channels, &event_tx_clone);
                },
                move |err| {
                    log::error!("Audio stream error: {err}");
                    let _ = event_tx.try_send(AudioEvent::Error(err.to_string()));
                },
                None,
            )
            .context("Failed to build output stream")?,
        _ => return Err(anyhow!("Unsupported sample format: {sample_format:?}")),
    };

    stream.play().context("Failed to start stream")?;

    // Keep stream alive by moving it into a thread
    std::thread::Builder::new()
        .name("audio-keepalive".into())
        .spawn(move || {
            let _stream = stream;
            loop {
                std::thread::park();
            }
        })
        .context("Failed to spawn keepalive thread")?;

    Ok((cmd_tx, event_rx))
}

/// UI-side end of the engine: sends commands and mirrors the playback state
/// from the events coming back.
pub struct EngineHandle {
    channels: Option<(Sender<AudioCommand>, Receiver<AudioEvent>)>,
    audio: Option<Arc<AudioData>>,
    state: PlaybackState,
}

impl EngineHandle {
    /// A handle that tracks state but has no audio thread behind it (yet).
    pub fn detached() -> Self {
        Self {
            channels: None,
            audio: None,
            state: PlaybackState::default(),
        }
    }

    /// Connect an engine that finished starting after this handle was made.
    ///
    /// Whatever is already loaded is handed over at the mirrored position.
    pub fn attach(&mut self, cmd_tx: Sender<AudioCommand>, event_rx: Receiver<AudioEvent>) {
        self.channels = Some((cmd_tx, event_rx));
        if let Some(audio) = self.audio.clone() {
            self.send(AudioCommand::Load(audio));
            self.send(AudioCommand::Seek(self.state.current_time));
            if !self.state.paused {
                self.send(AudioCommand::Play);
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.channels.is_some()
    }

    /// Throw away notifications that belong to the previous track.
    fn discard_events(&self) {
        if let Some((_, rx)) = &self.channels {
            while rx.try_recv().is_ok() {}
        }
    }

    /// Drop position reports queued before a seek; they describe where
    /// playback was, not where it is going.
    fn discard_positions(&mut self) {
        let Some((_, rx)) = &self.channels else {
            return;
        };
        let pending: Vec<AudioEvent> = rx.try_iter().collect();
        for event in pending {
            match event {
                AudioEvent::PositionChanged(_) => {}
                AudioEvent::PlaybackFinished => self.state.paused = true,
                AudioEvent::Error(e) => log::warn!("Audio engine error: {e}"),
            }
        }
    }

    fn send(&self, cmd: AudioCommand) {
        if let Some((tx, _)) = &self.channels {
            if let Err(e) = tx.try_send(cmd) {
                log::warn!("Dropping audio command: {e}");
            }
        }
    }
}

impl Transport for EngineHandle {
    fn load(&mut self, audio: Arc<AudioData>) {
        self.discard_events();
        self.state = PlaybackState {
            current_time: 0.0,
            duration: audio.duration,
            paused: true,
        };
        self.audio = Some(audio.clone());
        self.send(AudioCommand::Load(audio));
    }

    fn unload(&mut self) {
        self.discard_events();
        self.audio = None;
        self.state = PlaybackState::default();
        self.send(AudioCommand::Unload);
    }

    fn play(&mut self) {
        if self.state.duration <= 0.0 {
            return;
        }
        if self.state.current_time >= self.state.duration {
            self.state.current_time = 0.0;
        }
        self.state.paused = false;
        self.send(AudioCommand::Play);
    }

    fn pause(&mut self) {
        self.state.paused = true;
        self.send(AudioCommand::Pause);
    }

    fn seek(&mut self, seconds: f64) {
        self.discard_positions();
        self.state.current_time = seconds.clamp(0.0, self.state.duration.max(0.0));
        self.send(AudioCommand::Seek(seconds));
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn poll_events(&mut self) -> Vec<AudioEvent> {
        let Some((_, rx)) = &self.channels else {
            return Vec::new();
        };
        let events: Vec<AudioEvent> = rx.try_iter().collect();
        for event in &events {
            match event {
                AudioEvent::PositionChanged(pos) => self.state.current_time = *pos,
                AudioEvent::PlaybackFinished => self.state.paused = true,
                AudioEvent::Error(_) => {}
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, sample_rate: u32) -> Arc<AudioData> {
        let plane = (0..frames).map(|i| i as f32 / frames as f32).collect();
        Arc::new(AudioData::new(vec![plane], sample_rate))
    }

    #[test]
    fn test_silent_until_played() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut state = EngineState::new(8_000);
        state.handle_command(AudioCommand::Load(ramp(100, 8_000)), &tx);

        let mut out = [1.0f32; 8];
        state.fill_buffer(&mut out, 2, &tx);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_mono_source_fills_every_output_channel() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut state = EngineState::new(8_000);
        state.handle_command(AudioCommand::Load(ramp(100, 8_000)), &tx);
        state.handle_command(AudioCommand::Play, &tx);

        let mut out = [0.0f32; 6];
        state.fill_buffer(&mut out, 2, &tx);
        assert_eq!(out, [0.0, 0.0, 0.01, 0.01, 0.02, 0.02]);
        assert!((state.position - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_mismatch_steps_position() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut state = EngineState::new(16_000);
        state.handle_command(AudioCommand::Load(ramp(100, 8_000)), &tx);
        state.handle_command(AudioCommand::Play, &tx);

        let mut out = [0.0f32; 4];
        state.fill_buffer(&mut out, 1, &tx);
        assert!((state.position - 2.0).abs() < 1e-9);
        assert_eq!(out[0], out[1]);
    }

    #[test]
    fn test_finish_emits_event_and_restarts_on_play() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut state = EngineState::new(8_000);
        state.handle_command(AudioCommand::Load(ramp(4, 8_000)), &tx);
        state.handle_command(AudioCommand::Play, &tx);

        let mut out = [1.0f32; 8];
        state.fill_buffer(&mut out, 1, &tx);
        assert!(!state.playing);
        assert!(out[4..].iter().all(|&s| s == 0.0));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&AudioEvent::PlaybackFinished));

        state.handle_command(AudioCommand::Play, &tx);
        assert_eq!(state.position, 0.0);
        assert!(state.playing);
    }

    #[test]
    fn test_seek_reports_position() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut state = EngineState::new(8_000);
        state.handle_command(AudioCommand::Load(ramp(8_000, 8_000)), &tx);
        state.handle_command(AudioCommand::Seek(0.25), &tx);

        assert_eq!(rx.try_recv().unwrap(), AudioEvent::PositionChanged(0.25));

        state.handle_command(AudioCommand::Seek(10.0), &tx);
        assert_eq!(rx.try_recv().unwrap(), AudioEvent::PositionChanged(1.0));
    }

    #[test]
    fn test_position_updates_are_periodic() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut state = EngineState::new(8_000);
        state.handle_command(AudioCommand::Load(ramp(10_000, 8_000)), &tx);
        state.handle_command(AudioCommand::Play, &tx);

        let mut out = vec![0.0f32; POSITION_UPDATE_INTERVAL * 2];
        state.fill_buffer(&mut out, 1, &tx);
        assert_eq!(rx.try_iter().count(), 2);
    }

    fn attached() -> (EngineHandle, Receiver<AudioCommand>, Sender<AudioEvent>) {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let mut handle = EngineHandle::detached();
        handle.attach(cmd_tx, event_rx);
        (handle, cmd_rx, event_tx)
    }

    #[test]
    fn test_seek_ignores_positions_queued_before_it() {
        let (mut handle, cmd_rx, event_tx) = attached();
        handle.load(ramp(120 * 8_000, 8_000));
        handle.play();

        // The callback reported progress before it picked up the seek.
        event_tx.send(AudioEvent::PositionChanged(60.0)).unwrap();
        handle.seek(2.5);
        handle.poll_events();
        assert_eq!(handle.state().current_time, 2.5);

        // Reports after the seek are applied as usual.
        event_tx.send(AudioEvent::PositionChanged(2.75)).unwrap();
        handle.poll_events();
        assert_eq!(handle.state().current_time, 2.75);

        let sent: Vec<AudioCommand> = cmd_rx.try_iter().collect();
        assert!(matches!(sent.last(), Some(AudioCommand::Seek(t)) if *t == 2.5));
    }

    #[test]
    fn test_seek_keeps_queued_finish() {
        let (mut handle, _cmd_rx, event_tx) = attached();
        handle.load(ramp(8_000, 8_000));
        handle.play();

        event_tx.send(AudioEvent::PositionChanged(1.0)).unwrap();
        event_tx.send(AudioEvent::PlaybackFinished).unwrap();
        handle.seek(0.25);
        let state = handle.state();
        assert!(state.paused);
        assert_eq!(state.current_time, 0.25);
    }

    #[test]
    fn test_late_attach_hands_over_loaded_track() {
        let mut handle = EngineHandle::detached();
        assert!(!handle.is_attached());
        handle.load(ramp(8_000, 8_000));
        handle.play();
        handle.seek(0.5);

        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (_event_tx, event_rx) = crossbeam_channel::unbounded();
        handle.attach(cmd_tx, event_rx);
        assert!(handle.is_attached());

        let sent: Vec<AudioCommand> = cmd_rx.try_iter().collect();
        assert_eq!(sent.len(), 3);
        assert!(matches!(&sent[0], AudioCommand::Load(audio) if audio.num_frames() == 8_000));
        assert!(matches!(sent[1], AudioCommand::Seek(t) if t == 0.5));
        assert!(matches!(sent[2], AudioCommand::Play));
    }

    #[test]
    fn test_attach_without_track_sends_nothing() {
        let (_handle, cmd_rx, _event_tx) = attached();
        assert!(cmd_rx.try_recv().is_err());
    }

    #[test]
    fn test_detached_handle_tracks_state() {
        let mut handle = EngineHandle::detached();
        handle.play();
        assert!(handle.state().paused, "nothing loaded yet");

        handle.load(ramp(8_000, 8_000));
        handle.play();
        handle.seek(0.5);
        let state = handle.state();
        assert!(!state.paused);
        assert_eq!(state.current_time, 0.5);
        assert_eq!(state.duration, 1.0);
        assert!(handle.poll_events().is_empty());

        handle.unload();
        assert_eq!(handle.state(), PlaybackState::default());
    }
}
