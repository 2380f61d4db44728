//! Waveform player controller.
//!
//! Owns the render surface and drives it in one of three modes:
//!
//! - **Demo**: synthetic wave, redrawn every frame. Initial mode, and where
//!   every failed load ends up.
//! - **Decoding**: a load is in flight; the surface shows the bare grid.
//! - **Loaded**: decoded peaks with a playhead, redrawn on playback position
//!   updates.
//!
//! Loads are two-step so the host can run the fetch/decode wherever it likes:
//! [`WaveformPlayer::load`] hands back a [`LoadRequest`], and the outcome is
//! reported through [`WaveformPlayer::complete_load`]. Each request carries a
//! generation number; completions for anything but the latest request are
//! dropped.

use std::sync::Arc;
use std::time::Instant;

use crate::audio::decoder::LoadError;
use crate::audio::types::{AudioData, AudioEvent};
use crate::audio::Transport;
use crate::config::SurfaceConfig;
use crate::peaks::PeakBuffer;
use crate::ui::demo::DemoAnimator;
use crate::ui::waveform::{Palette, Renderer, Scene};

/// Seek control range is `0..=SEEK_RESOLUTION`.
pub const SEEK_RESOLUTION: u16 = 1000;

const PLAY_LABEL: &str = "Play";
const PAUSE_LABEL: &str = "Pause";
const STATUS_DEMO: &str = "Waveform: demo (no audio loaded)";
const STATUS_DECODING: &str = "Waveform: decoding...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Demo,
    Decoding,
    Loaded,
}

/// What should trigger the next redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawDriver {
    EveryFrame,
    OnPositionUpdate,
}

/// The track currently shown.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResource {
    pub url: String,
    pub duration: f64,
}

/// A fetch/decode the host has to run and report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub generation: u64,
    pub url: String,
}

/// Values written back to the surrounding controls.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub play_label: &'static str,
    pub timecode: String,
    pub seek: u16,
    pub status: String,
}

impl Readout {
    fn reset(status: &str) -> Self {
        Self {
            play_label: PLAY_LABEL,
            timecode: format_timecode(0.0),
            seek: 0,
            status: status.to_string(),
        }
    }
}

enum Mode {
    Demo,
    Decoding {
        url: String,
    },
    Loaded {
        resource: AudioResource,
        peaks: PeakBuffer,
    },
}

pub struct WaveformPlayer<T: Transport> {
    transport: T,
    renderer: Renderer,
    surface: SurfaceConfig,
    demo: DemoAnimator,
    mode: Mode,
    driver: Option<RedrawDriver>,
    generation: u64,
    readout: Readout,
}

impl<T: Transport> WaveformPlayer<T> {
    /// A player in demo mode on a fallback-sized surface.
    pub fn new(transport: T, surface: SurfaceConfig, palette: Palette) -> Self {
        let renderer = Renderer::new(
            surface.fallback_width,
            surface.fallback_height,
            surface.pixel_ratio(1.0),
            palette,
        );
        let mut player = Self {
            transport,
            renderer,
            surface,
            demo: DemoAnimator::new(),
            mode: Mode::Demo,
            driver: None,
            generation: 0,
            readout: Readout::reset(STATUS_DEMO),
        };
        player.start_demo(Instant::now());
        player
    }

    pub fn mode(&self) -> RenderMode {
        match self.mode {
            Mode::Demo => RenderMode::Demo,
            Mode::Decoding { .. } => RenderMode::Decoding,
            Mode::Loaded { .. } => RenderMode::Loaded,
        }
    }

    pub fn active_driver(&self) -> Option<RedrawDriver> {
        self.driver
    }

    pub fn readout(&self) -> &Readout {
        &self.readout
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn peaks(&self) -> Option<&PeakBuffer> {
        match &self.mode {
            Mode::Loaded { peaks, .. } => Some(peaks),
            _ => None,
        }
    }

    pub fn resource(&self) -> Option<&AudioResource> {
        match &self.mode {
            Mode::Loaded { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Start showing `url`, or the demo wave when there is none.
    ///
    /// Returns the fetch/decode the caller must perform. Never fails: a bad
    /// resource only shows up later as a fallback to demo mode.
    pub fn load(&mut self, url: Option<&str>) -> Option<LoadRequest> {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            self.start_demo(Instant::now());
            return None;
        };

        // Only one redraw driver at a time: the demo loop stops before the fetch starts.
        self.cancel_driver();
        self.transport.unload();

        self.generation += 1;
        self.mode = Mode::Decoding {
            url: url.to_string(),
        };
        self.readout = Readout::reset(STATUS_DECODING);
        log::debug!("Decoding {url} (generation {})", self.generation);
        self.redraw();

        Some(LoadRequest {
            generation: self.generation,
            url: url.to_string(),
        })
    }

    /// Report how the fetch/decode for `generation` went.
    pub fn complete_load(&mut self, generation: u64, result: Result<Arc<AudioData>, LoadError>) {
        if generation != self.generation {
            log::debug!(
                "Dropping stale decode (generation {generation}, current {})",
                self.generation
            );
            return;
        }
        let Mode::Decoding { url } = &self.mode else {
            log::debug!("Decode finished outside of decoding mode, ignoring");
            return;
        };
        let url = url.clone();

        match result {
            Ok(audio) => {
                let peaks = PeakBuffer::compute(audio.channel0(), self.renderer.width() as usize);
                let resource = AudioResource {
                    url,
                    duration: audio.duration,
                };
                log::info!(
                    "Loaded {} ({:.2}s, {} ch @ {} Hz, {} peaks)",
                    resource.url,
                    resource.duration,
                    audio.channels(),
                    audio.sample_rate,
                    peaks.len()
                );

                self.transport.load(audio);
                self.readout.status = format!("Waveform: {}s", resource.duration.round());
                self.mode = Mode::Loaded { resource, peaks };
                self.driver = Some(RedrawDriver::OnPositionUpdate);
                self.redraw();
            }
            Err(e) => {
                log::warn!("Falling back to demo waveform: {e}");
                self.start_demo(Instant::now());
            }
        }
    }

    /// Play/pause toggle. Does nothing until a track is loaded.
    pub fn toggle_play(&mut self) {
        if !matches!(self.mode, Mode::Loaded { .. }) {
            return;
        }
        if self.transport.state().paused {
            self.transport.play();
            self.readout.play_label = PAUSE_LABEL;
        } else {
            self.transport.pause();
            self.readout.play_label = PLAY_LABEL;
        }
    }

    /// Seek control moved to `position` out of [`SEEK_RESOLUTION`].
    pub fn seek(&mut self, position: u16) {
        if !matches!(self.mode, Mode::Loaded { .. }) {
            return;
        }
        let position = position.min(SEEK_RESOLUTION);
        let duration = self.transport.state().duration;
        let time = position as f64 / SEEK_RESOLUTION as f64 * duration;
        if time.is_finite() {
            self.transport.seek(time);
            self.sync_position();
            self.redraw();
        }
    }

    /// Per-frame callback; only draws while the demo loop is the active driver.
    pub fn on_frame(&mut self, now: Instant) -> bool {
        if self.driver != Some(RedrawDriver::EveryFrame) {
            return false;
        }
        let t_ms = self.demo.elapsed_ms(now).unwrap_or(0.0);
        self.renderer.draw(&Scene::Demo { t_ms });
        true
    }

    /// Position-update callback; drains transport notifications while loaded.
    pub fn on_position_update(&mut self) -> bool {
        if self.driver != Some(RedrawDriver::OnPositionUpdate) {
            return false;
        }

        let mut moved = false;
        for event in self.transport.poll_events() {
            match event {
                AudioEvent::PositionChanged(_) => moved = true,
                AudioEvent::PlaybackFinished => self.readout.play_label = PLAY_LABEL,
                AudioEvent::Error(e) => log::warn!("Playback error: {e}"),
            }
        }

        if moved {
            self.sync_position();
            self.redraw();
        }
        moved
    }

    /// Layout or display scale changed. Redraws at once with the current
    /// amplitude source; the peak buffer keeps the width it was decoded at.
    ///
    /// `display_ratio` is the window's scale factor; a configured pixel ratio
    /// takes precedence over it.
    pub fn resize(&mut self, logical_width: f32, logical_height: f32, display_ratio: f32) {
        let width = if logical_width > 0.0 {
            logical_width
        } else {
            self.surface.fallback_width
        };
        let height = if logical_height > 0.0 {
            logical_height
        } else {
            self.surface.fallback_height
        };

        let pixel_ratio = self.surface.pixel_ratio(display_ratio);

        let scene = scene_for(&self.mode, &self.transport, &self.demo, Instant::now());
        self.renderer.resize(width, height, pixel_ratio, &scene);
    }

    fn start_demo(&mut self, now: Instant) {
        // Anything still decoding is now stale.
        self.generation += 1;
        self.cancel_driver();
        self.transport.unload();

        self.mode = Mode::Demo;
        self.readout = Readout::reset(STATUS_DEMO);
        self.demo.start(now);
        self.driver = Some(RedrawDriver::EveryFrame);
        log::debug!("Demo waveform running");
        self.on_frame(now);
    }

    fn cancel_driver(&mut self) {
        self.demo.stop();
        self.driver = None;
    }

    fn sync_position(&mut self) {
        let state = self.transport.state();
        if state.duration > 0.0 {
            let fraction = (state.current_time / state.duration).clamp(0.0, 1.0);
            self.readout.seek = (fraction * SEEK_RESOLUTION as f64).floor() as u16;
        }
        self.readout.timecode = format_timecode(state.current_time);
    }

    fn redraw(&mut self) {
        let scene = scene_for(&self.mode, &self.transport, &self.demo, Instant::now());
        self.renderer.draw(&scene);
    }
}

fn scene_for<'a, T: Transport>(
    mode: &'a Mode,
    transport: &T,
    demo: &DemoAnimator,
    now: Instant,
) -> Scene<'a> {
    match mode {
        Mode::Demo => Scene::Demo {
            t_ms: demo.elapsed_ms(now).unwrap_or(0.0),
        },
        Mode::Decoding { .. } => Scene::Blank,
        Mode::Loaded { peaks, .. } => {
            let state = transport.state();
            Scene::Loaded {
                peaks,
                current_time: state.current_time,
                duration: state.duration,
            }
        }
    }
}

/// Format seconds as MM:SS.
pub fn format_timecode(seconds: f64) -> String {
    let total_secs = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
