//! Audio waveform viewer with playback-synchronized playhead.
//!
//! [`player::WaveformPlayer`] is the controller; [`audio`] holds decoding and
//! the cpal playback engine; [`ui`] draws the surface and the controls.

pub mod app;
pub mod audio;
pub mod config;
pub mod peaks;
pub mod player;
pub mod ui;
