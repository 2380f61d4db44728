//! Decoding and playback.
//!
//! The [`Transport`] trait is the seam between the waveform controller and
//! whatever actually produces sound; [`engine::EngineHandle`] is the cpal one.

pub mod decoder;
pub mod engine;
pub mod types;

use std::sync::Arc;

use types::{AudioData, AudioEvent, PlaybackState};

/// The playback primitive the controller drives.
///
/// Implementations own the authoritative [`PlaybackState`]; callers read it
/// through [`Transport::state`] instead of keeping their own copy.
pub trait Transport {
    fn load(&mut self, audio: Arc<AudioData>);
    fn unload(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn state(&self) -> PlaybackState;
    /// Drain pending notifications (position updates, end of track).
    fn poll_events(&mut self) -> Vec<AudioEvent>;
}
