pub mod controls;
pub mod demo;
pub mod waveform;
