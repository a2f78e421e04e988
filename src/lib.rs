//! voxmemo: a guided voice memo recorder for the terminal.
//!
//! The recording session is an explicit state machine ([`session`]) that
//! spawns a capture actor per take ([`recording::capture`]). While recording,
//! a live sampler turns analyser readings into a scrolling bar waveform; after
//! recording, the same waveform is rebuilt from the sampled magnitudes and
//! follows preview playback ([`recording::visualizations`]).

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod recording;
pub mod session;
pub mod ui;
