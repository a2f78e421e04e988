//! Error types for voxmemo.
//!
//! Library-level failures are modelled with thiserror so the session controller
//! can turn them into user-visible states. The CLI layer wraps everything in
//! `anyhow`.

use thiserror::Error;

/// Errors raised while enumerating audio input devices.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Failed to enumerate audio devices: {0}")]
    Enumeration(String),

    #[error("Device enumeration task failed: {0}")]
    Task(String),
}

/// Errors raised by the capture actor and the streams it owns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Audio input device '{0}' not found. Use 'voxmemo list-devices' to see available devices.")]
    DeviceNotFound(String),

    #[error("No audio input device available")]
    NoDefaultDevice,

    #[error("Could not acquire audio input: {0}")]
    Acquisition(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Failed to release audio input: {0}")]
    Teardown(String),

    #[error("Failed to assemble recording: {0}")]
    Assembly(String),
}

/// Errors returned by the session controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("'{event}' is not valid while {state}")]
    InvalidTransition { state: String, event: String },

    #[error("No recording to accept")]
    NothingToAccept,
}

/// Errors raised by the preview player.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No audio output available: {0}")]
    Output(String),

    #[error("Could not decode recording: {0}")]
    Decode(String),
}
