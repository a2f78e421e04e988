//! Audio capture, preview playback and the guided recording screen.
//!
//! The capture side talks to the platform through [`backend::AudioBackend`];
//! [`cpal_backend::CpalBackend`] is the real implementation.

pub mod backend;
pub mod blob;
pub mod capture;
pub mod cpal_backend;
pub mod playback;
pub mod ui;
pub mod visualizations;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Analyser, AudioBackend, AudioDevice, InputStream};
pub use blob::AudioBlob;
pub use cpal_backend::CpalBackend;
pub use playback::PreviewPlayer;
pub use ui::{FlowOutcome, RecordingFlow};
