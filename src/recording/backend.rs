//! Platform boundary for audio input.
//!
//! The session controller and capture actor only need two capabilities: list
//! input devices as `{id, label}` pairs, and open a stream optionally pinned to
//! one of those ids. Everything platform specific sits behind [`AudioBackend`].

use crate::error::{CaptureError, DeviceError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// An audio input device as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub id: String,
    pub label: String,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Trait for audio input implementations.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Lists the available input devices.
    async fn input_devices(&self) -> Result<Vec<AudioDevice>, DeviceError>;

    /// Opens an input stream, on `device_id` if given or the system default otherwise.
    async fn open_stream(
        &self,
        device_id: Option<&str>,
    ) -> Result<Box<dyn InputStream>, CaptureError>;
}

/// A live input stream handed to the capture actor.
///
/// Mono i16 PCM flows to at most one data listener. Every sample also lands in
/// the stream's [`Analyser`] so the visualizer can read it without touching
/// the recorded chunks.
pub trait InputStream: Send {
    /// Sample rate of the PCM delivered to the listener.
    fn sample_rate(&self) -> u32;

    /// Read-only view of the most recent samples.
    fn analyser(&self) -> Analyser;

    /// Attaches the data listener, replacing any previous one.
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Vec<i16>>;

    /// Suspends or resumes delivery of new data.
    fn set_paused(&mut self, paused: bool);

    /// Stops every track of the stream. Calling it again is a no-op.
    ///
    /// May block while the platform closes the device.
    fn stop_tracks(&mut self) -> Result<(), CaptureError>;
}

/// Bounded window of recent samples shared between a stream and the visualizer.
#[derive(Debug, Clone)]
pub struct Analyser {
    samples: Arc<Mutex<VecDeque<i16>>>,
    capacity: usize,
}

impl Analyser {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends samples, evicting the oldest once the window is full.
    pub fn push(&self, data: &[i16]) {
        if let Ok(mut window) = self.samples.lock() {
            let skip = data.len().saturating_sub(self.capacity);
            for &sample in &data[skip..] {
                if window.len() == self.capacity {
                    window.pop_front();
                }
                window.push_back(sample);
            }
        }
    }

    /// Copies the window into `out` as unsigned bytes, 128 being silence.
    pub fn time_domain_bytes(&self, out: &mut Vec<u8>) {
        out.clear();
        if let Ok(window) = self.samples.lock() {
            out.extend(window.iter().map(|&s| ((s as i32 + 32768) >> 8) as u8));
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
