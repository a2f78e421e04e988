//! Session data model and its transition table.
//!
//! [`RecordingSession::transition`] is the whole state machine: it validates an
//! event against the current state, updates the session, and returns the side
//! effect the controller must carry out. It never performs I/O itself.

use crate::error::{CaptureError, DeviceError, SessionError};
use crate::recording::backend::AudioDevice;
use crate::recording::blob::AudioBlob;
use crate::recording::capture::{CaptureCommand, CaptureHandle};
use crate::recording::visualizations::SampleMetadata;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPhase {
    Playing,
    Paused,
    Stopping,
}

/// Why the session is in its error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFault {
    Enumeration(String),
    Acquisition(String),
}

impl fmt::Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFault::Enumeration(msg) => write!(f, "Could not list microphones: {msg}"),
            SessionFault::Acquisition(msg) => write!(f, "Could not start recording: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    GettingDevices,
    Selecting,
    Error(SessionFault),
    Ready,
    Recording(RecordingPhase),
    Done,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::GettingDevices => write!(f, "getting devices"),
            SessionState::Selecting => write!(f, "selecting a device"),
            SessionState::Error(_) => write!(f, "in error"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Recording(RecordingPhase::Playing) => write!(f, "recording"),
            SessionState::Recording(RecordingPhase::Paused) => write!(f, "paused"),
            SessionState::Recording(RecordingPhase::Stopping) => write!(f, "stopping"),
            SessionState::Done => write!(f, "done"),
        }
    }
}

/// Everything that can happen to a session, from the user or from async work.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    DevicesLoaded(Vec<AudioDevice>),
    EnumerationFailed(DeviceError),
    Retry,
    ChangeDevice,
    Select(AudioDevice),
    Start,
    Pause,
    Resume,
    /// Carries the magnitudes sampled while recording.
    Stop(SampleMetadata),
    HandleCreated(CaptureHandle),
    ChunksReady(AudioBlob),
    CaptureFailed(CaptureError),
    Restart,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::DevicesLoaded(_) => "devices loaded",
            SessionEvent::EnumerationFailed(_) => "enumeration failed",
            SessionEvent::Retry => "retry",
            SessionEvent::ChangeDevice => "change device",
            SessionEvent::Select(_) => "select",
            SessionEvent::Start => "start",
            SessionEvent::Pause => "pause",
            SessionEvent::Resume => "resume",
            SessionEvent::Stop(_) => "stop",
            SessionEvent::HandleCreated(_) => "handle created",
            SessionEvent::ChunksReady(_) => "chunks ready",
            SessionEvent::CaptureFailed(_) => "capture failed",
            SessionEvent::Restart => "restart",
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Enumerate,
    SpawnCapture { device_id: Option<String> },
    Command(CaptureCommand),
    TerminateCapture,
}

#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub state: SessionState,
    pub audio_devices: Vec<AudioDevice>,
    pub selected_device: Option<AudioDevice>,
    pub capture_handle: Option<CaptureHandle>,
    pub audio_blob: Option<AudioBlob>,
    pub metadata: Option<SampleMetadata>,
    pub elapsed: Duration,
    /// Metadata handed over by `Stop`, waiting for the blob.
    held_metadata: Option<SampleMetadata>,
    /// Device to select when the list loads: an id, a label or an index.
    preferred_device: Option<String>,
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RecordingSession {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self {
            state: SessionState::GettingDevices,
            audio_devices: Vec::new(),
            selected_device: None,
            capture_handle: None,
            audio_blob: None,
            metadata: None,
            elapsed: Duration::ZERO,
            held_metadata: None,
            preferred_device,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.as_secs()
    }

    /// Applies `event`, or rejects it and leaves the session untouched.
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` if `event` has no transition from the current state
    pub fn transition(&mut self, event: SessionEvent) -> Result<Effect, SessionError> {
        use RecordingPhase::*;
        use SessionState as S;

        let effect = match (&self.state, event) {
            (S::GettingDevices, SessionEvent::DevicesLoaded(devices)) => {
                self.store_devices(devices);
                self.state = S::Ready;
                Effect::None
            }
            (S::GettingDevices, SessionEvent::EnumerationFailed(e)) => {
                self.state = S::Error(SessionFault::Enumeration(e.to_string()));
                Effect::None
            }
            (S::Error(_), SessionEvent::Retry) => {
                self.state = S::GettingDevices;
                Effect::Enumerate
            }
            (S::Ready, SessionEvent::ChangeDevice) => {
                self.state = S::Selecting;
                Effect::None
            }
            (S::Selecting, SessionEvent::Select(device)) => {
                self.selected_device = Some(device);
                self.state = S::Ready;
                Effect::None
            }
            (S::Ready, SessionEvent::Start) => {
                self.elapsed = Duration::ZERO;
                self.state = S::Recording(Playing);
                Effect::SpawnCapture {
                    device_id: self.selected_device.as_ref().map(|d| d.id.clone()),
                }
            }
            (S::Recording(Playing), SessionEvent::Pause) => {
                self.state = S::Recording(Paused);
                Effect::Command(CaptureCommand::Pause)
            }
            (S::Recording(Paused), SessionEvent::Resume) => {
                self.state = S::Recording(Playing);
                Effect::Command(CaptureCommand::Resume)
            }
            (S::Recording(Playing | Paused), SessionEvent::Stop(metadata)) => {
                self.held_metadata = Some(metadata);
                self.state = S::Recording(Stopping);
                Effect::Command(CaptureCommand::Stop)
            }
            (S::Recording(_), SessionEvent::HandleCreated(handle)) => {
                self.capture_handle = Some(handle);
                Effect::None
            }
            (S::Recording(Stopping), SessionEvent::ChunksReady(blob)) => {
                self.audio_blob = Some(blob);
                self.metadata = Some(self.held_metadata.take().unwrap_or_default());
                self.capture_handle = None;
                self.state = S::Done;
                Effect::TerminateCapture
            }
            (S::Recording(_), SessionEvent::CaptureFailed(e)) => {
                self.capture_handle = None;
                self.held_metadata = None;
                self.state = S::Error(SessionFault::Acquisition(e.to_string()));
                Effect::TerminateCapture
            }
            (S::Done, SessionEvent::Restart) => {
                self.audio_blob = None;
                self.metadata = None;
                self.elapsed = Duration::ZERO;
                self.state = S::Ready;
                Effect::None
            }
            (state, event) => {
                return Err(SessionError::InvalidTransition {
                    state: state.to_string(),
                    event: event.name().to_string(),
                })
            }
        };
        Ok(effect)
    }

    fn store_devices(&mut self, devices: Vec<AudioDevice>) {
        let preferred = self
            .preferred_device
            .as_deref()
            .and_then(|wanted| find_device(&devices, wanted));
        let still_present = self
            .selected_device
            .as_ref()
            .filter(|selected| devices.contains(selected))
            .cloned();

        self.selected_device = still_present
            .or(preferred)
            .or_else(|| devices.first().cloned());
        self.audio_devices = devices;
    }
}

/// Finds a device by index, id or label. "default" never matches, which
/// leaves the choice to the list order.
fn find_device(devices: &[AudioDevice], wanted: &str) -> Option<AudioDevice> {
    if wanted == "default" {
        return None;
    }
    if let Ok(index) = wanted.parse::<usize>() {
        return devices.get(index).cloned();
    }
    devices
        .iter()
        .find(|d| d.id == wanted || d.label == wanted)
        .cloned()
}
