//! In-memory audio backend used by the capture and session tests.

use super::backend::{Analyser, AudioBackend, AudioDevice, InputStream};
use crate::error::{CaptureError, DeviceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Observes everything the capture side does to the fake streams.
#[derive(Default)]
pub struct StreamMonitor {
    pub releases: AtomicUsize,
    opened: Mutex<Vec<Option<String>>>,
    toggles: Mutex<Vec<bool>>,
    release_delay: Mutex<Duration>,
    listener: Mutex<Option<mpsc::UnboundedSender<Vec<i16>>>>,
}

impl StreamMonitor {
    /// Delivers a chunk to the current data listener.
    pub fn feed(&self, chunk: Vec<i16>) -> bool {
        match self.listener.lock().unwrap().as_ref() {
            Some(tx) => tx.send(chunk).is_ok(),
            None => false,
        }
    }

    pub fn opened_with(&self) -> Vec<Option<String>> {
        self.opened.lock().unwrap().clone()
    }

    pub fn pause_toggles(&self) -> Vec<bool> {
        self.toggles.lock().unwrap().clone()
    }

    /// Makes `stop_tracks` block the calling thread, like a slow device close.
    pub fn set_release_delay(&self, delay: Duration) {
        *self.release_delay.lock().unwrap() = delay;
    }
}

pub struct FakeBackend {
    monitor: Arc<StreamMonitor>,
    devices: Mutex<Result<Vec<AudioDevice>, DeviceError>>,
    open_error: Option<CaptureError>,
    gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    pub fn with_monitor(monitor: Arc<StreamMonitor>) -> Self {
        Self {
            monitor,
            devices: Mutex::new(Ok(vec![AudioDevice::new("d1", "Mic 1")])),
            open_error: None,
            gate: None,
        }
    }

    pub fn failing_open(error: CaptureError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::with_monitor(Arc::default())
        }
    }

    pub fn failing_enumeration(monitor: Arc<StreamMonitor>) -> Self {
        let backend = Self::with_monitor(monitor);
        *backend.devices.lock().unwrap() =
            Err(DeviceError::Enumeration("host unavailable".to_string()));
        backend
    }

    /// Holds `open_stream` until the gate is notified.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn gate(&self) -> Arc<Notify> {
        self.gate.clone().expect("backend is not gated")
    }

    pub fn set_devices(&self, devices: Vec<AudioDevice>) {
        *self.devices.lock().unwrap() = Ok(devices);
    }
}

#[async_trait::async_trait]
impl AudioBackend for FakeBackend {
    async fn input_devices(&self) -> Result<Vec<AudioDevice>, DeviceError> {
        self.devices.lock().unwrap().clone()
    }

    async fn open_stream(
        &self,
        device_id: Option<&str>,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }
        self.monitor
            .opened
            .lock()
            .unwrap()
            .push(device_id.map(String::from));
        Ok(Box::new(FakeStream {
            monitor: self.monitor.clone(),
            analyser: Analyser::new(64),
        }))
    }
}

struct FakeStream {
    monitor: Arc<StreamMonitor>,
    analyser: Analyser,
}

impl InputStream for FakeStream {
    fn sample_rate(&self) -> u32 {
        16000
    }

    fn analyser(&self) -> Analyser {
        self.analyser.clone()
    }

    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Vec<i16>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.monitor.listener.lock().unwrap() = Some(tx);
        rx
    }

    fn set_paused(&mut self, paused: bool) {
        self.monitor.toggles.lock().unwrap().push(paused);
    }

    // Counts every call so double releases show up in the tests.
    fn stop_tracks(&mut self) -> Result<(), CaptureError> {
        let delay = *self.monitor.release_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.monitor.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
