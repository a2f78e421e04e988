//! Recording session controller.
//!
//! The controller owns a [`RecordingSession`] and runs the effects its
//! transitions ask for: device enumeration, spawning and commanding the
//! capture actor, and tearing it down. Async results come back over a channel
//! and are applied on the caller's thread by [`SessionController::pump`] or
//! [`SessionController::next_event`], so the session itself is only ever
//! touched from one place.

pub mod state;

pub use state::{Effect, RecordingPhase, RecordingSession, SessionEvent, SessionFault, SessionState};

use crate::error::{DeviceError, SessionError};
use crate::recording::backend::{AudioBackend, AudioDevice};
use crate::recording::blob::AudioBlob;
use crate::recording::capture::{CaptureActor, CaptureEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Result of async work started by the controller.
#[derive(Debug)]
enum Completion {
    Devices(Result<Vec<AudioDevice>, DeviceError>),
    Capture { generation: u64, event: CaptureEvent },
}

pub struct SessionController {
    backend: Arc<dyn AudioBackend>,
    session: RecordingSession,
    actor: Option<CaptureActor>,
    /// Bumped on every spawn; events from older actors are dropped.
    generation: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
}

impl SessionController {
    /// Creates a controller and starts listing input devices.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self::with_preferred_device(backend, None)
    }

    /// Like [`SessionController::new`], preselecting `device` (an id, label or
    /// index) once the device list loads.
    pub fn with_preferred_device(backend: Arc<dyn AudioBackend>, device: Option<String>) -> Self {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let mut controller = Self {
            backend,
            session: RecordingSession::new(device),
            actor: None,
            generation: 0,
            completions_tx,
            completions,
        };
        controller.run(Effect::Enumerate);
        controller
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn state(&self) -> &SessionState {
        &self.session.state
    }

    /// Applies one event and carries out its effect.
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` if the event is not valid in the current state;
    ///   the session is left unchanged
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let name = event.name();
        let from = self.session.state.clone();
        let effect = self.session.transition(event)?;
        tracing::debug!("Session {} --{}--> {}", from, name, self.session.state);
        self.run(effect);
        Ok(())
    }

    /// Applies every async result that has already completed. Returns how many there were.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions.try_recv() {
            self.complete(completion);
            applied += 1;
        }
        applied
    }

    /// Waits for the next async result and applies it.
    pub async fn next_event(&mut self) {
        if let Some(completion) = self.completions.recv().await {
            self.complete(completion);
        }
    }

    /// Advances the recording timer; it only runs while recording is not paused.
    pub fn tick(&mut self, dt: Duration) {
        if self.session.state == SessionState::Recording(RecordingPhase::Playing) {
            self.session.elapsed += dt;
        }
    }

    /// Returns the finished recording.
    ///
    /// # Errors
    /// - `SessionError::NothingToAccept` unless the session is done
    pub fn accept(&self) -> Result<AudioBlob, SessionError> {
        match (&self.session.state, &self.session.audio_blob) {
            (SessionState::Done, Some(blob)) => Ok(blob.clone()),
            _ => Err(SessionError::NothingToAccept),
        }
    }

    /// Whether a capture actor is currently alive.
    pub fn has_live_capture(&self) -> bool {
        self.actor.is_some()
    }

    fn complete(&mut self, completion: Completion) {
        let event = match completion {
            Completion::Devices(Ok(devices)) => {
                tracing::info!("Found {} input device(s)", devices.len());
                SessionEvent::DevicesLoaded(devices)
            }
            Completion::Devices(Err(e)) => {
                tracing::error!("{}", e);
                SessionEvent::EnumerationFailed(e)
            }
            Completion::Capture { generation, event } => {
                if generation != self.generation || self.actor.is_none() {
                    tracing::debug!("Dropping event from stale capture {}", generation);
                    return;
                }
                match event {
                    CaptureEvent::HandleCreated(handle) => SessionEvent::HandleCreated(handle),
                    CaptureEvent::ChunksReady(blob) => SessionEvent::ChunksReady(blob),
                    CaptureEvent::Failed(e) => SessionEvent::CaptureFailed(e),
                }
            }
        };
        if let Err(e) = self.dispatch(event) {
            tracing::warn!("Ignoring async result: {}", e);
        }
    }

    fn run(&mut self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::Enumerate => self.enumerate(),
            Effect::SpawnCapture { device_id } => self.spawn_capture(device_id),
            Effect::Command(command) => match self.actor.as_ref() {
                Some(actor) => {
                    if let Err(e) = actor.send(command) {
                        tracing::warn!("Capture command {:?} not delivered: {}", command, e);
                    }
                }
                None => tracing::warn!("No capture running for {:?}", command),
            },
            Effect::TerminateCapture => self.terminate_capture(),
        }
    }

    fn enumerate(&self) {
        let backend = self.backend.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = backend.input_devices().await;
            // The controller may be gone by now.
            let _ = tx.send(Completion::Devices(result));
        });
    }

    fn spawn_capture(&mut self, device_id: Option<String>) {
        self.terminate_capture();
        self.generation += 1;
        let generation = self.generation;
        let tx = self.completions_tx.clone();
        tracing::info!(
            "Starting capture {} on {}",
            generation,
            device_id.as_deref().unwrap_or("default device")
        );
        self.actor = Some(CaptureActor::spawn(
            self.backend.clone(),
            device_id,
            move |event| {
                let _ = tx.send(Completion::Capture { generation, event });
            },
        ));
    }

    fn terminate_capture(&mut self) {
        if let Some(actor) = self.actor.take() {
            actor.terminate();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.terminate_capture();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use crate::recording::testing::{FakeBackend, StreamMonitor};
    use crate::recording::visualizations::SampleMetadata;
    use std::sync::atomic::Ordering;

    async fn settle_until(
        controller: &mut SessionController,
        done: impl Fn(&SessionController) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !done(controller) {
                controller.next_event().await;
            }
        })
        .await
        .expect("controller did not settle");
    }

    async fn wait_for_releases(monitor: &StreamMonitor, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while monitor.releases.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("stream was not released");
    }

    async fn ready_controller(backend: FakeBackend) -> SessionController {
        let mut controller = SessionController::new(Arc::new(backend));
        settle_until(&mut controller, |c| *c.state() == SessionState::Ready).await;
        controller
    }

    #[tokio::test]
    async fn test_start_pins_capture_to_selected_device() {
        let monitor = Arc::new(StreamMonitor::default());
        let mut controller = ready_controller(FakeBackend::with_monitor(monitor.clone())).await;

        controller.dispatch(SessionEvent::Start).unwrap();
        assert_eq!(
            *controller.state(),
            SessionState::Recording(RecordingPhase::Playing)
        );
        settle_until(&mut controller, |c| c.session().capture_handle.is_some()).await;

        assert_eq!(monitor.opened_with(), vec![Some("d1".to_string())]);
        assert!(controller.has_live_capture());
    }

    #[tokio::test]
    async fn test_stop_before_data_waits_for_chunks() {
        let backend = FakeBackend::with_monitor(Arc::default()).gated();
        let gate = backend.gate();
        let mut controller = ready_controller(backend).await;

        controller.dispatch(SessionEvent::Start).unwrap();
        controller
            .dispatch(SessionEvent::Stop(SampleMetadata::new()))
            .unwrap();
        controller.pump();
        assert_eq!(
            *controller.state(),
            SessionState::Recording(RecordingPhase::Stopping)
        );

        gate.notify_one();
        settle_until(&mut controller, |c| *c.state() == SessionState::Done).await;

        let blob = controller.accept().unwrap();
        assert!(blob.is_empty());
        assert!(controller.session().capture_handle.is_none());
        assert!(!controller.has_live_capture());
    }

    #[tokio::test]
    async fn test_recorded_chunks_reach_done() {
        let monitor = Arc::new(StreamMonitor::default());
        let mut controller = ready_controller(FakeBackend::with_monitor(monitor.clone())).await;

        controller.dispatch(SessionEvent::Start).unwrap();
        settle_until(&mut controller, |c| c.session().capture_handle.is_some()).await;
        assert!(monitor.feed(vec![1, 2, 3, 4]));

        let metadata: SampleMetadata = [5.0, 9.0].into_iter().collect();
        controller
            .dispatch(SessionEvent::Stop(metadata.clone()))
            .unwrap();
        settle_until(&mut controller, |c| *c.state() == SessionState::Done).await;

        assert_eq!(controller.session().audio_blob.as_ref().unwrap().sample_count(), 4);
        assert_eq!(controller.session().metadata, Some(metadata));
        wait_for_releases(&monitor, 1).await;
        assert_eq!(monitor.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_from_done_clears_recording() {
        let mut controller = ready_controller(FakeBackend::with_monitor(Arc::default())).await;
        controller.dispatch(SessionEvent::Start).unwrap();
        controller.tick(Duration::from_secs(3));
        controller
            .dispatch(SessionEvent::Stop(SampleMetadata::new()))
            .unwrap();
        settle_until(&mut controller, |c| *c.state() == SessionState::Done).await;

        controller.dispatch(SessionEvent::Restart).unwrap();

        assert_eq!(*controller.state(), SessionState::Ready);
        assert!(controller.session().audio_blob.is_none());
        assert_eq!(controller.session().elapsed_seconds(), 0);
        assert!(controller.accept().is_err());
    }

    #[tokio::test]
    async fn test_timer_stops_while_paused() {
        let mut controller = ready_controller(FakeBackend::with_monitor(Arc::default())).await;
        controller.dispatch(SessionEvent::Start).unwrap();
        controller.tick(Duration::from_secs(2));
        controller.dispatch(SessionEvent::Pause).unwrap();
        controller.tick(Duration::from_secs(5));

        assert_eq!(controller.session().elapsed_seconds(), 2);
        assert!(controller.dispatch(SessionEvent::Pause).is_err());
        assert_eq!(
            *controller.state(),
            SessionState::Recording(RecordingPhase::Paused)
        );
    }

    #[tokio::test]
    async fn test_unmount_while_recording_releases_once() {
        let monitor = Arc::new(StreamMonitor::default());
        let mut controller = ready_controller(FakeBackend::with_monitor(monitor.clone())).await;
        controller.dispatch(SessionEvent::Start).unwrap();
        settle_until(&mut controller, |c| c.session().capture_handle.is_some()).await;

        drop(controller);
        wait_for_releases(&monitor, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(monitor.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enumeration_failure_then_retry() {
        let monitor = Arc::new(StreamMonitor::default());
        let backend = Arc::new(FakeBackend::failing_enumeration(monitor));
        let mut controller = SessionController::new(backend.clone());
        settle_until(&mut controller, |c| {
            matches!(c.state(), SessionState::Error(SessionFault::Enumeration(_)))
        })
        .await;

        backend.set_devices(vec![AudioDevice::new("usb", "USB Mic")]);
        controller.dispatch(SessionEvent::Retry).unwrap();
        assert_eq!(*controller.state(), SessionState::GettingDevices);
        settle_until(&mut controller, |c| *c.state() == SessionState::Ready).await;

        assert_eq!(controller.session().selected_device.as_ref().unwrap().id, "usb");
    }

    #[tokio::test]
    async fn test_acquisition_failure_enters_error() {
        let backend = FakeBackend::failing_open(CaptureError::Acquisition(
            "permission denied".to_string(),
        ));
        let mut controller = ready_controller(backend).await;

        controller.dispatch(SessionEvent::Start).unwrap();
        settle_until(&mut controller, |c| matches!(c.state(), SessionState::Error(_))).await;

        assert_eq!(
            *controller.state(),
            SessionState::Error(SessionFault::Acquisition(
                "Could not acquire audio input: permission denied".to_string()
            ))
        );
        assert!(!controller.has_live_capture());
        assert!(controller.session().capture_handle.is_none());
    }

    #[tokio::test]
    async fn test_events_from_replaced_capture_are_ignored() {
        let mut controller = ready_controller(FakeBackend::with_monitor(Arc::default())).await;
        controller.dispatch(SessionEvent::Start).unwrap();
        settle_until(&mut controller, |c| c.session().capture_handle.is_some()).await;

        let blob = AudioBlob::from_chunks(&[vec![1]], 16000).unwrap();
        controller
            .completions_tx
            .send(Completion::Capture {
                generation: controller.generation - 1,
                event: CaptureEvent::ChunksReady(blob),
            })
            .unwrap();
        controller.pump();

        assert_eq!(
            *controller.state(),
            SessionState::Recording(RecordingPhase::Playing)
        );
    }

    #[tokio::test]
    async fn test_at_most_one_capture_across_sessions() {
        let monitor = Arc::new(StreamMonitor::default());
        let mut controller = ready_controller(FakeBackend::with_monitor(monitor.clone())).await;

        for round in 1..=3 {
            controller.dispatch(SessionEvent::Start).unwrap();
            assert!(controller.dispatch(SessionEvent::Start).is_err());
            controller
                .dispatch(SessionEvent::Stop(SampleMetadata::new()))
                .unwrap();
            settle_until(&mut controller, |c| *c.state() == SessionState::Done).await;
            wait_for_releases(&monitor, round).await;
            controller.dispatch(SessionEvent::Restart).unwrap();
        }

        assert_eq!(monitor.opened_with().len(), 3);
        assert_eq!(monitor.releases.load(Ordering::SeqCst), 3);
    }
}
