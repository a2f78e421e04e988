//! Capture actor: an independent task owning the live input stream.
//!
//! The actor acquires a stream, wraps it in a [`Recorder`], and from then on
//! only talks to the outside world through its command channel and the event
//! callback it was spawned with. Commands sent before acquisition completes
//! wait in the channel and are applied in order once the recorder exists.

use super::backend::{Analyser, AudioBackend, InputStream};
use super::blob::AudioBlob;
use crate::error::CaptureError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Commands sent from the controller to the capture actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Pause,
    Resume,
    Stop,
}

/// Events emitted by the capture actor.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The capture resource exists and its analyser can be sampled
    HandleCreated(CaptureHandle),
    /// Recording was finalized; the blob may be empty
    ChunksReady(AudioBlob),
    /// The stream could not be acquired or the recording could not be assembled
    Failed(CaptureError),
}

/// What the controller keeps about a running capture.
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    pub device_id: Option<String>,
    pub sample_rate: u32,
    pub analyser: Analyser,
}

/// Cancels the actor it was created with. Runs at most once, and on drop.
#[derive(Debug)]
pub struct Cleanup {
    cancel: Option<oneshot::Sender<()>>,
}

impl Cleanup {
    fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { cancel: Some(tx) }, rx)
    }

    /// Signals cancellation. Returns false if it had already run.
    pub fn run(&mut self) -> bool {
        match self.cancel.take() {
            Some(tx) => {
                // The actor may have exited already; nothing left to cancel then.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn has_run(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        self.run();
    }
}

/// Handle to a spawned capture actor.
pub struct CaptureActor {
    commands: mpsc::UnboundedSender<CaptureCommand>,
    cleanup: Cleanup,
}

impl CaptureActor {
    /// Spawns the actor on the current tokio runtime.
    ///
    /// `emit` is called from the actor task for every [`CaptureEvent`].
    pub fn spawn<F>(backend: Arc<dyn AudioBackend>, device_id: Option<String>, emit: F) -> Self
    where
        F: Fn(CaptureEvent) + Send + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (cleanup, cancel_rx) = Cleanup::new();
        tokio::spawn(run_actor(backend, device_id, command_rx, cancel_rx, emit));
        Self { commands, cleanup }
    }

    /// Queues a command for the actor.
    ///
    /// # Errors
    /// - If the actor has already exited
    pub fn send(&self, command: CaptureCommand) -> Result<(), CaptureError> {
        self.commands
            .send(command)
            .map_err(|_| CaptureError::Stream("capture actor is no longer running".to_string()))
    }

    /// Cancels the actor and releases its resources if it is still running.
    pub fn terminate(mut self) {
        if self.cleanup.run() {
            tracing::debug!("Capture actor terminated");
        }
    }
}

async fn run_actor<F>(
    backend: Arc<dyn AudioBackend>,
    device_id: Option<String>,
    mut commands: mpsc::UnboundedReceiver<CaptureCommand>,
    mut cancel: oneshot::Receiver<()>,
    emit: F,
) where
    F: Fn(CaptureEvent) + Send + 'static,
{
    tracing::debug!(
        "Capture actor acquiring stream (device: {})",
        device_id.as_deref().unwrap_or("default")
    );

    let opened = tokio::select! {
        biased;
        _ = &mut cancel => {
            tracing::debug!("Capture cancelled before the stream was acquired");
            return;
        }
        result = backend.open_stream(device_id.as_deref()) => result,
    };

    let stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to acquire audio input: {}", e);
            emit(CaptureEvent::Failed(e));
            return;
        }
    };

    let mut recorder = Recorder::start(stream);
    emit(CaptureEvent::HandleCreated(CaptureHandle {
        device_id,
        sample_rate: recorder.sample_rate,
        analyser: recorder.analyser.clone(),
    }));

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::debug!("Capture cancelled while recording");
                recorder.release().await;
                return;
            }
            command = commands.recv() => match command {
                Some(CaptureCommand::Pause) => recorder.pause(),
                Some(CaptureCommand::Resume) => recorder.resume(),
                Some(CaptureCommand::Stop) => break,
                None => {
                    tracing::debug!("Controller went away; abandoning capture");
                    recorder.release().await;
                    return;
                }
            },
            chunk = recorder.next_chunk() => match chunk {
                Some(chunk) => recorder.push(chunk),
                None => recorder.detach_listener(),
            },
        }
    }

    match recorder.finish().await {
        Ok(blob) => {
            tracing::info!(
                "Recording finalized: {:.2}s ({} samples at {}Hz)",
                blob.duration().as_secs_f32(),
                blob.sample_count(),
                blob.sample_rate()
            );
            emit(CaptureEvent::ChunksReady(blob));
        }
        Err(e) => {
            tracing::error!("Failed to finalize recording: {}", e);
            emit(CaptureEvent::Failed(e));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecorderState {
    Recording,
    Paused,
    Inactive,
}

/// Capture resource over an acquired stream.
///
/// Teardown stops the recorder if it is active, stops every track of the
/// stream and detaches the data listener. It runs at most once, on finish,
/// cancellation or drop. The actor releases through [`Recorder::release`] so
/// a platform stream that blocks while closing never stalls a runtime worker.
struct Recorder {
    stream: Option<Box<dyn InputStream>>,
    data: Option<mpsc::UnboundedReceiver<Vec<i16>>>,
    chunks: Vec<Vec<i16>>,
    state: RecorderState,
    sample_rate: u32,
    analyser: Analyser,
}

impl Recorder {
    fn start(mut stream: Box<dyn InputStream>) -> Self {
        let data = stream.subscribe();
        Self {
            sample_rate: stream.sample_rate(),
            analyser: stream.analyser(),
            stream: Some(stream),
            data: Some(data),
            chunks: Vec::new(),
            state: RecorderState::Recording,
        }
    }

    fn pause(&mut self) {
        if self.state != RecorderState::Recording {
            tracing::debug!("Ignoring pause while {:?}", self.state);
            return;
        }
        if let Some(stream) = self.stream.as_mut() {
            stream.set_paused(true);
        }
        self.state = RecorderState::Paused;
        tracing::debug!("Recording paused");
    }

    fn resume(&mut self) {
        if self.state != RecorderState::Paused {
            tracing::debug!("Ignoring resume while {:?}", self.state);
            return;
        }
        if let Some(stream) = self.stream.as_mut() {
            stream.set_paused(false);
        }
        self.state = RecorderState::Recording;
        tracing::debug!("Recording resumed");
    }

    async fn next_chunk(&mut self) -> Option<Vec<i16>> {
        match self.data.as_mut() {
            Some(data) => data.recv().await,
            None => std::future::pending().await,
        }
    }

    fn push(&mut self, chunk: Vec<i16>) {
        if self.state != RecorderState::Inactive && !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    fn detach_listener(&mut self) {
        if self.data.take().is_some() {
            tracing::debug!("Audio data listener detached");
        }
    }

    /// Stops recording and collects anything the stream delivered before it stopped.
    fn stop(&mut self) {
        if self.state == RecorderState::Inactive {
            return;
        }
        if let Some(data) = self.data.as_mut() {
            while let Ok(chunk) = data.try_recv() {
                if !chunk.is_empty() {
                    self.chunks.push(chunk);
                }
            }
        }
        self.state = RecorderState::Inactive;
    }

    /// Teardown with the track stop moved to the blocking pool.
    async fn release(&mut self) {
        self.stop();
        if let Some(mut stream) = self.stream.take() {
            match tokio::task::spawn_blocking(move || stream.stop_tracks()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Ignoring teardown failure: {}", e),
                Err(e) => tracing::warn!("Ignoring teardown failure: {}", e),
            }
        }
        self.detach_listener();
    }

    fn teardown(&mut self) {
        self.stop();
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop_tracks() {
                tracing::warn!("Ignoring teardown failure: {}", e);
            }
        }
        self.detach_listener();
    }

    async fn finish(&mut self) -> Result<AudioBlob, CaptureError> {
        self.release().await;
        let chunks = std::mem::take(&mut self.chunks);
        AudioBlob::from_chunks(&chunks, self.sample_rate)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.teardown();
    }
}
