//! Preview playback of a finished recording.
//!
//! The replay visualization never owns the player. It subscribes to the
//! player's play/pause/seeking/seeked events, and each event carries the
//! playback position at the moment it fired.

use super::blob::AudioBlob;
use crate::error::PlaybackError;
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEventKind {
    Play,
    Pause,
    Seeking,
    Seeked,
}

/// A state change of a playback element, stamped with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackEvent {
    pub kind: PlaybackEventKind,
    pub position: Duration,
}

/// Receiving end of a playback element's event stream.
///
/// Dropping it detaches the listener; the element prunes it on its next event.
#[derive(Debug)]
pub struct PlaybackSubscription {
    rx: mpsc::UnboundedReceiver<PlaybackEvent>,
}

impl PlaybackSubscription {
    /// Returns the next pending event without blocking.
    pub fn try_next(&mut self) -> Option<PlaybackEvent> {
        self.rx.try_recv().ok()
    }
}

/// Anything with a playback position that announces its state changes.
pub trait PlaybackElement {
    fn position(&self) -> Duration;
    fn is_playing(&self) -> bool;
    fn subscribe(&mut self) -> PlaybackSubscription;
}

/// Fan-out of playback events to live subscriptions.
#[derive(Debug, Default)]
pub struct PlaybackListeners {
    senders: Vec<mpsc::UnboundedSender<PlaybackEvent>>,
}

impl PlaybackListeners {
    pub fn subscribe(&mut self) -> PlaybackSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        PlaybackSubscription { rx }
    }

    pub fn emit(&mut self, event: PlaybackEvent) {
        self.senders.retain(|tx| tx.send(event).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Wall-clock playback position, clamped to the recording length.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    offset: Duration,
    started_at: Option<Instant>,
    duration: Duration,
}

impl PlaybackClock {
    pub fn new(duration: Duration) -> Self {
        Self {
            offset: Duration::ZERO,
            started_at: None,
            duration,
        }
    }

    pub fn position(&self) -> Duration {
        let running = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        (self.offset + running).min(self.duration)
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn play(&mut self) {
        if self.started_at.is_none() {
            if self.offset >= self.duration {
                self.offset = Duration::ZERO;
            }
            self.started_at = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        self.offset = self.position();
        self.started_at = None;
    }

    pub fn seek(&mut self, to: Duration) {
        self.offset = to.min(self.duration);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.position() >= self.duration
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

struct AudioOutput {
    _stream: OutputStream,
    sink: Sink,
    wav: Vec<u8>,
}

impl AudioOutput {
    fn open(wav: &[u8]) -> Result<Self, PlaybackError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Output(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Output(e.to_string()))?;
        sink.pause();
        let output = Self {
            _stream: stream,
            sink,
            wav: wav.to_vec(),
        };
        output.load()?;
        Ok(output)
    }

    /// Queues the recording from the start; the sink drains it while playing.
    fn load(&self) -> Result<(), PlaybackError> {
        let source = Decoder::new(Cursor::new(self.wav.clone()))
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;
        self.sink.append(source);
        Ok(())
    }

    fn seek(&self, to: Duration) {
        if self.sink.empty() {
            if let Err(e) = self.load() {
                tracing::warn!("Preview reload failed: {}", e);
                return;
            }
        }
        if let Err(e) = self.sink.try_seek(to) {
            tracing::warn!("Preview seek failed: {}", e);
        }
    }
}

/// Plays a recording back through the default output device.
///
/// Without an output device the player still keeps time and emits events,
/// so the replay waveform remains scrubbable.
pub struct PreviewPlayer {
    output: Option<AudioOutput>,
    clock: PlaybackClock,
    listeners: PlaybackListeners,
}

impl PreviewPlayer {
    pub fn new(blob: &AudioBlob) -> Self {
        let output = match AudioOutput::open(blob.bytes()) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!("Preview will be silent: {}", e);
                None
            }
        };
        Self {
            output,
            clock: PlaybackClock::new(blob.duration()),
            listeners: PlaybackListeners::default(),
        }
    }

    /// A player that only keeps time.
    pub fn silent(duration: Duration) -> Self {
        Self {
            output: None,
            clock: PlaybackClock::new(duration),
            listeners: PlaybackListeners::default(),
        }
    }

    pub fn play(&mut self) {
        if self.clock.is_playing() {
            return;
        }
        let restart = self.clock.is_at_end();
        self.clock.play();
        if let Some(output) = &self.output {
            if restart || output.sink.empty() {
                output.seek(self.clock.position());
            }
            output.sink.play();
        }
        self.emit(PlaybackEventKind::Play);
    }

    pub fn pause(&mut self) {
        if !self.clock.is_playing() {
            return;
        }
        self.clock.pause();
        if let Some(output) = &self.output {
            output.sink.pause();
        }
        self.emit(PlaybackEventKind::Pause);
    }

    pub fn toggle(&mut self) {
        if self.clock.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn seek(&mut self, to: Duration) {
        self.emit(PlaybackEventKind::Seeking);
        self.clock.seek(to);
        if let Some(output) = &self.output {
            output.seek(self.clock.position());
        }
        self.emit(PlaybackEventKind::Seeked);
    }

    /// Seeks relative to the current position, clamped to the recording.
    pub fn seek_by(&mut self, delta_secs: f32) {
        let current = self.clock.position().as_secs_f32();
        let target = (current + delta_secs).max(0.0);
        self.seek(Duration::from_secs_f32(target));
    }

    /// Pauses once the end of the recording is reached.
    pub fn tick(&mut self) {
        if self.clock.is_playing() && self.clock.is_at_end() {
            self.pause();
        }
    }

    pub fn duration(&self) -> Duration {
        self.clock.duration()
    }

    pub fn is_audible(&self) -> bool {
        self.output.is_some()
    }

    fn emit(&mut self, kind: PlaybackEventKind) {
        let event = PlaybackEvent {
            kind,
            position: self.clock.position(),
        };
        tracing::trace!("Playback event: {:?}", event);
        self.listeners.emit(event);
    }
}

impl PlaybackElement for PreviewPlayer {
    fn position(&self) -> Duration {
        self.clock.position()
    }

    fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    fn subscribe(&mut self) -> PlaybackSubscription {
        self.listeners.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_clamps_seek_to_duration() {
        let mut clock = PlaybackClock::new(Duration::from_secs(3));
        clock.seek(Duration::from_secs(10));
        assert_eq!(clock.position(), Duration::from_secs(3));
        assert!(clock.is_at_end());
    }

    #[test]
    fn test_play_at_end_restarts_from_zero() {
        let mut clock = PlaybackClock::new(Duration::from_secs(3));
        clock.seek(Duration::from_secs(3));
        clock.play();
        assert!(clock.position() < Duration::from_millis(100));
    }

    #[test]
    fn test_pause_freezes_position() {
        let mut clock = PlaybackClock::new(Duration::from_secs(3));
        clock.seek(Duration::from_secs(1));
        clock.pause();
        let frozen = clock.position();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.position(), frozen);
    }

    #[test]
    fn test_seek_emits_seeking_then_seeked_with_position() {
        let mut player = PreviewPlayer::silent(Duration::from_secs(5));
        let mut sub = player.subscribe();

        player.seek(Duration::from_secs(2));

        let seeking = sub.try_next().unwrap();
        let seeked = sub.try_next().unwrap();
        assert_eq!(seeking.kind, PlaybackEventKind::Seeking);
        assert_eq!(seeked.kind, PlaybackEventKind::Seeked);
        assert_eq!(seeked.position, Duration::from_secs(2));
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_silent_player_still_tracks_position() {
        let mut player = PreviewPlayer::silent(Duration::from_secs(5));
        assert!(!player.is_audible());

        player.seek(Duration::from_secs(3));
        assert_eq!(player.position(), Duration::from_secs(3));
    }

    #[test]
    fn test_play_and_pause_are_not_repeated() {
        let mut player = PreviewPlayer::silent(Duration::from_secs(5));
        let mut sub = player.subscribe();

        player.play();
        player.play();
        player.pause();
        player.pause();

        assert_eq!(sub.try_next().unwrap().kind, PlaybackEventKind::Play);
        assert_eq!(sub.try_next().unwrap().kind, PlaybackEventKind::Pause);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let mut player = PreviewPlayer::silent(Duration::from_secs(5));
        let sub = player.subscribe();
        assert_eq!(player.listeners.len(), 1);

        drop(sub);
        player.seek_by(1.0);
        assert!(player.listeners.is_empty());
    }

    #[test]
    fn test_tick_pauses_at_end() {
        let mut player = PreviewPlayer::silent(Duration::ZERO);
        let mut sub = player.subscribe();
        player.play();
        player.tick();

        assert!(!player.is_playing());
        assert_eq!(sub.try_next().unwrap().kind, PlaybackEventKind::Play);
        assert_eq!(sub.try_next().unwrap().kind, PlaybackEventKind::Pause);
    }
}
