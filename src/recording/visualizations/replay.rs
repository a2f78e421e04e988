//! Rebuilds a recorded waveform and keeps it in step with preview playback.

use super::metadata::SampleMetadata;
use super::timeline::{bar_height, Timeline, VisualizationNode};
use super::NodeProducer;
use crate::config::VisualizationConfig;
use crate::recording::playback::{
    PlaybackElement, PlaybackEvent, PlaybackEventKind, PlaybackSubscription,
};
use std::time::Duration;

/// Replays a finished recording's timeline from its metadata.
///
/// Nodes are laid out with the same padding and offsets the live sampler used,
/// so the replayed waveform matches what was drawn while recording. The cursor
/// is driven by an attached playback element: every event it emits moves the
/// cursor to `start_offset + position`.
pub struct ReplayReconstructor {
    timeline: Timeline,
    subscription: Option<PlaybackSubscription>,
    playing: bool,
    nodes: Vec<VisualizationNode>,
}

impl ReplayReconstructor {
    pub fn new(
        config: VisualizationConfig,
        metadata: &SampleMetadata,
        surface_width: f32,
        surface_height: f32,
    ) -> Self {
        let mut timeline = Timeline::new(config, surface_width, surface_height);
        for magnitude in metadata.iter() {
            timeline.push(bar_height(&config, magnitude, surface_height));
        }
        tracing::debug!(
            "Rebuilt replay timeline with {} nodes ({} padding)",
            timeline.segments().len(),
            timeline.padding_len()
        );
        Self {
            timeline,
            subscription: None,
            playing: false,
            nodes: Vec::new(),
        }
    }

    /// Binds the cursor to `element`, replacing any previous binding.
    pub fn attach(&mut self, element: &mut dyn PlaybackElement) {
        self.subscription = Some(element.subscribe());
        self.playing = element.is_playing();
        self.seek_to(element.position());
    }

    /// Stops following the playback element. The cursor stays where it is.
    pub fn detach(&mut self) {
        self.subscription = None;
        self.playing = false;
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Applies every event the playback element has emitted since the last call.
    pub fn sync(&mut self) {
        let mut pending = Vec::new();
        if let Some(subscription) = self.subscription.as_mut() {
            while let Some(event) = subscription.try_next() {
                pending.push(event);
            }
        }
        for event in pending {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: PlaybackEvent) {
        match event.kind {
            PlaybackEventKind::Play => self.playing = true,
            PlaybackEventKind::Pause => self.playing = false,
            PlaybackEventKind::Seeking | PlaybackEventKind::Seeked => {}
        }
        self.seek_to(event.position);
    }

    fn seek_to(&mut self, position: Duration) {
        let end = self.end_offset();
        self.timeline
            .seek((self.timeline.start_offset() + position).min(end));
    }

    /// Cursor at which the last recorded node enters.
    fn end_offset(&self) -> Duration {
        self.timeline
            .segments()
            .last()
            .map(|s| s.offset)
            .unwrap_or_else(|| self.timeline.start_offset())
            .max(self.timeline.start_offset())
    }
}

impl NodeProducer for ReplayReconstructor {
    fn advance(&mut self, dt: Duration) -> &[VisualizationNode] {
        self.sync();
        if self.playing {
            let end = self.end_offset();
            let cursor = (self.timeline.cursor() + dt).min(end);
            self.timeline.seek(cursor);
        }
        self.timeline.visible_nodes(&mut self.nodes);
        &self.nodes
    }
}
