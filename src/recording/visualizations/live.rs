//! Live sampling of the capture analyser into the scrolling timeline.

use super::metadata::SampleMetadata;
use super::timeline::{bar_height, Timeline, VisualizationNode};
use super::NodeProducer;
use crate::config::VisualizationConfig;
use crate::recording::backend::Analyser;
use std::time::Duration;

/// Magnitude of one analyser window: mean minus minimum, never below `floor`.
///
/// The window is in unsigned-byte time-domain form, so the result lies in 0-255
/// for any `floor` within that range.
pub fn magnitude(window: &[u8], floor: f32) -> f32 {
    if window.is_empty() {
        return floor;
    }
    let sum: u64 = window.iter().map(|&b| b as u64).sum();
    let avg = sum as f32 / window.len() as f32;
    let min = window.iter().copied().min().unwrap_or(0) as f32;
    (avg - min).max(floor)
}

/// Samples the analyser on the recording clock and grows the timeline.
///
/// A node is due every `per_node_delay` of unpaused recording time. Each tick
/// takes one analyser reading per node that has come due since the previous
/// tick, so real node `k` always lines up with recording time
/// `k * per_node_delay` however irregular the ticks are.
pub struct LiveSampler {
    config: VisualizationConfig,
    timeline: Timeline,
    analyser: Analyser,
    metadata: SampleMetadata,
    surface_height: f32,
    paused: bool,
    window: Vec<u8>,
    nodes: Vec<VisualizationNode>,
}

impl LiveSampler {
    pub fn new(
        config: VisualizationConfig,
        analyser: Analyser,
        surface_width: f32,
        surface_height: f32,
    ) -> Self {
        Self {
            timeline: Timeline::new(config, surface_width, surface_height),
            window: Vec::with_capacity(analyser.capacity()),
            config,
            analyser,
            metadata: SampleMetadata::new(),
            surface_height,
            paused: false,
            nodes: Vec::new(),
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn metadata(&self) -> &SampleMetadata {
        &self.metadata
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Stops sampling and hands over the recorded magnitudes.
    pub fn finish(self) -> SampleMetadata {
        tracing::debug!("Live sampler finished with {} samples", self.metadata.len());
        self.metadata
    }

    fn sample(&mut self) {
        self.analyser.time_domain_bytes(&mut self.window);
        let value = magnitude(&self.window, self.config.magnitude_floor);
        self.metadata.push(value);
        self.timeline
            .push(bar_height(&self.config, value, self.surface_height));
    }
}

impl NodeProducer for LiveSampler {
    fn advance(&mut self, dt: Duration) -> &[VisualizationNode] {
        if !self.paused {
            self.timeline.advance(dt);
            while self.timeline.next_offset() <= self.timeline.cursor() {
                self.sample();
            }
        }
        self.timeline.visible_nodes(&mut self.nodes);
        &self.nodes
    }
}
