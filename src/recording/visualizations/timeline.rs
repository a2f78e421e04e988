//! Scrolling bar timeline shared by the live and replay producers.
//!
//! Node `n` (padding included) is inserted at `n * per_node_delay`. At cursor
//! `t` a node of age `t - offset` has grown to
//! `growth_target * min(age / growth, 1)` and sits at
//! `width - bar_width - max(0, age - shift_delay) * shift_speed`.
//! Scrolling therefore depends only on the cursor, never on when the node was
//! actually sampled.

use crate::config::VisualizationConfig;
use std::time::Duration;

/// Upper end of the byte-domain magnitude scale.
pub const MAX_MAGNITUDE: f32 = 255.0;

/// One bar as it should be drawn at the current cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualizationNode {
    pub growth_target: f32,
    pub current_size: f32,
    pub x_position: f32,
    pub is_padding: bool,
}

/// A node's animation: when it enters and how tall it grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub offset: Duration,
    pub growth_target: f32,
    pub is_padding: bool,
}

/// Maps a magnitude onto a bar height for a surface `surface_height` tall.
///
/// The result always lies in `[min_bar_height, max_bar_height_ratio * surface_height]`.
pub fn bar_height(config: &VisualizationConfig, magnitude: f32, surface_height: f32) -> f32 {
    let min_height = config.min_bar_height.max(0.0);
    let max_height = (config.max_bar_height_ratio * surface_height).max(min_height);
    let magnitude = if magnitude.is_nan() {
        0.0
    } else {
        magnitude.clamp(0.0, MAX_MAGNITUDE)
    };
    let height = min_height + (magnitude / MAX_MAGNITUDE) * (max_height - min_height);
    height.clamp(min_height, max_height)
}

/// Ordered node animations addressable by elapsed time.
#[derive(Debug, Clone)]
pub struct Timeline {
    config: VisualizationConfig,
    width: f32,
    segments: Vec<Segment>,
    padding: usize,
    cursor: Duration,
}

impl Timeline {
    /// Creates a timeline pre-filled with one page of minimum-height padding.
    ///
    /// The cursor starts at [`Timeline::start_offset`], where the padding
    /// already covers the surface and the first real node is due.
    pub fn new(config: VisualizationConfig, width: f32, height: f32) -> Self {
        let padding = if width > 0.0 {
            (width / config.bar_width).floor() as usize
        } else {
            0
        };
        let mut timeline = Self {
            config,
            width: width.max(0.0),
            segments: Vec::with_capacity(padding),
            padding,
            cursor: Duration::ZERO,
        };
        let min_height = bar_height(&config, 0.0, height);
        for _ in 0..padding {
            timeline.insert(min_height, true);
        }
        timeline.cursor = timeline.start_offset();
        timeline
    }

    /// Time consumed by the padding; real sample `k` enters at `start_offset + k * per_node_delay`.
    pub fn start_offset(&self) -> Duration {
        self.offset_of(self.padding)
    }

    /// Offset at which the next pushed node will enter.
    pub fn next_offset(&self) -> Duration {
        self.offset_of(self.segments.len())
    }

    fn offset_of(&self, index: usize) -> Duration {
        self.config.per_node_delay().mul_f64(index as f64)
    }

    /// Appends a real node and returns its insertion offset.
    pub fn push(&mut self, growth_target: f32) -> Duration {
        self.insert(growth_target, false)
    }

    fn insert(&mut self, growth_target: f32, is_padding: bool) -> Duration {
        let offset = self.next_offset();
        self.segments.push(Segment {
            offset,
            growth_target,
            is_padding,
        });
        offset
    }

    pub fn cursor(&self) -> Duration {
        self.cursor
    }

    pub fn seek(&mut self, cursor: Duration) {
        self.cursor = cursor;
    }

    pub fn advance(&mut self, dt: Duration) {
        self.cursor += dt;
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn padding_len(&self) -> usize {
        self.padding
    }

    pub fn real_len(&self) -> usize {
        self.segments.len() - self.padding
    }

    /// Writes the nodes that have entered and are still on the surface into `out`.
    ///
    /// Oldest first, so x positions do not decrease along the output.
    pub fn visible_nodes(&self, out: &mut Vec<VisualizationNode>) {
        out.clear();
        let cursor = self.cursor.as_secs_f64();
        let speed = self.config.shift_speed as f64;
        let delay = self.config.shift_delay_secs as f64;
        let lifespan = delay + (self.width as f64 + self.config.bar_width as f64) / speed;

        let end = self
            .segments
            .partition_point(|s| s.offset.as_secs_f64() <= cursor);
        let start = self
            .segments
            .partition_point(|s| s.offset.as_secs_f64() <= cursor - lifespan);

        for segment in &self.segments[start..end] {
            let node = self.animate(segment, cursor);
            if node.x_position + self.config.bar_width > 0.0 {
                out.push(node);
            }
        }
    }

    fn animate(&self, segment: &Segment, cursor: f64) -> VisualizationNode {
        let age = (cursor - segment.offset.as_secs_f64()).max(0.0);
        let growth = self.config.growth_secs as f64;
        // Padding is laid down fully grown.
        let progress = if segment.is_padding {
            1.0
        } else if growth > 0.0 {
            (age / growth).min(1.0)
        } else {
            1.0
        };
        let shifted = (age - self.config.shift_delay_secs as f64).max(0.0)
            * self.config.shift_speed as f64;
        VisualizationNode {
            growth_target: segment.growth_target,
            current_size: (segment.growth_target as f64 * progress) as f32,
            x_position: (self.width - self.config.bar_width) - shifted as f32,
            is_padding: segment.is_padding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VisualizationConfig {
        VisualizationConfig {
            bar_width: 2.0,
            bar_gap: 1.0,
            min_bar_height: 1.0,
            max_bar_height_ratio: 0.5,
            magnitude_floor: 2.0,
            shift_speed: 20.0,
            growth_secs: 0.2,
            shift_delay_secs: 0.1,
        }
    }

    #[test]
    fn test_bar_height_clamps_to_range() {
        let config = config();
        assert_eq!(bar_height(&config, 0.0, 20.0), 1.0);
        assert_eq!(bar_height(&config, MAX_MAGNITUDE, 20.0), 10.0);
        assert_eq!(bar_height(&config, 10_000.0, 20.0), 10.0);
        assert_eq!(bar_height(&config, -5.0, 20.0), 1.0);
        assert_eq!(bar_height(&config, f32::NAN, 20.0), 1.0);
    }

    #[test]
    fn test_bar_height_is_linear() {
        let config = config();
        let mid = bar_height(&config, MAX_MAGNITUDE / 2.0, 20.0);
        assert!((mid - 5.5).abs() < 1e-4);
    }

    #[test]
    fn test_bar_height_on_tiny_surface_never_inverts_range() {
        let config = config();
        assert_eq!(bar_height(&config, MAX_MAGNITUDE, 1.0), 1.0);
    }

    #[test]
    fn test_padding_fills_surface() {
        let timeline = Timeline::new(config(), 21.0, 20.0);
        assert_eq!(timeline.padding_len(), 10);
        assert_eq!(timeline.real_len(), 0);
        assert_eq!(timeline.start_offset(), Duration::from_millis(1000));
        assert_eq!(timeline.cursor(), timeline.start_offset());
        assert!(timeline.segments().iter().all(|s| s.is_padding));

        let mut nodes = Vec::new();
        timeline.visible_nodes(&mut nodes);
        assert!(!nodes.is_empty());
        assert!(nodes.iter().all(|n| n.current_size == 1.0));
    }

    #[test]
    fn test_new_node_starts_at_right_edge_and_grows() {
        let mut timeline = Timeline::new(config(), 20.0, 20.0);
        timeline.push(8.0);

        let mut nodes = Vec::new();
        timeline.visible_nodes(&mut nodes);
        let newest = *nodes.last().unwrap();
        assert!(!newest.is_padding);
        assert_eq!(newest.current_size, 0.0);
        assert_eq!(newest.x_position, 18.0);

        timeline.advance(Duration::from_millis(100));
        timeline.visible_nodes(&mut nodes);
        let newest = *nodes.last().unwrap();
        assert!((newest.current_size - 4.0).abs() < 1e-3);
        assert_eq!(newest.x_position, 18.0);
    }

    #[test]
    fn test_x_positions_decrease_over_time() {
        let mut timeline = Timeline::new(config(), 20.0, 20.0);
        timeline.push(8.0);
        let mut nodes = Vec::new();
        let mut last_x = f32::INFINITY;

        timeline.advance(Duration::from_millis(150));
        for _ in 0..5 {
            timeline.visible_nodes(&mut nodes);
            let x = nodes.iter().find(|n| !n.is_padding).unwrap().x_position;
            assert!(x < last_x);
            last_x = x;
            timeline.advance(Duration::from_millis(50));
        }
    }

    #[test]
    fn test_offscreen_nodes_are_not_visible() {
        let mut timeline = Timeline::new(config(), 20.0, 20.0);
        timeline.advance(Duration::from_secs(60));

        let mut nodes = Vec::new();
        timeline.visible_nodes(&mut nodes);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_zero_width_has_no_padding() {
        let timeline = Timeline::new(config(), 0.0, 10.0);
        assert_eq!(timeline.padding_len(), 0);
        assert_eq!(timeline.start_offset(), Duration::ZERO);
    }
}
