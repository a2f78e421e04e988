//! The single draw routine shared by live and replayed waveforms.

use super::live::LiveSampler;
use super::replay::ReplayReconstructor;
use super::timeline::VisualizationNode;
use crate::config::VisualizationConfig;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use std::time::{Duration, Instant};

/// Source of the node list the renderer draws on each tick.
pub trait NodeProducer {
    /// Moves the producer's clock forward by `dt` and returns the nodes to draw.
    fn advance(&mut self, dt: Duration) -> &[VisualizationNode];
}

/// Whether a bar shows a recorded sample or fills the lead-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarKind {
    Sample,
    Padding,
}

/// Something bars can be painted onto.
pub trait DrawingSurface {
    /// Width and height in drawing units, or `None` when nothing can be drawn.
    fn size(&self) -> Option<(f32, f32)>;
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, kind: BarKind);
}

/// Clears `surface` and paints one page of `nodes` as vertically centered bars.
///
/// An unavailable surface is left untouched.
pub fn draw(
    surface: &mut dyn DrawingSurface,
    nodes: &[VisualizationNode],
    config: &VisualizationConfig,
) {
    let Some((width, height)) = surface.size() else {
        return;
    };
    surface.clear();

    let bar = (config.bar_width - config.bar_gap).max(0.0);
    let page = (width / config.bar_width).ceil() as usize + 2;
    let first = nodes.len().saturating_sub(page);

    for node in &nodes[first..] {
        let h = node.current_size.clamp(0.0, height);
        if h <= 0.0 || node.x_position + bar <= 0.0 || node.x_position >= width {
            continue;
        }
        let kind = if node.is_padding {
            BarKind::Padding
        } else {
            BarKind::Sample
        };
        surface.fill_rect(node.x_position, (height - h) / 2.0, bar, h, kind);
    }
}

const LOWER_EIGHTHS: [&str; 9] = [" ", "▁", "▂", "▃", "▄", "▅", "▆", "▇", "█"];

/// A ratatui buffer region measured in cells.
///
/// Bar edges that fall inside a cell use lower-eighth block glyphs. Lower
/// edges are drawn with foreground and background swapped, since only lower
/// partial blocks exist. Padding bars use their own color.
pub struct BufferSurface<'a> {
    buf: &'a mut Buffer,
    area: Rect,
    bar: Color,
    padding: Color,
    background: Color,
}

impl<'a> BufferSurface<'a> {
    pub fn new(
        buf: &'a mut Buffer,
        area: Rect,
        bar: Color,
        padding: Color,
        background: Color,
    ) -> Self {
        let area = area.intersection(buf.area);
        Self {
            buf,
            area,
            bar,
            padding,
            background,
        }
    }

    fn paint(&mut self, col: u16, row: u16, symbol: &str, style: Style) {
        if let Some(cell) = self.buf.cell_mut((self.area.x + col, self.area.y + row)) {
            cell.set_symbol(symbol);
            cell.set_style(style);
        }
    }
}

impl DrawingSurface for BufferSurface<'_> {
    fn size(&self) -> Option<(f32, f32)> {
        if self.area.width == 0 || self.area.height == 0 {
            None
        } else {
            Some((self.area.width as f32, self.area.height as f32))
        }
    }

    fn clear(&mut self) {
        let style = Style::default().bg(self.background);
        for row in 0..self.area.height {
            for col in 0..self.area.width {
                self.paint(col, row, " ", style);
            }
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, kind: BarKind) {
        let cols = self.area.width as f32;
        let rows = self.area.height as f32;
        let left = x.round().clamp(0.0, cols) as u16;
        let right = (x + width).round().clamp(0.0, cols) as u16;
        let top = y.clamp(0.0, rows);
        let bottom = (y + height).clamp(0.0, rows);

        let color = match kind {
            BarKind::Sample => self.bar,
            BarKind::Padding => self.padding,
        };
        let upright = Style::default().fg(color).bg(self.background);
        let inverted = Style::default().fg(self.background).bg(color);

        for row in top.floor() as u16..bottom.ceil() as u16 {
            let cell_top = row as f32;
            let from = top.max(cell_top);
            let to = bottom.min(cell_top + 1.0);
            let eighths = ((to - from) * 8.0).round() as usize;
            if eighths == 0 {
                continue;
            }
            let (symbol, style) = if eighths >= 8 {
                (LOWER_EIGHTHS[8], upright)
            } else if to >= cell_top + 1.0 || from > cell_top {
                (LOWER_EIGHTHS[eighths], upright)
            } else {
                (LOWER_EIGHTHS[8 - eighths], inverted)
            };
            for col in left..right {
                self.paint(col, row, symbol, style);
            }
        }
    }
}

/// The producer currently feeding the waveform.
pub enum Producer {
    Live(LiveSampler),
    Replay(ReplayReconstructor),
}

impl Producer {
    fn as_node_producer(&mut self) -> &mut dyn NodeProducer {
        match self {
            Producer::Live(sampler) => sampler,
            Producer::Replay(replay) => replay,
        }
    }
}

/// Owns the drawing tick: at most one producer, drawn onto whatever surface
/// the current frame provides.
///
/// Surfaces are borrowed per tick and never stored, so switching modes or
/// tearing the terminal down cannot leave the tick drawing into a stale one.
pub struct WaveformView {
    config: VisualizationConfig,
    producer: Option<Producer>,
    last_tick: Option<Instant>,
}

impl WaveformView {
    pub fn new(config: VisualizationConfig) -> Self {
        Self {
            config,
            producer: None,
            last_tick: None,
        }
    }

    pub fn attach_live(&mut self, sampler: LiveSampler) {
        self.attach(Producer::Live(sampler));
    }

    pub fn attach_replay(&mut self, replay: ReplayReconstructor) {
        self.attach(Producer::Replay(replay));
    }

    fn attach(&mut self, producer: Producer) {
        self.producer = Some(producer);
        self.last_tick = None;
    }

    /// Removes the current producer and hands it back.
    pub fn detach(&mut self) -> Option<Producer> {
        self.last_tick = None;
        self.producer.take()
    }

    pub fn live_mut(&mut self) -> Option<&mut LiveSampler> {
        match self.producer.as_mut() {
            Some(Producer::Live(sampler)) => Some(sampler),
            _ => None,
        }
    }

    pub fn replay_mut(&mut self) -> Option<&mut ReplayReconstructor> {
        match self.producer.as_mut() {
            Some(Producer::Replay(replay)) => Some(replay),
            _ => None,
        }
    }

    /// Advances by the wall time since the previous tick and draws.
    pub fn tick(&mut self, surface: &mut dyn DrawingSurface) {
        let now = Instant::now();
        let dt = self
            .last_tick
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_tick = Some(now);
        self.tick_by(dt, surface);
    }

    /// Advances by `dt` and draws. The producer keeps time even when the
    /// surface is unavailable.
    pub fn tick_by(&mut self, dt: Duration, surface: &mut dyn DrawingSurface) {
        if let Some(producer) = self.producer.as_mut() {
            let nodes = producer.as_node_producer().advance(dt);
            draw(surface, nodes, &self.config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::backend::Analyser;
    use crate::recording::visualizations::metadata::SampleMetadata;

    #[derive(Default)]
    struct RecordingSurface {
        size: Option<(f32, f32)>,
        clears: usize,
        rects: Vec<(f32, f32, f32, f32)>,
        kinds: Vec<BarKind>,
    }

    impl DrawingSurface for RecordingSurface {
        fn size(&self) -> Option<(f32, f32)> {
            self.size
        }

        fn clear(&mut self) {
            self.clears += 1;
            self.rects.clear();
            self.kinds.clear();
        }

        fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, kind: BarKind) {
            self.rects.push((x, y, width, height));
            self.kinds.push(kind);
        }
    }

    fn node(x: f32, size: f32) -> VisualizationNode {
        VisualizationNode {
            growth_target: size,
            current_size: size,
            x_position: x,
            is_padding: false,
        }
    }

    #[test]
    fn test_bars_are_centered_with_gap() {
        let config = VisualizationConfig::default();
        let mut surface = RecordingSurface {
            size: Some((20.0, 10.0)),
            ..Default::default()
        };

        draw(&mut surface, &[node(4.0, 6.0)], &config);

        assert_eq!(surface.clears, 1);
        assert_eq!(surface.rects, vec![(4.0, 2.0, 1.0, 6.0)]);
    }

    #[test]
    fn test_unavailable_surface_is_a_noop() {
        let config = VisualizationConfig::default();
        let mut surface = RecordingSurface::default();

        draw(&mut surface, &[node(4.0, 6.0)], &config);

        assert_eq!(surface.clears, 0);
        assert!(surface.rects.is_empty());
    }

    #[test]
    fn test_only_one_page_is_drawn() {
        let config = VisualizationConfig::default();
        let mut surface = RecordingSurface {
            size: Some((10.0, 10.0)),
            ..Default::default()
        };
        let nodes: Vec<_> = (0..100).map(|i| node(i as f32 * 0.1, 1.0)).collect();

        draw(&mut surface, &nodes, &config);

        assert_eq!(surface.rects.len(), 7);
    }

    #[test]
    fn test_offscreen_and_empty_nodes_are_skipped() {
        let config = VisualizationConfig::default();
        let mut surface = RecordingSurface {
            size: Some((20.0, 10.0)),
            ..Default::default()
        };

        draw(
            &mut surface,
            &[node(-5.0, 3.0), node(2.0, 0.0), node(25.0, 3.0), node(6.0, 3.0)],
            &config,
        );

        assert_eq!(surface.rects.len(), 1);
        assert_eq!(surface.rects[0].0, 6.0);
    }

    #[test]
    fn test_buffer_surface_paints_partial_cells() {
        let area = Rect::new(0, 0, 4, 4);
        let mut buf = Buffer::empty(area);
        let mut surface = BufferSurface::new(&mut buf, area, Color::Green, Color::Gray, Color::Black);

        surface.clear();
        // Covers the lower half of row 0, all of row 1 and the upper half of row 2.
        surface.fill_rect(1.0, 0.5, 1.0, 2.0, BarKind::Sample);

        assert_eq!(buf[(1, 0)].symbol(), "▄");
        assert_eq!(buf[(1, 0)].fg, Color::Green);
        assert_eq!(buf[(1, 1)].symbol(), "█");
        assert_eq!(buf[(1, 2)].symbol(), "▄");
        assert_eq!(buf[(1, 2)].fg, Color::Black);
        assert_eq!(buf[(1, 2)].bg, Color::Green);
        assert_eq!(buf[(0, 1)].symbol(), " ");
        assert_eq!(buf[(1, 3)].symbol(), " ");
    }

    #[test]
    fn test_padding_bars_are_muted() {
        let config = VisualizationConfig::default();
        let mut surface = RecordingSurface {
            size: Some((20.0, 10.0)),
            ..Default::default()
        };
        let padding = VisualizationNode {
            is_padding: true,
            ..node(2.0, 1.0)
        };

        draw(&mut surface, &[padding, node(6.0, 3.0)], &config);
        assert_eq!(surface.kinds, vec![BarKind::Padding, BarKind::Sample]);

        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        let mut surface = BufferSurface::new(&mut buf, area, Color::Green, Color::Gray, Color::Black);
        surface.fill_rect(0.0, 0.0, 1.0, 2.0, BarKind::Padding);
        surface.fill_rect(2.0, 0.0, 1.0, 2.0, BarKind::Sample);

        assert_eq!(buf[(0, 1)].fg, Color::Gray);
        assert_eq!(buf[(2, 1)].fg, Color::Green);
    }

    #[test]
    fn test_buffer_surface_clips_to_area() {
        let area = Rect::new(0, 0, 3, 2);
        let mut buf = Buffer::empty(area);
        let mut surface = BufferSurface::new(&mut buf, area, Color::Green, Color::Gray, Color::Black);

        surface.fill_rect(-2.0, -1.0, 10.0, 10.0, BarKind::Sample);

        for x in 0..3 {
            for y in 0..2 {
                assert_eq!(buf[(x, y)].symbol(), "█");
            }
        }
    }

    #[test]
    fn test_view_switches_between_producers() {
        let config = VisualizationConfig::default();
        let mut view = WaveformView::new(config);
        let mut surface = RecordingSurface {
            size: Some((20.0, 10.0)),
            ..Default::default()
        };

        view.tick_by(Duration::ZERO, &mut surface);
        assert_eq!(surface.clears, 0);

        view.attach_live(LiveSampler::new(config, Analyser::new(8), 20.0, 10.0));
        view.tick_by(Duration::ZERO, &mut surface);
        assert_eq!(surface.clears, 1);
        assert!(view.live_mut().is_some());

        let Some(Producer::Live(sampler)) = view.detach() else {
            panic!("expected the live sampler back");
        };
        let metadata: SampleMetadata = sampler.finish();
        assert_eq!(metadata.len(), 1);

        view.attach_replay(ReplayReconstructor::new(config, &metadata, 20.0, 10.0));
        view.tick_by(Duration::from_millis(16), &mut surface);
        assert_eq!(surface.clears, 2);
        assert!(view.live_mut().is_none());
        assert!(view.replay_mut().is_some());
    }
}
