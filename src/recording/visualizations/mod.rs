//! Scrolling waveform visualization.
//!
//! Two producers build the node list: [`LiveSampler`] while recording and
//! [`ReplayReconstructor`] during preview. Both lay nodes out on the same
//! [`Timeline`], and a single [`draw`] routine renders whichever one the
//! [`WaveformView`] currently owns.

pub mod live;
pub mod metadata;
pub mod renderer;
pub mod replay;
pub mod timeline;

pub use live::LiveSampler;
pub use metadata::SampleMetadata;
pub use renderer::{draw, BarKind, BufferSurface, DrawingSurface, NodeProducer, Producer, WaveformView};
pub use replay::ReplayReconstructor;
pub use timeline::{bar_height, Timeline, VisualizationNode};
