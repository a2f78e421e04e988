//! Configuration management for voxmemo.

pub mod file;

pub use file::{
    get_config_path, AudioConfig, OutputConfig, ThemeConfig, VisualizationConfig, VoxmemoConfig,
};
