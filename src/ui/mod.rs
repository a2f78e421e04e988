//! Shared terminal UI pieces.

pub mod error;
pub mod theme;

pub use error::{render_error, ErrorScreen};
pub use theme::Theme;
