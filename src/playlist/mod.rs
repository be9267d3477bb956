//! M3U playlist output

pub mod writer;

pub use writer::{render_playlist, PlaylistWriter, WriteOutcome};
