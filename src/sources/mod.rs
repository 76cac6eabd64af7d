//! Source resolution: turning what a user typed into something playable.
//!
//! Remote queries go through [`ytdlp::YtDlpResolver`]; soundboard clips are
//! looked up on disk by [`soundboard::Soundboard`].

pub mod resolver;
pub mod soundboard;
pub mod ytdlp;

pub use resolver::{MediaResolver, ResolvedMedia, SourceRef};
pub use soundboard::Soundboard;
pub use ytdlp::YtDlpResolver;
