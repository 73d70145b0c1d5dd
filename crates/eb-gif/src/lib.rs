//! Streaming decoder for the GIF tag format carried on the three GS data
//! paths.
//!
//! Parsing is incremental: a tag's `nloop` may span several transfer calls,
//! so each [`GifPath`] keeps its loop and register-selector state between
//! calls. Register writes routed through the A+D mechanism raise
//! SIGNAL/FINISH/LABEL notifications through an [`AdRegSink`] at the exact
//! byte offset they are parsed.

pub mod path;
pub mod tag;

pub use path::{AdRegSink, GifPath, GifPathSet, Path3Progress, PathId};
pub use tag::{GifFlag, GifTag};
