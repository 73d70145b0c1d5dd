//! Rendering backend contract

use anyhow::Result;
use bitflags::bitflags;
use eb_core::QWord;
use eb_gif::PathId;

pub mod null;

pub use null::{BackendEvent, EventLog, NullBackend};

bitflags! {
    /// Paths selected by a soft reset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PathMask: u32 {
        const PATH1 = 1 << 0;
        const PATH2 = 1 << 1;
        const PATH3 = 1 << 2;
    }
}

impl PathMask {
    /// Mask bit for a single path.
    pub fn from_path(path: PathId) -> Self {
        match path {
            PathId::Path1 => PathMask::PATH1,
            PathId::Path2 => PathMask::PATH2,
            PathId::Path3 => PathMask::PATH3,
        }
    }
}

/// Direction of a backend savestate exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeMode {
    Save,
    Load,
    /// Query the blob size only.
    Size,
}

/// Interface the render thread drives.
///
/// `open` runs on the render thread itself so backends with thread-affine
/// resources (GPU contexts) initialize where they will be used.
pub trait GsBackend: Send {
    /// Prepare the backend for rendering.
    fn open(&mut self) -> Result<()>;
    /// Release resources; last call the backend receives.
    fn close(&mut self);
    /// Full reset.
    fn reset(&mut self);
    /// Reset the state of the selected paths only.
    fn soft_reset(&mut self, paths: PathMask);
    /// Forward a span of path data.
    fn transfer(&mut self, path: PathId, data: &[QWord]);
    /// Frame boundary.
    fn vsync(&mut self, field: u32);
    /// Control-register write.
    fn write_control_register(&mut self, value: u32);
    /// Display-mode change.
    fn mode_change(&mut self, kind: u32, arg: u32);
    /// Save or restore backend state through `blob`.
    fn freeze(&mut self, mode: FreezeMode, blob: &mut Vec<u8>) -> Result<()>;
    /// Toggle frame capture.
    fn record(&mut self, enabled: bool);
}

/// Peripheral hooks the render thread services once per vsync.
pub trait VsyncPeripherals: Send {
    fn update_pads(&mut self);
    fn update_audio(&mut self);
}

/// No-op peripherals.
pub struct NullPeripherals;

impl VsyncPeripherals for NullPeripherals {
    fn update_pads(&mut self) {}
    fn update_audio(&mut self) {}
}
