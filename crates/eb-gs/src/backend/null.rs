//! Null rendering backend

use std::sync::Arc;

use anyhow::Result;
use eb_core::QWord;
use eb_gif::PathId;
use parking_lot::Mutex;

use super::{FreezeMode, GsBackend, PathMask};

/// Marker the null backend writes into save blobs.
pub const NULL_FREEZE_MAGIC: &[u8; 4] = b"EBGS";

/// Everything the null backend was asked to do, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Open,
    Close,
    Reset,
    SoftReset(PathMask),
    Transfer { path: PathId, data: Vec<QWord> },
    Vsync(u32),
    WriteCsr(u32),
    ModeChange(u32, u32),
    Freeze(FreezeMode),
    Record(bool),
}

/// Shared view of a null backend's call log. The backend itself moves onto
/// the render thread, so inspection goes through this handle.
pub type EventLog = Arc<Mutex<Vec<BackendEvent>>>;

/// Backend that renders nothing and records every call (test instrument).
#[derive(Default)]
pub struct NullBackend {
    log: EventLog,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for inspecting calls after the backend is handed to `open`.
    pub fn log(&self) -> EventLog {
        Arc::clone(&self.log)
    }

    fn push(&self, event: BackendEvent) {
        self.log.lock().push(event);
    }
}

impl GsBackend for NullBackend {
    fn open(&mut self) -> Result<()> {
        self.push(BackendEvent::Open);
        Ok(())
    }

    fn close(&mut self) {
        self.push(BackendEvent::Close);
    }

    fn reset(&mut self) {
        self.push(BackendEvent::Reset);
    }

    fn soft_reset(&mut self, paths: PathMask) {
        self.push(BackendEvent::SoftReset(paths));
    }

    fn transfer(&mut self, path: PathId, data: &[QWord]) {
        self.push(BackendEvent::Transfer {
            path,
            data: data.to_vec(),
        });
    }

    fn vsync(&mut self, field: u32) {
        self.push(BackendEvent::Vsync(field));
    }

    fn write_control_register(&mut self, value: u32) {
        self.push(BackendEvent::WriteCsr(value));
    }

    fn mode_change(&mut self, kind: u32, arg: u32) {
        self.push(BackendEvent::ModeChange(kind, arg));
    }

    fn freeze(&mut self, mode: FreezeMode, blob: &mut Vec<u8>) -> Result<()> {
        self.push(BackendEvent::Freeze(mode));
        if mode == FreezeMode::Save {
            blob.clear();
            blob.extend_from_slice(NULL_FREEZE_MAGIC);
        }
        Ok(())
    }

    fn record(&mut self, enabled: bool) {
        self.push(BackendEvent::Record(enabled));
    }
}
