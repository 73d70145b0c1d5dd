//! Multi-threaded Graphics-Synthesizer bridge.
//!
//! The emulated-CPU thread feeds a dedicated render thread through a
//! fixed-capacity command ring with single-writer cursors: the producer
//! alone advances `write_pos`, the consumer alone advances `read_pos`, and
//! acquire/release ordering on the two cursors is the only synchronization
//! on the packet path. GIF-tag parsing happens on the producer side, before
//! a packet is queued, so SIGNAL/FINISH/LABEL interrupts stay aligned with
//! the CPU clock instead of the render thread's progress.

mod arena;
mod producer;
mod sync;
mod thread;

pub mod backend;
pub mod bridge;
pub mod error;
pub mod packet;
pub mod regs;
pub mod savestate;

pub use backend::{
    FreezeMode, GsBackend, NullBackend, NullPeripherals, PathMask, VsyncPeripherals,
};
pub use bridge::GsBridge;
pub use error::{BridgeError, SaveStateError};
pub use packet::{PacketDecodeError, PacketTag, RingCommand};
pub use regs::{CsrFlags, GsRegisters, ImrFlags, IrqCallback};
pub use savestate::{thaw, GsSnapshot};

pub use eb_core::QWord;
pub use eb_gif::{GifPath, Path3Progress, PathId};
