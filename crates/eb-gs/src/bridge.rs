//! Producer-facing bridge handle

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use eb_core::{GsConfig, QWord};
use eb_gif::{GifPathSet, Path3Progress, PathId};

use crate::backend::{FreezeMode, GsBackend, PathMask, VsyncPeripherals};
use crate::error::BridgeError;
use crate::packet::{PacketTag, RingCommand};
use crate::producer::PacketQueue;
use crate::regs::{GsRegisters, IrqCallback};
use crate::sync::{FreezeFrame, RingShared};
use crate::thread::RenderThread;

/// Handle owned by the emulated-CPU side.
///
/// All producer operations live here and must stay on one thread; the
/// paired render thread is spawned by [`open`](Self::open) and joined by
/// [`close`](Self::close) (or drop). There is deliberately no global
/// instance.
pub struct GsBridge {
    pub(crate) shared: Arc<RingShared>,
    pub(crate) queue: PacketQueue,
    pub(crate) paths: GifPathSet,
    pub(crate) regs: GsRegisters,
    queued_frame_limit: u32,
    handle: Option<JoinHandle<()>>,
    freeze_token: u64,
}

impl GsBridge {
    /// Spawn the render thread and open `backend` on it. A backend that
    /// fails to initialize aborts the open and surfaces as
    /// [`BridgeError::BackendOpen`].
    pub fn open(
        config: &GsConfig,
        backend: Box<dyn GsBackend>,
        peripherals: Box<dyn VsyncPeripherals>,
        irq: IrqCallback,
    ) -> Result<Self, BridgeError> {
        config.validate()?;

        let shared = Arc::new(RingShared::new(config.ring_slots));
        let (ready_tx, ready_rx) = crossbeam::channel::bounded::<Result<(), String>>(1);

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("eb-gs-render".into())
            .spawn(move || {
                let mut worker = RenderThread::new(thread_shared, backend, peripherals);
                match worker.open_backend() {
                    Ok(()) => {
                        let _ = ready_tx.send(Ok(()));
                        worker.run();
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.to_string()));
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                let _ = handle.join();
                return Err(BridgeError::BackendOpen(message));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(BridgeError::BackendOpen(
                    "render thread exited before reporting".into(),
                ));
            }
        }

        tracing::info!(target: "gs", slots = config.ring_slots, "GS bridge open");
        Ok(Self {
            queue: PacketQueue::new(Arc::clone(&shared), config),
            shared,
            paths: GifPathSet::new(),
            regs: GsRegisters::new(irq),
            queued_frame_limit: config.queued_frame_limit,
            handle: Some(handle),
            freeze_token: 0,
        })
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Parse `data` for `path` (side effects fire here, on the CPU
    /// thread), then stage the parsed span as a transfer packet. Returns
    /// the qword count actually committed so the caller can move its
    /// source cursor by the same amount; the shortfall is non-zero only
    /// through the PATH1 oversized-kick rule.
    pub fn prepare_data_packet(&mut self, path: PathId, data: &[QWord]) -> usize {
        let leftover = self.paths.parse(path, data, &mut self.regs);
        let count = data.len() - leftover;
        self.queue
            .prepare_data(RingCommand::from_path(path), &data[..count]);
        count
    }

    /// Publish the packet staged by [`prepare_data_packet`](Self::prepare_data_packet).
    pub fn send_data_packet(&mut self) {
        self.queue.send_data();
    }

    /// Queue a control packet with up to three payload words.
    pub fn send_simple_packet(&mut self, command: RingCommand, d0: u32, d1: u32, d2: u32) {
        self.queue.send_simple(PacketTag::new(command, d0, d1, d2));
    }

    /// Queue a control packet carrying an opaque 64-bit token.
    pub fn send_pointer_packet(&mut self, command: RingCommand, d0: u32, token: u64) {
        self.send_simple_packet(command, d0, token as u32, (token >> 32) as u32);
    }

    /// Frame boundary. Refuses to run more than `queued_frame_limit`
    /// frames ahead of the render thread.
    pub fn post_vsync(&mut self, field: u32) {
        self.queue.stall_frames(self.queued_frame_limit);
        self.shared.inc_queued_frames();
        self.send_simple_packet(RingCommand::Vsync, field, 0, 0);
        self.queue.force_wake();
    }

    /// Block until the render thread has consumed everything queued so
    /// far. No-op on an empty ring.
    pub fn wait_drain(&mut self) {
        self.queue.wait_drain();
    }

    /// Zero all parser state and queue a full backend reset. Packets
    /// already in the ring still reach the backend first.
    pub fn reset(&mut self) {
        self.paths.reset_all();
        self.send_simple_packet(RingCommand::Reset, 0, 0, 0);
    }

    /// Zero the selected paths' parser state and forward the soft reset.
    pub fn soft_reset(&mut self, mask: PathMask) {
        for path in PathId::ALL {
            if mask.contains(PathMask::from_path(path)) {
                self.paths.reset_path(path);
            }
        }
        self.send_simple_packet(RingCommand::SoftReset, mask.bits(), 0, 0);
    }

    /// Control-register write: clears local write-1-to-clear flags, then
    /// forwards the value to the backend in stream order.
    pub fn write_control_register(&mut self, value: u32) {
        self.regs.write_csr(value);
        self.send_simple_packet(RingCommand::WriteCsr, value, 0, 0);
    }

    /// Display-mode change, forwarded in stream order.
    pub fn mode_change(&mut self, kind: u32, arg: u32) {
        self.send_simple_packet(RingCommand::ModeChange, kind, arg, 0);
    }

    /// Toggle backend frame capture.
    pub fn set_recording(&mut self, enabled: bool) {
        self.send_simple_packet(RingCommand::Record, enabled as u32, 0, 0);
    }

    /// Register-mirror writes, ordered with the command stream.
    pub fn write_mem8(&mut self, offset: u32, value: u8) {
        self.send_simple_packet(RingCommand::MemWrite8, offset, value as u32, 0);
    }

    pub fn write_mem16(&mut self, offset: u32, value: u16) {
        self.send_simple_packet(RingCommand::MemWrite16, offset, value as u32, 0);
    }

    pub fn write_mem32(&mut self, offset: u32, value: u32) {
        self.send_simple_packet(RingCommand::MemWrite32, offset, value, 0);
    }

    pub fn write_mem64(&mut self, offset: u32, value: u64) {
        self.send_simple_packet(
            RingCommand::MemWrite64,
            offset,
            value as u32,
            (value >> 32) as u32,
        );
    }

    /// Run a backend savestate exchange through the freeze mailbox and
    /// wait for it to complete.
    pub fn freeze_backend(
        &mut self,
        mode: FreezeMode,
        blob: &mut Vec<u8>,
    ) -> Result<(), BridgeError> {
        {
            let mut mailbox = self.shared.freeze_mailbox.lock();
            debug_assert!(mailbox.is_none(), "freeze already in flight");
            *mailbox = Some(FreezeFrame {
                mode,
                blob: std::mem::take(blob),
                result: Ok(()),
            });
        }

        self.freeze_token += 1;
        self.send_pointer_packet(RingCommand::Freeze, mode as u32, self.freeze_token);
        self.queue.force_wake();
        self.wait_drain();

        match self.shared.freeze_mailbox.lock().take() {
            Some(frame) => {
                *blob = frame.blob;
                frame.result.map_err(BridgeError::BackendFreeze)
            }
            None => Err(BridgeError::BackendFreeze(
                "freeze request vanished from the mailbox".into(),
            )),
        }
    }

    /// CPU-visible interrupt registers.
    pub fn regs(&self) -> &GsRegisters {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut GsRegisters {
        &mut self.regs
    }

    /// PATH3 activity flag for DMA-mask decisions.
    pub fn path3_progress(&self) -> Path3Progress {
        self.paths.path3_progress()
    }

    /// Vsyncs queued but not yet consumed.
    pub fn queued_frames(&self) -> u32 {
        self.shared.queued_frames()
    }

    /// Current `(read_pos, write_pos)`, for diagnostics and tests.
    pub fn ring_cursors(&self) -> (usize, usize) {
        (self.shared.read_pos(), self.shared.write_pos())
    }

    /// Register-mirror readback. Stable only after [`wait_drain`](Self::wait_drain).
    pub fn read_mirror_u32(&self, offset: u32) -> u32 {
        self.shared.arena.mirror_read32(offset)
    }

    pub fn read_mirror_u64(&self, offset: u32) -> u64 {
        self.shared.arena.mirror_read64(offset)
    }

    /// Drain, send `Quit`, and join the render thread. Idempotent.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.wait_drain();
            self.send_simple_packet(RingCommand::Quit, 0, 0, 0);
            self.queue.force_wake();
            let _ = handle.join();
            tracing::info!(target: "gs", "GS bridge closed");
        }
    }
}

impl Drop for GsBridge {
    fn drop(&mut self) {
        self.close();
    }
}
