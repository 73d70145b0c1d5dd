//! Render thread (consumer loop)

use std::sync::Arc;

use eb_core::{gs_debug, gs_trace, QWord};
use eb_gif::PathId;

use crate::backend::{GsBackend, PathMask, VsyncPeripherals};
use crate::packet::{PacketTag, RingCommand};
use crate::sync::RingShared;

/// Consumer side of the ring: dequeues packets in order and drives the
/// backend. Owns `read_pos`.
pub(crate) struct RenderThread {
    shared: Arc<RingShared>,
    backend: Box<dyn GsBackend>,
    peripherals: Box<dyn VsyncPeripherals>,
    xfer_buf: Vec<QWord>,
}

impl RenderThread {
    pub fn new(
        shared: Arc<RingShared>,
        backend: Box<dyn GsBackend>,
        peripherals: Box<dyn VsyncPeripherals>,
    ) -> Self {
        Self {
            shared,
            backend,
            peripherals,
            xfer_buf: Vec::new(),
        }
    }

    /// Runs on the render thread before the loop starts, so backends with
    /// thread-affine state initialize in place.
    pub fn open_backend(&mut self) -> anyhow::Result<()> {
        self.backend.open()
    }

    /// Main loop: block while the ring is empty, drain it while it is not,
    /// exit on `Quit`.
    pub fn run(mut self) {
        gs_debug!("render thread up");
        loop {
            self.shared.wait_until_nonempty();
            self.shared.set_busy(true);
            let quit = self.drain();
            self.shared.set_busy(false);
            self.shared.notify_drained();
            if quit {
                self.backend.close();
                gs_debug!("render thread down");
                return;
            }
        }
    }

    /// Process packets until the ring empties; true when `Quit` was seen.
    fn drain(&mut self) -> bool {
        while !self.shared.is_empty() {
            let rpos = self.shared.read_pos();
            let tag = match PacketTag::decode(self.shared.arena.read_qword(rpos)) {
                Ok(tag) => tag,
                Err(err) => {
                    tracing::error!(target: "gs", %err, slot = rpos, "skipping undecodable packet");
                    self.advance(rpos, 1);
                    continue;
                }
            };
            gs_trace!(command = ?tag.command, slot = rpos, "dispatch");

            match tag.command {
                RingCommand::Restart => {
                    {
                        let _guard = self.shared.restart_lock.lock();
                        self.shared.advance_read(0);
                    }
                    self.shared.notify_drained();
                    continue;
                }
                RingCommand::Path1 | RingCommand::Path2 | RingCommand::Path3 => {
                    let path = match tag.command {
                        RingCommand::Path1 => PathId::Path1,
                        RingCommand::Path2 => PathId::Path2,
                        _ => PathId::Path3,
                    };
                    let count = tag.data[0] as usize;
                    self.xfer_buf.clear();
                    for i in 0..count {
                        let qw = self.shared.arena.read_qword(rpos + 1 + i);
                        self.xfer_buf.push(qw);
                    }
                    self.backend.transfer(path, &self.xfer_buf);
                    self.advance(rpos, 1 + count);
                }
                RingCommand::Vsync => {
                    self.backend.vsync(tag.data[0]);
                    self.peripherals.update_pads();
                    self.peripherals.update_audio();
                    self.shared.dec_queued_frames();
                    self.advance(rpos, 1);
                    self.shared.notify_drained();
                }
                RingCommand::MemWrite8 => {
                    self.shared.arena.mirror_write8(tag.data[0], tag.data[1] as u8);
                    self.advance(rpos, 1);
                }
                RingCommand::MemWrite16 => {
                    self.shared
                        .arena
                        .mirror_write16(tag.data[0], tag.data[1] as u16);
                    self.advance(rpos, 1);
                }
                RingCommand::MemWrite32 => {
                    self.shared.arena.mirror_write32(tag.data[0], tag.data[1]);
                    self.advance(rpos, 1);
                }
                RingCommand::MemWrite64 => {
                    let value = tag.data[1] as u64 | ((tag.data[2] as u64) << 32);
                    self.shared.arena.mirror_write64(tag.data[0], value);
                    self.advance(rpos, 1);
                }
                RingCommand::WriteCsr => {
                    self.backend.write_control_register(tag.data[0]);
                    self.advance(rpos, 1);
                }
                RingCommand::ModeChange => {
                    self.backend.mode_change(tag.data[0], tag.data[1]);
                    self.advance(rpos, 1);
                }
                RingCommand::Reset => {
                    self.backend.reset();
                    self.advance(rpos, 1);
                }
                RingCommand::SoftReset => {
                    self.backend
                        .soft_reset(PathMask::from_bits_truncate(tag.data[0]));
                    self.advance(rpos, 1);
                }
                RingCommand::Record => {
                    self.backend.record(tag.data[0] != 0);
                    self.advance(rpos, 1);
                }
                RingCommand::Freeze => {
                    self.handle_freeze();
                    self.advance(rpos, 1);
                }
                RingCommand::Quit => {
                    self.advance(rpos, 1);
                    return true;
                }
            }
        }
        false
    }

    fn handle_freeze(&mut self) {
        let mut mailbox = self.shared.freeze_mailbox.lock();
        match mailbox.as_mut() {
            Some(frame) => {
                frame.result = self
                    .backend
                    .freeze(frame.mode, &mut frame.blob)
                    .map_err(|err| err.to_string());
            }
            None => {
                tracing::warn!(target: "gs", "freeze packet with an empty mailbox");
            }
        }
    }

    #[inline]
    fn advance(&self, rpos: usize, len: usize) {
        self.shared.advance_read(self.shared.arena.wrap(rpos + len));
    }
}
