//! Producer-side ring reservation, placement and publishing

use std::sync::Arc;
use std::time::Duration;

use eb_core::{GsConfig, QWord};

use crate::packet::{PacketTag, RingCommand};
use crate::sync::RingShared;

/// How long a stalled producer naps between re-checks once past the spin
/// phase.
const STALL_NAP: Duration = Duration::from_micros(100);

struct PendingPacket {
    start: usize,
    len: usize,
}

/// Producer half of the ring. Owns `write_pos` (the consumer only reads
/// it) and the wake-coalescing tallies.
pub(crate) struct PacketQueue {
    shared: Arc<RingShared>,
    spin_limit: u32,
    wake_qword_threshold: usize,
    wake_command_threshold: u32,
    pending_qwords: usize,
    pending_cmds: u32,
    pending_packet: Option<PendingPacket>,
}

impl PacketQueue {
    pub fn new(shared: Arc<RingShared>, config: &GsConfig) -> Self {
        Self {
            shared,
            spin_limit: config.spin_limit,
            wake_qword_threshold: config.wake_qword_threshold,
            wake_command_threshold: config.wake_command_threshold,
            pending_qwords: 0,
            pending_cmds: 0,
            pending_packet: None,
        }
    }

    #[inline]
    fn write_index(&self) -> usize {
        // single-writer cursor: this thread is the only one that stores it
        self.shared.write_pos()
    }

    /// Spin briefly, then nudge the consumer and block in short slices
    /// until the reader cursor satisfies `ready`.
    fn stall_until(&self, mut ready: impl FnMut(usize) -> bool) {
        let mut spins = 0u32;
        loop {
            if ready(self.shared.read_pos()) {
                return;
            }
            spins = spins.saturating_add(1);
            if spins <= self.spin_limit {
                std::hint::spin_loop();
            } else {
                // the reader may be asleep on a coalesced wake
                self.shared.wake_consumer();
                self.shared.timed_drain_wait(STALL_NAP);
            }
        }
    }

    /// Find a contiguous home for a packet of `len` qwords (header
    /// included) and return its slot offset.
    ///
    /// Never lets the writer overtake the reader, and never publishes a
    /// cursor value that would make a non-empty live region look empty:
    /// every wait below keeps `read_pos` strictly outside the region about
    /// to be written, including its one-past-the-end slot.
    pub fn reserve(&mut self, len: usize) -> usize {
        let capacity = self.shared.arena.capacity();
        assert!(
            len < capacity,
            "packet of {len} qwords cannot fit a ring of {capacity} slots"
        );

        let wpos = self.write_index();

        if wpos + len < capacity {
            // contiguous fit: wait until the reader is out of the target
            // region
            self.stall_until(|rpos| !(wpos < rpos && rpos <= wpos + len));
            wpos
        } else if wpos + len > capacity {
            // wrap required: the reader must be past the origin and on our
            // lap (or the ring empty), else resetting the write cursor to 0
            // would strand live data behind a false-empty ring
            self.stall_until(|rpos| rpos > 0 && rpos <= wpos);
            {
                let _guard = self.shared.restart_lock.lock();
                self.shared
                    .arena
                    .write_qword(wpos, PacketTag::new(RingCommand::Restart, 0, 0, 0).encode());
                self.shared.publish_write(0);
            }
            self.force_wake();
            // the origin region must be clear of the reader before reuse
            self.stall_until(|rpos| rpos == 0 || rpos > len);
            0
        } else {
            // exact fit: lands flush against the end, the masked publish
            // wraps the cursor with nothing to skip; same origin rule as
            // the wrap case since the publish also lands on 0
            self.stall_until(|rpos| rpos > 0 && rpos <= wpos);
            wpos
        }
    }

    /// Publish a previously reserved packet.
    pub fn commit(&mut self, start: usize, len: usize) {
        let end = self.shared.arena.wrap(start + len);
        self.shared.publish_write(end);
        self.pending_qwords += len;
        self.pending_cmds += 1;
        self.maybe_wake();
    }

    /// Burst coalescing: leave a busy consumer alone, and batch small
    /// packets into one wake once either tally crosses its threshold.
    fn maybe_wake(&mut self) {
        if self.shared.is_busy() {
            return;
        }
        if self.pending_qwords >= self.wake_qword_threshold
            || self.pending_cmds >= self.wake_command_threshold
        {
            self.force_wake();
        }
    }

    /// Unconditional wake; resets the coalescing tallies.
    pub fn force_wake(&mut self) {
        self.pending_qwords = 0;
        self.pending_cmds = 0;
        self.shared.wake_consumer();
    }

    /// Reserve, write and publish a one-qword packet.
    pub fn send_simple(&mut self, tag: PacketTag) {
        let start = self.reserve(1);
        self.shared.arena.write_qword(start, tag.encode());
        self.commit(start, 1);
    }

    /// Reserve space for a data packet and stage header plus payload.
    /// Published later by [`send_data`](Self::send_data).
    pub fn prepare_data(&mut self, command: RingCommand, payload: &[QWord]) {
        debug_assert!(
            self.pending_packet.is_none(),
            "data packet already prepared"
        );
        let len = payload.len() + 1;
        let start = self.reserve(len);
        self.shared.arena.write_qword(
            start,
            PacketTag::new(command, payload.len() as u32, 0, 0).encode(),
        );
        for (i, qw) in payload.iter().enumerate() {
            self.shared.arena.write_qword(start + 1 + i, *qw);
        }
        self.pending_packet = Some(PendingPacket { start, len });
    }

    /// Publish the staged data packet.
    pub fn send_data(&mut self) {
        debug_assert!(self.pending_packet.is_some(), "no data packet prepared");
        if let Some(packet) = self.pending_packet.take() {
            self.commit(packet.start, packet.len);
        }
    }

    /// Block until the consumer has seen everything queued so far.
    /// Returns immediately when the ring is already empty.
    pub fn wait_drain(&mut self) {
        let write = self.write_index();
        if self.shared.read_pos() == write {
            return;
        }
        self.force_wake();
        self.stall_until(|rpos| rpos == write);
    }

    /// Vsync backpressure: hold the producer while `queued_frames` is at
    /// the limit.
    pub fn stall_frames(&mut self, limit: u32) {
        let mut spins = 0u32;
        while self.shared.queued_frames() >= limit {
            spins = spins.saturating_add(1);
            if spins <= self.spin_limit {
                std::hint::spin_loop();
            } else {
                self.shared.wake_consumer();
                self.shared.timed_drain_wait(STALL_NAP);
            }
        }
    }
}
