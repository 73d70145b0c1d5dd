//! Cross-thread state shared between the producer and the render thread

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::arena::RingArena;
use crate::backend::FreezeMode;

/// In-flight backend savestate exchange. The blob travels through this
/// mailbox; the ring packet only carries an opaque token.
pub(crate) struct FreezeFrame {
    pub mode: FreezeMode,
    pub blob: Vec<u8>,
    pub result: Result<(), String>,
}

/// Everything both threads can see.
///
/// `read_pos` has a single writer (the consumer), `write_pos` has a single
/// writer (the producer); each side only ever loads the other's cursor.
/// The restart lock is the one exception to the lock-free packet path: it
/// brackets marker emission and the write-cursor reset on one side and the
/// read-cursor reset on the other, so the consumer can never act on a
/// rewound `write_pos` before the marker explaining it.
pub(crate) struct RingShared {
    pub arena: RingArena,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
    busy: AtomicBool,
    queued_frames: AtomicU32,
    wake_mutex: Mutex<()>,
    wake_cond: Condvar,
    drain_mutex: Mutex<()>,
    drain_cond: Condvar,
    pub restart_lock: Mutex<()>,
    pub freeze_mailbox: Mutex<Option<FreezeFrame>>,
}

impl RingShared {
    pub fn new(slots: usize) -> Self {
        Self {
            arena: RingArena::new(slots),
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
            busy: AtomicBool::new(false),
            queued_frames: AtomicU32::new(0),
            wake_mutex: Mutex::new(()),
            wake_cond: Condvar::new(),
            drain_mutex: Mutex::new(()),
            drain_cond: Condvar::new(),
            restart_lock: Mutex::new(()),
            freeze_mailbox: Mutex::new(None),
        }
    }

    #[inline]
    pub fn read_pos(&self) -> usize {
        self.read_pos.load(Ordering::Acquire)
    }

    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos.load(Ordering::Acquire)
    }

    /// Producer-side publish; orders all slot writes before it.
    #[inline]
    pub fn publish_write(&self, pos: usize) {
        self.write_pos.store(pos, Ordering::Release);
    }

    /// Consumer-side cursor advance; releases the consumed region back to
    /// the producer.
    #[inline]
    pub fn advance_read(&self, pos: usize) {
        self.read_pos.store(pos, Ordering::Release);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read_pos() == self.write_pos()
    }

    #[inline]
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    #[inline]
    pub fn queued_frames(&self) -> u32 {
        self.queued_frames.load(Ordering::Acquire)
    }

    #[inline]
    pub fn inc_queued_frames(&self) {
        self.queued_frames.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn dec_queued_frames(&self) {
        self.queued_frames.fetch_sub(1, Ordering::AcqRel);
    }

    /// Signal the render thread's wake event.
    pub fn wake_consumer(&self) {
        let _guard = self.wake_mutex.lock();
        self.wake_cond.notify_one();
    }

    /// Consumer-side blocking wait for the ring to become non-empty.
    pub fn wait_until_nonempty(&self) {
        let mut guard = self.wake_mutex.lock();
        while self.is_empty() {
            self.wake_cond.wait(&mut guard);
        }
    }

    /// Consumer-side: announce progress to any stalled producer.
    pub fn notify_drained(&self) {
        let _guard = self.drain_mutex.lock();
        self.drain_cond.notify_all();
    }

    /// Producer-side bounded nap between stall re-checks. A missed notify
    /// costs at most one timeout.
    pub fn timed_drain_wait(&self, timeout: Duration) {
        let mut guard = self.drain_mutex.lock();
        let _ = self.drain_cond.wait_for(&mut guard, timeout);
    }
}
