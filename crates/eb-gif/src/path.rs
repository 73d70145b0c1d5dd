//! Per-path GIF stream parser

use eb_core::QWord;
use serde::{Deserialize, Serialize};

use crate::tag::{GifFlag, GifTag};

/// PACKED-mode descriptor selecting A+D (address+data) register writes.
pub const REG_AD: u8 = 0x0e;
/// SIGNAL register address.
pub const REG_SIGNAL: u8 = 0x60;
/// FINISH register address.
pub const REG_FINISH: u8 = 0x61;
/// LABEL register address.
pub const REG_LABEL: u8 = 0x62;

/// One of the three hardware data paths feeding the GS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathId {
    /// VU1 XGKICK path.
    Path1 = 0,
    /// VIF1 direct path.
    Path2 = 1,
    /// GIF DMA path.
    Path3 = 2,
}

impl PathId {
    /// All paths, in arbitration order.
    pub const ALL: [PathId; 3] = [PathId::Path1, PathId::Path2, PathId::Path3];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Receiver for register writes that must surface on the CPU timeline.
///
/// The payload is the low two 32-bit words of the unit that carried the
/// write.
pub trait AdRegSink {
    fn signal(&mut self, payload: [u32; 2]);
    fn finish(&mut self, payload: [u32; 2]);
    fn label(&mut self, payload: [u32; 2]);
}

#[inline]
fn dispatch<S: AdRegSink>(reg: u8, payload: [u32; 2], sink: &mut S) {
    match reg {
        REG_SIGNAL => {
            tracing::trace!(target: "gif", id = payload[0], "SIGNAL");
            sink.signal(payload);
        }
        REG_FINISH => {
            tracing::trace!(target: "gif", "FINISH");
            sink.finish(payload);
        }
        REG_LABEL => {
            tracing::trace!(target: "gif", id = payload[0], "LABEL");
            sink.label(payload);
        }
        _ => {}
    }
}

/// Parser state for a single path.
///
/// Persists across transfer calls: a tag whose `nloop` exceeds the data
/// supplied so far resumes exactly where it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GifPath {
    /// Current tag, `nloop` counting down.
    pub tag: GifTag,
    /// Expanded register descriptors.
    pub regs: [u8; 16],
    /// Index of the next register selector.
    pub curreg: u8,
}

impl GifPath {
    /// Clear all parser state, as a path reset does.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Expand the tag's packed descriptor nibbles into `regs` and rewind
    /// the selector.
    pub fn prep_regs(&mut self) {
        let mut descriptors = self.tag.regs[0];
        for i in 0..16 {
            if i == 8 {
                descriptors = self.tag.regs[1];
            }
            self.regs[i] = (descriptors & 0xf) as u8;
            descriptors >>= 4;
        }
        self.curreg = 0;
    }

    fn set_tag(&mut self, qw: QWord) {
        self.tag = GifTag::from_qword(qw);
        self.prep_regs();
    }

    #[inline]
    fn cur_reg(&self) -> u8 {
        self.regs[(self.curreg & 0xf) as usize]
    }

    /// Advance the register selector; returns false when the tag drains.
    #[inline]
    fn step_reg(&mut self) -> bool {
        self.curreg = self.curreg.wrapping_add(1) & 0xf;
        if u32::from(self.curreg) == self.tag.nreg {
            self.curreg = 0;
            self.tag.nloop -= 1;
            if self.tag.nloop == 0 {
                return false;
            }
        }
        true
    }

    /// Qwords the current tag claims to occupy, computed at tag time.
    fn declared_qwords(&self) -> usize {
        let regs = self.tag.active_regs() as usize;
        let nloop = self.tag.nloop as usize;
        match self.tag.flag {
            GifFlag::Packed => nloop * regs,
            GifFlag::Reglist => (nloop * regs + 1) / 2,
            GifFlag::Image | GifFlag::Image2 => nloop,
        }
    }

    /// Consume qwords from `mem`, dispatching SIGNAL/FINISH/LABEL writes to
    /// `sink` as they are parsed. Returns the number of qwords left
    /// unconsumed.
    ///
    /// The only source of a non-zero return besides input exhaustion is the
    /// PATH1 oversized-kick rule: a fresh tag on PATH1 that declares more
    /// data than this call supplies is dropped (`nloop` zeroed) and the
    /// remainder handed back, so the caller re-issues it from the wrapped
    /// VU-memory address instead of reading past the end of the region.
    pub fn parse<S: AdRegSink>(&mut self, path: PathId, mem: &[QWord], sink: &mut S) -> usize {
        let mut pos = 0usize;
        let mut size = mem.len();

        while size > 0 {
            if self.tag.nloop == 0 {
                self.set_tag(mem[pos]);
                pos += 1;
                size -= 1;

                if path == PathId::Path1
                    && self.tag.nloop > 0
                    && self.declared_qwords() > size
                {
                    self.tag.nloop = 0;
                    return size;
                }
            } else {
                match self.tag.flag {
                    GifFlag::Packed => loop {
                        if self.cur_reg() == REG_AD {
                            let qw = mem[pos];
                            dispatch(
                                qw.byte(8),
                                [qw.lo as u32, (qw.lo >> 32) as u32],
                                sink,
                            );
                        }
                        pos += 1;
                        size -= 1;
                        if !self.step_reg() || size == 0 {
                            break;
                        }
                    },
                    GifFlag::Reglist => {
                        let total_units = size * 2;
                        let mut unit = 0usize;
                        loop {
                            let qw = mem[pos + unit / 2];
                            let data = if unit % 2 == 0 { qw.lo } else { qw.hi };
                            dispatch(
                                self.cur_reg(),
                                [data as u32, (data >> 32) as u32],
                                sink,
                            );
                            unit += 1;
                            if !self.step_reg() || unit == total_units {
                                break;
                            }
                        }
                        // A tag ending on an odd unit swallows the pad half
                        // of its final qword.
                        let consumed = (unit + 1) / 2;
                        pos += consumed;
                        size -= consumed;
                    }
                    GifFlag::Image | GifFlag::Image2 => {
                        let len = size.min(self.tag.nloop as usize);
                        pos += len;
                        size -= len;
                        self.tag.nloop -= len as u32;
                    }
                }
            }

            if self.tag.eop && self.tag.nloop == 0 {
                break;
            }
        }

        size
    }
}

/// PATH3 activity as seen by the DMA-masking logic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Path3Progress {
    /// Between tags or mid-tag in a register mode.
    Tag,
    /// Mid-tag in IMAGE mode.
    Image,
    /// Terminal tag fully drained.
    #[default]
    Stopped,
}

/// The three path parsers plus the PATH3 progress flag.
#[derive(Debug, Clone, Default)]
pub struct GifPathSet {
    paths: [GifPath; 3],
    path3_progress: Path3Progress,
}

impl GifPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a transfer on `path`; see [`GifPath::parse`].
    pub fn parse<S: AdRegSink>(&mut self, path: PathId, mem: &[QWord], sink: &mut S) -> usize {
        let left = self.paths[path.index()].parse(path, mem, sink);
        if path == PathId::Path3 {
            let p = &self.paths[PathId::Path3.index()];
            self.path3_progress = if p.tag.nloop > 0 {
                if p.tag.flag.is_image() {
                    Path3Progress::Image
                } else {
                    Path3Progress::Tag
                }
            } else if p.tag.eop {
                Path3Progress::Stopped
            } else {
                Path3Progress::Tag
            };
        }
        left
    }

    pub fn path(&self, id: PathId) -> &GifPath {
        &self.paths[id.index()]
    }

    pub fn path_mut(&mut self, id: PathId) -> &mut GifPath {
        &mut self.paths[id.index()]
    }

    /// Reset one path; PATH3 also drops its progress flag.
    pub fn reset_path(&mut self, id: PathId) {
        self.paths[id.index()].reset();
        if id == PathId::Path3 {
            self.path3_progress = Path3Progress::Stopped;
        }
    }

    /// Reset every path.
    pub fn reset_all(&mut self) {
        for id in PathId::ALL {
            self.reset_path(id);
        }
    }

    pub fn path3_progress(&self) -> Path3Progress {
        self.path3_progress
    }

    /// Copy of the three parser states, for the savestate bridge.
    pub fn snapshot(&self) -> [GifPath; 3] {
        self.paths.clone()
    }

    /// Install restored parser states. Selector indices are masked back
    /// into range in case the snapshot came from a damaged stream.
    pub fn restore(&mut self, mut paths: [GifPath; 3]) {
        for p in &mut paths {
            p.curreg &= 0xf;
        }
        self.paths = paths;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Recorder {
        events: Vec<(&'static str, [u32; 2])>,
    }

    impl AdRegSink for Recorder {
        fn signal(&mut self, payload: [u32; 2]) {
            self.events.push(("signal", payload));
        }
        fn finish(&mut self, payload: [u32; 2]) {
            self.events.push(("finish", payload));
        }
        fn label(&mut self, payload: [u32; 2]) {
            self.events.push(("label", payload));
        }
    }

    fn tag_qword(nloop: u64, eop: bool, flag: u64, nreg: u64, regs: u64) -> QWord {
        QWord {
            lo: nloop | ((eop as u64) << 15) | (flag << 58) | (nreg << 60),
            hi: regs,
        }
    }

    fn ad_qword(addr: u8, lo: u32, hi: u32) -> QWord {
        QWord {
            lo: lo as u64 | ((hi as u64) << 32),
            hi: addr as u64,
        }
    }

    #[test]
    fn test_packed_ad_signal() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        let mem = [
            tag_qword(1, true, 0, 1, 0xe),
            ad_qword(REG_SIGNAL, 0xdead, 0xbeef),
        ];
        let left = path.parse(PathId::Path2, &mem, &mut sink);

        assert_eq!(left, 0);
        assert_eq!(sink.events, vec![("signal", [0xdead, 0xbeef])]);
        assert_eq!(path.tag.nloop, 0);
    }

    #[test]
    fn test_packed_non_ad_descriptor_is_silent() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        // descriptor 0x1 (RGBAQ), byte 8 coincidentally in handler range
        let mem = [tag_qword(1, true, 0, 1, 0x1), ad_qword(REG_SIGNAL, 1, 2)];
        path.parse(PathId::Path2, &mem, &mut sink);

        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_packed_ad_outside_handler_range_is_silent() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        let mem = [tag_qword(1, true, 0, 1, 0xe), ad_qword(0x50, 1, 2)];
        path.parse(PathId::Path2, &mem, &mut sink);

        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_packed_nloop_spans_calls() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        let first = [tag_qword(2, true, 0, 1, 0xe), ad_qword(REG_LABEL, 1, 0)];
        assert_eq!(path.parse(PathId::Path2, &first, &mut sink), 0);
        assert_eq!(path.tag.nloop, 1);

        let second = [ad_qword(REG_FINISH, 7, 0)];
        assert_eq!(path.parse(PathId::Path2, &second, &mut sink), 0);
        assert_eq!(path.tag.nloop, 0);
        assert_eq!(
            sink.events,
            vec![("label", [1, 0]), ("finish", [7, 0])]
        );
    }

    #[test]
    fn test_reglist_finish_fires_once_from_correct_unit() {
        // Hand-built state: REGLIST selectors can only land in the handler
        // window via restored or constructed state, never from tag nibbles.
        let mut path = GifPath {
            tag: GifTag {
                nloop: 1,
                eop: true,
                flag: GifFlag::Reglist,
                nreg: 2,
                regs: [0, 0],
            },
            regs: [0; 16],
            curreg: 0,
        };
        path.regs[0] = REG_FINISH;

        let mut sink = Recorder::default();
        let mem = [QWord {
            lo: 0x1111_2222_3333_4444,
            hi: 0x5555_6666_7777_8888,
        }];
        let left = path.parse(PathId::Path2, &mem, &mut sink);

        assert_eq!(left, 0);
        // exactly one FINISH, payload from the first 8-byte unit
        assert_eq!(sink.events, vec![("finish", [0x3333_4444, 0x1111_2222])]);
        assert_eq!(path.tag.nloop, 0);
    }

    #[test]
    fn test_reglist_odd_unit_count_swallows_pad() {
        // nloop=1, nreg=3 in REGLIST: three units plus a pad half-qword.
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        let mem = [
            tag_qword(1, false, 1, 3, 0x321),
            QWord { lo: 1, hi: 2 },
            QWord { lo: 3, hi: 0xffff },
            tag_qword(1, true, 0, 1, 0xe),
            ad_qword(REG_SIGNAL, 9, 9),
        ];
        let left = path.parse(PathId::Path2, &mem, &mut sink);

        // pad unit consumed with its qword, next tag parsed normally
        assert_eq!(left, 0);
        assert_eq!(sink.events, vec![("signal", [9, 9])]);
    }

    #[test]
    fn test_image_consumes_verbatim() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        let first = [
            tag_qword(4, true, 2, 0, 0),
            ad_qword(REG_SIGNAL, 1, 1),
            ad_qword(REG_FINISH, 2, 2),
        ];
        assert_eq!(path.parse(PathId::Path3, &first, &mut sink), 0);
        assert_eq!(path.tag.nloop, 2);

        let second = [ad_qword(REG_LABEL, 3, 3), ad_qword(REG_LABEL, 4, 4)];
        assert_eq!(path.parse(PathId::Path3, &second, &mut sink), 0);
        assert_eq!(path.tag.nloop, 0);

        // image data is never register-interpreted
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_path1_clip_exact_fit() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        // declared: nloop(2) * nreg(2) = 4 qwords
        let mem = [
            tag_qword(2, true, 0, 2, 0x11),
            QWord::ZERO,
            QWord::ZERO,
            QWord::ZERO,
            QWord::ZERO,
        ];
        let left = path.parse(PathId::Path1, &mem, &mut sink);

        assert_eq!(left, 0);
        assert_eq!(path.tag.nloop, 0);
    }

    #[test]
    fn test_path1_clip_one_qword_overflow() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        // declared 4, supplied 3
        let mem = [
            tag_qword(2, true, 0, 2, 0x11),
            QWord::ZERO,
            QWord::ZERO,
            QWord::ZERO,
        ];
        let left = path.parse(PathId::Path1, &mem, &mut sink);

        assert_eq!(left, 3);
        assert_eq!(path.tag.nloop, 0);
    }

    #[test]
    fn test_path1_clip_empty_input_after_tag() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        let mem = [tag_qword(2, true, 0, 2, 0x11)];
        let left = path.parse(PathId::Path1, &mem, &mut sink);

        assert_eq!(left, 0);
        assert_eq!(path.tag.nloop, 0);
    }

    #[test]
    fn test_other_paths_never_clip() {
        let mut path = GifPath::default();
        let mut sink = Recorder::default();

        let mem = [
            tag_qword(2, true, 0, 2, 0x11),
            QWord::ZERO,
            QWord::ZERO,
            QWord::ZERO,
        ];
        let left = path.parse(PathId::Path3, &mem, &mut sink);

        // partial progress, tag still live
        assert_eq!(left, 0);
        assert_eq!(path.tag.nloop, 1);
    }

    #[test]
    fn test_path3_progress_transitions() {
        let mut set = GifPathSet::new();
        let mut sink = Recorder::default();

        assert_eq!(set.path3_progress(), Path3Progress::Stopped);

        // image tag, data pending
        set.parse(PathId::Path3, &[tag_qword(4, true, 2, 0, 0)], &mut sink);
        assert_eq!(set.path3_progress(), Path3Progress::Image);

        // drain it
        set.parse(
            PathId::Path3,
            &[QWord::ZERO, QWord::ZERO, QWord::ZERO, QWord::ZERO],
            &mut sink,
        );
        assert_eq!(set.path3_progress(), Path3Progress::Stopped);

        // non-terminal packed tag fully consumed: waiting on the next tag
        set.parse(
            PathId::Path3,
            &[tag_qword(1, false, 0, 1, 0x1), QWord::ZERO],
            &mut sink,
        );
        assert_eq!(set.path3_progress(), Path3Progress::Tag);
    }

    #[test]
    fn test_restore_masks_selector() {
        let mut set = GifPathSet::new();
        let mut snap = set.snapshot();
        snap[0].curreg = 0xf7;
        set.restore(snap);
        assert_eq!(set.path(PathId::Path1).curreg, 0x7);
    }
}

#[cfg(test)]
mod determinism {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Log(Vec<(u8, [u32; 2])>);

    impl AdRegSink for Log {
        fn signal(&mut self, payload: [u32; 2]) {
            self.0.push((0, payload));
        }
        fn finish(&mut self, payload: [u32; 2]) {
            self.0.push((1, payload));
        }
        fn label(&mut self, payload: [u32; 2]) {
            self.0.push((2, payload));
        }
    }

    proptest! {
        // Same input and same initial state must yield the same callbacks
        // and the same final state, for every path.
        #[test]
        fn parse_is_deterministic(
            words in proptest::collection::vec((any::<u64>(), any::<u64>()), 0..64),
            path_idx in 0usize..3,
        ) {
            let mem: Vec<QWord> =
                words.iter().map(|&(lo, hi)| QWord { lo, hi }).collect();
            let path = PathId::ALL[path_idx];

            let mut a = GifPath::default();
            let mut b = GifPath::default();
            let mut log_a = Log::default();
            let mut log_b = Log::default();

            let left_a = a.parse(path, &mem, &mut log_a);
            let left_b = b.parse(path, &mem, &mut log_b);

            prop_assert_eq!(left_a, left_b);
            prop_assert_eq!(log_a, log_b);
            prop_assert_eq!(a, b);
        }
    }
}
