//! GIF tag header decoding

use eb_core::QWord;
use serde::{Deserialize, Serialize};

/// Data layout of the qwords following a tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GifFlag {
    /// One qword per register step; descriptor 0xE selects A+D addressing.
    #[default]
    Packed = 0,
    /// One 64-bit unit per register step, two units per qword.
    Reglist = 1,
    /// Raw image data, no register interpretation.
    Image = 2,
    /// Undocumented alias of IMAGE.
    Image2 = 3,
}

impl GifFlag {
    #[inline]
    fn from_bits(bits: u64) -> Self {
        match bits & 3 {
            0 => GifFlag::Packed,
            1 => GifFlag::Reglist,
            2 => GifFlag::Image,
            _ => GifFlag::Image2,
        }
    }

    /// True for both IMAGE encodings.
    #[inline]
    pub fn is_image(self) -> bool {
        matches!(self, GifFlag::Image | GifFlag::Image2)
    }
}

/// Unpacked GIF tag.
///
/// `nloop` is live parser state: it counts down as register sets are
/// consumed and reaches zero when the tag is complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GifTag {
    /// Remaining register-set repetitions.
    pub nloop: u32,
    /// End of packet: no further tags follow once `nloop` drains.
    pub eop: bool,
    /// Data layout of the payload.
    pub flag: GifFlag,
    /// Raw register count field; 0 encodes 16.
    pub nreg: u32,
    /// Packed 4-bit register descriptors, 16 nibbles.
    pub regs: [u32; 2],
}

impl GifTag {
    /// Unpack a tag from its 128-bit wire form.
    ///
    /// NLOOP sits in bits 0-14, EOP in bit 15, FLG in bits 58-59, NREG in
    /// bits 60-63; the high 64 bits carry the register descriptors. PRE
    /// and PRIM are of no interest to the bridge and are dropped.
    #[inline]
    pub fn from_qword(qw: QWord) -> Self {
        Self {
            nloop: (qw.lo & 0x7fff) as u32,
            eop: qw.lo & (1 << 15) != 0,
            flag: GifFlag::from_bits(qw.lo >> 58),
            nreg: ((qw.lo >> 60) & 0xf) as u32,
            regs: [qw.hi as u32, (qw.hi >> 32) as u32],
        }
    }

    /// Register count with the NREG=0 alias resolved.
    #[inline]
    pub fn active_regs(&self) -> u32 {
        if self.nreg == 0 {
            16
        } else {
            self.nreg
        }
    }
}
