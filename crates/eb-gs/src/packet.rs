//! Ring packet framing

use eb_core::QWord;
use eb_gif::PathId;
use thiserror::Error;

/// Commands carried in packet headers.
///
/// Closed set: every consumer-side dispatch arm is checked at compile time,
/// and an id outside the set decodes to a recoverable error instead of a
/// build-dependent assert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RingCommand {
    /// PATH1 data transfer; `data[0]` holds the payload qword count.
    Path1 = 0,
    /// PATH2 data transfer.
    Path2 = 1,
    /// PATH3 data transfer.
    Path3 = 2,
    /// Frame boundary; `data[0]` is the field flag.
    Vsync = 3,
    /// Full backend reset.
    Reset = 4,
    /// Per-path soft reset; `data[0]` is the path mask.
    SoftReset = 5,
    /// Control-register write; `data[0]` is the value.
    WriteCsr = 6,
    /// Display-mode change; `data[0]`/`data[1]` are backend-defined.
    ModeChange = 7,
    /// Register-mirror write, 8-bit; `data[0]` offset, `data[1]` value.
    MemWrite8 = 8,
    /// Register-mirror write, 16-bit.
    MemWrite16 = 9,
    /// Register-mirror write, 32-bit.
    MemWrite32 = 10,
    /// Register-mirror write, 64-bit; value split across `data[1..3]`.
    MemWrite64 = 11,
    /// Backend savestate exchange through the freeze mailbox.
    Freeze = 12,
    /// Toggle backend capture; `data[0]` non-zero enables.
    Record = 13,
    /// Wrap marker: the consumer resets its cursor to the ring origin.
    Restart = 14,
    /// Terminate the render thread.
    Quit = 15,
}

impl RingCommand {
    /// Transfer command for a data path.
    #[inline]
    pub fn from_path(path: PathId) -> Self {
        match path {
            PathId::Path1 => RingCommand::Path1,
            PathId::Path2 => RingCommand::Path2,
            PathId::Path3 => RingCommand::Path3,
        }
    }
}

/// A header qword carried an id outside the command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown ring command id {0:#x}")]
pub struct PacketDecodeError(pub u32);

impl TryFrom<u32> for RingCommand {
    type Error = PacketDecodeError;

    fn try_from(value: u32) -> Result<Self, PacketDecodeError> {
        Ok(match value {
            0 => RingCommand::Path1,
            1 => RingCommand::Path2,
            2 => RingCommand::Path3,
            3 => RingCommand::Vsync,
            4 => RingCommand::Reset,
            5 => RingCommand::SoftReset,
            6 => RingCommand::WriteCsr,
            7 => RingCommand::ModeChange,
            8 => RingCommand::MemWrite8,
            9 => RingCommand::MemWrite16,
            10 => RingCommand::MemWrite32,
            11 => RingCommand::MemWrite64,
            12 => RingCommand::Freeze,
            13 => RingCommand::Record,
            14 => RingCommand::Restart,
            15 => RingCommand::Quit,
            other => return Err(PacketDecodeError(other)),
        })
    }
}

/// One-qword packet header: command id plus three auxiliary words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketTag {
    pub command: RingCommand,
    pub data: [u32; 3],
}

impl PacketTag {
    #[inline]
    pub fn new(command: RingCommand, d0: u32, d1: u32, d2: u32) -> Self {
        Self {
            command,
            data: [d0, d1, d2],
        }
    }

    #[inline]
    pub fn encode(self) -> QWord {
        QWord::from_u32s([self.command as u32, self.data[0], self.data[1], self.data[2]])
    }

    #[inline]
    pub fn decode(qw: QWord) -> Result<Self, PacketDecodeError> {
        let [command, d0, d1, d2] = qw.to_u32s();
        Ok(Self {
            command: RingCommand::try_from(command)?,
            data: [d0, d1, d2],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_commands() {
        for id in 0..16u32 {
            let command = RingCommand::try_from(id).unwrap();
            let tag = PacketTag::new(command, 0xaaaa, 0xbbbb, 0xcccc);
            let decoded = PacketTag::decode(tag.encode()).unwrap();
            assert_eq!(decoded, tag);
        }
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        let err = PacketTag::decode(QWord::from_u32s([0x7f, 0, 0, 0])).unwrap_err();
        assert_eq!(err, PacketDecodeError(0x7f));
    }

    #[test]
    fn test_path_mapping() {
        assert_eq!(RingCommand::from_path(PathId::Path1), RingCommand::Path1);
        assert_eq!(RingCommand::from_path(PathId::Path3), RingCommand::Path3);
    }
}
