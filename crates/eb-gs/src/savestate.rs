//! Parser-state savestates
//!
//! Only the three path parsers are serialized. The ring itself never is:
//! a snapshot is taken strictly after a full drain, so there is nothing in
//! flight to capture.

use bincode::config;
use eb_gif::GifPath;
use serde::{Deserialize, Serialize};

use crate::bridge::GsBridge;
use crate::error::SaveStateError;

/// Serialized parser state for the three paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GsSnapshot {
    pub paths: [GifPath; 3],
}

impl GsSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveStateError> {
        Ok(bincode::serde::encode_to_vec(self, config::standard())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SaveStateError> {
        let (snapshot, _) = bincode::serde::decode_from_slice(bytes, config::standard())?;
        Ok(snapshot)
    }
}

impl GsBridge {
    /// Drain the ring, then snapshot the parser state.
    pub fn save_state(&mut self) -> GsSnapshot {
        self.wait_drain();
        GsSnapshot {
            paths: self.paths.snapshot(),
        }
    }

    /// Drain the ring, then install restored parser state.
    pub fn load_state(&mut self, snapshot: &GsSnapshot) {
        self.wait_drain();
        self.paths.restore(snapshot.paths.clone());
    }
}

/// Restore a serialized snapshot. Without a live bridge the bytes are
/// still decoded (keeping the surrounding savestate stream positioned)
/// into throwaway zero-initialized state.
pub fn thaw(bytes: &[u8], bridge: Option<&mut GsBridge>) -> Result<(), SaveStateError> {
    let snapshot = GsSnapshot::from_bytes(bytes)?;
    match bridge {
        Some(bridge) => bridge.load_state(&snapshot),
        None => {
            tracing::warn!(target: "gs", "thaw without a live session, parser state discarded");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_gif::{GifFlag, GifTag};

    fn sample_snapshot() -> GsSnapshot {
        let mut snapshot = GsSnapshot::default();
        snapshot.paths[1] = GifPath {
            tag: GifTag {
                nloop: 7,
                eop: true,
                flag: GifFlag::Reglist,
                nreg: 4,
                regs: [0x1234, 0x5678],
            },
            regs: [3; 16],
            curreg: 2,
        };
        snapshot
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snapshot = sample_snapshot();
        let bytes = snapshot.to_bytes().unwrap();
        assert_eq!(GsSnapshot::from_bytes(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_thaw_without_session_decodes_and_discards() {
        let bytes = sample_snapshot().to_bytes().unwrap();
        thaw(&bytes, None).unwrap();
    }

    #[test]
    fn test_thaw_rejects_garbage() {
        assert!(thaw(&[0xff; 3], None).is_err());
    }
}
