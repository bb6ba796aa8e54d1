//! Cable identity and per-cable state.

use std::fmt;

use patchbay_midi::{FrameBuffer, StreamDecoder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of a logical MIDI cable.
///
/// Ids are stable for the life of the router and validated against the
/// cable count wherever they enter the system; holding a `CableId` does
/// not by itself prove it belongs to a given router, so table operations
/// re-check the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CableId(u8);

impl CableId {
    /// Validated constructor: `raw` must be below `cables`.
    pub fn new(raw: u8, cables: usize) -> Result<Self> {
        if (raw as usize) < cables {
            Ok(Self(raw))
        } else {
            Err(Error::InvalidCable { cable: raw, cables })
        }
    }

    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index <= u8::MAX as usize);
        Self(index as u8)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cable {}", self.0)
    }
}

/// Per-cable state owned by the router: the raw-forwarding accumulation
/// buffer and the stream decoder. Which one a polling step uses depends on
/// the routing policy; both persist for the life of the process.
#[derive(Debug)]
pub(crate) struct Cable {
    pub(crate) id: CableId,
    pub(crate) frame: FrameBuffer,
    pub(crate) decoder: StreamDecoder,
}

impl Cable {
    pub(crate) fn new(id: CableId, buffer_capacity: usize) -> Self {
        Self {
            id,
            frame: FrameBuffer::new(buffer_capacity),
            decoder: StreamDecoder::with_capacity(buffer_capacity),
        }
    }

    /// Abort anything in flight on this cable.
    pub(crate) fn reset(&mut self) {
        self.frame.clear();
        self.decoder.reset();
    }
}
