//! # Patchbay - MIDI stream decoding and cable routing
//!
//! Umbrella crate coordinating the two halves:
//!
//! - **patchbay-midi** - wire level: the running-status stream decoder,
//!   frame accumulation, typed message views, USB-MIDI event packets
//! - **patchbay-core** - routing level: validated cable ids, the routing
//!   table, the poll-driven router and its transports
//!
//! ## Quick Start
//!
//! ```
//! use patchbay::prelude::*;
//!
//! let mut bay = PatchBay::builder().cables(8).build()?;
//! let mut transport = LoopbackTransport::new(8, 1024);
//!
//! // Route cable 0's traffic to cable 1.
//! let (a, b) = (bay.cable(0)?, bay.cable(1)?);
//! bay.connect_output(a, b)?;
//!
//! // One iteration of the host's polling loop.
//! transport.feed(a, &[0x90, 0x3C, 0x40]);
//! bay.poll(&mut transport);
//! assert_eq!(transport.sent(b), vec![0x90, 0x3C, 0x40]);
//! # Ok::<(), patchbay::Error>(())
//! ```

pub use patchbay_core::{
    CableId, Error, LoopbackTransport, PacketIo, PacketQueue, PacketRouter, PatchBay,
    PatchBayBuilder, Result, RoutePolicy, RouterConfig, RouterStats, RoutingSnapshot,
    RoutingTable, Transport,
};

/// Wire-level building blocks, re-exported whole.
pub mod midi {
    pub use patchbay_midi::*;
}

/// Everything most hosts need in one import.
pub mod prelude {
    pub use crate::midi::{FrameBuffer, MessageSink, MidiEvent, StreamDecoder, UsbMidiPacket};
    pub use patchbay_core::{
        CableId, LoopbackTransport, PacketRouter, PatchBay, RoutePolicy, RouterConfig, Transport,
    };
}
