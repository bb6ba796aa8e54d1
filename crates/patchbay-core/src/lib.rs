//! Cable routing core for patchbay.
//!
//! Routes MIDI traffic between a fixed set of logical cables. The outside
//! world is reached only through the [`Transport`] / [`PacketIo`] seams;
//! everything here is single-threaded and poll-driven - one call to
//! [`PatchBay::poll`] per iteration of the host's loop, nothing blocks.
//!
//! - [`PatchBay`] - cables + routing table + forwarding policy
//! - [`RoutingTable`] / [`RoutingSnapshot`] - validated connect /
//!   disconnect with lock-free reads
//! - [`PacketRouter`] - USB-MIDI event-packet variant
//! - [`LoopbackTransport`] - in-memory transport for tests and virtual
//!   re-cabling
//!
//! # Example
//!
//! ```
//! use patchbay_core::{LoopbackTransport, PatchBay};
//!
//! let mut bay = PatchBay::builder().cables(8).build()?;
//! let mut transport = LoopbackTransport::new(8, 1024);
//!
//! let (a, b) = (bay.cable(0)?, bay.cable(1)?);
//! bay.connect_cross(a, b)?;
//!
//! transport.feed(a, &[0x90, 0x3C, 0x40]);
//! bay.poll(&mut transport);
//! assert_eq!(transport.sent(b), vec![0x90, 0x3C, 0x40]);
//! # Ok::<(), patchbay_core::Error>(())
//! ```

// Error types
pub mod error;
pub use error::{Error, Result};

mod cable;
pub use cable::CableId;

mod config;
pub use config::{RouterConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_CABLES};

mod routing;
pub use routing::{RoutingSnapshot, RoutingTable};

mod router;
pub use router::{PacketRouter, PatchBay, PatchBayBuilder, RoutePolicy, RouterStats};

mod transport;
pub use transport::{LoopbackTransport, PacketIo, PacketQueue, Transport};
