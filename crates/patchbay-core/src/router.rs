//! Poll-driven cable routing.
//!
//! [`PatchBay`] owns the cables and the routing table and drives one
//! polling step per cable against a [`Transport`]: pull whatever bytes are
//! available, carry them per the configured [`RoutePolicy`], and hand the
//! result to the routed destination's outgoing path. Nothing blocks; a
//! cable with no pending bytes costs one availability query.
//!
//! [`PacketRouter`] is the packet-level alternative for hosts that expose
//! a single USB-MIDI event-packet stream instead of per-cable byte queues:
//! it relocates each packet's cable-number field per the same routing
//! table and never looks inside the payload.

use std::sync::Arc;

use arc_swap::ArcSwap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use patchbay_midi::{message, MessageSink, MidiEvent};

use crate::cable::{Cable, CableId};
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::routing::{RoutingSnapshot, RoutingTable};
use crate::transport::{PacketIo, Transport};

/// How polled traffic is carried to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoutePolicy {
    /// Forward accumulated raw bytes verbatim, without inspecting them.
    Forward,
    /// Reassemble complete MIDI messages and relay them one at a time.
    Decode {
        /// Rewrite the channel nibble of channel-voice messages to the
        /// destination cable number. System and realtime messages pass
        /// unchanged.
        remap_channel: bool,
    },
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::Forward
    }
}

/// Diagnostic counters. Failures in the poll path are silent and
/// self-healing; these are how a host observes them.
#[derive(Debug, Default, Clone, Copy)]
pub struct RouterStats {
    /// Complete messages relayed to a destination (decode policy).
    pub messages_forwarded: u64,
    /// Complete messages decoded on a cable with no route (dropped).
    pub messages_unrouted: u64,
    /// Bytes accepted by destination outgoing paths.
    pub bytes_forwarded: u64,
    /// Bytes discarded by the overflow policy.
    pub bytes_dropped: u64,
    /// Buffer/decoder overflow events.
    pub overflows: u64,
}

/// The byte-level router: a fixed set of cables, a routing table and a
/// forwarding policy.
///
/// # Example
///
/// ```
/// use patchbay_core::{LoopbackTransport, PatchBay};
///
/// let mut bay = PatchBay::builder().cables(4).build()?;
/// let mut transport = LoopbackTransport::new(4, 256);
///
/// let (a, b) = (bay.cable(0)?, bay.cable(1)?);
/// bay.connect_output(a, b)?;
///
/// transport.feed(a, &[0x90, 0x3C, 0x40]);
/// bay.poll(&mut transport);
/// assert_eq!(transport.sent(b), vec![0x90, 0x3C, 0x40]);
/// # Ok::<(), patchbay_core::Error>(())
/// ```
pub struct PatchBay {
    cables: Vec<Cable>,
    table: RoutingTable,
    policy: RoutePolicy,
    /// Reused staging area for transport reads.
    scratch: Vec<u8>,
    stats: RouterStats,
}

impl PatchBay {
    pub fn builder() -> PatchBayBuilder {
        PatchBayBuilder::default()
    }

    pub fn with_config(config: RouterConfig) -> Result<Self> {
        if config.cables == 0 || config.cables > u8::MAX as usize + 1 {
            return Err(Error::InvalidConfig(format!(
                "cable count {} out of range (1-256)",
                config.cables
            )));
        }
        let cables = (0..config.cables)
            .map(|index| Cable::new(CableId::from_index(index), config.buffer_capacity))
            .collect();
        debug!(
            cables = config.cables,
            buffer_capacity = config.buffer_capacity,
            policy = ?config.policy,
            "patch bay created"
        );
        Ok(Self {
            cables,
            table: RoutingTable::new(config.cables),
            policy: config.policy,
            scratch: Vec::with_capacity(config.buffer_capacity),
            stats: RouterStats::default(),
        })
    }

    #[inline]
    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    #[inline]
    pub fn policy(&self) -> RoutePolicy {
        self.policy
    }

    #[inline]
    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Validated id lookup for this router.
    pub fn cable(&self, raw: u8) -> Result<CableId> {
        CableId::new(raw, self.cables.len())
    }

    pub fn cable_ids(&self) -> impl Iterator<Item = CableId> + '_ {
        self.cables.iter().map(|cable| cable.id)
    }

    // ==================== Routing ====================

    pub fn connect_output(&mut self, source: CableId, destination: CableId) -> Result<()> {
        self.table.connect_output(source, destination)
    }

    pub fn connect_cross(&mut self, a: CableId, b: CableId) -> Result<()> {
        self.table.connect_cross(a, b)
    }

    pub fn disconnect(&mut self, cable: CableId) -> Result<()> {
        self.table.disconnect(cable)
    }

    pub fn disconnect_all(&mut self) {
        self.table.disconnect_all()
    }

    pub fn target_of(&self, cable: CableId) -> Option<CableId> {
        self.table.target_of(cable)
    }

    /// The underlying table, e.g. to share its snapshot with a
    /// [`PacketRouter`].
    pub fn routing(&self) -> &RoutingTable {
        &self.table
    }

    // ==================== Polling ====================

    /// One polling step for every cable.
    pub fn poll(&mut self, transport: &mut impl Transport) {
        for index in 0..self.cables.len() {
            self.poll_index(index, transport);
        }
    }

    /// One polling step for a single cable.
    pub fn poll_cable(&mut self, cable: CableId, transport: &mut impl Transport) -> Result<()> {
        if cable.index() >= self.cables.len() {
            return Err(Error::InvalidCable {
                cable: cable.number(),
                cables: self.cables.len(),
            });
        }
        self.poll_index(cable.index(), transport);
        Ok(())
    }

    /// Abort whatever is in flight on `cable` (accumulation and partial
    /// message); the only supported mid-message cancellation.
    pub fn reset_cable(&mut self, cable: CableId) -> Result<()> {
        match self.cables.get_mut(cable.index()) {
            Some(c) => {
                c.reset();
                Ok(())
            }
            None => Err(Error::InvalidCable {
                cable: cable.number(),
                cables: self.cables.len(),
            }),
        }
    }

    fn poll_index(&mut self, index: usize, transport: &mut impl Transport) {
        match self.policy {
            RoutePolicy::Forward => self.poll_forward(index, transport),
            RoutePolicy::Decode { remap_channel } => {
                self.poll_decode(index, transport, remap_channel)
            }
        }
    }

    fn poll_forward(&mut self, index: usize, transport: &mut impl Transport) {
        let cable_id = self.cables[index].id;
        let available = transport.bytes_available(cable_id);
        if available == 0 {
            return;
        }
        if available > self.cables[index].frame.remaining() {
            self.drop_incoming(index, transport, available);
            return;
        }

        self.scratch.resize(available, 0);
        let read = transport.read(cable_id, &mut self.scratch[..available]);
        let cable = &mut self.cables[index];
        if cable.frame.extend_from_slice(&self.scratch[..read]).is_err() {
            // Transport delivered more than it advertised; same drop
            // policy as the up-front capacity check.
            self.stats.overflows += 1;
            self.stats.bytes_dropped += read as u64;
            warn!(cable = %cable_id, read, "frame buffer overflow, dropping in-flight bytes");
            return;
        }

        if let Some(target) = self.table.load().target_of(cable_id) {
            // Flush the whole accumulation in one write. A destination
            // that accepts only part of it loses the rest; this path is
            // lossy by contract, not flow-controlled.
            let written = transport.write(target, cable.frame.as_bytes());
            self.stats.bytes_forwarded += written as u64;
            trace!(source = %cable_id, %target, bytes = written, "frame forwarded");
            cable.frame.clear();
        }
    }

    fn poll_decode(&mut self, index: usize, transport: &mut impl Transport, remap_channel: bool) {
        let cable_id = self.cables[index].id;
        let available = transport.bytes_available(cable_id);
        if available == 0 {
            return;
        }

        self.scratch.resize(available, 0);
        let read = transport.read(cable_id, &mut self.scratch[..available]);
        let target = self.table.load().target_of(cable_id);

        let cable = &mut self.cables[index];
        let mut relay = RelaySink {
            transport,
            target,
            remap_to: if remap_channel {
                target.map(CableId::number)
            } else {
                None
            },
            messages: 0,
            bytes: 0,
            unrouted: 0,
        };
        let mut overflows = 0u64;
        for &byte in &self.scratch[..read] {
            if cable.decoder.feed(byte, &mut relay).is_err() {
                // The decoder has already reset itself; keep draining.
                overflows += 1;
            }
        }

        self.stats.messages_forwarded += relay.messages;
        self.stats.messages_unrouted += relay.unrouted;
        self.stats.bytes_forwarded += relay.bytes;
        self.stats.overflows += overflows;
    }

    /// Overflow policy: the accumulation and the in-flight window are
    /// discarded whole, nothing is forwarded.
    fn drop_incoming(&mut self, index: usize, transport: &mut impl Transport, available: usize) {
        let cable = &mut self.cables[index];
        let dropped = cable.frame.len() + available;
        cable.frame.clear();
        // Drain the transport so the dropped window doesn't reappear on
        // the next poll.
        let mut sink = [0u8; 64];
        while transport.read(cable.id, &mut sink) > 0 {}
        self.stats.overflows += 1;
        self.stats.bytes_dropped += dropped as u64;
        warn!(cable = %cable.id, available, "frame buffer overflow, dropping accumulated bytes");
    }

    // ==================== Sending ====================

    /// Write raw bytes to `cable`'s outgoing path. Returns bytes accepted.
    pub fn send_raw(
        &self,
        transport: &mut impl Transport,
        cable: CableId,
        bytes: &[u8],
    ) -> Result<usize> {
        self.cable(cable.number())?;
        Ok(transport.write(cable, bytes))
    }

    /// Write a typed event to `cable`'s outgoing path.
    pub fn send_event(
        &self,
        transport: &mut impl Transport,
        cable: CableId,
        event: &MidiEvent,
    ) -> Result<usize> {
        self.send_raw(transport, cable, &event.to_bytes())
    }

    pub fn send_note_on(
        &self,
        transport: &mut impl Transport,
        cable: CableId,
        channel: u8,
        note: u8,
        velocity: u8,
    ) -> Result<usize> {
        self.send_event(
            transport,
            cable,
            &MidiEvent::note_on(channel.min(15), note.min(127), velocity.min(127)),
        )
    }

    pub fn send_note_off(
        &self,
        transport: &mut impl Transport,
        cable: CableId,
        channel: u8,
        note: u8,
        velocity: u8,
    ) -> Result<usize> {
        self.send_event(
            transport,
            cable,
            &MidiEvent::note_off(channel.min(15), note.min(127), velocity.min(127)),
        )
    }

    /// Per-note aftertouch.
    pub fn send_aftertouch(
        &self,
        transport: &mut impl Transport,
        cable: CableId,
        channel: u8,
        note: u8,
        touch: u8,
    ) -> Result<usize> {
        self.send_event(
            transport,
            cable,
            &MidiEvent::poly_aftertouch(channel.min(15), note.min(127), touch.min(127)),
        )
    }

    pub fn send_control_change(
        &self,
        transport: &mut impl Transport,
        cable: CableId,
        channel: u8,
        control: u8,
        value: u8,
    ) -> Result<usize> {
        self.send_event(
            transport,
            cable,
            &MidiEvent::control_change(channel.min(15), control.min(127), value.min(127)),
        )
    }

    /// Timing clock (realtime, single byte).
    pub fn send_clock(&self, transport: &mut impl Transport, cable: CableId) -> Result<usize> {
        self.send_raw(transport, cable, &[message::CLOCK])
    }
}

/// Sink adapter carrying each completed message to the routed destination.
struct RelaySink<'a, T: Transport> {
    transport: &'a mut T,
    target: Option<CableId>,
    /// Destination channel nibble when channel remapping is on.
    remap_to: Option<u8>,
    messages: u64,
    bytes: u64,
    unrouted: u64,
}

impl<T: Transport> MessageSink for RelaySink<'_, T> {
    fn message(&mut self, bytes: &[u8]) {
        let Some(target) = self.target else {
            self.unrouted += 1;
            return;
        };
        let written = match self.remap_to {
            Some(channel) if !bytes.is_empty() && message::is_channel_voice(bytes[0]) => {
                let mut out: SmallVec<[u8; 8]> = SmallVec::from_slice(bytes);
                out[0] = message::with_channel(out[0], channel);
                self.transport.write(target, &out)
            }
            _ => self.transport.write(target, bytes),
        };
        self.messages += 1;
        self.bytes += written as u64;
        trace!(%target, len = bytes.len(), "message relayed");
    }
}

/// Builder for configuring a [`PatchBay`].
#[derive(Debug, Default)]
pub struct PatchBayBuilder {
    config: RouterConfig,
}

impl PatchBayBuilder {
    /// Number of logical cables (1-256).
    pub fn cables(mut self, cables: usize) -> Self {
        self.config.cables = cables;
        self
    }

    /// Per-cable frame/decoder capacity in bytes.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    pub fn policy(mut self, policy: RoutePolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn build(self) -> Result<PatchBay> {
        PatchBay::with_config(self.config)
    }
}

/// The packet-level router: relocates the cable-number field of USB-MIDI
/// event packets per a shared routing snapshot. Does not decode anything.
pub struct PacketRouter {
    snapshot: Arc<ArcSwap<RoutingSnapshot>>,
    forwarded: u64,
    dropped: u64,
}

impl PacketRouter {
    /// Routes follow `table`; later table mutations are picked up on the
    /// next poll.
    pub fn new(table: &RoutingTable) -> Self {
        Self {
            snapshot: table.snapshot_arc(),
            forwarded: 0,
            dropped: 0,
        }
    }

    /// Drain every pending packet, rewriting routed ones to their
    /// destination cable. Packets on unrouted cables are dropped. Returns
    /// the number forwarded this step.
    pub fn poll(&mut self, io: &mut impl PacketIo) -> usize {
        let snapshot = self.snapshot.load();
        let mut forwarded = 0;
        while let Some(packet) = io.read_packet() {
            match snapshot.target_by_number(packet.cable_number()) {
                Some(target) => {
                    if io.write_packet(packet.with_cable(target.number())) {
                        self.forwarded += 1;
                        forwarded += 1;
                        trace!(source = packet.cable_number(), %target, "packet forwarded");
                    } else {
                        self.dropped += 1;
                        warn!(%target, "packet output full, dropping");
                    }
                }
                None => {
                    self.dropped += 1;
                    trace!(cable = packet.cable_number(), "packet on unrouted cable dropped");
                }
            }
        }
        forwarded
    }

    #[inline]
    pub fn packets_forwarded(&self) -> u64 {
        self.forwarded
    }

    #[inline]
    pub fn packets_dropped(&self) -> u64 {
        self.dropped
    }
}
