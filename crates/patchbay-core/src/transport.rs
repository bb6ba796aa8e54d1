//! Transport seams and the in-memory loopback transport.
//!
//! The router never talks to USB (or any other medium) directly; it sees
//! the outside world as per-cable byte queues behind the [`Transport`]
//! trait, and as a shared packet stream behind [`PacketIo`] for the
//! packet-level variant. Hosts implement these against their own stack;
//! [`LoopbackTransport`] and [`PacketQueue`] are the in-memory
//! implementations used by tests, demos and virtual re-cabling.

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use patchbay_midi::UsbMidiPacket;

use crate::cable::CableId;

/// Non-blocking per-cable byte I/O.
///
/// All three operations complete immediately; `read` and `write` return
/// how many bytes actually moved. An unknown cable id reads and writes
/// zero bytes.
pub trait Transport {
    /// Bytes currently readable for `cable`.
    fn bytes_available(&self, cable: CableId) -> usize;

    /// Read up to `buf.len()` bytes arriving on `cable`.
    fn read(&mut self, cable: CableId, buf: &mut [u8]) -> usize;

    /// Write `bytes` to `cable`'s outgoing path.
    fn write(&mut self, cable: CableId, bytes: &[u8]) -> usize;
}

/// Non-blocking USB-MIDI event packet I/O for the packet-level variant.
pub trait PacketIo {
    /// Next incoming packet, if one is pending.
    fn read_packet(&mut self) -> Option<UsbMidiPacket>;

    /// Queue a packet for transmission; `false` if the outgoing side is
    /// full.
    fn write_packet(&mut self, packet: UsbMidiPacket) -> bool;
}

/// One cable's worth of queues: bytes arriving from outside (ingress) and
/// bytes the router sent out (egress). SPSC ring buffer pairs.
struct Lane {
    ingress_prod: HeapProd<u8>,
    ingress_cons: HeapCons<u8>,
    egress_prod: HeapProd<u8>,
    egress_cons: HeapCons<u8>,
}

impl Lane {
    fn new(capacity: usize) -> Self {
        let (ingress_prod, ingress_cons) = HeapRb::<u8>::new(capacity).split();
        let (egress_prod, egress_cons) = HeapRb::<u8>::new(capacity).split();
        Self {
            ingress_prod,
            ingress_cons,
            egress_prod,
            egress_cons,
        }
    }
}

/// In-memory [`Transport`]: what the host feeds in on a cable comes back
/// out of [`LoopbackTransport::sent`] for whatever cable the router
/// forwarded it to.
pub struct LoopbackTransport {
    lanes: Vec<Lane>,
}

impl LoopbackTransport {
    pub fn new(cables: usize, capacity: usize) -> Self {
        Self {
            lanes: (0..cables).map(|_| Lane::new(capacity)).collect(),
        }
    }

    /// Queue bytes as if they arrived from the outside on `cable`.
    /// Returns how many were accepted.
    pub fn feed(&mut self, cable: CableId, bytes: &[u8]) -> usize {
        match self.lanes.get_mut(cable.index()) {
            Some(lane) => lane.ingress_prod.push_slice(bytes),
            None => 0,
        }
    }

    /// Drain everything the router wrote to `cable`'s outgoing path.
    pub fn sent(&mut self, cable: CableId) -> Vec<u8> {
        let Some(lane) = self.lanes.get_mut(cable.index()) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(lane.egress_cons.occupied_len());
        while let Some(byte) = lane.egress_cons.try_pop() {
            out.push(byte);
        }
        out
    }
}

impl Transport for LoopbackTransport {
    fn bytes_available(&self, cable: CableId) -> usize {
        self.lanes
            .get(cable.index())
            .map(|lane| lane.ingress_cons.occupied_len())
            .unwrap_or(0)
    }

    fn read(&mut self, cable: CableId, buf: &mut [u8]) -> usize {
        match self.lanes.get_mut(cable.index()) {
            Some(lane) => lane.ingress_cons.pop_slice(buf),
            None => 0,
        }
    }

    fn write(&mut self, cable: CableId, bytes: &[u8]) -> usize {
        match self.lanes.get_mut(cable.index()) {
            Some(lane) => lane.egress_prod.push_slice(bytes),
            None => 0,
        }
    }
}

/// In-memory [`PacketIo`] over a single shared packet stream.
pub struct PacketQueue {
    incoming_prod: HeapProd<UsbMidiPacket>,
    incoming_cons: HeapCons<UsbMidiPacket>,
    outgoing_prod: HeapProd<UsbMidiPacket>,
    outgoing_cons: HeapCons<UsbMidiPacket>,
}

impl PacketQueue {
    pub fn new(capacity: usize) -> Self {
        let (incoming_prod, incoming_cons) = HeapRb::new(capacity).split();
        let (outgoing_prod, outgoing_cons) = HeapRb::new(capacity).split();
        Self {
            incoming_prod,
            incoming_cons,
            outgoing_prod,
            outgoing_cons,
        }
    }

    /// Queue a packet as if it arrived from the interface.
    pub fn feed(&mut self, packet: UsbMidiPacket) -> bool {
        self.incoming_prod.try_push(packet).is_ok()
    }

    /// Drain the packets the router wrote back.
    pub fn sent(&mut self) -> Vec<UsbMidiPacket> {
        let mut out = Vec::with_capacity(self.outgoing_cons.occupied_len());
        while let Some(packet) = self.outgoing_cons.try_pop() {
            out.push(packet);
        }
        out
    }
}

impl PacketIo for PacketQueue {
    fn read_packet(&mut self) -> Option<UsbMidiPacket> {
        self.incoming_cons.try_pop()
    }

    fn write_packet(&mut self, packet: UsbMidiPacket) -> bool {
        self.outgoing_prod.try_push(packet).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u8) -> CableId {
        CableId::new(raw, 4).unwrap()
    }

    #[test]
    fn test_loopback_ingress() {
        let mut transport = LoopbackTransport::new(4, 64);
        assert_eq!(transport.bytes_available(id(0)), 0);

        assert_eq!(transport.feed(id(0), &[1, 2, 3]), 3);
        assert_eq!(transport.bytes_available(id(0)), 3);
        // Other cables unaffected
        assert_eq!(transport.bytes_available(id(1)), 0);

        let mut buf = [0u8; 8];
        let n = transport.read(id(0), &mut buf);
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(transport.bytes_available(id(0)), 0);
    }

    #[test]
    fn test_loopback_egress() {
        let mut transport = LoopbackTransport::new(4, 64);
        assert_eq!(transport.write(id(2), &[0x90, 0x3C, 0x40]), 3);
        assert_eq!(transport.sent(id(2)), vec![0x90, 0x3C, 0x40]);
        // Drained
        assert!(transport.sent(id(2)).is_empty());
    }

    #[test]
    fn test_loopback_capacity() {
        let mut transport = LoopbackTransport::new(1, 4);
        // Only as much as fits is accepted
        assert_eq!(transport.feed(id(0), &[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(transport.bytes_available(id(0)), 4);
    }

    #[test]
    fn test_packet_queue() {
        let mut queue = PacketQueue::new(8);
        let packet = UsbMidiPacket::from_bytes([0x09, 0x90, 0x3C, 0x40]);
        assert!(queue.feed(packet));

        assert_eq!(queue.read_packet(), Some(packet));
        assert_eq!(queue.read_packet(), None);

        assert!(queue.write_packet(packet));
        assert_eq!(queue.sent(), vec![packet]);
    }
}
