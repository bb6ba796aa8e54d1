//! Cable routing table with lock-free snapshot reads.
//!
//! The mutation side ([`RoutingTable`]) validates and applies connect /
//! disconnect operations; the poll side reads an immutable
//! [`RoutingSnapshot`] loaded through `arc-swap`, so route lookups in the
//! polling loop never contend with configuration changes:
//!
//! ```text
//! Config context                       Poll context
//!     │                                    │
//!     ▼                                    ▼
//! ┌──────────────┐                  ┌──────────────────┐
//! │ RoutingTable │────ArcSwap──────▶│ RoutingSnapshot  │
//! │ - targets[]  │                  │   (immutable)    │
//! │ - connect_*  │                  │ - target_of()    │
//! └──────────────┘                  └──────────────────┘
//! ```
//!
//! Every mutation publishes a fresh snapshot immediately; there is no
//! staged/commit step because each operation is a single route write.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::cable::CableId;
use crate::error::{Error, Result};

/// Immutable view of the routing state: each cable maps to zero or one
/// destination.
#[derive(Clone, Debug)]
pub struct RoutingSnapshot {
    targets: Vec<Option<CableId>>,
}

impl RoutingSnapshot {
    /// A snapshot with every cable disconnected (the startup state).
    pub fn disconnected(cables: usize) -> Self {
        Self {
            targets: vec![None; cables],
        }
    }

    /// Destination for `cable`, if connected.
    #[inline]
    pub fn target_of(&self, cable: CableId) -> Option<CableId> {
        self.targets.get(cable.index()).copied().flatten()
    }

    /// Destination for a raw cable number (e.g. a packet header nibble).
    /// Out-of-range numbers are simply unrouted.
    #[inline]
    pub fn target_by_number(&self, cable: u8) -> Option<CableId> {
        self.targets.get(cable as usize).copied().flatten()
    }

    #[inline]
    pub fn cables(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_routed(&self, cable: CableId) -> bool {
        self.target_of(cable).is_some()
    }
}

/// Mutable routing table; all mutations are range-validated and take
/// effect on the next route lookup.
pub struct RoutingTable {
    targets: Vec<Option<CableId>>,
    snapshot: Arc<ArcSwap<RoutingSnapshot>>,
}

impl RoutingTable {
    /// A table over `cables` cables, all disconnected.
    pub fn new(cables: usize) -> Self {
        let snapshot = RoutingSnapshot::disconnected(cables);
        Self {
            targets: vec![None; cables],
            snapshot: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    /// Shared handle to the snapshot for poll contexts that outlive a
    /// borrow of the table (e.g. a packet router).
    pub fn snapshot_arc(&self) -> Arc<ArcSwap<RoutingSnapshot>> {
        self.snapshot.clone()
    }

    /// Load the current snapshot.
    #[inline]
    pub fn load(&self) -> arc_swap::Guard<Arc<RoutingSnapshot>> {
        self.snapshot.load()
    }

    #[inline]
    pub fn cables(&self) -> usize {
        self.targets.len()
    }

    fn check(&self, cable: CableId) -> Result<()> {
        if cable.index() < self.targets.len() {
            Ok(())
        } else {
            Err(Error::InvalidCable {
                cable: cable.number(),
                cables: self.targets.len(),
            })
        }
    }

    /// Redirect `source`'s outgoing traffic to `destination`
    /// (one-directional). Overwrites any prior route for `source`.
    ///
    /// Connecting a cable to itself is permitted and produces an echo
    /// loop; avoiding that is the caller's responsibility.
    pub fn connect_output(&mut self, source: CableId, destination: CableId) -> Result<()> {
        self.check(source)?;
        self.check(destination)?;
        self.targets[source.index()] = Some(destination);
        debug!(%source, %destination, "route connected");
        self.publish();
        Ok(())
    }

    /// Make `a` and `b` each other's destination (bidirectional).
    pub fn connect_cross(&mut self, a: CableId, b: CableId) -> Result<()> {
        self.check(a)?;
        self.check(b)?;
        self.targets[a.index()] = Some(b);
        self.targets[b.index()] = Some(a);
        debug!(cable_a = %a, cable_b = %b, "cross connection established");
        self.publish();
        Ok(())
    }

    /// Clear `cable`'s destination.
    pub fn disconnect(&mut self, cable: CableId) -> Result<()> {
        self.check(cable)?;
        self.targets[cable.index()] = None;
        debug!(%cable, "route disconnected");
        self.publish();
        Ok(())
    }

    /// Return every cable to the disconnected startup state.
    pub fn disconnect_all(&mut self) {
        self.targets.iter_mut().for_each(|t| *t = None);
        debug!("all routes disconnected");
        self.publish();
    }

    /// Destination currently configured for `cable`.
    pub fn target_of(&self, cable: CableId) -> Option<CableId> {
        self.targets.get(cable.index()).copied().flatten()
    }

    fn publish(&self) {
        self.snapshot.store(Arc::new(RoutingSnapshot {
            targets: self.targets.clone(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u8) -> CableId {
        CableId::new(raw, 8).unwrap()
    }

    #[test]
    fn test_starts_disconnected() {
        let table = RoutingTable::new(8);
        for raw in 0..8 {
            assert_eq!(table.target_of(id(raw)), None);
        }
    }

    #[test]
    fn test_connect_output_is_one_directional() {
        let mut table = RoutingTable::new(8);
        table.connect_output(id(0), id(1)).unwrap();
        assert_eq!(table.target_of(id(0)), Some(id(1)));
        assert_eq!(table.target_of(id(1)), None);
    }

    #[test]
    fn test_connect_output_overwrites() {
        let mut table = RoutingTable::new(8);
        table.connect_output(id(0), id(1)).unwrap();
        table.connect_output(id(0), id(2)).unwrap();
        assert_eq!(table.target_of(id(0)), Some(id(2)));
    }

    #[test]
    fn test_connect_cross_is_symmetric() {
        let mut table = RoutingTable::new(8);
        table.connect_cross(id(2), id(5)).unwrap();
        assert_eq!(table.target_of(id(2)), Some(id(5)));
        assert_eq!(table.target_of(id(5)), Some(id(2)));
        // No coupling to any third cable
        assert_eq!(table.target_of(id(3)), None);
    }

    #[test]
    fn test_disconnect_clears_only_one_direction() {
        let mut table = RoutingTable::new(8);
        table.connect_cross(id(0), id(1)).unwrap();
        table.disconnect(id(0)).unwrap();
        assert_eq!(table.target_of(id(0)), None);
        assert_eq!(table.target_of(id(1)), Some(id(0)));
    }

    #[test]
    fn test_self_loop_permitted() {
        let mut table = RoutingTable::new(8);
        table.connect_output(id(3), id(3)).unwrap();
        assert_eq!(table.target_of(id(3)), Some(id(3)));
    }

    #[test]
    fn test_out_of_range_rejected_at_mutation_time() {
        // Ids minted against a wider router don't fit this table.
        let wide = CableId::new(11, 16).unwrap();
        let mut table = RoutingTable::new(8);
        let err = table.connect_output(id(0), wide).unwrap_err();
        assert!(matches!(err, Error::InvalidCable { cable: 11, cables: 8 }));
        // Nothing was written
        assert_eq!(table.target_of(id(0)), None);
    }

    #[test]
    fn test_snapshot_tracks_mutations() {
        let mut table = RoutingTable::new(8);
        let handle = table.snapshot_arc();
        assert_eq!(handle.load().target_of(id(0)), None);

        table.connect_output(id(0), id(4)).unwrap();
        assert_eq!(handle.load().target_of(id(0)), Some(id(4)));

        table.disconnect(id(0)).unwrap();
        assert_eq!(handle.load().target_of(id(0)), None);
    }

    #[test]
    fn test_snapshot_by_raw_number() {
        let mut table = RoutingTable::new(8);
        table.connect_output(id(1), id(6)).unwrap();
        let snapshot = table.load();
        assert_eq!(snapshot.target_by_number(1), Some(id(6)));
        assert_eq!(snapshot.target_by_number(7), None);
        // Out of range is just unrouted, not an error
        assert_eq!(snapshot.target_by_number(42), None);
    }

    #[test]
    fn test_disconnect_all() {
        let mut table = RoutingTable::new(4);
        table.connect_cross(id(0), id(1)).unwrap();
        table.connect_output(id(2), id(3)).unwrap();
        table.disconnect_all();
        for raw in 0..4 {
            assert_eq!(table.target_of(CableId::new(raw, 4).unwrap()), None);
        }
    }
}
