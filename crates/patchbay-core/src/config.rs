//! Construction-time configuration.

use serde::{Deserialize, Serialize};

use crate::router::RoutePolicy;

/// How many logical cables a router exposes by default (the width of one
/// USB-MIDI interface).
pub const DEFAULT_CABLES: usize = 8;

/// Default per-cable buffer capacity in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Everything needed to build a [`PatchBay`](crate::PatchBay).
///
/// Serde-derived so hosts can load a patch layout from their own config
/// format; the router itself reads no files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Number of logical cables.
    pub cables: usize,
    /// Per-cable capacity of the frame buffer and decoder, in bytes.
    pub buffer_capacity: usize,
    /// How polled traffic is carried to its destination.
    pub policy: RoutePolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cables: DEFAULT_CABLES,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            policy: RoutePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.cables, 8);
        assert_eq!(config.buffer_capacity, 1024);
        assert_eq!(config.policy, RoutePolicy::Forward);
    }
}
