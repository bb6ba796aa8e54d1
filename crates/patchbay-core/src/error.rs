//! Error types for patchbay-core.

use thiserror::Error;

/// Error type for routing operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A cable id outside the router's range. Rejected at routing-table
    /// mutation time, before any traffic could be misdirected.
    #[error("cable {cable} out of range (router has {cables} cables)")]
    InvalidCable { cable: u8, cables: usize },

    #[error(transparent)]
    Wire(#[from] patchbay_midi::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
