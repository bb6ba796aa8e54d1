//! Error types for patchbay-midi.

use thiserror::Error;

/// Error type for wire-level operations.
#[derive(Error, Debug)]
pub enum Error {
    /// More bytes arrived than the backing storage can hold. The affected
    /// buffer or decoder has already reset itself; nothing was emitted.
    #[error("buffer overflow: message exceeded {capacity} byte capacity")]
    BufferOverflow { capacity: usize },

    #[error("malformed MIDI message: {0:?}")]
    Malformed(midi_msg::ParseError),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
