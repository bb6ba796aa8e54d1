//! MIDI 1.0 wire protocol for patchbay.
//!
//! The byte-level half of the router: a stateful stream decoder that
//! reassembles discrete messages out of a live byte stream (running
//! status, System-Exclusive framing, interleaved realtime bytes), plus the
//! small pieces the routing layer builds on.
//!
//! - [`StreamDecoder`] - running-status state machine emitting complete
//!   messages through a [`MessageSink`]
//! - [`FrameBuffer`] - fixed-capacity accumulation for raw forwarding
//! - [`MidiEvent`] - typed channel-voice view (construct/inspect messages)
//! - [`UsbMidiPacket`] - 4-byte USB-MIDI event packets for the
//!   packet-level routing variant
//! - [`message`] - raw status-byte classification
//!
//! # Example
//!
//! ```
//! use patchbay_midi::StreamDecoder;
//!
//! let mut decoder = StreamDecoder::new();
//! let mut messages = Vec::new();
//! let mut sink = |bytes: &[u8]| messages.push(bytes.to_vec());
//!
//! // Running status: the second note carries no status byte.
//! decoder.feed_all(&[0x90, 0x3C, 0x40, 0x3E, 0x50], &mut sink)?;
//! assert_eq!(messages.len(), 2);
//! assert_eq!(messages[1], vec![0x90, 0x3E, 0x50]);
//! # Ok::<(), patchbay_midi::Error>(())
//! ```

// Error types
pub mod error;
pub use error::{Error, Result};

mod decoder;
pub use decoder::{DecoderStats, MessageSink, StreamDecoder, DEFAULT_CAPACITY};

mod framing;
pub use framing::FrameBuffer;

mod event;
pub use event::MidiEvent;

mod packet;
pub use packet::{CodeIndex, UsbMidiPacket};

// Raw byte classification, public for hosts working below the typed layer
pub mod message;

// Re-export essential upstream types (users shouldn't need to import midi-msg directly)
pub use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};
