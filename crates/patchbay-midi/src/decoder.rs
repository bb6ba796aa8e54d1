//! MIDI 1.0 stream decoding with running status.
//!
//! [`StreamDecoder`] consumes one byte at a time and emits each complete
//! message through a [`MessageSink`]. It handles the three framing regimes
//! of the wire protocol:
//!
//! - fixed-length channel/system-common messages (1-3 bytes),
//! - running status (a data byte after a complete message re-uses the
//!   previous status without it being retransmitted),
//! - System-Exclusive streams (0xF0 ... 0xF7, opaque payload).
//!
//! Realtime bytes (0xF8-0xFF) are emitted the moment they arrive and never
//! disturb a message in progress, so a clock byte landing between the note
//! and velocity of a Note On leaves both the pending bytes and the running
//! status intact.
//!
//! The decoder never writes past its capacity: an over-long message (in
//! practice a SysEx payload larger than the buffer) is dropped whole, the
//! state machine resets, and the overflow is counted and reported.

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::message::{expected_data_len, is_realtime, is_status_byte, DataLen, SYSEX_END};

/// Default capacity of the pending-message buffer. Only System-Exclusive
/// payloads ever approach it; everything else tops out at three bytes.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Receives each completed message as a borrowed byte view.
///
/// The view is valid only for the duration of the call; the decoder reuses
/// the same storage for the next message. Closures work directly:
///
/// ```
/// use patchbay_midi::StreamDecoder;
///
/// let mut decoder = StreamDecoder::new();
/// let mut seen = Vec::new();
/// let mut sink = |bytes: &[u8]| seen.push(bytes.to_vec());
/// decoder.feed_all(&[0x90, 0x3C, 0x40], &mut sink).unwrap();
/// assert_eq!(seen, vec![vec![0x90, 0x3C, 0x40]]);
/// ```
pub trait MessageSink {
    fn message(&mut self, bytes: &[u8]);
}

impl<F: FnMut(&[u8])> MessageSink for F {
    fn message(&mut self, bytes: &[u8]) {
        self(bytes)
    }
}

/// Where the decoder is within the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// No message in progress and no status to fall back on.
    Idle,
    /// A status byte has been seen; `expected` data bytes still outstanding.
    Collecting { expected: u8 },
    /// A complete message was emitted and its status byte is retained at
    /// the front of the pending buffer; the next data byte starts a new
    /// message under that implicit status.
    Running { expected: u8 },
    /// Inside a System-Exclusive stream, waiting for the 0xF7 terminator.
    SysEx,
}

/// Diagnostic counters, observable without interrupting decoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecoderStats {
    /// Complete messages handed to the sink.
    pub messages: u64,
    /// Messages dropped because they outgrew the pending buffer.
    pub overflows: u64,
    /// Bytes dropped for having no message to belong to: data bytes with
    /// no status in effect, or an EOX with no SysEx open.
    pub stray_bytes: u64,
}

/// Stateful MIDI 1.0 byte-stream parser.
///
/// One instance per logical stream; state persists across calls and resets
/// itself after every completed message per the running-status rule.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecodeState,
    /// Status byte plus accumulated data. Channel messages stay inline;
    /// SysEx spills to the heap up to `capacity`.
    pending: SmallVec<[u8; 8]>,
    capacity: usize,
    stats: DecoderStats,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds the longest message (i.e. SysEx payload) that can
    /// be reassembled. Clamped so a complete channel message always fits.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: DecodeState::Idle,
            pending: SmallVec::new(),
            capacity: capacity.max(4),
            stats: DecoderStats::default(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes accumulated towards the message currently in progress.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Abort any message in progress and return to the initial state.
    /// Counters are kept.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.state = DecodeState::Idle;
    }

    /// Process one byte; a completed message is handed to `sink` before
    /// the call returns.
    ///
    /// An overflow is reported as an error, but the decoder has already
    /// recovered by the time the caller sees it: the oversized message is
    /// gone and the next status byte starts clean.
    pub fn feed(&mut self, byte: u8, sink: &mut impl MessageSink) -> Result<()> {
        if is_realtime(byte) {
            // Single-byte message, transparent to whatever is in flight.
            self.stats.messages += 1;
            sink.message(&[byte]);
            return Ok(());
        }
        if is_status_byte(byte) {
            self.feed_status(byte, sink)
        } else {
            self.feed_data(byte, sink)
        }
    }

    /// Process a whole chunk in order. All bytes are consumed even if an
    /// overflow occurs partway through; the first error is returned once
    /// the chunk is drained.
    pub fn feed_all(&mut self, bytes: &[u8], sink: &mut impl MessageSink) -> Result<()> {
        let mut first_err = None;
        for &byte in bytes {
            if let Err(err) = self.feed(byte, sink) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn feed_status(&mut self, status: u8, sink: &mut impl MessageSink) -> Result<()> {
        if status == SYSEX_END {
            if self.state == DecodeState::SysEx {
                // Terminator belongs to the message: append, emit, reset.
                self.push_bounded(SYSEX_END)?;
                self.emit(sink);
                self.reset();
            } else {
                // EOX with nothing open.
                self.stats.stray_bytes += 1;
                self.reset();
            }
            return Ok(());
        }

        if self.state == DecodeState::SysEx {
            trace!(status, "status byte terminated unfinished SysEx stream");
        }

        // A status byte always begins a new message, discarding any
        // partial accumulation.
        self.pending.clear();
        self.pending.push(status);
        match expected_data_len(status) {
            DataLen::Unbounded => self.state = DecodeState::SysEx,
            DataLen::Fixed(0) => {
                self.emit(sink);
                self.reset();
            }
            DataLen::Fixed(expected) => self.state = DecodeState::Collecting { expected },
        }
        Ok(())
    }

    fn feed_data(&mut self, byte: u8, sink: &mut impl MessageSink) -> Result<()> {
        match self.state {
            DecodeState::Idle => {
                // Nothing this byte could belong to.
                self.stats.stray_bytes += 1;
                Ok(())
            }
            DecodeState::SysEx => self.push_bounded(byte),
            DecodeState::Collecting { expected } | DecodeState::Running { expected } => {
                // Cannot overflow: status + at most two data bytes, and
                // capacity is clamped to hold a full channel message.
                self.pending.push(byte);
                if self.pending.len() == 1 + expected as usize {
                    self.emit(sink);
                    // Running status: keep the status byte, rewind the
                    // write position to just after it.
                    self.pending.truncate(1);
                    self.state = DecodeState::Running { expected };
                }
                Ok(())
            }
        }
    }

    /// Append with the physical capacity check used on the unbounded
    /// (SysEx) path. Fails closed: the whole message is dropped.
    fn push_bounded(&mut self, byte: u8) -> Result<()> {
        if self.pending.len() >= self.capacity {
            warn!(
                capacity = self.capacity,
                "message exceeded decoder capacity, dropping"
            );
            self.stats.overflows += 1;
            self.reset();
            return Err(Error::BufferOverflow {
                capacity: self.capacity,
            });
        }
        self.pending.push(byte);
        Ok(())
    }

    fn emit(&mut self, sink: &mut impl MessageSink) {
        self.stats.messages += 1;
        trace!(len = self.pending.len(), status = self.pending[0], "message complete");
        sink.message(&self.pending);
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collect emitted messages as owned vectors.
    fn decode(decoder: &mut StreamDecoder, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut sink = |bytes: &[u8]| out.push(bytes.to_vec());
        let _ = decoder.feed_all(bytes, &mut sink);
        out
    }

    #[test]
    fn test_note_on_completion() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0x90, 0x3C, 0x40]);
        assert_eq!(messages, vec![vec![0x90, 0x3C, 0x40]]);
    }

    #[test]
    fn test_running_status() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0x90, 0x3C, 0x40, 0x3E, 0x50]);
        assert_eq!(
            messages,
            vec![vec![0x90, 0x3C, 0x40], vec![0x90, 0x3E, 0x50]]
        );
    }

    #[test]
    fn test_running_status_survives_chunk_boundaries() {
        let mut decoder = StreamDecoder::new();
        let mut messages = decode(&mut decoder, &[0x90, 0x3C]);
        assert!(messages.is_empty());
        messages = decode(&mut decoder, &[0x40, 0x3E]);
        assert_eq!(messages, vec![vec![0x90, 0x3C, 0x40]]);
        messages = decode(&mut decoder, &[0x50]);
        assert_eq!(messages, vec![vec![0x90, 0x3E, 0x50]]);
    }

    #[test]
    fn test_single_data_byte_messages() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0xC0, 0x05, 0xD3, 0x22]);
        assert_eq!(messages, vec![vec![0xC0, 0x05], vec![0xD3, 0x22]]);
    }

    #[test]
    fn test_zero_data_messages_emit_immediately() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decode(&mut decoder, &[0xF8]), vec![vec![0xF8]]);
        assert_eq!(decode(&mut decoder, &[0xF6]), vec![vec![0xF6]]);
    }

    #[test]
    fn test_sysex_framing() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0xF0, 0x01, 0x02, 0x03, 0xF7]);
        assert_eq!(messages, vec![vec![0xF0, 0x01, 0x02, 0x03, 0xF7]]);
    }

    #[test]
    fn test_unterminated_sysex_stays_pending() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0xF0, 0x01, 0x02]);
        assert!(messages.is_empty());
        assert_eq!(decoder.pending_len(), 3);

        // The terminator may arrive in a later chunk.
        let messages = decode(&mut decoder, &[0xF7]);
        assert_eq!(messages, vec![vec![0xF0, 0x01, 0x02, 0xF7]]);
    }

    #[test]
    fn test_status_byte_aborts_partial_message() {
        let mut decoder = StreamDecoder::new();
        // Note On loses its velocity to a new status byte; only the CC
        // completes.
        let messages = decode(&mut decoder, &[0x90, 0x3C, 0xB0, 0x07, 0x64]);
        assert_eq!(messages, vec![vec![0xB0, 0x07, 0x64]]);
    }

    #[test]
    fn test_realtime_transparent_to_pending_message() {
        let mut decoder = StreamDecoder::new();
        // Clock lands between note and velocity: emitted immediately, and
        // the Note On still completes intact.
        let messages = decode(&mut decoder, &[0x90, 0x3C, 0xF8, 0x40]);
        assert_eq!(messages, vec![vec![0xF8], vec![0x90, 0x3C, 0x40]]);
    }

    #[test]
    fn test_realtime_transparent_to_running_status() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0x90, 0x3C, 0x40, 0xF8, 0x3E, 0x50]);
        assert_eq!(
            messages,
            vec![vec![0x90, 0x3C, 0x40], vec![0xF8], vec![0x90, 0x3E, 0x50]]
        );
    }

    #[test]
    fn test_realtime_transparent_to_sysex() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0xF0, 0x01, 0xF8, 0x02, 0xF7]);
        assert_eq!(
            messages,
            vec![vec![0xF8], vec![0xF0, 0x01, 0x02, 0xF7]]
        );
    }

    #[test]
    fn test_stray_data_bytes_dropped() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0x12, 0x34]);
        assert!(messages.is_empty());
        assert_eq!(decoder.stats().stray_bytes, 2);
    }

    #[test]
    fn test_stray_eox_dropped() {
        let mut decoder = StreamDecoder::new();
        let messages = decode(&mut decoder, &[0xF7, 0x90, 0x3C, 0x40]);
        assert_eq!(messages, vec![vec![0x90, 0x3C, 0x40]]);
        assert_eq!(decoder.stats().stray_bytes, 1);
    }

    #[test]
    fn test_status_interrupts_sysex() {
        let mut decoder = StreamDecoder::new();
        // Unterminated SysEx is discarded when a new status arrives.
        let messages = decode(&mut decoder, &[0xF0, 0x01, 0x02, 0x90, 0x3C, 0x40]);
        assert_eq!(messages, vec![vec![0x90, 0x3C, 0x40]]);
    }

    #[test]
    fn test_sysex_overflow_fails_closed() {
        let mut decoder = StreamDecoder::with_capacity(8);
        let mut out = Vec::new();

        let mut stream = vec![0xF0];
        stream.extend(std::iter::repeat(0x11).take(16));
        let err = decoder
            .feed_all(&stream, &mut |bytes: &[u8]| out.push(bytes.to_vec()))
            .unwrap_err();
        assert!(matches!(err, Error::BufferOverflow { capacity: 8 }));
        assert!(out.is_empty());
        assert!(decoder.stats().overflows >= 1);

        // Fully recovered: the next message decodes normally.
        decoder
            .feed_all(&[0x90, 0x3C, 0x40], &mut |bytes: &[u8]| out.push(bytes.to_vec()))
            .unwrap();
        assert_eq!(out, vec![vec![0x90, 0x3C, 0x40]]);
    }

    #[test]
    fn test_reset_aborts_in_progress_message() {
        let mut decoder = StreamDecoder::new();
        let mut messages = decode(&mut decoder, &[0x90, 0x3C]);
        assert!(messages.is_empty());
        decoder.reset();
        // The orphaned velocity byte is now stray.
        messages = decode(&mut decoder, &[0x40]);
        assert!(messages.is_empty());
        assert_eq!(decoder.stats().stray_bytes, 1);
    }

    #[test]
    fn test_message_counter() {
        let mut decoder = StreamDecoder::new();
        decode(&mut decoder, &[0x90, 0x3C, 0x40, 0x3E, 0x50, 0xF8]);
        assert_eq!(decoder.stats().messages, 3);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Arbitrary input never panics and never produces a message
            /// larger than the decoder's capacity.
            #[test]
            fn arbitrary_streams_stay_bounded(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
                let mut decoder = StreamDecoder::with_capacity(32);
                let mut max_len = 0usize;
                let mut sink = |bytes: &[u8]| max_len = max_len.max(bytes.len());
                let _ = decoder.feed_all(&bytes, &mut sink);
                prop_assert!(max_len <= 32);
                prop_assert!(decoder.pending_len() <= 32);
            }

            /// Every emitted message starts with a status byte and carries
            /// no status bytes in its interior (except a SysEx terminator).
            #[test]
            fn emitted_messages_are_well_formed(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
                let mut decoder = StreamDecoder::new();
                let mut ok = true;
                let mut sink = |bytes: &[u8]| {
                    ok &= !bytes.is_empty() && bytes[0] & 0x80 != 0;
                    if let Some((last, interior)) = bytes[1..].split_last() {
                        ok &= interior.iter().all(|&b| b & 0x80 == 0);
                        ok &= *last & 0x80 == 0 || *last == 0xF7;
                    }
                };
                let _ = decoder.feed_all(&bytes, &mut sink);
                prop_assert!(ok);
            }

            /// A chunked delivery of the same stream yields the same
            /// messages as a single delivery.
            #[test]
            fn chunking_is_transparent(
                bytes in proptest::collection::vec(any::<u8>(), 0..256),
                split in 0usize..256,
            ) {
                let mut whole = Vec::new();
                let mut decoder = StreamDecoder::new();
                let mut sink = |bytes: &[u8]| whole.push(bytes.to_vec());
                let _ = decoder.feed_all(&bytes, &mut sink);

                let mut parts = Vec::new();
                let mut decoder = StreamDecoder::new();
                let mut sink = |bytes: &[u8]| parts.push(bytes.to_vec());
                let split = split.min(bytes.len());
                let _ = decoder.feed_all(&bytes[..split], &mut sink);
                let _ = decoder.feed_all(&bytes[split..], &mut sink);

                prop_assert_eq!(whole, parts);
            }
        }
    }
}
