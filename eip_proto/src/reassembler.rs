//! Turns a TCP connection's raw byte stream into discrete, validated encapsulation frames.
//!
//! The encapsulation specification mandates big-endian header fields, but some clients emit
//! little-endian headers instead. [`detect_byte_order`] resolves the ambiguity per frame by
//! checking whether the command code is only recognizable in one of the two interpretations; it
//! defaults to big-endian whenever both or neither interpretation yields a known command. This
//! mirrors the source's conservative "flip only when unambiguous" policy.

use crate::buffer::ConnBuffer;
use crate::encap::{self, ByteOrder, EncapPacket, HEADER_SIZE, WELL_KNOWN_COMMANDS};
use crate::error::FramingError;

const MAX_FRAME_LEN: usize = 65_535;

/// Inspects the first bytes of a candidate frame and decides which byte order it was written in.
/// Returns `None` if fewer than 4 bytes are buffered yet.
pub fn detect_byte_order(bytes: &[u8]) -> Option<ByteOrder> {
    let (cmd_be, cmd_le) = encap::peek_commands(bytes)?;

    let be_known = WELL_KNOWN_COMMANDS.contains(&cmd_be);
    let le_known = WELL_KNOWN_COMMANDS.contains(&cmd_le);

    Some(flux::choose!(le_known && !be_known => ByteOrder::Little, ByteOrder::Big))
}

/// One extracted frame, together with the byte order it was decoded in (the connection should
/// keep using this order for the response).
pub struct ExtractedFrame {
    pub packet: EncapPacket,
    pub byte_order: ByteOrder,
}

/// Result of one extraction attempt against a connection's inbound buffer.
pub enum ExtractOutcome {
    /// A full frame was decoded and consumed from the buffer.
    Frame(ExtractedFrame),
    /// Not enough bytes are buffered yet for a full frame; try again after more bytes arrive.
    Incomplete,
    /// The buffered bytes could not be framed at all. The buffer has already been cleared; the
    /// caller should log this and keep the connection open to await a fresh stream of bytes
    /// (or close it — both are valid policies per the specification).
    Unrecoverable(FramingError),
}

/// Attempts to extract exactly one frame from `buffer`. Callers should loop this until it stops
/// returning `Frame`, since multiple frames may have arrived back to back.
pub fn extract_one(buffer: &mut ConnBuffer) -> ExtractOutcome {
    if buffer.len() < HEADER_SIZE {
        return ExtractOutcome::Incomplete;
    }

    let readable = buffer.readable();

    let byte_order = match detect_byte_order(readable) {
        Some(order) => order,
        None => return ExtractOutcome::Incomplete,
    };

    let length = match encap::peek_length(readable, byte_order) {
        Some(length) => length,
        None => return ExtractOutcome::Incomplete,
    };

    let frame_len = HEADER_SIZE + length as usize;

    if frame_len < HEADER_SIZE || frame_len > MAX_FRAME_LEN {
        buffer.clear();
        return ExtractOutcome::Unrecoverable(FramingError::BadLength);
    }

    if buffer.len() < frame_len {
        return ExtractOutcome::Incomplete;
    }

    let packet = match encap::decode(&buffer.readable()[..frame_len], byte_order) {
        Ok(packet) => packet,
        Err(_) => {
            buffer.clear();
            return ExtractOutcome::Unrecoverable(FramingError::BadLength);
        }
    };

    buffer.consume(frame_len);

    ExtractOutcome::Frame(ExtractedFrame { packet, byte_order })
}

/// Drains every complete frame currently sitting in `buffer`, calling `on_frame` for each. Stops
/// as soon as extraction reports `Incomplete`, leaving any partial frame buffered for the next
/// call. An `Unrecoverable` outcome is reported through `on_error` and then extraction continues
/// (the buffer has already been cleared, so the next attempt starts clean).
pub fn drain<F, E>(buffer: &mut ConnBuffer, mut on_frame: F, mut on_error: E)
where
    F: FnMut(ExtractedFrame),
    E: FnMut(FramingError),
{
    loop {
        match extract_one(buffer) {
            ExtractOutcome::Frame(frame) => on_frame(frame),
            ExtractOutcome::Incomplete => break,
            ExtractOutcome::Unrecoverable(err) => {
                on_error(err);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encap::{EncapHeader, EncapPacket};

    fn encode_register_session(order: ByteOrder) -> Vec<u8> {
        let packet = EncapPacket {
            header: EncapHeader {
                command: encap::CMD_REGISTER_SESSION,
                length: 4,
                session_handle: 0,
                status: 0,
                sender_context: [0; 8],
                options: 0,
            },
            payload: vec![1, 0, 0, 0],
        };
        encap::encode(&packet, order)
    }

    #[test]
    fn test_detect_big_endian_default() {
        let bytes = encode_register_session(ByteOrder::Big);
        assert_eq!(detect_byte_order(&bytes), Some(ByteOrder::Big));
    }

    #[test]
    fn test_detect_little_endian_when_unambiguous() {
        let bytes = encode_register_session(ByteOrder::Little);
        assert_eq!(detect_byte_order(&bytes), Some(ByteOrder::Little));
    }

    #[test]
    fn test_extract_one_waits_for_full_frame() {
        let bytes = encode_register_session(ByteOrder::Big);
        let mut buffer = ConnBuffer::new();
        buffer.extend(&bytes[..HEADER_SIZE - 1]);

        assert!(matches!(extract_one(&mut buffer), ExtractOutcome::Incomplete));
    }

    #[test]
    fn test_extract_one_full_frame() {
        let bytes = encode_register_session(ByteOrder::Big);
        let mut buffer = ConnBuffer::new();
        buffer.extend(&bytes);

        match extract_one(&mut buffer) {
            ExtractOutcome::Frame(frame) => {
                assert_eq!(frame.byte_order, ByteOrder::Big);
                assert_eq!(frame.packet.header.command, encap::CMD_REGISTER_SESSION);
            }
            _ => panic!("expected a full frame"),
        }

        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_extracts_multiple_back_to_back_frames() {
        let one = encode_register_session(ByteOrder::Big);
        let two = encode_register_session(ByteOrder::Big);

        let mut buffer = ConnBuffer::new();
        buffer.extend(&one);
        buffer.extend(&two);

        let mut count = 0;
        drain(&mut buffer, |_| count += 1, |_| panic!("no error expected"));

        assert_eq!(count, 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unrecoverable_length_clears_buffer() {
        // A length field that would push the frame past the 65_535 byte ceiling.
        let mut header = encode_register_session(ByteOrder::Big);
        header[2] = 0xFF;
        header[3] = 0xFF;

        let mut buffer = ConnBuffer::new();
        buffer.extend(&header);

        let mut errored = false;
        drain(&mut buffer, |_| panic!("no frame expected"), |_| errored = true);

        assert!(errored);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_frame_preserved_across_drain_calls() {
        let bytes = encode_register_session(ByteOrder::Big);
        let mut buffer = ConnBuffer::new();
        buffer.extend(&bytes[..bytes.len() - 1]);

        drain(&mut buffer, |_| panic!("no frame yet"), |_| panic!("no error expected"));
        assert_eq!(buffer.len(), bytes.len() - 1);

        buffer.extend(&bytes[bytes.len() - 1..]);

        let mut count = 0;
        drain(&mut buffer, |_| count += 1, |_| panic!("no error expected"));
        assert_eq!(count, 1);
    }
}
