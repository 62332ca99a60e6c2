//! The 24-byte EtherNet/IP encapsulation header, plus encode/decode for the packet it wraps.
//!
//! Integers inside the encapsulation layer (this header and everything in a `SendRRData`
//! payload up to the embedded CIP message) follow whichever byte order the connection has been
//! detected to speak; CIP messages themselves are always little-endian regardless of the outer
//! frame. See [`crate::reassembler`] for the detection heuristic.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

pub const HEADER_SIZE: usize = 24;

pub const CMD_LIST_SERVICES: u16 = 0x0004;
pub const CMD_LIST_IDENTITY: u16 = 0x0063;
pub const CMD_REGISTER_SESSION: u16 = 0x0065;
pub const CMD_UNREGISTER_SESSION: u16 = 0x0066;
pub const CMD_SEND_RR_DATA: u16 = 0x006F;

/// Commands the endianness probe recognizes. Any other command value is simply never
/// "well-known" in either byte order.
pub const WELL_KNOWN_COMMANDS: [u16; 5] = [
    CMD_LIST_SERVICES,
    CMD_LIST_IDENTITY,
    CMD_REGISTER_SESSION,
    CMD_UNREGISTER_SESSION,
    CMD_SEND_RR_DATA,
];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ByteOrder {
    Big,
    Little,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EncapHeader {
    pub command: u16,
    pub length: u16,
    pub session_handle: u32,
    pub status: u32,
    pub sender_context: [u8; 8],
    pub options: u32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EncapPacket {
    pub header: EncapHeader,
    pub payload: Vec<u8>,
}

impl EncapPacket {
    /// Builds a response packet that echoes `request`'s command and sender context, per the
    /// response construction contract: same command, caller-supplied status and session handle,
    /// options always zero, sender context copied verbatim.
    pub fn response_to(request: &EncapPacket, session_handle: u32, status: u32, payload: Vec<u8>) -> EncapPacket {
        EncapPacket {
            header: EncapHeader {
                command: request.header.command,
                length: payload.len() as u16,
                session_handle,
                status,
                sender_context: request.header.sender_context,
                options: 0,
            },
            payload,
        }
    }
}

/// Decodes a full frame (header + payload, exactly `HEADER_SIZE + length` bytes expected to be
/// lenient about trailing slack) using the given byte order.
///
/// Lenient mode: if `frame` carries more bytes than `HEADER_SIZE + length`, the extra bytes are
/// ignored rather than rejected (the reassembler already sliced out exactly one frame's worth
/// using this same length field, so in practice the sizes match; this mode exists for callers
/// that hand in loosely-bounded slices).
pub fn decode(frame: &[u8], order: ByteOrder) -> io::Result<EncapPacket> {
    if frame.len() < HEADER_SIZE {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }

    let mut cursor = Cursor::new(frame);

    let header = match order {
        ByteOrder::Big => read_header::<BigEndian, _>(&mut cursor)?,
        ByteOrder::Little => read_header::<LittleEndian, _>(&mut cursor)?,
    };

    let remaining = &frame[HEADER_SIZE..];
    let take = (header.length as usize).min(remaining.len());
    let payload = remaining[..take].to_vec();

    Ok(EncapPacket { header, payload })
}

fn read_header<B: byteorder::ByteOrder, R: Read>(stream: &mut R) -> io::Result<EncapHeader> {
    let command = stream.read_u16::<B>()?;
    let length = stream.read_u16::<B>()?;
    let session_handle = stream.read_u32::<B>()?;
    let status = stream.read_u32::<B>()?;

    let mut sender_context = [0u8; 8];
    stream.read_exact(&mut sender_context)?;

    let options = stream.read_u32::<B>()?;

    Ok(EncapHeader {
        command,
        length,
        session_handle,
        status,
        sender_context,
        options,
    })
}

/// Encodes a packet as a full frame in the given byte order. `header.length` is recomputed from
/// the actual payload length rather than trusted, since the header may have been hand-built by a
/// dispatcher that forgot to update it.
pub fn encode(packet: &EncapPacket, order: ByteOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + packet.payload.len());

    match order {
        ByteOrder::Big => write_header::<BigEndian>(&mut out, &packet.header, packet.payload.len()),
        ByteOrder::Little => write_header::<LittleEndian>(&mut out, &packet.header, packet.payload.len()),
    }

    out.extend_from_slice(&packet.payload);
    out
}

fn write_header<B: byteorder::ByteOrder>(out: &mut Vec<u8>, header: &EncapHeader, payload_len: usize) {
    out.write_u16::<B>(header.command).unwrap();
    out.write_u16::<B>(payload_len as u16).unwrap();
    out.write_u32::<B>(header.session_handle).unwrap();
    out.write_u32::<B>(header.status).unwrap();
    out.write_all(&header.sender_context).unwrap();
    out.write_u32::<B>(header.options).unwrap();
}

/// Reads the first two bytes of a candidate frame as a command code in both byte orders, used
/// by the reassembler's endianness probe. Returns `None` if fewer than 2 bytes are available.
pub fn peek_commands(bytes: &[u8]) -> Option<(u16, u16)> {
    if bytes.len() < 2 {
        return None;
    }

    Some((BigEndian::read_u16(&bytes[0..2]), LittleEndian::read_u16(&bytes[0..2])))
}

/// Reads the length field (header offset 2) in the given byte order, used once the order has
/// been decided by the probe.
pub fn peek_length(bytes: &[u8], order: ByteOrder) -> Option<u16> {
    if bytes.len() < 4 {
        return None;
    }

    Some(match order {
        ByteOrder::Big => BigEndian::read_u16(&bytes[2..4]),
        ByteOrder::Little => LittleEndian::read_u16(&bytes[2..4]),
    })
}
