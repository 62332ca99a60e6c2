//! Common Packet Format: the item-list framing carried inside `SendRRData` payloads. Item
//! headers follow the connection's detected byte order; the CIP payload inside an Unconnected
//! Data item is always little-endian regardless.

use crate::encap::ByteOrder;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

pub const TYPE_NULL_ADDRESS: u16 = 0x0000;
pub const TYPE_UNCONNECTED_DATA: u16 = 0x00B2;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CpfItem {
    pub item_type: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CpfMessage {
    pub interface_handle: u32,
    pub timeout: u16,
    pub items: Vec<CpfItem>,
}

impl CpfMessage {
    /// Returns the data carried by the first `0x00B2` Unconnected Data item, regardless of where
    /// it sits in the item list.
    pub fn cip_data(&self) -> Option<&[u8]> {
        self.items
            .iter()
            .find(|item| item.item_type == TYPE_UNCONNECTED_DATA)
            .map(|item| item.data.as_slice())
    }

    /// Builds the canonical two-item response envelope: a Null Address item followed by an
    /// Unconnected Data item carrying `cip_response`.
    pub fn response(interface_handle: u32, timeout: u16, cip_response: Vec<u8>) -> CpfMessage {
        CpfMessage {
            interface_handle,
            timeout,
            items: vec![
                CpfItem {
                    item_type: TYPE_NULL_ADDRESS,
                    data: Vec::new(),
                },
                CpfItem {
                    item_type: TYPE_UNCONNECTED_DATA,
                    data: cip_response,
                },
            ],
        }
    }
}

/// Decodes a `SendRRData` payload. Items are tolerated in any order; unknown item types are
/// skipped but their bytes still consumed so the item list stays in sync.
pub fn decode(bytes: &[u8], order: ByteOrder) -> io::Result<CpfMessage> {
    match order {
        ByteOrder::Big => decode_ordered::<BigEndian>(bytes),
        ByteOrder::Little => decode_ordered::<LittleEndian>(bytes),
    }
}

fn decode_ordered<B: byteorder::ByteOrder>(bytes: &[u8]) -> io::Result<CpfMessage> {
    let mut cursor = Cursor::new(bytes);

    let interface_handle = cursor.read_u32::<B>()?;
    let timeout = cursor.read_u16::<B>()?;
    let item_count = cursor.read_u16::<B>()?;

    let mut items = Vec::with_capacity(item_count as usize);

    for _ in 0..item_count {
        let item_type = cursor.read_u16::<B>()?;
        let item_length = cursor.read_u16::<B>()? as usize;

        let mut data = vec![0u8; item_length];
        cursor.read_exact(&mut data)?;

        items.push(CpfItem { item_type, data });
    }

    Ok(CpfMessage {
        interface_handle,
        timeout,
        items,
    })
}

/// Encodes a CPF message using the connection's byte order for all headers.
pub fn encode(message: &CpfMessage, order: ByteOrder) -> Vec<u8> {
    match order {
        ByteOrder::Big => encode_ordered::<BigEndian>(message),
        ByteOrder::Little => encode_ordered::<LittleEndian>(message),
    }
}

fn encode_ordered<B: byteorder::ByteOrder>(message: &CpfMessage) -> Vec<u8> {
    let mut out = Vec::new();

    out.write_u32::<B>(message.interface_handle).unwrap();
    out.write_u16::<B>(message.timeout).unwrap();
    out.write_u16::<B>(message.items.len() as u16).unwrap();

    for item in &message.items {
        out.write_u16::<B>(item.item_type).unwrap();
        out.write_u16::<B>(item.data.len() as u16).unwrap();
        out.write_all(&item.data).unwrap();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_big_endian() {
        let message = CpfMessage::response(0, 10, vec![1, 2, 3]);
        let encoded = encode(&message, ByteOrder::Big);
        let decoded = decode(&encoded, ByteOrder::Big).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_cip_data_finds_unconnected_item_regardless_of_order() {
        let message = CpfMessage {
            interface_handle: 0,
            timeout: 0,
            items: vec![
                CpfItem {
                    item_type: TYPE_UNCONNECTED_DATA,
                    data: vec![9, 9],
                },
                CpfItem {
                    item_type: TYPE_NULL_ADDRESS,
                    data: Vec::new(),
                },
            ],
        };

        assert_eq!(message.cip_data(), Some(&[9u8, 9][..]));
    }

    #[test]
    fn test_unknown_item_type_is_skipped_but_consumed() {
        let mut bytes = Vec::new();
        bytes.write_u32::<BigEndian>(0).unwrap();
        bytes.write_u16::<BigEndian>(0).unwrap();
        bytes.write_u16::<BigEndian>(2).unwrap(); // item count

        bytes.write_u16::<BigEndian>(0xFFFF).unwrap(); // unknown type
        bytes.write_u16::<BigEndian>(2).unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB]);

        bytes.write_u16::<BigEndian>(TYPE_UNCONNECTED_DATA).unwrap();
        bytes.write_u16::<BigEndian>(1).unwrap();
        bytes.extend_from_slice(&[0x42]);

        let decoded = decode(&bytes, ByteOrder::Big).unwrap();
        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.cip_data(), Some(&[0x42u8][..]));
    }

    #[test]
    fn test_decode_truncated_payload_errors() {
        let bytes = vec![0u8; 3];
        assert!(decode(&bytes, ByteOrder::Big).is_err());
    }
}
