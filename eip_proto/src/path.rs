//! CIP path segment parsing: logical segments (class/instance/member/connection-point/attribute)
//! and ANSI extended symbolic segments (tag names).

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

const LOGICAL_MASK: u8 = 0xE0;
const LOGICAL_TAG: u8 = 0x20;
const LOGICAL_TYPE_MASK: u8 = 0x1C;
const LOGICAL_SIZE_BIT: u8 = 0x01;
const SYMBOLIC_TAG: u8 = 0x91;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LogicalType {
    Class,
    Instance,
    Member,
    ConnectionPoint,
    Attribute,
}

impl LogicalType {
    fn from_bits(bits: u8) -> Option<LogicalType> {
        match bits >> 2 {
            0 => Some(LogicalType::Class),
            1 => Some(LogicalType::Instance),
            2 => Some(LogicalType::Member),
            3 => Some(LogicalType::ConnectionPoint),
            4 => Some(LogicalType::Attribute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Segment {
    Logical { kind: LogicalType, value: u32 },
    Symbolic(String),
}

/// Parses a CIP path into its ordered list of segments. Unrecognized leading bytes are skipped
/// one at a time (best-effort resync) rather than failing the whole path, and a segment that
/// would read past the end of `bytes` silently terminates parsing instead of erroring — matching
/// the source's tolerant behavior towards malformed paths.
pub fn parse(bytes: &[u8]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let lead = bytes[offset];

        if lead & LOGICAL_MASK == LOGICAL_TAG {
            let kind = match LogicalType::from_bits(lead & LOGICAL_TYPE_MASK) {
                Some(kind) => kind,
                None => {
                    offset += 1;
                    continue;
                }
            };

            let is_16_bit = lead & LOGICAL_SIZE_BIT != 0;

            if is_16_bit {
                // byte[offset+1] is padding; the 16-bit value follows, little-endian.
                if offset + 4 > bytes.len() {
                    break;
                }
                let mut cursor = Cursor::new(&bytes[offset + 2..offset + 4]);
                let value = cursor.read_u16::<LittleEndian>().unwrap() as u32;
                segments.push(Segment::Logical { kind, value });
                offset += 4;
            } else {
                if offset + 2 > bytes.len() {
                    break;
                }
                segments.push(Segment::Logical {
                    kind,
                    value: bytes[offset + 1] as u32,
                });
                offset += 2;
            }
        } else if lead == SYMBOLIC_TAG {
            if offset + 2 > bytes.len() {
                break;
            }
            let len = bytes[offset + 1] as usize;
            let start = offset + 2;
            let end = start + len;

            if end > bytes.len() {
                break;
            }

            match std::str::from_utf8(&bytes[start..end]) {
                Ok(name) => segments.push(Segment::Symbolic(name.to_string())),
                Err(_) => break,
            }

            offset = end + (len & 1);
        } else {
            offset += 1;
        }
    }

    segments
}

/// Convenience extraction of the first Class logical segment's value.
pub fn class_id(segments: &[Segment]) -> Option<u32> {
    logical_value(segments, LogicalType::Class)
}

/// Convenience extraction of the first Instance logical segment's value.
pub fn instance_id(segments: &[Segment]) -> Option<u32> {
    logical_value(segments, LogicalType::Instance)
}

/// Convenience extraction of the first Attribute logical segment's value.
pub fn attribute_id(segments: &[Segment]) -> Option<u32> {
    logical_value(segments, LogicalType::Attribute)
}

/// Convenience extraction of the first symbolic segment's name.
pub fn tag_name(segments: &[Segment]) -> Option<&str> {
    segments.iter().find_map(|segment| match segment {
        Segment::Symbolic(name) => Some(name.as_str()),
        _ => None,
    })
}

fn logical_value(segments: &[Segment], want: LogicalType) -> Option<u32> {
    segments.iter().find_map(|segment| match segment {
        Segment::Logical { kind, value } if *kind == want => Some(*value),
        _ => None,
    })
}

/// Builds an 8-bit logical segment encoding a class, instance and attribute path — the wire
/// form most EtherNet/IP tools emit for Get_Attribute_Single / Get_Attribute_All requests.
pub fn build_logical(class: u8, instance: u8, attribute: u8) -> Vec<u8> {
    vec![
        LOGICAL_TAG | (0 << 2),
        class,
        LOGICAL_TAG | (1 << 2),
        instance,
        LOGICAL_TAG | (4 << 2),
        attribute,
    ]
}

/// Builds an ANSI extended symbolic segment for the given tag name.
pub fn build_symbolic(name: &str) -> Vec<u8> {
    let mut out = vec![SYMBOLIC_TAG, name.len() as u8];
    out.extend_from_slice(name.as_bytes());
    if name.len() & 1 == 1 {
        out.push(0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_logical_8_bit_roundtrip() {
        for c in [0u8, 1, 0x01, 255] {
            for i in [0u8, 1, 254] {
                for a in [0u8, 7, 255] {
                    let bytes = build_logical(c, i, a);
                    let segments = parse(&bytes);

                    assert_eq!(class_id(&segments), Some(c as u32));
                    assert_eq!(instance_id(&segments), Some(i as u32));
                    assert_eq!(attribute_id(&segments), Some(a as u32));
                }
            }
        }
    }

    #[test]
    fn test_parse_symbolic_roundtrip_even_length() {
        let bytes = build_symbolic("Sensor1A");
        let segments = parse(&bytes);
        assert_eq!(tag_name(&segments), Some("Sensor1A"));
    }

    #[test]
    fn test_parse_symbolic_roundtrip_odd_length_padded() {
        let bytes = build_symbolic("Tag_7");
        assert_eq!(bytes.len(), 2 + 5 + 1);
        let segments = parse(&bytes);
        assert_eq!(tag_name(&segments), Some("Tag_7"));
    }

    #[test]
    fn test_parse_16_bit_logical_value() {
        // Class segment, 16-bit format: 0x25, pad, value LE.
        let bytes = vec![0x25, 0x00, 0x34, 0x12];
        let segments = parse(&bytes);
        assert_eq!(class_id(&segments), Some(0x1234));
    }

    #[test]
    fn test_truncated_segment_terminates_silently() {
        let bytes = vec![0x20]; // class segment missing its value byte
        let segments = parse(&bytes);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_unrecognized_byte_is_skipped() {
        let mut bytes = vec![0xFF];
        bytes.extend(build_logical(1, 0, 0));
        let segments = parse(&bytes);
        assert_eq!(class_id(&segments), Some(1));
    }

    #[test]
    fn test_empty_path_has_no_segments() {
        assert!(parse(&[]).is_empty());
    }
}
