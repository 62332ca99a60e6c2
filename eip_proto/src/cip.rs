//! CIP message request/response framing: service codes, the path that follows them, and the
//! response-bit convention (`service | 0x80`).

use crate::error::CipStatus;
use crate::path::{self, Segment};

pub const SVC_GET_ATTRIBUTE_ALL: u8 = 0x01;
pub const SVC_GET_ATTRIBUTE_SINGLE: u8 = 0x0E;
pub const SVC_MULTIPLE_SERVICE_PACKET: u8 = 0x0A;
pub const SVC_READ_TAG: u8 = 0x4C;
pub const SVC_UNCONNECTED_SEND: u8 = 0x52;

const RESPONSE_BIT: u8 = 0x80;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CipRequest {
    pub service: u8,
    pub path: Vec<u8>,
    pub data: Vec<u8>,
}

impl CipRequest {
    pub fn segments(&self) -> Vec<Segment> {
        path::parse(&self.path)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CipResponse {
    pub service: u8,
    pub status: u8,
    pub data: Vec<u8>,
}

impl CipResponse {
    pub fn success(service: u8, data: Vec<u8>) -> CipResponse {
        CipResponse {
            service,
            status: CipStatus::Success.code(),
            data,
        }
    }

    pub fn error(service: u8, status: CipStatus) -> CipResponse {
        CipResponse {
            service,
            status: status.code(),
            data: Vec::new(),
        }
    }
}

/// Decodes a CIP request: `{service, path_words, path[2*path_words], data}`.
pub fn decode_request(bytes: &[u8]) -> Option<CipRequest> {
    if bytes.is_empty() {
        return None;
    }

    let service = bytes[0] & 0x7F;

    if bytes.len() < 2 {
        return None;
    }

    let path_words = bytes[1] as usize;
    let path_len = path_words * 2;
    let path_start = 2;
    let path_end = path_start + path_len;

    if path_end > bytes.len() {
        return None;
    }

    Some(CipRequest {
        service,
        path: bytes[path_start..path_end].to_vec(),
        data: bytes[path_end..].to_vec(),
    })
}

/// Encodes a CIP response: `{service|0x80, reserved=0, status, extended_status_words=0, data}`.
pub fn encode_response(response: &CipResponse) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + response.data.len());
    out.push(response.service | RESPONSE_BIT);
    out.push(0x00);
    out.push(response.status);
    out.push(0x00);
    out.extend_from_slice(&response.data);
    out
}
