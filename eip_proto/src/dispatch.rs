//! Routes a CIP request by service code, recursing into the embedded sub-requests carried by
//! Unconnected Send (0x52) and Multiple Service Packet (0x0A); and, at the layer above, routes an
//! encapsulation command to its handler.

use crate::cip::{self, CipRequest, CipResponse};
use crate::cpf::{self, CpfMessage};
use crate::encap::{self, ByteOrder, EncapPacket};
use crate::error::{CipStatus, EncapStatus};
use crate::identity::DeviceIdentity;
use crate::object_model;
use crate::path;
use crate::session::SessionRegistry;
use crate::tag::{TagStore, DINT_TYPE_CODE};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};
use std::net::Ipv4Addr;

/// Recursion is capped to guard against pathological nesting of Unconnected Send / Multiple
/// Service Packet requests crafted by a malicious or buggy client.
pub const MAX_RECURSION_DEPTH: usize = 4;

pub struct DispatchContext<'a> {
    pub identity: &'a DeviceIdentity,
    pub tags: &'a mut TagStore,
    pub live_session_count: usize,
    pub now: u64,
}

/// Dispatches one CIP request and returns its encoded response. This is the sole recursive
/// entry point: Unconnected Send and Multiple Service Packet both call back into it.
pub fn dispatch(request_bytes: &[u8], ctx: &mut DispatchContext, depth: usize) -> Vec<u8> {
    let request = match cip::decode_request(request_bytes) {
        Some(request) => request,
        None => {
            // Not enough bytes to even read a service/path header. The service code is
            // unrecoverable, so report it as 0 - callers reading an all-zero response still get
            // a well-formed frame with an error status.
            return cip::encode_response(&CipResponse::error(0, CipStatus::NotEnoughData));
        }
    };

    let response = dispatch_request(&request, ctx, depth);
    cip::encode_response(&response)
}

fn dispatch_request(request: &CipRequest, ctx: &mut DispatchContext, depth: usize) -> CipResponse {
    match request.service {
        cip::SVC_GET_ATTRIBUTE_ALL => object_model::get_attribute_all(request, ctx.identity),
        cip::SVC_GET_ATTRIBUTE_SINGLE => {
            object_model::get_attribute_single(request, ctx.identity, ctx.live_session_count)
                .unwrap_or_else(|| read_tag(request, ctx, CipStatus::ObjectDoesNotExist))
        }
        cip::SVC_READ_TAG => read_tag(request, ctx, CipStatus::PathDestinationUnknown),
        cip::SVC_MULTIPLE_SERVICE_PACKET => multiple_service_packet(request, ctx, depth),
        cip::SVC_UNCONNECTED_SEND => return_unconnected_send(request, ctx, depth),
        _ => CipResponse::error(request.service, CipStatus::ServiceNotSupported),
    }
}

/// Resolves a symbolic or positional path to a tag and formats a DINT reply, per Read_Tag
/// (service 0x4C) and the symbolic-path fallback of Get_Attribute_Single. `miss_status` lets the
/// two call sites disagree on what a lookup failure means: a bare Read_Tag miss is
/// `PATH_DESTINATION_UNKNOWN`, while an unrecognized Get_Attribute_Single class that also fails
/// as a tag name is `OBJECT_DOES_NOT_EXIST`.
fn read_tag(request: &CipRequest, ctx: &mut DispatchContext, miss_status: CipStatus) -> CipResponse {
    let segments = request.segments();

    let candidate = match path::tag_name(&segments) {
        Some(name) => name.to_string(),
        None => return CipResponse::error(request.service, miss_status),
    };

    match ctx.tags.read(&candidate, ctx.now) {
        Some(tag) => {
            let mut data = Vec::with_capacity(6);
            data.write_u16::<LittleEndian>(DINT_TYPE_CODE).unwrap();
            data.write_i32::<LittleEndian>(tag.value).unwrap();
            CipResponse::success(request.service, data)
        }
        None => CipResponse::error(request.service, miss_status),
    }
}

/// Unconnected Send (0x52): decodes the embedded CIP request and recurses, returning the inner
/// response verbatim with no re-wrapping, per the source's behavior.
fn return_unconnected_send(request: &CipRequest, ctx: &mut DispatchContext, depth: usize) -> CipResponse {
    if depth >= MAX_RECURSION_DEPTH {
        return CipResponse::error(request.service, CipStatus::GeneralError);
    }

    let mut cursor = Cursor::new(&request.data[..]);

    let embedded = (|| -> std::io::Result<Vec<u8>> {
        let _priority_ticks = cursor.read_u8()?;
        let _timeout_ticks = cursor.read_u8()?;
        let embedded_size = cursor.read_u16::<LittleEndian>()? as usize;

        let mut embedded = vec![0u8; embedded_size];
        cursor.read_exact(&mut embedded)?;

        if embedded_size % 2 == 1 {
            let mut pad = [0u8; 1];
            cursor.read_exact(&mut pad)?;
        }

        Ok(embedded)
    })();

    let embedded = match embedded {
        Ok(bytes) => bytes,
        Err(_) => return CipResponse::error(request.service, CipStatus::NotEnoughData),
    };

    let inner_response_bytes = dispatch(&embedded, ctx, depth + 1);

    // The inner response is returned byte-for-byte; decode just enough to repackage it as a
    // `CipResponse` so the outer caller's `encode_response` call produces identical bytes.
    CipResponse {
        service: inner_response_bytes[0] & 0x7F,
        status: *inner_response_bytes.get(2).unwrap_or(&CipStatus::GeneralError.code()),
        data: inner_response_bytes.get(4..).unwrap_or_default().to_vec(),
    }
}

/// Multiple Service Packet (0x0A): dispatches each embedded request independently and rebuilds
/// an offset table over the concatenated response bodies. A malformed embedded request still
/// produces a response body (carrying an error status) so the offset table stays consistent.
fn multiple_service_packet(request: &CipRequest, ctx: &mut DispatchContext, depth: usize) -> CipResponse {
    if depth >= MAX_RECURSION_DEPTH {
        return CipResponse::error(request.service, CipStatus::GeneralError);
    }

    let mut cursor = Cursor::new(&request.data[..]);

    let count = match cursor.read_u16::<LittleEndian>() {
        Ok(count) => count as usize,
        Err(_) => return CipResponse::error(request.service, CipStatus::NotEnoughData),
    };

    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        match cursor.read_u16::<LittleEndian>() {
            Ok(offset) => offsets.push(offset as usize),
            Err(_) => return CipResponse::error(request.service, CipStatus::NotEnoughData),
        }
    }

    let block = &request.data[..];
    let mut bodies = Vec::with_capacity(count);

    for (index, &offset) in offsets.iter().enumerate() {
        let end = offsets.get(index + 1).copied().unwrap_or(block.len());

        let body = if offset <= block.len() && end <= block.len() && offset <= end {
            dispatch(&block[offset..end], ctx, depth + 1)
        } else {
            cip::encode_response(&CipResponse::error(0, CipStatus::NotEnoughData))
        };

        bodies.push(body);
    }

    let mut data = Vec::new();
    data.write_u16::<LittleEndian>(count as u16).unwrap();

    let header_len = 2 + count * 2;
    let mut running_offset = header_len;
    for body in &bodies {
        data.write_u16::<LittleEndian>(running_offset as u16).unwrap();
        running_offset += body.len();
    }

    for body in &bodies {
        data.extend_from_slice(body);
    }

    CipResponse::success(request.service, data)
}

const SERVICE_DESCRIPTOR_NAME: &[u8; 16] = b"Communications\0\0";

/// Routes one decoded encapsulation frame to its command handler and returns the response frame,
/// ready to be encoded in the same byte order. This is the top-level pure function the event loop
/// calls once per frame extracted by the reassembler.
pub fn dispatch_encap(
    packet: &EncapPacket,
    byte_order: ByteOrder,
    sessions: &mut SessionRegistry,
    tags: &mut TagStore,
    identity: &DeviceIdentity,
    local_ip: Ipv4Addr,
    now: u64,
) -> EncapPacket {
    match packet.header.command {
        encap::CMD_REGISTER_SESSION => register_session(packet, byte_order, sessions, now),
        encap::CMD_UNREGISTER_SESSION => unregister_session(packet, sessions),
        encap::CMD_LIST_SERVICES => list_services(packet, byte_order),
        encap::CMD_LIST_IDENTITY => list_identity(packet, identity, local_ip),
        encap::CMD_SEND_RR_DATA => send_rr_data(packet, byte_order, sessions, tags, identity, now),
        _ => EncapPacket::response_to(packet, packet.header.session_handle, EncapStatus::InvalidCommand.code(), Vec::new()),
    }
}

fn require_session(packet: &EncapPacket, sessions: &SessionRegistry) -> Option<EncapPacket> {
    if sessions.has(packet.header.session_handle) {
        None
    } else {
        Some(EncapPacket::response_to(
            packet,
            packet.header.session_handle,
            EncapStatus::InvalidSessionHandle.code(),
            Vec::new(),
        ))
    }
}

fn register_session(packet: &EncapPacket, byte_order: ByteOrder, sessions: &mut SessionRegistry, now: u64) -> EncapPacket {
    if packet.payload.len() < 4 {
        return EncapPacket::response_to(packet, 0, EncapStatus::InvalidLength.code(), Vec::new());
    }

    let protocol_version = match byte_order {
        ByteOrder::Big => BigEndian::read_u16(&packet.payload[0..2]),
        ByteOrder::Little => LittleEndian::read_u16(&packet.payload[0..2]),
    };

    if protocol_version != 1 {
        return EncapPacket::response_to(packet, 0, EncapStatus::UnsupportedProtocol.code(), Vec::new());
    }

    let handle = sessions.create(now);
    let data = match byte_order {
        ByteOrder::Big => register_session_payload::<BigEndian>(),
        ByteOrder::Little => register_session_payload::<LittleEndian>(),
    };

    EncapPacket::response_to(packet, handle, EncapStatus::Success.code(), data)
}

fn register_session_payload<B: byteorder::ByteOrder>() -> Vec<u8> {
    let mut data = Vec::with_capacity(4);
    data.write_u16::<B>(1).unwrap();
    data.write_u16::<B>(0).unwrap();
    data
}

fn unregister_session(packet: &EncapPacket, sessions: &mut SessionRegistry) -> EncapPacket {
    if let Some(error_response) = require_session(packet, sessions) {
        return error_response;
    }

    sessions.remove(packet.header.session_handle);
    EncapPacket::response_to(packet, packet.header.session_handle, EncapStatus::Success.code(), Vec::new())
}

fn list_services(packet: &EncapPacket, byte_order: ByteOrder) -> EncapPacket {
    let data = match byte_order {
        ByteOrder::Big => list_services_payload::<BigEndian>(),
        ByteOrder::Little => list_services_payload::<LittleEndian>(),
    };

    EncapPacket::response_to(packet, packet.header.session_handle, EncapStatus::Success.code(), data)
}

fn list_services_payload<B: byteorder::ByteOrder>() -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u16::<B>(1).unwrap(); // item_count
    data.write_u16::<B>(0x0100).unwrap(); // type_code
    data.write_u16::<B>(20).unwrap(); // length of the fields that follow
    data.write_u16::<B>(1).unwrap(); // version
    data.write_u16::<B>(0x0020).unwrap(); // capability_flags
    data.extend_from_slice(SERVICE_DESCRIPTOR_NAME);
    data
}

fn list_identity(packet: &EncapPacket, identity: &DeviceIdentity, local_ip: Ipv4Addr) -> EncapPacket {
    let data = list_identity_payload(identity, local_ip);
    EncapPacket::response_to(packet, packet.header.session_handle, EncapStatus::Success.code(), data)
}

/// Builds the LIST_IDENTITY payload, always in big-endian framing regardless of the connection's
/// detected byte order, per the legacy layout the source emits.
fn list_identity_payload(identity: &DeviceIdentity, local_ip: Ipv4Addr) -> Vec<u8> {
    let mut out = Vec::new();

    out.write_u16::<BigEndian>(0).unwrap(); // legacy header bytes, left zeroed
    out.write_u16::<BigEndian>(0).unwrap(); // port
    out.write_u32::<BigEndian>(u32::from(local_ip)).unwrap();
    out.extend_from_slice(&[0u8; 8]);
    out.write_u16::<BigEndian>(identity.vendor_id).unwrap();
    out.write_u16::<BigEndian>(identity.device_type).unwrap();
    out.write_u32::<BigEndian>(identity.product_code).unwrap();
    out.push(identity.revision_major);
    out.push(identity.revision_minor);
    out.write_u16::<BigEndian>(0x0001).unwrap();
    out.write_u32::<BigEndian>(0).unwrap();
    out.write_u16::<BigEndian>(identity.product_name.len() as u16).unwrap();
    out.extend_from_slice(identity.product_name.as_bytes());
    out.push(0); // trailing NUL

    out
}

fn send_rr_data(
    packet: &EncapPacket,
    byte_order: ByteOrder,
    sessions: &mut SessionRegistry,
    tags: &mut TagStore,
    identity: &DeviceIdentity,
    now: u64,
) -> EncapPacket {
    if let Some(error_response) = require_session(packet, sessions) {
        return error_response;
    }

    sessions.touch(packet.header.session_handle, now);

    let request_cpf = match cpf::decode(&packet.payload, byte_order) {
        Ok(message) => message,
        Err(_) => {
            return EncapPacket::response_to(
                packet,
                packet.header.session_handle,
                EncapStatus::InvalidLength.code(),
                Vec::new(),
            )
        }
    };

    let cip_request_bytes = match request_cpf.cip_data() {
        Some(bytes) => bytes,
        None => {
            return EncapPacket::response_to(
                packet,
                packet.header.session_handle,
                EncapStatus::InvalidLength.code(),
                Vec::new(),
            )
        }
    };

    let mut ctx = DispatchContext {
        identity,
        tags,
        live_session_count: sessions.len(),
        now,
    };

    let cip_response_bytes = dispatch(cip_request_bytes, &mut ctx, 0);

    let response_cpf = CpfMessage::response(request_cpf.interface_handle, request_cpf.timeout, cip_response_bytes);
    let data = cpf::encode(&response_cpf, byte_order);

    EncapPacket::response_to(packet, packet.header.session_handle, EncapStatus::Success.code(), data)
}
