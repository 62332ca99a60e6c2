//! The tiny CIP object model this simulator exposes: Identity (class 0x01), Message Router
//! (0x02) and Connection Manager (0x06), each with instance 0 or 1 and a handful of attributes.

use crate::cip::{CipRequest, CipResponse};
use crate::error::CipStatus;
use crate::identity::DeviceIdentity;
use crate::path::{self, Segment};
use byteorder::{LittleEndian, WriteBytesExt};

const CLASS_IDENTITY: u32 = 0x01;
const CLASS_MESSAGE_ROUTER: u32 = 0x02;
const CLASS_CONNECTION_MANAGER: u32 = 0x06;

/// Handles `Get_Attribute_All` (service 0x01). Only the Identity object supports it here.
pub fn get_attribute_all(request: &CipRequest, identity: &DeviceIdentity) -> CipResponse {
    let segments = request.segments();

    match path::class_id(&segments) {
        Some(CLASS_IDENTITY) => CipResponse::success(request.service, identity_block(identity)),
        _ => CipResponse::error(request.service, CipStatus::ServiceNotSupported),
    }
}

fn identity_block(identity: &DeviceIdentity) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(identity.vendor_id).unwrap();
    out.write_u16::<LittleEndian>(identity.device_type).unwrap();
    out.write_u16::<LittleEndian>(identity.product_code_low16()).unwrap();
    out.push(identity.revision_major);
    out.push(identity.revision_minor);
    out.write_u16::<LittleEndian>(0).unwrap(); // status, always 0 in Get_Attribute_All here
    out.write_u32::<LittleEndian>(identity.serial).unwrap();
    out.push(identity.product_name.len() as u8);
    out.extend_from_slice(identity.product_name.as_bytes());
    out
}

/// Handles `Get_Attribute_Single` (service 0x0E) against the known classes. Returns `None` when
/// the class is unrecognized, leaving the caller free to fall back to a symbolic tag read.
pub fn get_attribute_single(
    request: &CipRequest,
    identity: &DeviceIdentity,
    live_session_count: usize,
) -> Option<CipResponse> {
    let segments = request.segments();

    if segments.is_empty() {
        return Some(CipResponse::error(request.service, CipStatus::PathSegmentError));
    }

    let class = match path::class_id(&segments) {
        Some(value) => value,
        // No Class segment at all. A Symbolic segment means this is really a tag read wearing a
        // Get_Attribute_Single service code, so let the caller fall back to it; otherwise this
        // path (e.g. a bare Instance/Attribute pair) is simply malformed.
        None if path::tag_name(&segments).is_some() => return None,
        None => return Some(CipResponse::error(request.service, CipStatus::PathSegmentError)),
    };
    let instance = path::instance_id(&segments);
    let attribute = path::attribute_id(&segments);

    match class {
        CLASS_IDENTITY => Some(dispatch_known_class(request, instance, attribute, |attr| {
            identity_attribute(identity, attr)
        })),
        CLASS_MESSAGE_ROUTER => Some(dispatch_known_class(request, instance, attribute, message_router_attribute)),
        CLASS_CONNECTION_MANAGER => Some(dispatch_known_class(request, instance, attribute, |attr| {
            connection_manager_attribute(attr, live_session_count)
        })),
        _ => None,
    }
}

fn dispatch_known_class(
    request: &CipRequest,
    instance: Option<u32>,
    attribute: Option<u32>,
    fetch: impl Fn(u32) -> Option<Vec<u8>>,
) -> CipResponse {
    let instance = match instance {
        Some(value) => value,
        None => return CipResponse::error(request.service, CipStatus::PathSegmentError),
    };

    if instance != 0 && instance != 1 {
        return CipResponse::error(request.service, CipStatus::ObjectDoesNotExist);
    }

    let attribute = match attribute {
        Some(value) => value,
        None => return CipResponse::error(request.service, CipStatus::PathSegmentError),
    };

    match fetch(attribute) {
        Some(data) => CipResponse::success(request.service, data),
        None => CipResponse::error(request.service, CipStatus::AttributeNotSupported),
    }
}

fn identity_attribute(identity: &DeviceIdentity, attribute: u32) -> Option<Vec<u8>> {
    let mut out = Vec::new();

    match attribute {
        1 => out.write_u16::<LittleEndian>(identity.vendor_id).unwrap(),
        2 => out.write_u16::<LittleEndian>(identity.device_type).unwrap(),
        3 => out.write_u16::<LittleEndian>(identity.product_code_low16()).unwrap(),
        4 => {
            out.push(identity.revision_major);
            out.push(identity.revision_minor);
        }
        5 => out.write_u16::<LittleEndian>(0x0001).unwrap(),
        6 => out.write_u32::<LittleEndian>(0x0000_0000).unwrap(),
        7 => {
            out.push(identity.product_name.len() as u8);
            out.extend_from_slice(identity.product_name.as_bytes());
        }
        _ => return None,
    }

    Some(out)
}

fn message_router_attribute(attribute: u32) -> Option<Vec<u8>> {
    let mut out = Vec::new();

    match attribute {
        1 => out.write_u16::<LittleEndian>(3).unwrap(),
        2 | 3 => out.write_u16::<LittleEndian>(0).unwrap(),
        _ => return None,
    }

    Some(out)
}

fn connection_manager_attribute(attribute: u32, live_session_count: usize) -> Option<Vec<u8>> {
    let mut out = Vec::new();

    match attribute {
        1 => out.write_u16::<LittleEndian>(128).unwrap(),
        2 => out.write_u16::<LittleEndian>(live_session_count as u16).unwrap(),
        _ => return None,
    }

    Some(out)
}

/// Returns the path's class id, used by the CIP dispatcher to decide whether an unrecognized
/// class should instead be attempted as a symbolic tag read.
pub fn path_has_known_class(segments: &[Segment]) -> bool {
    matches!(
        path::class_id(segments),
        Some(CLASS_IDENTITY) | Some(CLASS_MESSAGE_ROUTER) | Some(CLASS_CONNECTION_MANAGER)
    )
}
