//! Protocol core for the EtherNet/IP server simulator: the encapsulation codec, the Common
//! Packet Format codec, the CIP path parser and message dispatcher, and the in-memory object
//! model (Identity / Message Router / Connection Manager / symbolic tags).
//!
//! Every public entry point here is a pure function of its inputs (bytes in, bytes and a status
//! out) plus whatever shared state (`SessionRegistry`, `TagStore`) it is explicitly handed. None
//! of it touches a socket; `eip_server` owns the `mio` event loop and calls into this crate once
//! per reassembled frame.

pub mod buffer;
pub mod cip;
pub mod cpf;
pub mod dispatch;
pub mod encap;
pub mod error;
pub mod identity;
pub mod object_model;
pub mod path;
pub mod reassembler;
pub mod session;
pub mod tag;

pub use encap::{ByteOrder, EncapHeader, EncapPacket};
pub use error::{CipStatus, EncapStatus};
pub use identity::DeviceIdentity;
pub use session::SessionRegistry;
pub use tag::TagStore;
