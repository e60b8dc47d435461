//! Shelf remote protocol
//!
//! A request/response protocol against a single remote endpoint that keeps
//! the authoritative copy of the replica.
//!
//! ## Requests
//! ```text
//! POST  action=save&data=<snapshot json>[&key=<secret>]   -> opaque ack body
//! GET   ?action=load[&key=<secret>]                       -> snapshot json
//! ```
//!
//! ## Snapshot payload
//! ```text
//! { "version": 8, "lastWriteTs": 1700000000000,
//!   "items": [ { "sku": "A1", ..., "updatedAt": 200 } ],
//!   "transactions": [ { "id": "TX-…", "ts": …, "type": "IN" | "OUT" | "ROTTURA", ... } ],
//!   "logoDataUrl": "", "companyName": "" }
//! ```
//! A payload without an `items` array is rejected.

pub mod error;
pub mod payload;
pub mod request;
pub mod response;

pub use error::{ProtocolError, ProtocolResult};
pub use payload::{decode_snapshot, encode_snapshot, validate, MAX_PAYLOAD_SIZE};
pub use request::{Action, Request};
pub use response::Ack;
