//! Telephony-provider plumbing: decoding the provider's loosely-typed
//! webhook payloads, verifying their signatures, normalizing phone numbers,
//! and placing the outbound monitor call.
//!
//! Nothing in here touches the store or the worker — the gateway wires these
//! pieces into the ingest path.

pub mod dialer;
pub mod parser;
pub mod phone;
pub mod signature;

pub use dialer::{Dialer, HttpDialer, PlacedCall};
pub use parser::{parse_event, ParsedEvent};
pub use phone::normalize_phone;
