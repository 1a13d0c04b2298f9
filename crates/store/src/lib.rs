//! Live state for active monitor calls: session rows, append-only transcript
//! chunks, and per-call row-change notifications, plus the slug-keyed case
//! records behind the provisioning routes.
//!
//! Everything here is in-memory and lock-guarded; consumers only touch the
//! [`LiveStore`] / [`CaseStore`] APIs, so swapping the engine stays local to
//! this crate.

pub mod cases;
pub mod events;
pub mod session;
pub mod store;

pub use cases::CaseStore;
pub use events::StoreEvent;
pub use session::{CallSession, CallSummary, Snapshot, StoredChunk};
pub use store::LiveStore;
