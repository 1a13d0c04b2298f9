//! The advice runtime: per-call serialized workers and their model pacing.

pub mod backoff;
pub mod worker;

pub use worker::{WorkerDeps, WorkerMap, DELAYED_NOTE, RATE_LIMITED_NOTE};
