//! Pure scoring layer: the regex-bank heuristic scorer and the advice
//! stabilizer. No I/O — both halves are plain functions over
//! [`cc_domain::advice::CoachingAdvice`] values, which keeps them directly
//! testable and keeps every store write on the worker's serialized path.

pub mod heuristic;
pub mod stabilize;

pub use heuristic::RiskBanks;
pub use stabilize::{stabilize, StepCaps};
