//! Shared application state passed to all API handlers.

use std::sync::Arc;
use std::time::Duration;

use cc_domain::config::Config;
use cc_domain::error::Result;
use cc_model::AdviceModel;
use cc_scoring::{RiskBanks, StepCaps};
use cc_store::{CaseStore, LiveStore};
use cc_telephony::Dialer;

use crate::limiter::{CooldownMap, RateLimiter};
use crate::runtime::{WorkerDeps, WorkerMap};

/// Shared application state.
///
/// Fields are grouped by concern:
/// - **Core services** — config, live store, case records
/// - **Runtime** — per-call worker map (owns the scorer + model handles)
/// - **Telephony** — outbound dialer
/// - **Pacing** — request limiter, per-case cooldowns
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<LiveStore>,
    pub cases: Arc<CaseStore>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub workers: Arc<WorkerMap>,

    // ── Telephony ─────────────────────────────────────────────────────
    pub dialer: Arc<dyn Dialer>,

    // ── Pacing ────────────────────────────────────────────────────────
    pub limiter: Arc<RateLimiter>,
    pub cooldowns: Arc<CooldownMap>,
}

impl AppState {
    /// Wire the state up from a config and the two external adapters.
    /// Tests inject scripted [`AdviceModel`] / [`Dialer`] implementations.
    pub fn build(
        config: Arc<Config>,
        model: Arc<dyn AdviceModel>,
        dialer: Arc<dyn Dialer>,
    ) -> Result<Self> {
        let store = Arc::new(LiveStore::new());
        let banks = Arc::new(RiskBanks::compile()?);
        let workers = Arc::new(WorkerMap::new(WorkerDeps {
            store: store.clone(),
            model,
            banks,
            caps: StepCaps::DEFAULT,
            min_interval: Duration::from_millis(config.model.min_interval_ms()),
        }));

        Ok(Self {
            config,
            store,
            cases: Arc::new(CaseStore::new()),
            workers,
            dialer,
            limiter: Arc::new(RateLimiter::new()),
            cooldowns: Arc::new(CooldownMap::new()),
        })
    }
}
