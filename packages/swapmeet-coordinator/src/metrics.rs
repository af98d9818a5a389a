//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Negotiation ---
    pub offers_created: AtomicU64,
    pub offers_countered: AtomicU64,
    pub offers_accepted: AtomicU64,
    pub negotiations_cancelled: AtomicU64,

    // --- Escrow ---
    pub trades_initiated: AtomicU64,
    pub deposits_submitted: AtomicU64,
    pub approvals_submitted: AtomicU64,
    pub ledger_rejections: AtomicU64,
    pub rpc_errors: AtomicU64,

    // --- Submission latency (μs, updated via CAS) ---
    pub submit_duration_us_sum: AtomicU64,
    pub submit_duration_us_max: AtomicU64,

    // --- Watcher ---
    pub events_applied: AtomicU64,
    pub events_dropped: AtomicU64,
    pub correlation_failures: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            offers_created: AtomicU64::new(0),
            offers_countered: AtomicU64::new(0),
            offers_accepted: AtomicU64::new(0),
            negotiations_cancelled: AtomicU64::new(0),
            trades_initiated: AtomicU64::new(0),
            deposits_submitted: AtomicU64::new(0),
            approvals_submitted: AtomicU64::new(0),
            ledger_rejections: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
            submit_duration_us_sum: AtomicU64::new(0),
            submit_duration_us_max: AtomicU64::new(0),
            events_applied: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            correlation_failures: AtomicU64::new(0),
        }
    }

    pub fn record_submit_duration(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.submit_duration_us_sum.fetch_add(us, Ordering::Relaxed);
        // CAS loop for max tracking
        let mut cur = self.submit_duration_us_max.load(Ordering::Relaxed);
        while us > cur {
            match self.submit_duration_us_max.compare_exchange_weak(
                cur,
                us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, open_offers: usize, active_trades: usize) -> String {
        let offers_created = self.offers_created.load(Ordering::Relaxed);
        let offers_countered = self.offers_countered.load(Ordering::Relaxed);
        let offers_accepted = self.offers_accepted.load(Ordering::Relaxed);
        let negotiations_cancelled = self.negotiations_cancelled.load(Ordering::Relaxed);
        let trades_initiated = self.trades_initiated.load(Ordering::Relaxed);
        let deposits_submitted = self.deposits_submitted.load(Ordering::Relaxed);
        let approvals_submitted = self.approvals_submitted.load(Ordering::Relaxed);
        let ledger_rejections = self.ledger_rejections.load(Ordering::Relaxed);
        let rpc_errors = self.rpc_errors.load(Ordering::Relaxed);
        let submit_sum = self.submit_duration_us_sum.load(Ordering::Relaxed);
        let submit_max = self.submit_duration_us_max.swap(0, Ordering::Relaxed);
        let events_applied = self.events_applied.load(Ordering::Relaxed);
        let events_dropped = self.events_dropped.load(Ordering::Relaxed);
        let correlation_failures = self.correlation_failures.load(Ordering::Relaxed);

        // Convert μs to seconds for Prometheus conventions
        let submit_sum_s = submit_sum as f64 / 1_000_000.0;
        let submit_max_s = submit_max as f64 / 1_000_000.0;

        format!(
            "\
# HELP swapmeet_offers_created_total Offers created.\n\
# TYPE swapmeet_offers_created_total counter\n\
swapmeet_offers_created_total {offers_created}\n\
# HELP swapmeet_offers_countered_total Counter-offers applied.\n\
# TYPE swapmeet_offers_countered_total counter\n\
swapmeet_offers_countered_total {offers_countered}\n\
# HELP swapmeet_offers_accepted_total Offers accepted.\n\
# TYPE swapmeet_offers_accepted_total counter\n\
swapmeet_offers_accepted_total {offers_accepted}\n\
# HELP swapmeet_negotiations_cancelled_total Negotiations withdrawn before acceptance.\n\
# TYPE swapmeet_negotiations_cancelled_total counter\n\
swapmeet_negotiations_cancelled_total {negotiations_cancelled}\n\
# HELP swapmeet_trades_initiated_total Trade-creation calls submitted.\n\
# TYPE swapmeet_trades_initiated_total counter\n\
swapmeet_trades_initiated_total {trades_initiated}\n\
# HELP swapmeet_deposits_submitted_total Deposit calls submitted.\n\
# TYPE swapmeet_deposits_submitted_total counter\n\
swapmeet_deposits_submitted_total {deposits_submitted}\n\
# HELP swapmeet_approvals_submitted_total Approval calls submitted.\n\
# TYPE swapmeet_approvals_submitted_total counter\n\
swapmeet_approvals_submitted_total {approvals_submitted}\n\
# HELP swapmeet_ledger_rejections_total Simulations or submissions reverted.\n\
# TYPE swapmeet_ledger_rejections_total counter\n\
swapmeet_ledger_rejections_total {ledger_rejections}\n\
# HELP swapmeet_rpc_errors_total Ledger transport errors.\n\
# TYPE swapmeet_rpc_errors_total counter\n\
swapmeet_rpc_errors_total {rpc_errors}\n\
# HELP swapmeet_submit_duration_seconds_sum Total ledger submission time (seconds).\n\
# TYPE swapmeet_submit_duration_seconds_sum counter\n\
swapmeet_submit_duration_seconds_sum {submit_sum_s:.6}\n\
# HELP swapmeet_submit_duration_seconds_max Max submission time since last scrape (seconds).\n\
# TYPE swapmeet_submit_duration_seconds_max gauge\n\
swapmeet_submit_duration_seconds_max {submit_max_s:.6}\n\
# HELP swapmeet_events_applied_total Ledger events folded into offer state.\n\
# TYPE swapmeet_events_applied_total counter\n\
swapmeet_events_applied_total {events_applied}\n\
# HELP swapmeet_events_dropped_total Ledger events ignored (replays, unknown trades).\n\
# TYPE swapmeet_events_dropped_total counter\n\
swapmeet_events_dropped_total {events_dropped}\n\
# HELP swapmeet_correlation_failures_total TradeCreated events with no unique offer match.\n\
# TYPE swapmeet_correlation_failures_total counter\n\
swapmeet_correlation_failures_total {correlation_failures}\n\
# HELP swapmeet_open_offers Offers currently in a non-terminal status.\n\
# TYPE swapmeet_open_offers gauge\n\
swapmeet_open_offers {open_offers}\n\
# HELP swapmeet_active_trades Mirrored trades still active on the ledger.\n\
# TYPE swapmeet_active_trades gauge\n\
swapmeet_active_trades {active_trades}\n"
        )
    }
}
