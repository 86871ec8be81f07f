//! Engine metrics.
//!
//! Per-transfer and per-chain counters, exposed through the metriken
//! registry for Prometheus exposition by the embedding process.

use metriken::{Counter, Gauge, metric};

// ── Transfer lifecycle ───────────────────────────────────────────

#[metric(name = "spindle/transfers/issued", description = "Total transfers issued")]
pub static TRANSFERS_ISSUED: Counter = Counter::new();

#[metric(
    name = "spindle/transfers/completed",
    description = "Transfers that finalized successfully"
)]
pub static TRANSFERS_COMPLETED: Counter = Counter::new();

#[metric(
    name = "spindle/transfers/failed",
    description = "Transfer chains aborted by an I/O failure or stall"
)]
pub static TRANSFERS_FAILED: Counter = Counter::new();

#[metric(
    name = "spindle/transfers/in_flight",
    description = "Transfers issued but not yet settled"
)]
pub static TRANSFERS_IN_FLIGHT: Gauge = Gauge::new();

// ── Bytes ────────────────────────────────────────────────────────

#[metric(name = "spindle/bytes/read", description = "Total bytes read")]
pub static BYTES_READ: Counter = Counter::new();

#[metric(name = "spindle/bytes/written", description = "Total bytes written")]
pub static BYTES_WRITTEN: Counter = Counter::new();

// ── Chain behavior ───────────────────────────────────────────────

#[metric(
    name = "spindle/chain/reissues",
    description = "Short transfers re-issued at an advanced position"
)]
pub static CHAIN_REISSUES: Counter = Counter::new();

#[metric(
    name = "spindle/chain/overreads_trimmed",
    description = "Over-reads trimmed back to the requested size"
)]
pub static OVERREADS_TRIMMED: Counter = Counter::new();

#[metric(
    name = "spindle/chain/stalls",
    description = "Chains aborted after a zero-progress completion"
)]
pub static CHAIN_STALLS: Counter = Counter::new();
