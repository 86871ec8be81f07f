//! spindle — chained asynchronous file I/O with completion aggregation.
//!
//! spindle drives partial positional reads and writes to completion: when the
//! operating system moves fewer bytes than requested, the transfer is
//! re-issued at the advanced position until the request is satisfied, and
//! over-reads are trimmed so the consumer always sees an exact byte count.
//! Any number of concurrently issued transfers can be grouped into one
//! logical unit whose follow-up action runs exactly once, the instant the
//! last of them settles — on whichever worker thread happened to observe it.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::{Arc, Mutex};
//! use spindle::{
//!     CompletionTrigger, Config, EngineBuilder, TransferBuffer, TransferDescriptor,
//! };
//!
//! fn main() -> Result<(), spindle::Error> {
//!     let engine = EngineBuilder::new(Config::default()).launch()?;
//!     let channel = spindle::open_channel("segment.dat", false)?;
//!
//!     let pieces = Arc::new(Mutex::new(Vec::new()));
//!     let merged = pieces.clone();
//!     let trigger = CompletionTrigger::bind(2, move || {
//!         let total: usize = merged.lock().unwrap().iter().map(Vec::len).sum();
//!         println!("unit settled, {total} bytes collected");
//!     });
//!
//!     for index in 0..2u64 {
//!         let slot = pieces.clone();
//!         let descriptor = TransferDescriptor::read(
//!             channel.clone(),
//!             TransferBuffer::with_capacity(4096),
//!             index * 4096,
//!             4096,
//!         )
//!         .with_trigger(trigger.clone())
//!         .deliver_to(move |buffer| slot.lock().unwrap().push(buffer.readable().to_vec()));
//!         engine.issue(descriptor)?;
//!     }
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Platform
//!
//! Unix only — channels rely on positional `pread`/`pwrite`, so many
//! in-flight transfers can share one file handle without a seek cursor.

// ── Internal modules ────────────────────────────────────────────────────
pub(crate) mod driver;
pub(crate) mod metrics;

// ── Public modules ──────────────────────────────────────────────────────
pub mod buffer;
pub mod channel;
pub mod completion;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod sink;
pub mod worker;

// ── Re-exports: Transfers ───────────────────────────────────────────────

/// Fixed-capacity byte region with write-cursor / flip discipline.
pub use buffer::TransferBuffer;
/// Positional file channel abstraction.
pub use channel::FileChannel;
/// Open a read/write channel on a path.
pub use channel::open_channel;
/// State of one in-progress chained transfer.
pub use descriptor::TransferDescriptor;
/// Transfer direction (read or write).
pub use descriptor::TransferKind;

// ── Re-exports: Completion aggregation ─────────────────────────────────

/// Success/failure counts across one logical unit of transfers.
pub use completion::CompletionAggregator;
/// One-shot action fired when a logical unit finishes.
pub use completion::CompletionTrigger;

// ── Re-exports: Engine ──────────────────────────────────────────────────

/// Engine configuration.
pub use config::Config;
/// Worker thread configuration.
pub use config::WorkerConfig;
/// Engine errors.
pub use error::Error;
/// Sink that records failure events in memory, for tests.
pub use sink::MemorySink;
/// Injected receiver for chain-failure diagnostics.
pub use sink::DiagnosticSink;
/// Default sink routing failures to `tracing`.
pub use sink::TracingSink;
/// Handle for issuing transfers.
pub use worker::Engine;
/// Builder for launching an engine.
pub use worker::EngineBuilder;
