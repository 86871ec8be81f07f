//! Completion aggregation across a logical unit of transfers.
//!
//! A logical unit is N transfers whose combined settlement runs one follow-up
//! action. The [`CompletionAggregator`] counts success/failure settlements;
//! the [`CompletionTrigger`] fires the action exactly once, on whichever
//! worker thread performed the settlement that finished the aggregator.
//!
//! Both counters live in a single atomic word so the
//! `success + failure <= expected` clamp is one compare-and-swap — a racing
//! extra settlement can never push the total past `expected`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const SUCCESS_SHIFT: u64 = 32;
const COUNT_MASK: u64 = 0xFFFF_FFFF;

#[inline]
fn unpack(state: u64) -> (u32, u32) {
    ((state >> SUCCESS_SHIFT) as u32, (state & COUNT_MASK) as u32)
}

#[inline]
fn pack(success: u32, failed: u32) -> u64 {
    ((success as u64) << SUCCESS_SHIFT) | failed as u64
}

/// Tracks how many sub-operations of one logical unit have settled.
///
/// `expected` is fixed at construction. Settlements arrive concurrently from
/// independent worker threads; the thread whose settlement reaches `expected`
/// observes [`is_finished`](Self::is_finished) immediately afterwards.
pub struct CompletionAggregator {
    expected: u32,
    /// Success count in the high 32 bits, failure count in the low 32 bits.
    state: AtomicU64,
}

impl CompletionAggregator {
    /// Create an aggregator expecting `expected` settlements.
    pub fn new(expected: u32) -> Self {
        CompletionAggregator {
            expected,
            state: AtomicU64::new(0),
        }
    }

    /// Record one successful sub-operation.
    ///
    /// Returns `false` if the aggregator already holds `expected` settlements
    /// — the extra call is rejected and no counter moves.
    pub fn mark_success(&self) -> bool {
        self.mark(true)
    }

    /// Record one failed sub-operation. Clamped like [`mark_success`](Self::mark_success).
    pub fn mark_failed(&self) -> bool {
        self.mark(false)
    }

    fn mark(&self, success: bool) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let (s, f) = unpack(current);
            if s + f >= self.expected {
                debug_assert!(
                    false,
                    "aggregator settled more than the {} expected operations",
                    self.expected
                );
                return false;
            }
            let next = if success { pack(s + 1, f) } else { pack(s, f + 1) };
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Whether all expected sub-operations have settled.
    pub fn is_finished(&self) -> bool {
        let (s, f) = unpack(self.state.load(Ordering::Acquire));
        s + f >= self.expected
    }

    /// Number of sub-operations that settled successfully.
    pub fn success_count(&self) -> u32 {
        unpack(self.state.load(Ordering::Acquire)).0
    }

    /// Number of sub-operations that settled with a failure.
    pub fn failure_count(&self) -> u32 {
        unpack(self.state.load(Ordering::Acquire)).1
    }

    /// Number of sub-operations registered at construction.
    pub fn expected_count(&self) -> u32 {
        self.expected
    }
}

type Action = Box<dyn FnOnce() + Send>;

/// One-shot action bound to an aggregator.
///
/// [`run`](Self::run) executes the action at most once total, across all
/// threads and all calls: the first caller to win the atomic claim performs
/// the action, every other caller is a no-op. The engine calls `run` only
/// after a settlement it performed left the aggregator finished, so the
/// action may race with at most the other settlements of the same unit.
pub struct CompletionTrigger {
    aggregator: Arc<CompletionAggregator>,
    claimed: AtomicBool,
    action: Mutex<Option<Action>>,
}

impl CompletionTrigger {
    /// Bind an action to a fresh aggregator expecting `expected` settlements.
    ///
    /// Attach the returned trigger to each of the unit's descriptors. The
    /// action can capture a clone of [`aggregator`](Self::aggregator) to
    /// inspect success/failure counts when it runs.
    pub fn bind<F>(expected: u32, action: F) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_aggregator(Arc::new(CompletionAggregator::new(expected)), action)
    }

    /// Bind an action to an existing aggregator.
    ///
    /// Use this when the action itself needs the aggregator — create the
    /// aggregator first, clone it into the action, then bind:
    ///
    /// ```
    /// use std::sync::Arc;
    /// use spindle::{CompletionAggregator, CompletionTrigger};
    ///
    /// let aggregator = Arc::new(CompletionAggregator::new(2));
    /// let counts = aggregator.clone();
    /// let trigger = CompletionTrigger::with_aggregator(aggregator, move || {
    ///     println!("{} of 2 succeeded", counts.success_count());
    /// });
    /// # let _ = trigger;
    /// ```
    pub fn with_aggregator<F>(aggregator: Arc<CompletionAggregator>, action: F) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Arc::new(CompletionTrigger {
            aggregator,
            claimed: AtomicBool::new(false),
            action: Mutex::new(Some(Box::new(action))),
        })
    }

    /// The aggregator this trigger watches.
    pub fn aggregator(&self) -> &Arc<CompletionAggregator> {
        &self.aggregator
    }

    /// Run the bound action if no other caller has claimed it yet.
    ///
    /// Must be called only after the aggregator reports finished; calling
    /// earlier is a caller bug (the engine itself never does).
    pub fn run(&self) {
        debug_assert!(
            self.aggregator.is_finished(),
            "trigger run before the aggregator finished"
        );
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let action = match self.action.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(action) = action {
            action();
        }
    }
}
