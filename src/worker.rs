//! Engine: submission queue plus worker thread pool.
//!
//! Issuing a transfer returns immediately; all progress happens on worker
//! threads, which pop a descriptor, perform one positional call through its
//! channel, and run the chain driver on the result. A `Reissue` outcome puts
//! the descriptor back on the queue — the chain is handed off serially
//! between workers and never touched by two threads at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::config::Config;
use crate::descriptor::{TransferDescriptor, TransferKind};
use crate::driver::{self, ChainStep};
use crate::error::Error;
use crate::metrics;
use crate::sink::{DiagnosticSink, TracingSink};

/// Builder for launching a spindle engine.
///
/// Create a builder with [`EngineBuilder::new(config)`](Self::new), optionally
/// inject a [`DiagnosticSink`], then call [`launch`](Self::launch) to start
/// the worker threads.
pub struct EngineBuilder {
    config: Config,
    sink: Arc<dyn DiagnosticSink>,
}

impl EngineBuilder {
    /// Create a new builder with the given config and the default
    /// tracing-backed diagnostic sink.
    pub fn new(config: Config) -> Self {
        EngineBuilder {
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the diagnostic sink failures are routed to.
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate the config and spawn the worker threads.
    pub fn launch(self) -> Result<Engine, Error> {
        self.config.validate()?;

        let threads = if self.config.worker.threads == 0 {
            num_cpus()
        } else {
            self.config.worker.threads
        };
        let tick = Duration::from_micros(self.config.tick_timeout_us);

        let (tx, rx) = crossbeam_channel::unbounded::<TransferDescriptor>();
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(threads);
        for worker_id in 0..threads {
            let rx = rx.clone();
            let tx = tx.clone();
            let worker_shutdown = shutdown_flag.clone();
            let in_flight = in_flight.clone();
            let sink = self.sink.clone();
            let worker_config = self.config.worker.clone();

            let spawned = thread::Builder::new()
                .name(format!("spindle-worker-{worker_id}"))
                .spawn(move || {
                    if worker_config.pin_to_core {
                        // Best effort: an unpinned worker is still correct.
                        let _ = pin_to_core(worker_config.core_offset + worker_id);
                    }
                    worker_loop(rx, tx, worker_shutdown, in_flight, sink, tick);
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(cause) => {
                    // Release the workers already running before bailing out.
                    shutdown_flag.store(true, Ordering::Release);
                    return Err(Error::Io(cause));
                }
            }
        }

        Ok(Engine {
            tx,
            shutdown_flag,
            in_flight,
            workers,
        })
    }
}

/// Handle for issuing transfers to the worker pool.
///
/// Cheap to share behind an `Arc` from many submitting threads. Dropping the
/// engine signals the workers to exit once every in-flight chain settles;
/// [`shutdown`](Self::shutdown) additionally joins them.
pub struct Engine {
    tx: Sender<TransferDescriptor>,
    shutdown_flag: Arc<AtomicBool>,
    in_flight: Arc<AtomicU64>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Engine {
    /// Start a transfer. Returns as soon as the descriptor is queued.
    ///
    /// Preconditions: the descriptor requests at least one byte, and a read
    /// descriptor's buffer has spare capacity for the whole request.
    pub fn issue(&self, descriptor: TransferDescriptor) -> Result<(), Error> {
        if self.shutdown_flag.load(Ordering::Acquire) {
            return Err(Error::EngineShutdown);
        }
        descriptor.validate()?;

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        metrics::TRANSFERS_ISSUED.increment();
        metrics::TRANSFERS_IN_FLIGHT.increment();

        if self.tx.send(descriptor).is_err() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            metrics::TRANSFERS_IN_FLIGHT.decrement();
            return Err(Error::EngineShutdown);
        }
        Ok(())
    }

    /// Transfers issued but not yet settled.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Stop accepting transfers, let the workers drain every in-flight
    /// chain, and join them.
    pub fn shutdown(mut self) {
        self.shutdown_flag.store(true, Ordering::Release);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Workers exit on their next idle tick once in-flight chains drain.
        self.shutdown_flag.store(true, Ordering::Release);
    }
}

fn worker_loop(
    rx: Receiver<TransferDescriptor>,
    tx: Sender<TransferDescriptor>,
    shutdown_flag: Arc<AtomicBool>,
    in_flight: Arc<AtomicU64>,
    sink: Arc<dyn DiagnosticSink>,
    tick: Duration,
) {
    loop {
        match rx.recv_timeout(tick) {
            Ok(descriptor) => process(descriptor, &tx, &in_flight, sink.as_ref()),
            Err(RecvTimeoutError::Timeout) => {
                if shutdown_flag.load(Ordering::Acquire) && in_flight.load(Ordering::Acquire) == 0
                {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Perform one positional call for the descriptor and apply the chain step.
/// A worker thread never dies from a handled I/O failure — the error is
/// routed through the driver's failure path.
fn process(
    mut descriptor: TransferDescriptor,
    tx: &Sender<TransferDescriptor>,
    in_flight: &AtomicU64,
    sink: &dyn DiagnosticSink,
) {
    let outcome = match descriptor.kind() {
        TransferKind::Read => {
            let channel = descriptor.channel.clone();
            let position = descriptor.position();
            channel.read_at(descriptor.buffer.spare_mut(), position)
        }
        TransferKind::Write => {
            let consumed = (descriptor.requested() as i64 - descriptor.remaining()) as usize;
            descriptor.channel.write_at(
                &descriptor.buffer.readable()[consumed..],
                descriptor.position(),
            )
        }
    };

    let step = match outcome {
        Ok(n) => driver::complete(descriptor, n, sink),
        Err(cause) => {
            driver::fail(descriptor, cause, sink);
            ChainStep::Settled
        }
    };

    match step {
        ChainStep::Reissue(descriptor) => {
            if tx.send(descriptor).is_err() {
                // All receivers are gone; the chain cannot continue.
                settled(in_flight);
            }
        }
        ChainStep::Settled => settled(in_flight),
    }
}

fn settled(in_flight: &AtomicU64) {
    in_flight.fetch_sub(1, Ordering::AcqRel);
    metrics::TRANSFERS_IN_FLIGHT.decrement();
}

/// Pin the current thread to a specific CPU core.
fn pin_to_core(core: usize) -> Result<(), Error> {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        let ret = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if ret != 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}

/// Get the number of available CPU cores.
fn num_cpus() -> usize {
    let ret = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if ret < 1 { 1 } else { ret as usize }
}
