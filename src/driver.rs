//! Chain driver: decides, per low-level completion, whether a transfer
//! re-issues or finalizes.
//!
//! Each completion reports how many bytes the facility moved. A short
//! transfer re-arms the descriptor at the advanced position; an over-read is
//! trimmed by rewinding the buffer cursor so downstream deserialization sees
//! an exact byte count; a failure anywhere in the chain aborts it and counts
//! as exactly one failure for the whole logical transfer.
//!
//! The driver never blocks and never touches the channel itself — it only
//! transforms descriptor state. Completions within one chain are strictly
//! sequential because the descriptor is owned by one worker at a time.

use std::io;
use std::sync::Arc;

use crate::completion::CompletionTrigger;
use crate::descriptor::{TransferDescriptor, TransferKind};
use crate::metrics;
use crate::sink::DiagnosticSink;

/// Outcome of one completion step.
#[derive(Debug)]
pub(crate) enum ChainStep {
    /// Short transfer: re-issue the descriptor at its new position/size.
    Reissue(TransferDescriptor),
    /// The chain finalized or aborted; the descriptor is consumed.
    Settled,
}

/// Handle a low-level completion reporting `n` bytes transferred.
pub(crate) fn complete(
    mut descriptor: TransferDescriptor,
    n: usize,
    sink: &dyn DiagnosticSink,
) -> ChainStep {
    // Zero progress with bytes outstanding means EOF on a read or a stuck
    // device on a write. Re-issuing would loop forever at the same position,
    // so the chain aborts as a failure instead.
    if n == 0 && descriptor.remaining > 0 {
        metrics::CHAIN_STALLS.increment();
        let cause = match descriptor.kind {
            TransferKind::Read => io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read returned no bytes before the requested size was satisfied",
            ),
            TransferKind::Write => io::Error::new(
                io::ErrorKind::WriteZero,
                "write accepted no bytes before the requested size was satisfied",
            ),
        };
        fail(descriptor, cause, sink);
        return ChainStep::Settled;
    }

    match descriptor.kind {
        TransferKind::Read => {
            metrics::BYTES_READ.add(n as u64);
            descriptor.buffer.advance(n);
        }
        TransferKind::Write => {
            metrics::BYTES_WRITTEN.add(n as u64);
        }
    }

    let bytes_to_transfer_more = descriptor.remaining - n as i64;
    if bytes_to_transfer_more > 0 {
        descriptor.position += n as u64;
        descriptor.remaining = bytes_to_transfer_more;
        metrics::CHAIN_REISSUES.increment();
        return ChainStep::Reissue(descriptor);
    }

    descriptor.remaining = bytes_to_transfer_more;
    if descriptor.kind == TransferKind::Read {
        // The facility may deliver more bytes than requested when the buffer
        // has spare capacity past the request. Rewind so the consumer sees
        // exactly the requested count.
        if bytes_to_transfer_more < 0 {
            descriptor.buffer.rewind(-bytes_to_transfer_more as usize);
            metrics::OVERREADS_TRIMMED.increment();
        }
        descriptor.buffer.flip();
    } else {
        debug_assert!(
            bytes_to_transfer_more == 0,
            "write reported more bytes than submitted"
        );
    }

    metrics::TRANSFERS_COMPLETED.increment();
    let TransferDescriptor {
        buffer,
        trigger,
        on_finalized,
        ..
    } = descriptor;
    // Deliver before settling, so an action watching the aggregator observes
    // every finalized buffer of its unit.
    if let Some(consumer) = on_finalized {
        consumer(buffer);
    }
    settle(&trigger, true);
    ChainStep::Settled
}

/// Handle a low-level failure: abort the chain, emit one diagnostic event,
/// and report exactly one failure to the aggregator.
pub(crate) fn fail(descriptor: TransferDescriptor, cause: io::Error, sink: &dyn DiagnosticSink) {
    metrics::TRANSFERS_FAILED.increment();
    sink.chain_failed(
        &format!(
            "{} chain aborted at position {} with {} of {} bytes outstanding",
            descriptor.kind.name(),
            descriptor.position,
            descriptor.remaining,
            descriptor.requested,
        ),
        &cause,
    );
    settle(&descriptor.trigger, false);
}

/// Record a settlement on the unit's aggregator and run the trigger if this
/// settlement finished it. Racing "finished" observations from other workers
/// are fine — the trigger's claim guarantees a single execution.
fn settle(trigger: &Option<Arc<CompletionTrigger>>, success: bool) {
    if let Some(trigger) = trigger {
        let aggregator = trigger.aggregator();
        if success {
            aggregator.mark_success();
        } else {
            aggregator.mark_failed();
        }
        if aggregator.is_finished() {
            trigger.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TransferBuffer;
    use crate::channel::FileChannel;
    use crate::completion::CompletionAggregator;
    use crate::sink::MemorySink;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullChannel;

    impl FileChannel for NullChannel {
        fn read_at(&self, _buf: &mut [u8], _position: u64) -> io::Result<usize> {
            Ok(0)
        }
        fn write_at(&self, _buf: &[u8], _position: u64) -> io::Result<usize> {
            Ok(0)
        }
    }

    fn read_descriptor(capacity: usize, position: u64, length: u64) -> TransferDescriptor {
        TransferDescriptor::read(
            Arc::new(NullChannel),
            TransferBuffer::with_capacity(capacity),
            position,
            length,
        )
    }

    fn fill(descriptor: &mut TransferDescriptor, byte: u8, n: usize) {
        let spare = descriptor.buffer.spare_mut();
        for slot in &mut spare[..n] {
            *slot = byte;
        }
    }

    #[test]
    fn short_read_reissues_at_new_position() {
        let sink = MemorySink::new();
        let mut d = read_descriptor(100, 0, 100);
        fill(&mut d, 0xAB, 40);

        let step = complete(d, 40, &sink);
        let d = match step {
            ChainStep::Reissue(d) => d,
            ChainStep::Settled => panic!("expected re-issue"),
        };
        assert_eq!(d.position(), 40);
        assert_eq!(d.remaining(), 60);
        assert_eq!(d.buffer.filled(), 40);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn chunks_summing_to_request_finalize_once() {
        let sink = MemorySink::new();
        let finalized = Arc::new(AtomicUsize::new(0));
        let seen_len = Arc::new(AtomicUsize::new(0));

        let counted = finalized.clone();
        let len_slot = seen_len.clone();
        let mut d = read_descriptor(100, 0, 100).deliver_to(move |buffer| {
            counted.fetch_add(1, Ordering::SeqCst);
            len_slot.store(buffer.readable().len(), Ordering::SeqCst);
        });

        fill(&mut d, 1, 40);
        let mut d = match complete(d, 40, &sink) {
            ChainStep::Reissue(d) => d,
            ChainStep::Settled => panic!("finalized early"),
        };
        fill(&mut d, 2, 60);
        assert!(matches!(complete(d, 60, &sink), ChainStep::Settled));

        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert_eq!(seen_len.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn over_read_is_trimmed_before_flip() {
        let sink = MemorySink::new();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let slot = delivered.clone();

        // Request 50 into a 64-byte buffer; the facility fills 55.
        let mut d = read_descriptor(64, 0, 50).deliver_to(move |buffer| {
            slot.lock().unwrap().extend_from_slice(buffer.readable());
        });
        for (i, b) in d.buffer.spare_mut()[..55].iter_mut().enumerate() {
            *b = i as u8;
        }

        assert!(matches!(complete(d, 55, &sink), ChainStep::Settled));
        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 50);
        assert_eq!(delivered[49], 49);
    }

    #[test]
    fn over_read_after_short_reads() {
        // remaining=10 after earlier chunks, facility reports 12.
        let sink = MemorySink::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let slot = seen.clone();
        let mut d = read_descriptor(128, 0, 90).deliver_to(move |buffer| {
            slot.store(buffer.readable().len(), Ordering::SeqCst);
        });

        fill(&mut d, 0, 80);
        let mut d = match complete(d, 80, &sink) {
            ChainStep::Reissue(d) => d,
            ChainStep::Settled => panic!("finalized early"),
        };
        assert_eq!(d.remaining(), 10);

        fill(&mut d, 0, 12);
        assert!(matches!(complete(d, 12, &sink), ChainStep::Settled));
        assert_eq!(seen.load(Ordering::SeqCst), 90);
    }

    #[test]
    fn failure_after_partial_success_counts_once() {
        let sink = MemorySink::new();
        let aggregator = Arc::new(CompletionAggregator::new(1));
        let trigger = CompletionTrigger::with_aggregator(aggregator.clone(), || {});

        let mut d = read_descriptor(30, 0, 30).with_trigger(trigger);
        fill(&mut d, 0, 10);
        let d = match complete(d, 10, &sink) {
            ChainStep::Reissue(d) => d,
            ChainStep::Settled => panic!("finalized early"),
        };

        fail(
            d,
            io::Error::new(io::ErrorKind::Other, "device error"),
            &sink,
        );

        assert!(aggregator.is_finished());
        assert_eq!(aggregator.success_count(), 0);
        assert_eq!(aggregator.failure_count(), 1);
        assert_eq!(sink.events().len(), 1);
        assert!(sink.events()[0].contains("read chain aborted at position 10"));
    }

    #[test]
    fn zero_progress_read_aborts_as_failure() {
        let sink = MemorySink::new();
        let aggregator = Arc::new(CompletionAggregator::new(1));
        let trigger = CompletionTrigger::with_aggregator(aggregator.clone(), || {});

        let d = read_descriptor(16, 0, 16).with_trigger(trigger);
        assert!(matches!(complete(d, 0, &sink), ChainStep::Settled));

        assert_eq!(aggregator.failure_count(), 1);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("read returned no bytes"));
    }

    #[test]
    fn short_write_chain_completes() {
        let sink = MemorySink::new();
        let aggregator = Arc::new(CompletionAggregator::new(1));
        let trigger = CompletionTrigger::with_aggregator(aggregator.clone(), || {});

        let d = TransferDescriptor::write(
            Arc::new(NullChannel),
            TransferBuffer::from_vec(vec![9u8; 32]),
            64,
        )
        .with_trigger(trigger);

        let d = match complete(d, 20, &sink) {
            ChainStep::Reissue(d) => d,
            ChainStep::Settled => panic!("finalized early"),
        };
        assert_eq!(d.position(), 84);
        assert_eq!(d.remaining(), 12);

        assert!(matches!(complete(d, 12, &sink), ChainStep::Settled));
        assert!(aggregator.is_finished());
        assert_eq!(aggregator.success_count(), 1);
    }

    #[test]
    fn fire_and_forget_has_no_trigger_effects() {
        let sink = MemorySink::new();
        let mut d = read_descriptor(8, 0, 8);
        fill(&mut d, 0, 8);
        assert!(matches!(complete(d, 8, &sink), ChainStep::Settled));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn trigger_fires_when_last_of_unit_settles() {
        let sink = MemorySink::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = fired.clone();
        let trigger = CompletionTrigger::bind(2, move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        let mut first = read_descriptor(8, 0, 8).with_trigger(trigger.clone());
        fill(&mut first, 0, 8);
        assert!(matches!(complete(first, 8, &sink), ChainStep::Settled));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let second = read_descriptor(8, 8, 8).with_trigger(trigger);
        fail(second, io::Error::new(io::ErrorKind::Other, "boom"), &sink);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
