//! Transfer descriptors: the unit of state for one chained transfer.
//!
//! A descriptor is built by the caller, handed to the engine, and from then
//! on owned exclusively by whichever worker is driving its chain. It is
//! mutated only by the chain driver as partial transfers complete.

use std::sync::Arc;

use crate::buffer::TransferBuffer;
use crate::channel::FileChannel;
use crate::completion::CompletionTrigger;
use crate::error::Error;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Read,
    Write,
}

impl TransferKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            TransferKind::Read => "read",
            TransferKind::Write => "write",
        }
    }
}

pub(crate) type FinalizeFn = Box<dyn FnOnce(TransferBuffer) + Send>;

/// State of one in-progress chained transfer.
///
/// The channel is shared with other descriptors on the same file; the buffer
/// is exclusively owned until the transfer finalizes and is handed back
/// through [`deliver_to`](Self::deliver_to). `position + remaining` always
/// bounds the byte range still to be transferred; once `remaining <= 0` the
/// transfer is logically finished regardless of sign.
pub struct TransferDescriptor {
    pub(crate) channel: Arc<dyn FileChannel>,
    pub(crate) buffer: TransferBuffer,
    pub(crate) kind: TransferKind,
    /// Absolute file offset for the next low-level call.
    pub(crate) position: u64,
    /// Bytes still requested. Driven negative transiently by an over-read.
    pub(crate) remaining: i64,
    /// The caller's original length. Fixed after construction.
    pub(crate) requested: u64,
    pub(crate) trigger: Option<Arc<CompletionTrigger>>,
    pub(crate) on_finalized: Option<FinalizeFn>,
}

impl TransferDescriptor {
    /// Describe a read of `length` bytes starting at `position`.
    ///
    /// The buffer must have at least `length` bytes of spare capacity when
    /// the descriptor is issued.
    pub fn read(
        channel: Arc<dyn FileChannel>,
        buffer: TransferBuffer,
        position: u64,
        length: u64,
    ) -> Self {
        TransferDescriptor {
            channel,
            buffer,
            kind: TransferKind::Read,
            position,
            remaining: length as i64,
            requested: length,
            trigger: None,
            on_finalized: None,
        }
    }

    /// Describe a write of the buffer's readable content starting at `position`.
    pub fn write(channel: Arc<dyn FileChannel>, mut buffer: TransferBuffer, position: u64) -> Self {
        if !buffer.is_readable() {
            buffer.flip();
        }
        let length = buffer.readable().len() as u64;
        TransferDescriptor {
            channel,
            buffer,
            kind: TransferKind::Write,
            position,
            remaining: length as i64,
            requested: length,
            trigger: None,
            on_finalized: None,
        }
    }

    /// Attach a completion trigger shared by the logical unit this transfer
    /// belongs to. Without one the transfer is fire-and-forget.
    pub fn with_trigger(mut self, trigger: Arc<CompletionTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Receive the finalized buffer when the transfer completes successfully.
    ///
    /// For reads the buffer arrives flipped, with exactly the requested bytes
    /// readable. Runs on the worker thread that finalized the chain, before
    /// the trigger's aggregator is notified.
    pub fn deliver_to<F>(mut self, consumer: F) -> Self
    where
        F: FnOnce(TransferBuffer) + Send + 'static,
    {
        self.on_finalized = Some(Box::new(consumer));
        self
    }

    /// Transfer direction.
    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// Absolute offset of the next low-level call.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes still requested; `<= 0` once the transfer is logically finished.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// The originally requested length.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Issue-time preconditions.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.requested == 0 {
            return Err(Error::EmptyTransfer);
        }
        if self.kind == TransferKind::Read {
            let available = self.buffer.spare_capacity() as u64;
            if available < self.requested {
                return Err(Error::BufferTooSmall {
                    needed: self.requested,
                    available,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TransferDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferDescriptor")
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("remaining", &self.remaining)
            .field("requested", &self.requested)
            .field("has_trigger", &self.trigger.is_some())
            .finish()
    }
}
