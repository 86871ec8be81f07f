//! Fixed-capacity transfer buffer with a write cursor.
//!
//! A `TransferBuffer` is exclusively owned by one transfer descriptor for the
//! duration of a transfer. The engine fills spare capacity during reads, so a
//! single low-level call may deliver more bytes than the descriptor still
//! wants — the chain driver rewinds the cursor before flipping the buffer so
//! the consumer sees exactly the requested byte count.

use bytes::Bytes;

/// A fixed-capacity byte region with write-mode / read-mode cursor discipline.
///
/// Starts in write mode: the engine appends into spare capacity via
/// [`advance`](Self::advance). [`flip`](Self::flip) switches to read mode,
/// after which [`readable`](Self::readable) exposes `[0, filled)`.
pub struct TransferBuffer {
    storage: Box<[u8]>,
    filled: usize,
    flipped: bool,
}

impl TransferBuffer {
    /// Create an empty write-mode buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        TransferBuffer {
            storage: vec![0u8; capacity].into_boxed_slice(),
            filled: 0,
            flipped: false,
        }
    }

    /// Create a read-mode buffer holding `data`, for write transfers.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let filled = data.len();
        TransferBuffer {
            storage: data.into_boxed_slice(),
            filled,
            flipped: true,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes written so far (the write cursor).
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Remaining spare capacity past the write cursor.
    pub fn spare_capacity(&self) -> usize {
        self.storage.len() - self.filled
    }

    /// Whether the buffer has been flipped to read mode.
    pub fn is_readable(&self) -> bool {
        self.flipped
    }

    /// Mutable view of the spare capacity, for the channel to fill.
    pub(crate) fn spare_mut(&mut self) -> &mut [u8] {
        debug_assert!(!self.flipped, "spare_mut on a read-mode buffer");
        &mut self.storage[self.filled..]
    }

    /// Advance the write cursor by `n` freshly filled bytes.
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(!self.flipped, "advance on a read-mode buffer");
        debug_assert!(
            self.filled + n <= self.storage.len(),
            "advance({n}) past capacity {}",
            self.storage.len()
        );
        self.filled += n;
    }

    /// Rewind the write cursor by `n` bytes, discarding an over-read tail.
    pub(crate) fn rewind(&mut self, n: usize) {
        debug_assert!(!self.flipped, "rewind on a read-mode buffer");
        debug_assert!(n <= self.filled, "rewind({n}) past cursor {}", self.filled);
        self.filled -= n;
    }

    /// Flip from write mode to read mode.
    pub(crate) fn flip(&mut self) {
        debug_assert!(!self.flipped, "buffer flipped twice");
        self.flipped = true;
    }

    /// The readable region `[0, filled)`. Valid only after [`flip`](Self::flip).
    pub fn readable(&self) -> &[u8] {
        debug_assert!(self.flipped, "readable on a write-mode buffer");
        &self.storage[..self.filled]
    }

    /// Detach the readable region as a frozen `Bytes` (no copy).
    pub fn freeze(self) -> Bytes {
        debug_assert!(self.flipped, "freeze on a write-mode buffer");
        let mut data = Vec::from(self.storage);
        data.truncate(self.filled);
        Bytes::from(data)
    }
}

impl std::fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("capacity", &self.storage.len())
            .field("filled", &self.filled)
            .field("flipped", &self.flipped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_flip() {
        let mut buf = TransferBuffer::with_capacity(8);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.spare_capacity(), 8);

        buf.spare_mut()[..5].copy_from_slice(b"hello");
        buf.advance(5);
        assert_eq!(buf.filled(), 5);
        assert_eq!(buf.spare_capacity(), 3);

        buf.flip();
        assert!(buf.is_readable());
        assert_eq!(buf.readable(), b"hello");
    }

    #[test]
    fn rewind_discards_tail() {
        let mut buf = TransferBuffer::with_capacity(16);
        buf.spare_mut()[..12].copy_from_slice(b"hello world!");
        buf.advance(12);

        // Keep only the first 10 bytes.
        buf.rewind(2);
        buf.flip();
        assert_eq!(buf.readable(), b"hello worl");
    }

    #[test]
    fn incremental_fill() {
        let mut buf = TransferBuffer::with_capacity(10);
        buf.spare_mut()[..4].copy_from_slice(b"abcd");
        buf.advance(4);
        buf.spare_mut()[..6].copy_from_slice(b"efghij");
        buf.advance(6);
        assert_eq!(buf.spare_capacity(), 0);

        buf.flip();
        assert_eq!(buf.readable(), b"abcdefghij");
    }

    #[test]
    fn from_vec_is_readable() {
        let buf = TransferBuffer::from_vec(b"payload".to_vec());
        assert!(buf.is_readable());
        assert_eq!(buf.readable(), b"payload");
        assert_eq!(buf.filled(), 7);
    }

    #[test]
    fn freeze_truncates_to_cursor() {
        let mut buf = TransferBuffer::with_capacity(32);
        buf.spare_mut()[..3].copy_from_slice(b"xyz");
        buf.advance(3);
        buf.flip();

        let frozen = buf.freeze();
        assert_eq!(&frozen[..], b"xyz");
    }

    #[test]
    fn empty_buffer() {
        let mut buf = TransferBuffer::with_capacity(0);
        assert_eq!(buf.spare_capacity(), 0);
        buf.flip();
        assert_eq!(buf.readable(), b"");
    }
}
