//! Positional file channel abstraction.
//!
//! A channel is shared by many concurrently in-flight descriptors on the same
//! file: both operations are positional, so no seek cursor is shared and
//! non-overlapping transfers are safe without coordination. The engine never
//! closes a channel — the handle's last `Arc` owner does.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::error::Error;

/// A readable/writable file handle supporting positional I/O.
///
/// A call may legally transfer fewer bytes than the slice holds (short
/// transfer) — the chain driver re-issues until the request is satisfied.
/// The read side is handed the buffer's entire spare capacity, so an
/// implementation may also report more bytes than the descriptor still
/// wants; the driver trims the over-read before finalizing.
pub trait FileChannel: Send + Sync + 'static {
    /// Read into `buf` starting at absolute file offset `position`.
    /// Returns the number of bytes read; 0 means end of file.
    fn read_at(&self, buf: &mut [u8], position: u64) -> io::Result<usize>;

    /// Write `buf` starting at absolute file offset `position`.
    /// Returns the number of bytes written.
    fn write_at(&self, buf: &[u8], position: u64) -> io::Result<usize>;
}

impl FileChannel for File {
    fn read_at(&self, buf: &mut [u8], position: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, position)
    }

    fn write_at(&self, buf: &[u8], position: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(self, buf, position)
    }
}

/// Open a read/write channel on `path`, creating the file if absent.
pub fn open_channel(path: impl AsRef<Path>, truncate: bool) -> Result<Arc<File>, Error> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(truncate)
        .open(path)?;
    Ok(Arc::new(file))
}
