#![forbid(unsafe_code)]
//! Read-only byte-device layer.
//!
//! Provides the `ByteDevice` trait and a file-backed implementation with
//! pread semantics: every read carries an absolute offset, no shared seek
//! cursor, no caching, no write path. Ranges are bounds-checked against the
//! device length before the OS read is issued, so a short range fails with
//! `ShortRead` and never returns partial data.

use ino_error::{InspectError, Result};
use ino_types::{ByteOffset, EXT2_SUPERBLOCK_OFFSET, EXT2_SUPERBLOCK_SIZE};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;
use tracing::trace;

/// Byte-addressed read-only device.
pub trait ByteDevice {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()>;

    /// Read exactly `len` bytes from `offset` into a fresh buffer.
    fn read_vec_at(&self, offset: ByteOffset, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0_u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// Check that `[offset, offset + len)` lies within a device of `device_len`
/// bytes, returning `ShortRead` otherwise.
fn check_range(device_len: u64, offset: ByteOffset, len: usize) -> Result<()> {
    let len_u64 = u64::try_from(len).map_err(|_| InspectError::ShortRead {
        offset: offset.0,
        requested: len,
        available: device_len.saturating_sub(offset.0),
    })?;
    let end = offset
        .checked_add(len_u64)
        .ok_or(InspectError::ShortRead {
            offset: offset.0,
            requested: len,
            available: device_len.saturating_sub(offset.0),
        })?;
    if end.0 > device_len {
        return Err(InspectError::ShortRead {
            offset: offset.0,
            requested: len,
            available: device_len.saturating_sub(offset.0),
        });
    }
    Ok(())
}

/// File-backed read-only byte device.
///
/// Uses `std::os::unix::fs::FileExt::read_exact_at`, which does not touch a
/// shared seek position. The `File` is owned here, so the descriptor is
/// released on every exit path, decode failures included.
#[derive(Debug)]
pub struct FileByteDevice {
    file: File,
    len: u64,
}

impl FileByteDevice {
    /// Open the image at `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        trace!(path = %path.as_ref().display(), len, "opened image");
        Ok(Self { file, len })
    }
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        check_range(self.len, offset, buf.len())?;
        self.file.read_exact_at(buf, offset.0)?;
        trace!(offset = offset.0, len = buf.len(), "read");
        Ok(())
    }
}

/// In-memory byte device over an owned buffer.
///
/// Decoders stay referentially transparent against absolute offsets, so a
/// plain buffer stands in for a disk image in tests and embedded callers.
#[derive(Debug, Clone)]
pub struct MemByteDevice {
    bytes: Vec<u8>,
}

impl MemByteDevice {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ByteDevice for MemByteDevice {
    fn len_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> Result<()> {
        check_range(self.len_bytes(), offset, buf.len())?;
        let start = usize::try_from(offset.0).map_err(|_| InspectError::ShortRead {
            offset: offset.0,
            requested: buf.len(),
            available: 0,
        })?;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }
}

/// Read the 1024-byte superblock region of the filesystem starting at
/// `partition_base`.
pub fn read_superblock_region(
    dev: &dyn ByteDevice,
    partition_base: ByteOffset,
) -> Result<[u8; EXT2_SUPERBLOCK_SIZE]> {
    let offset = partition_base
        .checked_add(EXT2_SUPERBLOCK_OFFSET)
        .ok_or(InspectError::ShortRead {
            offset: partition_base.0,
            requested: EXT2_SUPERBLOCK_SIZE,
            available: 0,
        })?;
    let mut buf = [0_u8; EXT2_SUPERBLOCK_SIZE];
    dev.read_exact_at(offset, &mut buf)?;
    Ok(buf)
}
