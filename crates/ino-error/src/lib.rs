#![forbid(unsafe_code)]
//! Error types for inospect.
//!
//! # Error Taxonomy
//!
//! inospect uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `ino-types` | On-disk format violations detected during byte parsing |
//! | Inspection | `InspectError` | `ino-error` (this crate) | User-facing errors for the pipeline and CLI |
//!
//! ## Mapping Policy: ParseError → InspectError
//!
//! `ino-error` is intentionally independent of `ino-types` so the dependency
//! graph stays acyclic. The conversion happens in `ino-core`, which depends
//! on both crates:
//!
//! | ParseError variant | InspectError variant | Rationale |
//! |--------------------|----------------------|-----------|
//! | `InsufficientData` (superblock / descriptor table) | `TruncatedImage` | The structure extends past the end of the image |
//! | `InsufficientData` (inode table) | `TruncatedTable` | Same failure, named per stage for diagnostics |
//! | `InvalidMagic` | `NotAFilesystem` | Wrong magic means the image holds no filesystem at the expected offset |
//! | `InvalidField` / `IntegerConversion` | `Parse` | Residual detail, surfaced with the parse-layer message |
//!
//! ## Propagation Policy
//!
//! Structural failures (superblock, descriptor table, inode table length)
//! abort the inspection — there is no meaningful partial result without
//! them. Per-record and bitmap problems are isolated as report issues and
//! never abort the remaining sequence: the point of a diagnostic tool is
//! maximal visibility into a possibly-corrupt image.

use thiserror::Error;

/// Unified error type for inspection operations.
#[derive(Debug, Error)]
pub enum InspectError {
    /// Operating system I/O error (open, metadata, read syscall).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A device read was requested past the end of the image.
    ///
    /// Raised by the device layer before any bytes are transferred, so a
    /// short range never returns partial data.
    #[error("short read: {requested} bytes at offset {offset}, only {available} available")]
    ShortRead {
        offset: u64,
        requested: usize,
        available: u64,
    },

    /// A structural record (superblock, group descriptor) extends past the
    /// end of the image.
    #[error("truncated image: {structure} needs {needed} bytes at offset {offset}")]
    TruncatedImage {
        structure: &'static str,
        offset: u64,
        needed: usize,
    },

    /// The inode table extends past the end of the image.
    #[error("truncated inode table: need {needed} bytes at offset {offset}, only {available} available")]
    TruncatedTable {
        offset: u64,
        needed: usize,
        available: u64,
    },

    /// The superblock magic does not identify an ext2 filesystem.
    #[error("not an ext2 filesystem: magic {magic:#06x} (expected 0xef53)")]
    NotAFilesystem { magic: u16 },

    /// A decoded block number resolves outside the image.
    #[error(
        "block reference out of range: block {block} resolves to byte {resolved}, image is {image_len} bytes"
    )]
    OutOfRangeBlockReference {
        block: u64,
        resolved: u64,
        image_len: u64,
    },

    /// Parse-layer failure surfaced with its full detail.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result alias using `InspectError`.
pub type Result<T> = std::result::Result<T, InspectError>;
