#![forbid(unsafe_code)]
//! On-disk format parsing for ext2 metadata structures.
//!
//! Pure parsing crate — no I/O, no side effects. Parses byte slices into
//! typed Rust structures representing the ext2 superblock, block group
//! descriptors, inode bitmaps, and 128-byte inode records. Every decoder is
//! a function of its input window alone, so synthetic byte buffers are
//! enough to test each stage without a real disk image.

pub mod bitmap;
pub mod ext2;

pub use bitmap::InodeBitmap;
pub use ext2::{
    Ext2GroupDesc, Ext2ImageReader, Ext2Inode, Ext2Superblock, InodeTable, group_desc_offset,
    group_desc_table_block,
};
