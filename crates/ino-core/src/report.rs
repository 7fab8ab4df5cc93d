//! Report model and text rendering.
//!
//! The report carries every decoded slot, zero-mode entries included, so
//! filtering stays a rendering decision. The text renderer emits one
//! `INODE <n>:` stanza per in-use record with the fields in on-disk layout
//! order; free slots produce no output.

use ino_ondisk::{Ext2GroupDesc, Ext2Inode, Ext2Superblock};
use ino_types::{GroupNumber, InodeNumber};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};

/// One decoded inode-table slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InodeSlot {
    pub ino: InodeNumber,
    pub record: Ext2Inode,
}

/// A non-fatal disagreement or gap noticed while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// The inode bitmap and the record's mode field disagree about
    /// allocation.
    AllocationMismatch {
        ino: InodeNumber,
        bitmap_allocated: bool,
        mode: u16,
    },
    /// The inode bitmap could not be read; the cross-check was skipped.
    BitmapUnavailable { detail: String },
    /// The superblock declares an inode size other than the 128-byte
    /// records this inspector decodes.
    UnexpectedInodeSize { inode_size: u16 },
}

impl std::fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllocationMismatch {
                ino,
                bitmap_allocated,
                mode,
            } => write!(
                f,
                "inode {ino}: bitmap says {}, mode field is {mode}",
                if *bitmap_allocated {
                    "allocated"
                } else {
                    "free"
                }
            ),
            Self::BitmapUnavailable { detail } => {
                write!(f, "inode bitmap unavailable: {detail}")
            }
            Self::UnexpectedInodeSize { inode_size } => write!(
                f,
                "superblock declares inode size {inode_size}, decoding 128-byte records"
            ),
        }
    }
}

/// Everything one inspection decoded.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub group: GroupNumber,
    pub superblock: Ext2Superblock,
    pub descriptor: Ext2GroupDesc,
    pub records: Vec<InodeSlot>,
    pub issues: Vec<ConsistencyIssue>,
}

impl InspectReport {
    /// Slots whose mode field marks them in use.
    pub fn in_use(&self) -> impl Iterator<Item = &InodeSlot> {
        self.records.iter().filter(|slot| slot.record.is_in_use())
    }

    /// Number of in-use slots.
    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.in_use().count()
    }
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Infallible: writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Render one in-use record as an `INODE <n>:` stanza.
fn render_record(ino: InodeNumber, record: &Ext2Inode, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "INODE {ino}:")?;
    writeln!(out, "\tmode: {}", record.mode)?;
    writeln!(out, "\tuid: {}", record.uid)?;
    writeln!(out, "\tsize: {}", record.size)?;
    writeln!(out, "\tatime: {}", record.atime)?;
    writeln!(out, "\tctime: {}", record.ctime)?;
    writeln!(out, "\tmtime: {}", record.mtime)?;
    writeln!(out, "\tdtime: {}", record.dtime)?;
    writeln!(out, "\tgid: {}", record.gid)?;
    writeln!(out, "\tlinks_count: {}", record.links_count)?;
    writeln!(out, "\tblocks: {}", record.blocks)?;
    writeln!(out, "\tflags: {}", record.flags)?;
    writeln!(out, "\tosd1: {}", record.osd1)?;
    writeln!(out, "\tblock_pointers: {}", hex_string(&record.block_pointers))?;
    writeln!(out, "\tgeneration: {}", record.generation)?;
    writeln!(out, "\tfile_acl: {}", record.file_acl)?;
    writeln!(out, "\tdir_acl: {}", record.dir_acl)?;
    writeln!(out, "\tfaddr: {}", record.faddr)?;
    writeln!(out, "\tosd2: {}", hex_string(&record.osd2))?;
    writeln!(out, "\tfile type: {}", record.file_kind())?;
    Ok(())
}

/// Render the filesystem summary: superblock and descriptor scalars.
pub fn render_summary(report: &InspectReport, out: &mut impl Write) -> io::Result<()> {
    let sb = &report.superblock;
    writeln!(out, "filesystem: ext2")?;
    writeln!(out, "volume_name: {}", sb.volume_name)?;
    writeln!(out, "block_size: {}", sb.block_size)?;
    writeln!(out, "inodes_count: {}", sb.inodes_count)?;
    writeln!(out, "blocks_count: {}", sb.blocks_count)?;
    writeln!(out, "free_inodes_count: {}", sb.free_inodes_count)?;
    writeln!(out, "free_blocks_count: {}", sb.free_blocks_count)?;
    writeln!(out, "group: {}", report.group)?;
    writeln!(out, "inode_bitmap_block: {}", report.descriptor.inode_bitmap)?;
    writeln!(out, "inode_table_block: {}", report.descriptor.inode_table)?;
    Ok(())
}

/// Render every in-use record. Free slots emit nothing.
pub fn render_records(report: &InspectReport, out: &mut impl Write) -> io::Result<()> {
    for slot in report.in_use() {
        render_record(slot.ino, &slot.record, out)?;
    }
    Ok(())
}

/// Render collected consistency issues, if any.
pub fn render_issues(report: &InspectReport, out: &mut impl Write) -> io::Result<()> {
    if report.issues.is_empty() {
        return Ok(());
    }
    writeln!(out, "warnings:")?;
    for issue in &report.issues {
        writeln!(out, "\t{issue}")?;
    }
    Ok(())
}

/// Render the full report: summary, records, then warnings.
pub fn render_report(report: &InspectReport, out: &mut impl Write) -> io::Result<()> {
    render_summary(report, out)?;
    writeln!(out)?;
    render_records(report, out)?;
    render_issues(report, out)?;
    Ok(())
}
