//! ext2 structure parsers.
//!
//! All offsets below are relative to the start of the record being parsed;
//! every numeric field is unsigned little-endian. The layout follows the
//! classic ext2 revision-0 format: a 1024-byte superblock at byte 1024 of
//! the filesystem, 32-byte group descriptors in the block after it, and
//! fixed 128-byte inode records in each group's inode table.

use crate::bitmap::InodeBitmap;
use ino_types::{
    BlockNumber, BlockSize, ByteOffset, EXT2_GROUP_DESC_SIZE, EXT2_INODE_RECORD_SIZE,
    EXT2_SUPER_MAGIC, EXT2_SUPERBLOCK_OFFSET, EXT2_SUPERBLOCK_SIZE, FileKind, GroupNumber,
    InodeNumber, ParseError, ensure_slice, ext2_block_size_from_log, read_fixed, read_le_u16,
    read_le_u32, read_u8, trim_nul_padded, u64_to_usize,
};
use serde::{Deserialize, Serialize};

/// Parsed ext2 superblock.
///
/// Carries the scalar prefix the on-disk format defines through the
/// preallocation hints; feature bitmaps and journal fields are not
/// decoded — nothing downstream consumes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2Superblock {
    // ── Core geometry ────────────────────────────────────────────────────
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub reserved_blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub block_size: BlockSize,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub first_ino: u32,
    pub inode_size: u16,

    // ── Identity ─────────────────────────────────────────────────────────
    pub magic: u16,
    pub uuid: [u8; 16],
    pub volume_name: String,

    // ── Revision & OS ────────────────────────────────────────────────────
    pub rev_level: u32,
    pub minor_rev_level: u16,
    pub creator_os: u32,

    // ── State tracking ───────────────────────────────────────────────────
    pub state: u16,
    pub errors: u16,
    pub mnt_count: u16,
    pub max_mnt_count: u16,

    // ── Timestamps ───────────────────────────────────────────────────────
    pub mtime: u32,
    pub wtime: u32,
    pub lastcheck: u32,

    // ── Preallocation hints ──────────────────────────────────────────────
    pub prealloc_blocks: u8,
    pub prealloc_dir_blocks: u8,
}

impl Ext2Superblock {
    /// Parse an ext2 superblock from a 1024-byte superblock region.
    ///
    /// The magic is checked before anything else is decoded; a mismatch
    /// means the image holds no ext2 filesystem at this offset.
    pub fn parse(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < EXT2_SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT2_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u16(region, 0x38)?;
        if magic != EXT2_SUPER_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: EXT2_SUPER_MAGIC,
                actual: magic,
            });
        }

        let log_block_size = read_le_u32(region, 0x18)?;
        let Some(block_size_bytes) = ext2_block_size_from_log(log_block_size) else {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "invalid shift",
            });
        };
        let block_size = BlockSize::new(block_size_bytes)?;

        Ok(Self {
            inodes_count: read_le_u32(region, 0x00)?,
            blocks_count: read_le_u32(region, 0x04)?,
            reserved_blocks_count: read_le_u32(region, 0x08)?,
            free_blocks_count: read_le_u32(region, 0x0C)?,
            free_inodes_count: read_le_u32(region, 0x10)?,
            first_data_block: read_le_u32(region, 0x14)?,
            block_size,
            blocks_per_group: read_le_u32(region, 0x20)?,
            inodes_per_group: read_le_u32(region, 0x28)?,
            first_ino: read_le_u32(region, 0x54)?,
            inode_size: read_le_u16(region, 0x58)?,

            magic,
            uuid: read_fixed::<16>(region, 0x68)?,
            volume_name: trim_nul_padded(&read_fixed::<16>(region, 0x78)?),

            rev_level: read_le_u32(region, 0x4C)?,
            minor_rev_level: read_le_u16(region, 0x3E)?,
            creator_os: read_le_u32(region, 0x48)?,

            state: read_le_u16(region, 0x3A)?,
            errors: read_le_u16(region, 0x3C)?,
            mnt_count: read_le_u16(region, 0x34)?,
            max_mnt_count: read_le_u16(region, 0x36)?,

            mtime: read_le_u32(region, 0x2C)?,
            wtime: read_le_u32(region, 0x30)?,
            lastcheck: read_le_u32(region, 0x40)?,

            prealloc_blocks: read_u8(region, 0xCC)?,
            prealloc_dir_blocks: read_u8(region, 0xCD)?,
        })
    }

    /// Block holding the group descriptor table for this filesystem.
    #[must_use]
    pub fn group_desc_table_block(&self) -> BlockNumber {
        group_desc_table_block(self.block_size)
    }

    /// Byte offset of a group descriptor, relative to the filesystem start.
    #[must_use]
    pub fn group_desc_offset(&self, group: GroupNumber) -> Option<ByteOffset> {
        group_desc_offset(self.block_size, group)
    }

    /// Number of inode-table slots to decode for one group.
    ///
    /// Bounded by the filesystem-wide inode count so a single-group image
    /// is not over-read.
    #[must_use]
    pub fn table_slot_count(&self) -> u32 {
        self.inodes_per_group.min(self.inodes_count)
    }
}

/// Block holding the group descriptor table: the block after the
/// superblock. Block 2 for 1024-byte blocks, block 1 otherwise.
#[must_use]
pub fn group_desc_table_block(block_size: BlockSize) -> BlockNumber {
    if block_size.get() == 1024 {
        BlockNumber(2)
    } else {
        BlockNumber(1)
    }
}

/// Byte offset of a group descriptor, relative to the filesystem start.
#[must_use]
pub fn group_desc_offset(block_size: BlockSize, group: GroupNumber) -> Option<ByteOffset> {
    let table_start = block_size.block_to_byte(group_desc_table_block(block_size))?;
    let desc_offset = u64::from(group.0).checked_mul(EXT2_GROUP_DESC_SIZE as u64)?;
    table_start.checked_add(desc_offset)
}

/// Parsed ext2 block group descriptor (fixed 32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2GroupDesc {
    pub block_bitmap: BlockNumber,
    pub inode_bitmap: BlockNumber,
    pub inode_table: BlockNumber,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub used_dirs_count: u16,
}

impl Ext2GroupDesc {
    /// Parse a descriptor from its 32-byte window.
    ///
    /// Depends only on the window passed in; descriptors never reference
    /// each other.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < EXT2_GROUP_DESC_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT2_GROUP_DESC_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            block_bitmap: BlockNumber(read_le_u32(bytes, 0x00)?),
            inode_bitmap: BlockNumber(read_le_u32(bytes, 0x04)?),
            inode_table: BlockNumber(read_le_u32(bytes, 0x08)?),
            free_blocks_count: read_le_u16(bytes, 0x0C)?,
            free_inodes_count: read_le_u16(bytes, 0x0E)?,
            used_dirs_count: read_le_u16(bytes, 0x10)?,
        })
    }
}

/// Parsed 128-byte ext2 inode record.
///
/// A record with `mode == 0` is a free slot; decoding still yields it so
/// filtering stays a reporting-policy decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2Inode {
    pub mode: u16,
    pub uid: u16,
    pub size: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub gid: u16,
    pub links_count: u16,
    pub blocks: u32,
    pub flags: u32,
    pub osd1: u32,
    /// Direct/indirect block pointer array, kept opaque.
    pub block_pointers: Vec<u8>,
    pub generation: u32,
    pub file_acl: u32,
    pub dir_acl: u32,
    pub faddr: u32,
    pub osd2: [u8; 12],
}

impl Ext2Inode {
    /// Parse an inode from the first 128 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let window: [u8; EXT2_INODE_RECORD_SIZE] = read_fixed(bytes, 0)?;
        Ok(Self::from_record(&window))
    }

    /// Decode a full 128-byte record. Total: every bit pattern decodes.
    #[must_use]
    pub fn from_record(w: &[u8; EXT2_INODE_RECORD_SIZE]) -> Self {
        let le16 = |off: usize| u16::from_le_bytes([w[off], w[off + 1]]);
        let le32 = |off: usize| u32::from_le_bytes([w[off], w[off + 1], w[off + 2], w[off + 3]]);

        let mut osd2 = [0_u8; 12];
        osd2.copy_from_slice(&w[116..128]);

        Self {
            mode: le16(0),
            uid: le16(2),
            size: le32(4),
            atime: le32(8),
            ctime: le32(12),
            mtime: le32(16),
            dtime: le32(20),
            gid: le16(24),
            links_count: le16(26),
            blocks: le32(28),
            flags: le32(32),
            osd1: le32(36),
            block_pointers: w[40..100].to_vec(),
            generation: le32(100),
            file_acl: le32(104),
            dir_acl: le32(108),
            faddr: le32(112),
            osd2,
        }
    }

    /// A slot is in use iff its mode field is non-zero.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.mode != 0
    }

    /// File type classified from the mode's upper bits.
    #[must_use]
    pub fn file_kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }
}

/// A decoded view over one group's inode table bytes.
///
/// Construction verifies the buffer covers `count` slots; iteration then
/// decodes lazily, in ascending inode-number order (slot 0 = inode 1), and
/// can be restarted by calling [`records`](Self::records) again.
#[derive(Debug, Clone, Copy)]
pub struct InodeTable<'a> {
    bytes: &'a [u8],
    count: u32,
}

impl<'a> InodeTable<'a> {
    /// Validate that `bytes` holds `count` 128-byte slots.
    pub fn parse(bytes: &'a [u8], count: u32) -> Result<Self, ParseError> {
        let needed = (count as usize)
            .checked_mul(EXT2_INODE_RECORD_SIZE)
            .ok_or(ParseError::InvalidField {
                field: "inode_count",
                reason: "table size overflow",
            })?;
        if bytes.len() < needed {
            return Err(ParseError::InsufficientData {
                needed,
                offset: 0,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes, count })
    }

    /// Number of slots in the table.
    #[must_use]
    pub fn slot_count(&self) -> u32 {
        self.count
    }

    /// Decode the slot at `index`, if in range.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<Ext2Inode> {
        if index >= self.count {
            return None;
        }
        let start = index as usize * EXT2_INODE_RECORD_SIZE;
        let mut window = [0_u8; EXT2_INODE_RECORD_SIZE];
        window.copy_from_slice(&self.bytes[start..start + EXT2_INODE_RECORD_SIZE]);
        Some(Ext2Inode::from_record(&window))
    }

    /// Iterate `(inode_number, record)` pairs in ascending slot order.
    #[must_use]
    pub fn records(&self) -> InodeRecordIter<'a> {
        InodeRecordIter {
            table: *self,
            next: 0,
        }
    }
}

/// Iterator over the records of an [`InodeTable`].
#[derive(Debug, Clone)]
pub struct InodeRecordIter<'a> {
    table: InodeTable<'a>,
    next: u32,
}

impl Iterator for InodeRecordIter<'_> {
    type Item = (InodeNumber, Ext2Inode);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let record = self.table.get(index)?;
        self.next += 1;
        Some((InodeNumber::from_table_slot(index), record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.count.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for InodeRecordIter<'_> {}

// ── High-level image reader ─────────────────────────────────────────────────

/// Parsed context for reading ext2 structures out of an in-memory image.
///
/// Caches the superblock and the filesystem's byte offset within the image
/// so lookups compose without re-parsing. The device-backed equivalent
/// lives in `ino-core`; this slice-based reader exists so every stage can
/// be exercised against plain buffers.
#[derive(Debug, Clone)]
pub struct Ext2ImageReader {
    pub sb: Ext2Superblock,
    base: usize,
}

impl Ext2ImageReader {
    /// Parse the superblock of the filesystem starting at byte
    /// `partition_base` of `image`.
    pub fn new(image: &[u8], partition_base: ByteOffset) -> Result<Self, ParseError> {
        let base = u64_to_usize(partition_base.0, "partition_base")?;
        let sb_offset = base
            .checked_add(u64_to_usize(EXT2_SUPERBLOCK_OFFSET, "superblock_offset")?)
            .ok_or(ParseError::InvalidField {
                field: "partition_base",
                reason: "overflow",
            })?;
        let region = ensure_slice(image, sb_offset, EXT2_SUPERBLOCK_SIZE)?;
        let sb = Ext2Superblock::parse(region)?;
        Ok(Self { sb, base })
    }

    /// Absolute byte offset of a filesystem block within the image.
    fn block_offset(&self, block: BlockNumber) -> Result<usize, ParseError> {
        let relative = self
            .sb
            .block_size
            .block_to_byte(block)
            .ok_or(ParseError::InvalidField {
                field: "block_number",
                reason: "overflow computing block byte offset",
            })?;
        self.base
            .checked_add(u64_to_usize(relative.0, "block_offset")?)
            .ok_or(ParseError::InvalidField {
                field: "block_number",
                reason: "overflow computing block byte offset",
            })
    }

    /// Read and parse the descriptor for `group`.
    pub fn group_desc(&self, image: &[u8], group: GroupNumber) -> Result<Ext2GroupDesc, ParseError> {
        let relative = self
            .sb
            .group_desc_offset(group)
            .ok_or(ParseError::InvalidField {
                field: "group_desc_offset",
                reason: "overflow computing descriptor offset",
            })?;
        let offset = self
            .base
            .checked_add(u64_to_usize(relative.0, "group_desc_offset")?)
            .ok_or(ParseError::InvalidField {
                field: "group_desc_offset",
                reason: "overflow computing descriptor offset",
            })?;
        let window = ensure_slice(image, offset, EXT2_GROUP_DESC_SIZE)?;
        Ext2GroupDesc::parse(window)
    }

    /// Read one block's worth of inode bitmap.
    pub fn inode_bitmap(
        &self,
        image: &[u8],
        gd: &Ext2GroupDesc,
    ) -> Result<InodeBitmap, ParseError> {
        let offset = self.block_offset(gd.inode_bitmap)?;
        let block = ensure_slice(image, offset, self.sb.block_size.get() as usize)?;
        Ok(InodeBitmap::new(block.to_vec()))
    }

    /// View `count` inode-table slots starting at the group's table block.
    pub fn inode_table<'a>(
        &self,
        image: &'a [u8],
        gd: &Ext2GroupDesc,
        count: u32,
    ) -> Result<InodeTable<'a>, ParseError> {
        let offset = self.block_offset(gd.inode_table)?;
        let needed = (count as usize)
            .checked_mul(EXT2_INODE_RECORD_SIZE)
            .ok_or(ParseError::InvalidField {
                field: "inode_count",
                reason: "table size overflow",
            })?;
        let bytes = ensure_slice(image, offset, needed)?;
        InodeTable::parse(bytes, count)
    }
}
