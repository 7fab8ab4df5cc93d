#![forbid(unsafe_code)]
//! Inspection pipeline: open a device, decode the metadata chain, collect a
//! report.
//!
//! The stages run in dependency order — superblock, group descriptor, inode
//! bitmap, inode table — each a read at an absolute offset followed by a
//! pure parse. Structural failures abort the inspection; bitmap problems
//! and per-record disagreements are isolated as report issues so a damaged
//! image still yields maximal visibility.

pub mod report;

pub use report::{ConsistencyIssue, InodeSlot, InspectReport, render_report};

use ino_block::{ByteDevice, FileByteDevice, read_superblock_region};
use ino_error::{InspectError, Result};
use ino_ondisk::{Ext2GroupDesc, Ext2Superblock, InodeBitmap, InodeTable};
use ino_types::{
    BlockNumber, BlockSize, ByteOffset, EXT2_GROUP_DESC_SIZE, EXT2_INODE_RECORD_SIZE,
    EXT2_SUPERBLOCK_OFFSET, GroupNumber, ParseError, SectorNumber,
};
use std::path::Path;
use tracing::{debug, warn};

/// Deployment constants for one inspection, passed into every decoder.
///
/// The partition offset and block size are properties of how the image was
/// produced, not self-describing values, so they arrive here as data. The
/// library defaults are neutral (offset 0, superblock-described block
/// size); the CLI layers its deployment defaults on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectConfig {
    /// Sector at which the filesystem instance starts within the image.
    pub partition_offset_sectors: SectorNumber,
    /// Override for the block size, for images whose superblock is not
    /// trustworthy. `None` uses the superblock's own `s_log_block_size`.
    pub block_size_override: Option<BlockSize>,
    /// Block group to inspect.
    pub group_index: GroupNumber,
    /// Upper bound on decoded inode slots, on top of the superblock's
    /// per-group count.
    pub inode_limit: Option<u32>,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            partition_offset_sectors: SectorNumber(0),
            block_size_override: None,
            group_index: GroupNumber(0),
            inode_limit: None,
        }
    }
}

impl InspectConfig {
    /// Byte offset of the filesystem start within the image.
    fn partition_base(&self) -> Result<ByteOffset> {
        self.partition_offset_sectors
            .to_byte_offset()
            .ok_or_else(|| {
                InspectError::Parse("partition offset overflows byte addressing".to_owned())
            })
    }
}

/// Map a device-level short read into a structural truncation error.
fn short_read_as_truncated(err: InspectError, structure: &'static str) -> InspectError {
    match err {
        InspectError::ShortRead {
            offset, requested, ..
        } => InspectError::TruncatedImage {
            structure,
            offset,
            needed: requested,
        },
        other => other,
    }
}

/// Map superblock parse failures onto the user-facing taxonomy.
fn superblock_parse_error(err: ParseError, offset: u64) -> InspectError {
    match err {
        ParseError::InvalidMagic { actual, .. } => InspectError::NotAFilesystem { magic: actual },
        ParseError::InsufficientData { needed, .. } => InspectError::TruncatedImage {
            structure: "superblock",
            offset,
            needed,
        },
        other => InspectError::Parse(other.to_string()),
    }
}

/// Resolve a block reference to an absolute byte offset, verifying that
/// `len` bytes starting there lie within the device.
fn resolve_block(
    dev: &dyn ByteDevice,
    base: ByteOffset,
    block_size: BlockSize,
    block: BlockNumber,
    len: u64,
) -> Result<ByteOffset> {
    let out_of_range = |resolved: u64| InspectError::OutOfRangeBlockReference {
        block: u64::from(block.0),
        resolved,
        image_len: dev.len_bytes(),
    };

    let relative = block_size
        .block_to_byte(block)
        .ok_or_else(|| out_of_range(u64::MAX))?;
    let resolved = base
        .checked_add(relative.0)
        .ok_or_else(|| out_of_range(u64::MAX))?;
    let end = resolved
        .checked_add(len)
        .ok_or_else(|| out_of_range(resolved.0))?;
    if end.0 > dev.len_bytes() {
        return Err(out_of_range(resolved.0));
    }
    Ok(resolved)
}

/// Read and decode the superblock of the filesystem at the configured
/// partition offset.
pub fn read_superblock(dev: &dyn ByteDevice, config: &InspectConfig) -> Result<Ext2Superblock> {
    let base = config.partition_base()?;
    let region = read_superblock_region(dev, base)
        .map_err(|err| short_read_as_truncated(err, "superblock"))?;
    let sb = Ext2Superblock::parse(&region)
        .map_err(|err| superblock_parse_error(err, base.0 + EXT2_SUPERBLOCK_OFFSET))?;
    debug!(
        inodes = sb.inodes_count,
        blocks = sb.blocks_count,
        block_size = %sb.block_size,
        volume = %sb.volume_name,
        "decoded superblock"
    );
    Ok(sb)
}

/// Read and decode the descriptor for the configured block group.
pub fn read_group_desc(
    dev: &dyn ByteDevice,
    config: &InspectConfig,
    block_size: BlockSize,
) -> Result<Ext2GroupDesc> {
    let base = config.partition_base()?;
    let relative = ino_ondisk::group_desc_offset(block_size, config.group_index).ok_or_else(
        || InspectError::Parse("group descriptor offset overflows byte addressing".to_owned()),
    )?;
    let offset = base.checked_add(relative.0).ok_or_else(|| {
        InspectError::Parse("group descriptor offset overflows byte addressing".to_owned())
    })?;

    let window = dev
        .read_vec_at(offset, EXT2_GROUP_DESC_SIZE)
        .map_err(|err| short_read_as_truncated(err, "group descriptor"))?;
    let gd = Ext2GroupDesc::parse(&window).map_err(|err| InspectError::Parse(err.to_string()))?;
    debug!(
        group = %config.group_index,
        inode_bitmap = %gd.inode_bitmap,
        inode_table = %gd.inode_table,
        "decoded group descriptor"
    );
    Ok(gd)
}

/// Read one block's worth of inode bitmap for a group.
pub fn read_inode_bitmap(
    dev: &dyn ByteDevice,
    config: &InspectConfig,
    block_size: BlockSize,
    bitmap_block: BlockNumber,
) -> Result<InodeBitmap> {
    let base = config.partition_base()?;
    let len = u64::from(block_size.get());
    let offset = resolve_block(dev, base, block_size, bitmap_block, len)?;
    let bytes = dev.read_vec_at(offset, block_size.get() as usize)?;
    Ok(InodeBitmap::new(bytes))
}

/// Read `count` inode-table slots for a group into an owned buffer.
pub fn read_inode_table(
    dev: &dyn ByteDevice,
    config: &InspectConfig,
    block_size: BlockSize,
    table_block: BlockNumber,
    count: u32,
) -> Result<Vec<u8>> {
    let base = config.partition_base()?;
    let needed = (count as usize)
        .checked_mul(EXT2_INODE_RECORD_SIZE)
        .ok_or_else(|| InspectError::Parse("inode table size overflows usize".to_owned()))?;
    let offset = resolve_block(dev, base, block_size, table_block, 0)?;
    let available = dev.len_bytes().saturating_sub(offset.0);
    if available < needed as u64 {
        return Err(InspectError::TruncatedTable {
            offset: offset.0,
            needed,
            available,
        });
    }
    dev.read_vec_at(offset, needed)
}

/// Run the full inspection pipeline against a device.
pub fn inspect_device(dev: &dyn ByteDevice, config: &InspectConfig) -> Result<InspectReport> {
    let sb = read_superblock(dev, config)?;
    let mut issues = Vec::new();

    let block_size = config.block_size_override.unwrap_or(sb.block_size);
    if let Some(override_bs) = config.block_size_override {
        if override_bs != sb.block_size {
            warn!(
                configured = %override_bs,
                superblock = %sb.block_size,
                "block size override differs from superblock"
            );
        }
    }
    if sb.rev_level >= 1 && sb.inode_size != 0 && usize::from(sb.inode_size) != EXT2_INODE_RECORD_SIZE
    {
        warn!(inode_size = sb.inode_size, "superblock declares a non-128-byte inode size; decoding 128-byte records");
        issues.push(ConsistencyIssue::UnexpectedInodeSize {
            inode_size: sb.inode_size,
        });
    }

    let gd = read_group_desc(dev, config, block_size)?;

    // The bitmap is optional for the rest of the pipeline: keep going
    // without it and record why.
    let bitmap = match read_inode_bitmap(dev, config, block_size, gd.inode_bitmap) {
        Ok(bitmap) => Some(bitmap),
        Err(err) => {
            warn!(block = %gd.inode_bitmap, error = %err, "inode bitmap unavailable");
            issues.push(ConsistencyIssue::BitmapUnavailable {
                detail: err.to_string(),
            });
            None
        }
    };

    let mut count = sb.table_slot_count();
    if let Some(limit) = config.inode_limit {
        count = count.min(limit);
    }
    if count == 0 {
        warn!("superblock describes zero inode slots for this group");
    }

    let table_bytes = read_inode_table(dev, config, block_size, gd.inode_table, count)?;
    let table = InodeTable::parse(&table_bytes, count)
        .map_err(|err| InspectError::Parse(err.to_string()))?;

    let records: Vec<InodeSlot> = table
        .records()
        .map(|(ino, record)| InodeSlot { ino, record })
        .collect();
    debug!(slots = records.len(), "decoded inode table");

    // Cross-check the two allocation signals: bitmap bit vs mode != 0.
    if let Some(bitmap) = &bitmap {
        for slot in &records {
            let allocated = bitmap.is_allocated(slot.ino);
            if allocated != slot.record.is_in_use() {
                warn!(
                    ino = %slot.ino,
                    bitmap_allocated = allocated,
                    mode = slot.record.mode,
                    "bitmap and inode mode disagree"
                );
                issues.push(ConsistencyIssue::AllocationMismatch {
                    ino: slot.ino,
                    bitmap_allocated: allocated,
                    mode: slot.record.mode,
                });
            }
        }
    }

    Ok(InspectReport {
        group: config.group_index,
        superblock: sb,
        descriptor: gd,
        records,
        issues,
    })
}

/// Open the image at `path` and run the inspection pipeline.
///
/// The file handle is owned by the device for the duration of the call and
/// released on every exit path.
pub fn inspect_path(path: impl AsRef<Path>, config: &InspectConfig) -> Result<InspectReport> {
    let dev = FileByteDevice::open(path)?;
    inspect_device(&dev, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ino_block::MemByteDevice;
    use ino_types::{EXT2_SUPER_MAGIC, InodeNumber};

    const BLOCK: usize = 1024;

    fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
        buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// 1K-block image with `inode_count` slots, bitmap at block 4, table at
    /// block 5. Returns the raw image; the filesystem starts at
    /// `base_sectors * 512`.
    fn build_image(base_sectors: u64, inode_count: u32) -> Vec<u8> {
        let base = base_sectors as usize * 512;
        let mut image = vec![0_u8; base + BLOCK * 16];

        let sb = base + 1024;
        write_u32(&mut image[sb..sb + 1024], 0x00, inode_count);
        write_u32(&mut image[sb..sb + 1024], 0x28, inode_count);
        write_u16(&mut image[sb..sb + 1024], 0x38, EXT2_SUPER_MAGIC);

        let gdt = base + 2048;
        write_u32(&mut image[gdt..gdt + 32], 0x04, 4);
        write_u32(&mut image[gdt..gdt + 32], 0x08, 5);

        image
    }

    fn mark_allocated(image: &mut [u8], base_sectors: u64, ino: u32) {
        let base = base_sectors as usize * 512;
        let bit = ino - 1;
        image[base + 4 * BLOCK + bit as usize / 8] |= 1 << (bit % 8);
    }

    fn write_inode(image: &mut [u8], base_sectors: u64, ino: u32, mode: u16, size: u32) {
        let base = base_sectors as usize * 512;
        let slot = base + 5 * BLOCK + (ino as usize - 1) * 128;
        write_u16(&mut image[slot..slot + 128], 0, mode);
        write_u32(&mut image[slot..slot + 128], 4, size);
    }

    #[test]
    fn pipeline_decodes_group_zero() {
        let mut image = build_image(0, 4);
        mark_allocated(&mut image, 0, 2);
        write_inode(&mut image, 0, 2, 0o040_755, 1024);

        let dev = MemByteDevice::new(image);
        let report = inspect_device(&dev, &InspectConfig::default()).expect("inspect");

        assert_eq!(report.superblock.inodes_count, 4);
        assert_eq!(report.descriptor.inode_table, BlockNumber(5));
        assert_eq!(report.records.len(), 4);
        assert_eq!(report.records[1].ino, InodeNumber(2));
        assert_eq!(report.records[1].record.mode, 0o040_755);
        assert!(report.issues.is_empty());
        assert_eq!(report.in_use_count(), 1);
    }

    #[test]
    fn pipeline_honors_partition_offset() {
        let base_sectors = 2050;
        let mut image = build_image(base_sectors, 2);
        mark_allocated(&mut image, base_sectors, 1);
        write_inode(&mut image, base_sectors, 1, 0x81A4, 4096);

        let dev = MemByteDevice::new(image);
        let config = InspectConfig {
            partition_offset_sectors: SectorNumber(base_sectors),
            ..InspectConfig::default()
        };
        let report = inspect_device(&dev, &config).expect("inspect");
        assert_eq!(report.records[0].record.mode, 0x81A4);
        assert_eq!(report.records[0].record.size, 4096);
    }

    #[test]
    fn bad_magic_is_not_a_filesystem() {
        let mut image = build_image(0, 2);
        let sb = 1024;
        write_u16(&mut image[sb..sb + 1024], 0x38, 0x1234);

        let dev = MemByteDevice::new(image);
        let err = inspect_device(&dev, &InspectConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            InspectError::NotAFilesystem { magic: 0x1234 }
        ));
    }

    #[test]
    fn short_image_is_truncated_superblock() {
        let dev = MemByteDevice::new(vec![0_u8; 1500]);
        let err = inspect_device(&dev, &InspectConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            InspectError::TruncatedImage {
                structure: "superblock",
                ..
            }
        ));
    }

    #[test]
    fn unreadable_bitmap_is_isolated() {
        let mut image = build_image(0, 2);
        let gdt = 2048;
        write_u32(&mut image[gdt..gdt + 32], 0x04, 9000); // bitmap out of range

        let dev = MemByteDevice::new(image);
        let report = inspect_device(&dev, &InspectConfig::default()).expect("inspect");
        assert_eq!(report.records.len(), 2);
        assert!(matches!(
            report.issues.as_slice(),
            [ConsistencyIssue::BitmapUnavailable { .. }]
        ));
    }

    #[test]
    fn out_of_range_table_is_fatal() {
        let mut image = build_image(0, 2);
        let gdt = 2048;
        write_u32(&mut image[gdt..gdt + 32], 0x08, 9000);

        let dev = MemByteDevice::new(image);
        let err = inspect_device(&dev, &InspectConfig::default()).unwrap_err();
        assert!(matches!(err, InspectError::OutOfRangeBlockReference { block: 9000, .. }));
    }

    #[test]
    fn overrunning_table_is_truncated_table() {
        // Table block is in range, but count * 128 runs past the image end.
        let mut image = build_image(0, 200);
        let gdt = 2048;
        write_u32(&mut image[gdt..gdt + 32], 0x08, 15); // last block

        let dev = MemByteDevice::new(image);
        let err = inspect_device(&dev, &InspectConfig::default()).unwrap_err();
        assert!(matches!(err, InspectError::TruncatedTable { .. }));
    }

    #[test]
    fn allocation_mismatch_is_reported() {
        let mut image = build_image(0, 3);
        // Inode 1: bitmap says allocated, mode says free.
        mark_allocated(&mut image, 0, 1);
        // Inode 2: bitmap says free, mode says in use.
        write_inode(&mut image, 0, 2, 0x81A4, 0);

        let dev = MemByteDevice::new(image);
        let report = inspect_device(&dev, &InspectConfig::default()).expect("inspect");

        assert_eq!(report.issues.len(), 2);
        assert!(matches!(
            report.issues[0],
            ConsistencyIssue::AllocationMismatch {
                ino: InodeNumber(1),
                bitmap_allocated: true,
                mode: 0,
            }
        ));
        assert!(matches!(
            report.issues[1],
            ConsistencyIssue::AllocationMismatch {
                ino: InodeNumber(2),
                bitmap_allocated: false,
                mode: 0x81A4,
            }
        ));
    }

    #[test]
    fn inode_limit_caps_decoded_slots() {
        let mut image = build_image(0, 6);
        write_inode(&mut image, 0, 1, 0x81A4, 10);

        let dev = MemByteDevice::new(image);
        let config = InspectConfig {
            inode_limit: Some(2),
            ..InspectConfig::default()
        };
        let report = inspect_device(&dev, &config).expect("inspect");
        assert_eq!(report.records.len(), 2);
    }

    #[test]
    fn nonstandard_inode_size_is_flagged() {
        let mut image = build_image(0, 2);
        let sb = 1024;
        write_u32(&mut image[sb..sb + 1024], 0x4C, 1); // rev_level = 1
        write_u16(&mut image[sb..sb + 1024], 0x58, 256); // inode_size = 256

        let dev = MemByteDevice::new(image);
        let report = inspect_device(&dev, &InspectConfig::default()).expect("inspect");
        assert!(report
            .issues
            .iter()
            .any(|issue| matches!(issue, ConsistencyIssue::UnexpectedInodeSize { inode_size: 256 })));
    }
}
