#![forbid(unsafe_code)]
//! Adversarial inputs for the pure parsers.
//!
//! Every parser must reject malformed input with a `ParseError` — never
//! panic, never return partial data. The samples are generated inline:
//! truncations at every interesting length, hostile field values, and
//! patterned byte fills through every entry point.

use ino_ondisk::{Ext2GroupDesc, Ext2ImageReader, Ext2Inode, Ext2Superblock, InodeTable};
use ino_types::{ByteOffset, EXT2_SUPER_MAGIC, EXT2_SUPERBLOCK_SIZE, GroupNumber, ParseError};
use std::panic::{AssertUnwindSafe, catch_unwind};

fn valid_superblock() -> Vec<u8> {
    let mut region = vec![0_u8; EXT2_SUPERBLOCK_SIZE];
    region[0x38..0x3A].copy_from_slice(&EXT2_SUPER_MAGIC.to_le_bytes());
    region
}

#[test]
fn superblock_rejects_every_truncation() {
    let region = valid_superblock();
    for len in [0, 1, 55, 56, 58, 512, 1023] {
        let result = Ext2Superblock::parse(&region[..len]);
        assert!(
            matches!(result, Err(ParseError::InsufficientData { .. })),
            "length {len} should be insufficient"
        );
    }
    assert!(Ext2Superblock::parse(&region).is_ok());
}

#[test]
fn superblock_rejects_hostile_magic_values() {
    for magic in [0_u16, 0xEF52, 0xEF54, 0x53EF, 0xFFFF] {
        let mut region = valid_superblock();
        region[0x38..0x3A].copy_from_slice(&magic.to_le_bytes());
        assert_eq!(
            Ext2Superblock::parse(&region),
            Err(ParseError::InvalidMagic {
                expected: EXT2_SUPER_MAGIC,
                actual: magic,
            })
        );
    }
}

#[test]
fn superblock_rejects_hostile_block_size_shifts() {
    for log in [7_u32, 22, 0xFFFF_FFFF] {
        let mut region = valid_superblock();
        region[0x18..0x1C].copy_from_slice(&log.to_le_bytes());
        assert!(
            Ext2Superblock::parse(&region).is_err(),
            "log_block_size {log:#x} should be rejected"
        );
    }
}

#[test]
fn group_desc_rejects_every_truncation() {
    let window = [0_u8; 32];
    for len in 0..32 {
        assert!(
            Ext2GroupDesc::parse(&window[..len]).is_err(),
            "length {len} should be insufficient"
        );
    }
    assert!(Ext2GroupDesc::parse(&window).is_ok());
}

#[test]
fn inode_parse_rejects_short_records() {
    let record = [0_u8; 128];
    for len in [0, 1, 64, 127] {
        assert!(Ext2Inode::parse(&record[..len]).is_err());
    }
    assert!(Ext2Inode::parse(&record).is_ok());
}

#[test]
fn inode_table_rejects_hostile_counts() {
    let bytes = vec![0_u8; 1024];
    // Buffer too small for the requested count.
    assert!(InodeTable::parse(&bytes, 9).is_err());
    // Absurd count, far past any buffer.
    assert!(InodeTable::parse(&bytes, u32::MAX).is_err());
    // Exact fit parses.
    assert!(InodeTable::parse(&bytes, 8).is_ok());
}

#[test]
fn image_reader_survives_patterned_garbage() {
    let patterns: [(&str, Box<dyn Fn(usize) -> u8>); 4] = [
        ("zeros", Box::new(|_| 0x00)),
        ("ones", Box::new(|_| 0xFF)),
        ("alternating", Box::new(|i| if i % 2 == 0 { 0xAA } else { 0x55 })),
        ("ramp", Box::new(|i| (i % 251) as u8)),
    ];

    for (name, fill) in &patterns {
        for len in [0_usize, 100, 1024, 2048, 4096, 16 * 1024] {
            let image: Vec<u8> = (0..len).map(fill).collect();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let reader = Ext2ImageReader::new(&image, ByteOffset::ZERO)?;
                let gd = reader.group_desc(&image, GroupNumber(0))?;
                let _ = reader.inode_bitmap(&image, &gd)?;
                let table = reader.inode_table(&image, &gd, reader.sb.table_slot_count())?;
                let _ = table.records().count();
                Ok::<_, ParseError>(())
            }));
            assert!(
                outcome.is_ok(),
                "parser panicked on pattern {name} at length {len}"
            );
        }
    }
}

#[test]
fn out_of_range_references_fail_per_stage() {
    // A structurally valid filesystem whose descriptor points everything
    // past the end of the image.
    let mut image = vec![0_u8; 8 * 1024];
    image[1024..2048].copy_from_slice(&valid_superblock());
    image[1024] = 4; // inodes_count
    image[1024 + 0x28] = 4; // inodes_per_group
    let gdt = 2048;
    image[gdt + 0x04..gdt + 0x08].copy_from_slice(&5000_u32.to_le_bytes()); // bitmap
    image[gdt + 0x08..gdt + 0x0C].copy_from_slice(&6000_u32.to_le_bytes()); // table

    let reader = Ext2ImageReader::new(&image, ByteOffset::ZERO).expect("superblock");
    let gd = reader.group_desc(&image, GroupNumber(0)).expect("descriptor");

    // Each downstream stage fails on its own reference without poisoning
    // the others.
    assert!(reader.inode_bitmap(&image, &gd).is_err());
    assert!(reader.inode_table(&image, &gd, 4).is_err());
    assert!(reader.group_desc(&image, GroupNumber(0)).is_ok());
}
