//! Ogawa container constants and child offset encoding.

/// Magic bytes at the start of an Ogawa file.
pub const OGAWA_MAGIC: &[u8; 5] = b"Ogawa";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

pub const FROZEN_OFFSET: usize = 5;
pub const VERSION_OFFSET: usize = 6;
pub const ROOT_POS_OFFSET: usize = 8;

/// Container format version, stored big-endian.
pub const CURRENT_VERSION: u16 = 1;

/// Written once the root position is final.
pub const FROZEN_FLAG: u8 = 0xFF;
pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// MSB of a child offset: set for data blocks, clear for groups.
pub const TYPE_FLAG_MASK: u64 = 1 << 63;
pub const OFFSET_MASK: u64 = !TYPE_FLAG_MASK;

/// Zero-length data child.
pub const EMPTY_DATA: u64 = TYPE_FLAG_MASK;

/// Childless group.
pub const EMPTY_GROUP: u64 = 0;

/// Alembic-level file version written in root child 0.
pub const ALEMBIC_FILE_VERSION: i32 = 0;

/// Library version written in root child 1 (1.8.10).
pub const ALEMBIC_LIBRARY_VERSION: i32 = 10810;

/// Oldest library version accepted on read.
pub const MIN_ALEMBIC_VERSION: i32 = 9999;

/// Trailing hash bytes at the end of an object-headers block.
pub const OBJECT_HASH_SIZE: usize = 32;

/// Sample content key prefix on every sample data block.
pub const SAMPLE_KEY_SIZE: usize = 16;

/// Metadata index meaning "stored inline".
pub const INLINE_METADATA: u8 = 0xff;

/// Largest indexed metadata table (plus the implicit empty entry).
pub const MAX_INDEXED_METADATA: usize = 254;

/// Longest metadata string that may go into the index table.
pub const MAX_INDEXED_METADATA_LEN: usize = 255;

#[inline]
pub const fn is_group_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) == 0
}

#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) != 0
}

/// Strip the type flag.
#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

#[inline]
pub const fn make_group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | TYPE_FLAG_MASK
}

/// Position 0 marks an empty group or empty data.
#[inline]
pub const fn is_empty_offset(offset: u64) -> bool {
    extract_offset(offset) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let group = make_group_offset(0x1234);
        assert!(is_group_offset(group));
        assert_eq!(group, 0x1234);

        let data = make_data_offset(0x5678);
        assert!(is_data_offset(data));
        assert_eq!(extract_offset(data), 0x5678);
        assert_eq!(data, 0x8000_0000_0000_5678);
    }

    #[test]
    fn test_empty_offset() {
        assert!(is_empty_offset(EMPTY_GROUP));
        assert!(is_empty_offset(EMPTY_DATA));
        assert!(!is_empty_offset(0x100));
    }
}
