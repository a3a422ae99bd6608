//! Ogawa container reader: byte source, groups and data blocks.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use memmap2::Mmap;
use parking_lot::RwLock;

use super::format::*;
use crate::util::{Error, Result};

/// Shared byte source for one open archive file.
pub struct IStreams {
    inner: StreamsInner,
    version: u16,
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    Mmap(Mmap),
    File(RwLock<File>),
}

impl IStreams {
    /// Open `path`, memory-mapping it when `use_mmap` is set.
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let mut header = [0u8; HEADER_SIZE];
        let inner = if use_mmap && cfg!(feature = "mmap") {
            // SAFETY: the map is read-only and dropped with the archive.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            header.copy_from_slice(&mmap[..HEADER_SIZE]);
            StreamsInner::Mmap(mmap)
        } else {
            let mut file = file;
            file.read_exact(&mut header)?;
            StreamsInner::File(RwLock::new(file))
        };

        let (version, frozen) = Self::parse_header(&header)?;
        tracing::trace!(path = %path.display(), version, frozen, size, "opened ogawa streams");
        Ok(Self { inner, version, frozen, size })
    }

    fn parse_header(data: &[u8]) -> Result<(u16, bool)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }
        if &data[..OGAWA_MAGIC.len()] != OGAWA_MAGIC {
            return Err(Error::InvalidMagic);
        }
        let frozen = data[FROZEN_OFFSET] == FROZEN_FLAG;
        let version = BigEndian::read_u16(&data[VERSION_OFFSET..VERSION_OFFSET + 2]);
        if version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version as i32));
        }
        Ok((version, frozen))
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    /// End of the byte range `pos..pos + len`, if it lies inside the file.
    pub fn checked_end(&self, pos: u64, len: u64) -> Result<u64> {
        match pos.checked_add(len) {
            Some(end) if end <= self.size => Ok(end),
            Some(end) => Err(Error::UnexpectedEof(end)),
            None => Err(Error::UnexpectedEof(u64::MAX)),
        }
    }

    /// Fill `buf` from absolute position `pos`.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let end = self.checked_end(pos, buf.len() as u64)?;
        match &self.inner {
            StreamsInner::Mmap(mmap) => {
                buf.copy_from_slice(&mmap[pos as usize..end as usize]);
            }
            StreamsInner::File(file) => {
                let mut f = file.write();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
            }
        }
        Ok(())
    }

    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        // sizes come from the file; check them before allocating
        self.checked_end(pos, len as u64)?;
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(LittleEndian::read_u64(&buf))
    }
}

/// An opened Ogawa container.
pub struct IArchive {
    streams: Arc<IStreams>,
    root: IGroup,
}

impl IArchive {
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let streams = Arc::new(IStreams::open(path, use_mmap)?);
        let root = IGroup::new(streams.clone(), streams.root_pos()?)?;
        Ok(Self { streams, root })
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.streams.is_frozen()
    }

    #[inline]
    pub fn root(&self) -> &IGroup {
        &self.root
    }

    #[inline]
    pub fn streams(&self) -> &Arc<IStreams> {
        &self.streams
    }
}

/// A group: an ordered list of child groups and data blocks.
#[derive(Clone)]
pub struct IGroup {
    streams: Arc<IStreams>,
    pos: u64,
    child_offsets: Arc<[u64]>,
}

impl IGroup {
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let child_offsets: Arc<[u64]> = if pos == 0 {
            Arc::from(Vec::new())
        } else {
            let count = streams.read_u64(pos)?;
            if count.saturating_mul(8) > streams.size() {
                return Err(Error::invalid(format!("group at {pos} claims {count} children")));
            }
            let raw = streams.read_bytes(pos + 8, count as usize * 8)?;
            raw.chunks_exact(8).map(LittleEndian::read_u64).collect()
        };
        Ok(Self { streams, pos, child_offsets })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn num_children(&self) -> u64 {
        self.child_offsets.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.child_offsets.is_empty()
    }

    /// Raw child offset including the type flag.
    pub fn child_offset(&self, index: u64) -> Result<u64> {
        self.child_offsets
            .get(index as usize)
            .copied()
            .ok_or(Error::ChildOutOfBounds {
                index: index as usize,
                count: self.child_offsets.len(),
            })
    }

    pub fn is_child_group(&self, index: u64) -> Result<bool> {
        Ok(is_group_offset(self.child_offset(index)?))
    }

    pub fn is_child_data(&self, index: u64) -> Result<bool> {
        Ok(is_data_offset(self.child_offset(index)?))
    }

    pub fn group(&self, index: u64) -> Result<IGroup> {
        let offset = self.child_offset(index)?;
        if !is_group_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "group".into(),
                actual: "data".into(),
            });
        }
        IGroup::new(self.streams.clone(), extract_offset(offset))
    }

    pub fn data(&self, index: u64) -> Result<IData> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "data".into(),
                actual: "group".into(),
            });
        }
        IData::new(self.streams.clone(), extract_offset(offset))
    }
}

/// A sized run of bytes.
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
}

impl IData {
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let size = if pos == 0 { 0 } else { streams.read_u64(pos)? };
        if size > 0 {
            streams.checked_end(pos + 8, size)?;
        }
        Ok(Self { streams, pos, size })
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.streams.read_bytes(self.pos + 8, self.size as usize)
    }

    /// Read as UTF-8, stopping at the first NUL.
    pub fn read_string(&self) -> Result<String> {
        let mut bytes = self.read_all()?;
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(nul);
        }
        Ok(String::from_utf8(bytes)?)
    }

    /// Read a little-endian i32 payload.
    pub fn read_i32(&self) -> Result<i32> {
        let bytes = self.read_all()?;
        if bytes.len() < 4 {
            return Err(Error::invalid("expected 4-byte integer block"));
        }
        Ok(LittleEndian::read_i32(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parsing() {
        let mut header = [0u8; HEADER_SIZE];
        header[..5].copy_from_slice(OGAWA_MAGIC);
        header[FROZEN_OFFSET] = FROZEN_FLAG;
        header[VERSION_OFFSET + 1] = 1;

        let (version, frozen) = IStreams::parse_header(&header).expect("valid header");
        assert_eq!(version, 1);
        assert!(frozen);
    }

    #[test]
    fn test_oversized_block_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oversized.abc");
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[..5].copy_from_slice(OGAWA_MAGIC);
        bytes[FROZEN_OFFSET] = FROZEN_FLAG;
        bytes[VERSION_OFFSET + 1] = 1;
        // a data block whose size runs far past the end of the file
        bytes.extend_from_slice(&(u64::MAX / 4).to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        for use_mmap in [false, true] {
            let streams = Arc::new(IStreams::open(&path, use_mmap).unwrap());
            assert!(matches!(
                IData::new(streams.clone(), HEADER_SIZE as u64),
                Err(Error::UnexpectedEof(_))
            ));
            assert!(matches!(
                streams.read_bytes(HEADER_SIZE as u64, usize::MAX / 4),
                Err(Error::UnexpectedEof(_))
            ));
            assert!(streams.checked_end(u64::MAX, 1).is_err());
        }
    }

    #[test]
    fn test_invalid_magic() {
        let header = [0u8; HEADER_SIZE];
        assert!(matches!(IStreams::parse_header(&header), Err(Error::InvalidMagic)));
    }
}
