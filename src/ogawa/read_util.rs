//! Parsing of the Alembic tables stored in Ogawa data blocks.

use byteorder::{ByteOrder, LittleEndian};

use super::format::{INLINE_METADATA, OBJECT_HASH_SIZE};
use super::IData;
use crate::core::{MetaData, ObjectHeader, PropertyHeader, PropertyType, TimeSampling};
use crate::util::{DataType, Error, PlainOldDataType, Result};

/// Bounds-checked little-endian cursor over a block.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, pos: 0, what }
    }

    fn has_more(&self) -> bool {
        self.pos < self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        let Some(end) = end else {
            return Err(Error::invalid(format!("{} truncated at byte {}", self.what, self.pos)));
        };
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// u8, u16 or u32 depending on the header size hint.
    fn hinted(&mut self, hint: u32) -> Result<u32> {
        match hint {
            0 => self.u8().map(u32::from),
            1 => Ok(LittleEndian::read_u16(self.take(2)?) as u32),
            2 => self.u32(),
            _ => Err(Error::invalid(format!("bad size hint {hint}"))),
        }
    }

    fn string(&mut self, len: usize) -> Result<String> {
        Ok(String::from_utf8(self.take(len)?.to_vec())?)
    }
}

/// Time samplings and their max sample counts, in archive index order.
pub fn read_time_samplings(data: &IData) -> Result<(Vec<TimeSampling>, Vec<u32>)> {
    let buf = data.read_all()?;
    let mut cur = Cursor::new(&buf, "time sampling table");
    let mut samplings = Vec::new();
    let mut max_samples = Vec::new();

    while cur.has_more() {
        max_samples.push(cur.u32()?);
        let tpc = cur.f64()?;
        let count = cur.u32()? as usize;
        if count == 0 {
            return Err(Error::invalid("time sampling without stored times"));
        }
        let times = (0..count).map(|_| cur.f64()).collect::<Result<Vec<_>>>()?;
        samplings.push(TimeSampling::from_stored(tpc, times));
    }
    Ok((samplings, max_samples))
}

/// The indexed metadata table. Entry 0 is always the empty metadata.
pub fn read_indexed_metadata(data: &IData) -> Result<Vec<MetaData>> {
    let buf = data.read_all()?;
    let mut cur = Cursor::new(&buf, "indexed metadata");
    let mut table = vec![MetaData::new()];
    while cur.has_more() {
        let len = cur.u8()? as usize;
        table.push(MetaData::parse(&cur.string(len)?));
    }
    Ok(table)
}

fn lookup_metadata(indexed: &[MetaData], index: usize) -> Result<MetaData> {
    indexed
        .get(index)
        .cloned()
        .ok_or_else(|| Error::invalid(format!("metadata index {index} out of range")))
}

/// Child object headers of an object group.
pub fn read_object_headers(
    data: &IData,
    parent_path: &str,
    indexed: &[MetaData],
) -> Result<Vec<ObjectHeader>> {
    let buf = data.read_all()?;
    if buf.len() <= OBJECT_HASH_SIZE {
        return Ok(Vec::new());
    }
    let mut cur = Cursor::new(&buf[..buf.len() - OBJECT_HASH_SIZE], "object headers");
    let mut headers = Vec::new();

    while cur.has_more() {
        let name_len = cur.u32()? as usize;
        let name = cur.string(name_len)?;
        let meta_index = cur.u8()?;
        let meta_data = if meta_index == INLINE_METADATA {
            let len = cur.u32()? as usize;
            MetaData::parse(&cur.string(len)?)
        } else {
            lookup_metadata(indexed, meta_index as usize)?
        };
        let full_name = match parent_path {
            "" | "/" => format!("/{name}"),
            parent => format!("{parent}/{name}"),
        };
        headers.push(ObjectHeader::new(name, full_name, meta_data));
    }
    Ok(headers)
}

/// Sub-property headers of a compound property group.
pub fn read_property_headers(data: &IData, indexed: &[MetaData]) -> Result<Vec<PropertyHeader>> {
    let buf = data.read_all()?;
    let mut cur = Cursor::new(&buf, "property headers");
    let mut headers = Vec::new();

    while cur.has_more() {
        let info = cur.u32()?;
        let hint = (info >> 2) & 0x3;
        let mut header = match info & 0x3 {
            0 => PropertyHeader::compound(""),
            kind => {
                let pod = PlainOldDataType::from_u8(((info >> 4) & 0xf) as u8);
                if pod == PlainOldDataType::Unknown {
                    return Err(Error::invalid(format!("unknown POD code in {info:#x}")));
                }
                let data_type = DataType::new(pod, ((info >> 12) & 0xff) as u8);
                let mut h = if kind == 1 {
                    PropertyHeader::scalar("", data_type)
                } else {
                    PropertyHeader::array("", data_type)
                };
                h.is_scalar_like = kind == 3;
                h.is_homogenous = info & 0x400 != 0;
                h.num_samples = cur.hinted(hint)?;
                (h.first_changed_index, h.last_changed_index) = if info & 0x200 != 0 {
                    (cur.hinted(hint)?, cur.hinted(hint)?)
                } else if info & 0x800 != 0 {
                    (0, 0)
                } else {
                    (1, h.num_samples.saturating_sub(1))
                };
                if info & 0x100 != 0 {
                    h.time_sampling_index = cur.hinted(hint)?;
                }
                h
            }
        };

        let name_len = cur.hinted(hint)? as usize;
        header.name = cur.string(name_len)?;
        let meta_index = ((info >> 20) & 0xff) as u8;
        header.meta_data = if meta_index == INLINE_METADATA {
            let len = cur.hinted(hint)? as usize;
            MetaData::parse(&cur.string(len)?)
        } else {
            lookup_metadata(indexed, meta_index as usize)?
        };
        if header.property_type != PropertyType::Compound && header.name.is_empty() {
            return Err(Error::invalid("property header without a name"));
        }
        headers.push(header);
    }
    Ok(headers)
}
