//! Disk-resident open-hash index.
//!
//! Region layout:
//!
//! ```text
//! u32 table_size
//! i32 data_bytes                  bytes that follow this header
//! table_size x bucket             12 bytes each
//! key remainders                  u16 units, keys of length > 1 only
//! id arrays                       i32 count + count x u32
//! ```
//!
//! A bucket is `u16 key_len` (0 = empty), `u16 first_unit`, `u32 key_ptr` and
//! `u32 value_ref`. `key_ptr` points at the `key_len - 1` units following the
//! first one. A `value_ref` with the high bit clear is the only ID of the key;
//! with the high bit set the low bits are the offset of an ID array. All
//! offsets are relative to the first bucket.
//!
//! Keys are placed at `key_hash(key) % table_size` and collisions probe linearly
//! with wraparound. The table is kept at most 72% full.

use std::fmt::Debug;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::error::{JitenError, Result};
use crate::index::accumulator::{FrozenEntries, KeyAccumulator, normalize_key};
use crate::index::{
    Index, IndexBackend, KeyNormalizer, MatchMode, RegionReader, RegionSource, RegionWriter,
    not_searchable, remap_ids,
};
use crate::set::{IdStream, insert_sorted, union};
use crate::util::{key_hash_utf16, table_size_for};

const BUCKET_LEN: usize = 12;
const HEADER_LEN: u64 = 8;
const ARRAY_FLAG: u32 = 0x8000_0000;
const OFFSET_MASK: u32 = 0x7FFF_FFFF;

/// Seekable input a table is probed through.
trait RegionInput: Read + Seek + Send + Debug {}

impl<T: Read + Seek + Send + Debug> RegionInput for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bucket {
    key_len: u16,
    first_unit: u16,
    key_ptr: u32,
    value_ref: u32,
}

impl Bucket {
    const EMPTY: Bucket = Bucket {
        key_len: 0,
        first_unit: 0,
        key_ptr: 0,
        value_ref: 0,
    };

    fn parse(bytes: &[u8]) -> Self {
        let word =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Bucket {
            key_len: u16::from_le_bytes([bytes[0], bytes[1]]),
            first_unit: u16::from_le_bytes([bytes[2], bytes[3]]),
            key_ptr: word(4),
            value_ref: word(8),
        }
    }

    fn is_empty(&self) -> bool {
        self.key_len == 0
    }
}

/// The searchable form of a table, frozen in memory or loaded from a file.
#[derive(Debug)]
struct HashTable {
    point: Mutex<Box<dyn RegionInput>>,
    scan: Mutex<Box<dyn RegionInput>>,
    /// Absolute position of the first bucket.
    base: u64,
    table_size: u32,
    data_bytes: u64,
}

impl HashTable {
    fn in_memory(region: Vec<u8>) -> Result<Self> {
        let bytes: Arc<[u8]> = Arc::from(region);
        let mut header = Cursor::new(Arc::clone(&bytes));
        let table_size = header.read_u32::<LittleEndian>()?;
        let data_bytes = header.read_i32::<LittleEndian>()? as u64;
        Ok(HashTable {
            point: Mutex::new(Box::new(Cursor::new(Arc::clone(&bytes)))),
            scan: Mutex::new(Box::new(Cursor::new(bytes))),
            base: HEADER_LEN,
            table_size,
            data_bytes,
        })
    }

    fn lock(reader: &Mutex<Box<dyn RegionInput>>) -> Result<MutexGuard<'_, Box<dyn RegionInput>>> {
        reader
            .lock()
            .map_err(|_| JitenError::storage("disk hash reader lock poisoned"))
    }

    fn read_at(&self, reader: &mut dyn RegionInput, offset: u64, length: u64) -> Result<Vec<u8>> {
        if offset + length > self.data_bytes {
            return Err(JitenError::format(format!(
                "disk hash offset {offset}+{length} outside region of {} bytes",
                self.data_bytes
            )));
        }
        reader.seek(SeekFrom::Start(self.base + offset))?;
        let mut bytes = vec![0u8; length as usize];
        reader.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_units(&self, reader: &mut dyn RegionInput, offset: u64, count: usize) -> Result<Vec<u16>> {
        let bytes = self.read_at(reader, offset, count as u64 * 2)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }

    fn read_array(&self, reader: &mut dyn RegionInput, offset: u64) -> Result<Vec<u32>> {
        let count = self.read_at(reader, offset, 4)?;
        let count = i32::from_le_bytes([count[0], count[1], count[2], count[3]]);
        if count <= 0 {
            return Err(JitenError::format(format!("invalid id array count {count}")));
        }
        let bytes = self.read_at(reader, offset + 4, count as u64 * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|quad| u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
            .collect())
    }

    fn value(&self, reader: &mut dyn RegionInput, bucket: &Bucket) -> Result<IdStream> {
        if bucket.value_ref & ARRAY_FLAG == 0 {
            return Ok(IdStream::singleton(bucket.value_ref));
        }
        let ids = self.read_array(reader, (bucket.value_ref & OFFSET_MASK) as u64)?;
        Ok(IdStream::from_vec(ids))
    }

    fn exact(&self, query: &[u16]) -> Result<IdStream> {
        let mut reader = Self::lock(&self.point)?;
        let reader: &mut dyn RegionInput = reader.as_mut();

        let size = self.table_size as u64;
        let home = key_hash_utf16(query) as u64 % size;
        for step in 0..size {
            let slot = (home + step) % size;
            let bytes = self.read_at(reader, slot * BUCKET_LEN as u64, BUCKET_LEN as u64)?;
            let bucket = Bucket::parse(&bytes);
            if bucket.is_empty() {
                break;
            }
            if bucket.key_len as usize != query.len() || bucket.first_unit != query[0] {
                continue;
            }
            if query.len() > 1 {
                let rest = self.read_units(reader, bucket.key_ptr as u64, query.len() - 1)?;
                if rest != query[1..] {
                    continue;
                }
            }
            return self.value(reader, &bucket);
        }
        Ok(IdStream::empty())
    }

    fn scan(&self, query: &[u16], mode: MatchMode) -> Result<IdStream> {
        let mut reader = Self::lock(&self.scan)?;
        let reader: &mut dyn RegionInput = reader.as_mut();

        let table_len = self.table_size as u64 * BUCKET_LEN as u64;
        let table = self.read_at(reader, 0, table_len)?;
        let buckets: Vec<Bucket> = table
            .chunks_exact(BUCKET_LEN)
            .map(Bucket::parse)
            .filter(|bucket| !bucket.is_empty())
            .collect();

        // Key remainders are contiguous after the table.
        let key_units: u64 = buckets.iter().map(|b| b.key_len as u64 - 1).sum();
        let keys = self.read_units(reader, table_len, key_units as usize)?;

        let mut singles = Vec::new();
        let mut arrays = Vec::new();
        let mut key = Vec::new();
        for bucket in &buckets {
            if (bucket.key_len as usize) < query.len() {
                continue;
            }
            key.clear();
            key.push(bucket.first_unit);
            if bucket.key_len > 1 {
                let start = (bucket.key_ptr as u64)
                    .checked_sub(table_len)
                    .map(|bytes| bytes as usize / 2)
                    .ok_or_else(|| JitenError::format("disk hash key pointer inside bucket table"))?;
                let end = start + bucket.key_len as usize - 1;
                let rest = keys
                    .get(start..end)
                    .ok_or_else(|| JitenError::format("disk hash key pointer out of range"))?;
                key.extend_from_slice(rest);
            }
            if !units_match(&key, query, mode) {
                continue;
            }
            if bucket.value_ref & ARRAY_FLAG == 0 {
                insert_sorted(&mut singles, bucket.value_ref);
            } else {
                arrays.push(self.value(reader, bucket)?);
            }
        }

        arrays.push(IdStream::from_vec(singles));
        Ok(union(arrays))
    }
}

fn units_match(key: &[u16], query: &[u16], mode: MatchMode) -> bool {
    match mode {
        MatchMode::Exact => key == query,
        MatchMode::Prefix => key.starts_with(query),
        MatchMode::Suffix => key.ends_with(query),
        MatchMode::Substring => key.windows(query.len()).any(|window| window == query),
    }
}

/// Lay out a table for `entries` and serialize it, header included.
fn build_region(entries: &FrozenEntries, remap: Option<&[u32]>) -> Result<Vec<u8>> {
    let mut keys = Vec::with_capacity(entries.len());
    for (key, ids) in entries {
        let units: Vec<u16> = key.encode_utf16().collect();
        if units.len() > u16::MAX as usize {
            return Err(JitenError::invalid_operation(format!(
                "key of {} units exceeds the disk hash limit of {}",
                units.len(),
                u16::MAX
            )));
        }
        keys.push((units, remap_ids(ids, remap)?));
    }

    // Pass one: placement.
    let table_size = table_size_for(keys.len());
    let mut slots: Vec<Option<usize>> = vec![None; table_size as usize];
    for (index, (units, _)) in keys.iter().enumerate() {
        let mut slot = (key_hash_utf16(units) % table_size) as usize;
        while slots[slot].is_some() {
            slot = (slot + 1) % slots.len();
        }
        slots[slot] = Some(index);
    }

    // Pass two: offsets of key remainders, then of arrays.
    let table_len = table_size as u64 * BUCKET_LEN as u64;
    let mut buckets = vec![Bucket::EMPTY; slots.len()];
    let mut offset = table_len;
    for (slot, entry) in slots.iter().enumerate() {
        let Some(index) = *entry else { continue };
        let units = &keys[index].0;
        buckets[slot].key_len = units.len() as u16;
        buckets[slot].first_unit = units[0];
        if units.len() > 1 {
            buckets[slot].key_ptr = checked_offset(offset)?;
            offset += (units.len() as u64 - 1) * 2;
        }
    }
    for (slot, entry) in slots.iter().enumerate() {
        let Some(index) = *entry else { continue };
        let ids = &keys[index].1;
        if ids.len() == 1 && ids[0] & ARRAY_FLAG == 0 {
            buckets[slot].value_ref = ids[0];
        } else {
            buckets[slot].value_ref = ARRAY_FLAG | checked_offset(offset)?;
            offset += 4 + ids.len() as u64 * 4;
        }
    }
    let data_bytes = i32::try_from(offset)
        .map_err(|_| JitenError::invalid_operation("disk hash region exceeds 2 GiB"))?;

    // Emit header, buckets, key remainders, arrays.
    let mut region = Vec::with_capacity(HEADER_LEN as usize + offset as usize);
    region.write_u32::<LittleEndian>(table_size)?;
    region.write_i32::<LittleEndian>(data_bytes)?;
    for bucket in &buckets {
        region.write_u16::<LittleEndian>(bucket.key_len)?;
        region.write_u16::<LittleEndian>(bucket.first_unit)?;
        region.write_u32::<LittleEndian>(bucket.key_ptr)?;
        region.write_u32::<LittleEndian>(bucket.value_ref)?;
    }
    for index in slots.iter().flatten() {
        for &unit in &keys[*index].0[1..] {
            region.write_u16::<LittleEndian>(unit)?;
        }
    }
    for (slot, entry) in slots.iter().enumerate() {
        let Some(index) = *entry else { continue };
        if buckets[slot].value_ref & ARRAY_FLAG == 0 {
            continue;
        }
        let ids = &keys[index].1;
        region.write_i32::<LittleEndian>(ids.len() as i32)?;
        for &id in ids {
            region.write_u32::<LittleEndian>(id)?;
        }
    }

    debug!(
        "laid out disk hash index: {} keys in {} buckets, {} data bytes",
        keys.len(),
        table_size,
        data_bytes
    );
    Ok(region)
}

fn checked_offset(offset: u64) -> Result<u32> {
    u32::try_from(offset)
        .ok()
        .filter(|offset| offset & ARRAY_FLAG == 0)
        .ok_or_else(|| JitenError::invalid_operation("disk hash region exceeds 2 GiB"))
}

/// Open-hash index probed on disk.
#[derive(Debug)]
pub struct DiskHashIndex {
    normalizer: Arc<dyn KeyNormalizer>,
    accumulator: KeyAccumulator,
    frozen: Option<FrozenEntries>,
    table: Option<HashTable>,
    key_count: usize,
}

impl DiskHashIndex {
    pub fn new(normalizer: Arc<dyn KeyNormalizer>) -> Self {
        DiskHashIndex {
            accumulator: KeyAccumulator::new(Arc::clone(&normalizer)),
            normalizer,
            frozen: None,
            table: None,
            key_count: 0,
        }
    }

    /// Number of buckets, once frozen or loaded.
    pub fn table_size(&self) -> Option<u32> {
        self.table.as_ref().map(|table| table.table_size)
    }
}

impl Index for DiskHashIndex {
    fn backend(&self) -> IndexBackend {
        IndexBackend::DiskHash
    }

    fn normalizer(&self) -> &dyn KeyNormalizer {
        self.normalizer.as_ref()
    }

    fn create_new(&mut self) {
        self.accumulator = KeyAccumulator::new(Arc::clone(&self.normalizer));
        self.frozen = None;
        self.table = None;
        self.key_count = 0;
    }

    fn add(&mut self, key: &str, ids: &[u32]) -> Result<()> {
        if self.table.is_some() {
            return Err(JitenError::invalid_operation(
                "index is frozen; call create_new before adding keys",
            ));
        }
        self.accumulator.add(key, ids)
    }

    fn finished_adding(&mut self) -> Result<()> {
        if self.table.is_some() {
            return Err(JitenError::invalid_operation("index is already frozen"));
        }
        let frozen = self.accumulator.freeze();
        let region = build_region(&frozen, None)?;
        self.table = Some(HashTable::in_memory(region)?);
        self.key_count = frozen.len();
        self.frozen = Some(frozen);
        Ok(())
    }

    fn save(&self, writer: &mut RegionWriter, remap: Option<&[u32]>) -> Result<()> {
        let frozen = self.frozen.as_ref().ok_or_else(|| {
            JitenError::invalid_operation("only an index built with finished_adding can be saved")
        })?;
        let region = build_region(frozen, remap)?;
        writer.write_raw(&region)
    }

    fn load(&mut self, reader: &mut RegionReader, source: &RegionSource) -> Result<()> {
        let table_size = reader.read_u32()?;
        let data_bytes = reader.read_i32()?;
        if table_size == 0 || data_bytes < 0 {
            return Err(JitenError::format(format!(
                "invalid disk hash header: {table_size} buckets, {data_bytes} bytes"
            )));
        }
        let data_bytes = data_bytes as u64;
        let table_len = table_size as u64 * BUCKET_LEN as u64;
        if table_len > data_bytes || data_bytes > reader.remaining() {
            return Err(JitenError::format("disk hash region exceeds file length"));
        }

        let base = reader.position();
        let table = reader.read_raw(table_len as usize)?;
        let key_count = table
            .chunks_exact(BUCKET_LEN)
            .filter(|bytes| !Bucket::parse(bytes).is_empty())
            .count();
        reader.seek_to(base + data_bytes)?;

        let point: Box<dyn RegionInput> = Box::new(source.open_point_reader()?);
        let scan: Box<dyn RegionInput> = Box::new(source.open_scan_reader()?);

        self.accumulator = KeyAccumulator::new(Arc::clone(&self.normalizer));
        self.frozen = None;
        self.table = Some(HashTable {
            point: Mutex::new(point),
            scan: Mutex::new(scan),
            base,
            table_size,
            data_bytes,
        });
        self.key_count = key_count;

        debug!(
            "loaded disk hash index from {}: {key_count} keys, {table_size} buckets",
            source.file_name
        );
        Ok(())
    }

    fn search(&self, text: &str, mode: MatchMode) -> Result<IdStream> {
        let table = self.table.as_ref().ok_or_else(not_searchable)?;
        let query: Vec<u16> = normalize_key(self.normalizer.as_ref(), text)?
            .encode_utf16()
            .collect();

        match mode {
            MatchMode::Exact => table.exact(&query),
            _ => table.scan(&query, mode),
        }
    }

    fn key_count(&self) -> usize {
        if self.table.is_some() {
            self.key_count
        } else {
            self.accumulator.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::LowercaseNormalizer;
    use crate::storage::{MemoryStorage, Storage, StructReader, StructWriter};

    fn built(pairs: &[(&str, &[u32])]) -> DiskHashIndex {
        let mut index = DiskHashIndex::new(Arc::new(LowercaseNormalizer));
        for (key, ids) in pairs {
            index.add(key, ids).unwrap();
        }
        index.finished_adding().unwrap();
        index
    }

    fn ids(index: &dyn Index, text: &str, mode: MatchMode) -> Vec<u32> {
        index.search(text, mode).unwrap().collect()
    }

    fn save_and_load(index: &DiskHashIndex, remap: Option<&[u32]>) -> DiskHashIndex {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = StructWriter::new(storage.create_output("words.dcwi").unwrap());
        writer.write_u32(0xDEAD_BEEF).unwrap();
        index.save(&mut writer, remap).unwrap();
        writer.write_u32(0xFEED_FACE).unwrap();
        writer.close().unwrap();

        let mut reader = StructReader::new(storage.open_input("words.dcwi").unwrap()).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        let mut loaded = DiskHashIndex::new(Arc::new(LowercaseNormalizer));
        loaded
            .load(&mut reader, &RegionSource::new(storage, "words.dcwi"))
            .unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0xFEED_FACE);
        loaded
    }

    #[test]
    fn test_bucket_layout() {
        let index = built(&[("a", &[7]), ("bc", &[1, 2])]);
        let region = build_region(index.frozen.as_ref().unwrap(), None).unwrap();

        let table_size = u32::from_le_bytes(region[0..4].try_into().unwrap());
        assert_eq!(table_size, 3);
        let data_bytes = i32::from_le_bytes(region[4..8].try_into().unwrap());
        // 3 buckets, one key remainder unit, one array of two ids.
        assert_eq!(data_bytes as usize, 36 + 2 + 12);
        assert_eq!(region.len(), 8 + data_bytes as usize);

        let buckets: Vec<Bucket> = region[8..44].chunks_exact(12).map(Bucket::parse).collect();
        let a = buckets.iter().find(|b| b.key_len == 1).unwrap();
        assert_eq!((a.first_unit, a.key_ptr, a.value_ref), ('a' as u16, 0, 7));
        let bc = buckets.iter().find(|b| b.key_len == 2).unwrap();
        assert_eq!(bc.first_unit, 'b' as u16);
        assert_eq!(bc.key_ptr, 36);
        assert_eq!(bc.value_ref, ARRAY_FLAG | 38);
    }

    #[test]
    fn test_frozen_search() {
        let index = built(&[("犬", &[1]), ("猫", &[2, 5]), ("猫背", &[5])]);
        assert_eq!(ids(&index, "猫", MatchMode::Exact), vec![2, 5]);
        assert_eq!(ids(&index, "猫", MatchMode::Prefix), vec![2, 5]);
        assert_eq!(ids(&index, "背", MatchMode::Suffix), vec![5]);
        assert_eq!(ids(&index, "犬", MatchMode::Exact), vec![1]);
        assert!(ids(&index, "鳥", MatchMode::Exact).is_empty());
    }

    #[test]
    fn test_loaded_search_between_other_regions() {
        let index = built(&[("cat", &[2, 5]), ("catalog", &[7]), ("bobcat", &[3]), ("dog", &[1])]);
        let loaded = save_and_load(&index, None);

        assert_eq!(loaded.key_count(), 4);
        assert_eq!(loaded.table_size(), index.table_size());
        assert_eq!(ids(&loaded, "CAT", MatchMode::Exact), vec![2, 5]);
        assert_eq!(ids(&loaded, "cat", MatchMode::Prefix), vec![2, 5, 7]);
        assert_eq!(ids(&loaded, "cat", MatchMode::Suffix), vec![2, 3, 5]);
        assert_eq!(ids(&loaded, "o", MatchMode::Substring), vec![1, 3, 7]);
        assert!(ids(&loaded, "catalogue", MatchMode::Prefix).is_empty());
    }

    #[test]
    fn test_large_ids_use_arrays() {
        let index = built(&[("big", &[u32::MAX]), ("small", &[9])]);
        let loaded = save_and_load(&index, None);
        assert_eq!(ids(&loaded, "big", MatchMode::Exact), vec![u32::MAX]);
        assert_eq!(ids(&loaded, "small", MatchMode::Exact), vec![9]);
    }

    #[test]
    fn test_remap_on_save() {
        let index = built(&[("x", &[0]), ("y", &[0, 1])]);
        let loaded = save_and_load(&index, Some(&[40, 20]));
        assert_eq!(ids(&loaded, "x", MatchMode::Exact), vec![40]);
        assert_eq!(ids(&loaded, "y", MatchMode::Exact), vec![20, 40]);
    }

    #[test]
    fn test_colliding_keys_all_found() {
        // Enough keys to force probing in a small table.
        let keys: Vec<String> = (0..200).map(|i| format!("k{i}")).collect();
        let mut index = DiskHashIndex::new(Arc::new(LowercaseNormalizer));
        for (i, key) in keys.iter().enumerate() {
            index.add(key, &[i as u32]).unwrap();
        }
        index.finished_adding().unwrap();
        let loaded = save_and_load(&index, None);

        for (i, key) in keys.iter().enumerate() {
            assert_eq!(ids(&loaded, key, MatchMode::Exact), vec![i as u32]);
        }
    }

    #[test]
    fn test_overlong_key_rejected() {
        let mut index = DiskHashIndex::new(Arc::new(LowercaseNormalizer));
        index.add(&"a".repeat(70_000), &[1]).unwrap();
        assert!(matches!(
            index.finished_adding(),
            Err(JitenError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_truncated_region_rejected() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = StructWriter::new(storage.create_output("bad").unwrap());
        writer.write_u32(7).unwrap();
        writer.write_i32(1_000).unwrap();
        writer.close().unwrap();

        let mut reader = StructReader::new(storage.open_input("bad").unwrap()).unwrap();
        let mut index = DiskHashIndex::new(Arc::new(LowercaseNormalizer));
        let err = index
            .load(&mut reader, &RegionSource::new(storage, "bad"))
            .unwrap_err();
        assert!(err.is_format_error());
    }
}
