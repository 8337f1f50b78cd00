//! Stable key hashing for serialized hash tables.
//!
//! Disk-resident tables are probed with the same hash at build and query time,
//! possibly from different processes, so the hash must never depend on a
//! per-process seed. Keys are hashed with unseeded XXH3-64 over the
//! little-endian bytes of their UTF-16 code units; tables use the low 32 bits.

use xxhash_rust::xxh3::xxh3_64;

/// Hash a sequence of UTF-16 code units.
pub fn key_hash_utf16(units: &[u16]) -> u32 {
    let bytes: Vec<u8> = units.iter().flat_map(|unit| unit.to_le_bytes()).collect();
    xxh3_64(&bytes) as u32
}

/// Hash a string by its UTF-16 encoding.
pub fn key_hash_str(text: &str) -> u32 {
    let units: Vec<u16> = text.encode_utf16().collect();
    key_hash_utf16(&units)
}
