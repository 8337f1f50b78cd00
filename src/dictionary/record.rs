//! Entry records in the word data file.
//!
//! A record is three varint counts (headwords, readings, meanings) followed
//! by every string of the entry, each Huffman-encoded and byte aligned. An
//! entry's ID is the absolute file offset of its record.

use crate::compress::StringCompressor;
use crate::dictionary::entry::Entry;
use crate::error::{JitenError, Result};
use crate::storage::{StorageInput, StorageOutput, StructReader, StructWriter};

/// Append the record for `entry` at the writer's current position.
pub fn write_record<W: StorageOutput>(
    writer: &mut StructWriter<W>,
    compressor: &StringCompressor,
    entry: &Entry,
) -> Result<()> {
    for strings in [&entry.headwords, &entry.readings, &entry.meanings] {
        let count = u32::try_from(strings.len()).map_err(|_| {
            JitenError::invalid_argument(format!("entry has {} strings in one field", strings.len()))
        })?;
        writer.write_varint(count)?;
    }
    for text in entry.strings() {
        compressor.write_string(writer, Some(text))?;
    }
    Ok(())
}

/// Read the record at the reader's current position.
pub fn read_record<R: StorageInput>(
    reader: &mut StructReader<R>,
    compressor: &StringCompressor,
) -> Result<Entry> {
    let mut counts = [0usize; 3];
    for count in &mut counts {
        *count = reader.read_varint()? as usize;
    }

    // With more than the end-of-string symbol in the code, every string
    // takes at least one byte.
    let total: u64 = counts.iter().map(|&c| c as u64).sum();
    if compressor.tree_word_count() > 2 && total > reader.remaining() {
        return Err(JitenError::format(format!(
            "record claims {total} strings with {} bytes left",
            reader.remaining()
        )));
    }

    let [headwords, readings, meanings] = counts;
    Ok(Entry {
        headwords: read_strings(reader, compressor, headwords)?,
        readings: read_strings(reader, compressor, readings)?,
        meanings: read_strings(reader, compressor, meanings)?,
    })
}

fn read_strings<R: StorageInput>(
    reader: &mut StructReader<R>,
    compressor: &StringCompressor,
    count: usize,
) -> Result<Vec<String>> {
    let mut strings = Vec::with_capacity(count);
    for _ in 0..count {
        strings.push(compressor.read_string(reader)?.unwrap_or_default());
    }
    Ok(strings)
}
