//! Magic tag and version byte at the start of every dictionary file.

use crate::error::{JitenError, Result};
use crate::storage::{StorageInput, StorageOutput, StructReader, StructWriter};

/// Newest format version this crate reads and the one it writes.
pub const FORMAT_VERSION: u8 = 1;

/// Bytes taken by the magic tag and version.
pub const HEADER_LEN: u64 = 5;

/// Sub-format of a dictionary file, identified by its magic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Entry records and the string compressor.
    WordData,
    /// Field indexes over the word data.
    WordIndex,
    /// Character data. Recognised but never produced.
    CharacterData,
}

impl FileKind {
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            FileKind::WordData => b"DCWD",
            FileKind::WordIndex => b"DCWI",
            FileKind::CharacterData => b"DCCD",
        }
    }

    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic {
            b"DCWD" => Some(FileKind::WordData),
            b"DCWI" => Some(FileKind::WordIndex),
            b"DCCD" => Some(FileKind::CharacterData),
            _ => None,
        }
    }

    /// File name extension used for this kind.
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::WordData => "dcwd",
            FileKind::WordIndex => "dcwi",
            FileKind::CharacterData => "dccd",
        }
    }

    /// Name of the `name` dictionary's file of this kind.
    pub fn file_name(self, name: &str) -> String {
        format!("{name}.{}", self.extension())
    }
}

/// Write the magic tag of `kind` and the current version.
pub fn write_header<W: StorageOutput>(writer: &mut StructWriter<W>, kind: FileKind) -> Result<()> {
    writer.write_raw(kind.magic())?;
    writer.write_u8(FORMAT_VERSION)
}

/// Read a header of any known kind, returning the kind and version.
pub fn read_any_header<R: StorageInput>(reader: &mut StructReader<R>) -> Result<(FileKind, u8)> {
    if reader.remaining() < HEADER_LEN {
        return Err(JitenError::format("invalid dictionary file"));
    }
    let magic = reader.read_raw(4)?;
    let kind = FileKind::from_magic(&magic)
        .ok_or_else(|| JitenError::format("invalid dictionary file"))?;
    let version = reader.read_u8()?;
    if version > FORMAT_VERSION {
        return Err(JitenError::format(format!(
            "{} file created with a newer version ({version} > {FORMAT_VERSION})",
            kind.extension()
        )));
    }
    Ok((kind, version))
}

/// Read a header that must be of `expected` kind.
pub fn read_header<R: StorageInput>(reader: &mut StructReader<R>, expected: FileKind) -> Result<u8> {
    let (kind, version) = read_any_header(reader)?;
    if kind != expected {
        return Err(JitenError::format(format!(
            "invalid dictionary file: expected {} but found {}",
            expected.extension(),
            kind.extension()
        )));
    }
    Ok(version)
}
