//! Search flags: which fields to search and how keys must match.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{JitenError, Result};
use crate::index::MatchMode;

bitflags! {
    /// Field selection plus the two anchor bits that encode the match mode.
    ///
    /// Both anchors set is an exact match, only the start anchor a prefix
    /// match, only the end anchor a suffix match and neither a substring match.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SearchFlags: u32 {
        const HEADWORD = 1;
        const READING = 1 << 1;
        const MEANING = 1 << 2;
        const ANCHOR_START = 1 << 3;
        const ANCHOR_END = 1 << 4;

        const ALL_FIELDS = Self::HEADWORD.bits() | Self::READING.bits() | Self::MEANING.bits();
        const MATCH_MASK = Self::ANCHOR_START.bits() | Self::ANCHOR_END.bits();
    }
}

impl SearchFlags {
    /// Flags for `fields` searched under `mode`.
    pub fn new(fields: SearchFlags, mode: MatchMode) -> Self {
        (fields & SearchFlags::ALL_FIELDS).with_match_mode(mode)
    }

    pub fn match_mode(self) -> MatchMode {
        match (
            self.contains(SearchFlags::ANCHOR_START),
            self.contains(SearchFlags::ANCHOR_END),
        ) {
            (true, true) => MatchMode::Exact,
            (true, false) => MatchMode::Prefix,
            (false, true) => MatchMode::Suffix,
            (false, false) => MatchMode::Substring,
        }
    }

    /// Replace the match mode, keeping the field bits.
    pub fn with_match_mode(self, mode: MatchMode) -> Self {
        let anchors = match mode {
            MatchMode::Exact => SearchFlags::MATCH_MASK,
            MatchMode::Prefix => SearchFlags::ANCHOR_START,
            MatchMode::Suffix => SearchFlags::ANCHOR_END,
            MatchMode::Substring => SearchFlags::empty(),
        };
        (self - SearchFlags::MATCH_MASK) | anchors
    }

    /// The selected fields.
    pub fn fields(self) -> impl Iterator<Item = SearchField> {
        SearchField::ALL
            .into_iter()
            .filter(move |field| self.contains(field.flag()))
    }
}

/// An indexed part of a dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Headword,
    Reading,
    Meaning,
}

impl SearchField {
    pub const ALL: [SearchField; 3] = [
        SearchField::Headword,
        SearchField::Reading,
        SearchField::Meaning,
    ];

    pub fn flag(self) -> SearchFlags {
        match self {
            SearchField::Headword => SearchFlags::HEADWORD,
            SearchField::Reading => SearchFlags::READING,
            SearchField::Meaning => SearchFlags::MEANING,
        }
    }

    /// Tag byte stored in index files.
    pub fn code(self) -> u8 {
        match self {
            SearchField::Headword => 0,
            SearchField::Reading => 1,
            SearchField::Meaning => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(SearchField::Headword),
            1 => Ok(SearchField::Reading),
            2 => Ok(SearchField::Meaning),
            other => Err(JitenError::format(format!("unknown index field {other}"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SearchField::Headword => "headword",
            SearchField::Reading => "reading",
            SearchField::Meaning => "meaning",
        }
    }
}
