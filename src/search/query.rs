//! Splitting a raw query into signed pieces.
//!
//! Grammar, pieces separated by whitespace:
//!
//! ```text
//! piece := ['-'] ( '"' phrase '"' | token )
//! ```
//!
//! A leading `-` makes the piece subtractive. Leading `*` wildcards drop the
//! start anchor of the piece's match mode and trailing `*` wildcards drop the
//! end anchor.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{JitenError, Result};
use crate::search::flags::SearchFlags;

/// One parsed fragment of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPiece {
    /// Literal text with wildcards removed.
    pub text: String,
    /// Results of this piece are removed from the final set.
    pub subtractive: bool,
    /// The piece was written as a double-quoted phrase.
    pub quoted: bool,
    /// Fields and match mode for this piece.
    pub flags: SearchFlags,
}

/// Split `query` into pieces that inherit `flags`.
///
/// Pieces left empty once wildcards are removed are dropped. A query without
/// any non-subtractive piece is an error.
pub fn split_query(query: &str, flags: SearchFlags) -> Result<Vec<SearchPiece>> {
    let mut splitter = QuerySplitter {
        chars: query.chars().peekable(),
        flags,
    };

    let mut pieces = Vec::new();
    while let Some(piece) = splitter.next_piece() {
        if !piece.text.is_empty() {
            pieces.push(piece);
        }
    }

    if !pieces.iter().any(|piece| !piece.subtractive) {
        return Err(JitenError::query(format!(
            "query {query:?} has no term to search for"
        )));
    }
    Ok(pieces)
}

struct QuerySplitter<'a> {
    chars: Peekable<Chars<'a>>,
    flags: SearchFlags,
}

impl QuerySplitter<'_> {
    fn next_piece(&mut self) -> Option<SearchPiece> {
        self.skip_whitespace();
        self.chars.peek()?;

        let subtractive = self.chars.next_if_eq(&'-').is_some();
        let quoted = self.chars.peek() == Some(&'"');
        let raw = if quoted {
            self.consume_phrase()
        } else {
            self.consume_token()
        };

        let mut flags = self.flags;
        let without_leading = raw.trim_start_matches('*');
        if without_leading.len() != raw.len() {
            flags.remove(SearchFlags::ANCHOR_START);
        }
        let text = without_leading.trim_end_matches('*');
        if text.len() != without_leading.len() {
            flags.remove(SearchFlags::ANCHOR_END);
        }

        Some(SearchPiece {
            text: text.to_string(),
            subtractive,
            quoted,
            flags,
        })
    }

    fn consume_phrase(&mut self) -> String {
        // Opening quote
        self.chars.next();

        let mut phrase = String::new();
        for ch in self.chars.by_ref() {
            if ch == '"' {
                break;
            }
            phrase.push(ch);
        }
        phrase
    }

    fn consume_token(&mut self) -> String {
        let mut token = String::new();
        while let Some(ch) = self.chars.next_if(|ch| !ch.is_whitespace()) {
            token.push(ch);
        }
        token
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|ch| ch.is_whitespace()).is_some() {}
    }
}
