//! Bounds-checked accessors for packed trie nodes.
//!
//! ```text
//! u8  child_count
//! u8  flags                       HAS_VALUE | IMPLICIT_CHILD
//! child_count x u8                child codes, ascending
//! child_count x u32               child slots, absent with IMPLICIT_CHILD
//! u32 value ref                   present with HAS_VALUE
//! ```
//!
//! The top two bits of a slot or value ref are a tag: `00` is the offset of a
//! child node from the start of the trie, `10` an inline ID and `11` the offset
//! of an ID array in the array region.

use crate::error::{JitenError, Result};
use crate::set::{IdStream, insert_sorted, union};

pub const HAS_VALUE: u8 = 0b01;
pub const IMPLICIT_CHILD: u8 = 0b10;

pub const TAG_MASK: u32 = 0xC000_0000;
pub const TAG_INLINE: u32 = 0x8000_0000;
pub const TAG_ARRAY: u32 = 0xC000_0000;
pub const PAYLOAD_MASK: u32 = 0x3FFF_FFFF;

/// Byte length of a node.
pub fn node_length(child_count: usize, implicit: bool, has_value: bool) -> usize {
    2 + child_count + if implicit { 0 } else { 4 * child_count } + if has_value { 4 } else { 0 }
}

fn read_u32_at(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| JitenError::format(format!("trie read at {at} out of range")))
}

/// A tagged reference to the IDs of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRef(pub u32);

impl ValueRef {
    pub fn inline(id: u32) -> Self {
        ValueRef(TAG_INLINE | id)
    }

    pub fn array(offset: u32) -> Self {
        ValueRef(TAG_ARRAY | offset)
    }

    fn decode(raw: u32) -> Result<Self> {
        match raw & TAG_MASK {
            TAG_INLINE | TAG_ARRAY => Ok(ValueRef(raw)),
            _ => Err(JitenError::format(format!("invalid trie value ref {raw:#010x}"))),
        }
    }

    pub fn is_inline(self) -> bool {
        self.0 & TAG_MASK == TAG_INLINE
    }

    pub fn payload(self) -> u32 {
        self.0 & PAYLOAD_MASK
    }
}

/// Where an edge leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Offset of a child node.
    Node(usize),
    /// A leaf stored directly in the parent's slot.
    Leaf(ValueRef),
}

/// A parsed node header.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    trie: &'a [u8],
    offset: usize,
    child_count: usize,
    flags: u8,
}

impl<'a> NodeView<'a> {
    pub fn read(trie: &'a [u8], offset: usize) -> Result<Self> {
        let header = trie
            .get(offset..offset + 2)
            .ok_or_else(|| JitenError::format(format!("trie node at {offset} out of range")))?;
        let node = NodeView {
            trie,
            offset,
            child_count: header[0] as usize,
            flags: header[1],
        };
        if node.flags & !(HAS_VALUE | IMPLICIT_CHILD) != 0
            || (node.is_implicit() && node.child_count != 1)
        {
            return Err(JitenError::format(format!("invalid trie node flags at {offset}")));
        }
        if offset + node.byte_len() > trie.len() {
            return Err(JitenError::format(format!("trie node at {offset} truncated")));
        }
        Ok(node)
    }

    pub fn child_count(&self) -> usize {
        self.child_count
    }

    pub fn has_value(&self) -> bool {
        self.flags & HAS_VALUE != 0
    }

    pub fn is_implicit(&self) -> bool {
        self.flags & IMPLICIT_CHILD != 0
    }

    pub fn byte_len(&self) -> usize {
        node_length(self.child_count, self.is_implicit(), self.has_value())
    }

    pub fn child_codes(&self) -> &'a [u8] {
        &self.trie[self.offset + 2..self.offset + 2 + self.child_count]
    }

    pub fn find_child(&self, code: u8) -> Option<usize> {
        self.child_codes().binary_search(&code).ok()
    }

    /// Target of the `index`th child.
    pub fn child(&self, index: usize) -> Result<Target> {
        if self.is_implicit() {
            return Ok(Target::Node(self.offset + self.byte_len()));
        }
        let slot = read_u32_at(self.trie, self.offset + 2 + self.child_count + 4 * index)?;
        if slot & TAG_MASK == 0 {
            let child = slot as usize;
            if child <= self.offset {
                return Err(JitenError::format(format!(
                    "trie child offset {child} does not follow node {}",
                    self.offset
                )));
            }
            return Ok(Target::Node(child));
        }
        Ok(Target::Leaf(ValueRef::decode(slot)?))
    }

    /// The node's own value, if a key ends here.
    pub fn value(&self) -> Result<Option<ValueRef>> {
        if !self.has_value() {
            return Ok(None);
        }
        let at = self.offset + self.byte_len() - 4;
        Ok(Some(ValueRef::decode(read_u32_at(self.trie, at)?)?))
    }
}

/// Gathers the values of many keys into one stream.
#[derive(Debug, Default)]
pub struct ValueCollector {
    singles: Vec<u32>,
    arrays: Vec<IdStream>,
}

impl ValueCollector {
    pub fn add(&mut self, value: ValueRef, arrays: &[u8]) -> Result<()> {
        if value.is_inline() {
            insert_sorted(&mut self.singles, value.payload());
        } else {
            self.arrays.push(resolve(value, arrays)?);
        }
        Ok(())
    }

    /// Add every value in the subtree reached through `target`.
    pub fn add_subtree(&mut self, target: Target, trie: &[u8], arrays: &[u8]) -> Result<()> {
        let mut pending = vec![target];
        while let Some(target) = pending.pop() {
            match target {
                Target::Leaf(value) => self.add(value, arrays)?,
                Target::Node(offset) => {
                    let node = NodeView::read(trie, offset)?;
                    if let Some(value) = node.value()? {
                        self.add(value, arrays)?;
                    }
                    for index in 0..node.child_count() {
                        pending.push(node.child(index)?);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> IdStream {
        self.arrays.push(IdStream::from_vec(self.singles));
        union(self.arrays)
    }
}

/// The IDs a value ref stands for.
pub fn resolve(value: ValueRef, arrays: &[u8]) -> Result<IdStream> {
    if value.is_inline() {
        return Ok(IdStream::singleton(value.payload()));
    }

    let offset = value.payload() as usize;
    let count = read_u32_at(arrays, offset)? as i32;
    if count <= 0 {
        return Err(JitenError::format(format!("invalid trie id array count {count}")));
    }
    let ids = arrays
        .get(offset + 4..offset + 4 + count as usize * 4)
        .ok_or_else(|| JitenError::format("trie id array out of range"))?
        .chunks_exact(4)
        .map(|quad| u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
        .collect();
    Ok(IdStream::from_vec(ids))
}
