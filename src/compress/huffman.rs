//! Huffman string compressor.
//!
//! A compressor is built in two phases. During accumulation every string that
//! will later be written is passed to [`StringCompressor::add_string`], which
//! tallies UTF-16 code unit frequencies plus one end-of-string symbol per
//! string. [`StringCompressor::finished_adding`] then builds the code with the
//! two-queue algorithm and freezes it.
//!
//! The code is stored as a pre-order tree of two-word nodes
//! `[unit, right_offset]`. A unit of zero marks an internal node; its left child
//! is the next node and its right child is `right_offset` nodes further on.

use std::collections::VecDeque;
use std::io::{Read, Write};

use ahash::AHashMap;
use log::debug;

use crate::compress::bits::{BitReader, BitWriter};
use crate::error::{JitenError, Result};
use crate::storage::{StorageInput, StorageOutput, StructReader, StructWriter};

/// End-of-string symbol.
pub const SENTINEL: u16 = 0xFFFF;

/// Longest code that fits the packed representation.
pub const MAX_CODE_BITS: u32 = 58;

const LENGTH_SHIFT: u32 = 58;
const CODE_MASK: u64 = (1 << LENGTH_SHIFT) - 1;

/// Pack a code and its length into one word.
fn pack(code: u64, length: u32) -> u64 {
    ((length as u64) << LENGTH_SHIFT) | (code & CODE_MASK)
}

fn unpack(packed: u64) -> (u64, u32) {
    (packed & CODE_MASK, (packed >> LENGTH_SHIFT) as u32)
}

enum BuildNode {
    Leaf(u16),
    Internal { left: usize, right: usize },
}

/// Builds and applies a Huffman code over a corpus of strings.
#[derive(Debug, Default)]
pub struct StringCompressor {
    frequencies: AHashMap<u16, u64>,
    tree: Vec<u16>,
    codes: AHashMap<u16, u64>,
    ready: bool,
}

impl StringCompressor {
    /// Create a compressor in the accumulation phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any code and start accumulating again.
    pub fn create_new(&mut self) {
        self.frequencies.clear();
        self.tree.clear();
        self.codes.clear();
        self.ready = false;
    }

    /// Tally the units of a string. `None` counts as the empty string.
    pub fn add_string(&mut self, text: Option<&str>) -> Result<()> {
        if self.ready {
            return Err(JitenError::invalid_operation(
                "cannot add strings after the code is built",
            ));
        }

        for unit in text.unwrap_or("").encode_utf16() {
            if unit == 0 || unit == SENTINEL {
                return Err(JitenError::invalid_operation(format!(
                    "character U+{unit:04X} cannot be compressed"
                )));
            }
            *self.frequencies.entry(unit).or_insert(0) += 1;
        }
        *self.frequencies.entry(SENTINEL).or_insert(0) += 1;
        Ok(())
    }

    /// Build the code from the accumulated frequencies.
    pub fn finished_adding(&mut self) -> Result<()> {
        if self.ready {
            return Err(JitenError::invalid_operation("code is already built"));
        }

        let mut leaves: Vec<(u64, u16)> = self
            .frequencies
            .iter()
            .map(|(&unit, &weight)| (weight, unit))
            .collect();
        if !self.frequencies.contains_key(&SENTINEL) {
            leaves.push((0, SENTINEL));
        }
        leaves.sort_unstable();

        let mut nodes = Vec::with_capacity(leaves.len() * 2);
        let mut weights = Vec::with_capacity(leaves.len() * 2);
        let mut leaf_queue = VecDeque::with_capacity(leaves.len());
        let mut internal_queue = VecDeque::with_capacity(leaves.len());

        for &(weight, unit) in &leaves {
            leaf_queue.push_back(nodes.len());
            nodes.push(BuildNode::Leaf(unit));
            weights.push(weight);
        }

        while leaf_queue.len() + internal_queue.len() > 1 {
            let left = pop_lightest(&mut leaf_queue, &mut internal_queue, &weights);
            let right = pop_lightest(&mut leaf_queue, &mut internal_queue, &weights);
            let (Some(left), Some(right)) = (left, right) else {
                break;
            };
            internal_queue.push_back(nodes.len());
            nodes.push(BuildNode::Internal { left, right });
            weights.push(weights[left] + weights[right]);
        }

        let root = leaf_queue
            .front()
            .or(internal_queue.front())
            .copied()
            .ok_or_else(|| JitenError::invalid_operation("empty huffman alphabet"))?;

        let mut tree = Vec::with_capacity(nodes.len() * 2);
        serialize_node(&nodes, root, &mut tree)?;
        self.codes = derive_codes(&tree)?;
        self.tree = tree;
        self.frequencies.clear();
        self.ready = true;

        debug!(
            "built huffman code over {} symbols ({} tree words)",
            leaves.len(),
            self.tree.len()
        );
        Ok(())
    }

    /// Whether the code is built or loaded.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of distinct symbols, including the end-of-string symbol.
    pub fn alphabet_size(&self) -> usize {
        self.codes.len()
    }

    /// Number of 16-bit words in the serialized tree.
    pub fn tree_word_count(&self) -> usize {
        self.tree.len()
    }

    fn check_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(JitenError::invalid_operation(
                "compressor used before finished_adding or load",
            ))
        }
    }

    /// Encode a string followed by the end-of-string symbol.
    ///
    /// Output is padded to a whole number of bytes.
    pub fn write_string<W: Write>(&self, writer: &mut W, text: Option<&str>) -> Result<()> {
        let bytes = self.encode(text)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Encode a string into a fresh byte vector.
    pub fn encode(&self, text: Option<&str>) -> Result<Vec<u8>> {
        self.check_ready()?;

        let mut bits = BitWriter::new();
        for unit in text.unwrap_or("").encode_utf16() {
            let packed = self.codes.get(&unit).copied().filter(|_| unit != SENTINEL);
            let Some(packed) = packed else {
                return Err(JitenError::invalid_operation(format!(
                    "character U+{unit:04X} is not in the compressor alphabet"
                )));
            };
            let (code, length) = unpack(packed);
            bits.push_bits(code, length);
        }
        let sentinel = self
            .codes
            .get(&SENTINEL)
            .copied()
            .ok_or_else(|| JitenError::format("huffman tree has no end-of-string symbol"))?;
        let (code, length) = unpack(sentinel);
        bits.push_bits(code, length);

        Ok(bits.finish())
    }

    /// Decode one string. A zero-length string decodes as `None`.
    pub fn read_string<R: Read>(&self, reader: &mut R) -> Result<Option<String>> {
        self.check_ready()?;

        let mut units = Vec::new();
        let mut bits = BitReader::new(reader);
        let mut node = 0usize;
        loop {
            let unit = self.tree[node * 2];
            if unit == SENTINEL {
                break;
            }
            if unit != 0 {
                units.push(unit);
                node = 0;
                continue;
            }
            node = if bits.next_bit()? {
                node + self.tree[node * 2 + 1] as usize
            } else {
                node + 1
            };
        }

        if units.is_empty() {
            return Ok(None);
        }
        String::from_utf16(&units)
            .map(Some)
            .map_err(|e| JitenError::format(format!("Invalid UTF-16 in compressed string: {e}")))
    }

    /// Write the tree region.
    pub fn save<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        self.check_ready()?;

        writer.write_count(self.tree.len())?;
        for &word in &self.tree {
            writer.write_u16(word)?;
        }
        Ok(())
    }

    /// Replace this compressor's state with a tree region read from `reader`.
    pub fn load<R: StorageInput>(&mut self, reader: &mut StructReader<R>) -> Result<()> {
        let count = reader.read_count("huffman tree word", 2)?;
        let mut tree = Vec::with_capacity(count);
        for _ in 0..count {
            tree.push(reader.read_u16()?);
        }

        let codes = derive_codes(&tree)?;
        self.frequencies.clear();
        self.codes = codes;
        self.tree = tree;
        self.ready = true;
        Ok(())
    }
}

fn pop_lightest(
    leaves: &mut VecDeque<usize>,
    internals: &mut VecDeque<usize>,
    weights: &[u64],
) -> Option<usize> {
    match (leaves.front(), internals.front()) {
        (Some(&leaf), Some(&internal)) => {
            if weights[leaf] <= weights[internal] {
                leaves.pop_front()
            } else {
                internals.pop_front()
            }
        }
        (Some(_), None) => leaves.pop_front(),
        (None, _) => internals.pop_front(),
    }
}

fn serialize_node(nodes: &[BuildNode], index: usize, tree: &mut Vec<u16>) -> Result<()> {
    match nodes[index] {
        BuildNode::Leaf(unit) => tree.extend([unit, 0]),
        BuildNode::Internal { left, right } => {
            let at = tree.len() / 2;
            tree.extend([0, 0]);
            serialize_node(nodes, left, tree)?;
            let offset = u16::try_from(tree.len() / 2 - at)
                .map_err(|_| JitenError::invalid_operation("huffman tree too large"))?;
            tree[at * 2 + 1] = offset;
            serialize_node(nodes, right, tree)?;
        }
    }
    Ok(())
}

/// Walk a serialized tree, validating it and collecting each leaf's code.
fn derive_codes(tree: &[u16]) -> Result<AHashMap<u16, u64>> {
    if tree.is_empty() || tree.len() % 2 != 0 {
        return Err(JitenError::format("malformed huffman tree"));
    }
    let node_count = tree.len() / 2;
    if tree[0] != 0 && tree[0] != SENTINEL {
        return Err(JitenError::format("huffman tree root must be internal"));
    }

    let mut codes = AHashMap::with_capacity(node_count / 2 + 1);
    let mut stack = vec![(0usize, 0u64, 0u32)];
    let mut visited = 0usize;
    while let Some((node, code, length)) = stack.pop() {
        visited += 1;
        if visited > node_count {
            return Err(JitenError::format("huffman tree has shared nodes"));
        }

        let unit = tree[node * 2];
        if unit != 0 {
            if codes.insert(unit, pack(code, length)).is_some() {
                return Err(JitenError::format(format!(
                    "huffman tree repeats symbol U+{unit:04X}"
                )));
            }
            continue;
        }

        if length >= MAX_CODE_BITS {
            return Err(JitenError::invalid_operation(format!(
                "huffman code longer than {MAX_CODE_BITS} bits"
            )));
        }
        let offset = tree[node * 2 + 1] as usize;
        let right = node + offset;
        if offset < 2 || right >= node_count {
            return Err(JitenError::format("malformed huffman tree offset"));
        }
        stack.push((right, code | (1 << length), length + 1));
        stack.push((node + 1, code, length + 1));
    }

    if !codes.contains_key(&SENTINEL) {
        return Err(JitenError::format(
            "huffman tree has no end-of-string symbol",
        ));
    }
    Ok(codes)
}
