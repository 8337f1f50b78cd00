//! Flattening keys into the packed trie layout.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Seek, SeekFrom};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::error::{JitenError, Result};
use crate::index::accumulator::FrozenEntries;
use crate::index::remap_ids;
use crate::index::trie::node::{HAS_VALUE, IMPLICIT_CHILD, PAYLOAD_MASK, ValueRef, node_length};
use crate::index::trie::CompiledTrie;

/// Most distinct code units one trie can hold.
pub const MAX_ALPHABET: usize = 255;

#[derive(Debug, Default)]
struct BuildNode {
    children: BTreeMap<u8, usize>,
    value: Option<ValueRef>,
}

impl BuildNode {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The tree being built. Children always have larger indices than parents.
struct BuildTree {
    nodes: Vec<BuildNode>,
}

impl BuildTree {
    fn is_implicit(&self, index: usize) -> bool {
        let node = &self.nodes[index];
        node.children.len() == 1
            && node
                .children
                .values()
                .all(|&child| !self.nodes[child].is_leaf())
    }

    /// Packed length of one node.
    fn node_length(&self, index: usize) -> usize {
        let node = &self.nodes[index];
        node_length(
            node.children.len(),
            self.is_implicit(index),
            node.value.is_some(),
        )
    }

    /// Packed length of the whole trie. Leaf children occupy no node.
    fn trie_length(&self) -> usize {
        let mut subtree = vec![0usize; self.nodes.len()];
        for index in (0..self.nodes.len()).rev() {
            let children: usize = self.nodes[index]
                .children
                .values()
                .filter(|&&child| !self.nodes[child].is_leaf())
                .map(|&child| subtree[child])
                .sum();
            subtree[index] = self.node_length(index) + children;
        }
        subtree[0]
    }
}

/// Compile frozen keys, applying `remap` to every ID.
pub fn compile(entries: &FrozenEntries, remap: Option<&[u32]>) -> Result<CompiledTrie> {
    let alphabet = build_alphabet(entries)?;
    let code_of = |unit: u16| -> u8 {
        // Every unit of every key is in the alphabet.
        alphabet
            .binary_search_by_key(&unit, |&(u, _)| u)
            .map(|position| alphabet[position].1)
            .unwrap_or(0)
    };

    let mut arrays = Vec::new();
    let mut tree = BuildTree {
        nodes: vec![BuildNode::default()],
    };
    for (key, ids) in entries {
        let mut current = 0;
        for unit in key.encode_utf16() {
            let code = code_of(unit);
            current = match tree.nodes[current].children.get(&code) {
                Some(&child) => child,
                None => {
                    let child = tree.nodes.len();
                    tree.nodes.push(BuildNode::default());
                    tree.nodes[current].children.insert(code, child);
                    child
                }
            };
        }
        let ids = remap_ids(ids, remap)?;
        tree.nodes[current].value = Some(value_ref(&ids, &mut arrays)?);
    }

    let trie = flatten(&tree)?;
    let array_len = arrays.len();
    debug!(
        "compiled trie: {} keys, {} symbols, {} trie bytes, {} array bytes",
        entries.len(),
        alphabet.len(),
        trie.len(),
        array_len
    );

    Ok(CompiledTrie {
        alphabet,
        trie,
        arrays,
        key_count: entries.len(),
    })
}

/// Distinct units in ascending order, each coded by its rank.
fn build_alphabet(entries: &FrozenEntries) -> Result<Vec<(u16, u8)>> {
    let units: BTreeSet<u16> = entries
        .iter()
        .flat_map(|(key, _)| key.encode_utf16())
        .collect();
    if units.len() > MAX_ALPHABET {
        return Err(JitenError::invalid_operation(format!(
            "trie alphabet of {} characters exceeds the limit of {MAX_ALPHABET}",
            units.len()
        )));
    }
    Ok(units
        .into_iter()
        .enumerate()
        .map(|(code, unit)| (unit, code as u8))
        .collect())
}

fn value_ref(ids: &[u32], arrays: &mut Vec<u8>) -> Result<ValueRef> {
    if let [id] = ids {
        if *id <= PAYLOAD_MASK {
            return Ok(ValueRef::inline(*id));
        }
    }

    let offset = u32::try_from(arrays.len())
        .ok()
        .filter(|&offset| offset <= PAYLOAD_MASK)
        .ok_or_else(|| JitenError::invalid_operation("trie array region exceeds 1 GiB"))?;
    arrays.write_i32::<LittleEndian>(ids.len() as i32)?;
    for &id in ids {
        arrays.write_u32::<LittleEndian>(id)?;
    }
    Ok(ValueRef::array(offset))
}

/// Write nodes depth first. Out-of-line children have their parent's slot
/// reserved when the parent is written and patched just before the child is.
fn flatten(tree: &BuildTree) -> Result<Vec<u8>> {
    let expected = tree.trie_length();
    if expected > PAYLOAD_MASK as usize {
        return Err(JitenError::invalid_operation("trie exceeds 1 GiB"));
    }

    let mut out = Cursor::new(Vec::with_capacity(expected));
    let mut pending: Vec<(usize, Option<u64>)> = vec![(0, None)];
    while let Some((index, reserved_slot)) = pending.pop() {
        let position = out.position();
        if let Some(slot) = reserved_slot {
            out.seek(SeekFrom::Start(slot))?;
            out.write_u32::<LittleEndian>(position as u32)?;
            out.seek(SeekFrom::Start(position))?;
        }

        let node = &tree.nodes[index];
        let implicit = tree.is_implicit(index);
        let mut flags = 0;
        if node.value.is_some() {
            flags |= HAS_VALUE;
        }
        if implicit {
            flags |= IMPLICIT_CHILD;
        }
        out.write_u8(node.children.len() as u8)?;
        out.write_u8(flags)?;
        for &code in node.children.keys() {
            out.write_u8(code)?;
        }

        let mut out_of_line = Vec::new();
        if implicit {
            out_of_line.extend(node.children.values().map(|&child| (child, None)));
        } else {
            for &child in node.children.values() {
                let slot = out.position();
                match tree.nodes[child].value {
                    Some(value) if tree.nodes[child].is_leaf() => {
                        out.write_u32::<LittleEndian>(value.0)?;
                    }
                    _ => {
                        out.write_u32::<LittleEndian>(0)?;
                        out_of_line.push((child, Some(slot)));
                    }
                }
            }
        }
        if let Some(value) = node.value {
            out.write_u32::<LittleEndian>(value.0)?;
        }

        pending.extend(out_of_line.into_iter().rev());
    }

    let trie = out.into_inner();
    if trie.len() != expected {
        return Err(JitenError::invalid_operation(format!(
            "trie layout produced {} bytes, expected {expected}",
            trie.len()
        )));
    }
    Ok(trie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entries(pairs: &[(&str, &[u32])]) -> FrozenEntries {
        let mut frozen: FrozenEntries = pairs
            .iter()
            .map(|(key, ids)| (key.to_string(), Arc::from(ids.to_vec())))
            .collect();
        frozen.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        frozen
    }

    #[test]
    fn test_alphabet_is_ranked() {
        let compiled = compile(&entries(&[("cab", &[1])]), None).unwrap();
        assert_eq!(
            compiled.alphabet,
            vec![('a' as u16, 0), ('b' as u16, 1), ('c' as u16, 2)]
        );
    }

    #[test]
    fn test_alphabet_overflow_rejected() {
        let key: String = (0..256u32)
            .filter_map(|i| char::from_u32(0x4E00 + i))
            .collect();
        let err = compile(&entries(&[(key.as_str(), &[1])]), None).unwrap_err();
        assert!(matches!(err, JitenError::InvalidOperation(_)));
    }

    #[test]
    fn test_single_leaf_layout() {
        // Root with one leaf child: the key lives in the root's slot.
        let compiled = compile(&entries(&[("a", &[5])]), None).unwrap();
        let mut expected = vec![1, 0, 0];
        expected.extend_from_slice(&ValueRef::inline(5).0.to_le_bytes());
        assert_eq!(compiled.trie, expected);
        assert!(compiled.arrays.is_empty());
    }

    #[test]
    fn test_implicit_chain_layout() {
        // "ab" -> root(implicit) a(leaf child b)
        let compiled = compile(&entries(&[("ab", &[1, 2])]), None).unwrap();
        let mut expected = vec![1, IMPLICIT_CHILD, 0, 1, 0, 1];
        expected.extend_from_slice(&ValueRef::array(0).0.to_le_bytes());
        assert_eq!(compiled.trie, expected);

        let mut arrays = Vec::new();
        arrays.extend_from_slice(&2i32.to_le_bytes());
        arrays.extend_from_slice(&1u32.to_le_bytes());
        arrays.extend_from_slice(&2u32.to_le_bytes());
        assert_eq!(compiled.arrays, arrays);
    }

    #[test]
    fn test_out_of_line_children_patched() {
        // root has children 'a' (non-leaf, "ab"/"ac") and 'b' (leaf).
        let compiled =
            compile(&entries(&[("ab", &[1]), ("ac", &[2]), ("b", &[3])]), None).unwrap();
        let trie = &compiled.trie;
        // root: count 2, flags 0, codes [0, 1], slots [a-node, leaf 3]
        assert_eq!(&trie[..4], &[2, 0, 0, 1]);
        let a_offset = u32::from_le_bytes(trie[4..8].try_into().unwrap());
        assert_eq!(a_offset, 12);
        assert_eq!(
            u32::from_le_bytes(trie[8..12].try_into().unwrap()),
            ValueRef::inline(3).0
        );
        // 'a' node: two leaf children b=1, c=2.
        assert_eq!(&trie[12..16], &[2, 0, 1, 2]);
        assert_eq!(trie.len(), 12 + 12);
    }
}
