//! Lookups over a packed trie.
//!
//! Queries arrive already mapped through the trie's alphabet.

use crate::error::Result;
use crate::index::trie::node::{NodeView, Target, ValueCollector, resolve};
use crate::set::IdStream;

/// Follow `query` from the root.
fn descend(trie: &[u8], query: &[u8]) -> Result<Option<Target>> {
    let mut target = Target::Node(0);
    for &code in query {
        let Target::Node(offset) = target else {
            return Ok(None);
        };
        let node = NodeView::read(trie, offset)?;
        let Some(index) = node.find_child(code) else {
            return Ok(None);
        };
        target = node.child(index)?;
    }
    Ok(Some(target))
}

/// The key equal to `query`.
pub fn exact(trie: &[u8], arrays: &[u8], query: &[u8]) -> Result<IdStream> {
    let value = match descend(trie, query)? {
        None => None,
        Some(Target::Leaf(value)) => Some(value),
        Some(Target::Node(offset)) => NodeView::read(trie, offset)?.value()?,
    };
    match value {
        Some(value) => resolve(value, arrays),
        None => Ok(IdStream::empty()),
    }
}

/// Every key extending `query`, `query` itself included.
pub fn starts_with(trie: &[u8], arrays: &[u8], query: &[u8]) -> Result<IdStream> {
    let Some(target) = descend(trie, query)? else {
        return Ok(IdStream::empty());
    };
    let mut collector = ValueCollector::default();
    collector.add_subtree(target, trie, arrays)?;
    Ok(collector.finish())
}

/// KMP failure function: `fail[i]` is the length of the longest proper prefix
/// of `query[..=i]` that is also its suffix.
fn failure_table(query: &[u8]) -> Vec<usize> {
    let mut fail = vec![0; query.len()];
    let mut matched = 0;
    for i in 1..query.len() {
        while matched > 0 && query[i] != query[matched] {
            matched = fail[matched - 1];
        }
        if query[i] == query[matched] {
            matched += 1;
        }
        fail[i] = matched;
    }
    fail
}

/// Extend a partial match of `state` symbols by `code`.
fn step(query: &[u8], fail: &[usize], mut state: usize, code: u8) -> usize {
    loop {
        if query[state] == code {
            return state + 1;
        }
        if state == 0 {
            return 0;
        }
        state = fail[state - 1];
    }
}

/// Keys ending with `query` (`suffix_only`) or containing it anywhere.
///
/// Every trie path is matched against the query with a KMP automaton, so
/// overlapping and repeated-symbol matches are not missed.
pub fn ends_with_or_contains(
    trie: &[u8],
    arrays: &[u8],
    query: &[u8],
    suffix_only: bool,
) -> Result<IdStream> {
    let fail = failure_table(query);
    let full = query.len();
    let mut collector = ValueCollector::default();

    let mut pending = vec![(0usize, 0usize)];
    while let Some((offset, state)) = pending.pop() {
        let node = NodeView::read(trie, offset)?;
        for (index, &code) in node.child_codes().iter().enumerate() {
            let next = step(query, &fail, state, code);
            let target = node.child(index)?;

            if next < full {
                if let Target::Node(child) = target {
                    pending.push((child, next));
                }
                continue;
            }

            if !suffix_only {
                collector.add_subtree(target, trie, arrays)?;
                continue;
            }
            match target {
                Target::Leaf(value) => collector.add(value, arrays)?,
                Target::Node(child) => {
                    if let Some(value) = NodeView::read(trie, child)?.value()? {
                        collector.add(value, arrays)?;
                    }
                    pending.push((child, fail[full - 1]));
                }
            }
        }
    }

    Ok(collector.finish())
}
