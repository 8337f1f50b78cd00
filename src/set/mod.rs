//! Lazy set algebra over sorted entry-ID streams.
//!
//! Every stream yields strictly ascending `u32` values. Combinators pull from
//! their sources only on demand, so a consumer that stops after the first few
//! results never touches the rest of the input.
//!
//! Streams are cloneable: cloning a stream that has not been advanced yet gives
//! an independent iteration from the start.

pub mod intersection;
pub mod subtraction;
pub mod union;

use std::fmt::Debug;
use std::sync::Arc;

pub use intersection::Intersection;
pub use subtraction::Subtraction;
pub use union::Union;

/// A sorted, duplicate-free source of entry IDs.
pub trait IdIterator: Iterator<Item = u32> + Send + Debug {
    /// Clone this iterator into a new box.
    fn box_clone(&self) -> Box<dyn IdIterator>;
}

impl<T> IdIterator for T
where
    T: Iterator<Item = u32> + Clone + Send + Debug + 'static,
{
    fn box_clone(&self) -> Box<dyn IdIterator> {
        Box::new(self.clone())
    }
}

/// An owned, type-erased ID stream.
#[derive(Debug)]
pub struct IdStream {
    inner: Box<dyn IdIterator>,
    known_empty: bool,
}

impl IdStream {
    /// Wrap any sorted iterator.
    pub fn new<I: IdIterator + 'static>(iter: I) -> Self {
        IdStream {
            inner: Box::new(iter),
            known_empty: false,
        }
    }

    /// A stream with no values.
    pub fn empty() -> Self {
        IdStream {
            inner: Box::new(Empty),
            known_empty: true,
        }
    }

    /// A stream with exactly one value.
    pub fn singleton(id: u32) -> Self {
        IdStream::new(Singleton::new(id))
    }

    /// A stream over an already sorted, duplicate-free array.
    pub fn from_sorted(ids: Arc<[u32]>) -> Self {
        match ids.len() {
            0 => IdStream::empty(),
            1 => IdStream::singleton(ids[0]),
            _ => IdStream::new(Ids::new(ids)),
        }
    }

    /// A stream over a sorted vector.
    pub fn from_vec(ids: Vec<u32>) -> Self {
        IdStream::from_sorted(Arc::from(ids))
    }

    /// Whether this stream is statically known to produce nothing.
    ///
    /// A `false` result does not mean the stream has values.
    pub fn is_known_empty(&self) -> bool {
        self.known_empty
    }
}

impl Clone for IdStream {
    fn clone(&self) -> Self {
        IdStream {
            inner: self.inner.box_clone(),
            known_empty: self.known_empty,
        }
    }
}

impl Iterator for IdStream {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.inner.next()
    }
}

/// Union of any number of streams.
pub fn union(sources: Vec<IdStream>) -> IdStream {
    let mut sources: Vec<IdStream> = sources.into_iter().filter(|s| !s.known_empty).collect();
    match sources.len() {
        0 => IdStream::empty(),
        1 => sources.remove(0),
        _ => IdStream::new(Union::new(sources)),
    }
}

/// Intersection of any number of streams. An empty source list intersects to
/// nothing.
pub fn intersection(mut sources: Vec<IdStream>) -> IdStream {
    if sources.is_empty() || sources.iter().any(|s| s.known_empty) {
        return IdStream::empty();
    }
    if sources.len() == 1 {
        return sources.remove(0);
    }
    IdStream::new(Intersection::new(sources))
}

/// Every value of `add` that is not in `subtract`.
pub fn subtraction(add: IdStream, subtract: IdStream) -> IdStream {
    if add.known_empty || subtract.known_empty {
        return add;
    }
    IdStream::new(Subtraction::new(add, subtract))
}

/// A stream with no values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Empty;

impl Iterator for Empty {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        None
    }
}

/// A one-shot stream.
#[derive(Debug, Clone)]
pub struct Singleton {
    value: Option<u32>,
}

impl Singleton {
    pub fn new(id: u32) -> Self {
        Singleton { value: Some(id) }
    }
}

impl Iterator for Singleton {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.value.take()
    }
}

/// A stream over a shared sorted array.
#[derive(Debug, Clone)]
pub struct Ids {
    ids: Arc<[u32]>,
    position: usize,
}

impl Ids {
    pub fn new(ids: Arc<[u32]>) -> Self {
        Ids { ids, position: 0 }
    }
}

impl Iterator for Ids {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let id = self.ids.get(self.position).copied()?;
        self.position += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.ids.len() - self.position;
        (left, Some(left))
    }
}

/// Insert `id` into a sorted vector unless already present.
pub fn insert_sorted(ids: &mut Vec<u32>, id: u32) {
    if let Err(position) = ids.binary_search(&id) {
        ids.insert(position, id);
    }
}

/// Check that a slice is strictly ascending.
pub fn is_strictly_sorted(ids: &[u32]) -> bool {
    ids.windows(2).all(|pair| pair[0] < pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(ids: &[u32]) -> IdStream {
        IdStream::from_vec(ids.to_vec())
    }

    #[test]
    fn test_base_streams() {
        assert_eq!(IdStream::empty().count(), 0);
        assert_eq!(IdStream::singleton(7).collect::<Vec<_>>(), vec![7]);
        assert_eq!(stream(&[1, 4, 9]).collect::<Vec<_>>(), vec![1, 4, 9]);
        assert!(stream(&[]).is_known_empty());
    }

    #[test]
    fn test_clone_restarts() {
        let original = union(vec![stream(&[1, 3]), stream(&[2, 3, 4])]);
        let copy = original.clone();
        assert_eq!(original.collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(copy.collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_helpers_collapse_trivial_cases() {
        assert!(union(vec![]).is_known_empty());
        assert!(union(vec![IdStream::empty(), IdStream::empty()]).is_known_empty());
        assert!(intersection(vec![]).is_known_empty());
        assert!(intersection(vec![stream(&[1]), IdStream::empty()]).is_known_empty());

        let kept = subtraction(stream(&[1, 2]), IdStream::empty());
        assert_eq!(kept.collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_composition() {
        // (A ∪ B) ∩ C − D
        let a = stream(&[1, 5, 9]);
        let b = stream(&[2, 5, 10]);
        let c = stream(&[1, 2, 3, 9, 10]);
        let d = stream(&[10]);
        let result = subtraction(intersection(vec![union(vec![a, b]), c]), d);
        assert_eq!(result.collect::<Vec<_>>(), vec![1, 2, 9]);
    }

    #[test]
    fn test_insert_sorted() {
        let mut ids = Vec::new();
        for id in [5, 1, 3, 5, 1] {
            insert_sorted(&mut ids, id);
        }
        assert_eq!(ids, vec![1, 3, 5]);
        assert!(is_strictly_sorted(&ids));
        assert!(!is_strictly_sorted(&[1, 1]));
    }
}
