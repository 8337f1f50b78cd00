//! K-way union of sorted ID streams.

use super::IdStream;

/// Emits every value present in at least one source, once.
///
/// Each call advances exactly the sources whose current value was the last
/// one emitted, then emits the smallest current value left.
#[derive(Debug, Clone)]
pub struct Union {
    sources: Vec<IdStream>,
    current: Vec<Option<u32>>,
    last: Option<u32>,
    started: bool,
}

impl Union {
    pub fn new(sources: Vec<IdStream>) -> Self {
        let current = vec![None; sources.len()];
        Union {
            sources,
            current,
            last: None,
            started: false,
        }
    }
}

impl Iterator for Union {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if !self.started {
            self.started = true;
            for (slot, source) in self.current.iter_mut().zip(self.sources.iter_mut()) {
                *slot = source.next();
            }
        } else if let Some(last) = self.last {
            for (slot, source) in self.current.iter_mut().zip(self.sources.iter_mut()) {
                if *slot == Some(last) {
                    *slot = source.next();
                }
            }
        }

        self.last = self.current.iter().flatten().min().copied();
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(ids: &[u32]) -> IdStream {
        IdStream::from_vec(ids.to_vec())
    }

    #[test]
    fn test_two_way() {
        let union = Union::new(vec![stream(&[1, 3, 5]), stream(&[2, 3, 6])]);
        assert_eq!(union.collect::<Vec<_>>(), vec![1, 2, 3, 5, 6]);
    }

    #[test]
    fn test_duplicates_across_many_sources() {
        let union = Union::new(vec![
            stream(&[4, 8]),
            stream(&[4]),
            stream(&[1, 4, 8, 9]),
            IdStream::empty(),
        ]);
        assert_eq!(union.collect::<Vec<_>>(), vec![1, 4, 8, 9]);
    }

    #[test]
    fn test_no_sources() {
        assert_eq!(Union::new(Vec::new()).next(), None);
    }

    #[test]
    fn test_stays_exhausted() {
        let mut union = Union::new(vec![stream(&[2])]);
        assert_eq!(union.next(), Some(2));
        assert_eq!(union.next(), None);
        assert_eq!(union.next(), None);
    }

    #[test]
    fn test_extreme_values() {
        let union = Union::new(vec![stream(&[0, u32::MAX]), stream(&[0, 7])]);
        assert_eq!(union.collect::<Vec<_>>(), vec![0, 7, u32::MAX]);
    }
}
