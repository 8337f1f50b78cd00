//! K-way leapfrog intersection of sorted ID streams.

use super::IdStream;

/// Emits the values present in every source.
///
/// After advancing all sources, the largest current value becomes the
/// candidate. Sources behind it catch up; a source that overshoots raises the
/// candidate and the catch-up restarts from the first source.
#[derive(Debug, Clone)]
pub struct Intersection {
    sources: Vec<IdStream>,
    current: Vec<u32>,
    exhausted: bool,
}

impl Intersection {
    pub fn new(sources: Vec<IdStream>) -> Self {
        let current = vec![0; sources.len()];
        let exhausted = sources.is_empty();
        Intersection {
            sources,
            current,
            exhausted,
        }
    }

    fn advance(&mut self, index: usize) -> Option<u32> {
        match self.sources[index].next() {
            Some(value) => {
                self.current[index] = value;
                Some(value)
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl Iterator for Intersection {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.exhausted {
            return None;
        }

        for index in 0..self.sources.len() {
            self.advance(index)?;
        }
        let mut candidate = self.current.iter().copied().max()?;

        let mut index = 0;
        while index < self.sources.len() {
            while self.current[index] < candidate {
                self.advance(index)?;
            }
            if self.current[index] > candidate {
                candidate = self.current[index];
                index = 0;
                continue;
            }
            index += 1;
        }

        Some(candidate)
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
        let both = Intersection::new(vec![stream(&[1, 3, 5, 7]), stream(&[3, 4, 7, 8])]);
        assert_eq!(both.collect::<Vec<_>>(), vec![3, 7]);
    }

    #[test]
    fn test_candidate_restart() {
        // The third source overshoots and forces the first two to catch up again.
        let all = Intersection::new(vec![
            stream(&[1, 2, 6, 10, 20]),
            stream(&[2, 6, 10, 11, 20]),
            stream(&[6, 10, 20]),
        ]);
        assert_eq!(all.collect::<Vec<_>>(), vec![6, 10, 20]);
    }

    #[test]
    fn test_disjoint_and_empty() {
        let none = Intersection::new(vec![stream(&[1, 3]), stream(&[2, 4])]);
        assert_eq!(none.count(), 0);

        let with_empty = Intersection::new(vec![stream(&[1]), IdStream::empty()]);
        assert_eq!(with_empty.count(), 0);

        assert_eq!(Intersection::new(Vec::new()).next(), None);
    }

    #[test]
    fn test_single_source_passthrough() {
        let one = Intersection::new(vec![stream(&[2, 4, 8])]);
        assert_eq!(one.collect::<Vec<_>>(), vec![2, 4, 8]);
    }
}
