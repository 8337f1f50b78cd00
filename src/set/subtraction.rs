//! Sorted set difference.

use super::IdStream;

/// Emits every value of `add` that does not appear in `subtract`.
#[derive(Debug, Clone)]
pub struct Subtraction {
    add: IdStream,
    subtract: IdStream,
    subtract_current: Option<u32>,
    started: bool,
}

impl Subtraction {
    pub fn new(add: IdStream, subtract: IdStream) -> Self {
        Subtraction {
            add,
            subtract,
            subtract_current: None,
            started: false,
        }
    }
}

impl Iterator for Subtraction {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if !self.started {
            self.started = true;
            self.subtract_current = self.subtract.next();
        }

        loop {
            let candidate = self.add.next()?;
            while let Some(removed) = self.subtract_current {
                if removed >= candidate {
                    break;
                }
                self.subtract_current = self.subtract.next();
            }
            if self.subtract_current != Some(candidate) {
                return Some(candidate);
            }
        }
    }
}
