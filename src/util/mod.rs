//! Utility modules for Jiten.

pub mod hash;
pub mod primes;
pub mod varint;

// Re-export commonly used types
pub use hash::*;
pub use primes::*;
pub use varint::*;
