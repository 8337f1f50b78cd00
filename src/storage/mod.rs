//! Storage abstraction layer.
//!
//! Dictionary files live behind the [`Storage`] trait so the same build and
//! lookup code runs against a directory on disk or an in-memory map.

pub mod file;
pub mod memory;
pub mod structured;
pub mod traits;

// Re-export commonly used types
pub use file::*;
pub use memory::*;
pub use structured::*;
pub use traits::*;
