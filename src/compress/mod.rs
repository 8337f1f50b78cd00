//! String compression for dictionary record files.

pub mod bits;
pub mod huffman;

pub use huffman::{SENTINEL, StringCompressor};
