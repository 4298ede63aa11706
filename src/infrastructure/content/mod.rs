//! Content source/patcher adapters.

pub mod file_patcher;

pub use file_patcher::FileContentPatcher;
