//! Registry abstractions for scarce hardware resources.
//!
//! - [`RefMap`]: reference-counted map that never auto-vivifies entries and
//!   hands ownership of a value back to the caller when its last reference
//!   is released

mod ref_map;

pub use ref_map::{RefMap, RefMapError, Release};
