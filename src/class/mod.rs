//! Language-neutral model of class shapes
//!
//! This module carries the vocabulary shared by the rest of the crate: names
//! and type descriptors, member references, access flags, and
//! [`TransformedClass`], the value describing everything augmentation added
//! to one class. Nothing here knows about weaving decisions; it is plain
//! data with validation at construction time.

mod access_flags;
mod descriptors;
mod member;
mod names;
mod transformed;

pub use access_flags::*;
pub use descriptors::*;
pub use member::*;
pub use names::*;
pub use transformed::*;
