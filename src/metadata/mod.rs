//! Inputs to augmentation: class and attribute descriptors
//!
//! A [`ClassDescriptor`] is the engine's entire view of a class; the engine
//! never inspects real class files or loaded types. Whoever builds the
//! descriptor (annotation scanner, mapping file, test fixture) decides what
//! the engine believes.

mod attribute;
mod class;
mod errors;
mod method;

pub use attribute::*;
pub use class::*;
pub use errors::*;
pub use method::*;
