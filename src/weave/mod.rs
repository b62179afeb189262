//! The augmentation pipeline
//!
//! [`augment`] takes a class through four transformations in a fixed order:
//! marker-interface tagging, member synthesis, method rewriting, and
//! finalization into a [`crate::class::TransformedClass`]. The
//! [`WeaveRegistry`] layers hierarchy coordination on top, feeding each
//! class's result into its descendants.

mod engine;
mod errors;
mod policy;
mod registry;
mod rewriter;
mod synthesizer;

pub use engine::*;
pub use errors::*;
pub use policy::*;
pub use registry::*;
pub use rewriter::*;
pub use synthesizer::*;
