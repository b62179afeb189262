//! Instruction set for synthesized method bodies
//!
//! Synthesized and rewritten bodies are expressed in a small, closed,
//! machine-neutral instruction set; backends lower it to their own encoding.
//! [`BodyBuilder`] is the only intended way to produce a body with branches,
//! since it tracks label freshness and placement.

mod builder;
mod instructions;
mod label;

pub use builder::*;
pub use instructions::*;
pub use label::*;
