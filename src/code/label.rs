use std::fmt::{Debug, Error as FmtError, Formatter};

/// Opaque label, used to refer to branch targets inside a method body
///
/// Labels carry no meaning beyond identity: two bodies may freely reuse the
/// same indices. Within one body, every label that is the target of a branch
/// must be placed exactly once.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct SynLabel(usize);

impl SynLabel {
    pub const fn new(index: usize) -> SynLabel {
        SynLabel(index)
    }

    pub const fn index(&self) -> usize {
        self.0
    }
}

impl Debug for SynLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "l{}", self.0)
    }
}
