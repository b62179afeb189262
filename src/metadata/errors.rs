use crate::class::{BinaryName, UnqualifiedName};

/// Ways a class descriptor can be unusable for augmentation
///
/// Every variant names the class (and where relevant the attribute) at
/// fault, so an orchestrator weaving hundreds of classes can report failures
/// without extra bookkeeping. Raising any of these aborts the class as a
/// whole; no partial augmentation is ever produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Two attributes on the same descriptor share a name
    DuplicateAttribute {
        class: BinaryName,
        attribute: UnqualifiedName,
    },

    /// A declared member name falls in the segment reserved for synthesis
    ReservedName {
        class: BinaryName,
        member: UnqualifiedName,
    },

    /// An operation needed the attribute's type, but none was recorded
    UnresolvedType {
        class: BinaryName,
        attribute: UnqualifiedName,
    },

    /// Indirection was requested on an attribute that is not class-typed
    PrimitiveIndirection {
        class: BinaryName,
        attribute: UnqualifiedName,
    },

    /// A property-access attribute is missing a declared getter or setter
    MissingAccessor {
        class: BinaryName,
        attribute: UnqualifiedName,
    },
}
