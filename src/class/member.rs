use crate::class::access_flags::{FieldAccessFlags, MethodAccessFlags};
use crate::class::descriptors::{FieldType, MethodDescriptor};
use crate::class::names::{BinaryName, UnqualifiedName};
use crate::code::MethodBody;

/// Fully-qualified reference to a field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Class on which the field is resolved
    pub class: BinaryName,

    /// Name of the field
    pub name: UnqualifiedName,

    /// Type of the field
    pub descriptor: FieldType,
}

/// Fully-qualified reference to a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Class on which the method is resolved
    pub class: BinaryName,

    /// Name of the method
    pub name: UnqualifiedName,

    /// Signature of the method
    pub descriptor: MethodDescriptor,
}

/// Field synthesized onto an augmented class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticField {
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
    pub access_flags: FieldAccessFlags,
}

impl SyntheticField {
    /// Reference to this field as declared on `owner`
    pub fn reference(&self, owner: &BinaryName) -> FieldRef {
        FieldRef {
            class: owner.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

/// Method synthesized onto an augmented class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticMethod {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub access_flags: MethodAccessFlags,
    pub body: MethodBody,
}

/// Member synthesized onto an augmented class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntheticMember {
    Field(SyntheticField),
    Method(SyntheticMethod),
}

impl SyntheticMember {
    pub fn name(&self) -> &UnqualifiedName {
        match self {
            SyntheticMember::Field(field) => &field.name,
            SyntheticMember::Method(method) => &method.name,
        }
    }

    pub fn as_field(&self) -> Option<&SyntheticField> {
        match self {
            SyntheticMember::Field(field) => Some(field),
            SyntheticMember::Method(_) => None,
        }
    }

    pub fn as_method(&self) -> Option<&SyntheticMethod> {
        match self {
            SyntheticMember::Field(_) => None,
            SyntheticMember::Method(method) => Some(method),
        }
    }
}
