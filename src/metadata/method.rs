use crate::class::{MethodAccessFlags, MethodDescriptor, UnqualifiedName};
use crate::code::MethodBody;

/// Description of one declared method of a class
///
/// Bodies are carried in the neutral instruction set so the access rewriter
/// can walk and replace field accesses without knowing the original
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDetails {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub access_flags: MethodAccessFlags,
    pub body: MethodBody,
}

impl MethodDetails {
    pub fn new(name: UnqualifiedName, descriptor: MethodDescriptor) -> MethodDetails {
        MethodDetails {
            name,
            descriptor,
            access_flags: MethodAccessFlags::PUBLIC,
            body: MethodBody::default(),
        }
    }

    /// Instance or class initializer, exempt from access rewriting
    pub fn is_initializer(&self) -> bool {
        self.name == UnqualifiedName::INIT || self.name == UnqualifiedName::CLINIT
    }

    pub fn is_no_arg_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT && self.descriptor.parameters.is_empty()
    }
}
