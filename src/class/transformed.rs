use crate::class::member::{SyntheticField, SyntheticMember, SyntheticMethod};
use crate::class::names::{BinaryName, Name, UnqualifiedName};
use crate::class::MethodDescriptor;
use crate::code::MethodBody;
use bitflags::bitflags;

bitflags! {
    /// Capabilities a class gained through augmentation
    ///
    /// Capabilities are cumulative down a hierarchy: a class carries both the
    /// bits it earned itself and every bit its ancestors earned, so a single
    /// lookup of the nearest augmented ancestor answers "is this already
    /// supplied above me?".
    pub struct WeaveCapabilities: u16 {
        /// The class went through augmentation at all
        const WOVEN = 0x0001;

        /// At least one attribute is wrapped in an indirection holder
        const LAZY = 0x0002;

        /// Change-notification members are present
        const CHANGE_TRACKING = 0x0004;

        /// Partial-fetch guard members are present
        const FETCH_GROUPS = 0x0008;

        /// Identity bookkeeping members are present
        const IDENTITY = 0x0010;

        /// Name-based attribute dispatchers are present
        const DISPATCHERS = 0x0020;

        /// The external-binding link carrier is present
        const LINKS = 0x0040;

        /// The clone marker interface was added
        const CLONEABLE = 0x0080;
    }
}

/// Method whose declared body was replaced during augmentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenMethod {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub body: MethodBody,
}

/// Output of augmenting one class
///
/// The original class is never mutated; this records everything a backend
/// needs to apply on top of it. An already-augmented input produces a result
/// with no additions and [`TransformedClass::was_already_woven`] set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedClass {
    /// Name of the augmented class
    pub class_name: BinaryName,

    /// Name of its superclass, if it has one
    pub super_class_name: Option<BinaryName>,

    /// Marker interfaces to add, in a fixed order
    pub added_interfaces: Vec<BinaryName>,

    /// Fields and methods to add, in synthesis order
    pub added_members: Vec<SyntheticMember>,

    /// Declared methods whose bodies were replaced
    pub rewritten_methods: Vec<RewrittenMethod>,

    /// Cumulative capabilities of the class after augmentation
    pub capabilities: WeaveCapabilities,
}

impl TransformedClass {
    /// Did the entry guard fire, leaving the class untouched?
    pub fn was_already_woven(&self) -> bool {
        self.capabilities.contains(WeaveCapabilities::WOVEN) && self.added_interfaces.is_empty()
    }

    pub fn has_interface(&self, interface: &BinaryName) -> bool {
        self.added_interfaces.contains(interface)
    }

    pub fn member(&self, name: &str) -> Option<&SyntheticMember> {
        self.added_members
            .iter()
            .find(|member| member.name().as_str() == name)
    }

    pub fn field(&self, name: &str) -> Option<&SyntheticField> {
        self.member(name).and_then(SyntheticMember::as_field)
    }

    pub fn method(&self, name: &str) -> Option<&SyntheticMethod> {
        self.added_members
            .iter()
            .filter_map(SyntheticMember::as_method)
            .find(|method| method.name.as_str() == name)
    }

    pub fn rewritten(&self, name: &str) -> Option<&RewrittenMethod> {
        self.rewritten_methods
            .iter()
            .find(|method| method.name.as_str() == name)
    }
}
