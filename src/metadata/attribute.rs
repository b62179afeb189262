use crate::class::{FieldType, UnqualifiedName};
use crate::weave::WeavePolicy;

/// Description of one mapped attribute of a class
///
/// The per-attribute `weave_*` flags record what the mapping asks for; the
/// class-level [`WeavePolicy`] records what the deployment allows. A
/// transformation is applied only when both agree, which the `weaves_*`
/// predicates below encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    /// Name of the attribute
    pub name: UnqualifiedName,

    /// Declared type, when the mapping layer resolved one
    pub field_type: Option<FieldType>,

    /// Declared getter, for property-access classes
    pub getter_name: Option<UnqualifiedName>,

    /// Declared setter, for property-access classes
    pub setter_name: Option<UnqualifiedName>,

    /// The attribute is declared on a superclass; synthesis happened (or
    /// will happen) at that level, not here
    pub on_superclass: bool,

    /// The attribute has no backing field at all
    pub virtual_property: bool,

    /// The mapping asks for lazy indirection
    pub weave_value_holder: bool,

    /// The mapping asks for change notification
    pub weave_change_tracking: bool,

    /// The mapping asks for partial-fetch guards
    pub weave_fetch_group: bool,
}

impl AttributeDescriptor {
    pub fn new(name: UnqualifiedName, field_type: Option<FieldType>) -> AttributeDescriptor {
        AttributeDescriptor {
            name,
            field_type,
            getter_name: None,
            setter_name: None,
            on_superclass: false,
            virtual_property: false,
            weave_value_holder: false,
            weave_change_tracking: false,
            weave_fetch_group: false,
        }
    }

    pub fn has_backing_field(&self) -> bool {
        !self.virtual_property
    }

    /// Should this attribute get an indirection holder at this level?
    pub fn weaves_value_holder(&self, policy: &WeavePolicy) -> bool {
        policy.weave_lazy
            && self.weave_value_holder
            && !self.on_superclass
            && self.has_backing_field()
    }

    /// Should mutations of this attribute raise change events?
    pub fn weaves_change_tracking(&self, policy: &WeavePolicy) -> bool {
        policy.weave_change_tracking
            && self.weave_change_tracking
            && !self.on_superclass
            && self.has_backing_field()
    }

    /// Should access to this attribute be guarded by fetch-group checks?
    pub fn weaves_fetch_group(&self, policy: &WeavePolicy) -> bool {
        policy.weave_fetch_groups
            && self.weave_fetch_group
            && !self.on_superclass
            && self.has_backing_field()
    }

    /// Does any transformation require intercepting reads and writes?
    pub fn requires_interception(&self, policy: &WeavePolicy) -> bool {
        self.weaves_value_holder(policy)
            || self.weaves_change_tracking(policy)
            || self.weaves_fetch_group(policy)
    }

    /// Is this attribute eligible for the name-based dispatchers?
    pub fn dispatchable(&self) -> bool {
        !self.on_superclass && self.has_backing_field()
    }
}
