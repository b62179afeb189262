use crate::class::{BinaryName, FieldRef, FieldType, Name};
use crate::metadata::attribute::AttributeDescriptor;
use crate::metadata::errors::DescriptorError;
use crate::metadata::method::MethodDetails;
use std::collections::HashSet;

/// Everything the engine knows about one class under augmentation
///
/// Descriptors are produced by a metadata layer outside this crate (an
/// annotation scanner, a mapping file, a test) and treated as read-only
/// here. Attribute order is meaningful: synthesized members come out in
/// declaration order, so two identical descriptors always augment
/// identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    /// Name of the class under augmentation
    pub class_name: BinaryName,

    /// Name of its superclass, when it has a mapped one
    pub super_class_name: Option<BinaryName>,

    /// Interfaces the class already declares
    pub interfaces: Vec<BinaryName>,

    /// Mapped attributes, in declaration order
    pub attributes: Vec<AttributeDescriptor>,

    /// Declared methods whose bodies are visible to the rewriter
    pub methods: Vec<MethodDetails>,

    /// Embeddable classes share their owner's identity and skip identity
    /// bookkeeping
    pub is_embeddable: bool,

    /// Whether state is reached through fields (`true`) or through declared
    /// accessor methods (`false`)
    pub uses_attribute_access: bool,
}

impl ClassDescriptor {
    pub fn new(class_name: BinaryName, super_class_name: Option<BinaryName>) -> ClassDescriptor {
        ClassDescriptor {
            class_name,
            super_class_name,
            interfaces: vec![],
            attributes: vec![],
            methods: vec![],
            is_embeddable: false,
            uses_attribute_access: true,
        }
    }

    pub fn add_interface(&mut self, interface: BinaryName) {
        self.interfaces.push(interface);
    }

    pub fn add_attribute(&mut self, attribute: AttributeDescriptor) {
        self.attributes.push(attribute);
    }

    pub fn add_method(&mut self, method: MethodDetails) {
        self.methods.push(method);
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.as_str() == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDetails> {
        self.methods.iter().find(|method| method.name.as_str() == name)
    }

    pub fn declares_interface(&self, interface: &BinaryName) -> bool {
        self.interfaces.contains(interface)
    }

    pub fn has_no_arg_constructor(&self) -> bool {
        self.methods.iter().any(MethodDetails::is_no_arg_constructor)
    }

    /// Check the descriptor is structurally sound
    ///
    /// Attribute names must be unique, and no declared attribute or method
    /// may sit in the name segment reserved for synthesized members.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for attribute in &self.attributes {
            if !seen.insert(attribute.name.as_str()) {
                return Err(DescriptorError::DuplicateAttribute {
                    class: self.class_name.clone(),
                    attribute: attribute.name.clone(),
                });
            }
            if attribute.name.is_reserved() {
                return Err(DescriptorError::ReservedName {
                    class: self.class_name.clone(),
                    member: attribute.name.clone(),
                });
            }
        }
        for method in &self.methods {
            if method.name.is_reserved() {
                return Err(DescriptorError::ReservedName {
                    class: self.class_name.clone(),
                    member: method.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Type of an attribute, or the error naming it when unresolved
    pub fn resolved_type<'a>(
        &self,
        attribute: &'a AttributeDescriptor,
    ) -> Result<&'a FieldType, DescriptorError> {
        attribute
            .field_type
            .as_ref()
            .ok_or_else(|| DescriptorError::UnresolvedType {
                class: self.class_name.clone(),
                attribute: attribute.name.clone(),
            })
    }

    /// Reference to the backing field of an attribute
    pub fn backing_field(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<FieldRef, DescriptorError> {
        let field_type = self.resolved_type(attribute)?;
        Ok(FieldRef {
            class: self.class_name.clone(),
            name: attribute.name.clone(),
            descriptor: field_type.clone(),
        })
    }
}

#[cfg(test)]
use crate::class::UnqualifiedName;

#[test]
fn validation_rejects_duplicates_and_reserved_names() {
    let mut descriptor = ClassDescriptor::new(
        BinaryName::from_str_unsafe("com/acme/Order"),
        None,
    );
    descriptor.add_attribute(AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("total"),
        Some(FieldType::INT),
    ));
    assert_eq!(descriptor.validate(), Ok(()));

    descriptor.add_attribute(AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("total"),
        None,
    ));
    assert!(matches!(
        descriptor.validate(),
        Err(DescriptorError::DuplicateAttribute { .. })
    ));

    let mut reserved = ClassDescriptor::new(
        BinaryName::from_str_unsafe("com/acme/Order"),
        None,
    );
    reserved.add_attribute(AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("_woven_total"),
        Some(FieldType::INT),
    ));
    assert!(matches!(
        reserved.validate(),
        Err(DescriptorError::ReservedName { .. })
    ));
}
