use crate::class::{BinaryName, Name, TransformedClass};
use crate::metadata::ClassDescriptor;
use crate::weave::engine::{augment, Ancestry};
use crate::weave::{Error, WeavePolicy};
use elsa::FrozenMap;

/// Weaving results for a whole deployment unit, keyed by class name
///
/// The map is append-only, so a borrowed parent result stays valid while
/// child augmentations are registered behind it; results flow down a
/// hierarchy without cloning. Classes must be fed in inheritance order
/// (parents first): a superclass with no entry is treated as an unwoven
/// root, which is also the right reading for classes extending something
/// outside the deployment unit.
pub struct WeaveRegistry {
    results: FrozenMap<String, Box<TransformedClass>>,
}

impl WeaveRegistry {
    pub fn new() -> WeaveRegistry {
        WeaveRegistry {
            results: FrozenMap::new(),
        }
    }

    /// Augment a class, looking up its ancestor result here
    ///
    /// Feeding the same class name twice keeps the first result, matching
    /// the entry guard's promise that augmentation happens at most once.
    pub fn augment(
        &self,
        descriptor: &ClassDescriptor,
        policy: &WeavePolicy,
    ) -> Result<&TransformedClass, Error> {
        let ancestry = match &descriptor.super_class_name {
            Some(super_name) => match self.results.get(super_name.as_str()) {
                Some(parent) => Ancestry::Woven(parent),
                None => Ancestry::Root,
            },
            None => Ancestry::Root,
        };
        let result = augment(descriptor, policy, ancestry)?;
        log::debug!(
            "registered weave result for {}",
            descriptor.class_name.as_str()
        );
        Ok(self
            .results
            .insert(descriptor.class_name.as_str().to_owned(), Box::new(result)))
    }

    /// Previously registered result for a class
    pub fn result(&self, class_name: &BinaryName) -> Option<&TransformedClass> {
        self.results.get(class_name.as_str())
    }
}

#[cfg(test)]
use crate::class::{FieldType, UnqualifiedName, WeaveCapabilities};
#[cfg(test)]
use crate::metadata::AttributeDescriptor;

#[test]
fn hierarchies_coordinate_through_the_registry() {
    let registry = WeaveRegistry::new();
    let policy = WeavePolicy::new();

    let mut person = ClassDescriptor::new(BinaryName::from_str_unsafe("com/acme/Person"), None);
    let mut name = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("name"),
        Some(FieldType::STRING),
    );
    name.weave_change_tracking = true;
    person.add_attribute(name);
    registry.augment(&person, &policy).unwrap();

    let mut employee = ClassDescriptor::new(
        BinaryName::from_str_unsafe("com/acme/Employee"),
        Some(BinaryName::from_str_unsafe("com/acme/Person")),
    );
    let mut salary = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("salary"),
        Some(FieldType::INT),
    );
    salary.weave_change_tracking = true;
    employee.add_attribute(salary);
    let employee_woven = registry.augment(&employee, &policy).unwrap();

    // the parent result supplied the listener; the child only dispatches
    assert!(employee_woven.field("_woven_listener").is_none());
    assert!(employee_woven
        .capabilities
        .contains(WeaveCapabilities::CHANGE_TRACKING));

    let person_woven = registry
        .result(&BinaryName::from_str_unsafe("com/acme/Person"))
        .unwrap();
    assert!(person_woven.field("_woven_listener").is_some());
}

#[test]
fn unknown_superclasses_root_their_hierarchies() {
    let registry = WeaveRegistry::new();
    let policy = WeavePolicy::new();

    let employee = ClassDescriptor::new(
        BinaryName::from_str_unsafe("com/acme/Employee"),
        Some(BinaryName::from_str_unsafe("com/thirdparty/Base")),
    );
    let woven = registry.augment(&employee, &policy).unwrap();

    // no registry entry for the superclass, so identity lands here
    assert!(woven.field("_woven_primaryKey").is_some());
    assert!(woven.capabilities.contains(WeaveCapabilities::IDENTITY));
}
