use crate::class::{
    BinaryName, Name, RewrittenMethod, SyntheticMember, TransformedClass, WeaveCapabilities,
};
use crate::metadata::ClassDescriptor;
use crate::runtime::RuntimeSurface;
use crate::weave::rewriter::AccessRewriter;
use crate::weave::synthesizer::{CloneResets, MemberSynthesizer};
use crate::weave::{Error, WeavePolicy};

/// What the engine knows about the class directly above the one being
/// augmented
///
/// Coordination down a hierarchy never inspects ancestor classes themselves;
/// it only needs the ancestor's capability bits, supplied here by whoever
/// drives the augmentation order.
#[derive(Debug, Copy, Clone)]
pub enum Ancestry<'a> {
    /// No augmented ancestor: this class roots its hierarchy
    Root,

    /// The ancestor was augmented earlier in this run
    Woven(&'a TransformedClass),

    /// The ancestor's capabilities are known some other way (for instance
    /// from markers on a class woven in an earlier build)
    Declared(WeaveCapabilities),
}

impl<'a> Ancestry<'a> {
    pub fn capabilities(&self) -> WeaveCapabilities {
        match self {
            Ancestry::Root => WeaveCapabilities::empty(),
            Ancestry::Woven(parent) => parent.capabilities,
            Ancestry::Declared(capabilities) => *capabilities,
        }
    }
}

/// Stations of the augmentation pipeline, in order
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Unweaved,
    InterfaceTagged,
    MembersAdded,
    MethodsRewritten,
    Finalized,
}

/// Drives one class through the augmentation phases
///
/// [`augment`] is the usual entry point; the phase methods are public so a
/// caller can stop between stations and inspect. Phases only move forward,
/// and each method insists (in debug builds) on being called at its station.
pub struct ClassAugmenter<'a> {
    descriptor: &'a ClassDescriptor,
    policy: &'a WeavePolicy,
    runtime: RuntimeSurface,
    phase: Phase,

    /// Capabilities of the nearest augmented ancestor (cumulative)
    ancestor: WeaveCapabilities,

    any_holders: bool,
    adds_change_tracking: bool,
    adds_fetch_groups: bool,
    adds_identity: bool,
    adds_links: bool,
    adds_cloneable: bool,
    roots_dispatchers: bool,

    added_interfaces: Vec<BinaryName>,
    added_members: Vec<SyntheticMember>,
    rewritten_methods: Vec<RewrittenMethod>,
}

impl<'a> ClassAugmenter<'a> {
    /// Validate the descriptor and work out what this class will receive
    ///
    /// Everything decided here and applied in later phases follows one rule:
    /// per-attribute transformations happen at the declaring level, add-once
    /// member groups happen at the first level of the hierarchy that wants
    /// them, and identity bookkeeping happens only at the root.
    pub fn new(
        descriptor: &'a ClassDescriptor,
        policy: &'a WeavePolicy,
        ancestry: Ancestry<'_>,
    ) -> Result<ClassAugmenter<'a>, Error> {
        descriptor.validate()?;
        let runtime = RuntimeSurface::new();
        let ancestor = ancestry.capabilities();
        let is_root = !ancestor.contains(WeaveCapabilities::WOVEN);
        let any_holders = descriptor
            .attributes
            .iter()
            .any(|attribute| attribute.weaves_value_holder(policy));
        let wants_change_tracking = descriptor
            .attributes
            .iter()
            .any(|attribute| attribute.weaves_change_tracking(policy));
        let wants_fetch_groups = descriptor
            .attributes
            .iter()
            .any(|attribute| attribute.weaves_fetch_group(policy));

        Ok(ClassAugmenter {
            descriptor,
            policy,
            runtime,
            phase: Phase::Unweaved,
            ancestor,
            any_holders,
            adds_change_tracking: wants_change_tracking
                && !ancestor.contains(WeaveCapabilities::CHANGE_TRACKING),
            adds_fetch_groups: wants_fetch_groups
                && !ancestor.contains(WeaveCapabilities::FETCH_GROUPS),
            adds_identity: policy.weave_identity && is_root && !descriptor.is_embeddable,
            adds_links: policy.links_enabled() && !ancestor.contains(WeaveCapabilities::LINKS),
            adds_cloneable: policy.weave_identity
                && is_root
                && !descriptor.declares_interface(&BinaryName::CLONEABLE),
            roots_dispatchers: policy.weave_identity
                && !ancestor.contains(WeaveCapabilities::DISPATCHERS),
            added_interfaces: vec![],
            added_members: vec![],
            rewritten_methods: vec![],
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Entry guard: a class carrying the woven marker is left untouched
    pub fn already_woven(&self) -> bool {
        self.descriptor
            .declares_interface(&self.runtime.classes.markers.woven)
    }

    fn noop_result(&self) -> TransformedClass {
        let declared = self
            .runtime
            .classes
            .markers
            .capabilities_of(&self.descriptor.interfaces);
        TransformedClass {
            class_name: self.descriptor.class_name.clone(),
            super_class_name: self.descriptor.super_class_name.clone(),
            added_interfaces: vec![],
            added_members: vec![],
            rewritten_methods: vec![],
            capabilities: declared | self.ancestor | WeaveCapabilities::WOVEN,
        }
    }

    /// First phase: decide the marker interfaces
    pub fn tag_interfaces(&mut self) {
        debug_assert_eq!(self.phase, Phase::Unweaved, "interfaces are tagged first");
        let markers = &self.runtime.classes.markers;
        self.added_interfaces.push(markers.woven.clone());
        if self.any_holders {
            self.added_interfaces.push(markers.woven_lazy.clone());
        }
        if self.adds_change_tracking {
            self.added_interfaces.push(markers.woven_change_tracking.clone());
        }
        if self.adds_fetch_groups {
            self.added_interfaces.push(markers.woven_fetch_groups.clone());
        }
        if self.adds_identity {
            self.added_interfaces.push(markers.woven_identity.clone());
        }
        if self.roots_dispatchers {
            self.added_interfaces.push(markers.woven_object.clone());
        }
        if self.adds_links {
            self.added_interfaces.push(markers.woven_links.clone());
        }
        if self.adds_cloneable {
            self.added_interfaces.push(BinaryName::CLONEABLE);
        }
        log::trace!(
            "{}: tagged {} marker interfaces",
            self.descriptor.class_name.as_str(),
            self.added_interfaces.len()
        );
        self.phase = Phase::InterfaceTagged;
    }

    /// Second phase: synthesize the new members
    ///
    /// Per-attribute members come out in attribute declaration order,
    /// followed by the class-level groups, so the result is stable across
    /// runs.
    pub fn add_members(&mut self) -> Result<(), Error> {
        debug_assert_eq!(
            self.phase,
            Phase::InterfaceTagged,
            "members come after interfaces"
        );
        let synthesizer = MemberSynthesizer::new(self.descriptor, self.policy, &self.runtime);
        let mut members: Vec<SyntheticMember> = vec![];

        for attribute in &self.descriptor.attributes {
            if attribute.weaves_value_holder(self.policy) {
                members.push(SyntheticMember::Field(synthesizer.holder_field(attribute)?));
                members.push(SyntheticMember::Method(synthesizer.holder_initializer(attribute)?));
                members.push(SyntheticMember::Method(synthesizer.holder_getter(attribute)?));
                members.push(SyntheticMember::Method(synthesizer.holder_setter(attribute)?));
            }
            if self.descriptor.uses_attribute_access
                && attribute.requires_interception(self.policy)
            {
                members.push(SyntheticMember::Method(synthesizer.intercepting_getter(attribute)?));
                members.push(SyntheticMember::Method(synthesizer.intercepting_setter(attribute)?));
            }
        }

        if self.adds_change_tracking {
            members.extend(synthesizer.change_tracking_members());
        }
        if self.adds_fetch_groups {
            members.extend(synthesizer.fetch_group_members());
        }
        if self.adds_identity {
            members.extend(synthesizer.identity_members());
        }
        if self.adds_links {
            members.extend(synthesizer.link_members());
        }

        if self.policy.weave_identity {
            let chain_to_super =
                !self.roots_dispatchers && self.descriptor.super_class_name.is_some();
            members.push(SyntheticMember::Method(synthesizer.get_dispatcher(chain_to_super)?));
            members.push(SyntheticMember::Method(synthesizer.set_dispatcher(chain_to_super)?));
            let resets = CloneResets {
                listener: self.adds_change_tracking,
                fetch_group: self.adds_fetch_groups,
                identity: self.adds_identity,
            };
            members.push(SyntheticMember::Method(
                synthesizer.post_clone(chain_to_super, resets),
            ));
            if self.adds_cloneable {
                members.push(SyntheticMember::Method(synthesizer.shallow_clone()));
            }
            if self.descriptor.has_no_arg_constructor() {
                members.push(SyntheticMember::Method(synthesizer.instance_factory()));
            }
        }

        log::trace!(
            "{}: synthesized {} members",
            self.descriptor.class_name.as_str(),
            members.len()
        );
        self.added_members = members;
        self.phase = Phase::MembersAdded;
        Ok(())
    }

    /// Third phase: route declared bodies through the interception layer
    pub fn rewrite_methods(&mut self) -> Result<(), Error> {
        debug_assert_eq!(
            self.phase,
            Phase::MembersAdded,
            "rewriting comes after member synthesis"
        );
        let rewriter = AccessRewriter::new(self.descriptor, self.policy, &self.runtime);
        let rewritten = rewriter.rewrite_class()?;
        if !rewritten.is_empty() {
            log::trace!(
                "{}: rewrote {} method bodies",
                self.descriptor.class_name.as_str(),
                rewritten.len()
            );
        }
        self.rewritten_methods = rewritten;
        self.phase = Phase::MethodsRewritten;
        Ok(())
    }

    /// Final phase: pack everything into the transformation result
    pub fn finish(mut self) -> TransformedClass {
        debug_assert_eq!(
            self.phase,
            Phase::MethodsRewritten,
            "finalization is the last phase"
        );
        self.phase = Phase::Finalized;

        let mut capabilities = self.ancestor | WeaveCapabilities::WOVEN;
        if self.any_holders {
            capabilities |= WeaveCapabilities::LAZY;
        }
        if self.adds_change_tracking {
            capabilities |= WeaveCapabilities::CHANGE_TRACKING;
        }
        if self.adds_fetch_groups {
            capabilities |= WeaveCapabilities::FETCH_GROUPS;
        }
        if self.adds_identity {
            capabilities |= WeaveCapabilities::IDENTITY;
        }
        if self.adds_links {
            capabilities |= WeaveCapabilities::LINKS;
        }
        if self.adds_cloneable {
            capabilities |= WeaveCapabilities::CLONEABLE;
        }
        if self.policy.weave_identity {
            capabilities |= WeaveCapabilities::DISPATCHERS;
        }

        log::debug!(
            "augmented {}: {} interfaces, {} members, {} rewritten methods",
            self.descriptor.class_name.as_str(),
            self.added_interfaces.len(),
            self.added_members.len(),
            self.rewritten_methods.len()
        );
        TransformedClass {
            class_name: self.descriptor.class_name.clone(),
            super_class_name: self.descriptor.super_class_name.clone(),
            added_interfaces: self.added_interfaces,
            added_members: self.added_members,
            rewritten_methods: self.rewritten_methods,
            capabilities,
        }
    }
}

/// Augment one class under a policy
///
/// The descriptor is read, never written; everything the transformation
/// produces lands in the returned [`TransformedClass`]. A class already
/// carrying the woven marker comes back unchanged with
/// [`TransformedClass::was_already_woven`] set, which makes augmentation
/// idempotent however many times a class is fed through.
pub fn augment(
    descriptor: &ClassDescriptor,
    policy: &WeavePolicy,
    ancestry: Ancestry<'_>,
) -> Result<TransformedClass, Error> {
    let mut augmenter = ClassAugmenter::new(descriptor, policy, ancestry)?;
    if augmenter.already_woven() {
        log::debug!(
            "{} is already woven, leaving it untouched",
            descriptor.class_name.as_str()
        );
        return Ok(augmenter.noop_result());
    }
    augmenter.tag_interfaces();
    augmenter.add_members()?;
    augmenter.rewrite_methods()?;
    Ok(augmenter.finish())
}

#[cfg(test)]
use crate::class::{FieldType, UnqualifiedName};
#[cfg(test)]
use crate::metadata::{AttributeDescriptor, DescriptorError};

#[cfg(test)]
fn tracked_class(name: &str, super_name: Option<&str>) -> ClassDescriptor {
    let mut class = ClassDescriptor::new(
        BinaryName::from_str_unsafe(name),
        super_name.map(BinaryName::from_str_unsafe),
    );
    let mut salary = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("salary"),
        Some(FieldType::INT),
    );
    salary.weave_change_tracking = true;
    salary.weave_fetch_group = true;
    class.add_attribute(salary);
    class
}

#[test]
fn root_gets_the_full_member_complement() {
    let class = tracked_class("com/acme/Employee", None);
    let woven = augment(&class, &WeavePolicy::new(), Ancestry::Root).unwrap();

    assert!(!woven.was_already_woven());
    assert!(woven.field("_woven_listener").is_some());
    assert!(woven.field("_woven_fetchGroup").is_some());
    assert!(woven.field("_woven_primaryKey").is_some());
    assert!(woven.method("_woven_get").is_some());
    assert!(woven.method("_woven_set").is_some());
    assert!(woven.method("_woven_postClone").is_some());
    assert!(woven.method("_woven_shallowClone").is_some());
    assert!(woven.has_interface(&BinaryName::CLONEABLE));
    assert!(woven.capabilities.contains(
        WeaveCapabilities::WOVEN
            | WeaveCapabilities::CHANGE_TRACKING
            | WeaveCapabilities::FETCH_GROUPS
            | WeaveCapabilities::IDENTITY
            | WeaveCapabilities::DISPATCHERS
            | WeaveCapabilities::CLONEABLE
    ));
}

#[test]
fn child_does_not_duplicate_ancestor_members() {
    let parent = tracked_class("com/acme/Person", None);
    let parent_woven = augment(&parent, &WeavePolicy::new(), Ancestry::Root).unwrap();

    let mut child = ClassDescriptor::new(
        BinaryName::from_str_unsafe("com/acme/Employee"),
        Some(BinaryName::from_str_unsafe("com/acme/Person")),
    );
    let mut bonus = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("bonus"),
        Some(FieldType::INT),
    );
    bonus.weave_change_tracking = true;
    child.add_attribute(bonus);
    let child_woven = augment(&child, &WeavePolicy::new(), Ancestry::Woven(&parent_woven)).unwrap();

    // the add-once groups stay on the parent
    assert!(child_woven.field("_woven_listener").is_none());
    assert!(child_woven.field("_woven_primaryKey").is_none());
    assert!(child_woven.method("_woven_shallowClone").is_none());
    assert!(!child_woven.has_interface(&BinaryName::CLONEABLE));

    // but the child still gets its own dispatchers, chained upward
    let dispatcher = child_woven.method("_woven_get").unwrap();
    let chains = dispatcher.body.instructions.iter().any(|insn| {
        matches!(
            insn,
            crate::code::Instruction::Invoke(crate::code::InvokeKind::Special, method)
                if method.class.as_str() == "com/acme/Person"
        )
    });
    assert!(chains);

    // capabilities accumulate downward
    assert!(child_woven.capabilities.contains(parent_woven.capabilities));
}

#[test]
fn augmenting_an_already_woven_class_is_a_no_op() {
    let mut class = tracked_class("com/acme/Employee", None);
    let first = augment(&class, &WeavePolicy::new(), Ancestry::Root).unwrap();

    // apply the interface additions, as a backend would, and go again
    class.interfaces.extend(first.added_interfaces.iter().cloned());
    let second = augment(&class, &WeavePolicy::new(), Ancestry::Root).unwrap();

    assert!(second.was_already_woven());
    assert!(second.added_members.is_empty());
    assert!(second.rewritten_methods.is_empty());
    assert!(second.capabilities.contains(
        WeaveCapabilities::WOVEN | WeaveCapabilities::CHANGE_TRACKING | WeaveCapabilities::IDENTITY
    ));
}

#[test]
fn embeddables_share_their_owners_identity() {
    let mut class = tracked_class("com/acme/Address", None);
    class.is_embeddable = true;
    let woven = augment(&class, &WeavePolicy::new(), Ancestry::Root).unwrap();

    assert!(woven.field("_woven_primaryKey").is_none());
    assert!(woven.field("_woven_cacheKey").is_none());
    assert!(!woven.capabilities.contains(WeaveCapabilities::IDENTITY));
    // still a dispatching, cloneable participant
    assert!(woven.method("_woven_get").is_some());
    assert!(woven.method("_woven_postClone").is_some());
}

#[test]
fn declared_ancestry_is_honored() {
    let child = tracked_class(
        "com/acme/Employee",
        Some("com/acme/Person"),
    );
    let inherited = WeaveCapabilities::WOVEN
        | WeaveCapabilities::CHANGE_TRACKING
        | WeaveCapabilities::FETCH_GROUPS
        | WeaveCapabilities::DISPATCHERS;
    let woven = augment(&child, &WeavePolicy::new(), Ancestry::Declared(inherited)).unwrap();

    assert!(woven.field("_woven_listener").is_none());
    assert!(woven.field("_woven_fetchGroup").is_none());
    let dispatcher = woven.method("_woven_set").unwrap();
    let chains = dispatcher.body.instructions.iter().any(|insn| {
        matches!(
            insn,
            crate::code::Instruction::Invoke(crate::code::InvokeKind::Special, method)
                if method.name == UnqualifiedName::SET_ATTRIBUTE
        )
    });
    assert!(chains);
}

#[test]
fn invalid_descriptors_are_rejected_before_any_phase() {
    let mut class = tracked_class("com/acme/Employee", None);
    class.add_attribute(AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("salary"),
        Some(FieldType::INT),
    ));
    let result = augment(&class, &WeavePolicy::new(), Ancestry::Root);
    assert!(matches!(
        result,
        Err(Error::Descriptor(DescriptorError::DuplicateAttribute { .. }))
    ));
}

#[test]
fn links_require_the_binding_capability() {
    let class = tracked_class("com/acme/Employee", None);

    let without = augment(&class, &WeavePolicy::new(), Ancestry::Root).unwrap();
    assert!(without.field("_woven_links").is_none());
    assert!(!without.capabilities.contains(WeaveCapabilities::LINKS));

    let mut policy = WeavePolicy::new();
    policy.binding_present = true;
    let with = augment(&class, &policy, Ancestry::Root).unwrap();
    assert!(with.field("_woven_links").is_some());
    assert!(with.method("_woven_getLinks").is_some());
    assert!(with.capabilities.contains(WeaveCapabilities::LINKS));
}
