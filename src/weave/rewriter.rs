use crate::class::{MethodRef, Name, RewrittenMethod, UnqualifiedName};
use crate::code::{BodyBuilder, Instruction, InvokeKind, Literal, MethodBody};
use crate::metadata::{ClassDescriptor, DescriptorError, MethodDetails};
use crate::runtime::RuntimeSurface;
use crate::weave::synthesizer::{push_boxed_field_read, push_boxed_local, MemberSynthesizer};
use crate::weave::WeavePolicy;
use std::collections::HashMap;

/// Redirects declared method bodies through the synthesized interception
/// layer
///
/// For attribute-access classes this walks every declared body and replaces
/// field reads and writes of intercepted attributes with calls to the
/// intercepting accessors; the replacement is one instruction for one
/// instruction, so body length and operation order never change. For
/// property-access classes the declared accessors themselves get the
/// guard and notification preamble instead.
///
/// Only fields declared directly on the class under augmentation are
/// touched. Superclass fields were intercepted when the superclass was
/// augmented, and foreign fields are none of our business.
pub struct AccessRewriter<'a> {
    class: &'a ClassDescriptor,
    policy: &'a WeavePolicy,
    synthesizer: MemberSynthesizer<'a>,
}

struct Interception {
    getter: MethodRef,
    setter: MethodRef,
}

impl<'a> AccessRewriter<'a> {
    pub fn new(
        class: &'a ClassDescriptor,
        policy: &'a WeavePolicy,
        runtime: &'a RuntimeSurface,
    ) -> AccessRewriter<'a> {
        AccessRewriter {
            class,
            policy,
            synthesizer: MemberSynthesizer::new(class, policy, runtime),
        }
    }

    /// Rewrite every declared method that needs it
    ///
    /// Untouched methods are absent from the result. Initializers are exempt:
    /// constructor assignments are initial population, not mutation, and
    /// must not raise change events or load anything.
    pub fn rewrite_class(&self) -> Result<Vec<RewrittenMethod>, DescriptorError> {
        let mut rewritten = vec![];
        if self.class.uses_attribute_access {
            let interceptions = self.interceptions()?;
            if interceptions.is_empty() {
                return Ok(rewritten);
            }
            for method in &self.class.methods {
                if method.is_initializer() {
                    continue;
                }
                if let Some(body) = self.rewrite_body(&interceptions, &method.body) {
                    log::trace!(
                        "intercepted field access in {}.{}",
                        self.class.class_name.as_str(),
                        method.name.as_str()
                    );
                    rewritten.push(RewrittenMethod {
                        name: method.name.clone(),
                        descriptor: method.descriptor.clone(),
                        body,
                    });
                }
            }
        } else {
            for method in &self.class.methods {
                if method.is_initializer() {
                    continue;
                }
                if let Some(body) = self.wrap_accessor(method)? {
                    log::trace!(
                        "wrapped accessor {}.{}",
                        self.class.class_name.as_str(),
                        method.name.as_str()
                    );
                    rewritten.push(RewrittenMethod {
                        name: method.name.clone(),
                        descriptor: method.descriptor.clone(),
                        body,
                    });
                }
            }
        }
        Ok(rewritten)
    }

    fn interceptions(&self) -> Result<HashMap<UnqualifiedName, Interception>, DescriptorError> {
        let mut interceptions = HashMap::new();
        for attribute in &self.class.attributes {
            if !attribute.requires_interception(self.policy) {
                continue;
            }
            let (getter, setter) = self.synthesizer.value_accessors(attribute)?;
            interceptions.insert(attribute.name.clone(), Interception { getter, setter });
        }
        Ok(interceptions)
    }

    /// One-for-one replacement of intercepted field operations
    ///
    /// The stack shapes match (a field read and a nullary call both turn the
    /// receiver into the value; a field write and a unary call both consume
    /// value and receiver), so surrounding code is unaffected.
    fn rewrite_body(
        &self,
        interceptions: &HashMap<UnqualifiedName, Interception>,
        body: &MethodBody,
    ) -> Option<MethodBody> {
        let mut changed = false;
        let instructions = body
            .instructions
            .iter()
            .map(|instruction| match instruction {
                Instruction::GetField(field) if field.class == self.class.class_name => {
                    match interceptions.get(&field.name) {
                        Some(interception) => {
                            changed = true;
                            Instruction::Invoke(InvokeKind::Virtual, interception.getter.clone())
                        }
                        None => instruction.clone(),
                    }
                }
                Instruction::PutField(field) if field.class == self.class.class_name => {
                    match interceptions.get(&field.name) {
                        Some(interception) => {
                            changed = true;
                            Instruction::Invoke(InvokeKind::Virtual, interception.setter.clone())
                        }
                        None => instruction.clone(),
                    }
                }
                _ => instruction.clone(),
            })
            .collect();
        if changed {
            Some(MethodBody::new(instructions))
        } else {
            None
        }
    }

    /// Wrap a declared accessor with the guard and notification preamble
    ///
    /// Getter preambles run the fetch guard and make sure the holder exists;
    /// the original body then reads whatever the field currently says. Setter
    /// preambles additionally fire the change event with the pre-store value,
    /// and the wrapped setter pushes the stored value into the holder before
    /// every return so the two never drift apart on the write path.
    fn wrap_accessor(&self, method: &MethodDetails) -> Result<Option<MethodBody>, DescriptorError> {
        for attribute in &self.class.attributes {
            if !attribute.requires_interception(self.policy) {
                continue;
            }
            let is_getter = attribute.getter_name.as_ref() == Some(&method.name);
            let is_setter = attribute.setter_name.as_ref() == Some(&method.name);
            if !is_getter && !is_setter {
                continue;
            }

            let wraps = if is_getter {
                attribute.weaves_fetch_group(self.policy) || attribute.weaves_value_holder(self.policy)
            } else {
                attribute.requires_interception(self.policy)
            };
            if !wraps {
                return Ok(None);
            }

            // fresh labels must sit above anything the original body uses
            let first_free = method.body.max_label_index().map_or(0, |max| max + 1);
            let mut builder = BodyBuilder::starting_at(first_free);

            if attribute.weaves_fetch_group(self.policy) {
                builder.push(Instruction::Load(0));
                builder.push(Instruction::Const(Literal::Name(attribute.name.clone())));
                builder.push(Instruction::Invoke(
                    InvokeKind::Virtual,
                    self.synthesizer.check_fetched_ref(is_setter),
                ));
            }
            if attribute.weaves_value_holder(self.policy) {
                builder.push(Instruction::Load(0));
                builder.push(Instruction::Invoke(
                    InvokeKind::Virtual,
                    self.synthesizer.holder_initializer_ref(attribute),
                ));
            }
            if is_setter && attribute.weaves_change_tracking(self.policy) {
                let backing = self.class.backing_field(attribute)?;
                let field_type = self.class.resolved_type(attribute)?.clone();
                builder.push(Instruction::Load(0));
                builder.push(Instruction::Const(Literal::Name(attribute.name.clone())));
                push_boxed_field_read(&mut builder, &backing);
                push_boxed_local(&mut builder, 1, &field_type);
                builder.push(Instruction::Invoke(
                    InvokeKind::Virtual,
                    self.synthesizer.property_change_ref(),
                ));
            }

            let syncs_holder = is_setter && attribute.weaves_value_holder(self.policy);
            for instruction in &method.body.instructions {
                if syncs_holder && *instruction == Instruction::Return {
                    builder.push(Instruction::Load(0));
                    builder.push(Instruction::GetField(self.synthesizer.holder_field_ref(attribute)));
                    builder.push(Instruction::Load(1));
                    builder.push(Instruction::Invoke(
                        InvokeKind::Interface,
                        self.synthesizer.holder_members().set_value.clone(),
                    ));
                }
                builder.push(instruction.clone());
            }
            return Ok(Some(builder.finish()));
        }
        Ok(None)
    }
}

#[cfg(test)]
use crate::class::{BinaryName, FieldRef, FieldType, MethodDescriptor};
#[cfg(test)]
use crate::metadata::AttributeDescriptor;

#[cfg(test)]
fn order_class() -> (ClassDescriptor, FieldRef, FieldRef) {
    let class_name = BinaryName::from_str_unsafe("com/acme/Order");
    let mut class = ClassDescriptor::new(class_name.clone(), None);

    let mut address = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("address"),
        Some(FieldType::object(BinaryName::from_str_unsafe("com/acme/Address"))),
    );
    address.weave_value_holder = true;
    class.add_attribute(address);
    class.add_attribute(AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("note"),
        Some(FieldType::STRING),
    ));

    let address_field = FieldRef {
        class: class_name.clone(),
        name: UnqualifiedName::from_str_unsafe("address"),
        descriptor: FieldType::object(BinaryName::from_str_unsafe("com/acme/Address")),
    };
    let note_field = FieldRef {
        class: class_name,
        name: UnqualifiedName::from_str_unsafe("note"),
        descriptor: FieldType::STRING,
    };
    (class, address_field, note_field)
}

#[test]
fn rewriting_preserves_instruction_order() {
    let (mut class, address_field, note_field) = order_class();
    let mut method = MethodDetails::new(
        UnqualifiedName::from_str_unsafe("summarize"),
        MethodDescriptor::nullary(),
    );
    method.body = MethodBody::new(vec![
        Instruction::Load(0),
        Instruction::GetField(address_field.clone()),
        Instruction::Pop,
        Instruction::Load(0),
        Instruction::GetField(note_field.clone()),
        Instruction::Pop,
        Instruction::Load(0),
        Instruction::Load(1),
        Instruction::PutField(address_field),
        Instruction::Return,
    ]);
    class.add_method(method);

    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let rewriter = AccessRewriter::new(&class, &policy, &runtime);
    let rewritten = rewriter.rewrite_class().unwrap();
    assert_eq!(rewritten.len(), 1);

    let body = &rewritten[0].body;
    assert_eq!(body.len(), 10);
    assert!(matches!(
        &body.instructions[1],
        Instruction::Invoke(InvokeKind::Virtual, method)
            if method.name.as_str() == "_woven_get_address"
    ));
    // the untracked attribute and everything around it are untouched
    assert_eq!(body.instructions[4], Instruction::GetField(note_field));
    assert_eq!(body.instructions[2], Instruction::Pop);
    assert!(matches!(
        &body.instructions[8],
        Instruction::Invoke(InvokeKind::Virtual, method)
            if method.name.as_str() == "_woven_set_address"
    ));
}

#[test]
fn foreign_and_inherited_fields_are_left_alone() {
    let (mut class, _, _) = order_class();
    let foreign = FieldRef {
        class: BinaryName::from_str_unsafe("com/acme/Invoice"),
        name: UnqualifiedName::from_str_unsafe("address"),
        descriptor: FieldType::object(BinaryName::from_str_unsafe("com/acme/Address")),
    };
    let mut method = MethodDetails::new(
        UnqualifiedName::from_str_unsafe("inspect"),
        MethodDescriptor::nullary(),
    );
    method.body = MethodBody::new(vec![
        Instruction::Load(1),
        Instruction::GetField(foreign),
        Instruction::Pop,
        Instruction::Return,
    ]);
    class.add_method(method);

    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let rewriter = AccessRewriter::new(&class, &policy, &runtime);
    // same attribute name on another class: no match, so no rewrite at all
    assert!(rewriter.rewrite_class().unwrap().is_empty());
}

#[test]
fn initializers_are_exempt_from_interception() {
    let (mut class, address_field, _) = order_class();
    let mut constructor = MethodDetails::new(
        UnqualifiedName::INIT,
        MethodDescriptor::nullary(),
    );
    constructor.body = MethodBody::new(vec![
        Instruction::Load(0),
        Instruction::Const(Literal::Null),
        Instruction::PutField(address_field),
        Instruction::Return,
    ]);
    class.add_method(constructor);

    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let rewriter = AccessRewriter::new(&class, &policy, &runtime);
    assert!(rewriter.rewrite_class().unwrap().is_empty());
}

#[test]
fn property_accessors_gain_a_preamble() {
    let class_name = BinaryName::from_str_unsafe("com/acme/Order");
    let mut class = ClassDescriptor::new(class_name.clone(), None);
    class.uses_attribute_access = false;

    let mut address = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("address"),
        Some(FieldType::object(BinaryName::from_str_unsafe("com/acme/Address"))),
    );
    address.weave_value_holder = true;
    address.weave_change_tracking = true;
    address.getter_name = Some(UnqualifiedName::from_str_unsafe("getAddress"));
    address.setter_name = Some(UnqualifiedName::from_str_unsafe("setAddress"));
    class.add_attribute(address);

    let backing = FieldRef {
        class: class_name,
        name: UnqualifiedName::from_str_unsafe("address"),
        descriptor: FieldType::object(BinaryName::from_str_unsafe("com/acme/Address")),
    };
    let mut getter = MethodDetails::new(
        UnqualifiedName::from_str_unsafe("getAddress"),
        MethodDescriptor {
            parameters: vec![],
            return_type: Some(backing.descriptor.clone()),
        },
    );
    getter.body = MethodBody::new(vec![
        Instruction::Load(0),
        Instruction::GetField(backing.clone()),
        Instruction::ReturnValue,
    ]);
    let original_len = getter.body.len();
    let mut setter = MethodDetails::new(
        UnqualifiedName::from_str_unsafe("setAddress"),
        MethodDescriptor {
            parameters: vec![backing.descriptor.clone()],
            return_type: None,
        },
    );
    setter.body = MethodBody::new(vec![
        Instruction::Load(0),
        Instruction::Load(1),
        Instruction::PutField(backing),
        Instruction::Return,
    ]);
    class.add_method(getter);
    class.add_method(setter);

    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let rewriter = AccessRewriter::new(&class, &policy, &runtime);
    let rewritten = rewriter.rewrite_class().unwrap();
    assert_eq!(rewritten.len(), 2);

    let wrapped_getter = &rewritten[0];
    assert_eq!(wrapped_getter.name.as_str(), "getAddress");
    // preamble first, then the original body verbatim
    assert!(wrapped_getter.body.len() > original_len);
    let tail = &wrapped_getter.body.instructions[wrapped_getter.body.len() - original_len..];
    assert_eq!(tail[original_len - 1], Instruction::ReturnValue);
    // reads come off the live field, never a holder refresh
    assert!(!wrapped_getter
        .body
        .instructions
        .iter()
        .any(|insn| matches!(insn, Instruction::PutField(_))));

    let wrapped_setter = &rewritten[1];
    let notifies = wrapped_setter.body.instructions.iter().any(|insn| {
        matches!(
            insn,
            Instruction::Invoke(_, method) if method.name == UnqualifiedName::PROPERTY_CHANGE
        )
    });
    assert!(notifies);
    // the stored value lands in the holder right before returning
    let body = &wrapped_setter.body.instructions;
    assert_eq!(body[body.len() - 1], Instruction::Return);
    assert!(matches!(
        &body[body.len() - 2],
        Instruction::Invoke(InvokeKind::Interface, method) if method.name.as_str() == "setValue"
    ));
}
