use crate::class::{
    FieldAccessFlags, FieldRef, FieldType, MethodAccessFlags, MethodDescriptor, MethodRef,
    SyntheticField, SyntheticMember, SyntheticMethod, UnqualifiedName,
};
use crate::code::{BodyBuilder, Instruction, InvokeKind, Literal, Test};
use crate::metadata::{AttributeDescriptor, ClassDescriptor, DescriptorError};
use crate::runtime::{HolderMembers, RuntimeSurface};
use crate::weave::WeavePolicy;

/// Produces the members augmentation adds to one class
///
/// Synthesis is pure: the same descriptor, policy, and runtime surface
/// always produce the same members with the same bodies, which is what makes
/// whole-class augmentation repeatable. Nothing here decides *whether* a
/// member should exist on the class; the engine makes those calls and asks
/// this type for the member shapes.
pub struct MemberSynthesizer<'a> {
    class: &'a ClassDescriptor,
    policy: &'a WeavePolicy,
    runtime: &'a RuntimeSurface,
}

/// Root-level fields nulled out at the end of a synthesized post-clone
#[derive(Debug, Copy, Clone, Default)]
pub struct CloneResets {
    pub listener: bool,
    pub fetch_group: bool,
    pub identity: bool,
}

fn field_flags() -> FieldAccessFlags {
    FieldAccessFlags::PROTECTED | FieldAccessFlags::TRANSIENT | FieldAccessFlags::SYNTHETIC
}

fn method_flags() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC | MethodAccessFlags::SYNTHETIC
}

/// Push the value of a field off the receiver, boxing primitives
pub(crate) fn push_boxed_field_read(body: &mut BodyBuilder, field: &FieldRef) {
    match &field.descriptor {
        FieldType::Base(base) => {
            let wrapper = base.boxed_class();
            body.push(Instruction::New(wrapper.clone()));
            body.push(Instruction::Dup);
            body.push(Instruction::Load(0));
            body.push(Instruction::GetField(field.clone()));
            body.push(Instruction::Invoke(
                InvokeKind::Special,
                MethodRef {
                    class: wrapper,
                    name: UnqualifiedName::INIT,
                    descriptor: base.boxing_constructor(),
                },
            ));
        }
        _ => {
            body.push(Instruction::Load(0));
            body.push(Instruction::GetField(field.clone()));
        }
    }
}

/// Push the value of a local slot, boxing primitives
pub(crate) fn push_boxed_local(body: &mut BodyBuilder, slot: u16, field_type: &FieldType) {
    match field_type {
        FieldType::Base(base) => {
            let wrapper = base.boxed_class();
            body.push(Instruction::New(wrapper.clone()));
            body.push(Instruction::Dup);
            body.push(Instruction::Load(slot));
            body.push(Instruction::Invoke(
                InvokeKind::Special,
                MethodRef {
                    class: wrapper,
                    name: UnqualifiedName::INIT,
                    descriptor: base.boxing_constructor(),
                },
            ));
        }
        _ => {
            body.push(Instruction::Load(slot));
        }
    }
}

impl<'a> MemberSynthesizer<'a> {
    pub fn new(
        class: &'a ClassDescriptor,
        policy: &'a WeavePolicy,
        runtime: &'a RuntimeSurface,
    ) -> MemberSynthesizer<'a> {
        MemberSynthesizer {
            class,
            policy,
            runtime,
        }
    }

    fn own_field(&self, name: UnqualifiedName, descriptor: FieldType) -> FieldRef {
        FieldRef {
            class: self.class.class_name.clone(),
            name,
            descriptor,
        }
    }

    fn own_method(&self, name: UnqualifiedName, descriptor: MethodDescriptor) -> MethodRef {
        MethodRef {
            class: self.class.class_name.clone(),
            name,
            descriptor,
        }
    }

    fn super_method(&self, name: UnqualifiedName, descriptor: MethodDescriptor) -> Option<MethodRef> {
        self.class.super_class_name.as_ref().map(|super_name| MethodRef {
            class: super_name.clone(),
            name,
            descriptor,
        })
    }

    fn holder_type(&self) -> FieldType {
        FieldType::object(self.runtime.classes.value_holder.clone())
    }

    pub(crate) fn holder_members(&self) -> &HolderMembers {
        &self.runtime.members.holder
    }

    pub(crate) fn holder_field_ref(&self, attribute: &AttributeDescriptor) -> FieldRef {
        self.own_field(
            UnqualifiedName::holder_field(&attribute.name),
            self.holder_type(),
        )
    }

    pub(crate) fn holder_initializer_ref(&self, attribute: &AttributeDescriptor) -> MethodRef {
        self.own_method(
            UnqualifiedName::holder_initializer(&attribute.name),
            MethodDescriptor::nullary(),
        )
    }

    pub(crate) fn check_fetched_ref(&self, for_set: bool) -> MethodRef {
        let name = if for_set {
            UnqualifiedName::CHECK_FETCHED_FOR_SET
        } else {
            UnqualifiedName::CHECK_FETCHED
        };
        self.own_method(
            name,
            MethodDescriptor {
                parameters: vec![FieldType::STRING],
                return_type: None,
            },
        )
    }

    pub(crate) fn property_change_ref(&self) -> MethodRef {
        self.own_method(
            UnqualifiedName::PROPERTY_CHANGE,
            MethodDescriptor {
                parameters: vec![FieldType::STRING, FieldType::OBJECT, FieldType::OBJECT],
                return_type: None,
            },
        )
    }

    /// True value accessors of an attribute, as seen by holder code
    ///
    /// For attribute access these are the synthesized intercepting pair; for
    /// property access they are the declared getter and setter, which must
    /// both be named on the descriptor.
    pub(crate) fn value_accessors(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<(MethodRef, MethodRef), DescriptorError> {
        let field_type = self.class.resolved_type(attribute)?.clone();
        let getter_descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: Some(field_type.clone()),
        };
        let setter_descriptor = MethodDescriptor {
            parameters: vec![field_type],
            return_type: None,
        };
        if self.class.uses_attribute_access {
            Ok((
                self.own_method(UnqualifiedName::value_getter(&attribute.name), getter_descriptor),
                self.own_method(UnqualifiedName::value_setter(&attribute.name), setter_descriptor),
            ))
        } else {
            let missing = || DescriptorError::MissingAccessor {
                class: self.class.class_name.clone(),
                attribute: attribute.name.clone(),
            };
            let getter_name = attribute.getter_name.clone().ok_or_else(missing)?;
            let setter_name = attribute.setter_name.clone().ok_or_else(missing)?;
            Ok((
                self.own_method(getter_name, getter_descriptor),
                self.own_method(setter_name, setter_descriptor),
            ))
        }
    }

    /// The transient field holding an attribute's indirection holder
    pub fn holder_field(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<SyntheticField, DescriptorError> {
        let field_type = self.class.resolved_type(attribute)?;
        if !matches!(field_type, FieldType::Object(_)) {
            return Err(DescriptorError::PrimitiveIndirection {
                class: self.class.class_name.clone(),
                attribute: attribute.name.clone(),
            });
        }
        Ok(SyntheticField {
            name: UnqualifiedName::holder_field(&attribute.name),
            descriptor: self.holder_type(),
            access_flags: field_flags(),
        })
    }

    /// Lazily fills in the holder field when it is still null
    ///
    /// A holder created here wraps whatever value the backing field already
    /// has and is flagged newly-created, which later makes the holder getter
    /// reconcile against the true value before handing the holder out. The
    /// initial value is read straight off the field: value accessors call
    /// back into initialization, so using them here would recurse.
    pub fn holder_initializer(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<SyntheticMethod, DescriptorError> {
        let holder = self.holder_field_ref(attribute);
        let members = &self.runtime.members.holder;
        let mut body = BodyBuilder::new();
        let initialized = body.fresh_label();

        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(holder.clone()));
        body.push(Instruction::Branch(Test::NonNull, initialized));

        body.push(Instruction::Load(0));
        body.push(Instruction::New(self.runtime.classes.simple_value_holder.clone()));
        body.push(Instruction::Dup);
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(self.class.backing_field(attribute)?));
        body.push(Instruction::Invoke(InvokeKind::Special, members.init.clone()));
        body.push(Instruction::PutField(holder.clone()));

        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(holder));
        body.push(Instruction::Const(Literal::Bool(true)));
        body.push(Instruction::Invoke(
            InvokeKind::Interface,
            members.set_newly_created.clone(),
        ));

        body.place_label(initialized);
        body.push(Instruction::Return);

        Ok(SyntheticMethod {
            name: UnqualifiedName::holder_initializer(&attribute.name),
            descriptor: MethodDescriptor::nullary(),
            access_flags: method_flags(),
            body: body.finish(),
        })
    }

    /// Accessor handing out the attribute's holder itself
    ///
    /// Before returning, the holder is reconciled against the true attribute
    /// value: if the holder is coordinated (or was synthesized around an
    /// existing value) and the value drifted, the drifted value is pushed
    /// back in through the value setter. Comparison is by reference.
    pub fn holder_getter(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<SyntheticMethod, DescriptorError> {
        let holder = self.holder_field_ref(attribute);
        let (getter, setter) = self.value_accessors(attribute)?;
        let members = &self.runtime.members.holder;
        let mut body = BodyBuilder::new();
        let reconcile = body.fresh_label();
        let done = body.fresh_label();

        body.push(Instruction::Load(0));
        body.push(Instruction::Invoke(
            InvokeKind::Virtual,
            self.holder_initializer_ref(attribute),
        ));

        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(holder.clone()));
        body.push(Instruction::Invoke(InvokeKind::Interface, members.is_coordinated.clone()));
        body.push(Instruction::Branch(Test::True, reconcile));
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(holder.clone()));
        body.push(Instruction::Invoke(
            InvokeKind::Interface,
            members.is_newly_created.clone(),
        ));
        body.push(Instruction::Branch(Test::False, done));

        body.place_label(reconcile);
        body.push(Instruction::Load(0));
        body.push(Instruction::Invoke(InvokeKind::Virtual, getter));
        body.push(Instruction::Store(1));
        body.push(Instruction::Load(1));
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(holder.clone()));
        body.push(Instruction::Invoke(InvokeKind::Interface, members.get_value.clone()));
        body.push(Instruction::Branch(Test::RefEq, done));
        body.push(Instruction::Load(0));
        body.push(Instruction::Load(1));
        body.push(Instruction::Invoke(InvokeKind::Virtual, setter));

        body.place_label(done);
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(holder));
        body.push(Instruction::ReturnValue);

        Ok(SyntheticMethod {
            name: UnqualifiedName::holder_getter(&attribute.name),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(self.holder_type()),
            },
            access_flags: method_flags(),
            body: body.finish(),
        })
    }

    /// Accessor installing a replacement holder for the attribute
    ///
    /// An instantiated replacement also pulls its value out into the
    /// attribute (through the value setter, so tracking still fires); an
    /// uninstantiated one clears the backing field instead, so the next read
    /// goes through the holder.
    pub fn holder_setter(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<SyntheticMethod, DescriptorError> {
        let holder = self.holder_field_ref(attribute);
        let backing = self.class.backing_field(attribute)?;
        let field_type = self.class.resolved_type(attribute)?.clone();
        let (getter, setter) = self.value_accessors(attribute)?;
        let members = &self.runtime.members.holder;
        let mut body = BodyBuilder::new();
        let uninstantiated = body.fresh_label();
        let done = body.fresh_label();

        body.push(Instruction::Load(0));
        body.push(Instruction::Load(1));
        body.push(Instruction::PutField(holder));

        body.push(Instruction::Load(1));
        body.push(Instruction::Invoke(
            InvokeKind::Interface,
            members.is_instantiated.clone(),
        ));
        body.push(Instruction::Branch(Test::False, uninstantiated));

        body.push(Instruction::Load(0));
        body.push(Instruction::Invoke(InvokeKind::Virtual, getter));
        body.push(Instruction::Store(2));
        body.push(Instruction::Load(1));
        body.push(Instruction::Invoke(InvokeKind::Interface, members.get_value.clone()));
        body.push(Instruction::Store(3));
        body.push(Instruction::Load(2));
        body.push(Instruction::Load(3));
        body.push(Instruction::Branch(Test::RefEq, done));
        body.push(Instruction::Load(0));
        body.push(Instruction::Load(3));
        body.push(Instruction::Cast(field_type));
        body.push(Instruction::Invoke(InvokeKind::Virtual, setter));
        body.push(Instruction::Jump(done));

        body.place_label(uninstantiated);
        body.push(Instruction::Load(0));
        body.push(Instruction::Const(Literal::Null));
        body.push(Instruction::PutField(backing));

        body.place_label(done);
        body.push(Instruction::Return);

        Ok(SyntheticMethod {
            name: UnqualifiedName::holder_setter(&attribute.name),
            descriptor: MethodDescriptor {
                parameters: vec![self.holder_type()],
                return_type: None,
            },
            access_flags: method_flags(),
            body: body.finish(),
        })
    }

    /// Intercepting value getter, for attribute-access classes
    pub fn intercepting_getter(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<SyntheticMethod, DescriptorError> {
        let backing = self.class.backing_field(attribute)?;
        let field_type = self.class.resolved_type(attribute)?.clone();
        let mut body = BodyBuilder::new();

        if attribute.weaves_fetch_group(self.policy) {
            body.push(Instruction::Load(0));
            body.push(Instruction::Const(Literal::Name(attribute.name.clone())));
            body.push(Instruction::Invoke(InvokeKind::Virtual, self.check_fetched_ref(false)));
        }
        if attribute.weaves_value_holder(self.policy) {
            body.push(Instruction::Load(0));
            body.push(Instruction::Invoke(
                InvokeKind::Virtual,
                self.holder_initializer_ref(attribute),
            ));
            body.push(Instruction::Load(0));
            body.push(Instruction::Load(0));
            body.push(Instruction::GetField(self.holder_field_ref(attribute)));
            body.push(Instruction::Invoke(
                InvokeKind::Interface,
                self.runtime.members.holder.get_value.clone(),
            ));
            body.push(Instruction::Cast(field_type.clone()));
            body.push(Instruction::PutField(backing.clone()));
        }
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(backing));
        body.push(Instruction::ReturnValue);

        Ok(SyntheticMethod {
            name: UnqualifiedName::value_getter(&attribute.name),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(field_type),
            },
            access_flags: method_flags(),
            body: body.finish(),
        })
    }

    /// Intercepting value setter, for attribute-access classes
    ///
    /// Ordering is load-bearing: guards run first, the change event sees the
    /// old value before the store, and the holder hears about the new value
    /// after it.
    pub fn intercepting_setter(
        &self,
        attribute: &AttributeDescriptor,
    ) -> Result<SyntheticMethod, DescriptorError> {
        let backing = self.class.backing_field(attribute)?;
        let field_type = self.class.resolved_type(attribute)?.clone();
        let mut body = BodyBuilder::new();

        if attribute.weaves_fetch_group(self.policy) {
            body.push(Instruction::Load(0));
            body.push(Instruction::Const(Literal::Name(attribute.name.clone())));
            body.push(Instruction::Invoke(InvokeKind::Virtual, self.check_fetched_ref(true)));
        }
        if attribute.weaves_value_holder(self.policy) {
            body.push(Instruction::Load(0));
            body.push(Instruction::Invoke(
                InvokeKind::Virtual,
                self.holder_initializer_ref(attribute),
            ));
        }
        if attribute.weaves_change_tracking(self.policy) {
            body.push(Instruction::Load(0));
            body.push(Instruction::Const(Literal::Name(attribute.name.clone())));
            push_boxed_field_read(&mut body, &backing);
            push_boxed_local(&mut body, 1, &field_type);
            body.push(Instruction::Invoke(InvokeKind::Virtual, self.property_change_ref()));
        }
        body.push(Instruction::Load(0));
        body.push(Instruction::Load(1));
        body.push(Instruction::PutField(backing));
        if attribute.weaves_value_holder(self.policy) {
            body.push(Instruction::Load(0));
            body.push(Instruction::GetField(self.holder_field_ref(attribute)));
            body.push(Instruction::Load(1));
            body.push(Instruction::Invoke(
                InvokeKind::Interface,
                self.runtime.members.holder.set_value.clone(),
            ));
        }
        body.push(Instruction::Return);

        Ok(SyntheticMethod {
            name: UnqualifiedName::value_setter(&attribute.name),
            descriptor: MethodDescriptor {
                parameters: vec![field_type],
                return_type: None,
            },
            access_flags: method_flags(),
            body: body.finish(),
        })
    }

    fn simple_getter(&self, name: UnqualifiedName, field: &FieldRef) -> SyntheticMethod {
        let mut body = BodyBuilder::new();
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(field.clone()));
        body.push(Instruction::ReturnValue);
        SyntheticMethod {
            name,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(field.descriptor.clone()),
            },
            access_flags: method_flags(),
            body: body.finish(),
        }
    }

    fn simple_setter(&self, name: UnqualifiedName, field: &FieldRef) -> SyntheticMethod {
        let mut body = BodyBuilder::new();
        body.push(Instruction::Load(0));
        body.push(Instruction::Load(1));
        body.push(Instruction::PutField(field.clone()));
        body.push(Instruction::Return);
        SyntheticMethod {
            name,
            descriptor: MethodDescriptor {
                parameters: vec![field.descriptor.clone()],
                return_type: None,
            },
            access_flags: method_flags(),
            body: body.finish(),
        }
    }

    /// Listener field, its accessors, and the notification funnel
    pub fn change_tracking_members(&self) -> Vec<SyntheticMember> {
        let listener = SyntheticField {
            name: UnqualifiedName::LISTENER_FIELD,
            descriptor: FieldType::object(self.runtime.classes.change_listener.clone()),
            access_flags: field_flags(),
        };
        let listener_ref = listener.reference(&self.class.class_name);

        // _woven_propertyChange(name, old, new): fires only when a listener
        // is attached and the two values are different references
        let mut body = BodyBuilder::new();
        let done = body.fresh_label();
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(listener_ref.clone()));
        body.push(Instruction::Branch(Test::IsNull, done));
        body.push(Instruction::Load(2));
        body.push(Instruction::Load(3));
        body.push(Instruction::Branch(Test::RefEq, done));
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(listener_ref.clone()));
        body.push(Instruction::New(self.runtime.classes.change_event.clone()));
        body.push(Instruction::Dup);
        body.push(Instruction::Load(0));
        body.push(Instruction::Load(1));
        body.push(Instruction::Load(2));
        body.push(Instruction::Load(3));
        body.push(Instruction::Invoke(
            InvokeKind::Special,
            self.runtime.members.event.init.clone(),
        ));
        body.push(Instruction::Invoke(
            InvokeKind::Interface,
            self.runtime.members.listener.property_change.clone(),
        ));
        body.place_label(done);
        body.push(Instruction::Return);
        let property_change = SyntheticMethod {
            name: UnqualifiedName::PROPERTY_CHANGE,
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::STRING, FieldType::OBJECT, FieldType::OBJECT],
                return_type: None,
            },
            access_flags: method_flags(),
            body: body.finish(),
        };

        vec![
            SyntheticMember::Method(self.simple_getter(UnqualifiedName::GET_LISTENER, &listener_ref)),
            SyntheticMember::Method(self.simple_setter(UnqualifiedName::SET_LISTENER, &listener_ref)),
            SyntheticMember::Method(property_change),
            SyntheticMember::Field(listener),
        ]
    }

    fn fetch_group_field_ref(&self) -> FieldRef {
        self.own_field(
            UnqualifiedName::FETCH_GROUP_FIELD,
            FieldType::object(self.runtime.classes.fetch_group.clone()),
        )
    }

    /// Guard raising the unfetched error when the attribute is absent
    ///
    /// What actually happens on a miss is up to the fetch group's callback:
    /// a null message means it repaired the situation (reloaded, widened the
    /// group) and access may proceed.
    fn fetch_guard(&self, name: UnqualifiedName, callback: &MethodRef) -> SyntheticMethod {
        let fetch_group = self.fetch_group_field_ref();
        let mut body = BodyBuilder::new();
        let fetched = body.fresh_label();

        body.push(Instruction::Load(0));
        body.push(Instruction::Load(1));
        body.push(Instruction::Invoke(
            InvokeKind::Virtual,
            self.own_method(
                UnqualifiedName::IS_ATTRIBUTE_FETCHED,
                MethodDescriptor {
                    parameters: vec![FieldType::STRING],
                    return_type: Some(FieldType::BOOLEAN),
                },
            ),
        ));
        body.push(Instruction::Branch(Test::True, fetched));

        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(fetch_group));
        body.push(Instruction::Load(0));
        body.push(Instruction::Load(1));
        body.push(Instruction::Invoke(InvokeKind::Virtual, callback.clone()));
        body.push(Instruction::Store(2));
        body.push(Instruction::Load(2));
        body.push(Instruction::Branch(Test::IsNull, fetched));

        body.push(Instruction::New(self.runtime.classes.not_fetched_error.clone()));
        body.push(Instruction::Dup);
        body.push(Instruction::Load(2));
        body.push(Instruction::Invoke(
            InvokeKind::Special,
            self.runtime.members.error.init.clone(),
        ));
        body.push(Instruction::Throw);

        body.place_label(fetched);
        body.push(Instruction::Return);

        SyntheticMethod {
            name,
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::STRING],
                return_type: None,
            },
            access_flags: method_flags(),
            body: body.finish(),
        }
    }

    /// Fetch-group and session fields, accessors, and the access guards
    pub fn fetch_group_members(&self) -> Vec<SyntheticMember> {
        let fetch_group = SyntheticField {
            name: UnqualifiedName::FETCH_GROUP_FIELD,
            descriptor: FieldType::object(self.runtime.classes.fetch_group.clone()),
            access_flags: field_flags(),
        };
        let session = SyntheticField {
            name: UnqualifiedName::SESSION_FIELD,
            descriptor: FieldType::object(self.runtime.classes.session.clone()),
            access_flags: field_flags(),
        };
        let fetch_group_ref = fetch_group.reference(&self.class.class_name);
        let session_ref = session.reference(&self.class.class_name);

        // _woven_isAttributeFetched: no group at all means fully loaded
        let mut body = BodyBuilder::new();
        let partial = body.fresh_label();
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(fetch_group_ref.clone()));
        body.push(Instruction::Branch(Test::NonNull, partial));
        body.push(Instruction::Const(Literal::Bool(true)));
        body.push(Instruction::ReturnValue);
        body.place_label(partial);
        body.push(Instruction::Load(0));
        body.push(Instruction::GetField(fetch_group_ref.clone()));
        body.push(Instruction::Load(1));
        body.push(Instruction::Invoke(
            InvokeKind::Virtual,
            self.runtime.members.fetch_group.contains_attribute.clone(),
        ));
        body.push(Instruction::ReturnValue);
        let is_fetched = SyntheticMethod {
            name: UnqualifiedName::IS_ATTRIBUTE_FETCHED,
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::STRING],
                return_type: Some(FieldType::BOOLEAN),
            },
            access_flags: method_flags(),
            body: body.finish(),
        };

        vec![
            SyntheticMember::Method(self.simple_getter(UnqualifiedName::GET_FETCH_GROUP, &fetch_group_ref)),
            SyntheticMember::Method(self.simple_setter(UnqualifiedName::SET_FETCH_GROUP, &fetch_group_ref)),
            SyntheticMember::Method(self.simple_getter(UnqualifiedName::GET_SESSION, &session_ref)),
            SyntheticMember::Method(self.simple_setter(UnqualifiedName::SET_SESSION, &session_ref)),
            SyntheticMember::Method(is_fetched),
            SyntheticMember::Method(self.fetch_guard(
                UnqualifiedName::CHECK_FETCHED,
                &self.runtime.members.fetch_group.on_unfetched,
            )),
            SyntheticMember::Method(self.fetch_guard(
                UnqualifiedName::CHECK_FETCHED_FOR_SET,
                &self.runtime.members.fetch_group.on_unfetched_for_set,
            )),
            SyntheticMember::Field(fetch_group),
            SyntheticMember::Field(session),
        ]
    }

    /// Primary-key and cache-key fields with their accessors
    pub fn identity_members(&self) -> Vec<SyntheticMember> {
        let primary_key = SyntheticField {
            name: UnqualifiedName::PRIMARY_KEY_FIELD,
            descriptor: FieldType::OBJECT,
            access_flags: field_flags(),
        };
        let cache_key = SyntheticField {
            name: UnqualifiedName::CACHE_KEY_FIELD,
            descriptor: FieldType::object(self.runtime.classes.cache_key.clone()),
            access_flags: field_flags(),
        };
        let primary_key_ref = primary_key.reference(&self.class.class_name);
        let cache_key_ref = cache_key.reference(&self.class.class_name);

        vec![
            SyntheticMember::Method(self.simple_getter(UnqualifiedName::GET_ID, &primary_key_ref)),
            SyntheticMember::Method(self.simple_setter(UnqualifiedName::SET_ID, &primary_key_ref)),
            SyntheticMember::Method(self.simple_getter(UnqualifiedName::GET_CACHE_KEY, &cache_key_ref)),
            SyntheticMember::Method(self.simple_setter(UnqualifiedName::SET_CACHE_KEY, &cache_key_ref)),
            SyntheticMember::Field(primary_key),
            SyntheticMember::Field(cache_key),
        ]
    }

    /// Link-carrier field and accessors for the external binding framework
    pub fn link_members(&self) -> Vec<SyntheticMember> {
        let links = SyntheticField {
            name: UnqualifiedName::LINKS_FIELD,
            descriptor: FieldType::object(self.runtime.classes.link_registry.clone()),
            access_flags: field_flags(),
        };
        let links_ref = links.reference(&self.class.class_name);
        vec![
            SyntheticMember::Method(self.simple_getter(UnqualifiedName::GET_LINKS, &links_ref)),
            SyntheticMember::Method(self.simple_setter(UnqualifiedName::SET_LINKS, &links_ref)),
            SyntheticMember::Field(links),
        ]
    }

    fn get_dispatcher_descriptor() -> MethodDescriptor {
        MethodDescriptor {
            parameters: vec![FieldType::STRING],
            return_type: Some(FieldType::OBJECT),
        }
    }

    fn set_dispatcher_descriptor() -> MethodDescriptor {
        MethodDescriptor {
            parameters: vec![FieldType::STRING, FieldType::OBJECT],
            return_type: None,
        }
    }

    /// Name-based reader over every attribute declared at this level
    ///
    /// Attribute names are compared by reference, which works because both
    /// sides come from the interning table. Unknown names go to the
    /// superclass dispatcher when one exists, otherwise resolve to null.
    pub fn get_dispatcher(&self, chain_to_super: bool) -> Result<SyntheticMethod, DescriptorError> {
        let mut body = BodyBuilder::new();
        for attribute in self.class.attributes.iter().filter(|a| a.dispatchable()) {
            let backing = self.class.backing_field(attribute)?;
            let next = body.fresh_label();
            body.push(Instruction::Load(1));
            body.push(Instruction::Const(Literal::Name(attribute.name.clone())));
            body.push(Instruction::Branch(Test::RefNe, next));
            push_boxed_field_read(&mut body, &backing);
            body.push(Instruction::ReturnValue);
            body.place_label(next);
        }
        match (chain_to_super, self.super_method(UnqualifiedName::GET_ATTRIBUTE, Self::get_dispatcher_descriptor())) {
            (true, Some(super_get)) => {
                body.push(Instruction::Load(0));
                body.push(Instruction::Load(1));
                body.push(Instruction::Invoke(InvokeKind::Special, super_get));
                body.push(Instruction::ReturnValue);
            }
            _ => {
                body.push(Instruction::Const(Literal::Null));
                body.push(Instruction::ReturnValue);
            }
        }
        Ok(SyntheticMethod {
            name: UnqualifiedName::GET_ATTRIBUTE,
            descriptor: Self::get_dispatcher_descriptor(),
            access_flags: method_flags(),
            body: body.finish(),
        })
    }

    /// Name-based writer over every attribute declared at this level
    pub fn set_dispatcher(&self, chain_to_super: bool) -> Result<SyntheticMethod, DescriptorError> {
        let mut body = BodyBuilder::new();
        for attribute in self.class.attributes.iter().filter(|a| a.dispatchable()) {
            let backing = self.class.backing_field(attribute)?;
            let next = body.fresh_label();
            body.push(Instruction::Load(1));
            body.push(Instruction::Const(Literal::Name(attribute.name.clone())));
            body.push(Instruction::Branch(Test::RefNe, next));
            body.push(Instruction::Load(0));
            body.push(Instruction::Load(2));
            match &backing.descriptor {
                FieldType::Base(base) => {
                    let wrapper = base.boxed_class();
                    body.push(Instruction::Cast(FieldType::object(wrapper.clone())));
                    body.push(Instruction::Invoke(
                        InvokeKind::Virtual,
                        MethodRef {
                            class: wrapper,
                            name: base.unboxing_method(),
                            descriptor: MethodDescriptor {
                                parameters: vec![],
                                return_type: Some(FieldType::Base(*base)),
                            },
                        },
                    ));
                }
                other => {
                    body.push(Instruction::Cast(other.clone()));
                }
            }
            body.push(Instruction::PutField(backing));
            body.push(Instruction::Return);
            body.place_label(next);
        }
        match (chain_to_super, self.super_method(UnqualifiedName::SET_ATTRIBUTE, Self::set_dispatcher_descriptor())) {
            (true, Some(super_set)) => {
                body.push(Instruction::Load(0));
                body.push(Instruction::Load(1));
                body.push(Instruction::Load(2));
                body.push(Instruction::Invoke(InvokeKind::Special, super_set));
                body.push(Instruction::Return);
            }
            _ => {
                body.push(Instruction::Return);
            }
        }
        Ok(SyntheticMethod {
            name: UnqualifiedName::SET_ATTRIBUTE,
            descriptor: Self::set_dispatcher_descriptor(),
            access_flags: method_flags(),
            body: body.finish(),
        })
    }

    /// Fix-up run on a freshly cloned instance
    ///
    /// Own holders are replaced with clones so the copy stops sharing lazy
    /// state with the original; at the level that declared them, listener,
    /// fetch-group, and identity fields are cleared so the copy starts
    /// unmanaged.
    pub fn post_clone(&self, delegate_to_super: bool, resets: CloneResets) -> SyntheticMethod {
        let members = &self.runtime.members.holder;
        let mut body = BodyBuilder::new();

        if delegate_to_super {
            if let Some(super_post_clone) = self.super_method(
                UnqualifiedName::POST_CLONE,
                MethodDescriptor {
                    parameters: vec![],
                    return_type: Some(FieldType::OBJECT),
                },
            ) {
                body.push(Instruction::Load(0));
                body.push(Instruction::Invoke(InvokeKind::Special, super_post_clone));
                body.push(Instruction::Pop);
            }
        }

        for attribute in self
            .class
            .attributes
            .iter()
            .filter(|a| a.weaves_value_holder(self.policy))
        {
            let holder = self.holder_field_ref(attribute);
            let absent = body.fresh_label();
            body.push(Instruction::Load(0));
            body.push(Instruction::GetField(holder.clone()));
            body.push(Instruction::Branch(Test::IsNull, absent));
            body.push(Instruction::Load(0));
            body.push(Instruction::Load(0));
            body.push(Instruction::GetField(holder.clone()));
            body.push(Instruction::Invoke(InvokeKind::Interface, members.clone.clone()));
            body.push(Instruction::Cast(self.holder_type()));
            body.push(Instruction::PutField(holder));
            body.place_label(absent);
        }

        if resets.listener {
            self.push_null_field(
                &mut body,
                self.own_field(
                    UnqualifiedName::LISTENER_FIELD,
                    FieldType::object(self.runtime.classes.change_listener.clone()),
                ),
            );
        }
        if resets.fetch_group {
            self.push_null_field(&mut body, self.fetch_group_field_ref());
            self.push_null_field(
                &mut body,
                self.own_field(
                    UnqualifiedName::SESSION_FIELD,
                    FieldType::object(self.runtime.classes.session.clone()),
                ),
            );
        }
        if resets.identity {
            self.push_null_field(
                &mut body,
                self.own_field(UnqualifiedName::PRIMARY_KEY_FIELD, FieldType::OBJECT),
            );
            self.push_null_field(
                &mut body,
                self.own_field(
                    UnqualifiedName::CACHE_KEY_FIELD,
                    FieldType::object(self.runtime.classes.cache_key.clone()),
                ),
            );
        }

        body.push(Instruction::Load(0));
        body.push(Instruction::ReturnValue);

        SyntheticMethod {
            name: UnqualifiedName::POST_CLONE,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::OBJECT),
            },
            access_flags: method_flags(),
            body: body.finish(),
        }
    }

    fn push_null_field(&self, body: &mut BodyBuilder, field: FieldRef) {
        body.push(Instruction::Load(0));
        body.push(Instruction::Const(Literal::Null));
        body.push(Instruction::PutField(field));
    }

    /// Field-for-field copy via the base class, added at the hierarchy root
    pub fn shallow_clone(&self) -> SyntheticMethod {
        let mut body = BodyBuilder::new();
        body.push(Instruction::Load(0));
        body.push(Instruction::Invoke(
            InvokeKind::Special,
            self.runtime.members.object.clone.clone(),
        ));
        body.push(Instruction::ReturnValue);
        SyntheticMethod {
            name: UnqualifiedName::SHALLOW_CLONE,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::OBJECT),
            },
            access_flags: method_flags(),
            body: body.finish(),
        }
    }

    /// Reflection-free factory, only possible with a no-arg constructor
    pub fn instance_factory(&self) -> SyntheticMethod {
        let mut body = BodyBuilder::new();
        body.push(Instruction::New(self.class.class_name.clone()));
        body.push(Instruction::Dup);
        body.push(Instruction::Invoke(
            InvokeKind::Special,
            self.own_method(UnqualifiedName::INIT, MethodDescriptor::nullary()),
        ));
        body.push(Instruction::ReturnValue);
        SyntheticMethod {
            name: UnqualifiedName::NEW_INSTANCE,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::OBJECT),
            },
            access_flags: method_flags(),
            body: body.finish(),
        }
    }
}

#[cfg(test)]
use crate::class::{BinaryName, Name};

#[cfg(test)]
fn lazy_address_class() -> ClassDescriptor {
    let mut class = ClassDescriptor::new(BinaryName::from_str_unsafe("com/acme/Order"), None);
    let mut address = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("address"),
        Some(FieldType::object(BinaryName::from_str_unsafe("com/acme/Address"))),
    );
    address.weave_value_holder = true;
    address.weave_change_tracking = true;
    class.add_attribute(address);
    class
}

#[test]
fn synthesis_is_deterministic() {
    let class = lazy_address_class();
    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let synthesizer = MemberSynthesizer::new(&class, &policy, &runtime);

    let attribute = class.attribute("address").unwrap();
    let first = synthesizer.holder_getter(attribute).unwrap();
    let second = synthesizer.holder_getter(attribute).unwrap();
    assert_eq!(first, second);

    let first = synthesizer.intercepting_setter(attribute).unwrap();
    let second = synthesizer.intercepting_setter(attribute).unwrap();
    assert_eq!(first, second);
}

#[test]
fn holder_field_shape() {
    let class = lazy_address_class();
    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let synthesizer = MemberSynthesizer::new(&class, &policy, &runtime);

    let field = synthesizer
        .holder_field(class.attribute("address").unwrap())
        .unwrap();
    assert_eq!(field.name.as_str(), "_woven_address_holder");
    assert_eq!(
        field.descriptor,
        FieldType::object(runtime.classes.value_holder.clone())
    );
    assert!(field.access_flags.contains(FieldAccessFlags::TRANSIENT));
    assert!(field.access_flags.contains(FieldAccessFlags::SYNTHETIC));
}

#[test]
fn holder_on_primitive_attribute_is_rejected() {
    let mut class = ClassDescriptor::new(BinaryName::from_str_unsafe("com/acme/Order"), None);
    let mut total = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("total"),
        Some(FieldType::INT),
    );
    total.weave_value_holder = true;
    class.add_attribute(total);

    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let synthesizer = MemberSynthesizer::new(&class, &policy, &runtime);
    assert!(matches!(
        synthesizer.holder_field(class.attribute("total").unwrap()),
        Err(DescriptorError::PrimitiveIndirection { .. })
    ));
}

#[test]
fn property_access_requires_declared_accessors() {
    let mut class = lazy_address_class();
    class.uses_attribute_access = false;

    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let synthesizer = MemberSynthesizer::new(&class, &policy, &runtime);
    assert!(matches!(
        synthesizer.holder_getter(class.attribute("address").unwrap()),
        Err(DescriptorError::MissingAccessor { .. })
    ));
}

#[test]
fn intercepting_setter_notifies_only_when_tracked() {
    let class = lazy_address_class();
    let runtime = RuntimeSurface::new();

    let policy = WeavePolicy::new();
    let synthesizer = MemberSynthesizer::new(&class, &policy, &runtime);
    let tracked = synthesizer
        .intercepting_setter(class.attribute("address").unwrap())
        .unwrap();
    let notifies = tracked.body.instructions.iter().any(|insn| {
        matches!(insn, Instruction::Invoke(_, method) if method.name == UnqualifiedName::PROPERTY_CHANGE)
    });
    assert!(notifies);

    let mut untracked_policy = WeavePolicy::new();
    untracked_policy.weave_change_tracking = false;
    let synthesizer = MemberSynthesizer::new(&class, &untracked_policy, &runtime);
    let untracked = synthesizer
        .intercepting_setter(class.attribute("address").unwrap())
        .unwrap();
    let notifies = untracked.body.instructions.iter().any(|insn| {
        matches!(insn, Instruction::Invoke(_, method) if method.name == UnqualifiedName::PROPERTY_CHANGE)
    });
    assert!(!notifies);
}

#[test]
fn fetch_guard_raises_the_runtime_error() {
    let class = lazy_address_class();
    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let synthesizer = MemberSynthesizer::new(&class, &policy, &runtime);

    let members = synthesizer.fetch_group_members();
    let guard = members
        .iter()
        .filter_map(SyntheticMember::as_method)
        .find(|method| method.name == UnqualifiedName::CHECK_FETCHED)
        .unwrap();
    assert!(guard.body.instructions.contains(&Instruction::Throw));
    let constructs_error = guard
        .body
        .instructions
        .contains(&Instruction::New(runtime.classes.not_fetched_error.clone()));
    assert!(constructs_error);
}

#[test]
fn dispatchers_choose_their_terminal() {
    let mut class = lazy_address_class();
    class.super_class_name = Some(BinaryName::from_str_unsafe("com/acme/Base"));
    let policy = WeavePolicy::new();
    let runtime = RuntimeSurface::new();
    let synthesizer = MemberSynthesizer::new(&class, &policy, &runtime);

    let chained = synthesizer.get_dispatcher(true).unwrap();
    let delegates = chained.body.instructions.iter().any(|insn| {
        matches!(
            insn,
            Instruction::Invoke(InvokeKind::Special, method)
                if method.name == UnqualifiedName::GET_ATTRIBUTE
        )
    });
    assert!(delegates);

    let rooted = synthesizer.get_dispatcher(false).unwrap();
    let delegates = rooted.body.instructions.iter().any(|insn| {
        matches!(insn, Instruction::Invoke(InvokeKind::Special, _))
    });
    assert!(!delegates);
    assert!(rooted.body.instructions.contains(&Instruction::Const(Literal::Null)));
}
