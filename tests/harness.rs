//! Behavioral checks for woven classes
//!
//! Unit tests under `src/` assert on synthesized instruction sequences; the
//! tests here execute them instead. A small evaluator runs method bodies
//! against an object heap, with just enough of the runtime support library
//! (holders, listeners, fetch groups) to observe what augmented classes do.

use std::collections::{HashMap, HashSet};

use classweave::class::{
    BinaryName, FieldRef, FieldType, MethodDescriptor, MethodRef, Name, TransformedClass,
    UnqualifiedName,
};
use classweave::code::{Instruction, InvokeKind, Literal, MethodBody, SynLabel, Test};
use classweave::metadata::{AttributeDescriptor, ClassDescriptor, MethodDetails};
use classweave::weave::{augment, Ancestry, Error, WeavePolicy};

/// A value as executing woven code sees it
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Bool(bool),
    Int(i64),

    /// Interned string: equal content means the same reference
    Name(String),

    /// Index into the evaluator's heap
    Ref(usize),
}

/// One heap cell
#[derive(Debug)]
enum Obj {
    Entity {
        class: String,
        fields: HashMap<String, Value>,
    },
    Holder {
        value: Value,
        instantiated: bool,
        newly_created: bool,
        coordinated: bool,
    },
    Boxed(Value),
    FetchGroup {
        attributes: HashSet<String>,
        /// What the unfetched callbacks answer; null means "repaired, go on"
        message: Option<String>,
    },
    Listener {
        events: Vec<(String, Value, Value)>,
    },
    Event {
        attribute: String,
        old: Value,
        new: Value,
    },
    Error {
        message: String,
    },
}

#[derive(Debug)]
enum ExecError {
    /// The fetch guard threw the runtime's not-fetched error
    NotFetched(String),

    /// Augmentation itself refused the descriptor
    Weave(Error),
}

impl From<Error> for ExecError {
    fn from(err: Error) -> ExecError {
        ExecError::Weave(err)
    }
}

struct WovenClass {
    descriptor: ClassDescriptor,
    woven: TransformedClass,
}

/// Executes woven classes against an in-memory object heap
struct Vm {
    classes: HashMap<String, WovenClass>,
    heap: Vec<Obj>,
}

fn heap_index(value: &Value) -> usize {
    match value {
        Value::Ref(index) => *index,
        other => panic!("expected a heap reference, got {:?}", other),
    }
}

/// Reference equality as the rewritten comparisons mean it
///
/// Names compare by content because the real thing interns them; boxed
/// primitives are ordinary heap objects and so always distinct.
fn same_reference(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Int(l), Value::Int(r)) => l == r,
        (Value::Name(l), Value::Name(r)) => l == r,
        (Value::Ref(l), Value::Ref(r)) => l == r,
        _ => false,
    }
}

fn name_string(value: Value) -> String {
    match value {
        Value::Name(name) => name,
        other => panic!("expected an interned name, got {:?}", other),
    }
}

impl Vm {
    fn new() -> Vm {
        Vm {
            classes: HashMap::new(),
            heap: vec![],
        }
    }

    /// Augment a class and make it callable, chaining ancestry automatically
    fn weave(&mut self, descriptor: ClassDescriptor, policy: &WeavePolicy) -> Result<(), ExecError> {
        let parent_capabilities = descriptor
            .super_class_name
            .as_ref()
            .and_then(|super_name| self.classes.get(super_name.as_str()))
            .map(|parent| parent.woven.capabilities);
        let ancestry = match parent_capabilities {
            Some(capabilities) => Ancestry::Declared(capabilities),
            None => Ancestry::Root,
        };
        let woven = augment(&descriptor, policy, ancestry)?;
        self.classes.insert(
            descriptor.class_name.as_str().to_owned(),
            WovenClass { descriptor, woven },
        );
        Ok(())
    }

    fn alloc(&mut self, object: Obj) -> Value {
        self.heap.push(object);
        Value::Ref(self.heap.len() - 1)
    }

    fn new_entity(&mut self, class: &str) -> Value {
        self.alloc(Obj::Entity {
            class: class.to_owned(),
            fields: HashMap::new(),
        })
    }

    fn new_holder(&mut self, value: Value, instantiated: bool) -> Value {
        self.alloc(Obj::Holder {
            value,
            instantiated,
            newly_created: false,
            coordinated: false,
        })
    }

    fn new_listener(&mut self) -> Value {
        self.alloc(Obj::Listener { events: vec![] })
    }

    fn new_fetch_group(&mut self, attributes: &[&str], message: Option<&str>) -> Value {
        self.alloc(Obj::FetchGroup {
            attributes: attributes.iter().map(|name| name.to_string()).collect(),
            message: message.map(str::to_owned),
        })
    }

    fn box_int(&mut self, value: i64) -> Value {
        self.alloc(Obj::Boxed(Value::Int(value)))
    }

    fn boxed_int(&self, boxed: &Value) -> i64 {
        match &self.heap[heap_index(boxed)] {
            Obj::Boxed(Value::Int(value)) => *value,
            other => panic!("expected a boxed integer, got {:?}", other),
        }
    }

    fn field(&self, entity: &Value, field: &str) -> Value {
        match &self.heap[heap_index(entity)] {
            Obj::Entity { fields, .. } => fields.get(field).cloned().unwrap_or(Value::Null),
            other => panic!("field read on {:?}", other),
        }
    }

    fn set_field(&mut self, entity: &Value, field: &str, value: Value) {
        match &mut self.heap[heap_index(entity)] {
            Obj::Entity { fields, .. } => {
                fields.insert(field.to_owned(), value);
            }
            other => panic!("field write on {:?}", other),
        }
    }

    fn holder_value(&self, holder: &Value) -> Value {
        match &self.heap[heap_index(holder)] {
            Obj::Holder { value, .. } => value.clone(),
            other => panic!("not a holder: {:?}", other),
        }
    }

    fn holder_instantiated(&self, holder: &Value) -> bool {
        match &self.heap[heap_index(holder)] {
            Obj::Holder { instantiated, .. } => *instantiated,
            other => panic!("not a holder: {:?}", other),
        }
    }

    fn holder_flags(&mut self, holder: &Value, newly: bool, coordination: bool) {
        match &mut self.heap[heap_index(holder)] {
            Obj::Holder {
                newly_created,
                coordinated,
                ..
            } => {
                *newly_created = newly;
                *coordinated = coordination;
            }
            other => panic!("not a holder: {:?}", other),
        }
    }

    fn events(&self, listener: &Value) -> Vec<(String, Value, Value)> {
        match &self.heap[heap_index(listener)] {
            Obj::Listener { events } => events.clone(),
            other => panic!("not a listener: {:?}", other),
        }
    }

    fn entity_class(&self, value: &Value) -> String {
        match &self.heap[heap_index(value)] {
            Obj::Entity { class, .. } => class.clone(),
            other => panic!("method receiver is not an entity: {:?}", other),
        }
    }

    /// Call a method on an entity by its dynamic class
    fn call(
        &mut self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, ExecError> {
        let class = self.entity_class(receiver);
        self.run(receiver.clone(), &class, method, args)
    }

    /// Like [`Vm::call`] for methods that must produce a value
    fn eval(&mut self, receiver: &Value, method: &str, args: Vec<Value>) -> Value {
        self.call(receiver, method, args)
            .unwrap()
            .expect("call produced no value")
    }

    fn run(
        &mut self,
        receiver: Value,
        class: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, ExecError> {
        let body = self
            .find_body(class, method)
            .unwrap_or_else(|| panic!("no method {} reachable from {}", method, class));
        self.execute(&body, receiver, args)
    }

    /// Resolve a method body, walking the superclass chain
    ///
    /// Synthesized members come first, then rewritten bodies shadowing the
    /// declarations they replaced, then untouched declared methods.
    fn find_body(&self, class: &str, method: &str) -> Option<MethodBody> {
        let mut current = Some(class.to_owned());
        while let Some(class_name) = current {
            let woven_class = self.classes.get(&class_name)?;
            if let Some(synthesized) = woven_class.woven.method(method) {
                return Some(synthesized.body.clone());
            }
            if let Some(rewritten) = woven_class.woven.rewritten(method) {
                return Some(rewritten.body.clone());
            }
            if let Some(declared) = woven_class.descriptor.method(method) {
                return Some(declared.body.clone());
            }
            current = woven_class
                .descriptor
                .super_class_name
                .as_ref()
                .map(|name| name.as_str().to_owned());
        }
        None
    }

    fn dispatch(
        &mut self,
        kind: InvokeKind,
        method: &MethodRef,
        receiver: Value,
        args: Vec<Value>,
    ) -> Result<Option<Value>, ExecError> {
        let owner = method.class.as_str();
        if owner.starts_with("org/classweave/") || owner.starts_with("java/lang/") {
            return self.invoke_native(method, receiver, args);
        }
        match kind {
            InvokeKind::Special => {
                let owner = owner.to_owned();
                self.run(receiver, &owner, method.name.as_str(), args)
            }
            InvokeKind::Virtual | InvokeKind::Interface => {
                let class = self.entity_class(&receiver);
                self.run(receiver, &class, method.name.as_str(), args)
            }
        }
    }

    /// The runtime support library, modeled directly on the heap
    fn invoke_native(
        &mut self,
        method: &MethodRef,
        receiver: Value,
        mut args: Vec<Value>,
    ) -> Result<Option<Value>, ExecError> {
        let class = method.class.as_str();
        let name = method.name.as_str();

        if class == "java/lang/Object" && name == "clone" {
            let copy = match &self.heap[heap_index(&receiver)] {
                Obj::Entity { class, fields } => Obj::Entity {
                    class: class.clone(),
                    fields: fields.clone(),
                },
                other => panic!("base clone of {:?}", other),
            };
            return Ok(Some(self.alloc(copy)));
        }
        if class.starts_with("java/lang/") {
            // wrapper types: the constructor boxes, the value methods unbox
            return Ok(match name {
                "<init>" => {
                    let cell = heap_index(&receiver);
                    self.heap[cell] = Obj::Boxed(args.remove(0));
                    None
                }
                _ => match &self.heap[heap_index(&receiver)] {
                    Obj::Boxed(value) => Some(value.clone()),
                    other => panic!("unboxing {:?}", other),
                },
            });
        }

        let cell = heap_index(&receiver);
        match name {
            "<init>" => {
                match &mut self.heap[cell] {
                    Obj::Holder {
                        value,
                        instantiated,
                        ..
                    } => {
                        *value = args.remove(0);
                        *instantiated = true;
                    }
                    Obj::Event {
                        attribute,
                        old,
                        new,
                    } => {
                        // (source, attributeName, oldValue, newValue)
                        let mut drain = args.drain(..);
                        let _source = drain.next();
                        *attribute = name_string(drain.next().unwrap());
                        *old = drain.next().unwrap();
                        *new = drain.next().unwrap();
                    }
                    Obj::Error { message } => {
                        *message = name_string(args.remove(0));
                    }
                    other => panic!("runtime constructor on {:?}", other),
                }
                Ok(None)
            }
            "getValue" => match &mut self.heap[cell] {
                Obj::Holder {
                    value,
                    instantiated,
                    ..
                } => {
                    *instantiated = true;
                    Ok(Some(value.clone()))
                }
                other => panic!("getValue on {:?}", other),
            },
            "setValue" => match &mut self.heap[cell] {
                Obj::Holder {
                    value,
                    instantiated,
                    ..
                } => {
                    *value = args.remove(0);
                    *instantiated = true;
                    Ok(None)
                }
                other => panic!("setValue on {:?}", other),
            },
            "isInstantiated" => Ok(Some(Value::Bool(self.holder_instantiated(&receiver)))),
            "isNewlyCreated" => match &self.heap[cell] {
                Obj::Holder { newly_created, .. } => Ok(Some(Value::Bool(*newly_created))),
                other => panic!("isNewlyCreated on {:?}", other),
            },
            "setNewlyCreated" => match &mut self.heap[cell] {
                Obj::Holder { newly_created, .. } => {
                    *newly_created = matches!(args.remove(0), Value::Bool(true));
                    Ok(None)
                }
                other => panic!("setNewlyCreated on {:?}", other),
            },
            "isCoordinated" => match &self.heap[cell] {
                Obj::Holder { coordinated, .. } => Ok(Some(Value::Bool(*coordinated))),
                other => panic!("isCoordinated on {:?}", other),
            },
            "clone" => {
                let copy = match &self.heap[cell] {
                    Obj::Holder {
                        value,
                        instantiated,
                        newly_created,
                        coordinated,
                    } => Obj::Holder {
                        value: value.clone(),
                        instantiated: *instantiated,
                        newly_created: *newly_created,
                        coordinated: *coordinated,
                    },
                    other => panic!("holder clone of {:?}", other),
                };
                Ok(Some(self.alloc(copy)))
            }
            "propertyChange" => {
                let event = heap_index(&args[0]);
                let recorded = match &self.heap[event] {
                    Obj::Event {
                        attribute,
                        old,
                        new,
                    } => (attribute.clone(), old.clone(), new.clone()),
                    other => panic!("listener notified with {:?}", other),
                };
                match &mut self.heap[cell] {
                    Obj::Listener { events } => events.push(recorded),
                    other => panic!("propertyChange on {:?}", other),
                }
                Ok(None)
            }
            "containsAttribute" => match &self.heap[cell] {
                Obj::FetchGroup { attributes, .. } => {
                    let attribute = name_string(args.remove(0));
                    Ok(Some(Value::Bool(attributes.contains(&attribute))))
                }
                other => panic!("containsAttribute on {:?}", other),
            },
            "onUnfetchedAttribute" | "onUnfetchedAttributeForSet" => match &self.heap[cell] {
                Obj::FetchGroup { message, .. } => Ok(Some(match message {
                    Some(text) => Value::Name(text.clone()),
                    None => Value::Null,
                })),
                other => panic!("unfetched callback on {:?}", other),
            },
            other => panic!("unexpected runtime call {}.{}", class, other),
        }
    }

    fn instantiate(&mut self, class: &BinaryName) -> Value {
        let name = class.as_str();
        let object = if name == "org/classweave/SimpleValueHolder" {
            Obj::Holder {
                value: Value::Null,
                instantiated: false,
                newly_created: false,
                coordinated: false,
            }
        } else if name == "org/classweave/ChangeEvent" {
            Obj::Event {
                attribute: String::new(),
                old: Value::Null,
                new: Value::Null,
            }
        } else if name == "org/classweave/NotFetchedError" {
            Obj::Error {
                message: String::new(),
            }
        } else if name.starts_with("java/lang/") {
            Obj::Boxed(Value::Null)
        } else {
            Obj::Entity {
                class: name.to_owned(),
                fields: HashMap::new(),
            }
        };
        self.alloc(object)
    }

    fn execute(
        &mut self,
        body: &MethodBody,
        receiver: Value,
        args: Vec<Value>,
    ) -> Result<Option<Value>, ExecError> {
        let mut labels: HashMap<SynLabel, usize> = HashMap::new();
        for (index, instruction) in body.instructions.iter().enumerate() {
            if let Instruction::Label(label) = instruction {
                labels.insert(*label, index);
            }
        }

        let mut locals: Vec<Value> = Vec::with_capacity(1 + args.len());
        locals.push(receiver);
        locals.extend(args);
        let mut stack: Vec<Value> = vec![];

        let mut pc = 0;
        while pc < body.instructions.len() {
            let mut next = pc + 1;
            match &body.instructions[pc] {
                Instruction::Load(slot) => {
                    stack.push(locals[*slot as usize].clone());
                }
                Instruction::Store(slot) => {
                    let slot = *slot as usize;
                    if locals.len() <= slot {
                        locals.resize(slot + 1, Value::Null);
                    }
                    locals[slot] = stack.pop().unwrap();
                }
                Instruction::Const(literal) => stack.push(match literal {
                    Literal::Null => Value::Null,
                    Literal::Bool(flag) => Value::Bool(*flag),
                    Literal::Name(name) => Value::Name(name.as_str().to_owned()),
                }),
                Instruction::GetField(field) => {
                    let target = stack.pop().unwrap();
                    let value = match &self.heap[heap_index(&target)] {
                        Obj::Entity { fields, .. } => fields
                            .get(field.name.as_str())
                            .cloned()
                            .unwrap_or(Value::Null),
                        other => panic!("field read on {:?}", other),
                    };
                    stack.push(value);
                }
                Instruction::PutField(field) => {
                    let value = stack.pop().unwrap();
                    let target = stack.pop().unwrap();
                    match &mut self.heap[heap_index(&target)] {
                        Obj::Entity { fields, .. } => {
                            fields.insert(field.name.as_str().to_owned(), value);
                        }
                        other => panic!("field write on {:?}", other),
                    }
                }
                Instruction::Invoke(kind, method) => {
                    let mut call_args = Vec::with_capacity(method.descriptor.parameters.len());
                    for _ in 0..method.descriptor.parameters.len() {
                        call_args.push(stack.pop().unwrap());
                    }
                    call_args.reverse();
                    let callee = stack.pop().unwrap();
                    let result = self.dispatch(*kind, method, callee, call_args)?;
                    if method.descriptor.return_type.is_some() {
                        stack.push(result.expect("value-returning call produced nothing"));
                    }
                }
                Instruction::New(class) => {
                    let fresh = self.instantiate(class);
                    stack.push(fresh);
                }
                Instruction::Cast(_) => {}
                Instruction::Dup => {
                    let top = stack.last().unwrap().clone();
                    stack.push(top);
                }
                Instruction::Pop => {
                    stack.pop().unwrap();
                }
                Instruction::Branch(test, target) => {
                    let taken = match test {
                        Test::IsNull => matches!(stack.pop().unwrap(), Value::Null),
                        Test::NonNull => !matches!(stack.pop().unwrap(), Value::Null),
                        Test::True => matches!(stack.pop().unwrap(), Value::Bool(true)),
                        Test::False => matches!(stack.pop().unwrap(), Value::Bool(false)),
                        Test::RefEq | Test::RefNe => {
                            let right = stack.pop().unwrap();
                            let left = stack.pop().unwrap();
                            let equal = same_reference(&left, &right);
                            if matches!(test, Test::RefEq) {
                                equal
                            } else {
                                !equal
                            }
                        }
                    };
                    if taken {
                        next = labels[target];
                    }
                }
                Instruction::Jump(target) => next = labels[target],
                Instruction::Label(_) => {}
                Instruction::Throw => {
                    let error = stack.pop().unwrap();
                    let message = match &self.heap[heap_index(&error)] {
                        Obj::Error { message } => message.clone(),
                        other => panic!("threw {:?}", other),
                    };
                    return Err(ExecError::NotFetched(message));
                }
                Instruction::Return => return Ok(None),
                Instruction::ReturnValue => return Ok(Some(stack.pop().unwrap())),
            }
            pc = next;
        }
        panic!("method body ended without returning")
    }
}

fn object_type(class: &str) -> FieldType {
    FieldType::object(BinaryName::from_str_unsafe(class))
}

fn no_arg_constructor() -> MethodDetails {
    let mut constructor = MethodDetails::new(UnqualifiedName::INIT, MethodDescriptor::nullary());
    constructor.body = MethodBody::new(vec![Instruction::Return]);
    constructor
}

/// Attribute access: a lazy tracked reference and a guarded tracked primitive
fn employee_class() -> ClassDescriptor {
    let mut class = ClassDescriptor::new(BinaryName::from_str_unsafe("com/acme/Employee"), None);

    let mut address = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("address"),
        Some(object_type("com/acme/Address")),
    );
    address.weave_value_holder = true;
    address.weave_change_tracking = true;
    class.add_attribute(address);

    let mut salary = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("salary"),
        Some(FieldType::INT),
    );
    salary.weave_change_tracking = true;
    salary.weave_fetch_group = true;
    class.add_attribute(salary);

    class.add_method(no_arg_constructor());
    class
}

/// Property access: declared accessors around a lazy tracked reference
fn customer_class() -> ClassDescriptor {
    let mut class = ClassDescriptor::new(BinaryName::from_str_unsafe("com/acme/Customer"), None);
    class.uses_attribute_access = false;

    let mut address = AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("address"),
        Some(object_type("com/acme/Address")),
    );
    address.weave_value_holder = true;
    address.weave_change_tracking = true;
    address.getter_name = Some(UnqualifiedName::from_str_unsafe("getAddress"));
    address.setter_name = Some(UnqualifiedName::from_str_unsafe("setAddress"));
    class.add_attribute(address);

    let backing = FieldRef {
        class: BinaryName::from_str_unsafe("com/acme/Customer"),
        name: UnqualifiedName::from_str_unsafe("address"),
        descriptor: object_type("com/acme/Address"),
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
    class.add_method(no_arg_constructor());
    class
}

fn person_class() -> ClassDescriptor {
    let mut class = ClassDescriptor::new(BinaryName::from_str_unsafe("com/acme/Person"), None);
    class.add_attribute(AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("name"),
        Some(FieldType::STRING),
    ));
    class.add_method(no_arg_constructor());
    class
}

fn staff_class() -> ClassDescriptor {
    let mut class = ClassDescriptor::new(
        BinaryName::from_str_unsafe("com/acme/Staff"),
        Some(BinaryName::from_str_unsafe("com/acme/Person")),
    );
    class.add_attribute(AttributeDescriptor::new(
        UnqualifiedName::from_str_unsafe("salary"),
        Some(FieldType::INT),
    ));
    class.add_method(no_arg_constructor());
    class
}

#[test]
fn installed_holders_stay_lazy_until_first_read() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut vm = Vm::new();
    vm.weave(employee_class(), &WeavePolicy::new()).unwrap();

    let employee = vm.new_entity("com/acme/Employee");
    let remote = vm.new_entity("com/acme/Address");
    let lazy = vm.new_holder(remote.clone(), false);

    vm.call(&employee, "_woven_set_address_holder", vec![lazy.clone()])
        .unwrap();
    // installing an untriggered holder clears the backing field
    assert_eq!(vm.field(&employee, "address"), Value::Null);
    assert!(!vm.holder_instantiated(&lazy));

    // the first value read pulls through the holder and triggers it
    let loaded = vm.eval(&employee, "_woven_get_address", vec![]);
    assert_eq!(loaded, remote);
    assert_eq!(vm.field(&employee, "address"), remote);
    assert!(vm.holder_instantiated(&lazy));

    // the holder accessor hands back the installed holder itself
    let holder = vm.eval(&employee, "_woven_get_address_holder", vec![]);
    assert_eq!(holder, lazy);
}

#[test]
fn installing_a_triggered_holder_pulls_its_value_through() {
    let mut vm = Vm::new();
    vm.weave(employee_class(), &WeavePolicy::new()).unwrap();

    let employee = vm.new_entity("com/acme/Employee");
    let stale = vm.new_entity("com/acme/Address");
    vm.set_field(&employee, "address", stale);
    let remote = vm.new_entity("com/acme/Address");
    let triggered = vm.new_holder(remote.clone(), true);

    vm.call(&employee, "_woven_set_address_holder", vec![triggered.clone()])
        .unwrap();
    // a holder that already has its value syncs the field instead of clearing it
    assert_eq!(vm.field(&employee, "address"), remote);
    assert!(vm.holder_instantiated(&triggered));

    // the round trip hands back the same holder, still carrying the value
    let holder = vm.eval(&employee, "_woven_get_address_holder", vec![]);
    assert_eq!(holder, triggered);
    assert_eq!(vm.holder_value(&holder), remote);
}

#[test]
fn change_events_carry_the_pre_store_value() {
    let mut vm = Vm::new();
    vm.weave(employee_class(), &WeavePolicy::new()).unwrap();

    let employee = vm.new_entity("com/acme/Employee");
    vm.set_field(&employee, "salary", Value::Int(1000));
    let listener = vm.new_listener();
    vm.call(&employee, "_woven_setChangeListener", vec![listener.clone()])
        .unwrap();

    vm.call(&employee, "_woven_set_salary", vec![Value::Int(2000)])
        .unwrap();
    let events = vm.events(&listener);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "salary");
    assert_eq!(vm.boxed_int(&events[0].1), 1000);
    assert_eq!(vm.boxed_int(&events[0].2), 2000);

    // a primitive rewrite always looks like a change: the old and new value
    // are boxed separately, and the comparison is by reference
    vm.call(&employee, "_woven_set_salary", vec![Value::Int(2000)])
        .unwrap();
    assert_eq!(vm.events(&listener).len(), 2);

    // storing the same reference again is not a change
    let home = vm.new_entity("com/acme/Address");
    vm.call(&employee, "_woven_set_address", vec![home.clone()])
        .unwrap();
    assert_eq!(vm.events(&listener).len(), 3);
    vm.call(&employee, "_woven_set_address", vec![home]).unwrap();
    assert_eq!(vm.events(&listener).len(), 3);

    // detaching the listener silences everything
    vm.call(&employee, "_woven_setChangeListener", vec![Value::Null])
        .unwrap();
    vm.call(&employee, "_woven_set_salary", vec![Value::Int(3000)])
        .unwrap();
    assert_eq!(vm.events(&listener).len(), 3);
}

#[test]
fn fetch_groups_guard_reads_and_writes() {
    let mut vm = Vm::new();
    vm.weave(employee_class(), &WeavePolicy::new()).unwrap();

    let employee = vm.new_entity("com/acme/Employee");
    vm.set_field(&employee, "salary", Value::Int(50000));

    let partial = vm.new_fetch_group(&["name"], Some("salary was not fetched"));
    vm.call(&employee, "_woven_setFetchGroup", vec![partial])
        .unwrap();
    match vm.call(&employee, "_woven_get_salary", vec![]) {
        Err(ExecError::NotFetched(message)) => assert_eq!(message, "salary was not fetched"),
        other => panic!("expected the unfetched error, got {:?}", other),
    }
    assert!(matches!(
        vm.call(&employee, "_woven_set_salary", vec![Value::Int(1)]),
        Err(ExecError::NotFetched(_))
    ));

    // a group that covers the attribute lets access through
    let covering = vm.new_fetch_group(&["name", "salary"], Some("unused"));
    vm.call(&employee, "_woven_setFetchGroup", vec![covering])
        .unwrap();
    assert_eq!(
        vm.eval(&employee, "_woven_get_salary", vec![]),
        Value::Int(50000)
    );

    // a null callback answer means the callback repaired the miss
    let repairing = vm.new_fetch_group(&["name"], None);
    vm.call(&employee, "_woven_setFetchGroup", vec![repairing])
        .unwrap();
    assert_eq!(
        vm.eval(&employee, "_woven_get_salary", vec![]),
        Value::Int(50000)
    );

    // and no group at all means fully fetched
    vm.call(&employee, "_woven_setFetchGroup", vec![Value::Null])
        .unwrap();
    assert_eq!(
        vm.eval(&employee, "_woven_get_salary", vec![]),
        Value::Int(50000)
    );
}

#[test]
fn post_clone_detaches_the_copy() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut vm = Vm::new();
    vm.weave(employee_class(), &WeavePolicy::new()).unwrap();

    let employee = vm.new_entity("com/acme/Employee");
    let home = vm.new_entity("com/acme/Address");
    vm.set_field(&employee, "address", home.clone());
    vm.call(&employee, "_woven_setId", vec![Value::Name("E-1".to_owned())])
        .unwrap();
    let listener = vm.new_listener();
    vm.call(&employee, "_woven_setChangeListener", vec![listener.clone()])
        .unwrap();
    // force the holder into existence so the copy has something to share
    vm.eval(&employee, "_woven_get_address_holder", vec![]);

    let copy = vm.eval(&employee, "_woven_shallowClone", vec![]);
    let shared = vm.field(&employee, "_woven_address_holder");
    assert_eq!(vm.field(&copy, "_woven_address_holder"), shared);
    assert_eq!(vm.field(&copy, "_woven_primaryKey"), Value::Name("E-1".to_owned()));

    let returned = vm.eval(&copy, "_woven_postClone", vec![]);
    assert_eq!(returned, copy);

    // the copy got its own holder and dropped listener and identity
    assert_ne!(vm.field(&copy, "_woven_address_holder"), shared);
    assert_eq!(vm.field(&copy, "_woven_listener"), Value::Null);
    assert_eq!(vm.field(&copy, "_woven_primaryKey"), Value::Null);
    assert_eq!(vm.field(&employee, "_woven_address_holder"), shared);
    assert_eq!(vm.field(&employee, "_woven_listener"), listener);
    assert_eq!(
        vm.field(&employee, "_woven_primaryKey"),
        Value::Name("E-1".to_owned())
    );

    // writes to the copy no longer touch the original or its listener
    let office = vm.new_entity("com/acme/Address");
    vm.call(&copy, "_woven_set_address", vec![office.clone()])
        .unwrap();
    assert_eq!(vm.field(&copy, "address"), office);
    assert_eq!(vm.field(&employee, "address"), home);
    assert_eq!(vm.holder_value(&shared), home);
    assert!(vm.events(&listener).is_empty());

    // while the original is still tracked
    vm.call(&employee, "_woven_set_address", vec![office])
        .unwrap();
    assert_eq!(vm.events(&listener).len(), 1);
}

#[test]
fn dispatchers_reach_inherited_attributes() {
    let mut vm = Vm::new();
    vm.weave(person_class(), &WeavePolicy::new()).unwrap();
    vm.weave(staff_class(), &WeavePolicy::new()).unwrap();

    let staff = vm.new_entity("com/acme/Staff");
    let boxed = vm.box_int(90);
    vm.call(
        &staff,
        "_woven_set",
        vec![Value::Name("salary".to_owned()), boxed],
    )
    .unwrap();
    vm.call(
        &staff,
        "_woven_set",
        vec![
            Value::Name("name".to_owned()),
            Value::Name("Grace".to_owned()),
        ],
    )
    .unwrap();

    // the primitive was unboxed on the way in, the inherited attribute was
    // stored by the superclass dispatcher
    assert_eq!(vm.field(&staff, "salary"), Value::Int(90));
    assert_eq!(vm.field(&staff, "name"), Value::Name("Grace".to_owned()));

    let salary = vm.eval(&staff, "_woven_get", vec![Value::Name("salary".to_owned())]);
    assert_eq!(vm.boxed_int(&salary), 90);
    let name = vm.eval(&staff, "_woven_get", vec![Value::Name("name".to_owned())]);
    assert_eq!(name, Value::Name("Grace".to_owned()));

    // unknown names fall off the end of the chain
    let missing = vm.eval(&staff, "_woven_get", vec![Value::Name("nickname".to_owned())]);
    assert_eq!(missing, Value::Null);
}

#[test]
fn factory_makes_blank_instances() {
    let mut vm = Vm::new();
    vm.weave(person_class(), &WeavePolicy::new()).unwrap();

    let person = vm.new_entity("com/acme/Person");
    vm.set_field(&person, "name", Value::Name("Grace".to_owned()));
    let fresh = vm.eval(&person, "_woven_new", vec![]);
    assert_ne!(fresh, person);
    assert_eq!(vm.field(&fresh, "name"), Value::Null);
}

#[test]
fn property_access_reconciles_through_the_holder() {
    let mut vm = Vm::new();
    vm.weave(customer_class(), &WeavePolicy::new()).unwrap();

    let customer = vm.new_entity("com/acme/Customer");
    let first = vm.new_entity("com/acme/Address");
    vm.set_field(&customer, "address", first.clone());

    // the first holder fetch wraps the field value
    let holder = vm.eval(&customer, "_woven_get_address_holder", vec![]);
    assert_eq!(vm.holder_value(&holder), first);

    // a freshly synthesized holder reconciles: field drift gets pushed in
    let second = vm.new_entity("com/acme/Address");
    vm.set_field(&customer, "address", second.clone());
    let same = vm.eval(&customer, "_woven_get_address_holder", vec![]);
    assert_eq!(same, holder);
    assert_eq!(vm.holder_value(&holder), second);

    // a coordinated holder reconciles on every fetch
    vm.holder_flags(&holder, false, true);
    let third = vm.new_entity("com/acme/Address");
    vm.set_field(&customer, "address", third.clone());
    vm.eval(&customer, "_woven_get_address_holder", vec![]);
    assert_eq!(vm.holder_value(&holder), third);

    // the wrapped declared setter notifies and keeps the holder in step
    let listener = vm.new_listener();
    vm.call(&customer, "_woven_setChangeListener", vec![listener.clone()])
        .unwrap();
    let fourth = vm.new_entity("com/acme/Address");
    vm.call(&customer, "setAddress", vec![fourth.clone()]).unwrap();
    let events = vm.events(&listener);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], ("address".to_owned(), third, fourth.clone()));
    assert_eq!(vm.holder_value(&holder), fourth);
    assert_eq!(vm.eval(&customer, "getAddress", vec![]), fourth);
}
