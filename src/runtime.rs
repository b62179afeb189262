//! Surface of the runtime support library
//!
//! Synthesized members call into a fixed set of runtime types: indirection
//! holders, change listeners and events, fetch groups, and the error raised
//! on unfetched access. The engine never generates those types; it only
//! needs their names and member signatures, which this module pins down in
//! one place so every synthesized call site agrees on them.

use crate::class::{
    BinaryName, FieldType, MethodDescriptor, MethodRef, Name, UnqualifiedName, WeaveCapabilities,
};

/// Names and member references of the runtime support library
pub struct RuntimeSurface {
    pub classes: RuntimeClasses,
    pub members: RuntimeMembers,
}

impl RuntimeSurface {
    pub fn new() -> RuntimeSurface {
        let classes = RuntimeClasses::new();
        let members = RuntimeMembers::new(&classes);
        RuntimeSurface { classes, members }
    }
}

/// Classes and interfaces making up the runtime support library
pub struct RuntimeClasses {
    /// Interface of indirection holders
    pub value_holder: BinaryName,

    /// Concrete holder produced when wrapping an already-loaded value
    pub simple_value_holder: BinaryName,

    /// Interface notified of attribute mutations
    pub change_listener: BinaryName,

    /// Event object handed to the change listener
    pub change_event: BinaryName,

    /// Set of attribute names loaded by a partial fetch
    pub fetch_group: BinaryName,

    /// Opaque session handle stored alongside a fetch group
    pub session: BinaryName,

    /// Opaque cache-key handle stored by identity bookkeeping
    pub cache_key: BinaryName,

    /// Opaque carrier for external-binding links
    pub link_registry: BinaryName,

    /// Error raised when an unfetched attribute is touched
    pub not_fetched_error: BinaryName,

    pub markers: MarkerInterfaces,
}

/// Empty interfaces recording, on the class itself, what augmentation did
pub struct MarkerInterfaces {
    /// Present on every augmented class; the entry guard keys off it
    pub woven: BinaryName,

    /// Present on classes with at least one indirection holder of their own
    pub woven_lazy: BinaryName,

    /// Present on the class that declares the change-tracking members
    pub woven_change_tracking: BinaryName,

    /// Present on the class that declares the fetch-group members
    pub woven_fetch_groups: BinaryName,

    /// Present on the class that declares the identity members
    pub woven_identity: BinaryName,

    /// Present on the class that roots the dispatcher chain
    pub woven_object: BinaryName,

    /// Present on the class that declares the link carrier
    pub woven_links: BinaryName,
}

impl RuntimeClasses {
    pub fn new() -> RuntimeClasses {
        RuntimeClasses {
            value_holder: BinaryName::from_str_unsafe("org/classweave/ValueHolder"),
            simple_value_holder: BinaryName::from_str_unsafe("org/classweave/SimpleValueHolder"),
            change_listener: BinaryName::from_str_unsafe("org/classweave/ChangeListener"),
            change_event: BinaryName::from_str_unsafe("org/classweave/ChangeEvent"),
            fetch_group: BinaryName::from_str_unsafe("org/classweave/FetchGroup"),
            session: BinaryName::from_str_unsafe("org/classweave/Session"),
            cache_key: BinaryName::from_str_unsafe("org/classweave/CacheKey"),
            link_registry: BinaryName::from_str_unsafe("org/classweave/LinkRegistry"),
            not_fetched_error: BinaryName::from_str_unsafe("org/classweave/NotFetchedError"),
            markers: MarkerInterfaces::new(),
        }
    }
}

impl MarkerInterfaces {
    pub fn new() -> MarkerInterfaces {
        MarkerInterfaces {
            woven: BinaryName::from_str_unsafe("org/classweave/Woven"),
            woven_lazy: BinaryName::from_str_unsafe("org/classweave/WovenLazy"),
            woven_change_tracking: BinaryName::from_str_unsafe(
                "org/classweave/WovenChangeTracking",
            ),
            woven_fetch_groups: BinaryName::from_str_unsafe("org/classweave/WovenFetchGroups"),
            woven_identity: BinaryName::from_str_unsafe("org/classweave/WovenIdentity"),
            woven_object: BinaryName::from_str_unsafe("org/classweave/WovenObject"),
            woven_links: BinaryName::from_str_unsafe("org/classweave/WovenLinks"),
        }
    }

    /// Capabilities a class advertises through interfaces it already declares
    ///
    /// This is how an entry-guard hit still yields usable capability bits for
    /// descendants: the markers on the class record what an earlier weaving
    /// pass gave it.
    pub fn capabilities_of(&self, interfaces: &[BinaryName]) -> WeaveCapabilities {
        let mut capabilities = WeaveCapabilities::empty();
        for interface in interfaces {
            if *interface == self.woven {
                capabilities |= WeaveCapabilities::WOVEN;
            } else if *interface == self.woven_lazy {
                capabilities |= WeaveCapabilities::LAZY;
            } else if *interface == self.woven_change_tracking {
                capabilities |= WeaveCapabilities::CHANGE_TRACKING;
            } else if *interface == self.woven_fetch_groups {
                capabilities |= WeaveCapabilities::FETCH_GROUPS;
            } else if *interface == self.woven_identity {
                capabilities |= WeaveCapabilities::IDENTITY;
            } else if *interface == self.woven_object {
                capabilities |= WeaveCapabilities::DISPATCHERS;
            } else if *interface == self.woven_links {
                capabilities |= WeaveCapabilities::LINKS;
            } else if *interface == BinaryName::CLONEABLE {
                capabilities |= WeaveCapabilities::CLONEABLE;
            }
        }
        capabilities
    }
}

/// Member references into the runtime support library
pub struct RuntimeMembers {
    pub holder: HolderMembers,
    pub listener: ListenerMembers,
    pub event: EventMembers,
    pub fetch_group: FetchGroupMembers,
    pub error: ErrorMembers,
    pub object: ObjectMembers,
}

/// Members of the indirection-holder interface and its simple implementation
pub struct HolderMembers {
    pub get_value: MethodRef,
    pub set_value: MethodRef,
    pub is_instantiated: MethodRef,
    pub is_newly_created: MethodRef,
    pub set_newly_created: MethodRef,
    pub is_coordinated: MethodRef,
    pub clone: MethodRef,

    /// Constructor of the simple holder, wrapping an already-loaded value
    pub init: MethodRef,
}

/// Members of the change-listener interface
pub struct ListenerMembers {
    pub property_change: MethodRef,
}

/// Members of the change-event class
pub struct EventMembers {
    /// Constructor taking `(source, attributeName, oldValue, newValue)`
    pub init: MethodRef,
}

/// Members of the fetch-group class
pub struct FetchGroupMembers {
    pub contains_attribute: MethodRef,
    pub on_unfetched: MethodRef,
    pub on_unfetched_for_set: MethodRef,
}

/// Members of the unfetched-access error class
pub struct ErrorMembers {
    pub init: MethodRef,
}

/// Members inherited from the universal base class
pub struct ObjectMembers {
    pub clone: MethodRef,
}

impl RuntimeMembers {
    pub fn new(classes: &RuntimeClasses) -> RuntimeMembers {
        let object_descriptor =
            |parameters: Vec<FieldType>, return_type: Option<FieldType>| MethodDescriptor {
                parameters,
                return_type,
            };

        let holder = HolderMembers {
            get_value: MethodRef {
                class: classes.value_holder.clone(),
                name: UnqualifiedName::GETVALUE,
                descriptor: object_descriptor(vec![], Some(FieldType::OBJECT)),
            },
            set_value: MethodRef {
                class: classes.value_holder.clone(),
                name: UnqualifiedName::SETVALUE,
                descriptor: object_descriptor(vec![FieldType::OBJECT], None),
            },
            is_instantiated: MethodRef {
                class: classes.value_holder.clone(),
                name: UnqualifiedName::ISINSTANTIATED,
                descriptor: object_descriptor(vec![], Some(FieldType::BOOLEAN)),
            },
            is_newly_created: MethodRef {
                class: classes.value_holder.clone(),
                name: UnqualifiedName::ISNEWLYCREATED,
                descriptor: object_descriptor(vec![], Some(FieldType::BOOLEAN)),
            },
            set_newly_created: MethodRef {
                class: classes.value_holder.clone(),
                name: UnqualifiedName::SETNEWLYCREATED,
                descriptor: object_descriptor(vec![FieldType::BOOLEAN], None),
            },
            is_coordinated: MethodRef {
                class: classes.value_holder.clone(),
                name: UnqualifiedName::ISCOORDINATED,
                descriptor: object_descriptor(vec![], Some(FieldType::BOOLEAN)),
            },
            clone: MethodRef {
                class: classes.value_holder.clone(),
                name: UnqualifiedName::CLONE,
                descriptor: object_descriptor(vec![], Some(FieldType::OBJECT)),
            },
            init: MethodRef {
                class: classes.simple_value_holder.clone(),
                name: UnqualifiedName::INIT,
                descriptor: object_descriptor(vec![FieldType::OBJECT], None),
            },
        };

        let listener = ListenerMembers {
            property_change: MethodRef {
                class: classes.change_listener.clone(),
                name: UnqualifiedName::PROPERTYCHANGE,
                descriptor: object_descriptor(
                    vec![FieldType::object(classes.change_event.clone())],
                    None,
                ),
            },
        };

        let event = EventMembers {
            init: MethodRef {
                class: classes.change_event.clone(),
                name: UnqualifiedName::INIT,
                descriptor: object_descriptor(
                    vec![
                        FieldType::OBJECT,
                        FieldType::STRING,
                        FieldType::OBJECT,
                        FieldType::OBJECT,
                    ],
                    None,
                ),
            },
        };

        let fetch_group = FetchGroupMembers {
            contains_attribute: MethodRef {
                class: classes.fetch_group.clone(),
                name: UnqualifiedName::CONTAINSATTRIBUTE,
                descriptor: object_descriptor(vec![FieldType::STRING], Some(FieldType::BOOLEAN)),
            },
            on_unfetched: MethodRef {
                class: classes.fetch_group.clone(),
                name: UnqualifiedName::ONUNFETCHED,
                descriptor: object_descriptor(
                    vec![FieldType::OBJECT, FieldType::STRING],
                    Some(FieldType::STRING),
                ),
            },
            on_unfetched_for_set: MethodRef {
                class: classes.fetch_group.clone(),
                name: UnqualifiedName::ONUNFETCHEDFORSET,
                descriptor: object_descriptor(
                    vec![FieldType::OBJECT, FieldType::STRING],
                    Some(FieldType::STRING),
                ),
            },
        };

        let error = ErrorMembers {
            init: MethodRef {
                class: classes.not_fetched_error.clone(),
                name: UnqualifiedName::INIT,
                descriptor: object_descriptor(vec![FieldType::STRING], None),
            },
        };

        let object = ObjectMembers {
            clone: MethodRef {
                class: BinaryName::OBJECT,
                name: UnqualifiedName::CLONE,
                descriptor: object_descriptor(vec![], Some(FieldType::OBJECT)),
            },
        };

        RuntimeMembers {
            holder,
            listener,
            event,
            fetch_group,
            error,
            object,
        }
    }
}
