//! Augment persistence-mapped classes with lazy loading, change tracking,
//! fetch-group guards, and identity bookkeeping
//!
//! The engine works entirely on descriptions: a
//! [`metadata::ClassDescriptor`] says what a class looks like, a
//! [`weave::WeavePolicy`] says which transformations are allowed, and
//! [`weave::augment`] produces a [`class::TransformedClass`] listing the
//! marker interfaces, synthesized members, and rewritten method bodies a
//! backend should apply. Original classes are never touched, and the same
//! inputs always produce the same output.
//!
//! ```
//! use classweave::class::{BinaryName, FieldType, Name, UnqualifiedName, WeaveCapabilities};
//! use classweave::metadata::{AttributeDescriptor, ClassDescriptor};
//! use classweave::weave::{augment, Ancestry, WeavePolicy};
//!
//! // Describe a class with one lazily-loaded relationship
//! let order = BinaryName::from_string(String::from("com/acme/Order")).unwrap();
//! let address_class = BinaryName::from_string(String::from("com/acme/Address")).unwrap();
//! let mut descriptor = ClassDescriptor::new(order, None);
//! let mut address = AttributeDescriptor::new(
//!     UnqualifiedName::from_string(String::from("address")).unwrap(),
//!     Some(FieldType::object(address_class)),
//! );
//! address.weave_value_holder = true;
//! descriptor.add_attribute(address);
//!
//! // Augment it as a hierarchy root under the default policy
//! let woven = augment(&descriptor, &WeavePolicy::new(), Ancestry::Root).unwrap();
//!
//! // The indirection plumbing was synthesized and the class is marked lazy
//! assert!(woven.capabilities.contains(WeaveCapabilities::LAZY));
//! assert!(woven.field("_woven_address_holder").is_some());
//! assert!(woven.method("_woven_get_address_holder").is_some());
//! assert!(woven.method("_woven_initialize_address_holder").is_some());
//! ```

pub mod class;
pub mod code;
pub mod metadata;
pub mod runtime;
pub mod weave;
