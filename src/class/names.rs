use std::borrow::Cow;
use std::fmt::{Debug, Error as FmtError, Formatter};

/// Names of fields, methods, and attributes
///
/// A valid unqualified name is non-empty and contains none of `.`, `;`, `[`,
/// or `/`. The constructor-shaped names `<init>`/`<clinit>` are the only
/// names allowed to carry angle brackets; they are exposed as constants.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in `foo/bar/Baz` form
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extract the raw underlying string data
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extract the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;

    /// Construct a name from a string which is known to be valid
    ///
    /// Validity is only checked in debug builds.
    fn from_str_unsafe(name: &str) -> Self;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name == "<init>" || name == "<clinit>" {
            Ok(())
        } else if name.contains(['.', ';', '[', '/', '<', '>']) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(String::from("Unqualified name is empty"))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(UnqualifiedName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }

    fn from_str_unsafe(name: &str) -> Self {
        debug_assert!(Self::check_valid(name).is_ok(), "invalid name '{}'", name);
        UnqualifiedName(Cow::Owned(name.to_owned()))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(String::from("Binary name is empty"))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(BinaryName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }

    fn from_str_unsafe(name: &str) -> Self {
        debug_assert!(Self::check_valid(name).is_ok(), "invalid name '{}'", name);
        BinaryName(Cow::Owned(name.to_owned()))
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    /// Concatenate the contents of two unqualified names to produce a third
    pub fn concat(&self, other: &UnqualifiedName) -> UnqualifiedName {
        UnqualifiedName(Cow::Owned(format!("{}{}", self.as_str(), other.as_str())))
    }

    /// Does the name fall in the segment reserved for synthesized members?
    pub fn is_reserved(&self) -> bool {
        self.as_str().starts_with(Self::WOVEN_PREFIX.as_str())
    }

    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // Special names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    // JDK names
    pub const CLONE: Self = Self::name("clone");
    pub const BOOLEANVALUE: Self = Self::name("booleanValue");
    pub const BYTEVALUE: Self = Self::name("byteValue");
    pub const CHARVALUE: Self = Self::name("charValue");
    pub const SHORTVALUE: Self = Self::name("shortValue");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const LONGVALUE: Self = Self::name("longValue");
    pub const FLOATVALUE: Self = Self::name("floatValue");
    pub const DOUBLEVALUE: Self = Self::name("doubleValue");

    // Runtime library member names
    pub const GETVALUE: Self = Self::name("getValue");
    pub const SETVALUE: Self = Self::name("setValue");
    pub const ISINSTANTIATED: Self = Self::name("isInstantiated");
    pub const ISNEWLYCREATED: Self = Self::name("isNewlyCreated");
    pub const SETNEWLYCREATED: Self = Self::name("setNewlyCreated");
    pub const ISCOORDINATED: Self = Self::name("isCoordinated");
    pub const PROPERTYCHANGE: Self = Self::name("propertyChange");
    pub const CONTAINSATTRIBUTE: Self = Self::name("containsAttribute");
    pub const ONUNFETCHED: Self = Self::name("onUnfetchedAttribute");
    pub const ONUNFETCHEDFORSET: Self = Self::name("onUnfetchedAttributeForSet");

    // Names we generate
    pub const WOVEN_PREFIX: Self = Self::name("_woven_");
    pub const LISTENER_FIELD: Self = Self::name("_woven_listener");
    pub const GET_LISTENER: Self = Self::name("_woven_getChangeListener");
    pub const SET_LISTENER: Self = Self::name("_woven_setChangeListener");
    pub const PROPERTY_CHANGE: Self = Self::name("_woven_propertyChange");
    pub const FETCH_GROUP_FIELD: Self = Self::name("_woven_fetchGroup");
    pub const SESSION_FIELD: Self = Self::name("_woven_session");
    pub const GET_FETCH_GROUP: Self = Self::name("_woven_getFetchGroup");
    pub const SET_FETCH_GROUP: Self = Self::name("_woven_setFetchGroup");
    pub const GET_SESSION: Self = Self::name("_woven_getSession");
    pub const SET_SESSION: Self = Self::name("_woven_setSession");
    pub const IS_ATTRIBUTE_FETCHED: Self = Self::name("_woven_isAttributeFetched");
    pub const CHECK_FETCHED: Self = Self::name("_woven_checkFetched");
    pub const CHECK_FETCHED_FOR_SET: Self = Self::name("_woven_checkFetchedForSet");
    pub const PRIMARY_KEY_FIELD: Self = Self::name("_woven_primaryKey");
    pub const CACHE_KEY_FIELD: Self = Self::name("_woven_cacheKey");
    pub const GET_ID: Self = Self::name("_woven_getId");
    pub const SET_ID: Self = Self::name("_woven_setId");
    pub const GET_CACHE_KEY: Self = Self::name("_woven_getCacheKey");
    pub const SET_CACHE_KEY: Self = Self::name("_woven_setCacheKey");
    pub const LINKS_FIELD: Self = Self::name("_woven_links");
    pub const GET_LINKS: Self = Self::name("_woven_getLinks");
    pub const SET_LINKS: Self = Self::name("_woven_setLinks");
    pub const GET_ATTRIBUTE: Self = Self::name("_woven_get");
    pub const SET_ATTRIBUTE: Self = Self::name("_woven_set");
    pub const POST_CLONE: Self = Self::name("_woven_postClone");
    pub const SHALLOW_CLONE: Self = Self::name("_woven_shallowClone");
    pub const NEW_INSTANCE: Self = Self::name("_woven_new");

    const GET_PREFIX: Self = Self::name("_woven_get_");
    const SET_PREFIX: Self = Self::name("_woven_set_");
    const INITIALIZE_PREFIX: Self = Self::name("_woven_initialize_");
    const HOLDER_SUFFIX: Self = Self::name("_holder");

    /// Name of the indirection holder field for an attribute
    pub fn holder_field(attr: &UnqualifiedName) -> UnqualifiedName {
        Self::WOVEN_PREFIX.concat(attr).concat(&Self::HOLDER_SUFFIX)
    }

    /// Name of the lazily-initializing method for an attribute's holder
    pub fn holder_initializer(attr: &UnqualifiedName) -> UnqualifiedName {
        Self::INITIALIZE_PREFIX.concat(attr).concat(&Self::HOLDER_SUFFIX)
    }

    /// Name of the holder-returning accessor for an attribute
    pub fn holder_getter(attr: &UnqualifiedName) -> UnqualifiedName {
        Self::GET_PREFIX.concat(attr).concat(&Self::HOLDER_SUFFIX)
    }

    /// Name of the holder-accepting accessor for an attribute
    pub fn holder_setter(attr: &UnqualifiedName) -> UnqualifiedName {
        Self::SET_PREFIX.concat(attr).concat(&Self::HOLDER_SUFFIX)
    }

    /// Name of the intercepting value getter for an attribute
    pub fn value_getter(attr: &UnqualifiedName) -> UnqualifiedName {
        Self::GET_PREFIX.concat(attr)
    }

    /// Name of the intercepting value setter for an attribute
    pub fn value_setter(attr: &UnqualifiedName) -> UnqualifiedName {
        Self::SET_PREFIX.concat(attr)
    }
}

impl BinaryName {
    /// Concatenate the contents of an unqualified name onto the end of the
    /// binary name to produce a third. If you want a new segment, use `join`
    /// instead.
    pub fn concat(&self, other: &UnqualifiedName) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}{}", self.as_str(), other.as_str())))
    }

    /// Join segments from the other name onto the end of this binary name
    pub fn join(&self, other: impl Name) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}/{}", self.as_str(), other.as_str())))
    }

    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
}

#[test]
fn unqualified_name_validity() {
    assert!(UnqualifiedName::from_string(String::from("address")).is_ok());
    assert!(UnqualifiedName::from_string(String::from("a/b")).is_err());
    assert!(UnqualifiedName::from_string(String::from("")).is_err());
    assert!(UnqualifiedName::check_valid("<init>").is_ok());
    assert!(UnqualifiedName::check_valid("<weird>").is_err());
    assert!(BinaryName::from_string(String::from("com/acme/Order")).is_ok());
    assert!(BinaryName::from_string(String::from("com//Order")).is_err());
}

#[test]
fn synthetic_name_conventions() {
    let attr = UnqualifiedName::from_str_unsafe("address");
    assert_eq!(
        UnqualifiedName::holder_field(&attr).as_str(),
        "_woven_address_holder"
    );
    assert_eq!(
        UnqualifiedName::holder_initializer(&attr).as_str(),
        "_woven_initialize_address_holder"
    );
    assert_eq!(
        UnqualifiedName::value_getter(&attr).as_str(),
        "_woven_get_address"
    );
    assert!(UnqualifiedName::holder_setter(&attr).is_reserved());
    assert!(!attr.is_reserved());
}
