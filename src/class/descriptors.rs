use crate::class::names::{BinaryName, Name, UnqualifiedName};
use std::io::{Error, ErrorKind, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Types which can be turned into descriptor strings
pub trait RenderDescriptor {
    /// Write the descriptor onto the string buffer
    fn render_to(&self, write_to: &mut String);

    /// Produce the descriptor string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }
}

/// Types which can be parsed from descriptor strings
pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from an iterator of characters
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self>;

    /// Parse a descriptor from a string, requiring that the whole input is
    /// consumed
    fn parse(source: &str) -> Result<Self> {
        let mut iterator = source.chars().peekable();
        let parsed = Self::parse_from(&mut iterator)?;
        if iterator.peek().is_none() {
            Ok(parsed)
        } else {
            let message = format!("Unexpected leftover input in '{}'", source);
            Err(Error::new(ErrorKind::InvalidData, message))
        }
    }
}

/// Primitive value types
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseType {
    Int,
    Char,
    Double,
    Float,
    Long,
    Short,
    Boolean,
    Byte,
}

impl BaseType {
    /// Class which boxes values of this primitive type
    pub fn boxed_class(&self) -> BinaryName {
        match self {
            BaseType::Int => BinaryName::INTEGER,
            BaseType::Char => BinaryName::CHARACTER,
            BaseType::Double => BinaryName::DOUBLE,
            BaseType::Float => BinaryName::FLOAT,
            BaseType::Long => BinaryName::LONG,
            BaseType::Short => BinaryName::SHORT,
            BaseType::Boolean => BinaryName::BOOLEAN,
            BaseType::Byte => BinaryName::BYTE,
        }
    }

    /// Method on the boxing class which extracts the primitive value back out
    pub fn unboxing_method(&self) -> UnqualifiedName {
        match self {
            BaseType::Int => UnqualifiedName::INTVALUE,
            BaseType::Char => UnqualifiedName::CHARVALUE,
            BaseType::Double => UnqualifiedName::DOUBLEVALUE,
            BaseType::Float => UnqualifiedName::FLOATVALUE,
            BaseType::Long => UnqualifiedName::LONGVALUE,
            BaseType::Short => UnqualifiedName::SHORTVALUE,
            BaseType::Boolean => UnqualifiedName::BOOLEANVALUE,
            BaseType::Byte => UnqualifiedName::BYTEVALUE,
        }
    }

    /// Descriptor of the boxing class constructor taking this primitive type
    pub fn boxing_constructor(&self) -> MethodDescriptor {
        MethodDescriptor {
            parameters: vec![FieldType::Base(*self)],
            return_type: None,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Int => 'I',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
            BaseType::Byte => 'B',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        let typ = match source.next() {
            Some('I') => BaseType::Int,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some('B') => BaseType::Byte,
            Some(c) => {
                let message = format!("Invalid base type '{}'", c);
                return Err(Error::new(ErrorKind::InvalidData, message));
            }
            None => {
                let message = "Missing base type".to_string();
                return Err(Error::new(ErrorKind::UnexpectedEof, message));
            }
        };
        Ok(typ)
    }
}

/// Type of a field or attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Primitive type
    Base(BaseType),

    /// Class or interface type
    Object(BinaryName),

    /// Array type
    Array(Box<FieldType>),
}

impl FieldType {
    /// Class or interface type
    pub fn object(class_name: BinaryName) -> FieldType {
        FieldType::Object(class_name)
    }

    /// Array type
    pub fn array(element: FieldType) -> FieldType {
        FieldType::Array(Box::new(element))
    }

    /// Is this a primitive type?
    pub fn is_primitive(&self) -> bool {
        matches!(self, FieldType::Base(_))
    }

    pub const OBJECT: FieldType = FieldType::Object(BinaryName::OBJECT);
    pub const STRING: FieldType = FieldType::Object(BinaryName::STRING);
    pub const INT: FieldType = FieldType::Base(BaseType::Int);
    pub const LONG: FieldType = FieldType::Base(BaseType::Long);
    pub const BOOLEAN: FieldType = FieldType::Base(BaseType::Boolean);
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base) => base.render_to(write_to),
            FieldType::Object(class_name) => {
                write_to.push('L');
                write_to.push_str(class_name.as_str());
                write_to.push(';');
            }
            FieldType::Array(element) => {
                write_to.push('[');
                element.render_to(write_to);
            }
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        let typ = match source.peek() {
            Some('L') => {
                let _ = source.next();
                let mut class_name = String::new();
                loop {
                    match source.next() {
                        Some(';') => break,
                        Some(c) => class_name.push(c),
                        None => {
                            let message = "Missing ';' in object type".to_string();
                            return Err(Error::new(ErrorKind::UnexpectedEof, message));
                        }
                    }
                }
                let class_name = BinaryName::from_string(class_name)
                    .map_err(|msg| Error::new(ErrorKind::InvalidData, msg))?;
                FieldType::Object(class_name)
            }
            Some('[') => {
                let _ = source.next();
                FieldType::array(FieldType::parse_from(source)?)
            }
            _ => FieldType::Base(BaseType::parse_from(source)?),
        };
        Ok(typ)
    }
}

/// Signature of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Types of the method parameters
    pub parameters: Vec<FieldType>,

    /// Return type of the method (`None` corresponds to `void`)
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// Descriptor of a method taking no parameters and returning nothing
    pub const fn nullary() -> MethodDescriptor {
        MethodDescriptor {
            parameters: Vec::new(),
            return_type: None,
        }
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        }
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if source.next() != Some('(') {
            let message = "Expected '(' at the start of method descriptor".to_string();
            return Err(Error::new(ErrorKind::InvalidData, message));
        }
        let mut parameters = vec![];
        loop {
            if source.peek() == Some(&')') {
                let _ = source.next();
                break;
            }
            parameters.push(FieldType::parse_from(source)?);
        }
        let return_type = if source.peek() == Some(&'V') {
            let _ = source.next();
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[test]
fn render_field_descriptors() {
    assert_eq!(FieldType::INT.render(), "I");
    assert_eq!(
        FieldType::object(BinaryName::STRING).render(),
        "Ljava/lang/String;"
    );
    assert_eq!(
        FieldType::array(FieldType::Base(BaseType::Byte)).render(),
        "[B"
    );
}

#[test]
fn render_method_descriptors() {
    let descriptor = MethodDescriptor {
        parameters: vec![FieldType::STRING, FieldType::OBJECT, FieldType::OBJECT],
        return_type: None,
    };
    assert_eq!(
        descriptor.render(),
        "(Ljava/lang/String;Ljava/lang/Object;Ljava/lang/Object;)V"
    );
    assert_eq!(MethodDescriptor::nullary().render(), "()V");
}

#[test]
fn parse_method_descriptors() {
    let parsed = MethodDescriptor::parse("(Ljava/lang/String;)Z").unwrap();
    assert_eq!(parsed.parameters, vec![FieldType::STRING]);
    assert_eq!(parsed.return_type, Some(FieldType::BOOLEAN));

    let round_trip = "([[DLjava/lang/Object;J)Ljava/lang/String;";
    assert_eq!(
        MethodDescriptor::parse(round_trip).unwrap().render(),
        round_trip
    );
    assert!(MethodDescriptor::parse("(Ljava/lang/String;)Zx").is_err());
    assert!(MethodDescriptor::parse("(Q)V").is_err());
}
