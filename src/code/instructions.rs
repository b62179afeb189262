use crate::class::{FieldRef, FieldType, MethodRef, UnqualifiedName};
use crate::code::SynLabel;
use crate::class::BinaryName;

/// Constant operands
///
/// Attribute names pushed with [`Literal::Name`] are interned: at runtime two
/// pushes of the same name produce the same reference, so they can be compared
/// with [`Test::RefEq`]/[`Test::RefNe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Bool(bool),
    Name(UnqualifiedName),
}

/// Flavour of method invocation
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InvokeKind {
    /// Dispatch on the runtime class of the receiver
    Virtual,

    /// Like `Virtual`, but the resolved member lives on an interface
    Interface,

    /// Dispatch on the named class (constructors and super-calls)
    Special,
}

/// Condition tested by a [`Instruction::Branch`]
///
/// `IsNull`/`NonNull`/`True`/`False` pop one operand, `RefEq`/`RefNe` pop
/// two. Reference comparisons are by identity, never by structural equality.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Test {
    IsNull,
    NonNull,
    True,
    False,
    RefEq,
    RefNe,
}

/// A machine-neutral instruction inside a synthesized method body
///
/// The set is closed: backends lower each variant to whatever encoding their
/// target format uses. Stack conventions follow the usual object-machine
/// shape:
///
///   - `GetField` pops the receiver and pushes the field value
///   - `PutField` pops the value, then the receiver
///   - `Invoke` pops the arguments (last pushed first), then the receiver
///   - `New` pushes an uninitialized instance; pair it with an
///     `Invoke(Special, ..)` of a constructor
///
/// Local slot 0 always holds the receiver, slots 1.. hold the parameters in
/// declaration order, and higher slots are scratch space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Push the value of a local slot
    Load(u16),

    /// Pop a value into a local slot
    Store(u16),

    /// Push a constant
    Const(Literal),

    /// Read a field off an object
    GetField(FieldRef),

    /// Write a field of an object
    PutField(FieldRef),

    /// Call a method
    Invoke(InvokeKind, MethodRef),

    /// Allocate an instance of a class
    New(BinaryName),

    /// Narrow the type of the top of the stack
    Cast(FieldType),

    /// Duplicate the top of the stack
    Dup,

    /// Discard the top of the stack
    Pop,

    /// Conditionally jump to a label
    Branch(Test, SynLabel),

    /// Unconditionally jump to a label
    Jump(SynLabel),

    /// Place a label at this point in the body
    Label(SynLabel),

    /// Raise the error object on top of the stack
    Throw,

    /// Leave the method without a value
    Return,

    /// Leave the method, returning the top of the stack
    ReturnValue,
}

/// Straight-line body of a synthesized or rewritten method
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
}

impl MethodBody {
    pub fn new(instructions: Vec<Instruction>) -> MethodBody {
        MethodBody { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Highest label index mentioned anywhere in the body
    ///
    /// Used to pick fresh labels that cannot collide when prepending new code
    /// onto an existing body.
    pub fn max_label_index(&self) -> Option<usize> {
        self.instructions
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Branch(_, label) => Some(label.index()),
                Instruction::Jump(label) => Some(label.index()),
                Instruction::Label(label) => Some(label.index()),
                _ => None,
            })
            .max()
    }
}
