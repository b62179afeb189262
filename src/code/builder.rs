use crate::code::{Instruction, MethodBody, SynLabel};
use std::collections::HashSet;

/// Incremental builder for a [`MethodBody`]
///
/// The builder hands out fresh labels and checks (in debug builds) that every
/// branch target ends up placed exactly once.
pub struct BodyBuilder {
    instructions: Vec<Instruction>,
    next_label: usize,
}

impl BodyBuilder {
    pub fn new() -> BodyBuilder {
        BodyBuilder::starting_at(0)
    }

    /// Builder whose fresh labels start above a given index
    ///
    /// Needed when the built code will be spliced onto an existing body whose
    /// labels must not be shadowed.
    pub fn starting_at(first_label: usize) -> BodyBuilder {
        BodyBuilder {
            instructions: vec![],
            next_label: first_label,
        }
    }

    /// Get a label not yet used anywhere in this body
    pub fn fresh_label(&mut self) -> SynLabel {
        let label = SynLabel::new(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn extend(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.instructions.extend(instructions);
    }

    /// Anchor a label at the current end of the body
    pub fn place_label(&mut self, label: SynLabel) {
        self.instructions.push(Instruction::Label(label));
    }

    pub fn finish(self) -> MethodBody {
        if cfg!(debug_assertions) {
            self.check_labels();
        }
        MethodBody::new(self.instructions)
    }

    fn check_labels(&self) {
        let mut placed: HashSet<SynLabel> = HashSet::new();
        for instruction in &self.instructions {
            if let Instruction::Label(label) = instruction {
                debug_assert!(placed.insert(*label), "label {:?} placed twice", label);
            }
        }
        for instruction in &self.instructions {
            let target = match instruction {
                Instruction::Branch(_, label) => label,
                Instruction::Jump(label) => label,
                _ => continue,
            };
            debug_assert!(placed.contains(target), "label {:?} never placed", target);
        }
    }
}

#[test]
fn builds_branchy_body() {
    use crate::code::{Literal, Test};

    let mut builder = BodyBuilder::new();
    let done = builder.fresh_label();
    builder.push(Instruction::Load(0));
    builder.push(Instruction::Branch(Test::IsNull, done));
    builder.push(Instruction::Const(Literal::Bool(true)));
    builder.push(Instruction::ReturnValue);
    builder.place_label(done);
    builder.push(Instruction::Const(Literal::Bool(false)));
    builder.push(Instruction::ReturnValue);

    let body = builder.finish();
    assert_eq!(body.len(), 7);
    assert_eq!(body.max_label_index(), Some(0));
}

#[test]
fn fresh_labels_respect_offset() {
    let mut builder = BodyBuilder::starting_at(4);
    let first = builder.fresh_label();
    let second = builder.fresh_label();
    assert_eq!(first.index(), 4);
    assert_eq!(second.index(), 5);
}
