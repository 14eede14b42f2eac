use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::block::attribute::Attributes;
use crate::label::{AddressReference, Label, LabelRef};
use crate::location::SourceLocation;
use crate::section::MemorySection;
use crate::situation::Situation;
use crate::value::{Distribution, Value};

/// An operand of an instruction call, resolved when the sequence is expanded.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    /// `rand(dist)`: sampled at expansion time.
    Random(Rc<Distribution>),
    /// `rand(from, to)`: an integer drawn from the inclusive range.
    RandomRange(RangeInclusive<i64>),
    Label(LabelRef),
    Address(AddressReference),
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<i64> for Argument {
    fn from(n: i64) -> Self {
        Argument::Value(Value::Integer(n))
    }
}

impl From<bool> for Argument {
    fn from(b: bool) -> Self {
        Argument::Value(Value::Boolean(b))
    }
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Argument::Value(Value::from(s))
    }
}

impl From<Rc<Distribution>> for Argument {
    fn from(distribution: Rc<Distribution>) -> Self {
        Argument::Random(distribution)
    }
}

impl From<LabelRef> for Argument {
    fn from(reference: LabelRef) -> Self {
        Argument::Label(reference)
    }
}

impl From<AddressReference> for Argument {
    fn from(reference: AddressReference) -> Self {
        Argument::Address(reference)
    }
}

/// Free text placed in the instruction stream before a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Text(String),
    Comment(String),
}

/// A leaf of the composition tree: one instruction placeholder.
///
/// The instruction set is not modelled here; `name` is opaque to the engine.
/// A call with an empty name is a placeholder that only carries labels and
/// outputs left pending when its block closed.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionCall {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub labels: Vec<Label>,
    pub outputs: Vec<Output>,
    pub situation: Option<Situation>,
    pub attributes: Attributes,
    pub section: Option<Rc<MemorySection>>,
    pub location: Option<SourceLocation>,
}

impl InstructionCall {
    pub fn new(name: impl Into<String>) -> Self {
        InstructionCall {
            name: name.into(),
            arguments: Vec::new(),
            labels: Vec::new(),
            outputs: Vec::new(),
            situation: None,
            attributes: Attributes::new(),
            section: None,
            location: None,
        }
    }

    pub fn placeholder() -> Self {
        Self::new(String::new())
    }

    pub fn arg(mut self, argument: impl Into<Argument>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, A>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn situation(mut self, situation: Situation) -> Self {
        self.situation = Some(situation);
        self
    }

    pub fn located(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_executable(&self) -> bool {
        !self.name.is_empty()
    }
}
