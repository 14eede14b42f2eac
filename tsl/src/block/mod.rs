pub mod attribute;
pub mod call;

use std::fmt;

use crate::block::attribute::Attributes;
use crate::block::call::InstructionCall;
use crate::error::Error;
use crate::location::SourceLocation;

/// How a block emits its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Children form one indivisible unit.
    Atomic,
    /// Children are emitted in declared order.
    Sequence,
    /// Each child is one iteration.
    Iterate,
    /// Children are combined by the attached strategies.
    Free,
}

impl BlockKind {
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Atomic => "atomic",
            BlockKind::Sequence => "sequence",
            BlockKind::Iterate => "iterate",
            BlockKind::Free => "block",
        }
    }
}

/// Hierarchical block identifier: the path of child indices from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(Vec<u32>);

impl BlockId {
    pub fn root() -> Self {
        BlockId(Vec::new())
    }

    pub fn child(&self, index: u32) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        BlockId(path)
    }

    /// True if `other` is nested (at any depth) inside this block.
    pub fn is_ancestor_of(&self, other: &BlockId) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    /// True if `other` is this block or nested inside it.
    pub fn encloses(&self, other: &BlockId) -> bool {
        self == other || self.is_ancestor_of(other)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root")?;
        for index in &self.0 {
            write!(f, ".{}", index)?;
        }
        Ok(())
    }
}

/// Strategy names attached to a block. Omitted strategies pass through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategySet {
    pub combinator: Option<String>,
    pub permutator: Option<String>,
    pub compositor: Option<String>,
    pub rearranger: Option<String>,
    pub obfuscator: Option<String>,
}

impl StrategySet {
    /// Pairs of (option name, strategy name) for every attached strategy.
    pub fn attached(&self) -> Vec<(&'static str, &str)> {
        [
            ("combinator", &self.combinator),
            ("permutator", &self.permutator),
            ("compositor", &self.compositor),
            ("rearranger", &self.rearranger),
            ("obfuscator", &self.obfuscator),
        ]
        .into_iter()
        .filter_map(|(option, name)| name.as_deref().map(|name| (option, name)))
        .collect()
    }

    /// Combinator, permutator and compositor only make sense for free composition.
    pub fn validate(&self, kind: BlockKind) -> Result<(), Error> {
        if kind == BlockKind::Free {
            return Ok(());
        }
        let misplaced: Vec<&str> = [
            ("combinator", &self.combinator),
            ("permutator", &self.permutator),
            ("compositor", &self.compositor),
        ]
        .into_iter()
        .filter(|(_, name)| name.is_some())
        .map(|(option, _)| option)
        .collect();

        if misplaced.is_empty() {
            Ok(())
        } else {
            Err(Error::configuration(format!(
                "{} is not allowed in `{}` blocks",
                misplaced.join(", "),
                kind.name()
            ))
            .with_note("combinators, permutators and compositors apply only to `block`"))
        }
    }
}

/// A node in the composition tree. Sealed once its block-closing call returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub children: Vec<Element>,
    pub strategies: StrategySet,
    pub attributes: Attributes,
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Block(Block),
    Call(InstructionCall),
}

impl Block {
    /// All calls of this block and its nested blocks, in declaration order.
    pub fn calls(&self) -> Vec<&InstructionCall> {
        let mut calls = Vec::new();
        collect_calls(self, &mut calls);
        calls
    }
}

fn collect_calls<'a>(block: &'a Block, calls: &mut Vec<&'a InstructionCall>) {
    for child in &block.children {
        match child {
            Element::Block(nested) => collect_calls(nested, calls),
            Element::Call(call) => calls.push(call),
        }
    }
}
