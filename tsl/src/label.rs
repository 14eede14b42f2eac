use std::fmt;
use std::ops::Range;

use crate::block::BlockId;
use crate::error::Error;

/// Index of a numeric label (`1:`, `1f`, `1b`). Always within `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NumericSlot(u8);

impl NumericSlot {
    pub const MAX: u8 = 9;

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for NumericSlot {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Error> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Ok(NumericSlot(value as u8))
        } else {
            Err(Error::range(format!(
                "numeric label {} is outside 0..={}",
                value,
                Self::MAX
            )))
        }
    }
}

impl fmt::Display for NumericSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelName {
    Named(String),
    Numeric(NumericSlot),
}

impl fmt::Display for LabelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelName::Named(name) => write!(f, "{}", name),
            LabelName::Numeric(slot) => write!(f, "{}", slot),
        }
    }
}

/// A label declaration, scoped to the block it was declared in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: LabelName,
    pub global: bool,
    pub weak: bool,
    pub scope: BlockId,
}

impl Label {
    pub fn named(name: impl Into<String>, scope: BlockId) -> Self {
        Label {
            name: LabelName::Named(name.into()),
            global: false,
            weak: false,
            scope,
        }
    }

    pub fn numeric(slot: NumericSlot, scope: BlockId) -> Self {
        Label {
            name: LabelName::Numeric(slot),
            global: false,
            weak: false,
            scope,
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }
}

/// A reference to a label from a call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelRef {
    Named { name: String, scope: BlockId },
    Numeric {
        slot: NumericSlot,
        forward: bool,
        scope: BlockId,
    },
}

impl LabelRef {
    pub fn scope(&self) -> &BlockId {
        match self {
            LabelRef::Named { scope, .. } | LabelRef::Numeric { scope, .. } => scope,
        }
    }
}

impl fmt::Display for LabelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelRef::Named { name, .. } => write!(f, "{}", name),
            LabelRef::Numeric { slot, forward, .. } => {
                write!(f, "{}{}", slot, if *forward { "f" } else { "b" })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Address,
    /// A reference to a buffer entry (e.g. a page-table entry).
    Entry,
}

/// Half-open bit range `[min, max)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitRange(pub Range<u32>);

/// Opaque handle produced by `address_reference` / `entry_reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressReference {
    pub kind: ReferenceKind,
    /// Addressing indirection depth.
    pub level: u32,
    pub bits: Option<BitRange>,
}

impl AddressReference {
    pub fn address(level: u32) -> Self {
        AddressReference {
            kind: ReferenceKind::Address,
            level,
            bits: None,
        }
    }

    pub fn entry(level: u32) -> Self {
        AddressReference {
            kind: ReferenceKind::Entry,
            level,
            bits: None,
        }
    }

    /// Narrow to `[min, max)`. Narrowing an already narrowed reference
    /// intersects the ranges, so it can only restrict further.
    pub fn bits(&self, min: u32, max: u32) -> Result<Self, Error> {
        if min >= max {
            return Err(Error::range(format!("bit range [{}, {}) is empty", min, max)));
        }
        let narrowed = match &self.bits {
            None => min..max,
            Some(BitRange(current)) => min.max(current.start)..max.min(current.end),
        };
        if narrowed.is_empty() {
            return Err(Error::range(format!(
                "bit range [{}, {}) does not overlap the referenced bits",
                min, max
            )));
        }
        Ok(AddressReference {
            bits: Some(BitRange(narrowed)),
            ..self.clone()
        })
    }
}

impl fmt::Display for AddressReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ReferenceKind::Address => "address",
            ReferenceKind::Entry => "entry",
        };
        write!(f, "{}({})", kind, self.level)?;
        if let Some(BitRange(bits)) = &self.bits {
            write!(f, "[{}..{}]", bits.start, bits.end)?;
        }
        Ok(())
    }
}
