use std::fmt;
use std::rc::Rc;

use crate::label::Label;
use crate::section::MemorySection;
use crate::value::Value;

/// Bits per addressable unit when `data_config` does not say otherwise.
pub const DEFAULT_ITEM_SIZE: u32 = 8;

/// `data_config(target: ..., item_size: ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    pub target: String,
    pub item_size: u32,
}

impl DataConfig {
    pub fn new(target: impl Into<String>) -> Self {
        DataConfig {
            target: target.into(),
            item_size: DEFAULT_ITEM_SIZE,
        }
    }

    pub fn item_size(mut self, bits: u32) -> Self {
        self.item_size = bits;
        self
    }
}

/// A model data type, e.g. `card(32)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataType {
    pub name: String,
    pub args: Vec<i64>,
}

impl DataType {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = i64>) -> Self {
        DataType {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

/// A declaration made while configuring data. Each one enables an
/// emission operation of the same name inside data regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDefinition {
    Type {
        id: String,
        text: String,
        data_type: DataType,
    },
    Space {
        id: String,
        text: String,
        fill_with: i64,
    },
    AsciiString {
        id: String,
        text: String,
        zero_term: bool,
    },
}

impl DataDefinition {
    pub fn id(&self) -> &str {
        match self {
            DataDefinition::Type { id, .. }
            | DataDefinition::Space { id, .. }
            | DataDefinition::AsciiString { id, .. } => id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            DataDefinition::Type { .. } => "type",
            DataDefinition::Space { .. } => "space",
            DataDefinition::AsciiString { .. } => "string",
        }
    }
}

/// One line of a data section.
#[derive(Debug, Clone, PartialEq)]
pub enum DataDirective {
    Values {
        text: String,
        data_type: DataType,
        values: Vec<Value>,
    },
    Space {
        text: String,
        fill_with: i64,
        length: u64,
    },
    AsciiStrings {
        text: String,
        zero_term: bool,
        strings: Vec<String>,
    },
    Label(Label),
    Text(String),
    Comment(String),
    Origin(u64),
    RelativeOrigin(i64),
    Align {
        value: u64,
        bytes: u64,
    },
}

/// What one outermost `data(...)` region produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSection {
    pub target: String,
    pub global: bool,
    pub separate_file: bool,
    /// The memory section the region was opened in, if any.
    pub section: Option<Rc<MemorySection>>,
    pub directives: Vec<DataDirective>,
}

impl DataSection {
    pub fn labels(&self) -> impl Iterator<Item = (usize, &Label)> {
        self.directives
            .iter()
            .enumerate()
            .filter_map(|(index, directive)| match directive {
                DataDirective::Label(label) => Some((index, label)),
                _ => None,
            })
    }
}
