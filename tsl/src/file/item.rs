use serde::Deserialize;
use toml::Spanned;

use crate::block::attribute::{AttributeValue, Attributes};
use crate::value::Value;

fn empty_map() -> AttributeValue {
    AttributeValue::Map(Attributes::new())
}

/// One entry of a phase body or of a nested block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Sequence(BlockSpec),
    Atomic(BlockSpec),
    Iterate(BlockSpec),
    Block(BlockSpec),
    Call(CallSpec),
    Label(String),
    GlobalLabel(String),
    Weak(String),
    NumericLabel(AttributeValue),
    Text(String),
    Comment(String),
    Executed(ScopeSpec),
    Nonexecuted(ScopeSpec),
    Branches(ScopeSpec),
    Attributes(AttributeScopeSpec),
    Data(DataRegionSpec),
    Section(NamedSectionSpec),
    SectionText(SectionSpec),
    SectionData(SectionSpec),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockSpec {
    /// Strategy options and extra attributes. Must be a table.
    #[serde(default = "empty_map")]
    pub attrs: AttributeValue,
    #[serde(default)]
    pub items: Vec<Spanned<Item>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeSpec {
    #[serde(default)]
    pub items: Vec<Spanned<Item>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeScopeSpec {
    pub attrs: AttributeValue,
    #[serde(default)]
    pub items: Vec<Spanned<Item>>,
}

/// `{ section = { name = ".boot", pa = 0, va = 0, args = "...", items = [...] } }`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedSectionSpec {
    pub name: String,
    pub pa: u64,
    pub va: u64,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub items: Vec<Spanned<Item>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionSpec {
    pub pa: u64,
    pub va: u64,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub items: Vec<Spanned<Item>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    /// Name of a situation from the `[situations]` table.
    #[serde(default)]
    pub situation: Option<String>,
    #[serde(default = "empty_map")]
    pub attrs: AttributeValue,
}

/// A call argument or a data value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArgSpec {
    Reference(ArgRef),
    Value(Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgRef {
    /// `{ rand = [from, to] }`
    Rand([i64; 2]),
    /// `{ dist = "name" }`
    Dist(String),
    Label(String),
    LabelF(AttributeValue),
    LabelB(AttributeValue),
    Address(ReferenceSpec),
    Entry(ReferenceSpec),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceSpec {
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub bits: Vec<[u32; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataRegionSpec {
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub separate_file: bool,
    #[serde(default)]
    pub items: Vec<Spanned<DataItem>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataItem {
    /// An address, or `{ delta = n }` for a relative origin.
    Org(AttributeValue),
    Align(u64),
    Label(String),
    GlobalLabel(String),
    Text(String),
    Comment(String),
    Emit(EmitSpec),
    Data(DataRegionSpec),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmitSpec {
    /// A type, space or string declared in `[data]`.
    pub name: String,
    #[serde(default)]
    pub values: Vec<ArgSpec>,
}
