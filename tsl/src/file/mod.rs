//! Declarative template files.
//!
//! A template file is a TOML document. It is interpreted by the generator
//! through the same calls a Rust template makes, so the two are
//! interchangeable.

pub mod item;

use std::collections::BTreeMap;

use serde::Deserialize;
pub use toml::Spanned;

use crate::block::attribute::{AttributeValue, Attributes};
use crate::data::DEFAULT_ITEM_SIZE;
use crate::error::Error;
use crate::location::SourceLocation;
use crate::settings::Settings;

pub use item::{
    ArgRef, ArgSpec, AttributeScopeSpec, BlockSpec, CallSpec, DataItem, DataRegionSpec, EmitSpec,
    Item, NamedSectionSpec, ReferenceSpec, ScopeSpec, SectionSpec,
};

fn empty_map() -> AttributeValue {
    AttributeValue::Map(Attributes::new())
}

fn default_item_size() -> u32 {
    DEFAULT_ITEM_SIZE
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateFile {
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub data: Option<DataConfigSpec>,
    #[serde(default)]
    pub distributions: BTreeMap<String, Vec<RangeSpec>>,
    #[serde(default)]
    pub situations: BTreeMap<String, SituationSpec>,
    #[serde(default)]
    pub default_situations: Vec<DefaultSituationSpec>,
    #[serde(default)]
    pub pre: PhaseSpec,
    #[serde(default)]
    pub main: PhaseSpec,
    #[serde(default)]
    pub post: PhaseSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseSpec {
    #[serde(default)]
    pub items: Vec<Spanned<Item>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfigSpec {
    pub target: String,
    #[serde(default = "default_item_size")]
    pub item_size: u32,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub spaces: Vec<SpaceSpec>,
    #[serde(default)]
    pub strings: Vec<StringSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub data_type: DataTypeSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataTypeSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpaceSpec {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub fill_with: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringSpec {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub zero_term: bool,
}

/// `{ value = ..., bias = ... }`. `value` may be a scalar, a list of
/// scalars, or `{ dist = "name" }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeSpec {
    pub value: AttributeValue,
    #[serde(default)]
    pub bias: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SituationSpec {
    /// Situation name; the table key when omitted.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub testdata: bool,
    #[serde(default = "empty_map")]
    pub attrs: AttributeValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultSituationSpec {
    /// A name or a list of names.
    pub names: AttributeValue,
    pub situation: String,
}

impl TemplateFile {
    /// Parse a template file. Syntax errors carry the offending span.
    pub fn parse(source: &str, file_id: usize) -> Result<Self, Error> {
        toml::from_str(source).map_err(|e| {
            let error = Error::syntax(e.message().to_string());
            match e.span() {
                Some(span) => error.at(SourceLocation::span(file_id, span)),
                None => error,
            }
        })
    }

    pub fn phases(&self) -> [(&'static str, &PhaseSpec); 3] {
        [("pre", &self.pre), ("main", &self.main), ("post", &self.post)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::value::Value;

    #[test]
    fn parses_nested_blocks_with_spans() {
        let source = r#"
[main]
items = [
  { sequence = { attrs = { obfuscator = "trivial" }, items = [
      { label = "start" },
      { call = { name = "add", args = [1, "r2", { rand = [0, 15] }, { label_f = 1 }] } },
  ] } },
]
"#;
        let file = TemplateFile::parse(source, 0).unwrap();
        assert_eq!(file.main.items.len(), 1);
        let item = &file.main.items[0];
        assert!(source[item.span()].starts_with("{ sequence"));
        let Item::Sequence(block) = item.get_ref() else {
            panic!("expected a sequence, got {:?}", item.get_ref());
        };
        assert_eq!(block.items.len(), 2);
        let Item::Call(call) = block.items[1].get_ref() else {
            panic!("expected a call");
        };
        assert_eq!(call.name, "add");
        assert!(matches!(call.args[0], ArgSpec::Value(Value::Integer(1))));
        assert!(matches!(&call.args[1], ArgSpec::Value(Value::String(s)) if s == "r2"));
        assert!(matches!(call.args[2], ArgSpec::Reference(ArgRef::Rand([0, 15]))));
        assert!(matches!(call.args[3], ArgSpec::Reference(ArgRef::LabelF(_))));
    }

    #[test]
    fn parses_tables() {
        let source = r#"
[settings]
seed = 11

[data]
target = "M"
types = [{ id = "word", text = ".word", type = { name = "card", args = [32] } }]
strings = [{ id = "asciiz", text = ".asciiz", zero_term = true }]

[distributions]
small = [{ value = 1, bias = 2 }, { value = [2, 3] }]

[situations]
zero = { attrs = { size = 8 } }

[[default_situations]]
names = ["add", "sub"]
situation = "zero"
"#;
        let file = TemplateFile::parse(source, 0).unwrap();
        assert_eq!(file.settings.unwrap().seed, 11);
        let data = file.data.unwrap();
        assert_eq!(data.item_size, DEFAULT_ITEM_SIZE);
        assert_eq!(data.types[0].data_type.args, vec![32]);
        assert_eq!(file.distributions["small"].len(), 2);
        assert!(file.situations["zero"].name.is_none());
        assert_eq!(file.default_situations[0].situation, "zero");
    }

    #[test]
    fn parses_sections() {
        let source = r#"
[main]
items = [
  { section = { name = ".boot", pa = 0x1000, va = 0x1000, args = "ax", items = [
      { call = { name = "nop" } },
  ] } },
  { section_data = { pa = 0x2000, va = 0x80002000 } },
]
"#;
        let file = TemplateFile::parse(source, 0).unwrap();
        let Item::Section(boot) = file.main.items[0].get_ref() else {
            panic!("expected a section");
        };
        assert_eq!((boot.name.as_str(), boot.pa, boot.args.as_deref()), (".boot", 0x1000, Some("ax")));
        assert_eq!(boot.items.len(), 1);
        let Item::SectionData(data) = file.main.items[1].get_ref() else {
            panic!("expected a data section");
        };
        assert_eq!(data.va, 0x8000_2000);
        assert!(data.items.is_empty());

        let err = TemplateFile::parse("[main]\nitems = [ { section_text = { va = 0 } } ]\n", 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn syntax_errors_carry_a_span() {
        let err = TemplateFile::parse("[main]\nitems = [ { sequence = 3 } ]\n", 4).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(matches!(err.location, Some(SourceLocation::Span { file_id: 4, .. })));
    }
}
