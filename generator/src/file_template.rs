//! Templates written as TOML files.

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use tsl::block::BlockKind;
use tsl::block::attribute::{AttributeValue, Attributes};
use tsl::block::call::{Argument, InstructionCall};
use tsl::data::{DataConfig, DataType};
use tsl::file::{
    ArgRef, ArgSpec, DataItem, DataRegionSpec, Item, PhaseSpec, RangeSpec, ReferenceSpec, Spanned,
    TemplateFile,
};
use tsl::label::AddressReference;
use tsl::section::MemorySection;
use tsl::settings::Settings;
use tsl::situation::{Situation, SituationAttribute};
use tsl::value::{Distribution, RangeValue, ValueRange};
use tsl::{Error, SourceLocation};

use crate::context::{BlockConfig, Context};
use crate::data::{DataRegion, DataScope, Origin};
use crate::situations::Names;
use crate::template::Template;

/// Interprets a `TemplateFile` through the same calls a Rust template makes.
#[derive(Debug)]
pub struct FileTemplate {
    file: TemplateFile,
    file_id: usize,
    distributions: BTreeMap<String, Rc<Distribution>>,
    situations: BTreeMap<String, Situation>,
}

impl FileTemplate {
    pub fn new(file: TemplateFile, file_id: usize) -> Self {
        FileTemplate {
            file,
            file_id,
            distributions: BTreeMap::new(),
            situations: BTreeMap::new(),
        }
    }

    pub fn parse(source: &str, file_id: usize) -> Result<Self, Error> {
        TemplateFile::parse(source, file_id).map(|file| Self::new(file, file_id))
    }

    pub fn load(path: &Path, file_id: usize) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("cannot read '{}': {}", path.display(), e)))?;
        Self::parse(&source, file_id)
    }

    /// The file's `[settings]`, or defaults.
    pub fn settings(&self) -> Settings {
        self.file.settings.clone().unwrap_or_default()
    }

    fn location(&self, span: std::ops::Range<usize>) -> SourceLocation {
        SourceLocation::span(self.file_id, span)
    }

    fn prepare(&mut self, ctx: &mut Context) -> Result<(), Error> {
        let names: Vec<String> = self.file.distributions.keys().cloned().collect();
        for name in names {
            self.build_distribution(&name, &mut Vec::new())?;
        }

        for (key, spec) in &self.file.situations {
            let attributes = spec.attrs.as_map().ok_or_else(|| {
                Error::type_error(format!(
                    "attributes of situation '{}' must be a table, found {}",
                    key,
                    spec.attrs.type_name()
                ))
            })?;
            let mut resolved = BTreeMap::new();
            for (name, value) in attributes {
                resolved.insert(name.clone(), self.situation_attribute(name, value)?);
            }
            let situation = Situation {
                name: spec.name.clone().unwrap_or_else(|| key.clone()),
                attributes: resolved,
                test_data_provider: spec.testdata,
            };
            self.situations.insert(key.clone(), situation);
        }

        if let Some(spec) = &self.file.data {
            let config = DataConfig::new(spec.target.clone()).item_size(spec.item_size);
            ctx.data_config(config, |configurer| {
                for t in &spec.types {
                    let data_type = DataType::new(t.data_type.name.clone(), t.data_type.args.iter().copied());
                    configurer.define_type(&t.id, &t.text, data_type)?;
                }
                for s in &spec.spaces {
                    configurer.define_space(&s.id, &s.text, s.fill_with)?;
                }
                for s in &spec.strings {
                    configurer.define_ascii_string(&s.id, &s.text, s.zero_term)?;
                }
                Ok(())
            })?;
        }

        for binding in &self.file.default_situations {
            let names = match &binding.names {
                AttributeValue::String(name) => Names::One(name.clone()),
                AttributeValue::List(list) => Names::Many(
                    list.iter()
                        .map(|n| n.as_str().map(str::to_string).ok_or_else(|| names_shape(n)))
                        .collect::<Result<_, _>>()?,
                ),
                other => return Err(names_shape(other)),
            };
            let situation = self.situation(&binding.situation)?;
            ctx.set_default_situation(names, situation);
        }
        Ok(())
    }

    fn build_distribution(&mut self, name: &str, visiting: &mut Vec<String>) -> Result<Rc<Distribution>, Error> {
        if let Some(done) = self.distributions.get(name) {
            return Ok(done.clone());
        }
        if visiting.iter().any(|v| v == name) {
            return Err(Error::configuration(format!(
                "distribution '{}' refers to itself",
                name
            )));
        }
        let specs: Vec<RangeSpec> = self
            .file
            .distributions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::resolution(format!("no distribution named '{}'", name)))?;

        visiting.push(name.to_string());
        let mut ranges = Vec::with_capacity(specs.len());
        for spec in &specs {
            let value = match &spec.value {
                AttributeValue::List(items) => RangeValue::Collection(
                    items
                        .iter()
                        .map(|item| item.to_scalar("collection member"))
                        .collect::<Result<_, _>>()?,
                ),
                AttributeValue::Map(map) => match map.get("dist").and_then(AttributeValue::as_str) {
                    Some(nested) if map.len() == 1 => {
                        RangeValue::Distribution(self.build_distribution(nested, visiting)?)
                    }
                    _ => {
                        return Err(Error::type_error(format!(
                            "range value of '{}' must be a scalar, a list or {{ dist = \"name\" }}",
                            name
                        )));
                    }
                },
                scalar => RangeValue::Scalar(scalar.to_scalar("range value")?),
            };
            ranges.push(match spec.bias {
                Some(bias) => ValueRange::biased(value, bias)?,
                None => ValueRange::new(value),
            });
        }
        visiting.pop();

        let distribution = Rc::new(
            Distribution::build(&ranges).map_err(|e| e.with_note(format!("in distribution '{}'", name)))?,
        );
        self.distributions.insert(name.to_string(), distribution.clone());
        Ok(distribution)
    }

    fn distribution(&self, name: &str) -> Result<Rc<Distribution>, Error> {
        self.distributions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::resolution(format!("no distribution named '{}'", name)))
    }

    fn situation(&self, name: &str) -> Result<Situation, Error> {
        self.situations
            .get(name)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("unknown situation '{}'", name)))
    }

    fn situation_attribute(&self, name: &str, value: &AttributeValue) -> Result<SituationAttribute, Error> {
        match value {
            AttributeValue::Map(map) => match (map.len(), map.get("dist").and_then(AttributeValue::as_str)) {
                (1, Some(dist)) => Ok(SituationAttribute::Distribution(self.distribution(dist)?)),
                _ => Err(Error::type_error(format!(
                    "situation attribute '{}' must be a scalar or {{ dist = \"name\" }}",
                    name
                ))),
            },
            scalar => scalar.to_scalar("situation attribute").map(SituationAttribute::Value),
        }
    }

    fn run_phase(&self, ctx: &mut Context, phase: &PhaseSpec) -> Result<(), Error> {
        self.run_items(ctx, &phase.items)
    }

    fn run_items(&self, ctx: &mut Context, items: &[Spanned<Item>]) -> Result<(), Error> {
        for item in items {
            let location = self.location(item.span());
            self.run_item(ctx, item.get_ref(), &location)
                .map_err(|e| e.at(location))?;
        }
        Ok(())
    }

    fn run_item(&self, ctx: &mut Context, item: &Item, location: &SourceLocation) -> Result<(), Error> {
        match item {
            Item::Sequence(spec) | Item::Atomic(spec) | Item::Iterate(spec) | Item::Block(spec) => {
                let kind = match item {
                    Item::Sequence(_) => BlockKind::Sequence,
                    Item::Atomic(_) => BlockKind::Atomic,
                    Item::Iterate(_) => BlockKind::Iterate,
                    _ => BlockKind::Free,
                };
                let config = BlockConfig::from_attributes(table(&spec.attrs, "block attributes")?)?;
                ctx.scoped_block(kind, config, location.clone(), |ctx| {
                    self.run_items(ctx, &spec.items)
                })
            }
            Item::Call(spec) => {
                let mut call = InstructionCall::new(spec.name.clone()).located(location.clone());
                for arg in &spec.args {
                    call.arguments.push(self.argument(ctx, arg)?);
                }
                call.attributes = table(&spec.attrs, "call attributes")?.clone();
                if let Some(name) = &spec.situation {
                    call.situation = Some(self.situation(name)?);
                }
                ctx.add_call(call)
            }
            Item::Label(name) => ctx.label(name),
            Item::GlobalLabel(name) => ctx.global_label(name),
            Item::Weak(name) => ctx.weak(name),
            Item::NumericLabel(index) => ctx.numeric_label(label_index(index)?),
            Item::Text(text) => ctx.text(text),
            Item::Comment(text) => ctx.comment(text),
            Item::Executed(scope) => ctx.executed(|ctx| self.run_items(ctx, &scope.items)),
            Item::Nonexecuted(scope) => ctx.nonexecuted(|ctx| self.run_items(ctx, &scope.items)),
            Item::Branches(scope) => ctx.branches(|ctx| self.run_items(ctx, &scope.items)),
            Item::Attributes(spec) => {
                let attributes = table(&spec.attrs, "attributes")?.clone();
                ctx.set_attributes(attributes, |ctx| self.run_items(ctx, &spec.items))
            }
            Item::Data(region) => ctx.data(data_region(region), |scope| self.run_data(scope, &region.items)),
            Item::Section(spec) => {
                let section = with_args(MemorySection::named(spec.name.clone(), spec.pa, spec.va), spec.args.as_deref());
                ctx.section_at(section, location.clone(), |ctx| self.run_items(ctx, &spec.items))
            }
            Item::SectionText(spec) | Item::SectionData(spec) => {
                let section = match item {
                    Item::SectionText(_) => MemorySection::text(spec.pa, spec.va),
                    _ => MemorySection::data(spec.pa, spec.va),
                };
                let section = with_args(section, spec.args.as_deref());
                ctx.section_at(section, location.clone(), |ctx| self.run_items(ctx, &spec.items))
            }
        }
    }

    fn argument(&self, ctx: &mut Context, spec: &ArgSpec) -> Result<Argument, Error> {
        let reference = match spec {
            ArgSpec::Value(value) => return Ok(Argument::Value(value.clone())),
            ArgSpec::Reference(reference) => reference,
        };
        Ok(match reference {
            ArgRef::Rand([from, to]) => ctx.rand(*from, *to)?,
            ArgRef::Dist(name) => Argument::Random(self.distribution(name)?),
            ArgRef::Label(name) => ctx.label_ref(name).into(),
            ArgRef::LabelF(index) => ctx.label_f(label_index(index)?)?.into(),
            ArgRef::LabelB(index) => ctx.label_b(label_index(index)?)?.into(),
            ArgRef::Address(spec) => narrow(ctx.address_reference(spec.level), spec)?.into(),
            ArgRef::Entry(spec) => narrow(ctx.entry_reference(spec.level), spec)?.into(),
        })
    }

    fn data_value(&self, spec: &ArgSpec) -> Result<Argument, Error> {
        match spec {
            ArgSpec::Value(value) => Ok(Argument::Value(value.clone())),
            ArgSpec::Reference(ArgRef::Rand([from, to])) => {
                if from > to {
                    return Err(Error::range(format!("empty random range [{}, {}]", from, to)));
                }
                Ok(Argument::RandomRange(*from..=*to))
            }
            ArgSpec::Reference(ArgRef::Dist(name)) => Ok(Argument::Random(self.distribution(name)?)),
            ArgSpec::Reference(_) => Err(Error::type_error("data values must be scalars or random values")),
        }
    }

    fn run_data(&self, scope: &mut DataScope<'_>, items: &[Spanned<DataItem>]) -> Result<(), Error> {
        for item in items {
            let location = self.location(item.span());
            self.run_data_item(scope, item.get_ref())
                .map_err(|e| e.at(location))?;
        }
        Ok(())
    }

    fn run_data_item(&self, scope: &mut DataScope<'_>, item: &DataItem) -> Result<(), Error> {
        match item {
            DataItem::Org(origin) => scope.org(Origin::try_from(origin)?),
            DataItem::Align(value) => scope.align(*value),
            DataItem::Label(name) => scope.label(name),
            DataItem::GlobalLabel(name) => scope.global_label(name),
            DataItem::Text(text) => scope.text(text),
            DataItem::Comment(text) => scope.comment(text),
            DataItem::Emit(spec) => {
                let values = spec
                    .values
                    .iter()
                    .map(|v| self.data_value(v))
                    .collect::<Result<Vec<_>, _>>()?;
                scope.emit(&spec.name, values)
            }
            DataItem::Data(region) => scope.data(data_region(region), |scope| self.run_data(scope, &region.items)),
        }
    }
}

impl Template for FileTemplate {
    fn pre(&mut self, ctx: &mut Context) -> Result<(), Error> {
        self.prepare(ctx)?;
        self.run_phase(ctx, &self.file.pre)
    }

    fn run(&mut self, ctx: &mut Context) -> Result<(), Error> {
        self.run_phase(ctx, &self.file.main)
    }

    fn post(&mut self, ctx: &mut Context) -> Result<(), Error> {
        self.run_phase(ctx, &self.file.post)
    }
}

fn table<'a>(value: &'a AttributeValue, what: &str) -> Result<&'a Attributes, Error> {
    value
        .as_map()
        .ok_or_else(|| Error::type_error(format!("{} must be a table, found {}", what, value.type_name())))
}

fn label_index(value: &AttributeValue) -> Result<i64, Error> {
    value.as_integer().ok_or_else(|| {
        Error::type_error(format!("label index must be an integer, found {}", value.type_name()))
    })
}

fn names_shape(value: &AttributeValue) -> Error {
    Error::type_error(format!(
        "default situation names must be a string or a list of strings, found {}",
        value.type_name()
    ))
}

fn narrow(mut reference: AddressReference, spec: &ReferenceSpec) -> Result<AddressReference, Error> {
    for [min, max] in &spec.bits {
        reference = reference.bits(*min, *max)?;
    }
    Ok(reference)
}

fn with_args(section: MemorySection, args: Option<&str>) -> MemorySection {
    match args {
        Some(args) => section.args(args),
        None => section,
    }
}

fn data_region(spec: &DataRegionSpec) -> DataRegion {
    DataRegion {
        global: spec.global,
        separate_file: spec.separate_file,
    }
}
