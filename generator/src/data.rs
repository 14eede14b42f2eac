//! Data layout: one configuration per template, then any number of
//! reference-counted `data(...)` regions.

use std::collections::BTreeMap;
use std::rc::Rc;

use tsl::Error;
use tsl::block::BlockId;
use tsl::block::attribute::AttributeValue;
use tsl::block::call::Argument;
use tsl::data::{DataConfig, DataDefinition, DataDirective, DataSection, DataType};
use tsl::label::Label;
use tsl::section::MemorySection;
use tsl::settings::RedefinitionPolicy;
use tsl::value::Value;

use crate::page_table::{PageTable, PageTableEntry};
use crate::random::Random;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
    Unconfigured,
    Configuring,
    Configured,
}

/// Flags of an outermost `data(...)` region. Nested regions share the
/// outermost one's section, so their flags are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataRegion {
    pub global: bool,
    pub separate_file: bool,
}

impl DataRegion {
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn separate_file(mut self) -> Self {
        self.separate_file = true;
        self
    }
}

/// `org(address)` or `org({ delta: n })`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Absolute(u64),
    Relative(i64),
}

impl TryFrom<&AttributeValue> for Origin {
    type Error = Error;

    fn try_from(value: &AttributeValue) -> Result<Self, Error> {
        match value {
            AttributeValue::Integer(address) => u64::try_from(*address)
                .map(Origin::Absolute)
                .map_err(|_| Error::range(format!("origin {} is negative", address))),
            AttributeValue::Map(map) if map.len() == 1 => match map.get("delta") {
                Some(AttributeValue::Integer(delta)) => Ok(Origin::Relative(*delta)),
                _ => Err(origin_shape(value)),
            },
            _ => Err(origin_shape(value)),
        }
    }
}

fn origin_shape(value: &AttributeValue) -> Error {
    Error::type_error(format!(
        "origin must be an integer or {{ delta = <integer> }}, found {}",
        value
    ))
}

/// Template-wide data state.
#[derive(Debug)]
pub struct DataManager {
    state: DataState,
    config: Option<DataConfig>,
    policy: RedefinitionPolicy,
    definitions: BTreeMap<String, DataDefinition>,
    depth: usize,
    current: Option<DataSection>,
    sections: Vec<DataSection>,
    opened: usize,
    closed: usize,
}

impl DataManager {
    pub fn new(policy: RedefinitionPolicy) -> Self {
        DataManager {
            state: DataState::Unconfigured,
            config: None,
            policy,
            definitions: BTreeMap::new(),
            depth: 0,
            current: None,
            sections: Vec::new(),
            opened: 0,
            closed: 0,
        }
    }

    pub fn state(&self) -> DataState {
        self.state
    }

    pub fn config(&self) -> Option<&DataConfig> {
        self.config.as_ref()
    }

    /// Start the single configuration of this template.
    pub fn begin_config(&mut self, config: DataConfig) -> Result<DataConfigurer<'_>, Error> {
        if self.state != DataState::Unconfigured {
            return Err(Error::configuration("data is already configured")
                .with_note("`data_config` may be called once per template"));
        }
        log::debug!("configuring data for {} ({} bits per item)", config.target, config.item_size);
        self.state = DataState::Configuring;
        self.config = Some(config);
        Ok(DataConfigurer { manager: self })
    }

    pub fn end_config(&mut self) {
        if self.state == DataState::Configuring {
            self.state = DataState::Configured;
        }
    }

    pub fn definition(&self, id: &str) -> Option<&DataDefinition> {
        self.definitions.get(id)
    }

    fn define(&mut self, definition: DataDefinition) -> Result<(), Error> {
        let id = definition.id().to_string();
        if let Some(previous) = self.definitions.get(&id) {
            match self.policy {
                RedefinitionPolicy::Reject => {
                    return Err(Error::configuration(format!(
                        "'{}' is already defined as a {}",
                        id,
                        previous.kind_name()
                    )));
                }
                RedefinitionPolicy::Shadow => {
                    log::debug!("'{}' shadows an earlier {}", id, previous.kind_name());
                }
            }
        }
        self.definitions.insert(id, definition);
        Ok(())
    }

    /// Enter a `data(...)` region. The section opens on the outermost entry only.
    pub fn enter(&mut self, region: DataRegion) -> Result<(), Error> {
        self.enter_in(region, None)
    }

    /// Like `enter`, placing a newly opened section in `memory`.
    pub fn enter_in(&mut self, region: DataRegion, memory: Option<Rc<MemorySection>>) -> Result<(), Error> {
        let config = match (self.state, &self.config) {
            (DataState::Configured, Some(config)) => config,
            _ => {
                return Err(Error::configuration("`data` used before `data_config`"));
            }
        };
        if self.depth == 0 {
            log::debug!("opening data section for {}", config.target);
            self.current = Some(DataSection {
                target: config.target.clone(),
                global: region.global,
                separate_file: region.separate_file,
                section: memory,
                directives: Vec::new(),
            });
            self.opened += 1;
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave a region. The section closes when the outermost region is left.
    pub fn exit(&mut self) -> Result<(), Error> {
        if self.depth == 0 {
            return Err(Error::configuration("no data region is open"));
        }
        self.depth -= 1;
        if self.depth == 0 {
            if let Some(section) = self.current.take() {
                log::debug!("closing data section with {} directive(s)", section.directives.len());
                self.sections.push(section);
            }
            self.closed += 1;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// How many times a section was opened and closed.
    pub fn open_close_counts(&self) -> (usize, usize) {
        (self.opened, self.closed)
    }

    pub fn sections(&self) -> &[DataSection] {
        &self.sections
    }

    pub fn take_sections(&mut self) -> Vec<DataSection> {
        std::mem::take(&mut self.sections)
    }

    fn item_size(&self) -> u32 {
        self.config.as_ref().map_or(tsl::data::DEFAULT_ITEM_SIZE, |c| c.item_size)
    }

    fn push(&mut self, directive: DataDirective) -> Result<(), Error> {
        match self.current.as_mut() {
            Some(section) => {
                section.directives.push(directive);
                Ok(())
            }
            None => Err(Error::configuration("no data region is open")),
        }
    }
}

/// Declarations made inside `data_config`.
pub struct DataConfigurer<'a> {
    manager: &'a mut DataManager,
}

impl DataConfigurer<'_> {
    /// Declare a type; `emit(id, values)` then writes values of it.
    pub fn define_type(&mut self, id: &str, text: &str, data_type: DataType) -> Result<(), Error> {
        self.manager.define(DataDefinition::Type {
            id: id.to_string(),
            text: text.to_string(),
            data_type,
        })
    }

    /// Declare a space; `emit(id, [length])` then reserves that many items.
    pub fn define_space(&mut self, id: &str, text: &str, fill_with: i64) -> Result<(), Error> {
        self.manager.define(DataDefinition::Space {
            id: id.to_string(),
            text: text.to_string(),
            fill_with,
        })
    }

    /// Declare a string directive; `emit(id, strings)` then writes strings.
    pub fn define_ascii_string(&mut self, id: &str, text: &str, zero_term: bool) -> Result<(), Error> {
        self.manager.define(DataDefinition::AsciiString {
            id: id.to_string(),
            text: text.to_string(),
            zero_term,
        })
    }
}

/// The body of a `data(...)` region.
pub struct DataScope<'a> {
    manager: &'a mut DataManager,
    random: &'a mut Random,
}

impl<'a> DataScope<'a> {
    pub(crate) fn new(manager: &'a mut DataManager, random: &'a mut Random) -> Self {
        DataScope { manager, random }
    }

    /// Emit through a definition declared in `data_config`.
    pub fn emit<I, A>(&mut self, id: &str, values: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        let definition = self
            .manager
            .definition(id)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("no data type, space or string named '{}'", id)))?;

        let mut values_out = Vec::new();
        for argument in values {
            values_out.push(self.draw(argument.into())?);
        }

        let directive = match definition {
            DataDefinition::Type { text, data_type, .. } => DataDirective::Values {
                text,
                data_type,
                values: values_out,
            },
            DataDefinition::Space { text, fill_with, .. } => {
                let length = match values_out.as_slice() {
                    [Value::Integer(n)] if *n >= 0 => *n as u64,
                    _ => {
                        return Err(Error::type_error(format!(
                            "'{}' takes one non-negative length",
                            id
                        )));
                    }
                };
                DataDirective::Space {
                    text,
                    fill_with,
                    length,
                }
            }
            DataDefinition::AsciiString { text, zero_term, .. } => {
                let mut strings = Vec::with_capacity(values_out.len());
                for value in values_out {
                    match value {
                        Value::String(s) => strings.push(s),
                        other => {
                            return Err(Error::type_error(format!(
                                "'{}' takes strings, found {}",
                                id,
                                other.type_name()
                            )));
                        }
                    }
                }
                DataDirective::AsciiStrings {
                    text,
                    zero_term,
                    strings,
                }
            }
        };
        self.manager.push(directive)
    }

    fn draw(&mut self, argument: Argument) -> Result<Value, Error> {
        match argument {
            Argument::Value(value) => Ok(value),
            Argument::Random(distribution) => self.random.sample(&distribution),
            Argument::RandomRange(range) => self
                .random
                .range(*range.start(), *range.end())
                .map(Value::Integer),
            Argument::Label(_) | Argument::Address(_) => {
                Err(Error::type_error("data values must be scalars or random values"))
            }
        }
    }

    pub fn org(&mut self, origin: Origin) -> Result<(), Error> {
        self.manager.push(match origin {
            Origin::Absolute(address) => DataDirective::Origin(address),
            Origin::Relative(delta) => DataDirective::RelativeOrigin(delta),
        })
    }

    /// Align to `value` items; the byte alignment follows from the item size.
    pub fn align(&mut self, value: u64) -> Result<(), Error> {
        let bits = value
            .checked_mul(u64::from(self.manager.item_size()))
            .ok_or_else(|| Error::range(format!("alignment of {} items is out of range", value)))?;
        let bytes = bits.div_ceil(8);
        self.manager.push(DataDirective::Align { value, bytes })
    }

    pub fn label(&mut self, name: &str) -> Result<(), Error> {
        self.manager
            .push(DataDirective::Label(Label::named(name, BlockId::root())))
    }

    pub fn global_label(&mut self, name: &str) -> Result<(), Error> {
        self.manager
            .push(DataDirective::Label(Label::named(name, BlockId::root()).global()))
    }

    pub fn text(&mut self, text: &str) -> Result<(), Error> {
        self.manager.push(DataDirective::Text(text.to_string()))
    }

    pub fn comment(&mut self, text: &str) -> Result<(), Error> {
        self.manager.push(DataDirective::Comment(text.to_string()))
    }

    /// A nested region. It writes into the section of the outermost one.
    pub fn data<F>(&mut self, region: DataRegion, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut DataScope<'_>) -> Result<(), Error>,
    {
        self.manager.enter(region)?;
        let result = body(self);
        self.manager.exit()?;
        result
    }

    /// Emit one page-table entry through the table's preparator or adaptor.
    pub fn page_table_entry(&mut self, table: &PageTable, entry: impl Into<PageTableEntry>) -> Result<(), Error> {
        table.emit(self, &entry.into())
    }
}
