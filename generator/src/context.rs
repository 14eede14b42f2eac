//! The author-facing side of the generator.
//!
//! A `Context` belongs to one template instance. Every declarative call a
//! template makes goes through it: blocks are built on a stack (the engine
//! always appends to the innermost open block), attribute scopes are pushed
//! and popped by guards, and data, situations and strategies are looked up
//! in the instance's own tables.

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use tsl::block::attribute::{AttributeValue, Attributes};
use tsl::block::call::{Argument, InstructionCall, Output};
use tsl::block::{Block, BlockId, BlockKind, Element, StrategySet};
use tsl::data::DataConfig;
use tsl::label::{AddressReference, Label, LabelRef, NumericSlot};
use tsl::section::MemorySection;
use tsl::settings::Settings;
use tsl::situation::{Situation, SituationAttribute};
use tsl::value::{Distribution, RangeValue, Value, ValueRange};
use tsl::{Error, SourceLocation};

use crate::data::{DataConfigurer, DataManager, DataRegion, DataScope};
use crate::expand::Expander;
use crate::random::Random;
use crate::resolve::finalize;
use crate::situations::{Names, SituationManager};
use crate::strategy::StrategyRegistry;
use crate::template::{Lifecycle, Phase, PhaseKind};

const STRATEGY_OPTIONS: [&str; 5] = ["combinator", "permutator", "compositor", "rearranger", "obfuscator"];

/// Options of a block-opening call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockConfig {
    pub strategies: StrategySet,
    pub attributes: Attributes,
}

impl BlockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn combinator(mut self, name: &str) -> Self {
        self.strategies.combinator = Some(name.to_string());
        self
    }

    pub fn permutator(mut self, name: &str) -> Self {
        self.strategies.permutator = Some(name.to_string());
        self
    }

    pub fn compositor(mut self, name: &str) -> Self {
        self.strategies.compositor = Some(name.to_string());
        self
    }

    pub fn rearranger(mut self, name: &str) -> Self {
        self.strategies.rearranger = Some(name.to_string());
        self
    }

    pub fn obfuscator(mut self, name: &str) -> Self {
        self.strategies.obfuscator = Some(name.to_string());
        self
    }

    pub fn attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Split a mapping into strategy options and extra attributes.
    pub fn from_attributes(attributes: &Attributes) -> Result<Self, Error> {
        let mut config = BlockConfig::new();
        for (key, value) in attributes {
            if !STRATEGY_OPTIONS.contains(&key.as_str()) {
                config.attributes.insert(key.clone(), value.clone());
                continue;
            }
            let name = value.as_str().ok_or_else(|| {
                Error::type_error(format!(
                    "`{}` must name a strategy, found {}",
                    key,
                    value.type_name()
                ))
            })?;
            let slot = match key.as_str() {
                "combinator" => &mut config.strategies.combinator,
                "permutator" => &mut config.strategies.permutator,
                "compositor" => &mut config.strategies.compositor,
                "rearranger" => &mut config.strategies.rearranger,
                _ => &mut config.strategies.obfuscator,
            };
            *slot = Some(name.to_string());
        }
        Ok(config)
    }
}

/// Identifies an open block. Blocks close in reverse order of opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHandle {
    id: BlockId,
    depth: usize,
}

impl BlockHandle {
    pub fn id(&self) -> &BlockId {
        &self.id
    }
}

#[derive(Debug)]
struct BlockBuilder {
    id: BlockId,
    kind: BlockKind,
    config: BlockConfig,
    location: Option<SourceLocation>,
    children: Vec<Element>,
    /// Labels waiting for the next call.
    labels: Vec<Label>,
    outputs: Vec<Output>,
}

impl BlockBuilder {
    fn flush_pending(&mut self, section: Option<Rc<MemorySection>>) {
        if self.labels.is_empty() && self.outputs.is_empty() {
            return;
        }
        let mut placeholder = InstructionCall::placeholder();
        placeholder.section = section;
        placeholder.labels = std::mem::take(&mut self.labels);
        placeholder.outputs = std::mem::take(&mut self.outputs);
        placeholder.location = self.location.clone();
        self.children.push(Element::Call(placeholder));
    }
}

pub struct Context {
    settings: Settings,
    random: Random,
    strategies: StrategyRegistry,
    situations: SituationManager,
    data: DataManager,
    blocks: Vec<BlockBuilder>,
    attributes: Vec<Attributes>,
    sections: Vec<Rc<MemorySection>>,
    sealed: Option<Block>,
    lifecycle: Lifecycle,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        Context {
            random: Random::new(settings.seed),
            strategies: StrategyRegistry::with_builtins(),
            situations: SituationManager::new(),
            data: DataManager::new(settings.redefinition),
            blocks: Vec::new(),
            attributes: Vec::new(),
            sections: Vec::new(),
            sealed: None,
            lifecycle: Lifecycle::Created,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn random(&mut self) -> &mut Random {
        &mut self.random
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// Register template-specific strategies.
    pub fn strategies_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.strategies
    }

    pub fn situations(&self) -> &SituationManager {
        &self.situations
    }

    pub fn data_manager(&self) -> &DataManager {
        &self.data
    }

    pub(crate) fn data_manager_mut(&mut self) -> &mut DataManager {
        &mut self.data
    }

    // Blocks

    #[track_caller]
    pub fn open_block(&mut self, kind: BlockKind, config: BlockConfig) -> Result<BlockHandle, Error> {
        self.open_block_at(kind, config, Some(SourceLocation::caller()))
    }

    fn open_block_at(
        &mut self,
        kind: BlockKind,
        config: BlockConfig,
        location: Option<SourceLocation>,
    ) -> Result<BlockHandle, Error> {
        let (id, labels, outputs) = match self.blocks.last_mut() {
            Some(parent) => (
                parent.id.child(parent.children.len() as u32),
                std::mem::take(&mut parent.labels),
                std::mem::take(&mut parent.outputs),
            ),
            None if self.lifecycle.is_running() => (BlockId::root(), Vec::new(), Vec::new()),
            None => {
                return Err(Error::configuration(format!(
                    "`{}` used outside of a template phase",
                    kind.name()
                ))
                .at_opt(location.as_ref()));
            }
        };
        let handle = BlockHandle {
            id: id.clone(),
            depth: self.blocks.len(),
        };
        self.blocks.push(BlockBuilder {
            id,
            kind,
            config,
            location,
            children: Vec::new(),
            labels,
            outputs,
        });
        Ok(handle)
    }

    /// Seal the innermost block and attach it to its parent.
    pub fn close_block(&mut self, handle: BlockHandle) -> Result<&Block, Error> {
        match self.blocks.last() {
            Some(top) if top.id == handle.id && self.blocks.len() == handle.depth + 1 => {}
            Some(top) => {
                return Err(Error::configuration(format!(
                    "block {} closed while {} is still open",
                    handle.id, top.id
                )));
            }
            None => return Err(Error::configuration(format!("block {} is not open", handle.id))),
        }
        let Some(mut builder) = self.blocks.pop() else {
            return Err(Error::configuration(format!("block {} is not open", handle.id)));
        };
        builder.flush_pending(self.sections.last().cloned());

        let location = builder.location.clone();
        builder
            .config
            .strategies
            .validate(builder.kind)
            .and_then(|_| self.strategies.check(&builder.config.strategies))
            .map_err(|e| e.at_opt(location.as_ref()))?;

        let block = Block {
            id: builder.id,
            kind: builder.kind,
            children: builder.children,
            strategies: builder.config.strategies,
            attributes: builder.config.attributes,
            location,
        };
        log::debug!(
            "sealed {} block {} with {} children",
            block.kind.name(),
            block.id,
            block.children.len()
        );

        match self.blocks.last_mut() {
            Some(parent) => {
                parent.children.push(Element::Block(block));
                match parent.children.last() {
                    Some(Element::Block(block)) => Ok(block),
                    _ => Err(Error::configuration("sealed block was not attached")),
                }
            }
            None => Ok(self.sealed.insert(block)),
        }
    }

    /// Open a block, run `body` inside it and close it. The block is
    /// discarded if `body` fails.
    pub fn scoped_block<F>(
        &mut self,
        kind: BlockKind,
        config: BlockConfig,
        location: SourceLocation,
        body: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        let handle = self.open_block_at(kind, config, Some(location.clone()))?;
        let mut scope = BlockScope {
            depth: handle.depth,
            ctx: self,
        };
        body(&mut *scope).map_err(|e| e.at(location))?;
        scope.ctx.close_block(handle)?;
        Ok(())
    }

    #[track_caller]
    pub fn sequence<F>(&mut self, config: BlockConfig, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.scoped_block(BlockKind::Sequence, config, SourceLocation::caller(), body)
    }

    #[track_caller]
    pub fn atomic<F>(&mut self, config: BlockConfig, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.scoped_block(BlockKind::Atomic, config, SourceLocation::caller(), body)
    }

    #[track_caller]
    pub fn iterate<F>(&mut self, config: BlockConfig, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.scoped_block(BlockKind::Iterate, config, SourceLocation::caller(), body)
    }

    /// A freely composed block.
    #[track_caller]
    pub fn block<F>(&mut self, config: BlockConfig, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.scoped_block(BlockKind::Free, config, SourceLocation::caller(), body)
    }

    /// Number of blocks currently open, including the phase block.
    pub fn block_depth(&self) -> usize {
        self.blocks.len()
    }

    fn current(&mut self, what: &str) -> Result<&mut BlockBuilder, Error> {
        self.blocks
            .last_mut()
            .ok_or_else(|| Error::configuration(format!("`{}` used outside of a block", what)))
    }

    /// Scope of labels and references made now.
    pub fn scope(&self) -> BlockId {
        self.blocks.last().map(|b| b.id.clone()).unwrap_or_default()
    }

    // Calls

    #[track_caller]
    pub fn instruction<I, A>(&mut self, name: &str, arguments: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        let call = InstructionCall::new(name)
            .args(arguments)
            .located(SourceLocation::caller());
        self.add_call(call)
    }

    /// Append a call to the innermost block. Pending labels and outputs,
    /// active attribute scopes and the default situation are applied here.
    #[track_caller]
    pub fn add_call(&mut self, mut call: InstructionCall) -> Result<(), Error> {
        if call.location.is_none() {
            call.location = Some(SourceLocation::caller());
        }
        let mut attributes = Attributes::new();
        for scope in &self.attributes {
            merge_attributes(&mut attributes, scope);
        }
        merge_attributes(&mut attributes, &call.attributes);
        call.attributes = attributes;
        if call.situation.is_none() {
            call.situation = self.situations.default_for(&call.name).cloned();
        }
        if call.section.is_none() {
            call.section = self.sections.last().cloned();
        }

        let location = call.location.clone();
        let builder = self
            .current("instruction")
            .map_err(|e| e.at_opt(location.as_ref()))?;
        let mut labels = std::mem::take(&mut builder.labels);
        labels.append(&mut call.labels);
        call.labels = labels;
        let mut outputs = std::mem::take(&mut builder.outputs);
        outputs.append(&mut call.outputs);
        call.outputs = outputs;
        builder.children.push(Element::Call(call));
        Ok(())
    }

    // Labels

    fn declare(&mut self, label: Label, what: &str) -> Result<(), Error> {
        self.current(what)?.labels.push(label);
        Ok(())
    }

    #[track_caller]
    pub fn label(&mut self, name: &str) -> Result<(), Error> {
        let location = SourceLocation::caller();
        let label = Label::named(name, self.scope());
        self.declare(label, "label").map_err(|e| e.at(location))
    }

    #[track_caller]
    pub fn global_label(&mut self, name: &str) -> Result<(), Error> {
        let location = SourceLocation::caller();
        let label = Label::named(name, self.scope()).global();
        self.declare(label, "global_label").map_err(|e| e.at(location))
    }

    /// A label that gives way to any other declaration of the same name.
    #[track_caller]
    pub fn weak(&mut self, name: &str) -> Result<(), Error> {
        let location = SourceLocation::caller();
        let label = Label::named(name, self.scope()).weak();
        self.declare(label, "weak").map_err(|e| e.at(location))
    }

    #[track_caller]
    pub fn numeric_label(&mut self, index: i64) -> Result<(), Error> {
        let location = SourceLocation::caller();
        NumericSlot::try_from(index)
            .and_then(|slot| {
                let label = Label::numeric(slot, self.scope());
                self.declare(label, "label")
            })
            .map_err(|e| e.at(location))
    }

    /// Reference to the next numeric label `index`.
    #[track_caller]
    pub fn label_f(&mut self, index: i64) -> Result<LabelRef, Error> {
        self.numeric_ref(index, true, SourceLocation::caller())
    }

    /// Reference to the previous numeric label `index`.
    #[track_caller]
    pub fn label_b(&mut self, index: i64) -> Result<LabelRef, Error> {
        self.numeric_ref(index, false, SourceLocation::caller())
    }

    fn numeric_ref(&self, index: i64, forward: bool, location: SourceLocation) -> Result<LabelRef, Error> {
        let slot = NumericSlot::try_from(index).map_err(|e| e.at(location))?;
        Ok(LabelRef::Numeric {
            slot,
            forward,
            scope: self.scope(),
        })
    }

    pub fn label_ref(&self, name: &str) -> LabelRef {
        LabelRef::Named {
            name: name.to_string(),
            scope: self.scope(),
        }
    }

    pub fn address_reference(&self, level: u32) -> AddressReference {
        AddressReference::address(level)
    }

    pub fn entry_reference(&self, level: u32) -> AddressReference {
        AddressReference::entry(level)
    }

    // Outputs

    #[track_caller]
    pub fn text(&mut self, text: &str) -> Result<(), Error> {
        let location = SourceLocation::caller();
        self.current("text")
            .map(|b| b.outputs.push(Output::Text(text.to_string())))
            .map_err(|e| e.at(location))
    }

    #[track_caller]
    pub fn comment(&mut self, text: &str) -> Result<(), Error> {
        let location = SourceLocation::caller();
        self.current("comment")
            .map(|b| b.outputs.push(Output::Comment(text.to_string())))
            .map_err(|e| e.at(location))
    }

    // Attribute scopes

    /// Push an attribute scope. It is popped when the guard is dropped.
    pub fn attribute_scope(&mut self, attributes: Attributes) -> AttributeScope<'_> {
        let depth = self.attributes.len();
        self.attributes.push(attributes);
        AttributeScope { ctx: self, depth }
    }

    pub fn set_attributes<F>(&mut self, attributes: Attributes, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        let mut scope = self.attribute_scope(attributes);
        body(&mut *scope)
    }

    pub fn executed<F>(&mut self, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.set_attributes(single("executed", true), body)
    }

    pub fn nonexecuted<F>(&mut self, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.set_attributes(single("executed", false), body)
    }

    pub fn branches<F>(&mut self, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.set_attributes(single("branches", true), body)
    }

    pub fn attribute_depth(&self) -> usize {
        self.attributes.len()
    }

    // Memory sections

    /// Place the calls and data regions made by `body` in `section`.
    /// Sections do not nest.
    #[track_caller]
    pub fn section<F>(&mut self, section: MemorySection, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.section_at(section, SourceLocation::caller(), body)
    }

    #[track_caller]
    pub fn section_text<F>(&mut self, pa: u64, va: u64, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.section_at(MemorySection::text(pa, va), SourceLocation::caller(), body)
    }

    #[track_caller]
    pub fn section_data<F>(&mut self, pa: u64, va: u64, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        self.section_at(MemorySection::data(pa, va), SourceLocation::caller(), body)
    }

    pub fn section_at<F>(&mut self, section: MemorySection, location: SourceLocation, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        if section.name().is_empty() {
            return Err(Error::configuration("a section needs a name").at(location));
        }
        if let Some(open) = self.sections.last() {
            return Err(Error::configuration(format!(
                "section {} opened inside section {}",
                section.name(),
                open.name()
            ))
            .at(location));
        }
        log::debug!("entering section {}", section);
        let depth = self.sections.len();
        self.sections.push(Rc::new(section));
        let mut scope = SectionScope { ctx: self, depth };
        body(&mut *scope).map_err(|e| e.at(location))
    }

    pub fn current_section(&self) -> Option<&MemorySection> {
        self.sections.last().map(|s| &**s)
    }

    // Situations

    pub fn situation<I, K, V>(&self, name: &str, attributes: I) -> Situation
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SituationAttribute>,
    {
        Situation::new(name, attributes, false)
    }

    /// A situation that also provides test data.
    pub fn testdata<I, K, V>(&self, name: &str, attributes: I) -> Situation
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SituationAttribute>,
    {
        Situation::new(name, attributes, true)
    }

    pub fn set_default_situation(&mut self, names: impl Into<Names>, situation: Situation) {
        self.situations.bind(names.into(), situation);
    }

    // Random values

    /// An integer argument drawn from `[from, to]` when the sequence is generated.
    #[track_caller]
    pub fn rand(&self, from: i64, to: i64) -> Result<Argument, Error> {
        if from > to {
            return Err(Error::range(format!("empty random range [{}, {}]", from, to))
                .at(SourceLocation::caller()));
        }
        Ok(Argument::RandomRange(from..=to))
    }

    #[track_caller]
    pub fn range(&self, value: impl Into<RangeValue>, bias: Option<i64>) -> Result<ValueRange, Error> {
        match bias {
            Some(bias) => ValueRange::biased(value, bias).map_err(|e| e.at(SourceLocation::caller())),
            None => Ok(ValueRange::new(value)),
        }
    }

    #[track_caller]
    pub fn dist<I>(&self, ranges: I) -> Result<Rc<Distribution>, Error>
    where
        I: IntoIterator<Item = ValueRange>,
    {
        let ranges: Vec<ValueRange> = ranges.into_iter().collect();
        Distribution::build(&ranges)
            .map(Rc::new)
            .map_err(|e| e.at(SourceLocation::caller()))
    }

    /// Draw a value now rather than at generation time.
    pub fn next_value(&mut self, distribution: &Distribution) -> Result<Value, Error> {
        self.random.sample(distribution)
    }

    // Data

    #[track_caller]
    pub fn data_config<F>(&mut self, config: DataConfig, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut DataConfigurer<'_>) -> Result<(), Error>,
    {
        let location = SourceLocation::caller();
        let result = {
            let mut configurer = self.data.begin_config(config).map_err(|e| e.at(location.clone()))?;
            body(&mut configurer)
        };
        self.data.end_config();
        result.map_err(|e| e.at(location))
    }

    #[track_caller]
    pub fn data<F>(&mut self, region: DataRegion, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut DataScope<'_>) -> Result<(), Error>,
    {
        let location = SourceLocation::caller();
        let section = self.sections.last().cloned();
        self.data
            .enter_in(region, section)
            .map_err(|e| e.at(location.clone()))?;
        let result = {
            let mut scope = DataScope::new(&mut self.data, &mut self.random);
            body(&mut scope)
        };
        self.data.exit()?;
        result.map_err(|e| e.at(location))
    }

    // Options and revisions

    pub fn option_value(&self, name: &str) -> Option<&AttributeValue> {
        self.settings.options.get(name)
    }

    pub fn set_option_value(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.settings.options.insert(name.to_string(), value.into());
    }

    pub fn rev_id(&self) -> Option<&str> {
        self.settings.revision.as_deref()
    }

    pub fn is_rev(&self, id: &str) -> bool {
        self.settings.is_rev(id)
    }

    // Phases

    pub(crate) fn begin_phase(&mut self, kind: PhaseKind) -> Result<(), Error> {
        self.lifecycle = self.lifecycle.enter(kind)?;
        self.open_block_at(BlockKind::Sequence, BlockConfig::new(), None)?;
        Ok(())
    }

    /// Close the phase block and expand it. A failed body discards the phase.
    pub(crate) fn end_phase(&mut self, kind: PhaseKind, result: Result<(), Error>) -> Result<Phase, Error> {
        if let Err(error) = result {
            self.blocks.clear();
            self.attributes.clear();
            return Err(error);
        }
        if self.blocks.len() != 1 {
            let open = self.blocks.len().saturating_sub(1);
            self.blocks.clear();
            return Err(Error::configuration(format!(
                "{} block(s) left open at the end of the {} phase",
                open,
                kind.name()
            )));
        }
        let root = BlockHandle {
            id: BlockId::root(),
            depth: 0,
        };
        self.close_block(root)?;
        let Some(block) = self.sealed.take() else {
            return Err(Error::configuration(format!("{} phase produced no block", kind.name())));
        };

        let streams = Expander::new(&self.strategies, &mut self.random).expand(&block)?;
        let mut sequences = Vec::with_capacity(streams.len());
        for stream in streams {
            sequences.push(finalize(stream, &mut self.random)?);
        }
        log::info!(
            "{} phase generated {} sequence(s)",
            kind.name(),
            sequences.len()
        );
        Ok(Phase {
            kind,
            block,
            sequences,
        })
    }

    pub(crate) fn finish(&mut self) -> Result<(), Error> {
        self.lifecycle = self.lifecycle.finish()?;
        Ok(())
    }
}

/// An open attribute scope. Dereferences to the context it was opened on.
pub struct AttributeScope<'a> {
    ctx: &'a mut Context,
    depth: usize,
}

impl Deref for AttributeScope<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for AttributeScope<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for AttributeScope<'_> {
    fn drop(&mut self) {
        self.ctx.attributes.truncate(self.depth);
    }
}

/// Leaves a memory section, including on unwind.
struct SectionScope<'a> {
    ctx: &'a mut Context,
    depth: usize,
}

impl Deref for SectionScope<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for SectionScope<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for SectionScope<'_> {
    fn drop(&mut self) {
        self.ctx.sections.truncate(self.depth);
    }
}

/// Discards a block that was not closed, including on unwind.
struct BlockScope<'a> {
    ctx: &'a mut Context,
    depth: usize,
}

impl Deref for BlockScope<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for BlockScope<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for BlockScope<'_> {
    fn drop(&mut self) {
        if self.depth < self.ctx.blocks.len() {
            self.ctx.blocks.truncate(self.depth);
        }
    }
}

fn single(name: &str, value: bool) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(name.to_string(), AttributeValue::Boolean(value));
    attributes
}

/// Inner scopes win; nested maps are merged key by key.
fn merge_attributes(into: &mut Attributes, from: &Attributes) {
    for (key, value) in from {
        match (into.get_mut(key), value) {
            (Some(AttributeValue::Map(existing)), AttributeValue::Map(nested)) => {
                merge_attributes(existing, nested);
            }
            _ => {
                into.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> Context {
        let mut ctx = Context::new(Settings::default());
        ctx.begin_phase(PhaseKind::Pre).unwrap();
        ctx
    }

    #[test]
    fn block_config_splits_strategies_from_attributes() {
        let mut attrs = Attributes::new();
        attrs.insert("compositor".into(), "rotation".into());
        attrs.insert("weight".into(), 3i64.into());
        let config = BlockConfig::from_attributes(&attrs).unwrap();
        assert_eq!(config.strategies.compositor.as_deref(), Some("rotation"));
        assert_eq!(config.attributes.get("weight"), Some(&AttributeValue::Integer(3)));

        attrs.insert("rearranger".into(), 1i64.into());
        let err = BlockConfig::from_attributes(&attrs).unwrap_err();
        assert_eq!(err.kind, tsl::ErrorKind::Type);
    }

    #[test]
    fn blocks_close_in_order() {
        let mut ctx = running();
        let outer = ctx.open_block(BlockKind::Sequence, BlockConfig::new()).unwrap();
        let inner = ctx.open_block(BlockKind::Atomic, BlockConfig::new()).unwrap();
        assert_eq!(inner.id(), &BlockId::root().child(0).child(0));
        assert!(ctx.close_block(outer.clone()).is_err());
        ctx.close_block(inner).unwrap();
        let sealed = ctx.close_block(outer).unwrap();
        assert_eq!(sealed.children.len(), 1);
    }

    #[test]
    fn pending_labels_become_a_placeholder() {
        let mut ctx = running();
        ctx.sequence(BlockConfig::new(), |ctx| {
            ctx.instruction("nop", Vec::<Argument>::new())?;
            ctx.label("end")?;
            ctx.comment("done")
        })
        .unwrap();
        let seq = match ctx.blocks[0].children.last() {
            Some(Element::Block(b)) => b.clone(),
            other => panic!("expected a block, got {:?}", other),
        };
        let calls = seq.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls[1].is_executable());
        assert_eq!(calls[1].labels.len(), 1);
    }

    #[test]
    fn nested_attribute_maps_merge() {
        let mut ctx = running();
        let mut outer = Attributes::new();
        let mut mode = Attributes::new();
        mode.insert("user".into(), true.into());
        outer.insert("mode".into(), mode.into());
        let mut inner = Attributes::new();
        let mut mode = Attributes::new();
        mode.insert("cached".into(), false.into());
        inner.insert("mode".into(), mode.into());

        ctx.set_attributes(outer, |ctx| {
            ctx.set_attributes(inner, |ctx| ctx.instruction("ld", [1i64]))
        })
        .unwrap();
        let Some(Element::Call(call)) = ctx.blocks[0].children.last() else {
            panic!("expected a call");
        };
        let mode = call.attributes.get("mode").and_then(AttributeValue::as_map).unwrap();
        assert_eq!(mode.len(), 2);
        assert_eq!(ctx.attribute_depth(), 0);
    }

    #[test]
    fn default_situation_applies_to_matching_calls() {
        let mut ctx = running();
        let zero = ctx.situation("zero", [("value", 0i64)]);
        ctx.set_default_situation(["add", "sub"], zero);
        ctx.instruction("add", [1i64]).unwrap();
        ctx.instruction("mul", [1i64]).unwrap();
        let situations: Vec<Option<String>> = ctx.blocks[0]
            .children
            .iter()
            .map(|e| match e {
                Element::Call(c) => c.situation.as_ref().map(|s| s.name.clone()),
                Element::Block(_) => None,
            })
            .collect();
        assert_eq!(situations, vec![Some("zero".to_string()), None]);
    }
}
