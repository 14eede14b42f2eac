use std::collections::BTreeMap;
use std::fmt;

use tsl::Error;
use tsl::block::Block;
use tsl::data::DataSection;
use tsl::settings::Settings;

use crate::context::Context;
use crate::resolve::{Instruction, LabelResolver, LabelTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhaseKind {
    Pre,
    Main,
    Post,
}

impl PhaseKind {
    pub fn name(self) -> &'static str {
        match self {
            PhaseKind::Pre => "pre",
            PhaseKind::Main => "main",
            PhaseKind::Post => "post",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a template instance is in its run. Strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    PreRunning,
    MainRunning,
    PostRunning,
    Done,
}

impl Lifecycle {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Lifecycle::PreRunning | Lifecycle::MainRunning | Lifecycle::PostRunning
        )
    }

    pub(crate) fn enter(self, phase: PhaseKind) -> Result<Lifecycle, Error> {
        match (self, phase) {
            (Lifecycle::Created, PhaseKind::Pre) => Ok(Lifecycle::PreRunning),
            (Lifecycle::PreRunning, PhaseKind::Main) => Ok(Lifecycle::MainRunning),
            (Lifecycle::MainRunning, PhaseKind::Post) => Ok(Lifecycle::PostRunning),
            (state, phase) => Err(Error::configuration(format!(
                "{} phase cannot start in state {:?}",
                phase, state
            ))),
        }
    }

    pub(crate) fn finish(self) -> Result<Lifecycle, Error> {
        match self {
            Lifecycle::PostRunning => Ok(Lifecycle::Done),
            state => Err(Error::configuration(format!(
                "template cannot finish in state {:?}",
                state
            ))),
        }
    }
}

/// One generated phase: the sealed tree and the sequences it expanded to.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub kind: PhaseKind,
    pub block: Block,
    pub sequences: Vec<Vec<Instruction>>,
}

/// Everything a template produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTemplate {
    pub seed: u64,
    pub pre: Phase,
    pub main: Phase,
    pub post: Phase,
    pub data: Vec<DataSection>,
    globals: BTreeMap<String, LabelTarget>,
}

impl GeneratedTemplate {
    pub fn phases(&self) -> [&Phase; 3] {
        [&self.pre, &self.main, &self.post]
    }

    /// Where a global label (code or data) landed.
    pub fn address_of(&self, name: &str) -> Option<LabelTarget> {
        self.globals.get(name).copied()
    }

    pub fn globals(&self) -> &BTreeMap<String, LabelTarget> {
        &self.globals
    }
}

/// A test template. Each phase body is optional.
pub trait Template {
    fn pre(&mut self, _ctx: &mut Context) -> Result<(), Error> {
        Ok(())
    }

    fn run(&mut self, _ctx: &mut Context) -> Result<(), Error> {
        log::warn!("template does not override `run`; the main phase is empty");
        Ok(())
    }

    fn post(&mut self, _ctx: &mut Context) -> Result<(), Error> {
        Ok(())
    }
}

/// Run a template on a fresh context.
pub fn generate<T: Template + ?Sized>(template: &mut T, settings: Settings) -> Result<GeneratedTemplate, Error> {
    let mut ctx = Context::new(settings);
    generate_with(template, &mut ctx)
}

/// Run a template on a prepared context, e.g. one with extra strategies.
pub fn generate_with<T: Template + ?Sized>(
    template: &mut T,
    ctx: &mut Context,
) -> Result<GeneratedTemplate, Error> {
    log::info!("generating template with seed {}", ctx.settings().seed);
    let mut pre = run_phase(ctx, PhaseKind::Pre, |ctx| template.pre(ctx))?;
    let mut main = run_phase(ctx, PhaseKind::Main, |ctx| template.run(ctx))?;
    let mut post = run_phase(ctx, PhaseKind::Post, |ctx| template.post(ctx))?;
    ctx.finish()?;

    if ctx.data_manager().is_open() {
        return Err(Error::configuration("a data region is still open"));
    }
    let data = ctx.data_manager_mut().take_sections();

    let mut resolver = LabelResolver::new();
    for (index, section) in data.iter().enumerate() {
        for (directive, label) in section.labels() {
            resolver.add_data_label(label, LabelTarget::Data { section: index, directive })?;
        }
    }
    for phase in [&pre, &main, &post] {
        for (index, sequence) in phase.sequences.iter().enumerate() {
            resolver.add_sequence(phase.kind, index, sequence)?;
        }
    }
    for phase in [&mut pre, &mut main, &mut post] {
        for (index, sequence) in phase.sequences.iter_mut().enumerate() {
            resolver.resolve_sequence(phase.kind, index, sequence)?;
        }
    }

    Ok(GeneratedTemplate {
        seed: ctx.settings().seed,
        pre,
        main,
        post,
        data,
        globals: resolver.into_globals(),
    })
}

fn run_phase<F>(ctx: &mut Context, kind: PhaseKind, body: F) -> Result<Phase, Error>
where
    F: FnOnce(&mut Context) -> Result<(), Error>,
{
    log::info!("{} phase started", kind);
    ctx.begin_phase(kind)?;
    let result = body(ctx);
    ctx.end_phase(kind, result)
}
