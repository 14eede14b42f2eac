//! Pluggable composition strategies.
//!
//! The engine fixes the order in which strategies apply (combinator,
//! permutator, compositor, rearranger, obfuscator) and what each one
//! receives; the strategies themselves are opaque. A template instance owns
//! its own registry, so strategies registered by one template never leak
//! into another.

pub mod builtin;

use std::collections::HashMap;
use std::rc::Rc;

use rand::RngCore;

use tsl::Error;
use tsl::block::StrategySet;

use crate::stream::Stream;

/// Merges the alternatives of each child into combinations, one stream per child.
pub trait Combinator {
    fn combine(&self, children: Vec<Vec<Stream>>, rng: &mut dyn RngCore) -> Vec<Vec<Stream>>;
}

/// Reorders the streams of one combination.
pub trait Permutator {
    fn permute(&self, streams: Vec<Stream>, rng: &mut dyn RngCore) -> Vec<Stream>;
}

/// Interleaves parallel streams into one.
pub trait Compositor {
    fn compose(&self, streams: Vec<Stream>, rng: &mut dyn RngCore) -> Stream;
}

/// Orders the repeated emissions of a block.
pub trait Rearranger {
    fn rearrange(&self, sequences: Vec<Stream>, rng: &mut dyn RngCore) -> Vec<Stream>;
}

/// Perturbs emitted values of one stream, leaving its structure alone.
pub trait Obfuscator {
    fn obfuscate(&self, stream: Stream, rng: &mut dyn RngCore) -> Stream;
}

pub const DEFAULT_COMBINATOR: &str = "diagonal";
pub const DEFAULT_PERMUTATOR: &str = "trivial";
pub const DEFAULT_COMPOSITOR: &str = "catenation";
pub const DEFAULT_REARRANGER: &str = "trivial";
pub const DEFAULT_OBFUSCATOR: &str = "trivial";

/// Strategies by name, per template instance.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    combinators: HashMap<String, Rc<dyn Combinator>>,
    permutators: HashMap<String, Rc<dyn Permutator>>,
    compositors: HashMap<String, Rc<dyn Compositor>>,
    rearrangers: HashMap<String, Rc<dyn Rearranger>>,
    obfuscators: HashMap<String, Rc<dyn Obfuscator>>,
}

impl StrategyRegistry {
    /// An empty registry. Blocks relying on defaults need the built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    pub fn register_combinator(&mut self, name: impl Into<String>, strategy: impl Combinator + 'static) {
        self.combinators.insert(name.into(), Rc::new(strategy));
    }

    pub fn register_permutator(&mut self, name: impl Into<String>, strategy: impl Permutator + 'static) {
        self.permutators.insert(name.into(), Rc::new(strategy));
    }

    pub fn register_compositor(&mut self, name: impl Into<String>, strategy: impl Compositor + 'static) {
        self.compositors.insert(name.into(), Rc::new(strategy));
    }

    pub fn register_rearranger(&mut self, name: impl Into<String>, strategy: impl Rearranger + 'static) {
        self.rearrangers.insert(name.into(), Rc::new(strategy));
    }

    pub fn register_obfuscator(&mut self, name: impl Into<String>, strategy: impl Obfuscator + 'static) {
        self.obfuscators.insert(name.into(), Rc::new(strategy));
    }

    pub fn combinator(&self, name: Option<&str>) -> Result<Rc<dyn Combinator>, Error> {
        lookup(&self.combinators, "combinator", name.unwrap_or(DEFAULT_COMBINATOR))
    }

    pub fn permutator(&self, name: Option<&str>) -> Result<Rc<dyn Permutator>, Error> {
        lookup(&self.permutators, "permutator", name.unwrap_or(DEFAULT_PERMUTATOR))
    }

    pub fn compositor(&self, name: Option<&str>) -> Result<Rc<dyn Compositor>, Error> {
        lookup(&self.compositors, "compositor", name.unwrap_or(DEFAULT_COMPOSITOR))
    }

    pub fn rearranger(&self, name: Option<&str>) -> Result<Rc<dyn Rearranger>, Error> {
        lookup(&self.rearrangers, "rearranger", name.unwrap_or(DEFAULT_REARRANGER))
    }

    pub fn obfuscator(&self, name: Option<&str>) -> Result<Rc<dyn Obfuscator>, Error> {
        lookup(&self.obfuscators, "obfuscator", name.unwrap_or(DEFAULT_OBFUSCATOR))
    }

    /// Check that every strategy named by a block is registered.
    pub fn check(&self, strategies: &StrategySet) -> Result<(), Error> {
        for (option, name) in strategies.attached() {
            let known = match option {
                "combinator" => self.combinators.contains_key(name),
                "permutator" => self.permutators.contains_key(name),
                "compositor" => self.compositors.contains_key(name),
                "rearranger" => self.rearrangers.contains_key(name),
                _ => self.obfuscators.contains_key(name),
            };
            if !known {
                return Err(unknown(option, name));
            }
        }
        Ok(())
    }
}

fn lookup<T: ?Sized>(table: &HashMap<String, Rc<T>>, option: &str, name: &str) -> Result<Rc<T>, Error> {
    table.get(name).cloned().ok_or_else(|| unknown(option, name))
}

fn unknown(option: &str, name: &str) -> Error {
    Error::configuration(format!("unknown {} '{}'", option, name))
}
