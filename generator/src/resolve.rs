//! Label bookkeeping for generated sequences.
//!
//! A phase is finalized in two steps. `finalize` turns one expanded stream
//! into a flat instruction sequence: random arguments are drawn, yielded weak
//! labels are dropped and repeated local labels get occurrence suffixes.
//! Once every phase is known, `LabelResolver` binds label operands to the
//! declarations they refer to.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use tsl::block::attribute::Attributes;
use tsl::block::call::{Argument, Output};
use tsl::label::{AddressReference, Label, LabelName, LabelRef};
use tsl::section::MemorySection;
use tsl::situation::Situation;
use tsl::value::Value;
use tsl::{Error, SourceLocation};

use crate::random::Random;
use crate::stream::Stream;
use crate::template::PhaseKind;

/// Where a label landed in the generated template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTarget {
    Code {
        phase: PhaseKind,
        sequence: usize,
        position: usize,
    },
    Data {
        section: usize,
        directive: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLabel {
    /// The label as it is printed at its declaration.
    pub rendered: String,
    pub target: LabelTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Label {
        reference: LabelRef,
        target: Option<ResolvedLabel>,
    },
    Address(AddressReference),
}

/// A label declaration as it is printed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub label: Label,
    pub rendered: String,
}

/// One line of a generated sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub name: String,
    pub operands: Vec<Operand>,
    pub labels: Vec<PlacedLabel>,
    pub outputs: Vec<Output>,
    pub situation: Option<Situation>,
    pub attributes: Attributes,
    pub section: Option<Rc<MemorySection>>,
    pub location: Option<SourceLocation>,
}

impl Instruction {
    /// False for placeholders that only carry labels and outputs.
    pub fn is_executable(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Flatten a final stream into instructions.
pub fn finalize(stream: Stream, random: &mut Random) -> Result<Vec<Instruction>, Error> {
    let strong: HashSet<String> = stream
        .emissions()
        .flat_map(|e| e.labels.iter())
        .filter(|label| !label.weak)
        .filter_map(|label| match &label.name {
            LabelName::Named(name) => Some(name.clone()),
            LabelName::Numeric(_) => None,
        })
        .collect();
    let mut weak_seen = HashSet::new();
    let mut occurrences: HashMap<String, usize> = HashMap::new();

    let mut instructions = Vec::with_capacity(stream.len());
    for emission in stream.into_units().into_iter().flatten() {
        let location = emission.location;
        let mut operands = Vec::with_capacity(emission.arguments.len());
        for argument in emission.arguments {
            let operand = match argument {
                Argument::Value(value) => Operand::Value(value),
                Argument::Random(distribution) => Operand::Value(
                    random
                        .sample(&distribution)
                        .map_err(|e| e.at_opt(location.as_ref()))?,
                ),
                Argument::RandomRange(range) => Operand::Value(Value::Integer(
                    random
                        .range(*range.start(), *range.end())
                        .map_err(|e| e.at_opt(location.as_ref()))?,
                )),
                Argument::Label(reference) => Operand::Label {
                    reference,
                    target: None,
                },
                Argument::Address(reference) => Operand::Address(reference),
            };
            operands.push(operand);
        }

        let mut labels = Vec::with_capacity(emission.labels.len());
        for label in emission.labels {
            let rendered = match &label.name {
                LabelName::Numeric(slot) => slot.to_string(),
                LabelName::Named(name) if label.weak => {
                    if strong.contains(name) || !weak_seen.insert(name.clone()) {
                        log::warn!("weak label '{}' dropped in favour of another declaration", name);
                        continue;
                    }
                    name.clone()
                }
                LabelName::Named(name) if label.global => name.clone(),
                LabelName::Named(name) => {
                    let seen = occurrences.entry(name.clone()).or_insert(0);
                    let rendered = if *seen == 0 {
                        name.clone()
                    } else {
                        format!("{}_{}", name, seen)
                    };
                    *seen += 1;
                    rendered
                }
            };
            labels.push(PlacedLabel { label, rendered });
        }

        instructions.push(Instruction {
            name: emission.name,
            operands,
            labels,
            outputs: emission.outputs,
            situation: emission.situation,
            attributes: emission.attributes,
            section: emission.section,
            location,
        });
    }
    Ok(instructions)
}

/// Binds label references to declarations.
#[derive(Debug, Default)]
pub struct LabelResolver {
    globals: BTreeMap<String, LabelTarget>,
    data_labels: HashMap<String, LabelTarget>,
}

impl LabelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global label. Global names are unique across the template.
    pub fn add_global(&mut self, name: &str, target: LabelTarget) -> Result<(), Error> {
        if self.globals.contains_key(name) {
            return Err(Error::configuration(format!(
                "global label '{}' is declared more than once",
                name
            )));
        }
        self.globals.insert(name.to_string(), target);
        Ok(())
    }

    /// Register a label declared inside a data region.
    pub fn add_data_label(&mut self, label: &Label, target: LabelTarget) -> Result<(), Error> {
        let name = label.name.to_string();
        if label.global {
            self.add_global(&name, target)?;
        }
        self.data_labels.entry(name).or_insert(target);
        Ok(())
    }

    /// Register every global label declared in a finalized sequence.
    pub fn add_sequence(
        &mut self,
        phase: PhaseKind,
        sequence: usize,
        instructions: &[Instruction],
    ) -> Result<(), Error> {
        for (position, instruction) in instructions.iter().enumerate() {
            for placed in instruction.labels.iter().filter(|p| p.label.global) {
                let target = LabelTarget::Code {
                    phase,
                    sequence,
                    position,
                };
                self.add_global(&placed.rendered, target)
                    .map_err(|e| e.at_opt(instruction.location.as_ref()))?;
            }
        }
        Ok(())
    }

    /// Resolve every label operand of one sequence.
    pub fn resolve_sequence(
        &self,
        phase: PhaseKind,
        sequence: usize,
        instructions: &mut [Instruction],
    ) -> Result<(), Error> {
        let mut resolved = Vec::new();
        for (position, instruction) in instructions.iter().enumerate() {
            for (index, operand) in instruction.operands.iter().enumerate() {
                if let Operand::Label { reference, .. } = operand {
                    let (at, rendered) = self
                        .find(instructions, position, reference)
                        .ok_or_else(|| {
                            Error::resolution(format!("label '{}' cannot be resolved in scope", reference))
                                .at_opt(instruction.location.as_ref())
                        })?;
                    let target = match at {
                        Found::Local(found) => LabelTarget::Code {
                            phase,
                            sequence,
                            position: found,
                        },
                        Found::Elsewhere(target) => target,
                    };
                    resolved.push((position, index, ResolvedLabel { rendered, target }));
                }
            }
        }

        for (position, index, label) in resolved {
            log::debug!("resolved {} to {:?}", label.rendered, label.target);
            if let Operand::Label { target, .. } = &mut instructions[position].operands[index] {
                *target = Some(label);
            }
        }
        Ok(())
    }

    fn find(&self, instructions: &[Instruction], position: usize, reference: &LabelRef) -> Option<(Found, String)> {
        let scope = reference.scope();
        let declarations = instructions.iter().enumerate().flat_map(move |(at, instruction)| {
            instruction
                .labels
                .iter()
                .filter(move |p| p.label.scope.encloses(scope))
                .map(move |p| (at, p))
        });

        match reference {
            LabelRef::Named { name, .. } => {
                let local = declarations
                    .filter(|(_, p)| matches!(&p.label.name, LabelName::Named(n) if n == name))
                    .min_by_key(|(at, _)| (at.abs_diff(position), *at > position));
                if let Some((at, placed)) = local {
                    return Some((Found::Local(at), placed.rendered.clone()));
                }
                self.globals
                    .get(name)
                    .or_else(|| self.data_labels.get(name))
                    .map(|target| (Found::Elsewhere(*target), name.clone()))
            }
            LabelRef::Numeric { slot, forward, .. } => {
                let mut matching = declarations
                    .filter(|(_, p)| p.label.name == LabelName::Numeric(*slot));
                let found = if *forward {
                    matching.find(|(at, _)| *at > position)
                } else {
                    matching.filter(|(at, _)| *at <= position).last()
                };
                found.map(|(at, placed)| (Found::Local(at), placed.rendered.clone()))
            }
        }
    }

    pub fn into_globals(self) -> BTreeMap<String, LabelTarget> {
        self.globals
    }
}

enum Found {
    Local(usize),
    Elsewhere(LabelTarget),
}
