use std::rc::Rc;

use tsl::SourceLocation;
use tsl::block::attribute::Attributes;
use tsl::block::call::{Argument, InstructionCall, Output};
use tsl::label::Label;
use tsl::section::MemorySection;
use tsl::situation::Situation;

/// One leaf of an expanded stream. Arguments stay unresolved until the
/// stream is final, so every repetition draws its own random values.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub labels: Vec<Label>,
    pub outputs: Vec<Output>,
    pub situation: Option<Situation>,
    pub attributes: Attributes,
    pub section: Option<Rc<MemorySection>>,
    pub location: Option<SourceLocation>,
}

impl From<&InstructionCall> for Emission {
    fn from(call: &InstructionCall) -> Self {
        Emission {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            labels: call.labels.clone(),
            outputs: call.outputs.clone(),
            situation: call.situation.clone(),
            attributes: call.attributes.clone(),
            section: call.section.clone(),
            location: call.location.clone(),
        }
    }
}

/// An ordered run of emissions, grouped into units that compositors never split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    units: Vec<Vec<Emission>>,
}

impl Stream {
    pub fn new() -> Self {
        Stream { units: Vec::new() }
    }

    pub fn single(emission: Emission) -> Self {
        Stream {
            units: vec![vec![emission]],
        }
    }

    pub fn from_units(units: Vec<Vec<Emission>>) -> Self {
        Stream {
            units: units.into_iter().filter(|u| !u.is_empty()).collect(),
        }
    }

    pub fn append(&mut self, other: Stream) {
        self.units.extend(other.units);
    }

    /// Merge every unit into one.
    pub fn into_atomic(self) -> Stream {
        let merged: Vec<Emission> = self.units.into_iter().flatten().collect();
        Stream::from_units(vec![merged])
    }

    pub fn units(&self) -> &[Vec<Emission>] {
        &self.units
    }

    pub fn into_units(self) -> Vec<Vec<Emission>> {
        self.units
    }

    pub fn emissions(&self) -> impl Iterator<Item = &Emission> {
        self.units.iter().flatten()
    }

    /// Number of emissions.
    pub fn len(&self) -> usize {
        self.units.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
