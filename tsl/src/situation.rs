use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::value::{Distribution, Value};

/// A situation attribute holds a value or a resolved distribution handle,
/// never a distribution builder.
#[derive(Debug, Clone, PartialEq)]
pub enum SituationAttribute {
    Value(Value),
    Distribution(Rc<Distribution>),
}

impl From<Value> for SituationAttribute {
    fn from(value: Value) -> Self {
        SituationAttribute::Value(value)
    }
}

impl From<i64> for SituationAttribute {
    fn from(n: i64) -> Self {
        SituationAttribute::Value(Value::Integer(n))
    }
}

impl From<&str> for SituationAttribute {
    fn from(s: &str) -> Self {
        SituationAttribute::Value(Value::from(s))
    }
}

impl From<Rc<Distribution>> for SituationAttribute {
    fn from(distribution: Rc<Distribution>) -> Self {
        SituationAttribute::Distribution(distribution)
    }
}

/// A named execution context attached to calls (operand selection,
/// instruction behavior constraints). Identified by name, not by identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Situation {
    pub name: String,
    pub attributes: BTreeMap<String, SituationAttribute>,
    pub test_data_provider: bool,
}

impl Situation {
    pub fn new<I, K, V>(name: impl Into<String>, attributes: I, test_data_provider: bool) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SituationAttribute>,
    {
        Situation {
            name: name.into(),
            attributes: attributes
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            test_data_provider,
        }
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.attributes.is_empty() {
            write!(f, "(")?;
            for (i, (key, value)) in self.attributes.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match value {
                    SituationAttribute::Value(v) => write!(f, "{}: {}", key, v)?,
                    SituationAttribute::Distribution(_) => write!(f, "{}: <dist>", key)?,
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
