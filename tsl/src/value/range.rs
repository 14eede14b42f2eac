use std::rc::Rc;

use crate::error::Error;
use crate::value::Value;
use crate::value::distribution::Distribution;

/// What a range contributes to a distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeValue {
    Scalar(Value),
    /// Every member becomes its own alternative.
    Collection(Vec<Value>),
    /// Kept as one alternative with its own internal weighting.
    Distribution(Rc<Distribution>),
}

/// `range(value: ..., bias: ...)`: one weighted entry of a distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub value: RangeValue,
    pub bias: Option<u32>,
}

impl ValueRange {
    pub fn new(value: impl Into<RangeValue>) -> Self {
        ValueRange {
            value: value.into(),
            bias: None,
        }
    }

    /// A range with an explicit weight. Zero weights would make the
    /// alternative unreachable and are rejected.
    pub fn biased(value: impl Into<RangeValue>, bias: i64) -> Result<Self, Error> {
        let bias = u32::try_from(bias)
            .ok()
            .filter(|b| *b > 0)
            .ok_or_else(|| Error::range(format!("bias must be a positive integer, got {}", bias)))?;
        Ok(ValueRange {
            value: value.into(),
            bias: Some(bias),
        })
    }
}

impl From<Value> for RangeValue {
    fn from(value: Value) -> Self {
        RangeValue::Scalar(value)
    }
}

impl From<i64> for RangeValue {
    fn from(n: i64) -> Self {
        RangeValue::Scalar(Value::Integer(n))
    }
}

impl From<&str> for RangeValue {
    fn from(s: &str) -> Self {
        RangeValue::Scalar(Value::from(s))
    }
}

impl From<Vec<Value>> for RangeValue {
    fn from(values: Vec<Value>) -> Self {
        RangeValue::Collection(values)
    }
}

impl From<Rc<Distribution>> for RangeValue {
    fn from(distribution: Rc<Distribution>) -> Self {
        RangeValue::Distribution(distribution)
    }
}
