use std::rc::Rc;

use crate::error::Error;
use crate::value::Value;
use crate::value::range::{RangeValue, ValueRange};

/// A single choice of a distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum Variate {
    Value(Value),
    Nested(Rc<Distribution>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub variate: Variate,
    pub weight: u32,
}

/// Weighted choice over a finite set of alternatives.
///
/// Built only through [`Distribution::build`], so every instance has at least
/// one alternative, every weight is positive and the total weight fits in a `u64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    alternatives: Vec<Alternative>,
}

impl Distribution {
    /// `dist(range, range, ...)`.
    ///
    /// Unbiased ranges get an implicit share equal to the mean explicit bias
    /// (rounded up), or 1 when no range is biased.
    pub fn build(ranges: &[ValueRange]) -> Result<Self, Error> {
        if ranges.is_empty() {
            return Err(Error::configuration("a distribution needs at least one range"));
        }

        let default_weight = implicit_weight(ranges);
        let mut alternatives = Vec::new();
        for range in ranges {
            let weight = range.bias.unwrap_or(default_weight);
            if weight == 0 {
                return Err(Error::range("distribution weights must be positive"));
            }
            match &range.value {
                RangeValue::Scalar(value) => alternatives.push(Alternative {
                    variate: Variate::Value(value.clone()),
                    weight,
                }),
                RangeValue::Collection(values) => {
                    if values.is_empty() {
                        return Err(Error::configuration("an empty collection cannot be a range value"));
                    }
                    alternatives.extend(values.iter().map(|value| Alternative {
                        variate: Variate::Value(value.clone()),
                        weight,
                    }));
                }
                RangeValue::Distribution(nested) => alternatives.push(Alternative {
                    variate: Variate::Nested(Rc::clone(nested)),
                    weight,
                }),
            }
        }

        Ok(Distribution { alternatives })
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn total_weight(&self) -> u64 {
        self.alternatives.iter().map(|a| u64::from(a.weight)).sum()
    }

    /// Probability of picking `value` at the top level and through nested distributions.
    pub fn probability_of(&self, value: &Value) -> f64 {
        let total = self.total_weight() as f64;
        self.alternatives
            .iter()
            .map(|alternative| {
                let share = f64::from(alternative.weight) / total;
                match &alternative.variate {
                    Variate::Value(v) if v == value => share,
                    Variate::Value(_) => 0.0,
                    Variate::Nested(nested) => share * nested.probability_of(value),
                }
            })
            .sum()
    }
}

fn implicit_weight(ranges: &[ValueRange]) -> u32 {
    let biases: Vec<u64> = ranges.iter().filter_map(|r| r.bias).map(u64::from).collect();
    if biases.is_empty() {
        return 1;
    }
    let sum: u64 = biases.iter().sum();
    let mean = sum.div_ceil(biases.len() as u64);
    u32::try_from(mean).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn unbiased_ranges_share_equally() {
        let dist = Distribution::build(&[ValueRange::new(1i64), ValueRange::new(2i64)]).unwrap();
        assert_eq!(dist.total_weight(), 2);
        assert_eq!(dist.probability_of(&int(1)), 0.5);
    }

    #[test]
    fn mixed_biases_keep_every_alternative_reachable() {
        let ranges = vec![
            ValueRange::biased(1i64, 6).unwrap(),
            ValueRange::new(2i64),
            ValueRange::biased(vec![int(3), int(4)], 2).unwrap(),
            ValueRange::new(vec![int(5), int(6), int(7)]),
        ];
        let dist = Distribution::build(&ranges).unwrap();
        assert!(dist.total_weight() > 0);
        for n in 1..=7 {
            assert!(dist.probability_of(&int(n)) > 0.0, "value {} unreachable", n);
        }
        // mean of explicit biases 6 and 2
        assert_eq!(dist.alternatives()[1].weight, 4);
    }

    #[test]
    fn collection_members_take_the_range_bias() {
        let dist = Distribution::build(&[ValueRange::biased(vec![int(1), int(2)], 3).unwrap()]).unwrap();
        assert_eq!(dist.alternatives().len(), 2);
        assert!(dist.alternatives().iter().all(|a| a.weight == 3));
    }

    #[test]
    fn nested_distribution_is_not_flattened() {
        let inner = Rc::new(
            Distribution::build(&[ValueRange::biased(10i64, 1).unwrap(), ValueRange::biased(20i64, 3).unwrap()])
                .unwrap(),
        );
        let outer = Distribution::build(&[ValueRange::biased(inner, 1).unwrap(), ValueRange::biased(30i64, 1).unwrap()])
            .unwrap();
        assert_eq!(outer.alternatives().len(), 2);
        assert!(matches!(outer.alternatives()[0].variate, Variate::Nested(_)));
        assert!((outer.probability_of(&int(20)) - 0.375).abs() < 1e-9);
    }

    #[test]
    fn zero_or_negative_bias_is_rejected() {
        assert!(ValueRange::biased(1i64, 0).is_err());
        assert!(ValueRange::biased(1i64, -4).is_err());
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(Distribution::build(&[]).is_err());
        assert!(Distribution::build(&[ValueRange::new(Vec::<Value>::new())]).is_err());
    }
}
