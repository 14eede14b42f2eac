use rand::distributions::{Distribution as _, WeightedIndex};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tsl::Error;
use tsl::value::{Distribution, Value, Variate};

/// The single random source of a template instance. Seeded once, so a fixed
/// seed reproduces the whole generated sequence.
#[derive(Debug, Clone)]
pub struct Random {
    rng: ChaCha8Rng,
    seed: u64,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Random {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw one value, descending into nested distributions with their own weights.
    pub fn sample(&mut self, distribution: &Distribution) -> Result<Value, Error> {
        let alternatives = distribution.alternatives();
        let index = WeightedIndex::new(alternatives.iter().map(|a| u64::from(a.weight)))
            .map_err(|e| Error::configuration(format!("malformed distribution: {}", e)))?;
        match &alternatives[index.sample(&mut self.rng)].variate {
            Variate::Value(value) => Ok(value.clone()),
            Variate::Nested(nested) => self.sample(nested),
        }
    }

    /// An integer from the inclusive range `[from, to]`.
    pub fn range(&mut self, from: i64, to: i64) -> Result<i64, Error> {
        if from > to {
            return Err(Error::range(format!("empty random range [{}, {}]", from, to)));
        }
        Ok(self.rng.gen_range(from..=to))
    }

    /// The generator handed to strategies.
    pub fn rng(&mut self) -> &mut dyn RngCore {
        &mut self.rng
    }
}
