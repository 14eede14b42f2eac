use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::strategy::{Combinator, Compositor, Obfuscator, Permutator, Rearranger, StrategyRegistry};
use crate::stream::Stream;

pub fn register(registry: &mut StrategyRegistry) {
    registry.register_combinator("diagonal", Diagonal);
    registry.register_combinator("product", Product);
    registry.register_combinator("random", RandomCombinator);

    registry.register_permutator("trivial", Identity);
    registry.register_permutator("random", Shuffle);

    registry.register_compositor("catenation", Catenation);
    registry.register_compositor("rotation", Rotation);
    registry.register_compositor("nesting", Nesting);
    registry.register_compositor("random", RandomMerge);

    registry.register_rearranger("trivial", Identity);
    registry.register_rearranger("expand", Expand);
    registry.register_rearranger("random", Shuffle);

    registry.register_obfuscator("trivial", Identity);
}

/// Walks every child in lockstep, restarting the ones that run out, until
/// the longest is exhausted.
pub struct Diagonal;

impl Combinator for Diagonal {
    fn combine(&self, children: Vec<Vec<Stream>>, _rng: &mut dyn RngCore) -> Vec<Vec<Stream>> {
        if children.iter().any(Vec::is_empty) {
            return Vec::new();
        }
        let longest = children.iter().map(Vec::len).max().unwrap_or(0);
        (0..longest)
            .map(|k| children.iter().map(|alts| alts[k % alts.len()].clone()).collect())
            .collect()
    }
}

/// Every combination; the first child varies slowest.
pub struct Product;

impl Combinator for Product {
    fn combine(&self, children: Vec<Vec<Stream>>, _rng: &mut dyn RngCore) -> Vec<Vec<Stream>> {
        let mut combinations: Vec<Vec<Stream>> = vec![Vec::new()];
        for alternatives in &children {
            let mut next = Vec::with_capacity(combinations.len() * alternatives.len());
            for prefix in &combinations {
                for alternative in alternatives {
                    let mut combination = prefix.clone();
                    combination.push(alternative.clone());
                    next.push(combination);
                }
            }
            combinations = next;
        }
        combinations
    }
}

/// As many combinations as the longest child, each alternative drawn at random.
pub struct RandomCombinator;

impl Combinator for RandomCombinator {
    fn combine(&self, children: Vec<Vec<Stream>>, rng: &mut dyn RngCore) -> Vec<Vec<Stream>> {
        if children.iter().any(Vec::is_empty) {
            return Vec::new();
        }
        let longest = children.iter().map(Vec::len).max().unwrap_or(0);
        (0..longest)
            .map(|_| {
                children
                    .iter()
                    .map(|alts| alts[rng.gen_range(0..alts.len())].clone())
                    .collect()
            })
            .collect()
    }
}

/// Leaves the order untouched.
pub struct Identity;

impl Permutator for Identity {
    fn permute(&self, streams: Vec<Stream>, _rng: &mut dyn RngCore) -> Vec<Stream> {
        streams
    }
}

impl Rearranger for Identity {
    fn rearrange(&self, sequences: Vec<Stream>, _rng: &mut dyn RngCore) -> Vec<Stream> {
        sequences
    }
}

impl Obfuscator for Identity {
    fn obfuscate(&self, stream: Stream, _rng: &mut dyn RngCore) -> Stream {
        stream
    }
}

pub struct Shuffle;

impl Permutator for Shuffle {
    fn permute(&self, mut streams: Vec<Stream>, rng: &mut dyn RngCore) -> Vec<Stream> {
        streams.shuffle(rng);
        streams
    }
}

impl Rearranger for Shuffle {
    fn rearrange(&self, mut sequences: Vec<Stream>, rng: &mut dyn RngCore) -> Vec<Stream> {
        sequences.shuffle(rng);
        sequences
    }
}

/// One stream after another.
pub struct Catenation;

impl Compositor for Catenation {
    fn compose(&self, streams: Vec<Stream>, _rng: &mut dyn RngCore) -> Stream {
        let mut result = Stream::new();
        for stream in streams {
            result.append(stream);
        }
        result
    }
}

/// Takes one unit from each stream in turn.
pub struct Rotation;

impl Compositor for Rotation {
    fn compose(&self, streams: Vec<Stream>, _rng: &mut dyn RngCore) -> Stream {
        let mut sources: Vec<_> = streams.into_iter().map(|s| s.into_units().into_iter()).collect();
        let mut units = Vec::new();
        loop {
            let before = units.len();
            for source in sources.iter_mut() {
                if let Some(unit) = source.next() {
                    units.push(unit);
                }
            }
            if units.len() == before {
                break;
            }
        }
        Stream::from_units(units)
    }
}

/// Inserts each stream whole into the one before it, at a random unit boundary.
pub struct Nesting;

impl Compositor for Nesting {
    fn compose(&self, streams: Vec<Stream>, rng: &mut dyn RngCore) -> Stream {
        streams.into_iter().rev().fold(Stream::new(), |inner, outer| {
            let mut units = outer.into_units();
            let point = rng.gen_range(0..=units.len());
            let tail = units.split_off(point);
            units.extend(inner.into_units());
            units.extend(tail);
            Stream::from_units(units)
        })
    }
}

/// Random interleaving that keeps the order within each stream.
pub struct RandomMerge;

impl Compositor for RandomMerge {
    fn compose(&self, streams: Vec<Stream>, rng: &mut dyn RngCore) -> Stream {
        let mut sources: Vec<_> = streams
            .into_iter()
            .map(|s| s.into_units().into_iter())
            .collect();
        let mut remaining: usize = sources.iter().map(|s| s.len()).sum();
        let mut units = Vec::with_capacity(remaining);

        while remaining > 0 {
            // Uniform over all interleavings.
            let mut pick = rng.gen_range(0..remaining);
            for source in sources.iter_mut() {
                let left = source.len();
                if pick < left {
                    if let Some(unit) = source.next() {
                        units.push(unit);
                    }
                    break;
                }
                pick -= left;
            }
            remaining -= 1;
        }
        Stream::from_units(units)
    }
}

/// Collapses all sequences into a single one.
pub struct Expand;

impl Rearranger for Expand {
    fn rearrange(&self, sequences: Vec<Stream>, _rng: &mut dyn RngCore) -> Vec<Stream> {
        if sequences.is_empty() {
            return sequences;
        }
        let mut all = Stream::new();
        for sequence in sequences {
            all.append(sequence);
        }
        vec![all]
    }
}
