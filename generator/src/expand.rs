use tsl::Error;
use tsl::block::{Block, BlockKind, Element};

use crate::random::Random;
use crate::strategy::StrategyRegistry;
use crate::stream::{Emission, Stream};

/// Turns a sealed block tree into the list of streams it stands for.
pub struct Expander<'a> {
    strategies: &'a StrategyRegistry,
    random: &'a mut Random,
}

impl<'a> Expander<'a> {
    pub fn new(strategies: &'a StrategyRegistry, random: &'a mut Random) -> Self {
        Expander { strategies, random }
    }

    pub fn expand(&mut self, block: &Block) -> Result<Vec<Stream>, Error> {
        self.expand_block(block)
            .map_err(|e| e.at_opt(block.location.as_ref()))
    }

    fn expand_block(&mut self, block: &Block) -> Result<Vec<Stream>, Error> {
        let strategies = &block.strategies;
        let streams = match block.kind {
            BlockKind::Sequence | BlockKind::Atomic => {
                let mut joined = Stream::new();
                for child in &block.children {
                    for stream in self.expand_element(child)? {
                        joined.append(stream);
                    }
                }
                if block.kind == BlockKind::Atomic {
                    joined = joined.into_atomic();
                }
                vec![joined]
            }
            BlockKind::Iterate => {
                let mut iterations = Vec::new();
                for child in &block.children {
                    iterations.extend(self.expand_element(child)?);
                }
                iterations
            }
            BlockKind::Free => {
                let combinator = self.strategies.combinator(strategies.combinator.as_deref())?;
                let permutator = self.strategies.permutator(strategies.permutator.as_deref())?;
                let compositor = self.strategies.compositor(strategies.compositor.as_deref())?;

                let mut alternatives = Vec::with_capacity(block.children.len());
                for child in &block.children {
                    alternatives.push(self.expand_element(child)?);
                }
                let combinations = combinator.combine(alternatives, self.random.rng());
                combinations
                    .into_iter()
                    .map(|combination| {
                        let permuted = permutator.permute(combination, self.random.rng());
                        compositor.compose(permuted, self.random.rng())
                    })
                    .collect()
            }
        };

        let rearranger = self.strategies.rearranger(strategies.rearranger.as_deref())?;
        let obfuscator = self.strategies.obfuscator(strategies.obfuscator.as_deref())?;
        let streams = rearranger.rearrange(streams, self.random.rng());
        let streams: Vec<Stream> = streams
            .into_iter()
            .map(|stream| obfuscator.obfuscate(stream, self.random.rng()))
            .collect();

        log::debug!(
            "expanded {} block {} into {} stream(s)",
            block.kind.name(),
            block.id,
            streams.len()
        );
        Ok(streams)
    }

    fn expand_element(&mut self, element: &Element) -> Result<Vec<Stream>, Error> {
        match element {
            Element::Call(call) => Ok(vec![Stream::single(Emission::from(call))]),
            Element::Block(block) => self.expand(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsl::block::call::InstructionCall;
    use tsl::block::{BlockId, StrategySet};

    fn call(name: &str) -> Element {
        Element::Call(InstructionCall::new(name))
    }

    fn block(kind: BlockKind, children: Vec<Element>, strategies: StrategySet) -> Block {
        Block {
            id: BlockId::root(),
            kind,
            children,
            strategies,
            attributes: Default::default(),
            location: None,
        }
    }

    fn names(stream: &Stream) -> Vec<&str> {
        stream.emissions().map(|e| e.name.as_str()).collect()
    }

    fn expand(block: &Block) -> Vec<Stream> {
        let registry = StrategyRegistry::with_builtins();
        let mut random = Random::new(7);
        Expander::new(&registry, &mut random).expand(block).unwrap()
    }

    #[test]
    fn iterate_yields_one_stream_per_child() {
        let b = block(BlockKind::Iterate, vec![call("a"), call("b")], StrategySet::default());
        let streams = expand(&b);
        assert_eq!(streams.len(), 2);
        assert_eq!(names(&streams[1]), vec!["b"]);
    }

    #[test]
    fn sequence_flattens_iterations() {
        let inner = block(BlockKind::Iterate, vec![call("a"), call("b")], StrategySet::default());
        let outer = block(
            BlockKind::Sequence,
            vec![Element::Block(inner), call("c")],
            StrategySet::default(),
        );
        let streams = expand(&outer);
        assert_eq!(streams.len(), 1);
        assert_eq!(names(&streams[0]), vec!["a", "b", "c"]);
    }

    #[test]
    fn rotation_keeps_atomic_units_whole() {
        let atomic = block(BlockKind::Atomic, vec![call("a1"), call("a2")], StrategySet::default());
        let seq = block(BlockKind::Sequence, vec![call("b1"), call("b2")], StrategySet::default());
        let free = block(
            BlockKind::Free,
            vec![Element::Block(atomic), Element::Block(seq)],
            StrategySet {
                compositor: Some("rotation".into()),
                ..Default::default()
            },
        );
        let streams = expand(&free);
        assert_eq!(streams.len(), 1);
        assert_eq!(names(&streams[0]), vec!["a1", "a2", "b1", "b2"]);
        assert_eq!(streams[0].units().len(), 3);
    }

    #[test]
    fn product_combinator_builds_every_combination() {
        let left = block(BlockKind::Iterate, vec![call("a"), call("b")], StrategySet::default());
        let right = block(BlockKind::Iterate, vec![call("x"), call("y")], StrategySet::default());
        let free = block(
            BlockKind::Free,
            vec![Element::Block(left), Element::Block(right)],
            StrategySet {
                combinator: Some("product".into()),
                ..Default::default()
            },
        );
        let streams = expand(&free);
        let all: Vec<Vec<&str>> = streams.iter().map(names).collect();
        assert_eq!(
            all,
            vec![vec!["a", "x"], vec!["a", "y"], vec!["b", "x"], vec!["b", "y"]]
        );
    }

    #[test]
    fn diagonal_restarts_shorter_children() {
        let left = block(
            BlockKind::Iterate,
            vec![call("a"), call("b"), call("c")],
            StrategySet::default(),
        );
        let free = block(
            BlockKind::Free,
            vec![Element::Block(left), call("x")],
            StrategySet::default(),
        );
        let expanded = expand(&free);
        let all: Vec<Vec<&str>> = expanded.iter().map(names).collect();
        assert_eq!(all, vec![vec!["a", "x"], vec!["b", "x"], vec!["c", "x"]]);
    }

    #[test]
    fn expand_rearranger_joins_iterations() {
        let b = block(
            BlockKind::Iterate,
            vec![call("a"), call("b")],
            StrategySet {
                rearranger: Some("expand".into()),
                ..Default::default()
            },
        );
        let streams = expand(&b);
        assert_eq!(streams.len(), 1);
        assert_eq!(names(&streams[0]), vec!["a", "b"]);
    }

    #[test]
    fn unknown_strategy_is_a_configuration_error() {
        let b = block(
            BlockKind::Free,
            vec![call("a")],
            StrategySet {
                compositor: Some("zigzag".into()),
                ..Default::default()
            },
        );
        let registry = StrategyRegistry::with_builtins();
        let mut random = Random::new(0);
        let err = Expander::new(&registry, &mut random).expand(&b).unwrap_err();
        assert_eq!(err.kind, tsl::ErrorKind::Configuration);
    }
}
