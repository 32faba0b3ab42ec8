use crate::node::{
    skip_distance, ClientTransaction, Direction, ForwardLink, Instruction, Node, NodeId, Payload,
    NODE_ID_SIZE,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use std::collections::HashMap;

const SIGNATURE_SIZE: usize = 64;

/// A skipchain held in memory, growing one node at a time.
pub struct Chain {
    base: u32,
    max_height: u32,
    genesis_backlinks: bool,
    rng: ChaChaRng,
    nodes: Vec<Node>,
    by_id: HashMap<NodeId, usize>,
    planted: HashMap<u64, Vec<Instruction>>,
}

impl Chain {
    pub fn new(base: u32, max_height: u32, seed: u64) -> Self {
        Chain {
            base: base.max(2),
            max_height: max_height.max(1),
            genesis_backlinks: false,
            rng: ChaChaRng::seed_from_u64(seed),
            nodes: Vec::new(),
            by_id: HashMap::new(),
            planted: HashMap::new(),
        }
    }

    /// Genesis links back to itself on every level instead of carrying
    /// no backlinks.
    pub fn link_genesis_to_itself(&mut self) {
        self.genesis_backlinks = true;
    }

    /// Instructions to put in the payload of the node at `index` once it
    /// gets appended.
    pub fn plant(&mut self, index: u64, instruction: Instruction) {
        self.planted.entry(index).or_default().push(instruction);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: u64) -> Option<&Node> {
        self.nodes.get(index as usize)
    }

    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn head(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// `1 + max{j : base^j divides index}`, capped; genesis is as tall
    /// as the chain allows.
    fn height_at(&self, index: u64) -> u32 {
        if index == 0 {
            return self.max_height;
        }
        let mut height = 1;
        while height < self.max_height {
            match skip_distance(self.base, height as usize) {
                Some(distance) if index % distance == 0 => height += 1,
                _ => break,
            }
        }
        height
    }

    pub fn append(&mut self) -> &Node {
        let index = self.nodes.len() as u64;
        let height = self.height_at(index);

        let mut hash = [0u8; NODE_ID_SIZE];
        self.rng.fill(&mut hash[..]);
        let hash = NodeId::from_bytes(hash);

        let backlinks = if index == 0 && self.genesis_backlinks {
            vec![hash; height as usize]
        } else if index == 0 {
            Vec::new()
        } else {
            (0..height as usize)
                .filter_map(|level| skip_distance(self.base, level))
                .filter_map(|distance| index.checked_sub(distance))
                .map(|target| self.nodes[target as usize].hash)
                .collect()
        };

        for level in 0..self.max_height as usize {
            let target = match skip_distance(self.base, level).and_then(|d| index.checked_sub(d)) {
                Some(target) => target as usize,
                None => break,
            };
            let mut signature = vec![0u8; SIGNATURE_SIZE];
            self.rng.fill(&mut signature[..]);
            let source = &mut self.nodes[target];
            if source.height as usize > level && source.forward_links.len() == level {
                source.forward_links.push(ForwardLink {
                    to: hash,
                    signature,
                });
            }
        }

        let payload = match self.planted.remove(&index) {
            Some(instructions) => Payload {
                transactions: vec![ClientTransaction {
                    accepted: true,
                    instructions,
                }],
            },
            None => Payload::default(),
        };

        self.by_id.insert(hash, self.nodes.len());
        self.nodes.push(Node {
            index,
            hash,
            height,
            base_height: self.base,
            backlinks,
            forward_links: Vec::new(),
            payload,
        });
        &self.nodes[index as usize]
    }

    /// Up to `count` nodes starting at (and including) `start`.
    pub fn walk(&self, start: usize, count: usize, direction: Direction) -> Vec<Node> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = Some(start);
        while let Some(position) = cursor {
            if out.len() == count {
                break;
            }
            out.push(self.nodes[position].clone());
            cursor = match direction {
                Direction::Forward if position + 1 < self.nodes.len() => Some(position + 1),
                Direction::Forward => None,
                Direction::Backward => position.checked_sub(1),
            };
        }
        out
    }
}
