use crate::node::{Instruction, Node};
use serde::Serialize;
use std::{fmt, sync::Arc};

/// Decides whether a node is of interest and extracts what matched.
pub trait Predicate {
    type Item: Clone + Send + 'static;

    /// short description used in logs and in the search outcome
    fn label(&self) -> String;

    fn matches(&self, node: &Node) -> Option<Self::Item>;
}

impl<F, I> Predicate for F
where
    F: Fn(&Node) -> Option<I>,
    I: Clone + Send + 'static,
{
    type Item = I;

    fn label(&self) -> String {
        "custom".to_owned()
    }

    fn matches(&self, node: &Node) -> Option<I> {
        self(node)
    }
}

/// The searches offered to users: every instruction touching an instance
/// or a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// instances whose hex identifier starts with the given prefix
    Instance(String),
    /// instructions of the named contract
    Contract(String),
}

impl Query {
    fn accepts(&self, instruction: &Instruction) -> bool {
        match self {
            Query::Instance(prefix) => instruction.instance_id().matches_hex_prefix(prefix),
            Query::Contract(name) => instruction.contract_id() == name,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Instance(prefix) => write!(f, "instance {}", prefix),
            Query::Contract(name) => write!(f, "contract {}", name),
        }
    }
}

impl Predicate for Query {
    type Item = Vec<Instruction>;

    fn label(&self) -> String {
        self.to_string()
    }

    fn matches(&self, node: &Node) -> Option<Vec<Instruction>> {
        let found: Vec<Instruction> = node
            .payload
            .instructions()
            .filter(|instruction| self.accepts(instruction))
            .cloned()
            .collect();
        if found.is_empty() {
            None
        } else {
            Some(found)
        }
    }
}

/// How many matches a walk collects before stopping on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLimit {
    Unbounded,
    AtMost(u64),
}

impl MatchLimit {
    /// Negative values mean no limit.
    pub fn from_signed(limit: i64) -> Self {
        if limit < 0 {
            MatchLimit::Unbounded
        } else {
            MatchLimit::AtMost(limit as u64)
        }
    }

    pub fn is_reached(self, found: u64) -> bool {
        match self {
            MatchLimit::Unbounded => false,
            MatchLimit::AtMost(limit) => found >= limit,
        }
    }
}

impl Default for MatchLimit {
    fn default() -> Self {
        MatchLimit::Unbounded
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Match<I> {
    pub node: Arc<Node>,
    pub item: I,
}

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// no node left in the walking direction
    EndOfChain,
    /// the requested number of matches was found
    MatchLimit,
    /// the caller asked the walk to stop
    Cancelled,
}

/// The outcome of one walk.
#[derive(Debug, Clone, Serialize)]
pub struct SearchState<I> {
    pub query: String,
    pub matches: Vec<Match<I>>,
    pub seen_count: u64,
    pub found: u64,
    /// true when the walk stopped before reaching the end of the chain
    pub cancelled: bool,
    pub termination: Termination,
}

impl<I> SearchState<I> {
    pub(super) fn new(query: String) -> Self {
        SearchState {
            query,
            matches: Vec::new(),
            seen_count: 0,
            found: 0,
            cancelled: false,
            termination: Termination::EndOfChain,
        }
    }

    pub(super) fn stop(&mut self, termination: Termination) {
        self.cancelled = termination != Termination::EndOfChain;
        self.termination = termination;
    }
}
