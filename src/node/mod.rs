//! The skipchain data model: nodes, the identifiers addressing them and
//! the links they carry to earlier and later nodes of the chain.
//!
//! A node at `index` with `height` levels links back to the nodes at
//! `index - base^j` and forward to the nodes at `index + base^j`, for
//! `j` in `0..height`. Forward links are only known once their target
//! exists, so a node close to the head carries fewer of them.

pub mod cache;

pub use self::cache::NodeCache;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    convert::TryFrom,
    fmt::{self, Display},
    str::FromStr,
};
use thiserror::Error;

/// Byte length of a [`NodeId`].
pub const NODE_ID_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidIdentifier {
    #[error("invalid node identifier size, expected {expected} but received {got} bytes")]
    InvalidSize { got: usize, expected: usize },
    #[error("invalid hex encoding for node identifier")]
    InvalidHexEncoding(#[from] hex::FromHexError),
}

/// The fixed-length hash addressing a node.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId([u8; NODE_ID_SIZE]);

impl NodeId {
    pub const fn from_bytes(bytes: [u8; NODE_ID_SIZE]) -> Self {
        NodeId(bytes)
    }

    pub fn try_from_slice(slice: &[u8]) -> Result<Self, InvalidIdentifier> {
        if slice.len() == NODE_ID_SIZE {
            let mut out = [0u8; NODE_ID_SIZE];
            out.copy_from_slice(slice);
            Ok(NodeId(out))
        } else {
            Err(InvalidIdentifier::InvalidSize {
                got: slice.len(),
                expected: NODE_ID_SIZE,
            })
        }
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> TryFrom<&'a [u8]> for NodeId {
    type Error = InvalidIdentifier;

    fn try_from(slice: &'a [u8]) -> Result<Self, Self::Error> {
        NodeId::try_from_slice(slice)
    }
}

impl FromStr for NodeId {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())?;
        NodeId::try_from_slice(&bytes)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// serde helper writing opaque byte strings as hex
pub(crate) mod hex_bytes {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(D::Error::custom)
    }
}

/// Walking direction along the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// ascending indices, toward the head
    Forward,
    /// descending indices, toward genesis
    Backward,
}

impl Direction {
    pub fn from_backward(backward: bool) -> Self {
        if backward {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    pub fn is_backward(self) -> bool {
        self == Direction::Backward
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// A not yet followed pointer to another node.
///
/// The index is derived from the skip distance of the link that produced
/// it; following the reference requires a fetch (see
/// [`PageFetcher::resolve`](crate::network::PageFetcher::resolve)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    id: NodeId,
    index: Option<u64>,
}

impl NodeRef {
    pub fn new(id: NodeId, index: Option<u64>) -> Self {
        NodeRef { id, index }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn index(&self) -> Option<u64> {
        self.index
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        NodeRef { id, index: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardLink {
    pub to: NodeId,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// Identifier of a contract instance touched by an instruction.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(Vec<u8>);

impl InstanceId {
    pub fn new(bytes: Vec<u8>) -> Self {
        InstanceId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// true if the hex form of this id starts with `prefix`
    /// (case insensitive)
    pub fn matches_hex_prefix(&self, prefix: &str) -> bool {
        hex::encode(&self.0).starts_with(&prefix.to_ascii_lowercase())
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self)
    }
}

impl FromStr for InstanceId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s.trim()).map(InstanceId)
    }
}

impl Serialize for InstanceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex_bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for InstanceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hex_bytes::deserialize(deserializer).map(InstanceId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InstructionKind {
    #[serde(rename_all = "camelCase")]
    Spawn { contract_id: String },
    #[serde(rename_all = "camelCase")]
    Invoke { contract_id: String, command: String },
    #[serde(rename_all = "camelCase")]
    Delete { contract_id: String },
}

/// One instruction of a client transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub instance_id: InstanceId,
    #[serde(flatten)]
    pub kind: InstructionKind,
}

impl Instruction {
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn contract_id(&self) -> &str {
        match &self.kind {
            InstructionKind::Spawn { contract_id }
            | InstructionKind::Invoke { contract_id, .. }
            | InstructionKind::Delete { contract_id } => contract_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTransaction {
    #[serde(default)]
    pub accepted: bool,
    pub instructions: Vec<Instruction>,
}

/// The part of a node's payload this crate looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub transactions: Vec<ClientTransaction>,
}

impl Payload {
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.transactions
            .iter()
            .flat_map(|transaction| transaction.instructions.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedNode {
    #[error("node {index} has a zero height")]
    ZeroHeight { index: u64 },
    #[error("node {index} has a skip base of {base}, expected at least 2")]
    BaseTooSmall { index: u64, base: u32 },
    #[error("node {index} has {got} backlinks for a height of {height}")]
    BacklinkCount { index: u64, height: u32, got: usize },
    #[error("node {index} has {got} forward links for a height of {height}")]
    ForwardLinkCount { index: u64, height: u32, got: usize },
}

/// One immutable node of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub index: u64,
    pub hash: NodeId,
    pub height: u32,
    pub base_height: u32,
    #[serde(default)]
    pub backlinks: Vec<NodeId>,
    #[serde(default)]
    pub forward_links: Vec<ForwardLink>,
    #[serde(default)]
    pub payload: Payload,
}

/// Index distance covered by a link at `level` for the given skip base.
pub fn skip_distance(base: u32, level: usize) -> Option<u64> {
    u32::try_from(level)
        .ok()
        .and_then(|level| u64::from(base).checked_pow(level))
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Check the link counts against the height.
    ///
    /// Every node carries exactly `height` backlinks. Genesis has nothing
    /// to link back to and may carry none at all instead.
    pub fn check_links(&self) -> Result<(), MalformedNode> {
        if self.height == 0 {
            return Err(MalformedNode::ZeroHeight { index: self.index });
        }
        if self.base_height < 2 {
            return Err(MalformedNode::BaseTooSmall {
                index: self.index,
                base: self.base_height,
            });
        }
        let backlinks = self.backlinks.len();
        let genesis_without_links = self.is_genesis() && backlinks == 0;
        if backlinks != self.height as usize && !genesis_without_links {
            return Err(MalformedNode::BacklinkCount {
                index: self.index,
                height: self.height,
                got: self.backlinks.len(),
            });
        }
        if self.forward_links.len() > self.height as usize {
            return Err(MalformedNode::ForwardLinkCount {
                index: self.index,
                height: self.height,
                got: self.forward_links.len(),
            });
        }
        Ok(())
    }

    /// `None` past the first node of the chain, even where genesis
    /// carries placeholder backlinks.
    pub fn backlink(&self, level: usize) -> Option<NodeRef> {
        let id = *self.backlinks.get(level)?;
        let index = skip_distance(self.base_height, level).and_then(|d| self.index.checked_sub(d))?;
        Some(NodeRef::new(id, Some(index)))
    }

    pub fn forward_link(&self, level: usize) -> Option<NodeRef> {
        let link = self.forward_links.get(level)?;
        let index = skip_distance(self.base_height, level).and_then(|d| self.index.checked_add(d));
        Some(NodeRef::new(link.to, index))
    }

    /// The forward link covering the largest distance, if any.
    pub fn farthest_forward_link(&self) -> Option<NodeRef> {
        self.forward_links
            .len()
            .checked_sub(1)
            .and_then(|level| self.forward_link(level))
    }

    /// The immediate neighbour in the given direction, `None` at the end
    /// of the chain.
    pub fn successor(&self, direction: Direction) -> Option<NodeRef> {
        match direction {
            Direction::Forward => self.forward_link(0),
            Direction::Backward => self.backlink(0),
        }
    }
}
