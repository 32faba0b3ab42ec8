#![allow(dead_code)]

use skipchain_explorer::{
    frontier::LoaderEvent,
    head::HeadResolver,
    mock::MockChain,
    network::PageFetcher,
    node::{Instruction, InstructionKind, Node},
    traversal::{TraversalEngine, WalkEvent},
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub fn fetcher(chain: &MockChain) -> PageFetcher<MockChain> {
    PageFetcher::new(Arc::new(chain.clone()))
}

pub fn engine(chain: &MockChain) -> TraversalEngine<MockChain> {
    let fetcher = fetcher(chain);
    let head = HeadResolver::new(fetcher.clone(), chain.genesis_id());
    TraversalEngine::new(fetcher).with_head_resolver(head)
}

pub fn node_at(chain: &MockChain, index: u64) -> Arc<Node> {
    Arc::new(chain.node(index).expect("node in the chain"))
}

pub fn invoke(instance: &str, contract: &str) -> Instruction {
    Instruction {
        instance_id: instance.parse().expect("hex instance id"),
        kind: InstructionKind::Invoke {
            contract_id: contract.to_owned(),
            command: "update".to_owned(),
        },
    }
}

pub fn every_node(node: &Node) -> Option<u64> {
    Some(node.index)
}

pub async fn drain<I>(mut events: UnboundedReceiver<WalkEvent<I>>) -> Vec<WalkEvent<I>> {
    let mut all = Vec::new();
    while let Some(event) = events.recv().await {
        all.push(event);
    }
    all
}

/// indices of every node loaded, in event order
pub fn loaded(events: &[LoaderEvent]) -> Vec<u64> {
    events
        .iter()
        .flat_map(|event| match event {
            LoaderEvent::NodesLoaded { nodes, .. } => nodes.iter().map(|n| n.index).collect(),
            _ => Vec::new(),
        })
        .collect()
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}
