mod common;

use common::{loaded, node_at};
use futures::prelude::*;
use skipchain_explorer::{
    frontier::{
        Bounds, FrontierConfig, FrontierLoader, FrontierRegistry, LoaderEvent, Neighbours, Side,
        ViewportTransform,
    },
    mock::MockChain,
    network::PageFetcher,
    traversal::TraversalEngine,
    utils::async_msg,
};
use std::{collections::HashSet, sync::Arc, time::Duration};

fn engine(chain: &MockChain) -> TraversalEngine<MockChain> {
    TraversalEngine::new(PageFetcher::new(Arc::new(chain.clone())))
}

/// the default geometry at half scale shows 21 nodes starting at `first`
fn showing_from(first: u64) -> ViewportTransform {
    ViewportTransform {
        pan_x: -(first as f64) * 55.0,
        pan_y: 0.0,
        scale: 0.5,
    }
}

async fn open(
    chain: &MockChain,
    registry: &FrontierRegistry,
    center: u64,
    bounds: Bounds,
    neighbours: Neighbours,
) -> (FrontierLoader<MockChain>, Vec<LoaderEvent>) {
    FrontierLoader::open(
        engine(chain),
        registry.clone(),
        node_at(chain, center),
        bounds,
        neighbours,
        FrontierConfig::default(),
    )
    .await
}

#[tokio::test]
async fn neighbours_meet_without_gap_or_overlap() {
    let chain = MockChain::builder().length(200).build();
    let registry = FrontierRegistry::new();
    let bounds = Bounds { left: 5, right: 5 };
    let (mut west, west_boot) = open(&chain, &registry, 40, bounds, Neighbours::default()).await;
    let (mut east, east_boot) = open(
        &chain,
        &registry,
        60,
        bounds,
        Neighbours {
            left: Some(west.id()),
            right: None,
        },
    )
    .await;
    assert_eq!(registry.neighbours(west.id()).await, (None, Some(east.id())));

    // 40..=61 on screen: both loaders see the gap between them
    let transform = showing_from(40);
    let (west_events, east_events) =
        future::join(west.evaluate(transform), east.evaluate(transform)).await;

    assert_eq!(west.right().extent() + 1, east.left().extent());

    let mut all: Vec<u64> = vec![40, 60];
    for events in &[west_boot, east_boot, west_events, east_events] {
        all.extend(loaded(events));
    }
    let distinct: HashSet<u64> = all.iter().copied().collect();
    assert_eq!(distinct.len(), all.len(), "an index was loaded twice");
    all.sort_unstable();
    let low = west.left().extent();
    let high = east.right().extent();
    assert_eq!(all, (low..=high).collect::<Vec<_>>());

    west.close().await;
    assert_eq!(registry.neighbours(east.id()).await, (None, None));
}

#[tokio::test]
async fn closed_neighbour_releases_its_range() {
    let chain = MockChain::builder().length(100).build();
    let registry = FrontierRegistry::new();
    let (west, _) = open(&chain, &registry, 30, Bounds::default(), Neighbours::default()).await;
    let (mut east, _) = open(
        &chain,
        &registry,
        32,
        Bounds::default(),
        Neighbours {
            left: Some(west.id()),
            right: None,
        },
    )
    .await;

    // 11..=32 on screen
    let transform = showing_from(11);
    let events = east.evaluate(transform).await;
    assert_eq!(loaded(&events), vec![31]);
    assert_eq!(east.left().extent(), 31);

    west.close().await;
    let events = east.evaluate(transform).await;
    assert_eq!(loaded(&events), (11..=30).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn burst_of_viewport_events_is_evaluated_once() {
    tokio::time::pause();
    let chain = MockChain::builder().length(100).build();
    let registry = FrontierRegistry::new();
    let (mut loader, _) = open(
        &chain,
        &registry,
        50,
        Bounds { left: 2, right: 2 },
        Neighbours::default(),
    )
    .await;

    let (mut viewport_box, viewport_queue) = async_msg::channel(16);
    let (event_box, event_queue) = async_msg::channel(256);
    let driver = async move {
        for step in 0..10 {
            viewport_box
                .send(showing_from(40 + step % 2))
                .await
                .unwrap();
            tokio::time::advance(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    };
    future::join(loader.run(viewport_queue, event_box), driver).await;

    assert_eq!(loader.evaluations(), 1);
    let events: Vec<LoaderEvent> = event_queue.collect().await;
    assert!(events.iter().any(|e| matches!(
        e,
        LoaderEvent::NodesLoaded {
            side: Side::Left,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        LoaderEvent::NodesLoaded {
            side: Side::Right,
            ..
        }
    )));
    assert!(loader.left().extent() <= 41);
    assert!(loader.right().extent() >= 61);
}

#[tokio::test]
async fn end_of_chain_is_reported_once_the_head_is_shown() {
    let chain = MockChain::builder().length(30).build();
    let registry = FrontierRegistry::new();
    let (mut loader, _) = open(&chain, &registry, 20, Bounds::default(), Neighbours::default()).await;

    let events = loader.evaluate(showing_from(15)).await;
    assert_eq!(loader.right().extent(), 29);
    let head = events.iter().find_map(|event| match event {
        LoaderEvent::EndOfChain { head, .. } => Some(head.index),
        _ => None,
    });
    assert_eq!(head, Some(29));
    assert!(loader.is_done(Side::Right));

    chain.append(10);
    let requests = chain.stats().requests.len();
    assert!(loader.evaluate(showing_from(25)).await.is_empty());
    assert_eq!(chain.stats().requests.len(), requests);
}
