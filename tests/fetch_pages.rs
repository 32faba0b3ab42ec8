#[macro_use]
extern crate quickcheck;

mod common;

use common::{engine, fetcher, runtime};
use quickcheck::TestResult;
use skipchain_explorer::{
    mock::MockChain,
    network::{FetchError, PageRequest, Session, CODE_TOO_MANY_NODES, CODE_UNKNOWN_START},
    node::{Direction, InvalidIdentifier, NodeId},
    traversal::{Termination, WalkControl},
};

#[tokio::test]
async fn first_page_from_genesis() {
    let chain = MockChain::builder().length(10).max_height(1).build();
    let mut session = Session::new();
    let request = PageRequest::new(chain.genesis_id(), 2, 1, Direction::Forward);
    let pages = fetcher(&chain).fetch_all(&mut session, request).await.unwrap();

    assert_eq!(pages.len(), 1);
    let page = &pages[0];
    assert_eq!(page.error_code, 0);
    assert_eq!(page.page_number, 0);
    assert_eq!(page.nodes[0].height, 1);
    let indices: Vec<u64> = page.nodes.iter().map(|node| node.index).collect();
    assert_eq!(indices, vec![0, 1]);
}

quickcheck! {
    fn page_numbers_have_no_gaps(page_size: u8, page_count: u8, backward: bool) -> TestResult {
        let page_size = u32::from(page_size % 8) + 1;
        let page_count = u32::from(page_count % 6) + 1;
        let chain = MockChain::builder().length(100).build();
        let start = if backward { chain.id_at(99) } else { chain.id_at(0) };
        let request = PageRequest::new(
            start.unwrap(),
            page_size,
            page_count,
            Direction::from_backward(backward),
        );
        let pages = runtime()
            .block_on(async {
                let mut session = Session::new();
                let pages = fetcher(&chain).fetch_all(&mut session, request).await;
                pages
            })
            .unwrap();
        let numbers: Vec<u32> = pages.iter().map(|page| page.page_number).collect();
        TestResult::from_bool(numbers == (0..page_count).collect::<Vec<_>>())
    }
}

#[tokio::test]
async fn malformed_start_is_refused_before_connecting() {
    let chain = MockChain::builder().length(4).build();
    let mut session = Session::new();
    let result = fetcher(&chain)
        .fetch_pages_from(&mut session, &[0xab, 0x12], 1, 1, Direction::Forward)
        .await;
    assert!(matches!(
        result,
        Err(FetchError::InvalidIdentifier(InvalidIdentifier::InvalidSize {
            got: 2,
            ..
        }))
    ));
    drop(result);
    let stats = chain.stats();
    assert_eq!(stats.connects, 0);
    assert!(stats.requests.is_empty());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn idle_session_is_reused() {
    let chain = MockChain::builder().length(30).build();
    let fetcher = fetcher(&chain);
    let mut session = Session::new();
    for index in &[0, 10, 20] {
        let request = PageRequest::new(chain.id_at(*index).unwrap(), 5, 2, Direction::Forward);
        let pages = fetcher.fetch_all(&mut session, request).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(!session.is_busy());
    }
    let stats = chain.stats();
    assert_eq!(stats.connects, 1);
    assert_eq!(stats.requests.len(), 3);
    assert_eq!(session.requests(), 3);
}

#[tokio::test]
async fn broken_session_is_replaced() {
    let chain = MockChain::builder().length(30).build();
    let fetcher = fetcher(&chain);
    let mut session = Session::new();
    let request = PageRequest::new(chain.genesis_id(), 3, 1, Direction::Forward);
    fetcher.fetch_all(&mut session, request.clone()).await.unwrap();

    chain.drop_sessions();
    fetcher.fetch_all(&mut session, request).await.unwrap();
    assert_eq!(chain.stats().connects, 2);
}

#[tokio::test]
async fn unknown_start_is_a_hard_error() {
    let chain = MockChain::builder().length(8).build();
    let mut session = Session::new();
    let request = PageRequest::new(NodeId::from_bytes([0xff; 32]), 4, 1, Direction::Forward);
    let err = fetcher(&chain)
        .fetch_all(&mut session, request)
        .await
        .unwrap_err();
    match err {
        FetchError::HardPageError { code, .. } => assert_eq!(code, CODE_UNKNOWN_START),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!session.is_busy());
    assert!(!session.is_connected());
}

#[tokio::test]
async fn oversized_page_keeps_the_session() {
    let chain = MockChain::builder().length(120).max_page_size(50).build();
    let mut session = Session::new();
    let request = PageRequest::new(chain.genesis_id(), 100, 1, Direction::Forward);
    let err = fetcher(&chain)
        .fetch_all(&mut session, request)
        .await
        .unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(err, FetchError::SoftPageError { code, .. } if code == CODE_TOO_MANY_NODES));
    assert!(session.is_connected());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn oversized_page_is_asked_again_one_node_at_a_time() {
    let chain = MockChain::builder().length(60).max_page_size(50).build();
    let mut session = Session::new();
    let state = engine(&chain)
        .with_page_shape(100, 1)
        .walk(
            &mut session,
            chain.genesis_id(),
            Direction::Forward,
            &common::every_node,
            &WalkControl::default(),
        )
        .await
        .unwrap();

    assert_eq!(state.seen_count, 60);
    let found: Vec<u64> = state.matches.iter().map(|m| m.item).collect();
    assert_eq!(found, (0..60).collect::<Vec<_>>());

    let requests = chain.stats().requests;
    let oversized = requests.iter().filter(|r| r.page_size == 100).count();
    assert_eq!(oversized, 1);
    assert_eq!(requests[0].page_size, 100);
    assert_eq!(requests[1].start_id, requests[0].start_id);
    assert_eq!((requests[1].page_size, requests[1].page_count), (1, 1));
}

#[tokio::test]
async fn genesis_with_backlinks_is_accepted() {
    let chain = MockChain::builder()
        .length(12)
        .max_height(3)
        .genesis_backlinks(true)
        .build();
    assert_eq!(chain.node(0).unwrap().backlinks.len(), 3);

    let mut session = Session::new();
    let request = PageRequest::new(chain.genesis_id(), 4, 3, Direction::Forward);
    let pages = fetcher(&chain).fetch_all(&mut session, request).await.unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0].nodes[0].index, 0);

    let state = engine(&chain)
        .with_page_shape(2, 2)
        .walk(
            &mut session,
            chain.id_at(5).unwrap(),
            Direction::Backward,
            &common::every_node,
            &WalkControl::default(),
        )
        .await
        .unwrap();
    assert_eq!(state.seen_count, 6);
    assert_eq!(state.termination, Termination::EndOfChain);
}
