#[macro_use]
extern crate quickcheck;

mod common;

use common::{fetcher, runtime};
use quickcheck::TestResult;
use skipchain_explorer::{
    head::{HeadError, HeadResolver},
    mock::MockChain,
    network::{FetchError, Session},
};

#[tokio::test]
async fn resolving_from_the_head_gives_the_head() {
    let chain = MockChain::builder().length(77).build();
    let resolver = HeadResolver::new(fetcher(&chain), chain.genesis_id());
    let mut session = Session::new();

    let head = resolver.resolve_head(&mut session, None).await.unwrap();
    assert_eq!(head.index, 76);
    assert!(head.forward_links.is_empty());

    let again = resolver
        .resolve_head(&mut session, Some(head.id()))
        .await
        .unwrap();
    assert_eq!(again, head);
    assert_eq!(resolver.last_head().await, Some(head.id()));
}

#[tokio::test]
async fn lookup_takes_far_fewer_requests_than_nodes() {
    let chain = MockChain::builder().length(1000).max_height(10).build();
    let resolver = HeadResolver::new(fetcher(&chain), chain.genesis_id());
    let mut session = Session::new();
    let head = resolver.resolve_head(&mut session, None).await.unwrap();
    assert_eq!(head.index, 999);
    let requests = chain.stats().requests;
    assert!(requests.len() <= 20, "{} requests", requests.len());
    assert!(requests.iter().all(|r| r.page_size == 1 && r.page_count == 1));
    assert_eq!(chain.stats().connects, 1);
}

#[tokio::test]
async fn transport_failure_aborts_the_lookup() {
    let chain = MockChain::builder().length(40).build();
    let resolver = HeadResolver::new(fetcher(&chain), chain.genesis_id());
    let mut session = Session::new();
    chain.refuse_connects(2);
    let err = resolver.resolve_head(&mut session, None).await.unwrap_err();
    assert!(matches!(
        err,
        HeadError::Fetch {
            source: FetchError::TransportUnavailable { .. },
            ..
        }
    ));
    assert!(resolver.last_head().await.is_none());
    assert!(!session.is_busy());
}

quickcheck! {
    fn head_is_the_last_node(length: u16, grow: u8) -> TestResult {
        let length = u64::from(length % 400) + 1;
        let chain = MockChain::builder().length(length).build();
        let resolver = HeadResolver::new(fetcher(&chain), chain.genesis_id());
        let (first, second) = runtime().block_on(async {
            let mut session = Session::new();
            let first = resolver.resolve_head(&mut session, None).await.map(|h| h.index);
            chain.append(u64::from(grow));
            let second = resolver.resolve_head(&mut session, None).await.map(|h| h.index);
            (first, second)
        });
        TestResult::from_bool(
            first.ok() == Some(length - 1)
                && second.ok() == Some(length - 1 + u64::from(grow)),
        )
    }
}
