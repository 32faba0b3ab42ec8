//! Locating the current head of the chain.

use crate::network::{FetchError, PageFetcher, PageRequest, Session, Transport};
use crate::node::{Direction, Node, NodeId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum HeadError {
    #[error("cannot fetch node {candidate} while looking for the head")]
    Fetch {
        candidate: NodeId,
        #[source]
        source: FetchError,
    },
    #[error("forward link of node {from} leads back to index {to}")]
    NotAscending { from: u64, to: u64 },
}

/// Finds the last node of the chain by following the farthest forward
/// link of each node until a node without forward links is reached.
///
/// Nodes are always fetched anew: forward links are added to a node as
/// the chain grows, so a copy fetched earlier may be stale. The head
/// found last is remembered as the starting point of the next lookup.
pub struct HeadResolver<T> {
    fetcher: PageFetcher<T>,
    genesis: NodeId,
    last_head: Arc<Mutex<Option<NodeId>>>,
}

impl<T> Clone for HeadResolver<T> {
    fn clone(&self) -> Self {
        HeadResolver {
            fetcher: self.fetcher.clone(),
            genesis: self.genesis,
            last_head: Arc::clone(&self.last_head),
        }
    }
}

impl<T: Transport> HeadResolver<T> {
    pub fn new(fetcher: PageFetcher<T>, genesis: NodeId) -> Self {
        HeadResolver {
            fetcher,
            genesis,
            last_head: Arc::new(Mutex::new(None)),
        }
    }

    pub fn genesis(&self) -> NodeId {
        self.genesis
    }

    /// the head found by the previous lookup
    pub async fn last_head(&self) -> Option<NodeId> {
        *self.last_head.lock().await
    }

    #[tracing::instrument(skip(self, session), fields(hops = tracing::field::Empty))]
    pub async fn resolve_head(
        &self,
        session: &mut Session<T::Handle>,
        hint: Option<NodeId>,
    ) -> Result<Arc<Node>, HeadError> {
        let mut candidate = match hint {
            Some(hint) => hint,
            None => self.last_head().await.unwrap_or(self.genesis),
        };
        let mut previous: Option<u64> = None;
        let mut hops = 0u32;

        loop {
            let node = self
                .fetch_one(session, candidate)
                .await
                .map_err(|source| HeadError::Fetch { candidate, source })?;
            if let Some(from) = previous {
                if node.index <= from {
                    return Err(HeadError::NotAscending {
                        from,
                        to: node.index,
                    });
                }
            }
            hops += 1;

            match node.farthest_forward_link() {
                Some(link) => {
                    previous = Some(node.index);
                    candidate = link.id();
                }
                None => {
                    tracing::Span::current().record("hops", &hops);
                    tracing::debug!(index = node.index, head = %node.hash, "head found");
                    *self.last_head.lock().await = Some(node.id());
                    let node = Arc::new(node);
                    self.fetcher.remember(std::slice::from_ref(&node)).await;
                    return Ok(node);
                }
            }
        }
    }

    async fn fetch_one(
        &self,
        session: &mut Session<T::Handle>,
        id: NodeId,
    ) -> Result<Node, FetchError> {
        let request = PageRequest::new(id, 1, 1, Direction::Forward);
        let node = self
            .fetcher
            .fetch_all(session, request)
            .await?
            .into_iter()
            .flat_map(|page| page.nodes)
            .next()
            .ok_or(FetchError::NodeNotFound(id))?;
        if node.id() != id {
            return Err(FetchError::UnexpectedNode {
                requested: id,
                received: node.id(),
            });
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;

    fn resolver(chain: &MockChain) -> HeadResolver<MockChain> {
        HeadResolver::new(PageFetcher::new(Arc::new(chain.clone())), chain.genesis_id())
    }

    #[tokio::test]
    async fn head_is_found_in_few_hops() {
        let chain = MockChain::builder().length(100).base(2).max_height(7).build();
        let resolver = resolver(&chain);
        let mut session = Session::new();
        let head = resolver.resolve_head(&mut session, None).await.unwrap();
        assert_eq!(head.index, 99);
        assert!(head.forward_links.is_empty());
        assert!(chain.stats().requests.len() < 20);
        assert_eq!(chain.stats().connects, 1);
    }

    #[tokio::test]
    async fn growing_chain_is_followed_from_the_last_head() {
        let chain = MockChain::builder().length(10).build();
        let resolver = resolver(&chain);
        let mut session = Session::new();
        let first = resolver.resolve_head(&mut session, None).await.unwrap();
        chain.append(5);
        let before = chain.stats().requests.len();
        let second = resolver.resolve_head(&mut session, None).await.unwrap();
        assert_eq!(second.index, 14);
        assert_eq!(chain.stats().requests[before].start_id, first.hash);
    }

    #[tokio::test]
    async fn unknown_hint_is_an_error() {
        let chain = MockChain::builder().length(3).build();
        let resolver = resolver(&chain);
        let mut session = Session::new();
        let err = resolver
            .resolve_head(&mut session, Some(NodeId::from_bytes([7; 32])))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HeadError::Fetch {
                source: FetchError::HardPageError { .. },
                ..
            }
        ));
        assert!(!session.is_busy());
    }
}
