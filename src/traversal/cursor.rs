use crate::network::{FetchError, PageFetcher, PageRequest, Session, Transport};
use crate::node::{Direction, Node, NodeRef};
use futures::prelude::*;
use std::sync::Arc;

/// Soft errors retried in a row before the error is surfaced.
const MAX_SOFT_RETRIES: u32 = 1;

/// Sequential position on the chain, handing out the nodes one request
/// at a time.
///
/// Every request starts at the node the previous one has not returned
/// yet, so each node is produced exactly once. A "page too large" answer
/// switches the cursor to single node requests for the rest of its life
/// and the same start is asked again on a fresh session.
pub struct ChainCursor<T> {
    fetcher: PageFetcher<T>,
    next: Option<NodeRef>,
    direction: Direction,
    page_size: u32,
    page_count: u32,
    downgraded: bool,
    soft_retries: u32,
}

impl<T: Transport> ChainCursor<T> {
    pub fn new(
        fetcher: PageFetcher<T>,
        start: NodeRef,
        direction: Direction,
        page_size: u32,
        page_count: u32,
    ) -> Self {
        ChainCursor {
            fetcher,
            next: Some(start),
            direction,
            page_size,
            page_count,
            downgraded: false,
            soft_retries: 0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// the node the next batch starts with
    pub fn position(&self) -> Option<NodeRef> {
        self.next
    }

    /// true once the end of the chain was reached in the walking direction
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// true once a soft error reduced the requests to a single node
    pub fn is_downgraded(&self) -> bool {
        self.downgraded
    }

    /// An empty shape goes out unchanged for the fetcher to refuse.
    fn shape(&self, want: Option<u64>) -> (u32, u32) {
        if self.page_size == 0 || self.page_count == 0 {
            return (self.page_size, self.page_count);
        }
        let page_size = u64::from(self.page_size);
        match want {
            Some(want) if want < page_size => (want as u32, 1),
            Some(want) => {
                let pages = (want / page_size).min(u64::from(self.page_count));
                (self.page_size, pages.max(1) as u32)
            }
            None => (self.page_size, self.page_count),
        }
    }

    fn downgrade(&mut self) {
        self.page_size = 1;
        self.page_count = 1;
        self.downgraded = true;
    }

    /// Fetch the nodes of the next request, at most `want` of them.
    ///
    /// An empty batch means the chain ends here (or `want` was zero).
    pub async fn next_batch(
        &mut self,
        session: &mut Session<T::Handle>,
        want: Option<u64>,
    ) -> Result<Vec<Arc<Node>>, FetchError> {
        let start = match self.next {
            Some(start) => start,
            None => return Ok(Vec::new()),
        };
        if want == Some(0) {
            return Ok(Vec::new());
        }

        let nodes = loop {
            let (page_size, page_count) = self.shape(want);
            let request = PageRequest::new(start.id(), page_size, page_count, self.direction);
            let mut nodes = Vec::new();
            let outcome = {
                let mut pages = self.fetcher.fetch_pages(session, request).await?;
                loop {
                    match pages.next().await {
                        None => break Ok(()),
                        Some(Ok(page)) => nodes.extend(page.nodes.into_iter().map(Arc::new)),
                        Some(Err(err)) => break Err(err),
                    }
                }
            };
            match outcome {
                Ok(()) => {
                    self.soft_retries = 0;
                    break nodes;
                }
                Err(err) if err.is_recoverable() && self.soft_retries < MAX_SOFT_RETRIES => {
                    tracing::warn!(
                        error = %err,
                        page_size,
                        page_count,
                        "page refused by the server, falling back to single node pages"
                    );
                    self.soft_retries += 1;
                    self.downgrade();
                    session.discard();
                    if !nodes.is_empty() {
                        break nodes;
                    }
                }
                Err(err) => return Err(err),
            }
        };

        self.next = nodes.last().and_then(|node| node.successor(self.direction));
        self.fetcher.remember(&nodes).await;
        Ok(nodes)
    }
}
