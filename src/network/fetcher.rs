use super::{
    session::Session,
    transport::{Delivery, DeliveryStream, Page, PageRequest, Transport, TransportError},
};
use crate::node::{Direction, InvalidIdentifier, MalformedNode, Node, NodeCache, NodeId, NodeRef};
use futures::{prelude::*, ready};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;
use tracing_futures::Instrument;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid start identifier")]
    InvalidIdentifier(#[from] InvalidIdentifier),
    #[error("page size and page count must be at least 1 (got {page_size} x {page_count})")]
    InvalidArgument { page_size: u32, page_count: u32 },
    #[error("a request is already in flight on this session")]
    SessionBusy,
    #[error("data source unavailable")]
    TransportUnavailable {
        #[source]
        source: TransportError,
    },
    #[error("server reported error {code} and kept the session: {text}")]
    SoftPageError { code: u32, text: String },
    #[error("server reported error {code} and closed the session: {text}")]
    HardPageError { code: u32, text: String },
    #[error("unexpected page number: expected {expected}, received {received}")]
    UnexpectedPage { expected: u32, received: u32 },
    #[error("malformed node received")]
    MalformedNode(#[from] MalformedNode),
    #[error("node {0} was not returned by the server")]
    NodeNotFound(NodeId),
    #[error("unexpected node: requested {requested} received {received}")]
    UnexpectedNode { requested: NodeId, received: NodeId },
}

impl FetchError {
    /// Only soft page errors may be retried with smaller pages; the
    /// session survived them.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FetchError::SoftPageError { .. })
    }
}

impl From<TransportError> for FetchError {
    fn from(source: TransportError) -> Self {
        FetchError::TransportUnavailable { source }
    }
}

/// Issues paginated requests against a [`Session`].
pub struct PageFetcher<T> {
    transport: Arc<T>,
    cache: Option<NodeCache>,
}

impl<T> Clone for PageFetcher<T> {
    fn clone(&self) -> Self {
        PageFetcher {
            transport: Arc::clone(&self.transport),
            cache: self.cache.clone(),
        }
    }
}

impl<T: Transport> PageFetcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        PageFetcher {
            transport,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: NodeCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Start a paginated fetch. The pages are read from the returned
    /// stream; the session stays borrowed until the stream is done with.
    pub async fn fetch_pages<'a>(
        &self,
        session: &'a mut Session<T::Handle>,
        request: PageRequest,
    ) -> Result<PageStream<'a, T::Handle>, FetchError> {
        if request.page_size == 0 || request.page_count == 0 {
            return Err(FetchError::InvalidArgument {
                page_size: request.page_size,
                page_count: request.page_count,
            });
        }
        session.begin()?;

        let span = tracing::debug_span!(
            "fetch_pages",
            start = %request.start_id,
            page_size = request.page_size,
            page_count = request.page_count,
            direction = %request.direction(),
        );
        let deliveries = match self.open_stream(session, &request).instrument(span).await {
            Ok(deliveries) => deliveries,
            Err(err) => {
                session.discard();
                return Err(err.into());
            }
        };
        Ok(PageStream {
            session,
            inner: Some(deliveries),
            page_count: request.page_count,
            next_page: 0,
        })
    }

    /// Same as [`fetch_pages`](Self::fetch_pages) for a start identifier
    /// that has not been validated yet. A malformed identifier fails
    /// before anything is sent.
    pub async fn fetch_pages_from<'a>(
        &self,
        session: &'a mut Session<T::Handle>,
        start: &[u8],
        page_size: u32,
        page_count: u32,
        direction: Direction,
    ) -> Result<PageStream<'a, T::Handle>, FetchError> {
        let start = NodeId::try_from_slice(start)?;
        self.fetch_pages(session, PageRequest::new(start, page_size, page_count, direction))
            .await
    }

    /// Fetch and collect every page of the request.
    pub async fn fetch_all(
        &self,
        session: &mut Session<T::Handle>,
        request: PageRequest,
    ) -> Result<Vec<Page>, FetchError> {
        self.fetch_pages(session, request).await?.try_collect().await
    }

    /// Follow a reference: answer from the cache when the node was seen
    /// recently, otherwise fetch it alone.
    pub async fn resolve(
        &self,
        session: &mut Session<T::Handle>,
        node_ref: &NodeRef,
    ) -> Result<Arc<Node>, FetchError> {
        let requested = node_ref.id();
        if let Some(node) = self.cached(&requested).await {
            return Ok(node);
        }
        let request = PageRequest::new(requested, 1, 1, Direction::Forward);
        let node = self
            .fetch_all(session, request)
            .await?
            .into_iter()
            .flat_map(|page| page.nodes)
            .next()
            .ok_or(FetchError::NodeNotFound(requested))?;
        if node.id() != requested {
            return Err(FetchError::UnexpectedNode {
                requested,
                received: node.id(),
            });
        }
        let node = Arc::new(node);
        self.remember(std::slice::from_ref(&node)).await;
        Ok(node)
    }

    pub async fn cached(&self, id: &NodeId) -> Option<Arc<Node>> {
        match &self.cache {
            Some(cache) => cache.get(id).await,
            None => None,
        }
    }

    /// Keep freshly received nodes for later [`resolve`](Self::resolve) calls.
    pub async fn remember(&self, nodes: &[Arc<Node>]) {
        if let Some(cache) = &self.cache {
            for node in nodes {
                cache.insert(Arc::clone(node)).await;
            }
        }
    }

    async fn open_stream(
        &self,
        session: &mut Session<T::Handle>,
        request: &PageRequest,
    ) -> Result<DeliveryStream, TransportError> {
        if let Some(handle) = session.handle_mut() {
            match self.transport.send(handle, request).await {
                Ok(deliveries) => {
                    tracing::trace!("follow-up request sent on the existing session");
                    return Ok(deliveries);
                }
                Err(err) => {
                    tracing::debug!(
                        error = %err,
                        "existing session is not usable anymore, reconnecting"
                    );
                    session.drop_handle();
                }
            }
        }

        tracing::debug!(destination = %self.transport.destination(), "opening a new session");
        let mut handle = self.transport.connect().await?;
        let deliveries = self.transport.send(&mut handle, request).await?;
        session.install(handle);
        Ok(deliveries)
    }
}

enum Release {
    Idle,
    Discard,
}

/// The pages of one request, in page number order.
///
/// The session is marked idle again once every page arrived (or the
/// server ended the response early), and discarded on any transport
/// failure, hard page error or when the stream is dropped before the
/// response was fully read.
#[must_use = "streams do nothing unless polled"]
pub struct PageStream<'a, H> {
    session: &'a mut Session<H>,
    inner: Option<DeliveryStream>,
    page_count: u32,
    next_page: u32,
}

impl<'a, H> PageStream<'a, H> {
    fn finish(&mut self, release: Release) {
        self.inner = None;
        match release {
            Release::Idle => self.session.release(),
            Release::Discard => self.session.discard(),
        }
    }

    fn accept(&mut self, delivery: Delivery) -> Result<Page, FetchError> {
        let Delivery { page, session_open } = delivery;

        if !page.is_ok() {
            let (code, text) = (page.error_code, page.error_text);
            return if session_open {
                self.finish(Release::Idle);
                Err(FetchError::SoftPageError { code, text })
            } else {
                self.finish(Release::Discard);
                Err(FetchError::HardPageError { code, text })
            };
        }

        if page.page_number != self.next_page {
            let expected = self.next_page;
            self.finish(Release::Discard);
            return Err(FetchError::UnexpectedPage {
                expected,
                received: page.page_number,
            });
        }

        if let Err(err) = page.nodes.iter().try_for_each(Node::check_links) {
            self.finish(Release::Discard);
            return Err(err.into());
        }

        self.next_page += 1;
        if !session_open {
            self.finish(Release::Discard);
        } else if self.next_page == self.page_count {
            self.finish(Release::Idle);
        }
        Ok(page)
    }
}

impl<'a, H> Stream for PageStream<'a, H> {
    type Item = Result<Page, FetchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = Pin::into_inner(self);
        let inner = match this.inner.as_mut() {
            Some(inner) => inner,
            None => return Poll::Ready(None),
        };
        match ready!(inner.as_mut().poll_next(cx)) {
            None => {
                this.finish(Release::Idle);
                Poll::Ready(None)
            }
            Some(Err(err)) => {
                this.finish(Release::Discard);
                Poll::Ready(Some(Err(err.into())))
            }
            Some(Ok(delivery)) => Poll::Ready(Some(this.accept(delivery))),
        }
    }
}

impl<'a, H> Drop for PageStream<'a, H> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            // part of the response is still on its way
            self.session.discard();
        }
    }
}
