//! Walking the chain one node at a time.
//!
//! A walk fetches the nodes in batches through a [`ChainCursor`], checks
//! every node against a [`Predicate`] in arrival order and stops at the
//! end of the chain, once enough matches were found or when its
//! cancellation token fires. Cancellation is looked at between nodes;
//! the batch in hand has been fully received by then, so the session is
//! left idle.

mod cursor;
mod progress;
mod search;

pub use self::{
    cursor::ChainCursor,
    progress::{Progress, ProgressThrottle, WalkEvent},
    search::{Match, MatchLimit, Predicate, Query, SearchState, Termination},
};

use crate::head::HeadResolver;
use crate::network::{FetchError, PageFetcher, Session, Transport};
use crate::node::{Direction, Node, NodeId, NodeRef};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing_futures::Instrument;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_PAGE_COUNT: u32 = 1;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("walk aborted after {seen} nodes")]
    Fetch {
        seen: u64,
        #[source]
        source: FetchError,
    },
}

/// What stops a walk early and who hears about it while it runs.
pub struct WalkControl<I> {
    pub limit: MatchLimit,
    pub cancel: CancellationToken,
    pub events: Option<UnboundedSender<WalkEvent<I>>>,
}

impl<I> Default for WalkControl<I> {
    fn default() -> Self {
        WalkControl {
            limit: MatchLimit::Unbounded,
            cancel: CancellationToken::new(),
            events: None,
        }
    }
}

impl<I> WalkControl<I> {
    pub fn with_limit(mut self, limit: MatchLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<WalkEvent<I>>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: WalkEvent<I>) {
        if let Some(events) = &self.events {
            // nobody listening anymore is not a reason to stop the walk
            let _ = events.send(event);
        }
    }
}

pub struct TraversalEngine<T> {
    fetcher: PageFetcher<T>,
    head: Option<HeadResolver<T>>,
    page_size: u32,
    page_count: u32,
}

impl<T: Transport> TraversalEngine<T> {
    pub fn new(fetcher: PageFetcher<T>) -> Self {
        TraversalEngine {
            fetcher,
            head: None,
            page_size: DEFAULT_PAGE_SIZE,
            page_count: DEFAULT_PAGE_COUNT,
        }
    }

    /// Forward walks look the head up once to report a percentage.
    pub fn with_head_resolver(mut self, head: HeadResolver<T>) -> Self {
        self.head = Some(head);
        self
    }

    pub fn with_page_shape(mut self, page_size: u32, page_count: u32) -> Self {
        self.page_size = page_size;
        self.page_count = page_count;
        self
    }

    /// Plain sequential retrieval from `start`, with this engine's page
    /// shape.
    pub fn cursor(&self, start: NodeRef, direction: Direction) -> ChainCursor<T> {
        ChainCursor::new(
            self.fetcher.clone(),
            start,
            direction,
            self.page_size,
            self.page_count,
        )
    }

    pub async fn walk<P: Predicate>(
        &self,
        session: &mut Session<T::Handle>,
        start: NodeId,
        direction: Direction,
        predicate: &P,
        control: &WalkControl<P::Item>,
    ) -> Result<SearchState<P::Item>, WalkError> {
        let span = tracing::debug_span!(
            "walk",
            start = %start,
            direction = %direction,
            query = %predicate.label(),
        );
        async move {
            let state = self
                .scan(session, start, direction, predicate, control)
                .await?;
            tracing::debug!(
                seen = state.seen_count,
                found = state.found,
                termination = ?state.termination,
                "walk finished"
            );
            Ok(state)
        }
        .instrument(span)
        .await
    }

    async fn scan<P: Predicate>(
        &self,
        session: &mut Session<T::Handle>,
        start: NodeId,
        direction: Direction,
        predicate: &P,
        control: &WalkControl<P::Item>,
    ) -> Result<SearchState<P::Item>, WalkError> {
        let mut state = SearchState::new(predicate.label());
        if control.limit.is_reached(0) {
            state.stop(Termination::MatchLimit);
            return Ok(state);
        }

        let mut cursor = self.cursor(NodeRef::from(start), direction);
        let mut total: Option<Option<u64>> = None;

        'walk: loop {
            if control.cancel.is_cancelled() {
                state.stop(Termination::Cancelled);
                break;
            }
            let batch = cursor
                .next_batch(session, None)
                .await
                .map_err(|source| WalkError::Fetch {
                    seen: state.seen_count,
                    source,
                })?;
            let first = match batch.first() {
                Some(first) => first,
                None => {
                    state.stop(Termination::EndOfChain);
                    break;
                }
            };
            if total.is_none() {
                total = Some(self.walk_length(first, direction).await);
            }
            let total = total.flatten();

            for node in batch {
                if control.cancel.is_cancelled() {
                    state.stop(Termination::Cancelled);
                    break 'walk;
                }
                state.seen_count += 1;
                if let Some(item) = predicate.matches(&node) {
                    state.found += 1;
                    let found = Match { node, item };
                    control.emit(WalkEvent::Match(found.clone()));
                    state.matches.push(found);
                }
                control.emit(WalkEvent::Progress(Progress::new(
                    state.seen_count,
                    total,
                    state.found,
                )));
                if control.limit.is_reached(state.found) {
                    state.stop(Termination::MatchLimit);
                    break 'walk;
                }
            }

            if cursor.is_exhausted() {
                state.stop(Termination::EndOfChain);
                break;
            }
        }
        Ok(state)
    }

    /// Number of nodes from `start` to the end of the chain in the given
    /// direction, when it can be known.
    async fn walk_length(&self, start: &Node, direction: Direction) -> Option<u64> {
        match direction {
            Direction::Backward => Some(start.index + 1),
            Direction::Forward => {
                let head = self.head.as_ref()?;
                let mut session = Session::new();
                match head.resolve_head(&mut session, Some(start.id())).await {
                    Ok(head) => Some(head.index.saturating_sub(start.index) + 1),
                    Err(err) => {
                        tracing::info!(
                            error = %err,
                            "cannot find the head, progress reported as a count"
                        );
                        None
                    }
                }
            }
        }
    }
}

impl<T> Clone for TraversalEngine<T> {
    fn clone(&self) -> Self {
        TraversalEngine {
            fetcher: self.fetcher.clone(),
            head: self.head.clone(),
            page_size: self.page_size,
            page_count: self.page_count,
        }
    }
}
