//! An in-memory data source.
//!
//! [`MockChain`] serves paginated requests from a generated skipchain the
//! same way the remote node does, including its error pages and session
//! handling. It backs the `mock` source of the command line and the tests.
//! Faults can be injected to exercise the recovery paths.

mod chain;

use self::chain::Chain;
use crate::network::{
    Delivery, DeliveryStream, Page, PageRequest, Transport, TransportError, CODE_INVALID_ARGUMENT,
    CODE_TOO_MANY_NODES, CODE_UNKNOWN_START,
};
use crate::node::{Direction, Instruction, Node, NodeId, NODE_ID_SIZE};
use async_trait::async_trait;
use futures::prelude::*;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

pub const DEFAULT_BASE: u32 = 2;
pub const DEFAULT_MAX_HEIGHT: u32 = 4;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    /// sessions opened so far
    pub connects: u64,
    /// every request that reached the server, in arrival order
    pub requests: Vec<PageRequest>,
}

#[derive(Default)]
struct Faults {
    refuse_connects: u32,
    fail_sends: u32,
    close_on_soft_error: bool,
    latency: Option<Duration>,
}

struct State {
    chain: Chain,
    max_page_size: u32,
    sessions: HashSet<u64>,
    next_session: u64,
    faults: Faults,
    stats: MockStats,
}

pub struct MockChainBuilder {
    length: u64,
    base: u32,
    max_height: u32,
    max_page_size: u32,
    seed: u64,
    genesis_backlinks: bool,
    planted: Vec<(u64, Instruction)>,
}

impl Default for MockChainBuilder {
    fn default() -> Self {
        MockChainBuilder {
            length: 1,
            base: DEFAULT_BASE,
            max_height: DEFAULT_MAX_HEIGHT,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            seed: 0,
            genesis_backlinks: false,
            planted: Vec::new(),
        }
    }
}

impl MockChainBuilder {
    /// number of nodes, genesis included
    pub fn length(mut self, length: u64) -> Self {
        self.length = length.max(1);
        self
    }

    pub fn base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    pub fn max_height(mut self, max_height: u32) -> Self {
        self.max_height = max_height;
        self
    }

    /// larger pages are refused with a "too many nodes" error page
    pub fn max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// give genesis a full set of backlinks, all pointing at itself
    pub fn genesis_backlinks(mut self, genesis_backlinks: bool) -> Self {
        self.genesis_backlinks = genesis_backlinks;
        self
    }

    pub fn instruction_at(mut self, index: u64, instruction: Instruction) -> Self {
        self.planted.push((index, instruction));
        self
    }

    pub fn build(self) -> MockChain {
        let mut chain = Chain::new(self.base, self.max_height, self.seed);
        if self.genesis_backlinks {
            chain.link_genesis_to_itself();
        }
        for (index, instruction) in self.planted {
            chain.plant(index, instruction);
        }
        for _ in 0..self.length {
            chain.append();
        }
        MockChain {
            state: Arc::new(Mutex::new(State {
                chain,
                max_page_size: self.max_page_size,
                sessions: HashSet::new(),
                next_session: 0,
                faults: Faults::default(),
                stats: MockStats::default(),
            })),
        }
    }
}

/// A generated skipchain answering page requests.
///
/// Cloning gives another handle on the same chain.
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<State>>,
}

/// Identifies a session opened on a [`MockChain`].
pub struct MockSession {
    id: u64,
}

impl MockChain {
    pub fn builder() -> MockChainBuilder {
        MockChainBuilder::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // the state is only touched by short non panicking sections
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> u64 {
        self.lock().chain.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.lock().chain.is_empty()
    }

    pub fn node(&self, index: u64) -> Option<Node> {
        self.lock().chain.get(index).cloned()
    }

    pub fn id_at(&self, index: u64) -> Option<NodeId> {
        self.lock().chain.get(index).map(Node::id)
    }

    pub fn genesis_id(&self) -> NodeId {
        self.id_at(0).unwrap_or_else(|| NodeId::from_bytes([0; NODE_ID_SIZE]))
    }

    pub fn head(&self) -> Option<Node> {
        self.lock().chain.head().cloned()
    }

    /// Grow the chain by `count` nodes, filling in the forward links of
    /// the nodes already there.
    pub fn append(&self, count: u64) {
        let mut state = self.lock();
        for _ in 0..count {
            state.chain.append();
        }
    }

    pub fn plant(&self, index: u64, instruction: Instruction) {
        self.lock().chain.plant(index, instruction);
    }

    pub fn stats(&self) -> MockStats {
        self.lock().stats.clone()
    }

    /// The next `count` connection attempts fail.
    pub fn refuse_connects(&self, count: u32) {
        self.lock().faults.refuse_connects = count;
    }

    /// The next `count` requests fail to send and kill their session.
    pub fn fail_sends(&self, count: u32) {
        self.lock().faults.fail_sends = count;
    }

    /// Report "too many nodes" with the session closed instead of kept.
    pub fn close_on_soft_error(&self, close: bool) {
        self.lock().faults.close_on_soft_error = close;
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().faults.latency = latency;
    }

    /// Forget every open session, as a restarting server would.
    pub fn drop_sessions(&self) {
        self.lock().sessions.clear();
    }
}

impl State {
    fn serve(&mut self, session: u64, request: &PageRequest) -> Result<Vec<Delivery>, TransportError> {
        if !self.sessions.contains(&session) {
            return Err(TransportError::SessionClosed);
        }
        self.stats.requests.push(request.clone());

        if self.faults.fail_sends > 0 {
            self.faults.fail_sends -= 1;
            self.sessions.remove(&session);
            return Err(TransportError::Send("injected send failure".into()));
        }

        let backward = request.backward;
        if request.page_size == 0 || request.page_count == 0 {
            return Ok(vec![Delivery {
                page: Page::error(0, CODE_INVALID_ARGUMENT, "empty page requested", backward),
                session_open: true,
            }]);
        }
        if request.page_size > self.max_page_size {
            let session_open = !self.faults.close_on_soft_error;
            if !session_open {
                self.sessions.remove(&session);
            }
            return Ok(vec![Delivery {
                page: Page::error(0, CODE_TOO_MANY_NODES, "too many nodes requested", backward),
                session_open,
            }]);
        }
        let mut position = match self.chain.position(&request.start_id) {
            Some(position) => position,
            None => {
                self.sessions.remove(&session);
                return Ok(vec![Delivery {
                    page: Page::error(0, CODE_UNKNOWN_START, "unknown start node", backward),
                    session_open: false,
                }]);
            }
        };

        let direction = request.direction();
        let mut deliveries = Vec::new();
        for page_number in 0..request.page_count {
            let nodes = self
                .chain
                .walk(position, request.page_size as usize, direction);
            let last = match nodes.last() {
                Some(last) => last.index as usize,
                None => break,
            };
            let full = nodes.len() == request.page_size as usize;
            deliveries.push(Delivery {
                page: Page {
                    page_number,
                    nodes,
                    error_code: 0,
                    error_text: String::new(),
                    backward,
                },
                session_open: true,
            });
            let next = match direction {
                Direction::Forward => Some(last + 1).filter(|n| *n < self.chain.len()),
                Direction::Backward => last.checked_sub(1),
            };
            match next {
                Some(next) if full => position = next,
                _ => break,
            }
        }
        Ok(deliveries)
    }
}

#[async_trait]
impl Transport for MockChain {
    type Handle = MockSession;

    fn destination(&self) -> String {
        "mock".to_owned()
    }

    async fn connect(&self) -> Result<MockSession, TransportError> {
        let mut state = self.lock();
        if state.faults.refuse_connects > 0 {
            state.faults.refuse_connects -= 1;
            return Err(TransportError::Connect {
                destination: self.destination(),
                source: "connection refused".into(),
            });
        }
        let id = state.next_session;
        state.next_session += 1;
        state.sessions.insert(id);
        state.stats.connects += 1;
        Ok(MockSession { id })
    }

    async fn send(
        &self,
        handle: &mut MockSession,
        request: &PageRequest,
    ) -> Result<DeliveryStream, TransportError> {
        let (deliveries, latency) = {
            let mut state = self.lock();
            (state.serve(handle.id, request)?, state.faults.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(stream::iter(deliveries.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn send(chain: &MockChain, request: PageRequest) -> Result<Vec<Delivery>, TransportError> {
        let mut session = chain.connect().await?;
        chain.send(&mut session, &request).await?.try_collect().await
    }

    #[tokio::test]
    async fn pages_are_cut_at_the_chain_end() {
        let chain = MockChain::builder().length(7).build();
        let request = PageRequest::new(chain.genesis_id(), 3, 5, Direction::Forward);
        let deliveries = send(&chain, request).await.unwrap();
        let sizes: Vec<usize> = deliveries.iter().map(|d| d.page.nodes.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        let numbers: Vec<u32> = deliveries.iter().map(|d| d.page.page_number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn unknown_start_closes_the_session() {
        let chain = MockChain::builder().length(3).build();
        let request = PageRequest::new(NodeId::from_bytes([9; 32]), 1, 1, Direction::Forward);
        let deliveries = send(&chain, request).await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].page.error_code, CODE_UNKNOWN_START);
        assert!(!deliveries[0].session_open);
    }

    #[tokio::test]
    async fn oversized_page_is_a_soft_error() {
        let chain = MockChain::builder().length(3).max_page_size(2).build();
        let request = PageRequest::new(chain.genesis_id(), 3, 1, Direction::Forward);
        let deliveries = send(&chain, request).await.unwrap();
        assert_eq!(deliveries[0].page.error_code, CODE_TOO_MANY_NODES);
        assert!(deliveries[0].session_open);
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let chain = MockChain::builder().build();
        chain.refuse_connects(1);
        assert!(matches!(
            chain.connect().await,
            Err(TransportError::Connect { .. })
        ));
        assert!(chain.connect().await.is_ok());
        assert_eq!(chain.stats().connects, 1);
    }
}
