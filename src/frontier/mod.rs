//! Viewport driven loading of the chain around a node.
//!
//! A [`FrontierLoader`] holds a contiguous run of nodes around its center
//! and grows it on either side when the viewport shows room past what is
//! loaded. Loaders placed next to each other share a
//! [`FrontierRegistry`] and never fetch an index the neighbour holds.
//! Viewport events are debounced: only a quiet period after the last
//! event leads to a load decision.

mod debounce;
mod registry;
mod viewport;

pub use self::{
    debounce::Debouncer,
    registry::{Claim, Claims, FrontierRegistry, LoaderId, Reservation, Side},
    viewport::{Geometry, ParseTransformError, ViewportTransform, VisibleRange},
};

use crate::network::{FetchError, Session, Transport};
use crate::node::Node;
use crate::traversal::TraversalEngine;
use crate::utils::async_msg::{MessageBox, MessageQueue};
use futures::prelude::*;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::{sleep_until, Instant};

pub const DEFAULT_BATCH_SIZE: u64 = 20;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct FrontierConfig {
    /// most nodes fetched by a single load
    pub batch_size: u64,
    pub debounce: Duration,
    pub geometry: Geometry,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        FrontierConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            geometry: Geometry::default(),
        }
    }
}

/// How many nodes to load on each side of the center right away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub left: u64,
    pub right: u64,
}

/// Loaders directly left and right of a new one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighbours {
    pub left: Option<LoaderId>,
    pub right: Option<LoaderId>,
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("cannot load the {side} side of {loader}")]
    Fetch {
        loader: LoaderId,
        side: Side,
        #[source]
        source: FetchError,
    },
}

/// What a loader reports to whoever displays the nodes.
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    NodesLoaded {
        loader: LoaderId,
        side: Side,
        nodes: Vec<Arc<Node>>,
    },
    GenesisReached {
        loader: LoaderId,
    },
    EndOfChain {
        loader: LoaderId,
        head: Arc<Node>,
    },
    LoadFailed {
        loader: LoaderId,
        side: Side,
        error: Arc<LoaderError>,
    },
}

/// The outermost node loaded on one side.
#[derive(Debug, Clone)]
pub struct Frontier {
    boundary: Arc<Node>,
}

impl Frontier {
    pub fn boundary(&self) -> &Arc<Node> {
        &self.boundary
    }

    pub fn extent(&self) -> u64 {
        self.boundary.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideState {
    Open,
    /// a load failed, waiting for the next viewport event
    Suspended,
    /// genesis or the head was reached
    Done,
}

pub struct FrontierLoader<T: Transport> {
    id: LoaderId,
    engine: TraversalEngine<T>,
    registry: FrontierRegistry,
    session: Session<T::Handle>,
    config: FrontierConfig,
    left: Frontier,
    right: Frontier,
    left_state: SideState,
    right_state: SideState,
    debouncer: Debouncer,
    transform: Option<ViewportTransform>,
    evaluations: u64,
}

impl<T: Transport> FrontierLoader<T> {
    /// Register a loader around `center` and load `bounds` nodes on each
    /// side of it. The events of that first load are returned along with
    /// the loader.
    pub async fn open(
        engine: TraversalEngine<T>,
        registry: FrontierRegistry,
        center: Arc<Node>,
        bounds: Bounds,
        neighbours: Neighbours,
        config: FrontierConfig,
    ) -> (Self, Vec<LoaderEvent>) {
        let id = registry
            .register(center.index, neighbours.left, neighbours.right)
            .await;
        tracing::debug!(loader = %id, center = center.index, "frontier loader registered");
        let mut loader = FrontierLoader {
            id,
            engine,
            registry,
            session: Session::new(),
            debouncer: Debouncer::new(config.debounce),
            config,
            left: Frontier {
                boundary: Arc::clone(&center),
            },
            right: Frontier { boundary: center },
            left_state: SideState::Open,
            right_state: SideState::Open,
            transform: None,
            evaluations: 0,
        };
        let events = loader.bootstrap(bounds).await;
        (loader, events)
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn left(&self) -> &Frontier {
        &self.left
    }

    pub fn right(&self) -> &Frontier {
        &self.right
    }

    /// number of load decisions taken after a quiet period
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// true once nothing more will be loaded on `side`
    pub fn is_done(&self, side: Side) -> bool {
        self.state(side) == SideState::Done
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Take note of a pan or zoom. Nothing is loaded until the viewport
    /// stayed still for the debounce interval.
    pub fn on_viewport_changed(&mut self, transform: ViewportTransform, now: Instant) {
        self.transform = Some(transform);
        self.debouncer.event(now);
        for side in [Side::Left, Side::Right].iter() {
            if self.state(*side) == SideState::Suspended {
                self.set_state(*side, SideState::Open);
            }
        }
    }

    /// Run the load decision if the viewport has been quiet long enough.
    pub async fn poll_quiescence(&mut self, now: Instant) -> Vec<LoaderEvent> {
        if !self.debouncer.fire(now) {
            return Vec::new();
        }
        match self.transform {
            Some(transform) => self.evaluate(transform).await,
            None => Vec::new(),
        }
    }

    /// Load on either side for as long as the viewport shows room past
    /// the loaded nodes.
    pub async fn evaluate(&mut self, transform: ViewportTransform) -> Vec<LoaderEvent> {
        self.evaluations += 1;
        let mut events = Vec::new();
        let range = match self.config.geometry.visible_range(&transform) {
            Some(range) => range,
            None => return events,
        };
        tracing::trace!(
            loader = %self.id,
            left = range.left,
            right = range.right,
            "viewport settled"
        );
        let batch = self.config.batch_size;
        while range.extends_left_of(self.left.extent()) {
            if !self.load(Side::Left, batch, &mut events).await {
                break;
            }
        }
        while range.extends_right_of(self.right.extent()) {
            if !self.load(Side::Right, batch, &mut events).await {
                break;
            }
        }
        events
    }

    /// Follow viewport events until their sender goes away.
    pub async fn run(
        &mut self,
        mut viewport: MessageQueue<ViewportTransform>,
        mut events: MessageBox<LoaderEvent>,
    ) {
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                transform = viewport.next() => match transform {
                    Some(transform) => self.on_viewport_changed(transform, Instant::now()),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    for event in self.poll_quiescence(Instant::now()).await {
                        events.send_or_log(event).await;
                    }
                }
            }
        }
        tracing::debug!(loader = %self.id, "viewport events ended");
    }

    /// Leave the registry; the neighbours may then load what this loader
    /// held.
    pub async fn close(self) {
        self.registry.remove(self.id).await;
    }

    async fn bootstrap(&mut self, bounds: Bounds) -> Vec<LoaderEvent> {
        let mut events = Vec::new();
        let center = self.left.extent();

        let target = center.saturating_sub(bounds.left);
        while self.left.extent() > target {
            let want = (self.left.extent() - target).min(self.config.batch_size);
            if !self.load(Side::Left, want, &mut events).await {
                break;
            }
        }
        let target = center.saturating_add(bounds.right);
        while self.right.extent() < target {
            let want = (target - self.right.extent()).min(self.config.batch_size);
            if !self.load(Side::Right, want, &mut events).await {
                break;
            }
        }
        events
    }

    fn state(&self, side: Side) -> SideState {
        match side {
            Side::Left => self.left_state,
            Side::Right => self.right_state,
        }
    }

    fn set_state(&mut self, side: Side, state: SideState) {
        match side {
            Side::Left => self.left_state = state,
            Side::Right => self.right_state = state,
        }
    }

    fn frontier_mut(&mut self, side: Side) -> &mut Frontier {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Mark the side done if its frontier sits on genesis or the head.
    fn check_chain_end(&mut self, side: Side, events: &mut Vec<LoaderEvent>) -> bool {
        let loader = self.id;
        match side {
            Side::Left if self.left.boundary.is_genesis() => {
                tracing::debug!(loader = %loader, "genesis reached");
                self.left_state = SideState::Done;
                events.push(LoaderEvent::GenesisReached { loader });
                true
            }
            Side::Right if self.right.boundary.forward_link(0).is_none() => {
                tracing::debug!(loader = %loader, head = self.right.extent(), "end of chain reached");
                self.right_state = SideState::Done;
                events.push(LoaderEvent::EndOfChain {
                    loader,
                    head: Arc::clone(&self.right.boundary),
                });
                true
            }
            _ => false,
        }
    }

    /// Load up to `want` nodes past the frontier on `side`. Returns true
    /// if the frontier moved.
    async fn load(&mut self, side: Side, want: u64, events: &mut Vec<LoaderEvent>) -> bool {
        if self.state(side) != SideState::Open || self.check_chain_end(side, events) {
            return false;
        }
        let boundary = Arc::clone(&self.frontier_mut(side).boundary);
        let start = match side {
            Side::Left => boundary.backlink(0),
            Side::Right => boundary.forward_link(0),
        };
        let start = match start {
            Some(start) => start,
            None => return false,
        };

        let reservation = match self.registry.reserve(self.id, side, want).await {
            Claim::Granted(reservation) => reservation,
            Claim::Claimed(neighbour) => {
                tracing::trace!(loader = %self.id, %side, %neighbour, "range held by the neighbour");
                return false;
            }
            Claim::Empty => return false,
        };

        let mut cursor = self.engine.cursor(start, side.direction());
        let mut nodes: Vec<Arc<Node>> = Vec::new();
        let mut remaining = reservation.count();
        let outcome = loop {
            if remaining == 0 || cursor.is_exhausted() {
                break Ok(());
            }
            match cursor.next_batch(&mut self.session, Some(remaining)).await {
                Ok(batch) if batch.is_empty() => break Ok(()),
                Ok(batch) => {
                    remaining = remaining.saturating_sub(batch.len() as u64);
                    nodes.extend(batch);
                }
                Err(source) => break Err(source),
            }
        };

        let moved = match nodes.last() {
            Some(last) => {
                let last = Arc::clone(last);
                let extent = last.index;
                self.registry.commit(self.id, side, extent).await;
                self.frontier_mut(side).boundary = last;
                tracing::debug!(
                    loader = %self.id,
                    %side,
                    count = nodes.len(),
                    extent,
                    "frontier moved"
                );
                events.push(LoaderEvent::NodesLoaded {
                    loader: self.id,
                    side,
                    nodes,
                });
                true
            }
            None => {
                self.registry.rollback(self.id, side).await;
                false
            }
        };

        if let Err(source) = outcome {
            let error = LoaderError::Fetch {
                loader: self.id,
                side,
                source,
            };
            tracing::warn!(error = %error, "load suspended until the viewport moves");
            self.set_state(side, SideState::Suspended);
            events.push(LoaderEvent::LoadFailed {
                loader: self.id,
                side,
                error: Arc::new(error),
            });
            return false;
        }

        self.check_chain_end(side, events);
        moved
    }
}
