use crate::node::Direction;
use serde::Serialize;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::RwLock;

/// Stable handle of a loader registered in a [`FrontierRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LoaderId(u64);

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn direction(self) -> Direction {
        match self {
            Side::Left => Direction::Backward,
            Side::Right => Direction::Forward,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Lowest and highest index a loader holds or is loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    pub left: u64,
    pub right: u64,
}

/// A range handed to a loader to fetch, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub side: Side,
    pub from: u64,
    pub to: u64,
}

impl Reservation {
    /// number of indices reserved, never zero
    pub fn count(&self) -> u64 {
        self.to - self.from + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Granted(Reservation),
    /// the neighbour on that side already holds the next index
    Claimed(LoaderId),
    /// nothing left to reserve on that side, or a reservation is still
    /// in flight
    Empty,
}

struct Entry {
    claims: Claims,
    committed: Claims,
    left: Option<LoaderId>,
    right: Option<LoaderId>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: HashMap<LoaderId, Entry>,
}

/// Shared book of what every loader holds.
///
/// Loaders refer to their neighbours by id only. A range is reserved
/// before it is fetched, so two neighbours never fetch the same index,
/// and committed or rolled back once the fetch is over.
#[derive(Clone, Default)]
pub struct FrontierRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl FrontierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a loader holding the single index `center`, between the given
    /// neighbours. The neighbours learn about the new loader as well.
    pub async fn register(
        &self,
        center: u64,
        left: Option<LoaderId>,
        right: Option<LoaderId>,
    ) -> LoaderId {
        let mut inner = self.inner.write().await;
        let id = LoaderId(inner.next_id);
        inner.next_id += 1;
        if let Some(left) = left {
            if let Some(entry) = inner.entries.get_mut(&left) {
                entry.right = Some(id);
            }
        }
        if let Some(right) = right {
            if let Some(entry) = inner.entries.get_mut(&right) {
                entry.left = Some(id);
            }
        }
        let claims = Claims {
            left: center,
            right: center,
        };
        inner.entries.insert(
            id,
            Entry {
                claims,
                committed: claims,
                left,
                right,
            },
        );
        id
    }

    pub async fn remove(&self, id: LoaderId) {
        let mut inner = self.inner.write().await;
        let entry = match inner.entries.remove(&id) {
            Some(entry) => entry,
            None => return,
        };
        if let Some(left) = entry.left {
            if let Some(left) = inner.entries.get_mut(&left) {
                left.right = None;
            }
        }
        if let Some(right) = entry.right {
            if let Some(right) = inner.entries.get_mut(&right) {
                right.left = None;
            }
        }
    }

    pub async fn claims(&self, id: LoaderId) -> Option<Claims> {
        self.inner.read().await.entries.get(&id).map(|entry| entry.claims)
    }

    pub async fn neighbours(&self, id: LoaderId) -> (Option<LoaderId>, Option<LoaderId>) {
        match self.inner.read().await.entries.get(&id) {
            Some(entry) => (entry.left, entry.right),
            None => (None, None),
        }
    }

    /// Reserve up to `want` indices beyond the current claim on `side`,
    /// stopping short of what the neighbour on that side holds.
    pub async fn reserve(&self, id: LoaderId, side: Side, want: u64) -> Claim {
        let mut inner = self.inner.write().await;
        let (claims, in_flight, neighbour) = match inner.entries.get(&id) {
            Some(entry) => match side {
                Side::Left => (entry.claims, entry.claims.left != entry.committed.left, entry.left),
                Side::Right => (entry.claims, entry.claims.right != entry.committed.right, entry.right),
            },
            None => return Claim::Empty,
        };
        if want == 0 || in_flight {
            return Claim::Empty;
        }
        let neighbour = match neighbour {
            Some(n) => inner.entries.get(&n).map(|entry| (n, entry.claims)),
            None => None,
        };

        let reservation = match side {
            Side::Left => {
                let edge = claims.left;
                if edge == 0 {
                    return Claim::Empty;
                }
                let mut from = edge.saturating_sub(want);
                if let Some((neighbour, theirs)) = neighbour {
                    if theirs.right.saturating_add(1) >= edge {
                        return Claim::Claimed(neighbour);
                    }
                    from = from.max(theirs.right + 1);
                }
                Reservation {
                    side,
                    from,
                    to: edge - 1,
                }
            }
            Side::Right => {
                let edge = claims.right;
                if edge == u64::MAX {
                    return Claim::Empty;
                }
                let mut to = edge.saturating_add(want);
                if let Some((neighbour, theirs)) = neighbour {
                    if theirs.left <= edge + 1 {
                        return Claim::Claimed(neighbour);
                    }
                    to = to.min(theirs.left - 1);
                }
                Reservation {
                    side,
                    from: edge + 1,
                    to,
                }
            }
        };

        if let Some(entry) = inner.entries.get_mut(&id) {
            match side {
                Side::Left => entry.claims.left = reservation.from,
                Side::Right => entry.claims.right = reservation.to,
            }
        }
        Claim::Granted(reservation)
    }

    /// Record how far the loader actually got on `side`.
    pub async fn commit(&self, id: LoaderId, side: Side, extent: u64) {
        if let Some(entry) = self.inner.write().await.entries.get_mut(&id) {
            match side {
                Side::Left => {
                    entry.claims.left = extent;
                    entry.committed.left = extent;
                }
                Side::Right => {
                    entry.claims.right = extent;
                    entry.committed.right = extent;
                }
            }
        }
    }

    /// Give back an unfetched reservation.
    pub async fn rollback(&self, id: LoaderId, side: Side) {
        if let Some(entry) = self.inner.write().await.entries.get_mut(&id) {
            match side {
                Side::Left => entry.claims.left = entry.committed.left,
                Side::Right => entry.claims.right = entry.committed.right,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reservation_stops_at_the_neighbour() {
        let registry = FrontierRegistry::new();
        let west = registry.register(10, None, None).await;
        let east = registry.register(20, Some(west), None).await;
        assert_eq!(registry.neighbours(west).await, (None, Some(east)));

        let claim = registry.reserve(west, Side::Right, 8).await;
        assert_eq!(
            claim,
            Claim::Granted(Reservation {
                side: Side::Right,
                from: 11,
                to: 18
            })
        );
        let claim = registry.reserve(east, Side::Left, 8).await;
        assert_eq!(
            claim,
            Claim::Granted(Reservation {
                side: Side::Left,
                from: 19,
                to: 19
            })
        );
        registry.commit(east, Side::Left, 19).await;
        registry.commit(west, Side::Right, 18).await;
        assert_eq!(registry.reserve(west, Side::Right, 8).await, Claim::Claimed(east));
        assert_eq!(registry.reserve(east, Side::Left, 8).await, Claim::Claimed(west));
    }

    #[tokio::test]
    async fn rollback_releases_the_range() {
        let registry = FrontierRegistry::new();
        let west = registry.register(10, None, None).await;
        let east = registry.register(20, Some(west), None).await;
        registry.reserve(west, Side::Right, 20).await;
        assert_eq!(registry.reserve(east, Side::Left, 5).await, Claim::Claimed(west));
        registry.rollback(west, Side::Right).await;
        assert!(matches!(
            registry.reserve(east, Side::Left, 5).await,
            Claim::Granted(Reservation { from: 15, to: 19, .. })
        ));
    }

    #[tokio::test]
    async fn genesis_has_nothing_left_of_it() {
        let registry = FrontierRegistry::new();
        let id = registry.register(3, None, None).await;
        assert!(matches!(
            registry.reserve(id, Side::Left, 10).await,
            Claim::Granted(Reservation { from: 0, to: 2, .. })
        ));
        registry.commit(id, Side::Left, 0).await;
        assert_eq!(registry.reserve(id, Side::Left, 10).await, Claim::Empty);
    }

    #[tokio::test]
    async fn removed_loader_frees_its_neighbour() {
        let registry = FrontierRegistry::new();
        let west = registry.register(10, None, None).await;
        let east = registry.register(11, Some(west), None).await;
        assert_eq!(registry.reserve(east, Side::Left, 1).await, Claim::Claimed(west));
        registry.remove(west).await;
        assert!(matches!(
            registry.reserve(east, Side::Left, 1).await,
            Claim::Granted(_)
        ));
    }
}
