use super::{Node, NodeId};
use lru::LruCache;
use std::sync::Arc;
use tokio::sync::Mutex;

/// object that stores recently fetched [`Node`]s. Every time a node is
/// accessed it becomes the most recently used entry; once the cache is
/// full the least recently used node is dropped.
///
/// A miss does not mean the node does not exist on the chain, only that
/// it has not been seen _recently_.
#[derive(Clone)]
pub struct NodeCache {
    inner: Arc<Mutex<LruCache<NodeId, Arc<Node>>>>,
}

impl NodeCache {
    pub fn new(cap: usize) -> Self {
        NodeCache {
            inner: Arc::new(Mutex::new(LruCache::new(cap.max(1)))),
        }
    }

    pub async fn insert(&self, node: Arc<Node>) {
        self.inner.lock().await.put(node.id(), node);
    }

    pub async fn get(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.inner.lock().await.get(id).map(Arc::clone)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{tests::id, Payload};

    fn node(n: u8) -> Arc<Node> {
        Arc::new(Node {
            index: u64::from(n),
            hash: id(n),
            height: 1,
            base_height: 2,
            backlinks: vec![],
            forward_links: vec![],
            payload: Payload::default(),
        })
    }

    #[tokio::test]
    async fn least_recently_used_is_evicted() {
        let cache = NodeCache::new(2);
        cache.insert(node(1)).await;
        cache.insert(node(2)).await;
        assert!(cache.get(&id(1)).await.is_some());
        cache.insert(node(3)).await;
        assert!(cache.get(&id(2)).await.is_none());
        assert!(cache.get(&id(1)).await.is_some());
        assert_eq!(cache.len().await, 2);
    }
}
