//! Mount targets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// An ordered collection of rendered nodes, such as the children of a UI
/// element.
///
/// Indices are positions among the container's current children. Callers
/// guarantee they are in range.
pub trait Container: Send + 'static {
    type Node: Clone + Send + Sync + 'static;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `node` before position `index`.
    fn insert(&mut self, index: usize, node: Self::Node);

    /// Insert consecutive nodes, the first landing at `index`.
    ///
    /// Containers that can batch structural changes should override this.
    fn insert_many(&mut self, index: usize, nodes: Vec<Self::Node>) {
        for (offset, node) in nodes.into_iter().enumerate() {
            self.insert(index + offset, node);
        }
    }

    fn remove(&mut self, index: usize) -> Self::Node;

    /// Remove the node at `from` and insert it at `to` in the shortened
    /// sequence.
    fn relocate(&mut self, from: usize, to: usize) {
        let node = self.remove(from);
        self.insert(to, node);
    }
}

/// A `Vec`-backed container.
///
/// Clones share the same nodes, so a test can keep one handle and give the
/// other to a mount. Every structural call is counted.
#[derive(Debug)]
pub struct VecContainer<N> {
    nodes: Arc<Mutex<Vec<N>>>,
    calls: Arc<AtomicUsize>,
}

impl<N: Clone> VecContainer<N> {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A copy of the current nodes.
    pub fn nodes(&self) -> Vec<N> {
        self.nodes.lock().clone()
    }

    /// Number of structural calls (`insert`, `insert_many`, `remove`,
    /// `relocate`) made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

impl<N: Clone> Default for VecContainer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> Clone for VecContainer<N> {
    fn clone(&self) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<N> Container for VecContainer<N>
where
    N: Clone + Send + Sync + 'static,
{
    type Node = N;

    fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    fn insert(&mut self, index: usize, node: N) {
        self.count();
        self.nodes.lock().insert(index, node);
    }

    fn insert_many(&mut self, index: usize, nodes: Vec<N>) {
        self.count();
        self.nodes.lock().splice(index..index, nodes);
    }

    fn remove(&mut self, index: usize) -> N {
        self.count();
        self.nodes.lock().remove(index)
    }

    fn relocate(&mut self, from: usize, to: usize) {
        self.count();
        let mut nodes = self.nodes.lock();
        let node = nodes.remove(from);
        nodes.insert(to, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_nodes() {
        let view = VecContainer::new();
        let mut target = view.clone();

        target.insert(0, "b");
        target.insert_many(0, vec!["a", "c"]);
        target.relocate(1, 2);

        assert_eq!(view.nodes(), ["a", "b", "c"]);
        assert_eq!(view.calls(), 3);
        assert_eq!(target.remove(0), "a");
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn default_insert_many_inserts_in_order() {
        struct Plain(Vec<u8>);
        impl Container for Plain {
            type Node = u8;
            fn len(&self) -> usize {
                self.0.len()
            }
            fn insert(&mut self, index: usize, node: u8) {
                self.0.insert(index, node);
            }
            fn remove(&mut self, index: usize) -> u8 {
                self.0.remove(index)
            }
        }

        let mut plain = Plain(vec![0, 9]);
        plain.insert_many(1, vec![1, 2, 3]);
        plain.relocate(4, 0);
        assert_eq!(plain.0, [9, 0, 1, 2, 3]);
        assert!(!plain.is_empty());
    }
}
