//! Node disposal strategies.
//!
//! Retired nodes are handed to a [`Deleter`] instead of being dropped
//! inline, so hosts can move reclamation (and the `Drop` cascades that
//! come with it) off the audio callback. [`ImmediateDeleter`] drops on
//! the spot; [`DeferredDeleter`] queues until the host flushes at a
//! safe time.

use alloc::vec::Vec;

use crate::node::NodeRef;

/// Strategy for disposing of retired nodes.
pub trait Deleter {
    /// Takes ownership of a retired node.
    fn dispose(&mut self, node: NodeRef);

    /// Reclaims anything queued. A no-op for immediate strategies.
    fn flush(&mut self) {}
}

/// Drops nodes as soon as they are retired.
#[derive(Default)]
pub struct ImmediateDeleter;

impl Deleter for ImmediateDeleter {
    fn dispose(&mut self, node: NodeRef) {
        drop(node);
    }
}

/// Queues retired nodes until [`Deleter::flush`] is called.
///
/// Nodes are not `Send`, so the queue must be drained on the same
/// thread that renders; the point is to drain *between* callbacks
/// rather than inside one.
#[derive(Default)]
pub struct DeferredDeleter {
    queue: Vec<NodeRef>,
}

impl DeferredDeleter {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes waiting to be reclaimed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Deleter for DeferredDeleter {
    fn dispose(&mut self, node: NodeRef) {
        #[cfg(feature = "tracing")]
        tracing::debug!(pending = self.queue.len() + 1, "deferred node disposal");
        self.queue.push(node);
    }

    fn flush(&mut self) {
        self.queue.clear();
    }
}
