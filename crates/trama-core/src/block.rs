//! Shared sample buffers.
//!
//! A [`SignalBlock`] is the unit of exchange between nodes: a
//! reference-counted, interiorly-mutable buffer of `f32` samples. A
//! node owns the block it writes; consumers clone the handle and read
//! the same storage. Proxy channels share their owner's blocks the
//! same way.
//!
//! The logical length follows the block size requested in the last
//! prepare pass and is distinct from capacity, so shrinking for a
//! sub-block render never frees and regrowing rarely allocates.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};

/// A shared, resizable buffer of samples.
///
/// Cloning is cheap and aliases the same storage. Reads and writes
/// borrow dynamically; holding a read borrow across a graph pull that
/// rewrites the same block will panic, which only happens when the
/// graph contains a cycle.
#[derive(Clone, Debug, Default)]
pub struct SignalBlock {
    samples: Rc<RefCell<Vec<f32>>>,
}

impl SignalBlock {
    /// Creates a zero-filled block of `len` samples.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let mut samples = Vec::new();
        samples.resize(len, 0.0);
        Self {
            samples: Rc::new(RefCell::new(samples)),
        }
    }

    /// Current logical length in samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.borrow().len()
    }

    /// Returns `true` if the block holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the logical length, zero-filling any new samples.
    ///
    /// Capacity is retained when shrinking, so alternating between a
    /// full block and a sub-block does not reallocate.
    pub fn resize(&self, len: usize) {
        self.samples.borrow_mut().resize(len, 0.0);
    }

    /// Fills the whole block with `value`.
    pub fn fill(&self, value: f32) {
        self.samples.borrow_mut().fill(value);
    }

    /// Borrows the samples for reading.
    #[must_use]
    pub fn read(&self) -> Ref<'_, Vec<f32>> {
        self.samples.borrow()
    }

    /// Borrows the samples for writing.
    #[must_use]
    pub fn write(&self) -> RefMut<'_, Vec<f32>> {
        self.samples.borrow_mut()
    }

    /// Copies the block into a host buffer.
    ///
    /// Copies `min(self.len(), dest.len())` samples.
    pub fn copy_to(&self, dest: &mut [f32]) {
        let src = self.samples.borrow();
        let n = src.len().min(dest.len());
        dest[..n].copy_from_slice(&src[..n]);
    }

    /// Clones the current contents into an owned vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f32> {
        self.samples.borrow().clone()
    }

    /// Returns `true` if both handles alias the same storage.
    #[must_use]
    pub fn shares_storage_with(&self, other: &SignalBlock) -> bool {
        Rc::ptr_eq(&self.samples, &other.samples)
    }
}
