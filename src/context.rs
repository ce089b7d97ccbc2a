//! Distributed execution context.
//!
//! Every component that needs a globally reduced quantity (total volume,
//! compliance, convergence residual, optimizer multiplier sums) receives a
//! [`DistributedContext`] at construction. The context owns the communicator
//! for the lifetime of a run; there is no process-wide singleton.
//!
//! Each process holds its local partition of every per-element or per-DOF
//! array. Dot products and sums are computed locally and then reduced
//! through the communicator, so all processes observe identical scalars and
//! advance through the stages in lock-step.

use std::fmt;
use std::sync::Arc;

/// Collective operations over the set of cooperating processes.
///
/// Every call is collective: all ranks must make the same sequence of calls.
pub trait Communicator: Send + Sync + fmt::Debug {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn all_reduce_sum(&self, local: f64) -> f64;

    fn all_reduce_max(&self, local: f64) -> f64;

    fn all_reduce_min(&self, local: f64) -> f64;

    /// Element-wise sum of `values` across ranks, in place.
    fn all_reduce_sum_slice(&self, values: &mut [f64]);

    fn barrier(&self);
}

/// Single-process communicator: every reduction is the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        local
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        local
    }

    fn all_reduce_min(&self, local: f64) -> f64 {
        local
    }

    fn all_reduce_sum_slice(&self, _values: &mut [f64]) {}

    fn barrier(&self) {}
}

/// Explicitly constructed run context passed to every component constructor.
#[derive(Debug, Clone)]
pub struct DistributedContext {
    comm: Arc<dyn Communicator>,
}

impl DistributedContext {
    pub fn new(comm: Arc<dyn Communicator>) -> Self {
        Self { comm }
    }

    /// Context for a single process owning the whole mesh.
    pub fn serial() -> Self {
        Self::new(Arc::new(SerialCommunicator))
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn is_root(&self) -> bool {
        self.comm.rank() == 0
    }

    pub fn communicator(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    pub fn sum(&self, local: f64) -> f64 {
        self.comm.all_reduce_sum(local)
    }

    pub fn max(&self, local: f64) -> f64 {
        self.comm.all_reduce_max(local)
    }

    pub fn min(&self, local: f64) -> f64 {
        self.comm.all_reduce_min(local)
    }

    /// Global sum of the local entries of `values`.
    pub fn sum_slice(&self, values: &[f64]) -> f64 {
        self.sum(values.iter().sum())
    }

    /// Global dot product of two locally owned vectors.
    pub fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        let local = a.iter().zip(b.iter()).map(|(&ai, &bi)| ai * bi).sum();
        self.sum(local)
    }

    /// Global max of `|a_i - b_i|` over locally owned entries.
    pub fn max_abs_diff(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        let local = a
            .iter()
            .zip(b.iter())
            .map(|(&ai, &bi)| (ai - bi).abs())
            .fold(0.0, f64::max);
        self.max(local)
    }

    pub fn sum_in_place(&self, values: &mut [f64]) {
        self.comm.all_reduce_sum_slice(values);
    }

    pub fn barrier(&self) {
        self.comm.barrier();
    }
}

impl Default for DistributedContext {
    fn default() -> Self {
        Self::serial()
    }
}
