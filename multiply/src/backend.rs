use bfly_tensor::{Device, Element};

use crate::engine;
use crate::factor::{OrthogonalFactor, StageFactor};
use crate::stride::StageSchedule;
use crate::validate::Dims;

/// Where and how the stage traversal runs.
///
/// A backend receives operands that have already been validated: `input`, `output` and `grad`
/// hold `dims.rows()` rows of `dims.n` values, and the factor matches `dims`.
pub trait Backend: Sync {
    /// Name reported in errors.
    fn name(&self) -> &'static str;

    /// Whether this backend can operate on tensors placed on `device`.
    fn supports(&self, device: Device) -> bool;

    fn forward<V, F>(&self, factor: &F, schedule: StageSchedule, dims: Dims, input: &[V]) -> Vec<V>
    where
        V: Element,
        F: StageFactor<V>;

    /// The batch after every stage, `log_n + 1` batches back to back.
    fn forward_intermediates<V, F>(
        &self,
        factor: &F,
        schedule: StageSchedule,
        dims: Dims,
        input: &[V],
    ) -> Vec<V>
    where
        V: Element,
        F: StageFactor<V>;

    /// Parameter and input gradients, recomputing and saving the stage inputs from `input`.
    fn backward_saved<V, F>(
        &self,
        factor: &F,
        schedule: StageSchedule,
        dims: Dims,
        input: &[V],
        grad: &[V],
    ) -> (Vec<F::Grad>, Vec<V>)
    where
        V: Element,
        F: StageFactor<V>;

    /// Parameter and input gradients, rebuilding the stage inputs from the forward `output`.
    fn backward_reconstruct<V, F>(
        &self,
        factor: &F,
        schedule: StageSchedule,
        dims: Dims,
        output: &[V],
        grad: &[V],
    ) -> (Vec<F::Grad>, Vec<V>)
    where
        V: Element,
        F: OrthogonalFactor<V>;
}

/// Runs on the host, spreading rows over the rayon pool when the `parallel` feature is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuBackend {
    rows_per_chunk: usize,
}

impl CpuBackend {
    /// `rows_per_chunk` batch elements share one gradient partial; zero is treated as one.
    #[must_use]
    pub const fn new(rows_per_chunk: usize) -> Self {
        Self {
            rows_per_chunk: if rows_per_chunk == 0 { 1 } else { rows_per_chunk },
        }
    }

    #[must_use]
    pub const fn rows_per_chunk(&self) -> usize {
        self.rows_per_chunk
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(crate::MultiplyConfig::default().rows_per_chunk)
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn supports(&self, device: Device) -> bool {
        device.is_cpu()
    }

    fn forward<V, F>(&self, factor: &F, schedule: StageSchedule, dims: Dims, input: &[V]) -> Vec<V>
    where
        V: Element,
        F: StageFactor<V>,
    {
        engine::forward(factor, schedule, dims, input)
    }

    fn forward_intermediates<V, F>(
        &self,
        factor: &F,
        schedule: StageSchedule,
        dims: Dims,
        input: &[V],
    ) -> Vec<V>
    where
        V: Element,
        F: StageFactor<V>,
    {
        engine::forward_intermediates(factor, schedule, dims, input)
    }

    fn backward_saved<V, F>(
        &self,
        factor: &F,
        schedule: StageSchedule,
        dims: Dims,
        input: &[V],
        grad: &[V],
    ) -> (Vec<F::Grad>, Vec<V>)
    where
        V: Element,
        F: StageFactor<V>,
    {
        engine::backward_saved(factor, schedule, dims, self.rows_per_chunk, input, grad)
    }

    fn backward_reconstruct<V, F>(
        &self,
        factor: &F,
        schedule: StageSchedule,
        dims: Dims,
        output: &[V],
        grad: &[V],
    ) -> (Vec<F::Grad>, Vec<V>)
    where
        V: Element,
        F: OrthogonalFactor<V>,
    {
        engine::backward_reconstruct(factor, schedule, dims, self.rows_per_chunk, output, grad)
    }
}
