//! The traversal driver shared by every operation.
//!
//! Rows of a `(batch, nstack, n)` buffer are independent: row `r` is multiplied by stack
//! `r % nstack`, stage after stage, in place. Rows are spread over threads; the stages of one row
//! always run in order.

use bfly_maybe_rayon::prelude::*;
use bfly_tensor::Element;
use tracing::{debug_span, instrument};

use crate::factor::{OrthogonalFactor, StageFactor};
use crate::stride::StageSchedule;
use crate::validate::Dims;

#[instrument(level = "debug", skip_all, fields(rows = dims.rows(), n = dims.n))]
pub fn forward<V, F>(factor: &F, schedule: StageSchedule, dims: Dims, input: &[V]) -> Vec<V>
where
    V: Element,
    F: StageFactor<V>,
{
    let mut output = input.to_vec();
    output
        .par_chunks_exact_mut(dims.n)
        .enumerate()
        .for_each(|(r, row)| {
            let stack = r % dims.nstack;
            for stage in schedule.stages() {
                factor.apply_stage(stack, stage, row);
            }
        });
    output
}

/// Runs the forward pass and keeps the batch after every stage: `log_n + 1` consecutive copies,
/// the first being `input`.
#[instrument(level = "debug", skip_all, fields(rows = dims.rows(), n = dims.n))]
pub fn forward_intermediates<V, F>(
    factor: &F,
    schedule: StageSchedule,
    dims: Dims,
    input: &[V],
) -> Vec<V>
where
    V: Element,
    F: StageFactor<V>,
{
    let mut stacked = Vec::with_capacity((schedule.log_n() + 1) * input.len());
    stacked.extend_from_slice(input);
    let mut current = input.to_vec();
    for stage in schedule.stages() {
        current
            .par_chunks_exact_mut(dims.n)
            .enumerate()
            .for_each(|(r, row)| factor.apply_stage(r % dims.nstack, stage, row));
        stacked.extend_from_slice(&current);
    }
    stacked
}

/// Backward pass of an arbitrary factor: each row is run forward once while its stage inputs are
/// saved, then the gradient is walked back through them.
#[instrument(level = "debug", skip_all, fields(rows = dims.rows(), n = dims.n))]
pub fn backward_saved<V, F>(
    factor: &F,
    schedule: StageSchedule,
    dims: Dims,
    rows_per_chunk: usize,
    input: &[V],
    grad: &[V],
) -> (Vec<F::Grad>, Vec<V>)
where
    V: Element,
    F: StageFactor<V>,
{
    let n = dims.n;
    let scratch_len = (schedule.log_n() + 1) * n;
    chunked_backward(
        factor.stack_len(),
        dims,
        rows_per_chunk,
        scratch_len,
        input,
        grad,
        |stack, x_row, g_row, d_stack, scratch| {
            let (saved, current) = scratch.split_at_mut(schedule.log_n() * n);
            current.copy_from_slice(x_row);
            for (stage, slot) in schedule.stages().zip(saved.chunks_exact_mut(n)) {
                slot.copy_from_slice(current);
                factor.apply_stage(stack, stage, current);
            }
            for (stage, slot) in schedule.stages().zip(saved.chunks_exact(n)).rev() {
                factor.accumulate_stage_gradient(stack, stage, slot, g_row, d_stack);
            }
        },
    )
}

/// Backward pass of an orthogonal factor, starting from the forward output. Each stage input is
/// recovered by applying the transposed stage to its output, so nothing is saved.
#[instrument(level = "debug", skip_all, fields(rows = dims.rows(), n = dims.n))]
pub fn backward_reconstruct<V, F>(
    factor: &F,
    schedule: StageSchedule,
    dims: Dims,
    rows_per_chunk: usize,
    output: &[V],
    grad: &[V],
) -> (Vec<F::Grad>, Vec<V>)
where
    V: Element,
    F: OrthogonalFactor<V>,
{
    chunked_backward(
        factor.stack_len(),
        dims,
        rows_per_chunk,
        dims.n,
        output,
        grad,
        |stack, y_row, g_row, d_stack, scratch| {
            scratch.copy_from_slice(y_row);
            for stage in schedule.stages().rev() {
                factor.apply_stage_transpose(stack, stage, scratch);
                factor.accumulate_stage_gradient(stack, stage, scratch, g_row, d_stack);
            }
        },
    )
}

/// Splits the batch into chunks of `rows_per_chunk` batch elements, runs `row_pass` over every
/// row of a chunk in order against that chunk's own parameter gradient, then sums the partials
/// in chunk order.
///
/// `row_pass(stack, values, grad, d_stack, scratch)` receives a row of `values`, the matching row
/// of the input gradient to update in place, the gradient of the row's stack and a scratch
/// buffer of `scratch_len` entries.
fn chunked_backward<V, G, P>(
    stack_len: usize,
    dims: Dims,
    rows_per_chunk: usize,
    scratch_len: usize,
    values: &[V],
    grad: &[V],
    row_pass: P,
) -> (Vec<G>, Vec<V>)
where
    V: Element,
    G: Element,
    P: Fn(usize, &[V], &mut [V], &mut [G], &mut [V]) + Sync,
{
    debug_assert_eq!(values.len(), grad.len());
    let d_len = dims.nstack * stack_len;
    let mut d_input = grad.to_vec();
    if d_input.is_empty() {
        return (vec![G::zero(); d_len], d_input);
    }

    let block = rows_per_chunk.saturating_mul(dims.nstack * dims.n);
    let partials: Vec<Vec<G>> = values
        .par_chunks(block)
        .zip(d_input.par_chunks_mut(block))
        .map(|(x_chunk, g_chunk)| {
            let mut partial = vec![G::zero(); d_len];
            let mut scratch = vec![V::zero(); scratch_len];
            let rows = x_chunk.chunks_exact(dims.n).zip(g_chunk.chunks_exact_mut(dims.n));
            for (r, (x_row, g_row)) in rows.enumerate() {
                let stack = r % dims.nstack;
                let d_stack = &mut partial[stack * stack_len..(stack + 1) * stack_len];
                row_pass(stack, x_row, g_row, d_stack, scratch.as_mut_slice());
            }
            partial
        })
        .collect();

    (sum_partials(partials, d_len), d_input)
}

fn sum_partials<G: Element>(partials: Vec<Vec<G>>, len: usize) -> Vec<G> {
    debug_span!("sum gradient partials", chunks = partials.len()).in_scope(|| {
        let mut partials = partials.into_iter();
        let mut total = partials.next().unwrap_or_else(|| vec![G::zero(); len]);
        for partial in partials {
            for (t, p) in total.iter_mut().zip(partial) {
                *t += p;
            }
        }
        total
    })
}
