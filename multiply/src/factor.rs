use bfly_tensor::Element;

use crate::stride::Stage;

/// One parameterization of a butterfly stack, seen one stage of one stack at a time.
///
/// The engines own the traversal; a factor only knows how to apply, transpose and differentiate
/// the `n / 2` blocks of a single stage. `row` always has length `n`.
pub trait StageFactor<V: Element>: Sync {
    /// Element type of the parameter gradient.
    type Grad: Element;

    /// Number of parameter gradient entries per stack.
    fn stack_len(&self) -> usize;

    /// Replaces every pair `(x_low, x_high)` of `row` by `B * [x_low, x_high]`.
    fn apply_stage(&self, stack: usize, stage: Stage, row: &mut [V]);

    /// Replaces every pair of `row` by `B^H * [y_low, y_high]`.
    fn apply_stage_transpose(&self, stack: usize, stage: Stage, row: &mut [V]);

    /// Adds this stage's parameter gradient into `d_stack` and carries `grad` from the stage's
    /// output to its input. `stage_input` is the row as it was before `apply_stage`.
    fn accumulate_stage_gradient(
        &self,
        stack: usize,
        stage: Stage,
        stage_input: &[V],
        grad: &mut [V],
        d_stack: &mut [Self::Grad],
    );
}

/// A factor whose blocks are orthogonal, so that `apply_stage_transpose` undoes `apply_stage`.
///
/// Backward passes over such factors rebuild each stage input from the final output instead of
/// saving it.
pub trait OrthogonalFactor<V: Element>: StageFactor<V> {}
