use bfly_tensor::{Element, RealElement};

use crate::factor::{OrthogonalFactor, StageFactor};
use crate::stride::Stage;
use crate::twiddle::Twiddle;

/// A stack of rotations `[[cos t, -sin t], [sin t, cos t]]`, one angle per pair.
///
/// `cos` and `sin` have shape `(nstack, log_n, n / 2)`, indexed by stack, log stride and pair
/// index. The parameter gradient is taken with respect to the angles.
#[derive(Debug)]
pub struct OrthoFactor<'a, R> {
    cos: &'a [R],
    sin: &'a [R],
    half_n: usize,
    stack_len: usize,
}

impl<'a, R: RealElement> OrthoFactor<'a, R> {
    pub fn new(cos: &'a [R], sin: &'a [R], log_n: usize, n: usize) -> Self {
        debug_assert_eq!(cos.len(), sin.len());
        Self {
            cos,
            sin,
            half_n: n / 2,
            stack_len: log_n * (n / 2),
        }
    }

    /// Offset of the angle of the pair starting at `low`, relative to the start of a stack.
    #[inline]
    fn angle_offset(&self, stage: Stage, low: usize) -> usize {
        stage.log_stride() * self.half_n + stage.pair_index(low)
    }

    #[inline]
    fn rotation(&self, stack: usize, stage: Stage, low: usize) -> (R, R) {
        let i = stack * self.stack_len + self.angle_offset(stage, low);
        (self.cos[i], self.sin[i])
    }
}

impl<R, V> StageFactor<V> for OrthoFactor<'_, R>
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
    type Grad = R;

    fn stack_len(&self) -> usize {
        self.stack_len
    }

    fn apply_stage(&self, stack: usize, stage: Stage, row: &mut [V]) {
        stage.for_each_pair_mut(row, |low, x0, x1| {
            let (c, s) = self.rotation(stack, stage, low);
            let (v0, v1) = (*x0, *x1);
            *x0 = c.mul_value(v0) - s.mul_value(v1);
            *x1 = s.mul_value(v0) + c.mul_value(v1);
        });
    }

    fn apply_stage_transpose(&self, stack: usize, stage: Stage, row: &mut [V]) {
        stage.for_each_pair_mut(row, |low, y0, y1| {
            let (c, s) = self.rotation(stack, stage, low);
            let (v0, v1) = (*y0, *y1);
            *y0 = c.mul_value(v0) + s.mul_value(v1);
            *y1 = c.mul_value(v1) - s.mul_value(v0);
        });
    }

    fn accumulate_stage_gradient(
        &self,
        stack: usize,
        stage: Stage,
        stage_input: &[V],
        grad: &mut [V],
        d_stack: &mut [R],
    ) {
        stage.for_each_pair_with(stage_input, grad, |low, [x0, x1], g0, g1| {
            let (c, s) = self.rotation(stack, stage, low);
            let (h0, h1) = (*g0, *g1);
            // d/dt of the two outputs: (-s x0 - c x1, c x0 - s x1).
            let dy0 = -(s.mul_value(x0) + c.mul_value(x1));
            let dy1 = c.mul_value(x0) - s.mul_value(x1);
            d_stack[self.angle_offset(stage, low)] +=
                <R as Twiddle<V>>::value_grad(h0, dy0) + <R as Twiddle<V>>::value_grad(h1, dy1);
            *g0 = c.mul_value(h0) + s.mul_value(h1);
            *g1 = c.mul_value(h1) - s.mul_value(h0);
        });
    }
}

impl<R, V> OrthogonalFactor<V> for OrthoFactor<'_, R>
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
}
