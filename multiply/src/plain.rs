use bfly_tensor::Element;

use crate::factor::StageFactor;
use crate::layout::TwiddleLayout;
use crate::stride::Stage;
use crate::twiddle::Twiddle;

/// A stack of unconstrained `[[a, b], [c, d]]` blocks, read in place from a twiddle tensor.
#[derive(Debug)]
pub struct PlainFactor<'a, W> {
    twiddle: &'a [W],
    layout: TwiddleLayout,
    n: usize,
    stack_len: usize,
}

impl<'a, W: Element> PlainFactor<'a, W> {
    pub fn new(twiddle: &'a [W], layout: TwiddleLayout, log_n: usize, n: usize) -> Self {
        let stack_len = TwiddleLayout::stack_len(log_n, n);
        debug_assert_eq!(twiddle.len() % stack_len.max(1), 0);
        Self {
            twiddle,
            layout,
            n,
            stack_len,
        }
    }

    #[inline]
    fn stack(&self, stack: usize) -> &[W] {
        &self.twiddle[stack * self.stack_len..(stack + 1) * self.stack_len]
    }
}

impl<W, V> StageFactor<V> for PlainFactor<'_, W>
where
    V: Element,
    W: Twiddle<V>,
{
    type Grad = W;

    fn stack_len(&self) -> usize {
        self.stack_len
    }

    fn apply_stage(&self, stack: usize, stage: Stage, row: &mut [V]) {
        let twiddle = self.stack(stack);
        stage.for_each_pair_mut(row, |low, x0, x1| {
            let [a, b, c, d] = self.layout.block_offsets(self.n, stage, low).map(|o| twiddle[o]);
            let (v0, v1) = (*x0, *x1);
            *x0 = a.mul_value(v0) + b.mul_value(v1);
            *x1 = c.mul_value(v0) + d.mul_value(v1);
        });
    }

    fn apply_stage_transpose(&self, stack: usize, stage: Stage, row: &mut [V]) {
        let twiddle = self.stack(stack);
        stage.for_each_pair_mut(row, |low, y0, y1| {
            let [a, b, c, d] = self.layout.block_offsets(self.n, stage, low).map(|o| twiddle[o]);
            let (v0, v1) = (*y0, *y1);
            *y0 = a.mul_value_adjoint(v0) + c.mul_value_adjoint(v1);
            *y1 = b.mul_value_adjoint(v0) + d.mul_value_adjoint(v1);
        });
    }

    fn accumulate_stage_gradient(
        &self,
        stack: usize,
        stage: Stage,
        stage_input: &[V],
        grad: &mut [V],
        d_stack: &mut [W],
    ) {
        let twiddle = self.stack(stack);
        stage.for_each_pair_with(stage_input, grad, |low, [x0, x1], g0, g1| {
            let offsets = self.layout.block_offsets(self.n, stage, low);
            let [a, b, c, d] = offsets.map(|o| twiddle[o]);
            let [da, db, dc, dd] = offsets;
            let (h0, h1) = (*g0, *g1);
            d_stack[da] += W::value_grad(h0, x0);
            d_stack[db] += W::value_grad(h0, x1);
            d_stack[dc] += W::value_grad(h1, x0);
            d_stack[dd] += W::value_grad(h1, x1);
            *g0 = a.mul_value_adjoint(h0) + c.mul_value_adjoint(h1);
            *g1 = b.mul_value_adjoint(h0) + d.mul_value_adjoint(h1);
        });
    }
}
