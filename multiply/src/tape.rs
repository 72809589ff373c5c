//! Forward passes that remember how to differentiate themselves.

use bfly_tensor::{Element, RealElement, Tensor};

use crate::backend::Backend;
use crate::error::ButterflyResult;
use crate::multiply::ButterflyMultiply;
use crate::twiddle::Twiddle;

/// Record of a plain forward pass, returned by [`ButterflyMultiply::forward_taped`].
///
/// Borrows the twiddle and the input, so neither can change before the backward pass.
#[derive(Clone, Copy, Debug)]
pub struct ButterflyTape<'a, W, V> {
    twiddle: &'a Tensor<W>,
    input: &'a Tensor<V>,
    increasing_stride: bool,
}

impl<'a, W, V> ButterflyTape<'a, W, V>
where
    V: Element,
    W: Twiddle<V>,
{
    pub(crate) const fn new(
        twiddle: &'a Tensor<W>,
        input: &'a Tensor<V>,
        increasing_stride: bool,
    ) -> Self {
        Self {
            twiddle,
            input,
            increasing_stride,
        }
    }

    pub const fn increasing_stride(&self) -> bool {
        self.increasing_stride
    }

    /// `(d_twiddle, d_input)` for the output gradient `grad`.
    pub fn backward<B: Backend>(
        &self,
        multiply: &ButterflyMultiply<B>,
        grad: &Tensor<V>,
    ) -> ButterflyResult<(Tensor<W>, Tensor<V>)> {
        multiply.forward_backward(self.twiddle, self.input, grad, self.increasing_stride)
    }
}

/// Record of an orthogonal forward pass, returned by [`ButterflyMultiply::ortho_forward_taped`].
///
/// Keeps only the angles and the output; stage inputs are rebuilt from the output.
#[derive(Clone, Debug)]
pub struct OrthoTape<'a, R, V> {
    cos: &'a Tensor<R>,
    sin: &'a Tensor<R>,
    output: Tensor<V>,
    increasing_stride: bool,
}

impl<'a, R, V> OrthoTape<'a, R, V>
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
    pub(crate) const fn new(
        cos: &'a Tensor<R>,
        sin: &'a Tensor<R>,
        output: Tensor<V>,
        increasing_stride: bool,
    ) -> Self {
        Self {
            cos,
            sin,
            output,
            increasing_stride,
        }
    }

    pub const fn increasing_stride(&self) -> bool {
        self.increasing_stride
    }

    pub const fn output(&self) -> &Tensor<V> {
        &self.output
    }

    /// `(d_theta, d_input)` for the output gradient `grad`.
    pub fn backward<B: Backend>(
        &self,
        multiply: &ButterflyMultiply<B>,
        grad: &Tensor<V>,
    ) -> ButterflyResult<(Tensor<R>, Tensor<V>)> {
        multiply.ortho_backward(self.cos, self.sin, &self.output, grad, self.increasing_stride)
    }
}
