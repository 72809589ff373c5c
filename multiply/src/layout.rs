//! Memory layouts of a plain twiddle stack.
//!
//! In both layouts, slab `log_stride` of stack `s` holds the factors of the stage with stride
//! `2^log_stride`, whatever order the stages are multiplied in.

use bfly_tensor::{Element, Tensor};
use bfly_util::checked_log2;

use crate::error::{ButterflyError, ButterflyResult, Operand, Operation};
use crate::stride::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TwiddleLayout {
    /// `(nstack, log_n, n / 2, 2, 2)`: the block `[[a, b], [c, d]]` of each pair, stored in pair
    /// index order.
    Paired,
    /// `(nstack, log_n, 2, n)`: row 0 holds each position's coefficient on itself, row 1 its
    /// coefficient on its partner.
    Fast,
}

impl TwiddleLayout {
    /// Infers the layout from the rank of a twiddle tensor.
    #[must_use]
    pub const fn detect(shape: &[usize]) -> Option<Self> {
        match shape.len() {
            5 => Some(Self::Paired),
            4 => Some(Self::Fast),
            _ => None,
        }
    }

    /// The shape a twiddle stack must have in this layout.
    #[must_use]
    pub fn shape(self, nstack: usize, log_n: usize, n: usize) -> Vec<usize> {
        match self {
            Self::Paired => vec![nstack, log_n, n / 2, 2, 2],
            Self::Fast => vec![nstack, log_n, 2, n],
        }
    }

    /// Number of twiddle entries per stack. Identical for both layouts.
    #[inline]
    #[must_use]
    pub const fn stack_len(log_n: usize, n: usize) -> usize {
        log_n * 2 * n
    }

    /// Offsets of `[a, b, c, d]` for the pair starting at `low`, relative to the start of a stack.
    #[inline]
    #[must_use]
    pub const fn block_offsets(self, n: usize, stage: Stage, low: usize) -> [usize; 4] {
        match self {
            Self::Paired => {
                let base = (stage.log_stride() * (n / 2) + stage.pair_index(low)) * 4;
                [base, base + 1, base + 2, base + 3]
            }
            Self::Fast => {
                let base = stage.log_stride() * 2 * n;
                let high = low + stage.stride();
                [base + low, base + n + low, base + n + high, base + high]
            }
        }
    }
}

/// Converts a `(nstack, log_n, n / 2, 2, 2)` twiddle stack to the `(nstack, log_n, 2, n)` layout.
pub fn to_fast_layout<W: Element>(twiddle: &Tensor<W>) -> ButterflyResult<Tensor<W>> {
    convert(twiddle, TwiddleLayout::Paired, TwiddleLayout::Fast)
}

/// Converts a `(nstack, log_n, 2, n)` twiddle stack to the `(nstack, log_n, n / 2, 2, 2)` layout.
pub fn to_paired_layout<W: Element>(twiddle: &Tensor<W>) -> ButterflyResult<Tensor<W>> {
    convert(twiddle, TwiddleLayout::Fast, TwiddleLayout::Paired)
}

fn convert<W: Element>(
    twiddle: &Tensor<W>,
    from: TwiddleLayout,
    to: TwiddleLayout,
) -> ButterflyResult<Tensor<W>> {
    let (nstack, log_n, n) = stack_dims(twiddle.shape(), from).ok_or_else(|| {
        ButterflyError::ShapeMismatch {
            op: Operation::ConvertLayout,
            operand: Operand::Twiddle,
            expected: match from {
                TwiddleLayout::Paired => "(nstack, log n, n / 2, 2, 2) with n >= 2".into(),
                TwiddleLayout::Fast => "(nstack, log n, 2, n) with n >= 2".into(),
            },
            found: twiddle.shape().to_vec(),
        }
    })?;

    let stack_len = TwiddleLayout::stack_len(log_n, n);
    let src = twiddle.values();
    let mut dst = vec![W::zero(); src.len()];
    for (src_stack, dst_stack) in src
        .chunks_exact(stack_len)
        .zip(dst.chunks_exact_mut(stack_len))
    {
        for stage in (0..log_n).map(Stage::new) {
            for (low, _) in stage.pairs(n) {
                let src_offsets = from.block_offsets(n, stage, low);
                let dst_offsets = to.block_offsets(n, stage, low);
                for (s, d) in src_offsets.into_iter().zip(dst_offsets) {
                    dst_stack[d] = src_stack[s];
                }
            }
        }
    }

    Ok(Tensor::new(dst, to.shape(nstack, log_n, n)).with_device(twiddle.device()))
}

/// Reads `(nstack, log_n, n)` off a twiddle shape in the given layout.
fn stack_dims(shape: &[usize], layout: TwiddleLayout) -> Option<(usize, usize, usize)> {
    let (nstack, log_n, n) = match (layout, shape) {
        (TwiddleLayout::Paired, &[nstack, log_n, half, 2, 2]) => (nstack, log_n, 2 * half),
        (TwiddleLayout::Fast, &[nstack, log_n, 2, n]) => (nstack, log_n, n),
        _ => return None,
    };
    (checked_log2(n) == Some(log_n) && n >= 2).then_some((nstack, log_n, n))
}
