//! Argument checks run before any computation.

use bfly_tensor::Device;
use bfly_util::checked_log2;

use crate::backend::Backend;
use crate::error::{ButterflyError, ButterflyResult, Operand, Operation};
use crate::layout::TwiddleLayout;
use crate::MultiplyConfig;

/// Dimensions of a validated `(batch, nstack, n)` operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dims {
    pub batch: usize,
    pub nstack: usize,
    pub n: usize,
    pub log_n: usize,
}

impl Dims {
    /// Number of length-`n` rows, `batch * nstack`.
    #[inline]
    pub const fn rows(&self) -> usize {
        self.batch * self.nstack
    }
}

/// Reads `(batch, nstack, n)` off the operand that drives an operation, checking rank, the size
/// ceiling of `op`, and that `n` is a power of two, in that order.
pub fn batch_dims(
    op: Operation,
    operand: Operand,
    shape: &[usize],
    config: &MultiplyConfig,
) -> ButterflyResult<Dims> {
    let &[batch, nstack, n] = shape else {
        return Err(ButterflyError::ShapeMismatch {
            op,
            operand,
            expected: "(batch, nstack, n)".into(),
            found: shape.to_vec(),
        });
    };
    if let Some(max) = op.max_len(config)
        && n > max
    {
        return Err(ButterflyError::SizeLimitExceeded { op, n, max });
    }
    let log_n = checked_log2(n).ok_or_else(|| ButterflyError::ShapeMismatch {
        op,
        operand,
        expected: format!("(batch, nstack, n) with n a power of two, n = {n}"),
        found: shape.to_vec(),
    })?;
    Ok(Dims {
        batch,
        nstack,
        n,
        log_n,
    })
}

pub fn same_device(
    op: Operation,
    expected: Device,
    operand: Operand,
    found: Device,
) -> ButterflyResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(ButterflyError::DeviceMismatch {
            op,
            operand,
            expected,
            found,
        })
    }
}

pub fn backend_supports<B: Backend>(
    op: Operation,
    backend: &B,
    device: Device,
) -> ButterflyResult<()> {
    if backend.supports(device) {
        Ok(())
    } else {
        Err(ButterflyError::UnsupportedDevice {
            op,
            backend: backend.name(),
            device,
        })
    }
}

/// Detects the layout of a plain twiddle stack and checks it against `dims`.
pub fn twiddle_layout(
    op: Operation,
    shape: &[usize],
    dims: Dims,
) -> ButterflyResult<TwiddleLayout> {
    let expected_paired = TwiddleLayout::Paired.shape(dims.nstack, dims.log_n, dims.n);
    let expected_fast = TwiddleLayout::Fast.shape(dims.nstack, dims.log_n, dims.n);
    match TwiddleLayout::detect(shape) {
        Some(TwiddleLayout::Paired) if shape == expected_paired.as_slice() => {
            Ok(TwiddleLayout::Paired)
        }
        Some(TwiddleLayout::Fast) if shape == expected_fast.as_slice() => Ok(TwiddleLayout::Fast),
        _ => Err(ButterflyError::ShapeMismatch {
            op,
            operand: Operand::Twiddle,
            expected: format!("{expected_paired:?} or {expected_fast:?}"),
            found: shape.to_vec(),
        }),
    }
}

/// Checks a cos or sin tensor against `(nstack, log_n, n / 2)`.
pub fn angle_shape(
    op: Operation,
    operand: Operand,
    shape: &[usize],
    dims: Dims,
) -> ButterflyResult<()> {
    let expected = [dims.nstack, dims.log_n, dims.n / 2];
    if shape == expected {
        Ok(())
    } else {
        Err(ButterflyError::ShapeMismatch {
            op,
            operand,
            expected: format!("{expected:?}"),
            found: shape.to_vec(),
        })
    }
}

/// Checks that a gradient has the shape of the batch it belongs to.
pub fn matches_batch(
    op: Operation,
    operand: Operand,
    shape: &[usize],
    dims: Dims,
) -> ButterflyResult<()> {
    let expected = [dims.batch, dims.nstack, dims.n];
    if shape == expected {
        Ok(())
    } else {
        Err(ButterflyError::ShapeMismatch {
            op,
            operand,
            expected: format!("{expected:?}"),
            found: shape.to_vec(),
        })
    }
}
