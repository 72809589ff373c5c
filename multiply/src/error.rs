//! Errors reported by the butterfly operations.

use core::fmt::{self, Display};

use bfly_tensor::Device;
use thiserror::Error;

use crate::MultiplyConfig;

/// The public operation a failure was raised by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Forward,
    ForwardIntermediates,
    ForwardBackward,
    OrthoForward,
    OrthoBackward,
    ConvertLayout,
}

impl Operation {
    /// The largest `n` this operation accepts under `config`, if it has a ceiling.
    #[must_use]
    pub const fn max_len(self, config: &MultiplyConfig) -> Option<usize> {
        match self {
            Self::Forward | Self::ForwardIntermediates => Some(config.max_len_forward),
            Self::ForwardBackward => Some(config.max_len_forward_backward),
            Self::OrthoForward | Self::OrthoBackward => Some(config.max_len_ortho),
            Self::ConvertLayout => None,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Forward => "butterfly forward",
            Self::ForwardIntermediates => "butterfly forward with intermediates",
            Self::ForwardBackward => "butterfly forward+backward",
            Self::OrthoForward => "orthogonal butterfly forward",
            Self::OrthoBackward => "orthogonal butterfly backward",
            Self::ConvertLayout => "twiddle layout conversion",
        };
        f.write_str(name)
    }
}

/// The argument a failure refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Twiddle,
    TwiddleCos,
    TwiddleSin,
    Input,
    Output,
    Grad,
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Twiddle => "twiddle",
            Self::TwiddleCos => "twiddle_cos",
            Self::TwiddleSin => "twiddle_sin",
            Self::Input => "input",
            Self::Output => "output",
            Self::Grad => "grad",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ButterflyError {
    /// An operand has the wrong rank or size, or `n` is not a power of two.
    #[error("{op}: {operand} must have shape {expected}, got {found:?}")]
    ShapeMismatch {
        op: Operation,
        operand: Operand,
        expected: String,
        found: Vec<usize>,
    },

    #[error("{op}: {operand} is on {found} but the input is on {expected}")]
    DeviceMismatch {
        op: Operation,
        operand: Operand,
        expected: Device,
        found: Device,
    },

    #[error("{op}: n = {n} exceeds the supported maximum of {max}")]
    SizeLimitExceeded { op: Operation, n: usize, max: usize },

    #[error("{op}: backend `{backend}` cannot run on {device}")]
    UnsupportedDevice {
        op: Operation,
        backend: &'static str,
        device: Device,
    },
}

pub type ButterflyResult<T> = core::result::Result<T, ButterflyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation_and_operand() {
        let err = ButterflyError::ShapeMismatch {
            op: Operation::OrthoForward,
            operand: Operand::TwiddleSin,
            expected: "(2, 3, 4)".into(),
            found: vec![2, 3, 5],
        };
        assert_eq!(
            err.to_string(),
            "orthogonal butterfly forward: twiddle_sin must have shape (2, 3, 4), got [2, 3, 5]"
        );

        let err = ButterflyError::SizeLimitExceeded {
            op: Operation::ForwardBackward,
            n: 8192,
            max: 4096,
        };
        assert_eq!(
            err.to_string(),
            "butterfly forward+backward: n = 8192 exceeds the supported maximum of 4096"
        );

        let err = ButterflyError::DeviceMismatch {
            op: Operation::Forward,
            operand: Operand::Twiddle,
            expected: Device::Cpu,
            found: Device::Cuda(0),
        };
        assert_eq!(
            err.to_string(),
            "butterfly forward: twiddle is on cuda:0 but the input is on cpu"
        );
    }

    #[test]
    fn ceilings_follow_the_config() {
        let config = MultiplyConfig::default();
        assert_eq!(Operation::Forward.max_len(&config), Some(16384));
        assert_eq!(Operation::ForwardIntermediates.max_len(&config), Some(16384));
        assert_eq!(Operation::ForwardBackward.max_len(&config), Some(4096));
        assert_eq!(Operation::OrthoBackward.max_len(&config), Some(16384));
        assert_eq!(Operation::ConvertLayout.max_len(&config), None);
    }
}
