use core::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Placement tag of a tensor.
///
/// Storage is always host memory; the tag records where the owning framework placed the tensor
/// so that operands can be checked for agreement and backends can refuse placements they cannot
/// serve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl Device {
    #[must_use]
    pub const fn is_cpu(self) -> bool {
        matches!(self, Self::Cpu)
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}
