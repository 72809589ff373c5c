//! Dense tensors and the element types the butterfly kernels operate on.

mod dense;
mod device;
mod element;

pub use dense::*;
pub use device::*;
pub use element::*;
pub use num_complex::Complex;
