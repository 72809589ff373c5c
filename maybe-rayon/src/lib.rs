//! Row-level parallelism for the butterfly engines.
//!
//! With the `parallel` feature this re-exports rayon's prelude. Without it, the same method names
//! resolve to ordinary slice iterators, so call sites are written once.

#![no_std]

#[cfg(feature = "parallel")]
pub mod prelude {
    pub use rayon::prelude::*;
}

#[cfg(not(feature = "parallel"))]
mod serial;

#[cfg(not(feature = "parallel"))]
pub mod prelude {
    pub use core::iter::{
        ExactSizeIterator as IndexedParallelIterator, Iterator as ParallelIterator,
    };

    pub use super::serial::*;
}
