//! Butterfly multiplication: batched products of `log n` sparse butterfly stages, with the
//! gradients needed to train the stage parameters.
//!
//! Two parameterizations share one traversal: plain stacks of `2 x 2` blocks, and orthogonal
//! stacks of rotations given by their cosines and sines.

mod backend;
mod config;
mod engine;
mod error;
mod factor;
pub mod layout;
mod multiply;
mod ortho;
mod plain;
mod stride;
mod tape;
mod twiddle;
mod validate;

pub use backend::*;
pub use config::*;
pub use error::*;
pub use factor::*;
pub use layout::TwiddleLayout;
pub use multiply::*;
pub use ortho::*;
pub use plain::*;
pub use stride::*;
pub use tape::*;
pub use twiddle::*;
pub use validate::Dims;
