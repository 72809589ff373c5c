//! Enums for the command line interface of the demos.
//!
//! Each variant can be given by its full name or by any prefix which determines it, plus a few
//! short aliases.

use clap::ValueEnum;
use clap::builder::PossibleValue;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VariantOptions {
    Plain,
    Orthogonal,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrecisionOptions {
    F32,
    F64,
    ComplexF32,
    ComplexF64,
}

/// Largest `--log-n` the demos accept. Sizes past the kernel limits still get through, so the
/// kernels report them.
pub const MAX_LOG_N: usize = 20;

/// Parses a `log_2(n)` argument, rejecting values whose `n` could not be allocated.
pub fn parse_log_n(arg: &str) -> Result<usize, String> {
    let log_n: usize = arg.parse().map_err(|e| format!("`{arg}` is not a size: {e}"))?;
    if log_n > MAX_LOG_N {
        return Err(format!("log n must be at most {MAX_LOG_N}, got {log_n}"));
    }
    Ok(log_n)
}

/// A `PossibleValue` accepting `base`, every prefix of `base` of length at least
/// `min_unique_base_prefix`, and every prefix of each alias at least as long as its paired length.
///
/// For example `get_aliases("orthogonal", 1, Some(vec![("rotation", 1)]))` accepts
/// `o, or, ..., orthogonal` as well as `r, ro, ..., rotation`.
fn get_aliases(
    base: &'static str,
    min_unique_base_prefix: usize,
    alias: Option<Vec<(&'static str, usize)>>,
) -> PossibleValue {
    let prefixes = (min_unique_base_prefix..base.len()).map(|i| &base[..i]);
    match alias {
        None => PossibleValue::new(base).aliases(prefixes),
        Some(vec) => PossibleValue::new(base).aliases(prefixes.chain(
            vec.into_iter().flat_map(|(alias, min_unique)| {
                (min_unique..alias.len() + 1).map(|i| &alias[..i])
            }),
        )),
    }
}

impl ValueEnum for VariantOptions {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Plain, Self::Orthogonal]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Self::Plain => get_aliases("plain", 1, None),
            Self::Orthogonal => get_aliases("orthogonal", 1, Some(vec![("rotation", 1)])),
        })
    }
}

impl ValueEnum for PrecisionOptions {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::F32, Self::F64, Self::ComplexF32, Self::ComplexF64]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        // "f" alone is ambiguous, as is "complex-f".
        Some(match self {
            Self::F32 => get_aliases("f32", 2, Some(vec![("float", 2)])),
            Self::F64 => get_aliases("f64", 2, Some(vec![("double", 1)])),
            Self::ComplexF32 => get_aliases("complex-f32", 10, Some(vec![("c32", 2)])),
            Self::ComplexF64 => get_aliases("complex-f64", 10, Some(vec![("c64", 2)])),
        })
    }
}
