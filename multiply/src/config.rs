use serde::{Deserialize, Serialize};

/// Limits and tuning knobs shared by every operation of a [`ButterflyMultiply`].
///
/// [`ButterflyMultiply`]: crate::ButterflyMultiply
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplyConfig {
    /// Largest `n` for the plain forward pass, with or without intermediates.
    pub max_len_forward: usize,
    /// Largest `n` for the plain forward+backward pass, which keeps `n * log n` saved values per
    /// row alive.
    pub max_len_forward_backward: usize,
    /// Largest `n` for both orthogonal operations.
    pub max_len_ortho: usize,
    /// Batch elements per gradient partial. Parameter gradients are a sum of one partial per
    /// chunk, taken in chunk order, so this fixes the rounding of the result regardless of the
    /// number of threads.
    pub rows_per_chunk: usize,
}

impl Default for MultiplyConfig {
    fn default() -> Self {
        Self {
            max_len_forward: 16384,
            max_len_forward_backward: 4096,
            max_len_ortho: 16384,
            rows_per_chunk: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json() {
        let config = MultiplyConfig {
            rows_per_chunk: 3,
            ..MultiplyConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"max_len_forward_backward\":4096"));
        assert_eq!(serde_json::from_str::<MultiplyConfig>(&json).unwrap(), config);
    }
}
