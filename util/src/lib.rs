//! Various simple utilities.

#![no_std]

extern crate alloc;

use core::hint::unreachable_unchecked;

/// Computes `log_2(n)`
///
/// # Panics
/// Panics if `n` is not a power of two.
#[must_use]
#[inline]
pub fn log2_strict_usize(n: usize) -> usize {
    let res = n.trailing_zeros();
    assert_eq!(n.wrapping_shr(res), 1, "Not a power of two: {n}");
    assume(n == 1 << res);
    res as usize
}

/// Computes `log_2(n)` if `n` is a power of two, `None` otherwise.
#[must_use]
#[inline]
pub const fn checked_log2(n: usize) -> Option<usize> {
    if n.is_power_of_two() {
        Some(n.trailing_zeros() as usize)
    } else {
        None
    }
}

#[inline]
pub const fn reverse_bits_len(x: usize, bit_len: usize) -> usize {
    // `overflowing_shr` covers `bit_len == 0`, where the shift amount equals the word size.
    x.reverse_bits()
        .overflowing_shr(usize::BITS - bit_len as u32)
        .0
}

/// Permutes `vals` such that each index is mapped to its reverse in binary.
///
/// # Panics
/// Panics if the length is neither zero nor a power of two.
pub fn reverse_slice_index_bits<T>(vals: &mut [T]) {
    let n = vals.len();
    if n == 0 {
        return;
    }
    let log_n = log2_strict_usize(n);
    for src in 0..n {
        let dst = reverse_bits_len(src, log_n);
        if src < dst {
            vals.swap(src, dst);
        }
    }
}

#[inline(always)]
pub fn assume(p: bool) {
    debug_assert!(p);
    if !p {
        unsafe {
            unreachable_unchecked();
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_log2_strict_usize() {
        assert_eq!(log2_strict_usize(1), 0);
        assert_eq!(log2_strict_usize(2), 1);
        assert_eq!(log2_strict_usize(1 << 14), 14);
        assert_eq!(log2_strict_usize(1 << 31), 31);
    }

    #[test]
    #[should_panic]
    fn test_log2_strict_usize_rejects_non_power() {
        let _ = log2_strict_usize(12);
    }

    #[test]
    fn test_checked_log2() {
        assert_eq!(checked_log2(0), None);
        assert_eq!(checked_log2(1), Some(0));
        assert_eq!(checked_log2(4096), Some(12));
        assert_eq!(checked_log2(4097), None);
        assert_eq!(checked_log2(3 << 4), None);
    }

    #[test]
    fn test_reverse_bits_len() {
        assert_eq!(reverse_bits_len(0b0001, 4), 0b1000);
        assert_eq!(reverse_bits_len(0b0110, 4), 0b0110);
        assert_eq!(reverse_bits_len(0b1011, 4), 0b1101);
        assert_eq!(reverse_bits_len(0, 0), 0);
        assert_eq!(reverse_bits_len(3, 3), 6);
    }

    #[test]
    fn test_reverse_slice_index_bits_is_involution() {
        let mut rng = SmallRng::seed_from_u64(1);
        for log_n in 0..10 {
            let original: Vec<u32> = (0..1 << log_n).map(|_| rng.random()).collect();
            let mut vals = original.clone();
            reverse_slice_index_bits(&mut vals);
            for (i, v) in vals.iter().enumerate() {
                assert_eq!(*v, original[reverse_bits_len(i, log_n)]);
            }
            reverse_slice_index_bits(&mut vals);
            assert_eq!(vals, original);
        }
    }
}
