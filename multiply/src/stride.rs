use itertools::izip;

/// One butterfly stage: pairs positions that are `stride = 2^log_stride` apart.
///
/// The positions of a length-`n` vector are split into `n / (2 * stride)` groups of `2 * stride`
/// contiguous entries. Offset `k` of a group's low half pairs with offset `k` of its high half.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Stage {
    log_stride: usize,
}

impl Stage {
    #[must_use]
    pub const fn new(log_stride: usize) -> Self {
        Self { log_stride }
    }

    /// Index of the twiddle slab holding this stage's factors.
    #[inline]
    pub const fn log_stride(self) -> usize {
        self.log_stride
    }

    #[inline]
    pub const fn stride(self) -> usize {
        1 << self.log_stride
    }

    /// Index of the pair whose low position is `low`, counting pairs group by group.
    #[inline]
    pub const fn pair_index(self, low: usize) -> usize {
        ((low >> (self.log_stride + 1)) << self.log_stride) | (low & (self.stride() - 1))
    }

    /// The `n / 2` `(low, high)` pairs of this stage, in group order.
    pub fn pairs(self, n: usize) -> impl Iterator<Item = (usize, usize)> {
        let stride = self.stride();
        (0..n)
            .step_by(2 * stride)
            .flat_map(move |start| (start..start + stride).map(move |low| (low, low + stride)))
    }

    /// Calls `f(low, x_low, x_high)` for every pair of `values`.
    #[inline]
    pub fn for_each_pair_mut<V, F>(self, values: &mut [V], mut f: F)
    where
        F: FnMut(usize, &mut V, &mut V),
    {
        let stride = self.stride();
        for (group, block) in values.chunks_exact_mut(2 * stride).enumerate() {
            let (lo, hi) = block.split_at_mut(stride);
            let start = group * 2 * stride;
            for (k, (x_lo, x_hi)) in lo.iter_mut().zip(hi).enumerate() {
                f(start + k, x_lo, x_hi);
            }
        }
    }

    /// Calls `f(low, [x_low, x_high], g_low, g_high)` for every pair, reading the positions of
    /// `values` and updating the same positions of `grads`.
    #[inline]
    pub fn for_each_pair_with<V: Copy, G, F>(self, values: &[V], grads: &mut [G], mut f: F)
    where
        F: FnMut(usize, [V; 2], &mut G, &mut G),
    {
        debug_assert_eq!(values.len(), grads.len());
        let stride = self.stride();
        let blocks = values
            .chunks_exact(2 * stride)
            .zip(grads.chunks_exact_mut(2 * stride));
        for (group, (x_block, g_block)) in blocks.enumerate() {
            let (x_lo, x_hi) = x_block.split_at(stride);
            let (g_lo, g_hi) = g_block.split_at_mut(stride);
            let start = group * 2 * stride;
            for (k, &x0, &x1, g0, g1) in izip!(0.., x_lo, x_hi, g_lo, g_hi) {
                f(start + k, [x0, x1], g0, g1);
            }
        }
    }
}

/// The order in which the `log_n` stages of a butterfly stack are multiplied.
///
/// `increasing_stride` walks strides `1, 2, ..., n/2`; otherwise `n/2, ..., 2, 1`. The flag only
/// changes the order of the stages, never which twiddle slab a stride reads. A backward pass must
/// use the schedule of its forward pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageSchedule {
    log_n: usize,
    increasing_stride: bool,
}

impl StageSchedule {
    #[must_use]
    pub const fn new(log_n: usize, increasing_stride: bool) -> Self {
        Self {
            log_n,
            increasing_stride,
        }
    }

    /// # Panics
    /// Panics if `n` is not a power of two.
    #[must_use]
    pub fn for_len(n: usize, increasing_stride: bool) -> Self {
        Self::new(bfly_util::log2_strict_usize(n), increasing_stride)
    }

    #[inline]
    pub const fn log_n(&self) -> usize {
        self.log_n
    }

    #[inline]
    pub const fn increasing_stride(&self) -> bool {
        self.increasing_stride
    }

    /// The same stages multiplied in the opposite direction.
    #[must_use]
    pub const fn reversed(&self) -> Self {
        Self::new(self.log_n, !self.increasing_stride)
    }

    /// Stages in multiplication order. Reverse the iterator for a backward pass.
    pub fn stages(&self) -> impl DoubleEndedIterator<Item = Stage> + ExactSizeIterator + use<> {
        let log_n = self.log_n;
        let increasing = self.increasing_stride;
        (0..log_n).map(move |t| Stage::new(if increasing { t } else { log_n - 1 - t }))
    }

    pub fn strides(&self) -> Vec<usize> {
        self.stages().map(Stage::stride).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_and_decreasing_strides() {
        assert_eq!(StageSchedule::for_len(16, true).strides(), vec![1, 2, 4, 8]);
        assert_eq!(StageSchedule::for_len(16, false).strides(), vec![8, 4, 2, 1]);
        assert_eq!(StageSchedule::for_len(1, true).strides(), Vec::<usize>::new());
        assert_eq!(StageSchedule::for_len(2, false).strides(), vec![1]);
    }

    #[test]
    fn backward_walk_is_the_forward_walk_reversed() {
        let schedule = StageSchedule::for_len(64, true);
        let mut backward: Vec<_> = schedule.stages().rev().collect();
        backward.reverse();
        assert_eq!(backward, schedule.stages().collect::<Vec<_>>());
        assert_eq!(
            schedule.reversed().strides(),
            schedule.stages().rev().map(Stage::stride).collect::<Vec<_>>()
        );
    }

    #[test]
    fn every_stage_partitions_all_positions() {
        for log_n in 1..=14 {
            let n = 1 << log_n;
            for increasing_stride in [true, false] {
                let schedule = StageSchedule::new(log_n, increasing_stride);
                assert_eq!(schedule.stages().len(), log_n);
                for stage in schedule.stages() {
                    let mut seen = vec![false; n];
                    let mut pair_seen = vec![false; n / 2];
                    let mut count = 0;
                    for (low, high) in stage.pairs(n) {
                        assert_eq!(high - low, stage.stride());
                        assert!(!seen[low] && !seen[high]);
                        seen[low] = true;
                        seen[high] = true;
                        let j = stage.pair_index(low);
                        assert!(!pair_seen[j]);
                        pair_seen[j] = true;
                        count += 1;
                    }
                    assert_eq!(count, n / 2);
                    assert!(seen.iter().all(|&s| s));
                }
            }
        }
    }

    #[test]
    fn pair_index_counts_group_by_group() {
        let stage = Stage::new(1);
        let lows: Vec<_> = stage.pairs(8).map(|(low, _)| low).collect();
        assert_eq!(lows, vec![0, 1, 4, 5]);
        let indices: Vec<_> = lows.iter().map(|&low| stage.pair_index(low)).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn pair_visitors_agree_with_pairs() {
        let n = 16;
        for log_stride in 0..4 {
            let stage = Stage::new(log_stride);
            let expected: Vec<_> = stage.pairs(n).collect();

            let mut values: Vec<usize> = (0..n).collect();
            let mut visited = vec![];
            stage.for_each_pair_mut(&mut values, |low, x0, x1| {
                visited.push((low, *x0, *x1));
                core::mem::swap(x0, x1);
            });
            let visited_pairs: Vec<_> = visited.iter().map(|&(_, a, b)| (a, b)).collect();
            assert_eq!(visited_pairs, expected);
            assert!(visited.iter().all(|&(low, a, _)| low == a));
            for (low, high) in stage.pairs(n) {
                assert_eq!(values[low], high);
            }

            let positions: Vec<usize> = (0..n).collect();
            let mut grads: Vec<usize> = (0..n).map(|i| 100 + i).collect();
            let mut read = vec![];
            stage.for_each_pair_with(&positions, &mut grads, |low, x, g0, g1| {
                read.push((low, x, [*g0, *g1]));
                *g0 = 0;
            });
            for (&(low, high), (l, x, g)) in expected.iter().zip(read) {
                assert_eq!(low, l);
                assert_eq!(x, [low, high]);
                assert_eq!(g, [100 + low, 100 + high]);
                assert_eq!(grads[low], 0);
                assert_eq!(grads[high], 100 + high);
            }
        }
    }
}
