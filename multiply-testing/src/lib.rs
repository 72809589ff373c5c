//! Utilities for testing butterfly multiply backends.
//!
//! Each `test_*` function checks one property of [`ButterflyMultiply`] for a given pair of twiddle
//! and value types, so that every backend and element type can be run through the same suite.

mod reference;

use core::ops::Div;

use bfly_multiply::{ButterflyMultiply, MultiplyConfig, Twiddle, layout};
use bfly_tensor::{Complex, DType, Element, RealElement, Tensor};
use bfly_util::reverse_slice_index_bits;
use rand::SeedableRng;
use rand::rngs::SmallRng;
pub use reference::*;

/// `(batch, nstack)` combinations exercised by the property tests.
const BATCH_SHAPES: [(usize, usize); 3] = [(1, 1), (4, 1), (3, 2)];

fn is_single<R: RealElement>() -> bool {
    R::DTYPE == DType::F32
}

/// Largest `|a - b|` relative to `1 + max |b|`.
pub fn relative_error<V: Element>(actual: &Tensor<V>, expected: &Tensor<V>) -> f64 {
    let scale = expected
        .values()
        .iter()
        .map(|&x| x.norm_sqr().as_f64().sqrt())
        .fold(0.0, f64::max);
    actual.max_abs_diff(expected).as_f64() / (1.0 + scale)
}

fn assert_close<V: Element>(actual: &Tensor<V>, expected: &Tensor<V>, tol: f64, what: &str) {
    let err = relative_error(actual, expected);
    assert!(err <= tol, "{what}: relative error {err:e} above {tol:e}");
}

/// Tolerance for comparing results that only differ by rounding.
fn rounding_tolerance<R: RealElement>() -> f64 {
    if is_single::<R>() { 1e-4 } else { 1e-11 }
}

/// `L = Re sum conj(u) y`, whose gradient with respect to `y` is `u`.
pub fn loss<V: Element>(u: &Tensor<V>, y: &Tensor<V>) -> f64 {
    u.values()
        .iter()
        .zip(y.values())
        .map(|(&u, &y)| (u.re() * y.re() + u.im() * y.im()).as_f64())
        .sum()
}

/// Largest disagreement between `analytic` and central differences of `loss_at` around `param`,
/// measured as `|numeric - analytic| / (1 + |analytic|)` per real component.
pub fn gradient_error<T: Element>(
    param: &Tensor<T>,
    analytic: &Tensor<T>,
    h: f64,
    mut loss_at: impl FnMut(&Tensor<T>) -> f64,
) -> f64 {
    assert_eq!(param.shape(), analytic.shape());
    let step = <T::Real as RealElement>::from_f64(h);
    let zero = <T::Real as RealElement>::from_f64(0.0);
    let mut worst = 0.0_f64;
    for i in 0..param.len() {
        for component in 0..T::COMPONENTS {
            let delta = if component == 0 {
                T::from_parts(step, zero)
            } else {
                T::from_parts(zero, step)
            };
            let mut plus = param.clone();
            plus.values_mut()[i] += delta;
            let mut minus = param.clone();
            minus.values_mut()[i] -= delta;
            let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * step.as_f64());
            let g = analytic.values()[i];
            let exact = (if component == 0 { g.re() } else { g.im() }).as_f64();
            worst = worst.max((numeric - exact).abs() / (1.0 + exact.abs()));
        }
    }
    worst
}

/// Step and tolerance of the finite difference checks.
fn finite_difference<R: RealElement>() -> (f64, f64) {
    if is_single::<R>() { (1e-2, 1e-2) } else { (1e-6, 1e-4) }
}

fn random_angles<R: RealElement>(rng: &mut SmallRng, nstack: usize, n: usize) -> Tensor<R> {
    let log_n = bfly_util::log2_strict_usize(n);
    let unit = Tensor::<R>::rand(rng, [nstack, log_n, n / 2]);
    unit.map(|&t| t * R::PI())
}

fn cos_sin<R: RealElement>(theta: &Tensor<R>) -> (Tensor<R>, Tensor<R>) {
    (theta.map(|t| t.cos()), theta.map(|t| t.sin()))
}

fn paired_shape(nstack: usize, n: usize) -> [usize; 5] {
    [nstack, bfly_util::log2_strict_usize(n), n / 2, 2, 2]
}

/// Identity plus a small random perturbation in every block, so that every block is comfortably
/// invertible.
fn well_conditioned<W: Element>(rng: &mut SmallRng, nstack: usize, n: usize) -> Tensor<W> {
    let mut twiddle = Tensor::<W>::rand(rng, paired_shape(nstack, n));
    let quarter = W::from_real(<W::Real as RealElement>::from_f64(0.25));
    for block in twiddle.values_mut().chunks_exact_mut(4) {
        for (i, t) in block.iter_mut().enumerate() {
            *t *= quarter;
            if i == 0 || i == 3 {
                *t += W::one();
            }
        }
    }
    twiddle
}

pub fn test_forward_matches_dense<W, V>()
where
    V: Element,
    W: Twiddle<V>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(1);
    for log_n in 0..=6 {
        let n = 1 << log_n;
        for (batch, nstack) in BATCH_SHAPES {
            for increasing_stride in [true, false] {
                let twiddle = well_conditioned::<W>(&mut rng, nstack, n);
                let input = Tensor::<V>::rand(&mut rng, [batch, nstack, n]);
                let output = multiply.forward(&twiddle, &input, increasing_stride).unwrap();
                let expected = dense_forward(&twiddle, &input, increasing_stride);
                assert_close(
                    &output,
                    &expected,
                    rounding_tolerance::<V::Real>(),
                    &format!("n = {n}, nstack = {nstack}, increasing = {increasing_stride}"),
                );
            }
        }
    }
}

/// Multiplying by a stack and then by its inverse, in the opposite order, recovers the input.
pub fn test_inverse_reconstruction<W, V>()
where
    V: Element,
    W: Twiddle<V> + Div<Output = W>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(2);
    for log_n in 1..=8 {
        let n = 1 << log_n;
        for (batch, nstack) in BATCH_SHAPES {
            for increasing_stride in [true, false] {
                let twiddle = well_conditioned::<W>(&mut rng, nstack, n);
                let mut inverse = twiddle.clone();
                for block in inverse.values_mut().chunks_exact_mut(4) {
                    let [a, b, c, d] = [block[0], block[1], block[2], block[3]];
                    let det = a * d - b * c;
                    block.copy_from_slice(&[d / det, -b / det, -c / det, a / det]);
                }
                let input = Tensor::<V>::rand(&mut rng, [batch, nstack, n]);
                let output = multiply.forward(&twiddle, &input, increasing_stride).unwrap();
                let restored = multiply.forward(&inverse, &output, !increasing_stride).unwrap();
                assert_close(
                    &restored,
                    &input,
                    rounding_tolerance::<V::Real>() * 10.0,
                    &format!("plain inverse, n = {n}"),
                );
            }
        }
    }
}

/// Rotating by `theta` and then by `-theta`, in the opposite order, recovers the input.
pub fn test_ortho_inverse_reconstruction<R, V>()
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(3);
    for log_n in 1..=8 {
        let n = 1 << log_n;
        for (batch, nstack) in BATCH_SHAPES {
            for increasing_stride in [true, false] {
                let (cos, sin) = cos_sin(&random_angles::<R>(&mut rng, nstack, n));
                let neg_sin = sin.map(|&s| -s);
                let input = Tensor::<V>::rand(&mut rng, [batch, nstack, n]);
                let output = multiply.ortho_forward(&cos, &sin, &input, increasing_stride).unwrap();
                let restored = multiply
                    .ortho_forward(&cos, &neg_sin, &output, !increasing_stride)
                    .unwrap();
                assert_close(
                    &restored,
                    &input,
                    rounding_tolerance::<R>(),
                    &format!("orthogonal inverse, n = {n}"),
                );
            }
        }
    }
}

/// The orthogonal forward pass agrees with the dense model of its rotation blocks.
pub fn test_ortho_matches_dense<R, V>()
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(4);
    for log_n in 0..=5 {
        let n = 1 << log_n;
        for (batch, nstack) in BATCH_SHAPES {
            for increasing_stride in [true, false] {
                let (cos, sin) = cos_sin(&random_angles::<R>(&mut rng, nstack, n));
                let input = Tensor::<V>::rand(&mut rng, [batch, nstack, n]);
                let output = multiply.ortho_forward(&cos, &sin, &input, increasing_stride).unwrap();
                let expected = dense_forward(&ortho_as_plain(&cos, &sin), &input, increasing_stride);
                assert_close(&output, &expected, rounding_tolerance::<R>(), "orthogonal dense");
            }
        }
    }
}

pub fn test_ortho_preserves_norm<R, V>()
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(5);
    for log_n in 0..=10 {
        let n = 1 << log_n;
        let (cos, sin) = cos_sin(&random_angles::<R>(&mut rng, 2, n));
        for increasing_stride in [true, false] {
            let input = Tensor::<V>::rand(&mut rng, [3, 2, n]);
            let output = multiply.ortho_forward(&cos, &sin, &input, increasing_stride).unwrap();
            let before = input.norm_sqr().as_f64().sqrt();
            let after = output.norm_sqr().as_f64().sqrt();
            let tol = if is_single::<R>() { 1e-4 } else { 1e-12 };
            assert!(
                (after - before).abs() <= tol * before,
                "n = {n}: norm {before} became {after}"
            );
        }
    }
}

/// `forward_backward` agrees with central differences of [`loss`].
pub fn test_plain_gradients<W, V>()
where
    V: Element,
    W: Twiddle<V>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(6);
    let (h, tol) = finite_difference::<V::Real>();
    for log_n in 0..=3 {
        let n = 1 << log_n;
        for increasing_stride in [true, false] {
            let twiddle = Tensor::<W>::rand(&mut rng, paired_shape(2, n));
            let input = Tensor::<V>::rand(&mut rng, [2, 2, n]);
            let u = Tensor::<V>::rand(&mut rng, [2, 2, n]);
            let (d_twiddle, d_input) = multiply
                .forward_backward(&twiddle, &input, &u, increasing_stride)
                .unwrap();

            let err = gradient_error(&twiddle, &d_twiddle, h, |t| {
                loss(&u, &multiply.forward(t, &input, increasing_stride).unwrap())
            });
            assert!(err <= tol, "d_twiddle, n = {n}: error {err:e}");

            let err = gradient_error(&input, &d_input, h, |x| {
                loss(&u, &multiply.forward(&twiddle, x, increasing_stride).unwrap())
            });
            assert!(err <= tol, "d_input, n = {n}: error {err:e}");
        }
    }
}

/// `ortho_backward` agrees with central differences of [`loss`] taken through the angles.
pub fn test_ortho_gradients<R, V>()
where
    V: Element,
    R: RealElement + Twiddle<V>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(7);
    let (h, tol) = finite_difference::<R>();
    for log_n in 0..=3 {
        let n = 1 << log_n;
        for increasing_stride in [true, false] {
            let theta = random_angles::<R>(&mut rng, 2, n);
            let (cos, sin) = cos_sin(&theta);
            let input = Tensor::<V>::rand(&mut rng, [2, 2, n]);
            let u = Tensor::<V>::rand(&mut rng, [2, 2, n]);
            let output = multiply.ortho_forward(&cos, &sin, &input, increasing_stride).unwrap();
            let (d_theta, d_input) = multiply
                .ortho_backward(&cos, &sin, &output, &u, increasing_stride)
                .unwrap();

            let err = gradient_error(&theta, &d_theta, h, |t| {
                let (cos, sin) = cos_sin(t);
                loss(&u, &multiply.ortho_forward(&cos, &sin, &input, increasing_stride).unwrap())
            });
            assert!(err <= tol, "d_theta, n = {n}: error {err:e}");

            let err = gradient_error(&input, &d_input, h, |x| {
                loss(&u, &multiply.ortho_forward(&cos, &sin, x, increasing_stride).unwrap())
            });
            assert!(err <= tol, "d_input, n = {n}: error {err:e}");
        }
    }
}

/// Both plain layouts give the same output, and gradients that convert into each other.
pub fn test_layouts_agree<W, V>()
where
    V: Element,
    W: Twiddle<V>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(8);
    for log_n in 1..=7 {
        let n = 1 << log_n;
        for increasing_stride in [true, false] {
            let paired = Tensor::<W>::rand(&mut rng, paired_shape(3, n));
            let fast = layout::to_fast_layout(&paired).unwrap();
            assert_eq!(layout::to_paired_layout(&fast).unwrap(), paired);

            let input = Tensor::<V>::rand(&mut rng, [2, 3, n]);
            let grad = Tensor::<V>::rand(&mut rng, [2, 3, n]);
            assert_eq!(
                multiply.forward(&paired, &input, increasing_stride).unwrap(),
                multiply.forward(&fast, &input, increasing_stride).unwrap()
            );

            let (d_paired, d_input_paired) = multiply
                .forward_backward(&paired, &input, &grad, increasing_stride)
                .unwrap();
            let (d_fast, d_input_fast) = multiply
                .forward_backward(&fast, &input, &grad, increasing_stride)
                .unwrap();
            assert_eq!(d_fast.shape(), fast.shape());
            assert_eq!(layout::to_fast_layout(&d_paired).unwrap(), d_fast);
            assert_eq!(d_input_paired, d_input_fast);
        }
    }
}

/// The decreasing-stride stack of DIF twiddles followed by a bit-reversal permutation is the DFT.
pub fn test_dif_stack_computes_dft<R: RealElement>()
where
    Complex<R>: Twiddle<Complex<R>>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(9);
    for log_n in 0..=10 {
        let n = 1 << log_n;
        let twiddle = dif_twiddle::<R>(n);
        let input = Tensor::<Complex<R>>::rand(&mut rng, [3, 1, n]);
        let mut output = multiply.forward(&twiddle, &input, false).unwrap();
        for row in output.values_mut().chunks_exact_mut(n) {
            reverse_slice_index_bits(row);
        }
        let expected: Vec<_> = input
            .values()
            .chunks_exact(n)
            .flat_map(naive_dft)
            .collect();
        let expected = Tensor::new(expected, [3, 1, n]);
        assert_close(
            &output,
            &expected,
            rounding_tolerance::<R>() * log_n.max(1) as f64,
            &format!("dft, n = {n}"),
        );
    }
}

/// Gradients do not depend on how the batch is chunked beyond rounding, and repeated calls with
/// one configuration are bit-identical.
pub fn test_chunking_is_deterministic<W, V>()
where
    V: Element,
    W: Twiddle<V>,
{
    let mut rng = SmallRng::seed_from_u64(10);
    let n = 32;
    let twiddle = Tensor::<W>::rand(&mut rng, paired_shape(2, n));
    let input = Tensor::<V>::rand(&mut rng, [37, 2, n]);
    let grad = Tensor::<V>::rand(&mut rng, [37, 2, n]);

    let with_chunks = |rows_per_chunk| {
        ButterflyMultiply::new(MultiplyConfig {
            rows_per_chunk,
            ..MultiplyConfig::default()
        })
        .forward_backward(&twiddle, &input, &grad, true)
        .unwrap()
    };

    let (d_reference, d_input_reference) = with_chunks(1);
    for rows_per_chunk in [2, 5, 8, 64] {
        let (d_twiddle, d_input) = with_chunks(rows_per_chunk);
        assert_close(
            &d_twiddle,
            &d_reference,
            rounding_tolerance::<W::Real>(),
            &format!("{rows_per_chunk} rows per chunk"),
        );
        assert_eq!(d_input, d_input_reference);
        assert_eq!(with_chunks(rows_per_chunk), (d_twiddle, d_input));
    }
}

/// A backward pass run with the wrong direction disagrees with finite differences, while the
/// tape of the forward pass always uses the right one.
pub fn test_direction_mismatch_and_tapes<R>()
where
    R: RealElement + Twiddle<R>,
{
    let multiply = ButterflyMultiply::default();
    let mut rng = SmallRng::seed_from_u64(11);
    let (h, tol) = finite_difference::<R>();
    let n = 8;
    let twiddle = Tensor::<R>::rand(&mut rng, paired_shape(1, n));
    let input = Tensor::<R>::rand(&mut rng, [2, 1, n]);
    let u = Tensor::<R>::rand(&mut rng, [2, 1, n]);
    let loss_at = |t: &Tensor<R>| loss(&u, &multiply.forward(t, &input, true).unwrap());

    let (_, tape) = multiply.forward_taped(&twiddle, &input, true).unwrap();
    let (d_taped, _) = tape.backward(&multiply, &u).unwrap();
    assert!(gradient_error(&twiddle, &d_taped, h, loss_at) <= tol);

    let (d_mismatched, _) = multiply.forward_backward(&twiddle, &input, &u, false).unwrap();
    assert!(gradient_error(&twiddle, &d_mismatched, h, loss_at) > tol);

    let theta = random_angles::<R>(&mut rng, 1, n);
    let (cos, sin) = cos_sin(&theta);
    let (output, tape) = multiply.ortho_forward_taped(&cos, &sin, &input, false).unwrap();
    let (d_theta, _) = tape.backward(&multiply, &u).unwrap();
    let ortho_loss = |t: &Tensor<R>| {
        let (cos, sin) = cos_sin(t);
        loss(&u, &multiply.ortho_forward(&cos, &sin, &input, false).unwrap())
    };
    assert!(gradient_error(&theta, &d_theta, h, ortho_loss) <= tol);

    let (d_mismatched, _) = multiply.ortho_backward(&cos, &sin, &output, &u, true).unwrap();
    assert!(gradient_error(&theta, &d_mismatched, h, ortho_loss) > tol);
}

/// Instantiates the plain suite in a module named `$mod`. Types are resolved inside that module,
/// so give them as full paths.
#[macro_export]
macro_rules! test_plain_multiply {
    ($mod:ident, $twiddle:ty, $value:ty) => {
        mod $mod {
            #[test]
            fn forward_matches_dense() {
                $crate::test_forward_matches_dense::<$twiddle, $value>();
            }

            #[test]
            fn inverse_reconstruction() {
                $crate::test_inverse_reconstruction::<$twiddle, $value>();
            }

            #[test]
            fn gradients_match_finite_differences() {
                $crate::test_plain_gradients::<$twiddle, $value>();
            }

            #[test]
            fn layouts_agree() {
                $crate::test_layouts_agree::<$twiddle, $value>();
            }

            #[test]
            fn chunking_is_deterministic() {
                $crate::test_chunking_is_deterministic::<$twiddle, $value>();
            }
        }
    };
}

/// Orthogonal counterpart of [`test_plain_multiply!`].
#[macro_export]
macro_rules! test_ortho_multiply {
    ($mod:ident, $real:ty, $value:ty) => {
        mod $mod {
            #[test]
            fn matches_dense() {
                $crate::test_ortho_matches_dense::<$real, $value>();
            }

            #[test]
            fn preserves_norm() {
                $crate::test_ortho_preserves_norm::<$real, $value>();
            }

            #[test]
            fn inverse_reconstruction() {
                $crate::test_ortho_inverse_reconstruction::<$real, $value>();
            }

            #[test]
            fn gradients_match_finite_differences() {
                $crate::test_ortho_gradients::<$real, $value>();
            }
        }
    };
}
