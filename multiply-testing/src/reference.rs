use bfly_multiply::Twiddle;
use bfly_tensor::{Complex, Element, RealElement, Tensor};
use bfly_util::log2_strict_usize;

/// The `n x n` row-major matrix of stage `log_stride` of stack `stack`, read from a twiddle in
/// the paired `(nstack, log_n, n / 2, 2, 2)` layout.
pub fn stage_matrix<W: Element>(
    twiddle: &Tensor<W>,
    stack: usize,
    log_stride: usize,
    n: usize,
) -> Vec<W> {
    let stride = 1 << log_stride;
    let mut m = vec![W::zero(); n * n];
    for group in 0..n / (2 * stride) {
        for k in 0..stride {
            let pair = group * stride + k;
            let lo = group * 2 * stride + k;
            let hi = lo + stride;
            let at = |r: usize, c: usize| {
                *twiddle
                    .get(&[stack, log_stride, pair, r, c])
                    .expect("twiddle shape does not match n")
            };
            m[lo * n + lo] = at(0, 0);
            m[lo * n + hi] = at(0, 1);
            m[hi * n + lo] = at(1, 0);
            m[hi * n + hi] = at(1, 1);
        }
    }
    m
}

fn matmul<W: Element>(lhs: &[W], rhs: &[W], n: usize) -> Vec<W> {
    let mut out = vec![W::zero(); n * n];
    for i in 0..n {
        for k in 0..n {
            let l = lhs[i * n + k];
            for j in 0..n {
                out[i * n + j] += l * rhs[k * n + j];
            }
        }
    }
    out
}

/// The dense matrix a stack multiplies by: the product of its stage matrices in traversal order.
pub fn stack_matrix<W: Element>(
    twiddle: &Tensor<W>,
    stack: usize,
    n: usize,
    increasing_stride: bool,
) -> Vec<W> {
    let log_n = log2_strict_usize(n);
    let mut product = vec![W::zero(); n * n];
    for i in 0..n {
        product[i * n + i] = W::one();
    }
    let order: Vec<usize> = if increasing_stride {
        (0..log_n).collect()
    } else {
        (0..log_n).rev().collect()
    };
    for log_stride in order {
        product = matmul(&stage_matrix(twiddle, stack, log_stride, n), &product, n);
    }
    product
}

/// Plain forward pass computed by dense matrix-vector products.
pub fn dense_forward<W, V>(
    twiddle: &Tensor<W>,
    input: &Tensor<V>,
    increasing_stride: bool,
) -> Tensor<V>
where
    V: Element,
    W: Twiddle<V>,
{
    let &[_, nstack, n] = input.shape() else {
        panic!("input must have shape (batch, nstack, n)");
    };
    let matrices: Vec<Vec<W>> = (0..nstack)
        .map(|stack| stack_matrix(twiddle, stack, n, increasing_stride))
        .collect();
    let mut output = vec![V::zero(); input.len()];
    let rows = input.values().chunks_exact(n).zip(output.chunks_exact_mut(n));
    for (r, (x, y)) in rows.enumerate() {
        let m = &matrices[r % nstack];
        for (i, y_i) in y.iter_mut().enumerate() {
            *y_i = (0..n).map(|j| m[i * n + j].mul_value(x[j])).sum();
        }
    }
    Tensor::new(output, input.shape()).with_device(input.device())
}

/// Rewrites an orthogonal stack as a plain one in the paired layout, each angle becoming the block
/// `[[cos, -sin], [sin, cos]]`.
pub fn ortho_as_plain<R: RealElement>(cos: &Tensor<R>, sin: &Tensor<R>) -> Tensor<R> {
    let values = cos
        .values()
        .iter()
        .zip(sin.values())
        .flat_map(|(&c, &s)| [c, -s, s, c])
        .collect();
    let mut shape = cos.shape().to_vec();
    shape.extend([2, 2]);
    Tensor::new(values, shape).with_device(cos.device())
}

/// Twiddles of the radix-2 decimation-in-frequency FFT, as one stack in the paired layout.
///
/// The stage with stride `s` maps `(x_lo, x_hi)` at offset `k` of its group to
/// `(x_lo + x_hi, w^k (x_lo - x_hi))` with `w = exp(-i pi / s)`. Multiplied with decreasing
/// stride, the stack yields the DFT `X_k = sum_j x_j exp(-2 pi i jk / n)` in bit-reversed order.
pub fn dif_twiddle<R: RealElement>(n: usize) -> Tensor<Complex<R>> {
    let log_n = log2_strict_usize(n);
    let one = Complex::new(R::one(), R::zero());
    let mut values = Vec::with_capacity(log_n * n * 2);
    for log_stride in 0..log_n {
        let stride = 1 << log_stride;
        for _group in 0..n / (2 * stride) {
            for k in 0..stride {
                let angle = -core::f64::consts::PI * k as f64 / stride as f64;
                let w = Complex::new(R::from_f64(angle.cos()), R::from_f64(angle.sin()));
                values.extend([one, one, w, -w]);
            }
        }
    }
    Tensor::new(values, [1, log_n, n / 2, 2, 2])
}

pub fn naive_dft<R: RealElement>(x: &[Complex<R>]) -> Vec<Complex<R>> {
    let n = x.len();
    (0..n)
        .map(|k| {
            x.iter()
                .enumerate()
                .map(|(j, &x_j)| {
                    let angle = -2.0 * core::f64::consts::PI * ((j * k) % n) as f64 / n as f64;
                    x_j * Complex::new(R::from_f64(angle.cos()), R::from_f64(angle.sin()))
                })
                .sum()
        })
        .collect()
}
