//! Seeded forward and backward runs of one butterfly stack configuration.

use bfly_multiply::{ButterflyMultiply, ButterflyResult, Twiddle, layout};
use bfly_tensor::{Element, RealElement, Tensor};
use rand::Rng;
use tracing::info_span;

/// Problem dimensions of a demo run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunShape {
    pub batch: usize,
    pub nstack: usize,
    pub log_n: usize,
    pub increasing_stride: bool,
}

impl RunShape {
    pub const fn n(&self) -> usize {
        1 << self.log_n
    }

    const fn input_shape(&self) -> [usize; 3] {
        [self.batch, self.nstack, self.n()]
    }
}

/// Norms of everything a run produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    pub output_norm: f64,
    pub d_params_norm: f64,
    pub d_input_norm: f64,
}

impl RunSummary {
    fn new<P: Element, V: Element>(
        output: &Tensor<V>,
        d_params: &Tensor<P>,
        d_input: &Tensor<V>,
    ) -> Self {
        Self {
            output_norm: output.norm_sqr().as_f64().sqrt(),
            d_params_norm: d_params.norm_sqr().as_f64().sqrt(),
            d_input_norm: d_input.norm_sqr().as_f64().sqrt(),
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.output_norm, self.d_params_norm, self.d_input_norm]
            .iter()
            .all(|norm| norm.is_finite())
    }
}

/// Forward and backward pass of a random plain stack, optionally stored in the fast layout.
pub fn run_plain<W, V, R>(
    multiply: &ButterflyMultiply,
    rng: &mut R,
    shape: RunShape,
    fast_layout: bool,
) -> ButterflyResult<RunSummary>
where
    V: Element,
    W: Twiddle<V>,
    R: Rng,
{
    let n = shape.n();
    let mut twiddle = Tensor::<W>::rand(rng, [shape.nstack, shape.log_n, n / 2, 2, 2]);
    if fast_layout {
        twiddle = layout::to_fast_layout(&twiddle)?;
    }
    let input = Tensor::<V>::rand(rng, shape.input_shape());
    let grad = Tensor::<V>::rand(rng, shape.input_shape());

    let (output, tape) = info_span!("forward", n, batch = shape.batch)
        .in_scope(|| multiply.forward_taped(&twiddle, &input, shape.increasing_stride))?;
    let (d_twiddle, d_input) =
        info_span!("backward", n, batch = shape.batch).in_scope(|| tape.backward(multiply, &grad))?;
    Ok(RunSummary::new(&output, &d_twiddle, &d_input))
}

/// Forward and backward pass of a stack of random rotations.
pub fn run_orthogonal<T, V, R>(
    multiply: &ButterflyMultiply,
    rng: &mut R,
    shape: RunShape,
) -> ButterflyResult<RunSummary>
where
    V: Element,
    T: RealElement + Twiddle<V>,
    R: Rng,
{
    let n = shape.n();
    let theta = Tensor::<T>::rand(rng, [shape.nstack, shape.log_n, n / 2]).map(|&t| t * T::PI());
    let cos = theta.map(|t| t.cos());
    let sin = theta.map(|t| t.sin());
    let input = Tensor::<V>::rand(rng, shape.input_shape());
    let grad = Tensor::<V>::rand(rng, shape.input_shape());

    let (output, tape) = info_span!("orthogonal forward", n, batch = shape.batch)
        .in_scope(|| multiply.ortho_forward_taped(&cos, &sin, &input, shape.increasing_stride))?;
    let (d_theta, d_input) = info_span!("orthogonal backward", n, batch = shape.batch)
        .in_scope(|| tape.backward(multiply, &grad))?;
    Ok(RunSummary::new(&output, &d_theta, &d_input))
}

pub fn report_result(result: ButterflyResult<RunSummary>) {
    match result {
        Ok(summary) if summary.is_finite() => println!(
            "|y| = {:.6}, |d params| = {:.6}, |d x| = {:.6}",
            summary.output_norm, summary.d_params_norm, summary.d_input_norm
        ),
        Ok(summary) => panic!("non-finite result: {summary:?}"),
        Err(e) => panic!("{e}"),
    }
}

#[cfg(test)]
mod tests {
    use bfly_tensor::Complex;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    const SHAPE: RunShape = RunShape {
        batch: 3,
        nstack: 2,
        log_n: 5,
        increasing_stride: false,
    };

    #[test]
    fn layouts_give_the_same_summary() {
        let multiply = ButterflyMultiply::default();
        let paired =
            run_plain::<f64, f64, _>(&multiply, &mut SmallRng::seed_from_u64(1), SHAPE, false)
                .unwrap();
        let fast =
            run_plain::<f64, f64, _>(&multiply, &mut SmallRng::seed_from_u64(1), SHAPE, true)
                .unwrap();
        assert!(paired.is_finite());
        // The fast layout permutes the twiddle gradient, which only reorders the norm's sum.
        assert_eq!(paired.output_norm, fast.output_norm);
        assert_eq!(paired.d_input_norm, fast.d_input_norm);
        assert!((paired.d_params_norm - fast.d_params_norm).abs() < 1e-12 * paired.d_params_norm);
    }

    #[test]
    fn rotations_preserve_the_input_norm() {
        let multiply = ButterflyMultiply::default();
        let mut rng = SmallRng::seed_from_u64(2);
        let summary =
            run_orthogonal::<f64, Complex<f64>, _>(&multiply, &mut rng, SHAPE).unwrap();
        let mut rng = SmallRng::seed_from_u64(2);
        let _theta = Tensor::<f64>::rand(&mut rng, [SHAPE.nstack, SHAPE.log_n, SHAPE.n() / 2]);
        let input = Tensor::<Complex<f64>>::rand(&mut rng, SHAPE.input_shape());
        let expected = input.norm_sqr().sqrt();
        assert!((summary.output_norm - expected).abs() < 1e-10 * expected);
    }

    #[test]
    fn oversized_runs_are_rejected() {
        let multiply = ButterflyMultiply::default();
        let shape = RunShape { log_n: 13, batch: 1, ..SHAPE };
        let mut rng = SmallRng::seed_from_u64(3);
        assert!(run_plain::<f32, f32, _>(&multiply, &mut rng, shape, false).is_err());
    }
}
