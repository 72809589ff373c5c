use bfly_tensor::{Element, RealElement, Tensor};
use tracing::{debug, instrument};

use crate::backend::{Backend, CpuBackend};
use crate::error::{ButterflyError, ButterflyResult, Operand, Operation};
use crate::layout::TwiddleLayout;
use crate::ortho::OrthoFactor;
use crate::plain::PlainFactor;
use crate::stride::StageSchedule;
use crate::tape::{ButterflyTape, OrthoTape};
use crate::twiddle::Twiddle;
use crate::validate::{self, Dims};
use crate::MultiplyConfig;

/// Entry point for butterfly multiplication.
///
/// Every operation validates its operands against the config and the backend before any
/// computation, and returns fresh tensors placed like its input.
///
/// Plain twiddles come in either layout of [`TwiddleLayout`]; gradients are returned in the
/// layout they were supplied in. Orthogonal stacks are given as `cos` and `sin` tensors of shape
/// `(nstack, log_n, n / 2)`. Batches have shape `(batch, nstack, n)`.
///
/// The same `increasing_stride` must be used for a forward call and the backward call computing
/// its gradient. The taped variants record it.
#[derive(Clone, Debug)]
pub struct ButterflyMultiply<B = CpuBackend> {
    backend: B,
    config: MultiplyConfig,
}

impl ButterflyMultiply<CpuBackend> {
    #[must_use]
    pub const fn new(config: MultiplyConfig) -> Self {
        Self {
            backend: CpuBackend::new(config.rows_per_chunk),
            config,
        }
    }
}

impl Default for ButterflyMultiply<CpuBackend> {
    fn default() -> Self {
        Self::new(MultiplyConfig::default())
    }
}

fn log_rejection(err: &ButterflyError) {
    debug!(%err, "rejected butterfly call");
}

impl<B: Backend> ButterflyMultiply<B> {
    pub const fn with_backend(backend: B, config: MultiplyConfig) -> Self {
        Self { backend, config }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn config(&self) -> &MultiplyConfig {
        &self.config
    }

    /// Multiplies every row of `input` by its stack of plain butterfly factors.
    #[instrument(name = "butterfly forward", level = "debug", skip_all, fields(shape = ?input.shape(), increasing_stride))]
    pub fn forward<W, V>(
        &self,
        twiddle: &Tensor<W>,
        input: &Tensor<V>,
        increasing_stride: bool,
    ) -> ButterflyResult<Tensor<V>>
    where
        V: Element,
        W: Twiddle<V>,
    {
        let (dims, layout) = self
            .check_plain(Operation::Forward, twiddle, input, None)
            .inspect_err(log_rejection)?;
        Ok(self.plain_forward(twiddle, input, dims, layout, increasing_stride))
    }

    /// Like [`Self::forward`], but returns the batch after every stage, stacked into a
    /// `(log_n + 1, batch, nstack, n)` tensor whose first entry is `input` and whose last entry is
    /// the output.
    #[instrument(name = "butterfly forward with intermediates", level = "debug", skip_all, fields(shape = ?input.shape(), increasing_stride))]
    pub fn forward_intermediates<W, V>(
        &self,
        twiddle: &Tensor<W>,
        input: &Tensor<V>,
        increasing_stride: bool,
    ) -> ButterflyResult<Tensor<V>>
    where
        V: Element,
        W: Twiddle<V>,
    {
        let (dims, layout) = self
            .check_plain(Operation::ForwardIntermediates, twiddle, input, None)
            .inspect_err(log_rejection)?;
        let factor = PlainFactor::new(twiddle.values(), layout, dims.log_n, dims.n);
        let schedule = StageSchedule::new(dims.log_n, increasing_stride);
        let stacked = self.backend.forward_intermediates(&factor, schedule, dims, input.values());
        let shape = [dims.log_n + 1, dims.batch, dims.nstack, dims.n];
        Ok(Tensor::new(stacked, shape).with_device(input.device()))
    }

    /// Gradients of a plain forward pass with respect to `twiddle` and `input`, given the
    /// gradient `grad` of its output. The forward pass is recomputed from `input`.
    #[instrument(name = "butterfly forward+backward", level = "debug", skip_all, fields(shape = ?input.shape(), increasing_stride))]
    pub fn forward_backward<W, V>(
        &self,
        twiddle: &Tensor<W>,
        input: &Tensor<V>,
        grad: &Tensor<V>,
        increasing_stride: bool,
    ) -> ButterflyResult<(Tensor<W>, Tensor<V>)>
    where
        V: Element,
        W: Twiddle<V>,
    {
        let (dims, layout) = self
            .check_plain(Operation::ForwardBackward, twiddle, input, Some(grad))
            .inspect_err(log_rejection)?;
        let factor = PlainFactor::new(twiddle.values(), layout, dims.log_n, dims.n);
        let schedule = StageSchedule::new(dims.log_n, increasing_stride);
        let (d_twiddle, d_input) =
            self.backend
                .backward_saved(&factor, schedule, dims, input.values(), grad.values());
        Ok((
            Tensor::new(d_twiddle, twiddle.shape()).with_device(twiddle.device()),
            Tensor::new(d_input, input.shape()).with_device(input.device()),
        ))
    }

    /// Runs [`Self::forward`] and records what its backward pass needs.
    ///
    /// Operands are checked against the forward+backward limits up front, so the returned tape
    /// can always be differentiated.
    #[instrument(name = "taped butterfly forward", level = "debug", skip_all, fields(shape = ?input.shape(), increasing_stride))]
    pub fn forward_taped<'a, W, V>(
        &self,
        twiddle: &'a Tensor<W>,
        input: &'a Tensor<V>,
        increasing_stride: bool,
    ) -> ButterflyResult<(Tensor<V>, ButterflyTape<'a, W, V>)>
    where
        V: Element,
        W: Twiddle<V>,
    {
        let (dims, layout) = self
            .check_plain(Operation::ForwardBackward, twiddle, input, None)
            .inspect_err(log_rejection)?;
        let output = self.plain_forward(twiddle, input, dims, layout, increasing_stride);
        Ok((output, ButterflyTape::new(twiddle, input, increasing_stride)))
    }

    /// Multiplies every row of `input` by its stack of rotations.
    #[instrument(name = "orthogonal butterfly forward", level = "debug", skip_all, fields(shape = ?input.shape(), increasing_stride))]
    pub fn ortho_forward<R, V>(
        &self,
        cos: &Tensor<R>,
        sin: &Tensor<R>,
        input: &Tensor<V>,
        increasing_stride: bool,
    ) -> ButterflyResult<Tensor<V>>
    where
        V: Element,
        R: RealElement + Twiddle<V>,
    {
        let dims = self
            .check_ortho(Operation::OrthoForward, cos, sin, Operand::Input, input, None)
            .inspect_err(log_rejection)?;
        let factor = OrthoFactor::new(cos.values(), sin.values(), dims.log_n, dims.n);
        let schedule = StageSchedule::new(dims.log_n, increasing_stride);
        let values = self.backend.forward(&factor, schedule, dims, input.values());
        Ok(Tensor::new(values, input.shape()).with_device(input.device()))
    }

    /// Gradients of an orthogonal forward pass with respect to the angles and the input, given
    /// the forward `output` and its gradient `grad`.
    ///
    /// Returns `(d_theta, d_input)`, with `d_theta` shaped like `cos`.
    #[instrument(name = "orthogonal butterfly backward", level = "debug", skip_all, fields(shape = ?output.shape(), increasing_stride))]
    pub fn ortho_backward<R, V>(
        &self,
        cos: &Tensor<R>,
        sin: &Tensor<R>,
        output: &Tensor<V>,
        grad: &Tensor<V>,
        increasing_stride: bool,
    ) -> ButterflyResult<(Tensor<R>, Tensor<V>)>
    where
        V: Element,
        R: RealElement + Twiddle<V>,
    {
        let dims = self
            .check_ortho(Operation::OrthoBackward, cos, sin, Operand::Output, output, Some(grad))
            .inspect_err(log_rejection)?;
        let factor = OrthoFactor::new(cos.values(), sin.values(), dims.log_n, dims.n);
        let schedule = StageSchedule::new(dims.log_n, increasing_stride);
        let (d_theta, d_input) =
            self.backend
                .backward_reconstruct(&factor, schedule, dims, output.values(), grad.values());
        Ok((
            Tensor::new(d_theta, cos.shape()).with_device(cos.device()),
            Tensor::new(d_input, output.shape()).with_device(output.device()),
        ))
    }

    /// Runs [`Self::ortho_forward`] and records what its backward pass needs: the angles and a
    /// copy of the output.
    #[instrument(name = "taped orthogonal butterfly forward", level = "debug", skip_all, fields(shape = ?input.shape(), increasing_stride))]
    pub fn ortho_forward_taped<'a, R, V>(
        &self,
        cos: &'a Tensor<R>,
        sin: &'a Tensor<R>,
        input: &Tensor<V>,
        increasing_stride: bool,
    ) -> ButterflyResult<(Tensor<V>, OrthoTape<'a, R, V>)>
    where
        V: Element,
        R: RealElement + Twiddle<V>,
    {
        let output = self.ortho_forward(cos, sin, input, increasing_stride)?;
        let tape = OrthoTape::new(cos, sin, output.clone(), increasing_stride);
        Ok((output, tape))
    }

    fn plain_forward<W, V>(
        &self,
        twiddle: &Tensor<W>,
        input: &Tensor<V>,
        dims: Dims,
        layout: TwiddleLayout,
        increasing_stride: bool,
    ) -> Tensor<V>
    where
        V: Element,
        W: Twiddle<V>,
    {
        let factor = PlainFactor::new(twiddle.values(), layout, dims.log_n, dims.n);
        let schedule = StageSchedule::new(dims.log_n, increasing_stride);
        let values = self.backend.forward(&factor, schedule, dims, input.values());
        Tensor::new(values, input.shape()).with_device(input.device())
    }

    fn check_plain<W: Element, V: Element>(
        &self,
        op: Operation,
        twiddle: &Tensor<W>,
        input: &Tensor<V>,
        grad: Option<&Tensor<V>>,
    ) -> ButterflyResult<(Dims, TwiddleLayout)> {
        let dims = validate::batch_dims(op, Operand::Input, input.shape(), &self.config)?;
        let device = input.device();
        validate::same_device(op, device, Operand::Twiddle, twiddle.device())?;
        if let Some(grad) = grad {
            validate::same_device(op, device, Operand::Grad, grad.device())?;
        }
        validate::backend_supports(op, &self.backend, device)?;
        let layout = validate::twiddle_layout(op, twiddle.shape(), dims)?;
        if let Some(grad) = grad {
            validate::matches_batch(op, Operand::Grad, grad.shape(), dims)?;
        }
        Ok((dims, layout))
    }

    fn check_ortho<R: Element, V: Element>(
        &self,
        op: Operation,
        cos: &Tensor<R>,
        sin: &Tensor<R>,
        batch_operand: Operand,
        batch: &Tensor<V>,
        grad: Option<&Tensor<V>>,
    ) -> ButterflyResult<Dims> {
        let dims = validate::batch_dims(op, batch_operand, batch.shape(), &self.config)?;
        let device = batch.device();
        validate::same_device(op, device, Operand::TwiddleCos, cos.device())?;
        validate::same_device(op, device, Operand::TwiddleSin, sin.device())?;
        if let Some(grad) = grad {
            validate::same_device(op, device, Operand::Grad, grad.device())?;
        }
        validate::backend_supports(op, &self.backend, device)?;
        validate::angle_shape(op, Operand::TwiddleCos, cos.shape(), dims)?;
        validate::angle_shape(op, Operand::TwiddleSin, sin.shape(), dims)?;
        if let Some(grad) = grad {
            validate::matches_batch(op, Operand::Grad, grad.shape(), dims)?;
        }
        Ok(dims)
    }
}

#[cfg(test)]
mod tests {
    use bfly_tensor::{Complex, Device};

    use super::*;

    fn multiply() -> ButterflyMultiply {
        ButterflyMultiply::default()
    }

    fn identity_paired(nstack: usize, n: usize) -> Tensor<f64> {
        let log_n = bfly_util::log2_strict_usize(n);
        let values = [1.0, 0.0, 0.0, 1.0].repeat(nstack * log_n * n / 2);
        Tensor::new(values, [nstack, log_n, n / 2, 2, 2])
    }

    #[test]
    fn identity_blocks_leave_input_unchanged() {
        let twiddle = identity_paired(2, 4);
        let input = Tensor::new((0..24).map(|i| f64::from(i) - 7.5).collect(), [3, 2, 4]);
        let output = multiply().forward(&twiddle, &input, true).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn swap_block_exchanges_entries() {
        let twiddle = Tensor::new(vec![0.0, 1.0, 1.0, 0.0], [1, 1, 1, 2, 2]);
        let input = Tensor::new(vec![3.0_f64, -5.0, 0.25, 8.0], [2, 1, 2]);
        let output = multiply().forward(&twiddle, &input, false).unwrap();
        assert_eq!(output.values(), &[-5.0, 3.0, 8.0, 0.25]);
    }

    #[test]
    fn length_one_is_the_identity() {
        let twiddle = Tensor::<f64>::zeros([1, 0, 0, 2, 2]);
        let input = Tensor::new(vec![4.0_f64, 2.0], [2, 1, 1]);
        let m = multiply();
        assert_eq!(m.forward(&twiddle, &input, true).unwrap(), input);
        let (d_twiddle, d_input) = m.forward_backward(&twiddle, &input, &input, true).unwrap();
        assert!(d_twiddle.is_empty());
        assert_eq!(d_input, input);
    }

    #[test]
    fn oversized_input_is_rejected_before_the_params_are_read() {
        // The twiddle does not even have the right shape; the ceiling is reported first.
        let twiddle = Tensor::<f32>::zeros([1, 1, 1, 2, 2]);
        let input = Tensor::<f32>::zeros([1, 1, 32768]);
        assert_eq!(
            multiply().forward(&twiddle, &input, true),
            Err(ButterflyError::SizeLimitExceeded {
                op: Operation::Forward,
                n: 32768,
                max: 16384
            })
        );
    }

    #[test]
    fn forward_backward_has_a_lower_ceiling() {
        let n = 8192;
        let twiddle = Tensor::<f32>::zeros([1, 13, n / 2, 2, 2]);
        let input = Tensor::<f32>::zeros([1, 1, n]);
        let m = multiply();
        assert!(m.forward(&twiddle, &input, true).is_ok());
        assert!(matches!(
            m.forward_backward(&twiddle, &input, &input, true),
            Err(ButterflyError::SizeLimitExceeded { max: 4096, .. })
        ));
        assert!(matches!(
            m.forward_taped(&twiddle, &input, true),
            Err(ButterflyError::SizeLimitExceeded { max: 4096, .. })
        ));
    }

    #[test]
    fn ceilings_come_from_the_config() {
        let m = ButterflyMultiply::new(MultiplyConfig {
            max_len_ortho: 4,
            ..MultiplyConfig::default()
        });
        let cos = Tensor::<f64>::zeros([1, 3, 4]);
        let input = Tensor::<f64>::zeros([1, 1, 8]);
        assert_eq!(
            m.ortho_forward(&cos, &cos, &input, true),
            Err(ButterflyError::SizeLimitExceeded {
                op: Operation::OrthoForward,
                n: 8,
                max: 4
            })
        );
    }

    #[test]
    fn operands_must_share_a_device() {
        let twiddle = identity_paired(1, 4).with_device(Device::Cuda(0));
        let input = Tensor::<f64>::zeros([1, 1, 4]);
        assert_eq!(
            multiply().forward(&twiddle, &input, true),
            Err(ButterflyError::DeviceMismatch {
                op: Operation::Forward,
                operand: Operand::Twiddle,
                expected: Device::Cpu,
                found: Device::Cuda(0),
            })
        );

        let twiddle = identity_paired(1, 4);
        let grad = Tensor::<f64>::zeros([1, 1, 4]).with_device(Device::Cuda(1));
        assert!(matches!(
            multiply().forward_backward(&twiddle, &input, &grad, true),
            Err(ButterflyError::DeviceMismatch {
                operand: Operand::Grad,
                ..
            })
        ));
    }

    #[test]
    fn cpu_backend_refuses_accelerator_tensors() {
        let cos = Tensor::<f32>::zeros([1, 2, 2]).with_device(Device::Cuda(0));
        let input = Tensor::<f32>::zeros([1, 1, 4]).with_device(Device::Cuda(0));
        assert_eq!(
            multiply().ortho_forward(&cos, &cos, &input, true),
            Err(ButterflyError::UnsupportedDevice {
                op: Operation::OrthoForward,
                backend: "cpu",
                device: Device::Cuda(0),
            })
        );
    }

    #[test]
    fn shape_errors_name_the_operand() {
        let m = multiply();
        let input = Tensor::<f64>::zeros([2, 1, 8]);

        let bad_twiddle = Tensor::<f64>::zeros([1, 2, 4, 2, 2]);
        assert!(matches!(
            m.forward(&bad_twiddle, &input, true),
            Err(ButterflyError::ShapeMismatch {
                operand: Operand::Twiddle,
                ..
            })
        ));

        let cos = Tensor::<f64>::zeros([1, 3, 4]);
        let bad_sin = Tensor::<f64>::zeros([1, 3, 3]);
        assert!(matches!(
            m.ortho_forward(&cos, &bad_sin, &input, true),
            Err(ButterflyError::ShapeMismatch {
                operand: Operand::TwiddleSin,
                ..
            })
        ));

        let bad_grad = Tensor::<f64>::zeros([1, 1, 8]);
        assert!(matches!(
            m.ortho_backward(&cos, &cos, &input, &bad_grad, true),
            Err(ButterflyError::ShapeMismatch {
                op: Operation::OrthoBackward,
                operand: Operand::Grad,
                ..
            })
        ));

        let flat = Tensor::<f64>::zeros([8]);
        assert!(matches!(
            m.ortho_backward(&cos, &cos, &flat, &flat, true),
            Err(ButterflyError::ShapeMismatch {
                operand: Operand::Output,
                ..
            })
        ));

        let odd = Tensor::<f64>::zeros([1, 1, 6]);
        assert!(matches!(
            m.forward(&bad_twiddle, &odd, true),
            Err(ButterflyError::ShapeMismatch {
                operand: Operand::Input,
                ..
            })
        ));
    }

    #[test]
    fn intermediates_have_a_leading_stage_axis() {
        let twiddle = identity_paired(1, 8);
        let input = Tensor::new((0..16).map(f64::from).collect(), [2, 1, 8]);
        let stacked = multiply().forward_intermediates(&twiddle, &input, true).unwrap();
        assert_eq!(stacked.shape(), &[4, 2, 1, 8]);
        for t in 0..4 {
            assert_eq!(&stacked.values()[t * 16..(t + 1) * 16], input.values());
        }
    }

    #[test]
    fn complex_twiddles_multiply_complex_values() {
        // n = 2, [[i, 0], [0, -i]].
        let i = Complex::new(0.0_f64, 1.0);
        let zero = Complex::new(0.0, 0.0);
        let twiddle = Tensor::new(vec![i, zero, zero, -i], [1, 1, 1, 2, 2]);
        let input = Tensor::new(vec![Complex::new(1.0, 2.0), Complex::new(3.0, -1.0)], [1, 1, 2]);
        let output = multiply().forward(&twiddle, &input, true).unwrap();
        assert_eq!(
            output.values(),
            &[Complex::new(-2.0, 1.0), Complex::new(-1.0, -3.0)]
        );
    }

    #[test]
    fn gradients_keep_the_twiddle_layout_and_device_tag() {
        let twiddle = crate::layout::to_fast_layout(&identity_paired(2, 4)).unwrap();
        let input = Tensor::<f64>::zeros([1, 2, 4]);
        let (d_twiddle, d_input) = multiply()
            .forward_backward(&twiddle, &input, &input, true)
            .unwrap();
        assert_eq!(d_twiddle.shape(), &[2, 2, 2, 4]);
        assert_eq!(d_input.shape(), input.shape());
        assert_eq!(d_input.device(), Device::Cpu);
    }
}
