use bfly_tensor::Element;
use num_complex::Complex;

/// A twiddle entry that acts on values of type `V`.
///
/// Gradients follow the real-loss convention: for a loss `L`, the gradient of a complex quantity
/// `z` is `dL/d(re z) + i dL/d(im z)`. Under this convention the gradient of `y = t * x` is
/// `g * conj(x)` with respect to `t` and `conj(t) * g` with respect to `x`, where `g` is the
/// gradient of `y`.
pub trait Twiddle<V: Element>: Element {
    /// `self * v`.
    fn mul_value(self, v: V) -> V;

    /// `conj(self) * g`, carrying a gradient from the output of `mul_value` to its input.
    fn mul_value_adjoint(self, g: V) -> V;

    /// Gradient with respect to the twiddle of `y = t * x`, given the gradient `g` of `y`.
    fn value_grad(g: V, x: V) -> Self;
}

macro_rules! impl_twiddle {
    ($r:ty) => {
        impl Twiddle<$r> for $r {
            #[inline(always)]
            fn mul_value(self, v: $r) -> $r {
                self * v
            }

            #[inline(always)]
            fn mul_value_adjoint(self, g: $r) -> $r {
                self * g
            }

            #[inline(always)]
            fn value_grad(g: $r, x: $r) -> Self {
                g * x
            }
        }

        impl Twiddle<Complex<$r>> for Complex<$r> {
            #[inline(always)]
            fn mul_value(self, v: Complex<$r>) -> Complex<$r> {
                self * v
            }

            #[inline(always)]
            fn mul_value_adjoint(self, g: Complex<$r>) -> Complex<$r> {
                self.conj() * g
            }

            #[inline(always)]
            fn value_grad(g: Complex<$r>, x: Complex<$r>) -> Self {
                g * x.conj()
            }
        }

        // A real twiddle scales the real and imaginary parts alike; its gradient keeps only the
        // real part of `g * conj(x)`.
        impl Twiddle<Complex<$r>> for $r {
            #[inline(always)]
            fn mul_value(self, v: Complex<$r>) -> Complex<$r> {
                v * self
            }

            #[inline(always)]
            fn mul_value_adjoint(self, g: Complex<$r>) -> Complex<$r> {
                g * self
            }

            #[inline(always)]
            fn value_grad(g: Complex<$r>, x: Complex<$r>) -> Self {
                g.re * x.re + g.im * x.im
            }
        }
    };
}

impl_twiddle!(f32);
impl_twiddle!(f64);
