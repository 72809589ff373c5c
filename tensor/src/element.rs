use core::fmt::{self, Debug, Display};
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_complex::Complex;
use num_traits::{Float, FloatConst, NumAssign, One, Zero};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The scalar type of a tensor, as reported to callers and in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    ComplexF32,
    ComplexF64,
}

impl DType {
    /// Whether values of this type carry an imaginary component.
    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::ComplexF32 | Self::ComplexF64)
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::ComplexF32 => "complex<f32>",
            Self::ComplexF64 => "complex<f64>",
        };
        f.write_str(name)
    }
}

/// A value stored in a tensor: a real float or a complex number over one.
pub trait Element:
    Copy
    + Default
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + Sum
{
    /// The underlying real type.
    type Real: RealElement;

    const DTYPE: DType;

    /// Number of real components in one value, i.e. the size of the trailing axis in the
    /// interleaved view.
    const COMPONENTS: usize;

    /// Complex conjugate; the identity for real values.
    #[must_use]
    fn conj(self) -> Self;

    fn re(self) -> Self::Real;

    /// Imaginary part; zero for real values.
    fn im(self) -> Self::Real;

    /// `|x|^2`.
    fn norm_sqr(self) -> Self::Real;

    /// Builds a value from its components. Real types ignore `im`.
    fn from_parts(re: Self::Real, im: Self::Real) -> Self;

    #[inline]
    fn from_real(re: Self::Real) -> Self {
        Self::from_parts(re, Self::Real::zero())
    }

    /// Draws every component uniformly from `[-1, 1)`.
    fn sample<R: Rng>(rng: &mut R) -> Self;
}

/// A real floating point element.
pub trait RealElement: Element<Real = Self> + Float + FloatConst + NumAssign + Display {
    /// The dtype of `Complex<Self>`.
    const COMPLEX_DTYPE: DType;

    fn from_f64(x: f64) -> Self;

    fn as_f64(self) -> f64;
}

macro_rules! impl_real_element {
    ($t:ty, $dtype:expr, $complex_dtype:expr) => {
        impl Element for $t {
            type Real = Self;

            const DTYPE: DType = $dtype;
            const COMPONENTS: usize = 1;

            #[inline(always)]
            fn conj(self) -> Self {
                self
            }

            #[inline(always)]
            fn re(self) -> Self {
                self
            }

            #[inline(always)]
            fn im(self) -> Self {
                0.0
            }

            #[inline(always)]
            fn norm_sqr(self) -> Self {
                self * self
            }

            #[inline(always)]
            fn from_parts(re: Self, _im: Self) -> Self {
                re
            }

            fn sample<R: Rng>(rng: &mut R) -> Self {
                rng.random_range(-1.0..1.0)
            }
        }

        impl RealElement for $t {
            const COMPLEX_DTYPE: DType = $complex_dtype;

            #[inline(always)]
            fn from_f64(x: f64) -> Self {
                x as $t
            }

            #[inline(always)]
            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_real_element!(f32, DType::F32, DType::ComplexF32);
impl_real_element!(f64, DType::F64, DType::ComplexF64);

impl<R: RealElement> Element for Complex<R> {
    type Real = R;

    const DTYPE: DType = R::COMPLEX_DTYPE;
    const COMPONENTS: usize = 2;

    #[inline(always)]
    fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    #[inline(always)]
    fn re(self) -> R {
        self.re
    }

    #[inline(always)]
    fn im(self) -> R {
        self.im
    }

    #[inline(always)]
    fn norm_sqr(self) -> R {
        self.re * self.re + self.im * self.im
    }

    #[inline(always)]
    fn from_parts(re: R, im: R) -> Self {
        Self::new(re, im)
    }

    fn sample<G: Rng>(rng: &mut G) -> Self {
        let re = R::sample(rng);
        let im = R::sample(rng);
        Self::new(re, im)
    }
}
