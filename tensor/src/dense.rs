use num_complex::Complex;
use num_traits::{Float, Zero};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Device, Element, RealElement};

/// A dense tensor stored in row-major order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorRepr<T>")]
pub struct Tensor<T> {
    values: Vec<T>,
    shape: Vec<usize>,
    device: Device,
}

/// Unchecked serialized form of a [`Tensor`].
#[derive(Deserialize)]
struct TensorRepr<T> {
    values: Vec<T>,
    shape: Vec<usize>,
    device: Device,
}

impl<T> TryFrom<TensorRepr<T>> for Tensor<T> {
    type Error = String;

    fn try_from(repr: TensorRepr<T>) -> Result<Self, Self::Error> {
        let TensorRepr {
            values,
            shape,
            device,
        } = repr;
        let expected = shape.iter().product::<usize>();
        if values.len() != expected {
            return Err(format!(
                "{} values cannot fill shape {shape:?}",
                values.len()
            ));
        }
        Ok(Self {
            values,
            shape,
            device,
        })
    }
}

impl<T> Tensor<T> {
    /// Wraps `values` as a tensor of the given shape, placed on the CPU.
    ///
    /// # Panics
    /// Panics if the number of values differs from the product of the dimensions.
    #[must_use]
    pub fn new(values: Vec<T>, shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        assert_eq!(
            values.len(),
            shape.iter().product::<usize>(),
            "{} values cannot fill shape {shape:?}",
            values.len()
        );
        Self {
            values,
            shape,
            device: Device::Cpu,
        }
    }

    /// Retags the tensor with another placement.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    #[inline]
    pub const fn device(&self) -> Device {
        self.device
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Size of axis `axis`.
    ///
    /// # Panics
    /// Panics if `axis >= self.rank()`.
    #[inline]
    pub fn dim(&self, axis: usize) -> usize {
        self.shape[axis]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    /// Row-major offset of a multi-index, or `None` if it is out of bounds.
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        index
            .iter()
            .zip(&self.shape)
            .try_fold(0, |acc, (&i, &d)| (i < d).then_some(acc * d + i))
    }

    pub fn get(&self, index: &[usize]) -> Option<&T> {
        self.offset(index).map(|o| &self.values[o])
    }

    pub fn get_mut(&mut self, index: &[usize]) -> Option<&mut T> {
        self.offset(index).map(move |o| &mut self.values[o])
    }

    /// Reinterprets the values under a new shape with the same number of elements.
    ///
    /// # Panics
    /// Panics if the element counts differ.
    #[must_use]
    pub fn reshape(self, shape: impl Into<Vec<usize>>) -> Self {
        let device = self.device;
        Self::new(self.values, shape).with_device(device)
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Tensor<U> {
        Tensor {
            values: self.values.iter().map(f).collect(),
            shape: self.shape.clone(),
            device: self.device,
        }
    }
}

impl<T: Element> Tensor<T> {
    #[must_use]
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self::new(vec![T::zero(); len], shape)
    }

    /// A tensor with every component drawn uniformly from `[-1, 1)`.
    #[must_use]
    pub fn rand<R: Rng>(rng: &mut R, shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        let values = (0..len).map(|_| T::sample(rng)).collect();
        Self::new(values, shape)
    }

    /// Like `zeros`, but with the shape and placement of `self`.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.clone()).with_device(self.device)
    }

    #[inline]
    pub const fn dtype(&self) -> crate::DType {
        T::DTYPE
    }

    /// Sum of `|x|^2` over all values.
    pub fn norm_sqr(&self) -> T::Real {
        self.values.iter().map(|&x| x.norm_sqr()).sum()
    }

    /// Largest `|a - b|` between corresponding values.
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn max_abs_diff(&self, other: &Self) -> T::Real {
        assert_eq!(self.shape, other.shape, "shape mismatch");
        self.values
            .iter()
            .zip(&other.values)
            .map(|(&a, &b)| (a - b).norm_sqr().sqrt())
            .fold(T::Real::zero(), T::Real::max)
    }
}

impl<R: RealElement> Tensor<Complex<R>> {
    /// The interleaved real view: a trailing axis of size 2 holding `(re, im)`.
    #[must_use]
    pub fn to_interleaved(&self) -> Tensor<R> {
        let values = self.values.iter().flat_map(|z| [z.re, z.im]).collect();
        let mut shape = self.shape.clone();
        shape.push(2);
        Tensor::new(values, shape).with_device(self.device)
    }

    /// Inverse of [`Tensor::to_interleaved`].
    ///
    /// # Panics
    /// Panics if the trailing axis is missing or its size is not 2.
    #[must_use]
    pub fn from_interleaved(real: &Tensor<R>) -> Self {
        assert_eq!(
            real.shape.last(),
            Some(&2),
            "interleaved complex tensors need a trailing axis of size 2, got {:?}",
            real.shape
        );
        let values = real
            .values
            .chunks_exact(2)
            .map(|pair| Complex::new(pair[0], pair[1]))
            .collect();
        let shape = real.shape[..real.shape.len() - 1].to_vec();
        Self::new(values, shape).with_device(real.device)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::DType;

    #[test]
    fn offsets_are_row_major() {
        let t = Tensor::new((0..24).map(f64::from).collect(), [2, 3, 4]);
        assert_eq!(t.offset(&[0, 0, 0]), Some(0));
        assert_eq!(t.offset(&[1, 2, 3]), Some(23));
        assert_eq!(t.offset(&[0, 1, 2]), Some(6));
        assert_eq!(t.offset(&[0, 3, 0]), None);
        assert_eq!(t.offset(&[0, 0]), None);
        assert_eq!(t.get(&[1, 0, 1]), Some(&13.0));
    }

    #[test]
    #[should_panic]
    fn new_rejects_wrong_length() {
        let _ = Tensor::new(vec![1.0_f32; 5], [2, 3]);
    }

    #[test]
    fn reshape_keeps_device() {
        let t = Tensor::<f32>::zeros([4, 2]).with_device(Device::Cuda(1));
        let r = t.reshape([2, 2, 2]);
        assert_eq!(r.shape(), &[2, 2, 2]);
        assert_eq!(r.device(), Device::Cuda(1));
        assert_eq!(r.dtype(), DType::F32);
    }

    #[test]
    fn interleaved_view_round_trips() {
        let mut rng = SmallRng::seed_from_u64(3);
        let z = Tensor::<Complex<f64>>::rand(&mut rng, [2, 1, 4]);
        let real = z.to_interleaved();
        assert_eq!(real.shape(), &[2, 1, 4, 2]);
        assert_eq!(real.values()[2], z.values()[1].re);
        assert_eq!(real.values()[3], z.values()[1].im);
        assert_eq!(Tensor::from_interleaved(&real), z);
    }

    #[test]
    fn norms_and_differences() {
        let a = Tensor::new(vec![3.0_f64, 4.0], [2]);
        let b = Tensor::new(vec![3.5_f64, 2.0], [2]);
        assert_eq!(a.norm_sqr(), 25.0);
        assert_eq!(a.max_abs_diff(&b), 2.0);
    }

    #[test]
    fn serializes_with_shape_and_device() {
        let t = Tensor::new(vec![1.0_f64, -2.0], [1, 2]).with_device(Device::Cuda(0));
        let json = serde_json::to_string(&t).unwrap();
        let back: Tensor<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn deserializing_checks_the_value_count() {
        let short = r#"{"values":[1.0,0.0],"shape":[1,1,1,2,2],"device":"Cpu"}"#;
        let err = serde_json::from_str::<Tensor<f64>>(short).unwrap_err();
        assert!(err.to_string().contains("2 values cannot fill shape [1, 1, 1, 2, 2]"));

        let exact = r#"{"values":[1.0,0.0,0.0,1.0],"shape":[1,1,1,2,2],"device":"Cpu"}"#;
        let t: Tensor<f64> = serde_json::from_str(exact).unwrap();
        assert_eq!(t.shape(), &[1, 1, 1, 2, 2]);
    }
}
