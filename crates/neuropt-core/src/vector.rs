use crate::dtype::Float;
use crate::error::{NeuroptError, NeuroptResult};
use crate::matrix::Matrix;
use crate::scaling::ScalingMethod;
use crate::statistics::Statistics;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops;

/// Dense, owned vector of scalars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Vector<T: Float> {
    data: Vec<T>,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Vector<T> {
    pub fn new(data: Vec<T>) -> Self {
        Vector { data }
    }

    pub fn zeros(len: usize) -> Self {
        Vector {
            data: vec![T::ZERO; len],
        }
    }

    pub fn full(len: usize, value: T) -> Self {
        Vector {
            data: vec![value; len],
        }
    }

    pub fn from_slice(data: &[T]) -> Self {
        Vector {
            data: data.to_vec(),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, i: usize) -> NeuroptResult<T> {
        self.data.get(i).copied().ok_or(NeuroptError::IndexOutOfBounds {
            index: i,
            axis: 0,
            size: self.data.len(),
        })
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    fn check_same_len(&self, other: &Vector<T>) -> NeuroptResult<()> {
        if self.len() != other.len() {
            return Err(NeuroptError::shape(&[self.len()], &[other.len()]));
        }
        Ok(())
    }

    // ─── Element-wise Operations ────────────────────────────────────────────

    pub fn apply<F: Fn(T) -> T>(&self, f: F) -> Vector<T> {
        Vector {
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    fn zip_with<F: Fn(T, T) -> T>(&self, other: &Vector<T>, f: F) -> NeuroptResult<Vector<T>> {
        self.check_same_len(other)?;
        Ok(Vector {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub fn add(&self, other: &Vector<T>) -> NeuroptResult<Vector<T>> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Vector<T>) -> NeuroptResult<Vector<T>> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Vector<T>) -> NeuroptResult<Vector<T>> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn mul_scalar(&self, s: T) -> Vector<T> {
        self.apply(|x| x * s)
    }

    /// `self += alpha * other`, in place.
    pub fn add_scaled(&mut self, alpha: T, other: &[T]) -> NeuroptResult<()> {
        if self.len() != other.len() {
            return Err(NeuroptError::shape(&[self.len()], &[other.len()]));
        }
        for (a, &b) in self.data.iter_mut().zip(other) {
            *a += alpha * b;
        }
        Ok(())
    }

    // ─── Products and Norms ─────────────────────────────────────────────────

    pub fn dot(&self, other: &Vector<T>) -> NeuroptResult<T> {
        self.check_same_len(other)?;
        Ok(dot(&self.data, &other.data))
    }

    /// Outer product `self * other^T` as a `len x other.len()` matrix.
    pub fn outer(&self, other: &Vector<T>) -> Matrix<T> {
        let mut m = Matrix::zeros(self.len(), other.len());
        for (i, &a) in self.data.iter().enumerate() {
            for (j, &b) in other.data.iter().enumerate() {
                m[(i, j)] = a * b;
            }
        }
        m
    }

    /// Euclidean norm.
    pub fn norm(&self) -> T {
        norm(&self.data)
    }

    pub fn norm_l1(&self) -> T {
        self.data.iter().map(|x| x.abs()).sum()
    }

    /// Minkowski p-norm `(sum |x|^p)^(1/p)`.
    pub fn minkowski_norm(&self, p: T) -> T {
        let s: T = self.data.iter().map(|x| x.abs().powf(p)).sum();
        s.powf(T::ONE / p)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    // ─── Statistics ─────────────────────────────────────────────────────────

    pub fn sum(&self) -> T {
        self.data.iter().copied().sum()
    }

    pub fn mean(&self) -> NeuroptResult<T> {
        if self.is_empty() {
            return Err(NeuroptError::EmptyData("mean of an empty vector".to_string()));
        }
        Ok(self.sum() / T::from_usize(self.len()))
    }

    pub fn minimum(&self) -> NeuroptResult<T> {
        Ok(self.statistics()?.minimum)
    }

    pub fn maximum(&self) -> NeuroptResult<T> {
        Ok(self.statistics()?.maximum)
    }

    pub fn standard_deviation(&self) -> NeuroptResult<T> {
        Ok(self.statistics()?.standard_deviation)
    }

    pub fn statistics(&self) -> NeuroptResult<Statistics<T>> {
        Statistics::from_slice(&self.data)
    }

    // ─── Scaling ────────────────────────────────────────────────────────────

    /// Scales every element with the same statistics.
    pub fn scale(&mut self, method: ScalingMethod, stats: &Statistics<T>) {
        self.data.iter_mut().for_each(|x| *x = method.scale(*x, stats));
    }

    pub fn unscale(&mut self, method: ScalingMethod, stats: &Statistics<T>) {
        self.data.iter_mut().for_each(|x| *x = method.unscale(*x, stats));
    }

    /// Scales element `i` with `stats[i]` (one statistic per variable).
    pub fn scale_elements(
        &mut self,
        method: ScalingMethod,
        stats: &[Statistics<T>],
    ) -> NeuroptResult<()> {
        if stats.len() != self.len() {
            return Err(NeuroptError::shape(&[self.len()], &[stats.len()]));
        }
        method.scale_slice(&mut self.data, stats);
        Ok(())
    }

    pub fn unscale_elements(
        &mut self,
        method: ScalingMethod,
        stats: &[Statistics<T>],
    ) -> NeuroptResult<()> {
        if stats.len() != self.len() {
            return Err(NeuroptError::shape(&[self.len()], &[stats.len()]));
        }
        method.unscale_slice(&mut self.data, stats);
        Ok(())
    }
}

// ─── Slice Kernels ──────────────────────────────────────────────────────────

/// Dot product of two equally long slices.
#[inline]
pub fn dot<T: Float>(a: &[T], b: &[T]) -> T {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

/// Euclidean norm of a slice.
#[inline]
pub fn norm<T: Float>(a: &[T]) -> T {
    dot(a, a).sqrt()
}

// ─── Conversions and Operators ──────────────────────────────────────────────

impl<T: Float> From<Vec<T>> for Vector<T> {
    fn from(data: Vec<T>) -> Self {
        Vector { data }
    }
}

impl<T: Float> ops::Index<usize> for Vector<T> {
    type Output = T;
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T: Float> ops::IndexMut<usize> for Vector<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}

impl<T: Float> ops::Neg for &Vector<T> {
    type Output = Vector<T>;
    fn neg(self) -> Vector<T> {
        self.apply(|x| -x)
    }
}

impl<T: Float> ops::Add for &Vector<T> {
    type Output = Vector<T>;
    /// Panics on length mismatch; use [`Vector::add`] for a checked version.
    fn add(self, other: &Vector<T>) -> Vector<T> {
        Vector::add(self, other).expect("vector add: length mismatch")
    }
}

impl<T: Float> ops::Sub for &Vector<T> {
    type Output = Vector<T>;
    /// Panics on length mismatch; use [`Vector::sub`] for a checked version.
    fn sub(self, other: &Vector<T>) -> Vector<T> {
        Vector::sub(self, other).expect("vector sub: length mismatch")
    }
}

impl<T: Float> fmt::Display for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, x) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", x)?;
        }
        write!(f, "]")
    }
}
