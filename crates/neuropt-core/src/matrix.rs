use crate::dtype::Float;
use crate::error::{NeuroptError, NeuroptResult};
use crate::scaling::ScalingMethod;
use crate::statistics::Statistics;
use crate::vector::{dot, Vector};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops;

/// Dense row-major matrix.
///
/// In dataset and batch contexts rows are instances and columns are variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Matrix<T: Float> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Matrix<T> {
    /// Create a matrix from row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> NeuroptResult<Self> {
        if data.len() != rows * cols {
            return Err(NeuroptError::shape(&[rows, cols], &[data.len()]));
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![T::ZERO; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Matrix::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = T::ONE;
        }
        m
    }

    /// Create a matrix from a slice of equally long rows.
    pub fn from_rows(rows: &[Vec<T>]) -> NeuroptResult<Self> {
        if rows.is_empty() {
            return Ok(Matrix::zeros(0, 0));
        }
        let cols = rows[0].len();
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(NeuroptError::shape(&[cols], &[row.len()]));
            }
            data.extend_from_slice(row);
        }
        Matrix::new(rows.len(), cols, data)
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
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

    pub fn get(&self, i: usize, j: usize) -> NeuroptResult<T> {
        self.check_index(i, j)?;
        Ok(self.data[i * self.cols + j])
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) -> NeuroptResult<()> {
        self.check_index(i, j)?;
        self.data[i * self.cols + j] = value;
        Ok(())
    }

    fn check_index(&self, i: usize, j: usize) -> NeuroptResult<()> {
        if i >= self.rows {
            return Err(NeuroptError::IndexOutOfBounds {
                index: i,
                axis: 0,
                size: self.rows,
            });
        }
        if j >= self.cols {
            return Err(NeuroptError::IndexOutOfBounds {
                index: j,
                axis: 1,
                size: self.cols,
            });
        }
        Ok(())
    }

    /// Borrow row `i` as a slice. Panics if `i` is out of bounds.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        let cols = self.cols;
        &mut self.data[i * cols..(i + 1) * cols]
    }

    pub fn column(&self, j: usize) -> NeuroptResult<Vector<T>> {
        if j >= self.cols {
            return Err(NeuroptError::IndexOutOfBounds {
                index: j,
                axis: 1,
                size: self.cols,
            });
        }
        Ok(Vector::new(
            (0..self.rows).map(|i| self.data[i * self.cols + j]).collect(),
        ))
    }

    /// New matrix made of the given rows, in order.
    pub fn select_rows(&self, indices: &[usize]) -> NeuroptResult<Matrix<T>> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            if i >= self.rows {
                return Err(NeuroptError::IndexOutOfBounds {
                    index: i,
                    axis: 0,
                    size: self.rows,
                });
            }
            data.extend_from_slice(self.row(i));
        }
        Matrix::new(indices.len(), self.cols, data)
    }

    /// New matrix made of the given columns, in order.
    pub fn select_columns(&self, indices: &[usize]) -> NeuroptResult<Matrix<T>> {
        for &j in indices {
            if j >= self.cols {
                return Err(NeuroptError::IndexOutOfBounds {
                    index: j,
                    axis: 1,
                    size: self.cols,
                });
            }
        }
        let mut data = Vec::with_capacity(self.rows * indices.len());
        for i in 0..self.rows {
            let row = self.row(i);
            data.extend(indices.iter().map(|&j| row[j]));
        }
        Matrix::new(self.rows, indices.len(), data)
    }

    /// Rows `rows` and columns `cols` in one step.
    pub fn submatrix(&self, rows: &[usize], cols: &[usize]) -> NeuroptResult<Matrix<T>> {
        self.select_rows(rows)?.select_columns(cols)
    }

    pub fn transpose(&self) -> Matrix<T> {
        let mut data = vec![T::ZERO; self.data.len()];
        for i in 0..self.rows {
            for j in 0..self.cols {
                data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        Matrix {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }

    // ─── Element-wise Operations ────────────────────────────────────────────

    fn check_same_shape(&self, other: &Matrix<T>) -> NeuroptResult<()> {
        if self.shape() != other.shape() {
            return Err(NeuroptError::shape(
                &[self.rows, self.cols],
                &[other.rows, other.cols],
            ));
        }
        Ok(())
    }

    pub fn apply<F: Fn(T) -> T>(&self, f: F) -> Matrix<T> {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    pub fn add(&self, other: &Matrix<T>) -> NeuroptResult<Matrix<T>> {
        self.check_same_shape(other)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| a + b).collect(),
        })
    }

    pub fn sub(&self, other: &Matrix<T>) -> NeuroptResult<Matrix<T>> {
        self.check_same_shape(other)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| a - b).collect(),
        })
    }

    pub fn mul_scalar(&self, s: T) -> Matrix<T> {
        self.apply(|x| x * s)
    }

    /// `self += alpha * a * b^T` (rank-one update), in place.
    pub fn add_outer(&mut self, alpha: T, a: &[T], b: &[T]) -> NeuroptResult<()> {
        if a.len() != self.rows || b.len() != self.cols {
            return Err(NeuroptError::shape(&[self.rows, self.cols], &[a.len(), b.len()]));
        }
        for (i, &ai) in a.iter().enumerate() {
            let scaled = alpha * ai;
            for (x, &bj) in self.row_mut(i).iter_mut().zip(b) {
                *x += scaled * bj;
            }
        }
        Ok(())
    }

    // ─── Matrix Products ────────────────────────────────────────────────────

    /// Matrix-vector product `self * v`.
    pub fn dot_vector(&self, v: &[T]) -> NeuroptResult<Vector<T>> {
        if v.len() != self.cols {
            return Err(NeuroptError::shape(&[self.cols], &[v.len()]));
        }
        Ok(Vector::new((0..self.rows).map(|i| dot(self.row(i), v)).collect()))
    }

    /// Transposed matrix-vector product `self^T * v`.
    pub fn transpose_dot_vector(&self, v: &[T]) -> NeuroptResult<Vector<T>> {
        if v.len() != self.rows {
            return Err(NeuroptError::shape(&[self.rows], &[v.len()]));
        }
        let mut out = vec![T::ZERO; self.cols];
        for (i, &vi) in v.iter().enumerate() {
            for (o, &a) in out.iter_mut().zip(self.row(i)) {
                *o += a * vi;
            }
        }
        Ok(Vector::new(out))
    }

    /// Matrix-matrix product.
    pub fn matmul(&self, other: &Matrix<T>) -> NeuroptResult<Matrix<T>> {
        if self.cols != other.rows {
            return Err(NeuroptError::shape(&[self.cols], &[other.rows]));
        }
        let (m, k, n) = (self.rows, self.cols, other.cols);
        let mut data = vec![T::ZERO; m * n];
        // i-k-j loop order for cache-friendly row-major access
        for i in 0..m {
            for p in 0..k {
                let a = self.data[i * k + p];
                let b_row = &other.data[p * n..(p + 1) * n];
                let out = &mut data[i * n..(i + 1) * n];
                for (o, &b) in out.iter_mut().zip(b_row) {
                    *o += a * b;
                }
            }
        }
        Matrix::new(m, n, data)
    }

    // ─── Statistics ─────────────────────────────────────────────────────────

    /// Statistics of every column (one per variable).
    pub fn column_statistics(&self) -> NeuroptResult<Vec<Statistics<T>>> {
        (0..self.cols)
            .map(|j| Statistics::from_slice(self.column(j)?.data()))
            .collect()
    }

    /// Statistics of every row (one per instance).
    pub fn row_statistics(&self) -> NeuroptResult<Vec<Statistics<T>>> {
        (0..self.rows).map(|i| Statistics::from_slice(self.row(i))).collect()
    }

    pub fn column_means(&self) -> NeuroptResult<Vector<T>> {
        Ok(Vector::new(
            self.column_statistics()?.iter().map(|s| s.mean).collect(),
        ))
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    // ─── Scaling ────────────────────────────────────────────────────────────

    /// Scales column `j` with `stats[j]`.
    pub fn scale_columns(
        &mut self,
        method: ScalingMethod,
        stats: &[Statistics<T>],
    ) -> NeuroptResult<()> {
        if stats.len() != self.cols {
            return Err(NeuroptError::shape(&[self.cols], &[stats.len()]));
        }
        for (j, s) in stats.iter().enumerate() {
            if method.is_degenerate(s) {
                log::warn!("variable {j} has degenerate statistics and is left unscaled");
            }
        }
        for i in 0..self.rows {
            method.scale_slice(self.row_mut(i), stats);
        }
        Ok(())
    }

    pub fn unscale_columns(
        &mut self,
        method: ScalingMethod,
        stats: &[Statistics<T>],
    ) -> NeuroptResult<()> {
        if stats.len() != self.cols {
            return Err(NeuroptError::shape(&[self.cols], &[stats.len()]));
        }
        for i in 0..self.rows {
            method.unscale_slice(self.row_mut(i), stats);
        }
        Ok(())
    }

    /// Scales row `i` with `stats[i]`.
    pub fn scale_rows(&mut self, method: ScalingMethod, stats: &[Statistics<T>]) -> NeuroptResult<()> {
        if stats.len() != self.rows {
            return Err(NeuroptError::shape(&[self.rows], &[stats.len()]));
        }
        for (i, s) in stats.iter().enumerate() {
            self.row_mut(i).iter_mut().for_each(|x| *x = method.scale(*x, s));
        }
        Ok(())
    }

    pub fn unscale_rows(
        &mut self,
        method: ScalingMethod,
        stats: &[Statistics<T>],
    ) -> NeuroptResult<()> {
        if stats.len() != self.rows {
            return Err(NeuroptError::shape(&[self.rows], &[stats.len()]));
        }
        for (i, s) in stats.iter().enumerate() {
            self.row_mut(i).iter_mut().for_each(|x| *x = method.unscale(*x, s));
        }
        Ok(())
    }
}

// ─── Operators ──────────────────────────────────────────────────────────────

impl<T: Float> ops::Index<(usize, usize)> for Matrix<T> {
    type Output = T;
    fn index(&self, (i, j): (usize, usize)) -> &T {
        &self.data[i * self.cols + j]
    }
}

impl<T: Float> ops::IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        &mut self.data[i * self.cols + j]
    }
}

impl<T: Float> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix({}x{}) [", self.rows, self.cols)?;
        for i in 0..self.rows {
            let row: Vec<String> = self.row(i).iter().map(|x| format!("{:.4}", x)).collect();
            writeln!(f, "  [{}]", row.join(", "))?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Matrix<f64> {
        Matrix::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()
    }

    #[test]
    fn test_creation() {
        let m = sample();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m[(1, 2)], 6.0);
        assert!(Matrix::<f64>::new(2, 2, vec![1.0]).is_err());

        let eye: Matrix<f64> = Matrix::identity(3);
        assert_eq!(eye.data().iter().sum::<f64>(), 3.0);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let r = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(r, Err(NeuroptError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_matmul() {
        let a = sample();
        let b: Matrix<f64> =
            Matrix::new(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.data(), &[58.0, 64.0, 139.0, 154.0]);
        assert!(a.matmul(&a).is_err());
    }

    #[test]
    fn test_matrix_vector_products() {
        let a = sample();
        assert_eq!(a.dot_vector(&[1.0, 0.0, -1.0]).unwrap().data(), &[-2.0, -2.0]);
        assert_eq!(a.transpose_dot_vector(&[1.0, 1.0]).unwrap().data(), &[5.0, 7.0, 9.0]);
        assert!(matches!(
            a.dot_vector(&[1.0, 2.0]),
            Err(NeuroptError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_transpose_and_selection() {
        let a = sample();
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t[(2, 1)], 6.0);

        let s = a.submatrix(&[1], &[2, 0]).unwrap();
        assert_eq!(s.data(), &[6.0, 4.0]);
        assert!(a.select_rows(&[2]).is_err());
    }

    #[test]
    fn test_add_outer() {
        let mut m: Matrix<f64> = Matrix::identity(2);
        m.add_outer(2.0, &[1.0, 2.0], &[3.0, 4.0]).unwrap();
        assert_eq!(m.data(), &[7.0, 8.0, 12.0, 17.0]);
    }

    #[test]
    fn test_column_statistics() {
        let stats = sample().column_statistics().unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].minimum, 1.0);
        assert_eq!(stats[0].maximum, 4.0);
        assert_abs_diff_eq!(stats[1].mean, 3.5, epsilon = 1e-12);
        let rows = sample().row_statistics().unwrap();
        assert_abs_diff_eq!(rows[1].mean, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scale_columns_round_trip() {
        let original: Matrix<f64> = Matrix::from_rows(&[
            vec![1.0, 10.0, 3.0],
            vec![5.0, 20.0, 3.0],
            vec![3.0, 30.0, 3.0],
        ])
        .unwrap();
        let stats = original.column_statistics().unwrap();

        for method in [ScalingMethod::MinimumMaximum, ScalingMethod::MeanStandardDeviation] {
            let mut m = original.clone();
            m.scale_columns(method, &stats).unwrap();
            if method == ScalingMethod::MinimumMaximum {
                let col = m.column(1).unwrap();
                assert_abs_diff_eq!(col.minimum().unwrap(), -1.0, epsilon = 1e-12);
                assert_abs_diff_eq!(col.maximum().unwrap(), 1.0, epsilon = 1e-12);
            }
            // constant column is left untouched
            assert_eq!(m[(0, 2)], 3.0);
            m.unscale_columns(method, &stats).unwrap();
            for (a, b) in m.data().iter().zip(original.data()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_scale_rows_round_trip() {
        let original = sample();
        let stats = original.row_statistics().unwrap();
        let mut m = original.clone();
        m.scale_rows(ScalingMethod::MeanStandardDeviation, &stats).unwrap();
        let means = m.row_statistics().unwrap();
        assert_abs_diff_eq!(means[0].mean, 0.0, epsilon = 1e-12);
        m.unscale_rows(ScalingMethod::MeanStandardDeviation, &stats).unwrap();
        for (a, b) in m.data().iter().zip(original.data()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
