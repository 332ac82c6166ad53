use std::ops::{Index, IndexMut};

use crate::errors::MathError;

/// Compares two doubles with the machine epsilon of the environment.
pub fn nearly_equal(d1: f64, d2: f64) -> bool {
    (d1 - d2).abs() < f64::EPSILON
}

/// A dense, row-major matrix of doubles.
///
/// The type carries exactly the operations the training pipeline needs: the ring
/// operations, transposition, a Gauss-Jordan pseudo-inverse, row/column sub-matrix
/// extraction and appending a bias column of ones. Shape conflicts surface as
/// [DimensionMismatch](MathError::DimensionMismatch); an uninvertible square matrix
/// surfaces as [Singular](MathError::Singular).
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Creates a matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Creates a matrix with every cell set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Creates a matrix from a rectangular nested vector.
    ///
    /// # Example
    /// ```rust
    /// use nucleid_math::Matrix;
    /// let m = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    /// assert_eq!(m[(1, 0)], 3.0);
    /// ```
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Matrix, MathError> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(MathError::EmptyMatrix);
        }
        let cols = rows[0].len();
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in &rows {
            if row.len() != cols {
                return Err(MathError::DimensionMismatch {
                    operation: "from_rows",
                    left_rows: rows.len(),
                    left_cols: cols,
                    right_rows: 1,
                    right_cols: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// A single row as a slice.
    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Copies `values` into row `r`.
    pub fn set_row(&mut self, r: usize, values: &[f64]) -> Result<(), MathError> {
        if values.len() != self.cols {
            return Err(MathError::DimensionMismatch {
                operation: "set_row",
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: 1,
                right_cols: values.len(),
            });
        }
        if r >= self.rows {
            return Err(MathError::IndexOutOfRange {
                index: r,
                size: self.rows,
                axis: "rows",
            });
        }
        self.data[r * self.cols..(r + 1) * self.cols].copy_from_slice(values);
        Ok(())
    }

    /// The whole backing slice, row-major.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Element-wise sum.
    pub fn plus(&self, other: &Matrix) -> Result<Matrix, MathError> {
        self.check_same_shape("plus", other)?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a + b)
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Element-wise difference.
    pub fn minus(&self, other: &Matrix) -> Result<Matrix, MathError> {
        self.check_same_shape("minus", other)?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a - b)
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    fn check_same_shape(&self, operation: &'static str, other: &Matrix) -> Result<(), MathError> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(MathError::DimensionMismatch {
                operation,
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: other.rows,
                right_cols: other.cols,
            });
        }
        Ok(())
    }

    /// Matrix product.
    pub fn times(&self, other: &Matrix) -> Result<Matrix, MathError> {
        if self.cols != other.rows {
            return Err(MathError::DimensionMismatch {
                operation: "times",
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: other.rows,
                right_cols: other.cols,
            });
        }
        let mut result = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    result.data[i * other.cols + j] += a * other.data[k * other.cols + j];
                }
            }
        }
        Ok(result)
    }

    /// Transposition.
    pub fn transpose(&self) -> Matrix {
        let mut t = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                t.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        t
    }

    /// Gauss-Jordan inverse of a square matrix.
    ///
    /// The matrix is augmented with the identity and reduced; a zero pivot is repaired by
    /// adding another row with a non-zero entry in that column. If the left block does not
    /// come out as the identity, the matrix is [Singular](MathError::Singular).
    pub fn inverse(&self) -> Result<Matrix, MathError> {
        if self.rows != self.cols {
            return Err(MathError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let n = self.rows;
        let width = 2 * n;
        let mut aug = vec![0.0f64; n * width];
        for i in 0..n {
            for j in 0..n {
                aug[i * width + j] = self.data[i * n + j];
            }
            aug[i * width + n + i] = 1.0;
        }

        for i in 0..n {
            if nearly_equal(aug[i * width + i], 0.0) {
                for j in 0..n {
                    if i != j && !nearly_equal(aug[j * width + i], 0.0) {
                        for k in 0..width {
                            aug[i * width + k] += aug[j * width + k];
                        }
                        break;
                    }
                }
            }

            for j in 0..n {
                if j != i && !nearly_equal(aug[j * width + i], 0.0) {
                    let factor = aug[j * width + i] / aug[i * width + i];
                    for k in 0..width {
                        if k == i {
                            aug[j * width + k] = 0.0;
                        } else {
                            aug[j * width + k] -= aug[i * width + k] * factor;
                        }
                    }
                }
            }
        }

        for i in 0..n {
            let pivot = aug[i * width + i];
            if !nearly_equal(pivot, 1.0) {
                for j in 0..width {
                    aug[i * width + j] /= pivot;
                }
            }
        }

        // The left block must have reduced to the identity.
        for i in 0..n {
            for j in 0..n {
                let value = aug[i * width + j];
                let expected_one = i == j;
                if (expected_one && (value - 1.0).abs() > 1e-8)
                    || (!expected_one && value.abs() > 1e-8)
                    || !value.is_finite()
                {
                    return Err(MathError::Singular);
                }
            }
        }

        let mut result = Matrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                result.data[i * n + j] = aug[i * width + n + j];
            }
        }
        Ok(result)
    }

    /// Pseudo-inverse: `(AᵀA)⁻¹Aᵀ` when rows ≥ cols, `Aᵀ(AAᵀ)⁻¹` otherwise.
    pub fn pseudo_inverse(&self) -> Result<Matrix, MathError> {
        let t = self.transpose();
        if self.rows >= self.cols {
            t.times(self)?.inverse()?.times(&t)
        } else {
            t.times(&self.times(&t)?.inverse()?)
        }
    }

    /// Rows selected by index, in the given order.
    pub fn sub_matrix(&self, row_indices: &[usize]) -> Result<Matrix, MathError> {
        let mut result = Matrix::zeros(row_indices.len(), self.cols);
        for (out_r, &r) in row_indices.iter().enumerate() {
            if r >= self.rows {
                return Err(MathError::IndexOutOfRange {
                    index: r,
                    size: self.rows,
                    axis: "rows",
                });
            }
            result.data[out_r * self.cols..(out_r + 1) * self.cols].copy_from_slice(self.row(r));
        }
        Ok(result)
    }

    /// Columns selected by index, in the given order.
    pub fn sub_matrix_by_col(&self, col_indices: &[usize]) -> Result<Matrix, MathError> {
        let mut result = Matrix::zeros(self.rows, col_indices.len());
        for (out_c, &c) in col_indices.iter().enumerate() {
            if c >= self.cols {
                return Err(MathError::IndexOutOfRange {
                    index: c,
                    size: self.cols,
                    axis: "columns",
                });
            }
            for r in 0..self.rows {
                result.data[r * col_indices.len() + out_c] = self.data[r * self.cols + c];
            }
        }
        Ok(result)
    }

    /// A copy with a bias column of ones prepended as the FIRST column.
    pub fn append_ones_column(&self) -> Matrix {
        let mut result = Matrix::filled(self.rows, self.cols + 1, 1.0);
        for r in 0..self.rows {
            for c in 0..self.cols {
                result.data[r * (self.cols + 1) + c + 1] = self.data[r * self.cols + c];
            }
        }
        result
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        &mut self.data[r * self.cols + c]
    }
}
