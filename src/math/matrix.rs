use rand::Rng;
use std::f64::consts::PI;
use std::ops::Mul;

use crate::error::{NetError, Result};

/// Relative pivot threshold below which `inverse` treats a matrix as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Dense row-major matrix. Rows are independent batch examples unless a
/// caller says otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix{
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>
}

impl Matrix{
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix{
            rows,
            cols,
            data: vec![vec![value; cols]; rows]
        }
    }

    pub fn identity(n: usize) -> Matrix {
        let mut res = Matrix::zeros(n, n);
        for i in 0..n {
            res.data[i][i] = 1.0;
        }
        res
    }

    /// A single-row matrix, the shape used for biases and batch-norm parameters.
    pub fn row(values: Vec<f64>) -> Matrix {
        Matrix { rows: 1, cols: values.len(), data: vec![values] }
    }

    /// Builds a matrix from row vectors. Rejects empty input and ragged rows.
    pub fn from_data(data: Vec<Vec<f64>>) -> Result<Matrix> {
        let cols = match data.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(NetError::InvalidArgument("matrix must have at least one row and column".into())),
        };
        if let Some(bad) = data.iter().position(|r| r.len() != cols) {
            return Err(NetError::InvalidArgument(format!(
                "row {bad} has {} columns, expected {cols}",
                data[bad].len()
            )));
        }
        Ok(Matrix { rows: data.len(), cols, data })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Draw two independent uniform samples in (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                res.data[i][j] = Matrix::sample_standard_normal(rng) * std_dev;
            }
        }
        res
    }

    /// He initialization: samples from N(0, sqrt(2 / rows)).
    ///
    /// Weights here are stored `in_dim × out_dim`, so `rows` is the fan-in.
    /// Recommended before ReLU layers.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (2.0 / rows as f64).sqrt(), rng)
    }

    /// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / rows)).
    ///
    /// Recommended before Sigmoid/Tanh layers.
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (1.0 / rows as f64).sqrt(), rng)
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.data[i][j] = self.data[j][i];
            }
        }

        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    /// Combines two same-shape matrices element by element.
    pub fn zip_with<F>(&self, rhs: &Matrix, op: &'static str, functor: F) -> Result<Matrix>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape() != rhs.shape() {
            return Err(NetError::shape(op, self.shape(), rhs.shape()));
        }
        let data = self.data.iter().zip(rhs.data.iter())
            .map(|(row_a, row_b)| {
                row_a.iter().zip(row_b.iter()).map(|(&x, &y)| functor(x, y)).collect()
            })
            .collect();
        Ok(Matrix { rows: self.rows, cols: self.cols, data })
    }

    pub fn add(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "add", |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "subtract", |a, b| a - b)
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "elementwise multiply", |a, b| a * b)
    }

    pub fn scale(&self, scalar: f64) -> Matrix {
        self.map(|x| x * scalar)
    }

    /// Adds a `1 × cols` row to every row of `self`.
    pub fn add_row_broadcast(&self, bias: &Matrix) -> Result<Matrix> {
        if bias.rows != 1 || bias.cols != self.cols {
            return Err(NetError::shape("broadcast add", self.shape(), bias.shape()));
        }
        let data = self.data.iter()
            .map(|row| row.iter().zip(bias.data[0].iter()).map(|(x, b)| x + b).collect())
            .collect();
        Ok(Matrix { rows: self.rows, cols: self.cols, data })
    }

    /// Standard matrix product. Requires `self.cols == rhs.rows`.
    pub fn matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(NetError::shape("multiply", self.shape(), rhs.shape()));
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        for i in 0..res.rows {
            for k in 0..self.cols {
                let a = self.data[i][k];
                for j in 0..res.cols {
                    res.data[i][j] += a * rhs.data[k][j];
                }
            }
        }

        Ok(res)
    }

    /// Sums over the batch dimension, giving a `1 × cols` row.
    pub fn column_sum(&self) -> Matrix {
        let mut res = Matrix::zeros(1, self.cols);
        for row in &self.data {
            for (acc, x) in res.data[0].iter_mut().zip(row.iter()) {
                *acc += x;
            }
        }
        res
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().flat_map(|row| row.iter()).sum()
    }

    /// Index of the largest entry in each row. Ties resolve to the lowest index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.data.iter()
            .map(|row| {
                let mut best = 0;
                for (j, &v) in row.iter().enumerate().skip(1) {
                    if v > row[best] {
                        best = j;
                    }
                }
                best
            })
            .collect()
    }

    pub fn flatten(&self) -> Vec<f64> {
        self.data.iter().flat_map(|row| row.iter().copied()).collect()
    }

    pub fn reshape(flat: &[f64], rows: usize, cols: usize) -> Result<Matrix> {
        if flat.len() != rows * cols {
            return Err(NetError::shape("reshape", (flat.len(), 1), (rows, cols)));
        }
        let data = if cols == 0 {
            vec![Vec::new(); rows]
        } else {
            flat.chunks(cols).map(|c| c.to_vec()).collect()
        };
        Ok(Matrix { rows, cols, data })
    }

    fn require_square(&self, op: &'static str) -> Result<()> {
        if self.rows != self.cols || self.rows == 0 {
            return Err(NetError::shape(op, self.shape(), (self.cols, self.rows)));
        }
        Ok(())
    }

    /// Determinant by Gaussian elimination with partial pivoting.
    pub fn determinant(&self) -> Result<f64> {
        self.require_square("determinant")?;
        let n = self.rows;
        let mut a = self.data.clone();
        let mut det = 1.0;

        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
                .unwrap_or(col);
            if a[pivot][col] == 0.0 {
                return Ok(0.0);
            }
            if pivot != col {
                a.swap(pivot, col);
                det = -det;
            }
            det *= a[col][col];
            for r in col + 1..n {
                let factor = a[r][col] / a[col][col];
                for c in col..n {
                    a[r][c] -= factor * a[col][c];
                }
            }
        }

        Ok(det)
    }

    /// Inverse by Gauss-Jordan elimination.
    ///
    /// Fails with `SingularMatrix` when the determinant is exactly zero or a
    /// pivot falls below `SINGULAR_TOLERANCE` relative to the largest entry.
    pub fn inverse(&self) -> Result<Matrix> {
        self.require_square("inverse")?;
        let n = self.rows;
        let max_abs = self.data.iter()
            .flat_map(|r| r.iter())
            .fold(0.0_f64, |m, x| m.max(x.abs()));
        if max_abs == 0.0 {
            return Err(NetError::SingularMatrix);
        }
        let threshold = SINGULAR_TOLERANCE * max_abs * n as f64;

        let mut a = self.data.clone();
        let mut inv = Matrix::identity(n).data;

        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
                .unwrap_or(col);
            if a[pivot][col].abs() <= threshold {
                return Err(NetError::SingularMatrix);
            }
            a.swap(pivot, col);
            inv.swap(pivot, col);

            let p = a[col][col];
            for c in 0..n {
                a[col][c] /= p;
                inv[col][c] /= p;
            }
            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = a[r][col];
                if factor == 0.0 {
                    continue;
                }
                for c in 0..n {
                    a[r][c] -= factor * a[col][c];
                    inv[r][c] -= factor * inv[col][c];
                }
            }
        }

        Ok(Matrix { rows: n, cols: n, data: inv })
    }

    /// True when every entry differs from `rhs` by at most `tol`.
    pub fn approx_eq(&self, rhs: &Matrix, tol: f64) -> bool {
        self.shape() == rhs.shape()
            && self.flatten().iter().zip(rhs.flatten().iter()).all(|(a, b)| (a - b).abs() <= tol)
    }
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(NetError::shape("dot", (1, a.len()), (1, b.len())));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Mul<f64> for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(data: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_data(data).unwrap()
    }

    #[test]
    fn transpose_twice_is_identity() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(a.transpose().shape(), (3, 2));
        assert_eq!(a.transpose().transpose(), a);
    }

    #[test]
    fn multiply_rejects_inner_dimension_mismatch() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let err = a.matmul(&a).unwrap_err();
        assert!(matches!(err, NetError::ShapeMismatch { op: "multiply", left: (2, 3), right: (2, 3) }));
    }

    #[test]
    fn multiply_computes_product() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = m(vec![vec![5.0], vec![6.0]]);
        assert_eq!(a.matmul(&b).unwrap(), m(vec![vec![17.0], vec![39.0]]));
    }

    #[test]
    fn multiply_propagates_non_finite_through_zeros() {
        let a = Matrix::row(vec![0.0, 1.0]);
        let b = m(vec![vec![f64::INFINITY], vec![1.0]]);
        assert!(a.matmul(&b).unwrap().data[0][0].is_nan());

        let b = m(vec![vec![f64::NAN], vec![1.0]]);
        assert!(a.matmul(&b).unwrap().data[0][0].is_nan());
    }

    #[test]
    fn add_and_subtract_require_same_shape() {
        let a = Matrix::zeros(2, 2);
        let b = Matrix::zeros(2, 3);
        assert!(a.add(&b).is_err());
        assert!(a.sub(&b).is_err());
        assert!(a.hadamard(&b).is_err());
        let c = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(c.sub(&c).unwrap(), Matrix::zeros(2, 2));
        assert_eq!(c.add(&c).unwrap(), &c * 2.0);
    }

    #[test]
    fn broadcast_add_requires_single_matching_row() {
        let a = Matrix::zeros(3, 2);
        let bias = Matrix::row(vec![1.0, -1.0]);
        let out = a.add_row_broadcast(&bias).unwrap();
        assert!(out.data.iter().all(|r| r == &vec![1.0, -1.0]));
        assert!(a.add_row_broadcast(&Matrix::row(vec![1.0])).is_err());
    }

    #[test]
    fn column_sum_reduces_batch_dimension() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert_eq!(a.column_sum(), Matrix::row(vec![9.0, 12.0]));
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let a = m(vec![
            vec![4.0, 7.0, 2.0],
            vec![3.0, 6.0, 1.0],
            vec![2.0, 5.0, 3.0],
        ]);
        let inv = a.inverse().unwrap();
        assert!(a.matmul(&inv).unwrap().approx_eq(&Matrix::identity(3), 1e-9));
    }

    #[test]
    fn determinant_matches_cofactor_expansion() {
        let a = m(vec![vec![2.0, 0.0, 1.0], vec![1.0, 3.0, 2.0], vec![1.0, 1.0, 1.0]]);
        // 2(3-2) - 0 + 1(1-3) = 0
        assert!(a.determinant().unwrap().abs() < 1e-12);
        let b = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert!((b.determinant().unwrap() + 2.0).abs() < 1e-12);
    }

    #[test]
    fn singular_and_non_square_inputs_fail() {
        let singular = m(vec![vec![1.0, 2.0], vec![2.0, 4.0]]);
        assert!(matches!(singular.inverse(), Err(NetError::SingularMatrix)));
        assert!(matches!(Matrix::zeros(2, 2).inverse(), Err(NetError::SingularMatrix)));
        let rect = Matrix::zeros(2, 3);
        assert!(matches!(rect.inverse(), Err(NetError::ShapeMismatch { .. })));
        assert!(matches!(rect.determinant(), Err(NetError::ShapeMismatch { .. })));
    }

    #[test]
    fn flatten_and_reshape() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let flat = a.flatten();
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(Matrix::reshape(&flat, 3, 2).unwrap().data[2], vec![5.0, 6.0]);
        assert!(Matrix::reshape(&flat, 4, 2).is_err());
    }

    #[test]
    fn dot_requires_equal_lengths() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(), 32.0);
        assert!(dot(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn from_data_rejects_ragged_and_empty() {
        assert!(Matrix::from_data(vec![]).is_err());
        assert!(Matrix::from_data(vec![vec![]]).is_err());
        assert!(Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn initializers_scale_with_fan_in() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(42);
        let w = Matrix::he(200, 50, &mut rng);
        assert_eq!(w.shape(), (200, 50));
        let var = w.flatten().iter().map(|v| v * v).sum::<f64>() / (200.0 * 50.0);
        assert!((var - 2.0 / 200.0).abs() < 1e-3, "he variance {var}");

        let w = Matrix::xavier(100, 40, &mut rng);
        let var = w.flatten().iter().map(|v| v * v).sum::<f64>() / (100.0 * 40.0);
        assert!((var - 1.0 / 100.0).abs() < 1e-3, "xavier variance {var}");
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        let a = m(vec![vec![0.1, 0.7, 0.2], vec![0.5, 0.5, 0.0]]);
        assert_eq!(a.argmax_rows(), vec![1, 0]);
    }
}
