use rand::Rng;

use crate::error::{NetError, Result};
use crate::layers::batch_norm::BatchNorm;
use crate::math::matrix::Matrix;

/// Widths of the four activation slots: input → hidden1 → hidden2 → output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub input: usize,
    pub hidden1: usize,
    pub hidden2: usize,
    pub output: usize,
}

/// Every learnable tensor of the three-layer network.
///
/// `w_l` is `in × out` and `b_l` is `1 × out`; `gamma`/`beta` are
/// `1 × hidden2`. Shapes are fixed at construction. Only the update step
/// writes these, and only through `&mut Params`.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub w1: Matrix,
    pub b1: Matrix,
    pub w2: Matrix,
    pub b2: Matrix,
    pub w3: Matrix,
    pub b3: Matrix,
    pub gamma: Matrix,
    pub beta: Matrix,
}

impl Params {
    /// Wraps caller-provided weights and biases. Batch-norm `gamma` starts
    /// at 1.0 and `beta` at 0.0.
    pub fn new(w1: Matrix, b1: Matrix, w2: Matrix, b2: Matrix, w3: Matrix, b3: Matrix) -> Result<Params> {
        let hidden2 = w2.cols;
        let params = Params {
            w1,
            b1,
            w2,
            b2,
            w3,
            b3,
            gamma: BatchNorm::initial_gamma(hidden2),
            beta: BatchNorm::initial_beta(hidden2),
        };
        params.validate()?;
        Ok(params)
    }

    /// He-initialized weights and zero biases.
    pub fn he<R: Rng + ?Sized>(dims: Dims, rng: &mut R) -> Result<Params> {
        Params::new(
            Matrix::he(dims.input, dims.hidden1, rng),
            Matrix::zeros(1, dims.hidden1),
            Matrix::he(dims.hidden1, dims.hidden2, rng),
            Matrix::zeros(1, dims.hidden2),
            Matrix::he(dims.hidden2, dims.output, rng),
            Matrix::zeros(1, dims.output),
        )
    }

    pub fn dims(&self) -> Dims {
        Dims {
            input: self.w1.rows,
            hidden1: self.w1.cols,
            hidden2: self.w2.cols,
            output: self.w3.cols,
        }
    }

    /// The three weight matrices, for regularization penalties.
    pub fn weights(&self) -> [&Matrix; 3] {
        [&self.w1, &self.w2, &self.w3]
    }

    /// Checks that consecutive layers chain and every bias is a matching row.
    pub fn validate(&self) -> Result<()> {
        let dims = self.dims();
        if dims.input == 0 || dims.hidden1 == 0 || dims.hidden2 == 0 || dims.output == 0 {
            return Err(NetError::InvalidArgument(format!("layer widths must be non-zero, got {dims:?}")));
        }
        if self.w2.rows != self.w1.cols {
            return Err(NetError::shape("layer 2 weights", self.w2.shape(), (self.w1.cols, self.w2.cols)));
        }
        if self.w3.rows != self.w2.cols {
            return Err(NetError::shape("layer 3 weights", self.w3.shape(), (self.w2.cols, self.w3.cols)));
        }
        let rows = [
            ("layer 1 bias", &self.b1, dims.hidden1),
            ("layer 2 bias", &self.b2, dims.hidden2),
            ("layer 3 bias", &self.b3, dims.output),
            ("batch-norm gamma", &self.gamma, dims.hidden2),
            ("batch-norm beta", &self.beta, dims.hidden2),
        ];
        for (op, m, width) in rows {
            if m.shape() != (1, width) {
                return Err(NetError::shape(op, m.shape(), (1, width)));
            }
        }
        Ok(())
    }
}
