use rand::Rng;
use tracing::trace;

use crate::activation::activation::softmax_rows;
use crate::error::{NetError, Result};
use crate::layers::batch_norm::BatchNormCache;
use crate::layers::dropout::DropoutCache;
use crate::layers::Mode;
use crate::math::matrix::Matrix;
use crate::network::config::Architecture;
use crate::network::params::Params;

/// Everything one forward call produced that its backward call needs.
///
/// This is a plain value: a later forward call returns a new cache and
/// cannot disturb one already handed out.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardCache {
    pub mode: Mode,
    pub net1: Matrix,
    pub out1: Matrix,
    /// Input to layer 2 (`out1` after dropout).
    pub a1: Matrix,
    pub net2: Matrix,
    pub out2: Matrix,
    /// Input to layer 3 (`out2` after batch norm and dropout).
    pub a2: Matrix,
    pub net3: Matrix,
    /// Softmax probabilities.
    pub out3: Matrix,
    pub dropout1: Option<DropoutCache>,
    pub dropout2: Option<DropoutCache>,
    pub batch_norm: Option<BatchNormCache>,
}

impl ForwardCache {
    pub fn predictions(&self) -> &Matrix {
        &self.out3
    }

    pub fn batch_size(&self) -> usize {
        self.out3.rows
    }
}

/// Runs the three layers:
///
/// ```text
/// net1 = X·W1 + b1 ; out1 = act1(net1) ; a1 = dropout1(out1)
/// net2 = a1·W2 + b2 ; out2 = act2(net2) ; a2 = dropout2(batchnorm(out2))
/// net3 = a2·W3 + b3 ; predictions = softmax(net3)
/// ```
///
/// `rng` supplies the dropout draws and is only consumed in training mode.
pub fn forward<R: Rng + ?Sized>(
    x: &Matrix,
    params: &Params,
    arch: &Architecture,
    mode: Mode,
    rng: &mut R,
) -> Result<(Matrix, ForwardCache)> {
    if x.rows == 0 {
        return Err(NetError::InvalidArgument("forward called with an empty batch".into()));
    }

    let net1 = x.matmul(&params.w1)?.add_row_broadcast(&params.b1)?;
    let out1 = arch.activations[0].apply(&net1);
    let (a1, dropout1) = arch.dropout[0].forward(&out1, mode, rng);
    trace!(rows = a1.rows, cols = a1.cols, "layer 1");

    let net2 = a1.matmul(&params.w2)?.add_row_broadcast(&params.b2)?;
    let out2 = arch.activations[1].apply(&net2);
    let (normed, batch_norm) = match &arch.batch_norm {
        Some(bn) => {
            let (y, cache) = bn.forward(&out2, &params.gamma, &params.beta)?;
            (y, Some(cache))
        }
        None => (out2.clone(), None),
    };
    let (a2, dropout2) = arch.dropout[1].forward(&normed, mode, rng);
    trace!(rows = a2.rows, cols = a2.cols, "layer 2");

    let net3 = a2.matmul(&params.w3)?.add_row_broadcast(&params.b3)?;
    let out3 = softmax_rows(&net3);

    let cache = ForwardCache {
        mode,
        net1,
        out1,
        a1,
        net2,
        out2,
        a2,
        net3,
        out3: out3.clone(),
        dropout1,
        dropout2,
        batch_norm,
    };
    Ok((out3, cache))
}

/// Inference-mode forward that keeps only the predictions.
///
/// Use this for evaluation so no cache exists that a later backward could
/// mistake for the training step's.
pub fn predict(x: &Matrix, params: &Params, arch: &Architecture) -> Result<Matrix> {
    // Inference never draws from the RNG.
    let mut rng = rand::rngs::mock::StepRng::new(0, 0);
    forward(x, params, arch, Mode::Inference, &mut rng).map(|(p, _)| p)
}
