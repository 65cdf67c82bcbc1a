use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;
use crate::network::backward::Gradients;
use crate::network::params::Params;

/// Plain gradient descent: `P ← P − lr·dP` for every learnable tensor.
///
/// Batch-norm `gamma`/`beta` move at `learning_rate * norm_lr_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
    pub norm_lr_scale: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, norm_lr_scale: 1.0 }
    }

    pub fn with_norm_lr_scale(mut self, scale: f64) -> Sgd {
        self.norm_lr_scale = scale;
        self
    }

    /// Applies one update to `params` in place.
    ///
    /// Overwriting the contents of `params` is the only effect. Every shape
    /// is checked before the first write, so on error nothing has changed.
    pub fn step(&self, params: &mut Params, grads: &Gradients) -> Result<()> {
        let pairs = [
            ("update w1", &params.w1, &grads.dw1),
            ("update b1", &params.b1, &grads.db1),
            ("update w2", &params.w2, &grads.dw2),
            ("update b2", &params.b2, &grads.db2),
            ("update w3", &params.w3, &grads.dw3),
            ("update b3", &params.b3, &grads.db3),
        ];
        for (op, p, g) in pairs {
            check(op, p, g)?;
        }
        let norm = match (&grads.d_gamma, &grads.d_beta) {
            (Some(dg), Some(db)) => {
                check("update gamma", &params.gamma, dg)?;
                check("update beta", &params.beta, db)?;
                Some((dg, db))
            }
            (None, None) => None,
            _ => {
                return Err(NetError::InvalidArgument(
                    "gamma and beta gradients must be provided together".into(),
                ))
            }
        };

        let lr = self.learning_rate;
        descend(&mut params.w1, &grads.dw1, lr);
        descend(&mut params.b1, &grads.db1, lr);
        descend(&mut params.w2, &grads.dw2, lr);
        descend(&mut params.b2, &grads.db2, lr);
        descend(&mut params.w3, &grads.dw3, lr);
        descend(&mut params.b3, &grads.db3, lr);
        if let Some((dg, db)) = norm {
            let norm_lr = lr * self.norm_lr_scale;
            descend(&mut params.gamma, dg, norm_lr);
            descend(&mut params.beta, db, norm_lr);
        }
        Ok(())
    }
}

fn check(op: &'static str, param: &Matrix, grad: &Matrix) -> Result<()> {
    if param.shape() != grad.shape() {
        return Err(NetError::shape(op, param.shape(), grad.shape()));
    }
    Ok(())
}

fn descend(param: &mut Matrix, grad: &Matrix, lr: f64) {
    for (p_row, g_row) in param.data.iter_mut().zip(grad.data.iter()) {
        for (p, g) in p_row.iter_mut().zip(g_row.iter()) {
            *p -= lr * g;
        }
    }
}
