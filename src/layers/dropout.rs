//! Inverted dropout.
//!
//! During training each activation is kept with probability `1 - rate` and
//! survivors are scaled by `1 / (1 - rate)`, so the expected activation is
//! unchanged and inference needs no rescaling. The keep-mask is returned in a
//! [`DropoutCache`] and replayed verbatim by [`Dropout::backward`].

use rand::Rng;

use crate::error::{NetError, Result};
use crate::layers::Mode;
use crate::math::matrix::Matrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    pub rate: f64,
}

/// Keep-mask from one training-mode forward call.
#[derive(Debug, Clone, PartialEq)]
pub struct DropoutCache {
    /// `true` where the element was kept.
    pub mask: Vec<Vec<bool>>,
    /// Factor applied to kept elements.
    pub scale: f64,
}

impl Dropout {
    /// `rate` is the probability of dropping an element, in `[0, 1]`.
    ///
    /// A negative rate is rejected with `InvalidArgument` rather than being
    /// treated as "no dropout"; use `0.0` to disable the layer.
    pub fn new(rate: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(NetError::InvalidArgument(format!(
                "dropout rate must be within [0, 1], got {rate}"
            )));
        }
        Ok(Dropout { rate })
    }

    /// True when `forward` in `mode` would change its input.
    pub fn is_active(&self, mode: Mode) -> bool {
        mode == Mode::Training && self.rate > 0.0
    }

    /// Applies dropout. Returns no cache when the layer is inactive, in which
    /// case the output is the input unchanged.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        input: &Matrix,
        mode: Mode,
        rng: &mut R,
    ) -> (Matrix, Option<DropoutCache>) {
        if !self.is_active(mode) {
            return (input.clone(), None);
        }

        if self.rate >= 1.0 {
            let cache = DropoutCache {
                mask: vec![vec![false; input.cols]; input.rows],
                scale: 0.0,
            };
            return (Matrix::zeros(input.rows, input.cols), Some(cache));
        }

        let scale = 1.0 / (1.0 - self.rate);
        let mut output = Matrix::zeros(input.rows, input.cols);
        let mut mask = Vec::with_capacity(input.rows);

        for (i, row) in input.data.iter().enumerate() {
            let mut mask_row = Vec::with_capacity(input.cols);
            for (j, &x) in row.iter().enumerate() {
                let keep = rng.gen::<f64>() > self.rate;
                if keep {
                    output.data[i][j] = x * scale;
                }
                mask_row.push(keep);
            }
            mask.push(mask_row);
        }

        (output, Some(DropoutCache { mask, scale }))
    }

    /// Routes `d_out` through the mask recorded by the matching forward call:
    /// kept positions are rescaled, dropped ones get zero gradient.
    pub fn backward(&self, d_out: &Matrix, cache: &DropoutCache) -> Result<Matrix> {
        let mask_shape = (cache.mask.len(), cache.mask.first().map_or(0, Vec::len));
        if d_out.shape() != mask_shape {
            return Err(NetError::shape("dropout backward", d_out.shape(), mask_shape));
        }

        let data = d_out.data.iter().zip(cache.mask.iter())
            .map(|(row, keep_row)| {
                row.iter().zip(keep_row.iter())
                    .map(|(&g, &keep)| if keep { g * cache.scale } else { 0.0 })
                    .collect()
            })
            .collect();
        Ok(Matrix { rows: d_out.rows, cols: d_out.cols, data })
    }
}
