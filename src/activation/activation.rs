use serde::{Serialize, Deserialize};
use std::f64::consts::E;

use crate::math::matrix::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Tanh,
    LeakyReLU { alpha: f64 },
}

/// Which cached forward tensor a backward step evaluates the derivative at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeSource {
    /// The post-activation output `out = f(net)`.
    Output,
    /// The pre-activation `net = x·W + b`.
    #[default]
    PreActivation,
}

/// A cached tensor tagged with what it holds, so the derivative formula
/// can never be applied to the wrong one.
#[derive(Debug, Clone, Copy)]
pub enum ActivationInput<'a> {
    Output(&'a Matrix),
    PreActivation(&'a Matrix),
}

impl<'a> ActivationInput<'a> {
    /// Picks `out` or `net` according to `source`.
    pub fn select(source: DerivativeSource, net: &'a Matrix, out: &'a Matrix) -> Self {
        match source {
            DerivativeSource::Output => ActivationInput::Output(out),
            DerivativeSource::PreActivation => ActivationInput::PreActivation(net),
        }
    }
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    pub fn apply(&self, net: &Matrix) -> Matrix {
        net.map(|x| self.function(x))
    }

    /// Derivative expressed from the forward output `y = f(x)`.
    ///
    /// For ReLU this is `y > 0`, which agrees with the pre-activation form
    /// because ReLU outputs 0 exactly where its input is ≤ 0. LeakyReLU
    /// relies on `alpha > 0` for the same reason.
    pub fn derivative_from_output(&self, y: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => y * (1.0 - y),
            ActivationFunction::ReLU => if y > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Tanh => 1.0 - y * y,
            ActivationFunction::LeakyReLU { alpha } => if y > 0.0 { 1.0 } else { *alpha },
        }
    }

    /// Derivative expressed from the pre-activation `x`.
    pub fn derivative_from_pre_activation(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            },
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
        }
    }

    /// Element-wise derivative matrix, using the formula that matches the
    /// tensor `input` is tagged with.
    pub fn derivative(&self, input: ActivationInput<'_>) -> Matrix {
        match input {
            ActivationInput::Output(out) => out.map(|y| self.derivative_from_output(y)),
            ActivationInput::PreActivation(net) => net.map(|x| self.derivative_from_pre_activation(x)),
        }
    }
}

/// Row-wise softmax.
///
/// Each row has its maximum subtracted before exponentiating, so large
/// logits never overflow and adding a constant to a row leaves it unchanged.
pub fn softmax_rows(logits: &Matrix) -> Matrix {
    let data = logits.data.iter()
        .map(|row| {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exps: Vec<f64> = row.iter().map(|&z| (z - max).exp()).collect();
            let sum: f64 = exps.iter().sum();
            exps.into_iter().map(|e| e / sum).collect()
        })
        .collect();
    Matrix { rows: logits.rows, cols: logits.cols, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logits() -> Matrix {
        Matrix::from_data(vec![
            vec![1.0, 2.0, 3.0],
            vec![-1000.0, 0.0, 1000.0],
            vec![0.5, 0.5, 0.5],
        ]).unwrap()
    }

    #[test]
    fn softmax_rows_are_distributions() {
        let p = softmax_rows(&logits());
        for row in &p.data {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&v| v >= 0.0 && v.is_finite()));
        }
        assert!((p.data[2][0] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let z = logits();
        let shifted = z.map(|v| v + 250.0);
        assert!(softmax_rows(&z).approx_eq(&softmax_rows(&shifted), 1e-12));
    }

    #[test]
    fn relu_output_derivative_marks_positive_inputs() {
        let net = Matrix::from_data(vec![vec![-2.0, 0.0, 0.5, 3.0]]).unwrap();
        let relu = ActivationFunction::ReLU;
        let out = relu.apply(&net);
        let from_out = relu.derivative(ActivationInput::Output(&out));
        let from_net = relu.derivative(ActivationInput::PreActivation(&net));
        assert_eq!(from_out.data[0], vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(from_out, from_net);
    }

    #[test]
    fn both_derivative_forms_agree_for_smooth_activations() {
        let net = Matrix::from_data(vec![vec![-1.5, -0.2, 0.0, 0.7, 2.0]]).unwrap();
        for act in [
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
            ActivationFunction::LeakyReLU { alpha: 0.01 },
        ] {
            let out = act.apply(&net);
            let a = act.derivative(ActivationInput::select(DerivativeSource::Output, &net, &out));
            let b = act.derivative(ActivationInput::select(DerivativeSource::PreActivation, &net, &out));
            assert!(a.approx_eq(&b, 1e-12), "{act:?}");
        }
    }

    #[test]
    fn leaky_relu_keeps_small_negative_slope() {
        let act = ActivationFunction::LeakyReLU { alpha: 0.1 };
        assert_eq!(act.function(-2.0), -0.2);
        assert_eq!(act.derivative_from_pre_activation(-2.0), 0.1);
        assert_eq!(act.derivative_from_output(-0.2), 0.1);
    }
}
