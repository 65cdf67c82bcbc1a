use crate::activation::activation::ActivationInput;
use crate::error::{NetError, Result};
use crate::layers::Mode;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::network::config::Architecture;
use crate::network::forward::ForwardCache;
use crate::network::params::Params;
use crate::regularization::penalty::Regularization;

/// Gradients for every learnable tensor, produced fresh by each backward call.
///
/// `d_gamma`/`d_beta` are present only when batch norm ran in the forward
/// call.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub dw1: Matrix,
    pub db1: Matrix,
    pub dw2: Matrix,
    pub db2: Matrix,
    pub dw3: Matrix,
    pub db3: Matrix,
    pub d_gamma: Option<Matrix>,
    pub d_beta: Option<Matrix>,
}

/// Checks that `cache` is a training-mode cache produced by `arch` for
/// this batch.
fn check_forward_state(x: &Matrix, y: &Matrix, arch: &Architecture, cache: &ForwardCache) -> Result<()> {
    if cache.mode != Mode::Training {
        return Err(NetError::MissingForwardState(
            "cache was produced by an inference-mode forward".into(),
        ));
    }
    if x.rows != cache.batch_size() {
        return Err(NetError::shape("backward input", x.shape(), cache.net1.shape()));
    }
    if y.shape() != cache.out3.shape() {
        return Err(NetError::shape("backward labels", y.shape(), cache.out3.shape()));
    }
    if arch.batch_norm.is_some() != cache.batch_norm.is_some() {
        return Err(NetError::MissingForwardState(
            "batch-norm statistics do not match the configured architecture".into(),
        ));
    }
    let masks = [&cache.dropout1, &cache.dropout2];
    for (i, (layer, mask)) in arch.dropout.iter().zip(masks).enumerate() {
        if layer.is_active(Mode::Training) != mask.is_some() {
            return Err(NetError::MissingForwardState(format!(
                "dropout mask for layer {} does not match the configured rate",
                i + 1
            )));
        }
    }
    Ok(())
}

/// Reverse-mode pass over the three layers.
///
/// `cache` must come from the training-mode [`forward`](super::forward::forward)
/// call on `x` with these `params` and `arch`; anything else is reported as
/// `MissingForwardState` or `ShapeMismatch` rather than silently producing
/// wrong gradients.
pub fn compute_gradients(
    x: &Matrix,
    y: &Matrix,
    params: &Params,
    arch: &Architecture,
    cache: &ForwardCache,
    reg: &Regularization,
) -> Result<Gradients> {
    check_forward_state(x, y, arch, cache)?;

    // Layer 3: combined softmax + cross-entropy.
    let d_out3 = CrossEntropyLoss::gradient(&cache.out3, y)?;
    let dw3 = reg.add_gradient(cache.a2.transpose().matmul(&d_out3)?, &params.w3)?;
    let db3 = d_out3.column_sum();

    // Layer 2: dropout → batch norm → activation.
    let mut d_a2 = d_out3.matmul(&params.w3.transpose())?;
    if let Some(mask) = &cache.dropout2 {
        d_a2 = arch.dropout[1].backward(&d_a2, mask)?;
    }
    let (d_out2, d_gamma, d_beta) = match (&arch.batch_norm, &cache.batch_norm) {
        (Some(bn), Some(stats)) => {
            let g = bn.backward(&d_a2, stats, &params.gamma)?;
            (g.input, Some(g.gamma), Some(g.beta))
        }
        _ => (d_a2, None, None),
    };
    let act2 = arch.activations[1].derivative(ActivationInput::select(
        arch.derivative_source,
        &cache.net2,
        &cache.out2,
    ));
    let d_net2 = d_out2.hadamard(&act2)?;
    let dw2 = reg.add_gradient(cache.a1.transpose().matmul(&d_net2)?, &params.w2)?;
    let db2 = d_net2.column_sum();

    // Layer 1: dropout → activation.
    let mut d_out1 = d_net2.matmul(&params.w2.transpose())?;
    if let Some(mask) = &cache.dropout1 {
        d_out1 = arch.dropout[0].backward(&d_out1, mask)?;
    }
    let act1 = arch.activations[0].derivative(ActivationInput::select(
        arch.derivative_source,
        &cache.net1,
        &cache.out1,
    ));
    let d_net1 = d_out1.hadamard(&act1)?;
    let dw1 = reg.add_gradient(x.transpose().matmul(&d_net1)?, &params.w1)?;
    let db1 = d_net1.column_sum();

    Ok(Gradients { dw1, db1, dw2, db2, dw3, db3, d_gamma, d_beta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::{ActivationFunction, DerivativeSource};
    use crate::network::config::NetworkConfig;
    use crate::network::forward::forward;
    use crate::network::params::Dims;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn batch() -> (Matrix, Matrix) {
        let x = Matrix::from_data(vec![
            vec![0.2, -0.4, 0.9],
            vec![0.7, 0.1, -0.3],
            vec![-0.5, 0.6, 0.4],
            vec![0.05, 0.8, -0.9],
        ]).unwrap();
        let y = Matrix::from_data(vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
        ]).unwrap();
        (x, y)
    }

    fn params() -> Params {
        let mut rng = StdRng::seed_from_u64(21);
        let mut p = Params::he(Dims { input: 3, hidden1: 5, hidden2: 4, output: 2 }, &mut rng).unwrap();
        // Non-trivial affine and bias values exercise every term.
        p.gamma = Matrix::row(vec![1.2, 0.8, 1.0, 0.6]);
        p.beta = Matrix::row(vec![0.1, -0.1, 0.05, 0.0]);
        p.b1 = Matrix::row(vec![0.1, -0.2, 0.05, 0.0, 0.3]);
        p
    }

    const SEED: u64 = 17;

    /// Training-mode loss with a freshly seeded RNG, so every evaluation
    /// draws the same dropout masks as the analytic pass.
    fn objective(p: &Params, arch: &Architecture, x: &Matrix, y: &Matrix, reg: &Regularization) -> f64 {
        let mut rng = StdRng::seed_from_u64(SEED);
        let (pred, _) = forward(x, p, arch, Mode::Training, &mut rng).unwrap();
        CrossEntropyLoss::batch_loss(&pred, y).unwrap() + reg.penalty(&p.weights())
    }

    fn slot<'a>(p: &'a mut Params, name: &str) -> &'a mut Matrix {
        match name {
            "w1" => &mut p.w1,
            "b1" => &mut p.b1,
            "w2" => &mut p.w2,
            "b2" => &mut p.b2,
            "w3" => &mut p.w3,
            "b3" => &mut p.b3,
            "gamma" => &mut p.gamma,
            _ => &mut p.beta,
        }
    }

    fn check_against_finite_differences(config: NetworkConfig, reg: Regularization) {
        check_params_against_finite_differences(params(), config, reg);
    }

    fn check_params_against_finite_differences(p: Params, config: NetworkConfig, reg: Regularization) {
        let (x, y) = batch();
        let arch = config.build().unwrap();
        let mut rng = StdRng::seed_from_u64(SEED);
        let (_, cache) = forward(&x, &p, &arch, Mode::Training, &mut rng).unwrap();
        let grads = compute_gradients(&x, &y, &p, &arch, &cache, &reg).unwrap();

        let mut checks = vec![
            ("w1", &grads.dw1),
            ("b1", &grads.db1),
            ("w2", &grads.dw2),
            ("b2", &grads.db2),
            ("w3", &grads.dw3),
            ("b3", &grads.db3),
        ];
        if let (Some(dg), Some(db)) = (&grads.d_gamma, &grads.d_beta) {
            checks.push(("gamma", dg));
            checks.push(("beta", db));
        }

        let h = 1e-6;
        for (name, analytic) in checks {
            for i in 0..analytic.rows {
                for j in 0..analytic.cols {
                    let mut plus = p.clone();
                    slot(&mut plus, name).data[i][j] += h;
                    let mut minus = p.clone();
                    slot(&mut minus, name).data[i][j] -= h;
                    let numeric = (objective(&plus, &arch, &x, &y, &reg)
                        - objective(&minus, &arch, &x, &y, &reg)) / (2.0 * h);
                    let a = analytic.data[i][j];
                    assert!((numeric - a).abs() < 1e-5, "{name}[{i}][{j}]: numeric {numeric} vs analytic {a}");
                }
            }
        }
    }

    #[test]
    fn gradients_match_finite_differences_without_batch_norm() {
        check_against_finite_differences(NetworkConfig::plain(ActivationFunction::Tanh), Regularization::default());
    }

    #[test]
    fn gradients_match_finite_differences_with_batch_norm() {
        let config = NetworkConfig {
            hidden_activation: [ActivationFunction::Sigmoid; 2],
            dropout_rates: [0.0, 0.0],
            batch_norm: true,
            bn_epsilon: 1e-5,
            ..NetworkConfig::default()
        };
        check_against_finite_differences(config, Regularization::default());
    }

    #[test]
    fn gradients_include_weight_decay() {
        let config = NetworkConfig {
            derivative_source: DerivativeSource::Output,
            ..NetworkConfig::plain(ActivationFunction::Sigmoid)
        };
        check_against_finite_differences(config, Regularization { l1_lambda: 0.0, l2_lambda: 0.05 });
    }

    #[test]
    fn gradients_include_l1_subgradient() {
        // |w| >= 0.05 keeps every weight on one side of the |w| kink.
        let away_from_zero = |w: &Matrix| w.map(|v| if v.abs() < 0.05 { 0.05_f64.copysign(v) } else { v });
        let mut p = params();
        p.w1 = away_from_zero(&p.w1);
        p.w2 = away_from_zero(&p.w2);
        p.w3 = away_from_zero(&p.w3);
        let config = NetworkConfig::plain(ActivationFunction::Tanh);
        check_params_against_finite_differences(p, config, Regularization { l1_lambda: 0.03, l2_lambda: 0.01 });
    }

    #[test]
    fn inference_cache_is_rejected() {
        let (x, y) = batch();
        let p = params();
        let arch = NetworkConfig::default().build().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let (_, cache) = forward(&x, &p, &arch, Mode::Inference, &mut rng).unwrap();
        let err = compute_gradients(&x, &y, &p, &arch, &cache, &Regularization::default()).unwrap_err();
        assert!(matches!(err, NetError::MissingForwardState(_)));
    }

    #[test]
    fn cache_from_other_architecture_is_rejected() {
        let (x, y) = batch();
        let p = params();
        let plain = NetworkConfig::plain(ActivationFunction::ReLU).build().unwrap();
        let full = NetworkConfig::default().build().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let (_, cache) = forward(&x, &p, &plain, Mode::Training, &mut rng).unwrap();
        let err = compute_gradients(&x, &y, &p, &full, &cache, &Regularization::default()).unwrap_err();
        assert!(matches!(err, NetError::MissingForwardState(_)));
    }

    #[test]
    fn batch_size_mismatch_is_rejected() {
        let (x, y) = batch();
        let p = params();
        let arch = NetworkConfig::default().build().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let (_, cache) = forward(&x, &p, &arch, Mode::Training, &mut rng).unwrap();
        let short = Matrix::from_data(y.data[..2].to_vec()).unwrap();
        let err = compute_gradients(&x, &short, &p, &arch, &cache, &Regularization::default()).unwrap_err();
        assert!(matches!(err, NetError::ShapeMismatch { .. }));
    }

    #[test]
    fn gradients_match_finite_differences_through_dropout_masks() {
        let config = NetworkConfig {
            hidden_activation: [ActivationFunction::Tanh; 2],
            dropout_rates: [0.3, 0.4],
            batch_norm: true,
            bn_epsilon: 1e-5,
            ..NetworkConfig::default()
        };
        check_against_finite_differences(config, Regularization { l1_lambda: 0.0, l2_lambda: 0.01 });
    }
}
