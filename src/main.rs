// Demo driver: trains the three-layer classifier on synthetic clusters.
// Usage:
//   cargo run -- [config.json]
// Set RUST_LOG=debug to see per-step losses.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ferrite_mlp3::{Dims, Matrix, Params, Result, TrainConfig, Trainer};

const INPUT_SIZE: usize = 4;
const HIDDEN1_SIZE: usize = 16;
const HIDDEN2_SIZE: usize = 8;
const CLASSES: usize = 3;

/// Noisy points around one centre per class, with one-hot labels.
fn make_clusters(per_class: usize, rng: &mut StdRng) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let centres = [
        [0.8, 0.2, 0.2, 0.5],
        [0.2, 0.8, 0.3, 0.4],
        [0.3, 0.3, 0.8, 0.6],
    ];
    let mut xs = Vec::with_capacity(per_class * CLASSES);
    let mut ys = Vec::with_capacity(per_class * CLASSES);
    for (class, centre) in centres.iter().enumerate() {
        for _ in 0..per_class {
            xs.push(centre.iter().map(|c| (c + rng.gen_range(-0.25..0.25_f64)).clamp(0.0, 1.0)).collect());
            let mut label = vec![0.0; CLASSES];
            label[class] = 1.0;
            ys.push(label);
        }
    }
    (xs, ys)
}

fn batch(rows: &[Vec<f64>], idx: &[usize]) -> Result<Matrix> {
    Matrix::from_data(idx.iter().map(|&i| rows[i].clone()).collect())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading config");
            TrainConfig::load_json(&path)?
        }
        None => TrainConfig { learning_rate: 0.05, epochs: 20, seed: Some(42), ..TrainConfig::default() },
    };

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let (train_x, train_y) = make_clusters(200, &mut rng);
    let (test_x, test_y) = make_clusters(50, &mut rng);

    let dims = Dims { input: INPUT_SIZE, hidden1: HIDDEN1_SIZE, hidden2: HIDDEN2_SIZE, output: CLASSES };
    let mut trainer = Trainer::new(Params::he(dims, &mut rng)?, &config)?;
    info!(?dims, train = train_x.len(), test = test_x.len(), "starting training");

    let test_all: Vec<usize> = (0..test_x.len()).collect();
    let test_batch = (batch(&test_x, &test_all)?, batch(&test_y, &test_all)?);

    let mut indices: Vec<usize> = (0..train_x.len()).collect();
    for epoch in 1..=config.epochs {
        indices.shuffle(&mut rng);
        let mut loss_sum = 0.0;
        let mut correct = 0;
        let mut batches = 0;

        for chunk in indices.chunks(config.batch_size) {
            let stats = trainer.train_step(&batch(&train_x, chunk)?, &batch(&train_y, chunk)?)?;
            loss_sum += stats.loss();
            correct += stats.correct;
            batches += 1;
        }

        let test = trainer.evaluate(&test_batch.0, &test_batch.1)?;
        info!(
            epoch,
            loss = loss_sum / batches as f64,
            train_accuracy = correct as f64 / train_x.len() as f64,
            test_accuracy = test.accuracy(),
            "epoch done"
        );
    }

    Ok(())
}
