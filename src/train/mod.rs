pub mod step;
pub mod step_stats;
pub mod train_config;

pub use step::Trainer;
pub use step_stats::StepStats;
pub use train_config::TrainConfig;
