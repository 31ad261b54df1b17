use crate::config::{ConfigError, parse_from_env};

/// Default learning rate for AdamW.
pub const DEFAULT_LEARNING_RATE: f64 = 2e-4;

pub const DEFAULT_WEIGHT_DECAY: f64 = 1e-5;

/// Random candidates scored per positive when mining hard negatives.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Highest-scoring pool members eligible as the step's negative.
pub const DEFAULT_HARD_TOP_K: usize = 5;

/// Guards `log(0)` in the pairwise loss.
pub const DEFAULT_LOSS_EPSILON: f64 = 1e-10;

pub const DEFAULT_SEED: u64 = 123;

/// Pairwise-ranking trainer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Upper bound on epochs. Default: `200`.
    pub epochs: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    /// Triplets per optimizer step. Default: `64`.
    pub batch_size: usize,
    pub pool_size: usize,
    pub hard_top_k: usize,
    /// Epochs without sufficient improvement before stopping. Default: `10`.
    pub patience: usize,
    /// Improvement a validation loss must exceed to reset patience. Default: `0.001`.
    pub min_delta: f32,
    pub loss_epsilon: f64,
    pub seed: u64,
    /// Random negatives drawn per positive pair when building triplets. Default: `1`.
    pub negative_ratio: usize,
    /// Fraction of positives held out for testing. Default: `0.2`.
    pub test_fraction: f64,
    /// Fraction of the remaining positives held out for validation. Default: `0.2`.
    pub val_fraction: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: DEFAULT_LEARNING_RATE,
            weight_decay: DEFAULT_WEIGHT_DECAY,
            batch_size: 64,
            pool_size: DEFAULT_POOL_SIZE,
            hard_top_k: DEFAULT_HARD_TOP_K,
            patience: 10,
            min_delta: 0.001,
            loss_epsilon: DEFAULT_LOSS_EPSILON,
            seed: DEFAULT_SEED,
            negative_ratio: 1,
            test_fraction: 0.2,
            val_fraction: 0.2,
        }
    }
}

impl TrainerConfig {
    const ENV_EPOCHS: &'static str = "PAIRING_EPOCHS";
    const ENV_LEARNING_RATE: &'static str = "PAIRING_LEARNING_RATE";
    const ENV_WEIGHT_DECAY: &'static str = "PAIRING_WEIGHT_DECAY";
    const ENV_BATCH_SIZE: &'static str = "PAIRING_BATCH_SIZE";
    const ENV_POOL_SIZE: &'static str = "PAIRING_POOL_SIZE";
    const ENV_HARD_TOP_K: &'static str = "PAIRING_HARD_TOP_K";
    const ENV_PATIENCE: &'static str = "PAIRING_PATIENCE";
    const ENV_MIN_DELTA: &'static str = "PAIRING_MIN_DELTA";
    const ENV_SEED: &'static str = "PAIRING_SEED";
    const ENV_NEGATIVE_RATIO: &'static str = "PAIRING_NEGATIVE_RATIO";
    const ENV_TEST_FRACTION: &'static str = "PAIRING_TEST_FRACTION";
    const ENV_VAL_FRACTION: &'static str = "PAIRING_VAL_FRACTION";

    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let config = Self {
            epochs: parse_from_env(Self::ENV_EPOCHS, d.epochs)?,
            learning_rate: parse_from_env(Self::ENV_LEARNING_RATE, d.learning_rate)?,
            weight_decay: parse_from_env(Self::ENV_WEIGHT_DECAY, d.weight_decay)?,
            batch_size: parse_from_env(Self::ENV_BATCH_SIZE, d.batch_size)?,
            pool_size: parse_from_env(Self::ENV_POOL_SIZE, d.pool_size)?,
            hard_top_k: parse_from_env(Self::ENV_HARD_TOP_K, d.hard_top_k)?,
            patience: parse_from_env(Self::ENV_PATIENCE, d.patience)?,
            min_delta: parse_from_env(Self::ENV_MIN_DELTA, d.min_delta)?,
            loss_epsilon: d.loss_epsilon,
            seed: parse_from_env(Self::ENV_SEED, d.seed)?,
            negative_ratio: parse_from_env(Self::ENV_NEGATIVE_RATIO, d.negative_ratio)?,
            test_fraction: parse_from_env(Self::ENV_TEST_FRACTION, d.test_fraction)?,
            val_fraction: parse_from_env(Self::ENV_VAL_FRACTION, d.val_fraction)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let out_of_range = |name: &'static str, reason: &str| {
            Err(ConfigError::OutOfRange {
                name,
                reason: reason.to_string(),
            })
        };

        if self.epochs == 0 {
            return out_of_range(Self::ENV_EPOCHS, "must be at least 1");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return out_of_range(Self::ENV_LEARNING_RATE, "must be positive and finite");
        }
        if self.weight_decay < 0.0 {
            return out_of_range(Self::ENV_WEIGHT_DECAY, "must not be negative");
        }
        if self.batch_size == 0 {
            return out_of_range(Self::ENV_BATCH_SIZE, "must be at least 1");
        }
        if self.pool_size == 0 {
            return out_of_range(Self::ENV_POOL_SIZE, "must be at least 1");
        }
        if self.hard_top_k == 0 || self.hard_top_k > self.pool_size {
            return out_of_range(Self::ENV_HARD_TOP_K, "must be in 1..=pool_size");
        }
        if self.patience == 0 {
            return out_of_range(Self::ENV_PATIENCE, "must be at least 1");
        }
        if self.min_delta < 0.0 {
            return out_of_range(Self::ENV_MIN_DELTA, "must not be negative");
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return out_of_range(Self::ENV_TEST_FRACTION, "must be in [0, 1)");
        }
        if !(0.0..1.0).contains(&self.val_fraction) {
            return out_of_range(Self::ENV_VAL_FRACTION, "must be in [0, 1)");
        }
        Ok(())
    }
}
