use std::collections::{HashMap, HashSet};

use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::graph::{Graph, NodeType};
use crate::model::{PairingModel, RelationalEdges};
use crate::service::SnapshotHandle;

use super::config::TrainerConfig;
use super::dataset::{InteractionSet, Triplet};
use super::early_stopping::EarlyStopping;
use super::error::TrainingError;
use super::sampler::{sample_pool, select_hard_negative};

/// `-mean(log(sigmoid(pos - neg) + eps))` over a batch of logits.
pub fn bpr_loss(pos: &Tensor, neg: &Tensor, eps: f64) -> candle_core::Result<Tensor> {
    let prob = candle_nn::ops::sigmoid(&(pos - neg)?)?;
    prob.affine(1.0, eps)?.log()?.mean_all()?.neg()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Patience ran out.
    EarlyStopped,
    /// The configured epoch budget was used up.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Init,
    Running { epoch: usize },
    Stopped(StopReason),
}

/// Loss and ranking accuracy (`pos > neg`) over a set of triplets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalMetrics {
    pub loss: f32,
    pub accuracy: f32,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
    /// Validation loss was the lowest seen so far.
    pub improved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochMetrics>,
    pub best_epoch: usize,
    pub best_val_loss: f32,
    pub stop_reason: StopReason,
}

struct StepOutcome {
    loss: f32,
    correct: usize,
}

struct BestSnapshot {
    epoch: usize,
    val_loss: f32,
    tensors: HashMap<String, Tensor>,
}

/// Pairwise-ranking trainer with hard-negative mining.
///
/// Owns the model while training. Each step runs the encoder once in training
/// mode and reuses its output for the positive pair, the negative pool and the
/// chosen hard negative. Pool scores are computed on detached embeddings, so
/// mining never contributes gradients.
pub struct Trainer {
    model: PairingModel,
    edges: RelationalEdges,
    optimizer: AdamW,
    config: TrainerConfig,
    rng: StdRng,
    candidates: Vec<usize>,
    known_positives: HashMap<usize, HashSet<usize>>,
    store: Option<CheckpointStore>,
    state: TrainerState,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("model", &self.model)
            .field("config", &self.config)
            .field("candidates", &self.candidates.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Trainer {
    pub fn new(
        model: PairingModel,
        graph: &Graph,
        edges: RelationalEdges,
        interactions: &InteractionSet,
        config: TrainerConfig,
    ) -> Result<Self, TrainingError> {
        config
            .validate()
            .map_err(|e| TrainingError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let candidates = graph.indices_of(NodeType::Ingredient).to_vec();
        if candidates.is_empty() {
            return Err(TrainingError::Empty {
                what: "ingredient candidate set",
            });
        }

        let optimizer = AdamW::new(
            model.varmap().all_vars(),
            ParamsAdamW {
                lr: config.learning_rate,
                weight_decay: config.weight_decay,
                ..Default::default()
            },
        )?;

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            model,
            edges,
            optimizer,
            config,
            candidates,
            known_positives: interactions.positive_map().clone(),
            store: None,
            state: TrainerState::Init,
        })
    }

    /// Writes per-epoch and canonical checkpoints into `store`.
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn model(&self) -> &PairingModel {
        &self.model
    }

    pub fn into_model(self) -> PairingModel {
        self.model
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Mines one hard negative per triplet from the given (detached) embeddings.
    ///
    /// Falls back to the triplet's own negative when every candidate is a known
    /// positive of the anchor.
    fn mine_negatives(
        &mut self,
        embeddings: &Tensor,
        batch: &[Triplet],
    ) -> Result<Vec<usize>, TrainingError> {
        let empty = HashSet::new();
        let pools: Vec<Vec<usize>> = batch
            .iter()
            .map(|t| {
                let known = self.known_positives.get(&t.anchor).unwrap_or(&empty);
                sample_pool(&self.candidates, known, self.config.pool_size, &mut self.rng)
            })
            .collect();

        let mut anchors = Vec::with_capacity(batch.len() * self.config.pool_size);
        let mut items = Vec::with_capacity(anchors.capacity());
        for (t, pool) in batch.iter().zip(&pools) {
            anchors.extend(std::iter::repeat_n(t.anchor, pool.len()));
            items.extend_from_slice(pool);
        }
        let scores = if items.is_empty() {
            Vec::new()
        } else {
            self.model
                .logits(embeddings, &anchors, &items, false)?
                .to_vec1::<f32>()?
        };

        let mut offset = 0;
        let mut negatives = Vec::with_capacity(batch.len());
        for (t, pool) in batch.iter().zip(&pools) {
            let pool_scores = &scores[offset..offset + pool.len()];
            offset += pool.len();
            let negative =
                select_hard_negative(pool, pool_scores, self.config.hard_top_k, &mut self.rng)
                    .unwrap_or(t.negative);
            negatives.push(negative);
        }
        Ok(negatives)
    }

    /// One optimizer step over `batch`.
    fn train_step(&mut self, batch: &[Triplet]) -> Result<StepOutcome, TrainingError> {
        let anchors: Vec<usize> = batch.iter().map(|t| t.anchor).collect();
        let positives: Vec<usize> = batch.iter().map(|t| t.positive).collect();

        let embeddings = self.model.encode(&self.edges, true)?;
        let negatives = self.mine_negatives(&embeddings.detach(), batch)?;

        let pos = self.model.logits(&embeddings, &anchors, &positives, true)?;
        let neg = self.model.logits(&embeddings, &anchors, &negatives, true)?;
        let loss = bpr_loss(&pos, &neg, self.config.loss_epsilon)?;
        self.optimizer.backward_step(&loss)?;

        Ok(StepOutcome {
            loss: loss.to_scalar::<f32>()?,
            correct: count_correct(&pos, &neg)?,
        })
    }

    /// Loss and accuracy in evaluation mode, using each triplet's own negative.
    pub fn evaluate(&self, triplets: &[Triplet]) -> Result<EvalMetrics, TrainingError> {
        if triplets.is_empty() {
            return Err(TrainingError::Empty {
                what: "evaluation set",
            });
        }

        let embeddings = self.model.encode(&self.edges, false)?;
        let mut loss_sum = 0f32;
        let mut correct = 0usize;
        for batch in triplets.chunks(self.config.batch_size) {
            let anchors: Vec<usize> = batch.iter().map(|t| t.anchor).collect();
            let positives: Vec<usize> = batch.iter().map(|t| t.positive).collect();
            let negatives: Vec<usize> = batch.iter().map(|t| t.negative).collect();

            let pos = self.model.logits(&embeddings, &anchors, &positives, false)?;
            let neg = self.model.logits(&embeddings, &anchors, &negatives, false)?;
            let batch_loss = bpr_loss(&pos, &neg, self.config.loss_epsilon)?.to_scalar::<f32>()?;
            loss_sum += batch_loss * batch.len() as f32;
            correct += count_correct(&pos, &neg)?;
        }

        Ok(EvalMetrics {
            loss: loss_sum / triplets.len() as f32,
            accuracy: correct as f32 / triplets.len() as f32,
            count: triplets.len(),
        })
    }

    fn train_epoch(&mut self, epoch: usize, train: &[Triplet]) -> Result<EvalMetrics, TrainingError> {
        let mut order: Vec<usize> = (0..train.len()).collect();
        order.shuffle(&mut self.rng);

        // Batch means weighted by batch size, so a short last batch counts per pair.
        let mut loss_sum = 0f32;
        let mut correct = 0usize;
        for chunk in order.chunks(self.config.batch_size) {
            let batch: Vec<Triplet> = chunk.iter().map(|&i| train[i]).collect();
            let step = self.train_step(&batch)?;
            if !step.loss.is_finite() {
                return Err(TrainingError::NonFinite {
                    metric: "training loss",
                    epoch,
                });
            }
            loss_sum += step.loss * batch.len() as f32;
            correct += step.correct;
        }

        Ok(EvalMetrics {
            loss: loss_sum / train.len() as f32,
            accuracy: correct as f32 / train.len() as f32,
            count: train.len(),
        })
    }

    /// Runs epochs until patience or the epoch budget runs out.
    ///
    /// Every epoch is checkpointed when a store is attached. The parameters with the
    /// lowest validation loss become the canonical checkpoint and are restored into
    /// the model before returning.
    pub fn fit(
        &mut self,
        train: &[Triplet],
        val: &[Triplet],
    ) -> Result<TrainingReport, TrainingError> {
        if train.is_empty() {
            return Err(TrainingError::Empty {
                what: "training set",
            });
        }
        if val.is_empty() {
            return Err(TrainingError::Empty {
                what: "validation set",
            });
        }

        info!(
            train = train.len(),
            val = val.len(),
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            "Training started"
        );

        let mut stopping = EarlyStopping::new(self.config.patience, self.config.min_delta);
        let mut best: Option<BestSnapshot> = None;
        let mut history = Vec::new();
        let mut stop_reason = StopReason::Exhausted;

        for epoch in 1..=self.config.epochs {
            self.state = TrainerState::Running { epoch };

            let train_metrics = self.train_epoch(epoch, train)?;
            let val_metrics = self.evaluate(val)?;
            if !val_metrics.loss.is_finite() {
                return Err(TrainingError::NonFinite {
                    metric: "validation loss",
                    epoch,
                });
            }

            let tensors = self.model.named_tensors()?;
            if let Some(store) = &self.store {
                store.save_epoch(&tensors, epoch, val_metrics.loss, val_metrics.accuracy)?;
            }

            let improved = best
                .as_ref()
                .is_none_or(|b| val_metrics.loss < b.val_loss);
            if improved {
                if let Some(store) = &self.store {
                    store.save_best(&tensors, epoch)?;
                }
                best = Some(BestSnapshot {
                    epoch,
                    val_loss: val_metrics.loss,
                    tensors,
                });
            }

            let metrics = EpochMetrics {
                epoch,
                train_loss: train_metrics.loss,
                train_accuracy: train_metrics.accuracy,
                val_loss: val_metrics.loss,
                val_accuracy: val_metrics.accuracy,
                improved,
            };
            info!(
                epoch,
                train_loss = metrics.train_loss,
                train_acc = metrics.train_accuracy,
                val_loss = metrics.val_loss,
                val_acc = metrics.val_accuracy,
                improved,
                "Epoch complete"
            );
            history.push(metrics);

            if stopping.step(val_metrics.loss) {
                warn!(
                    epoch,
                    patience = self.config.patience,
                    "Early stopping triggered"
                );
                stop_reason = StopReason::EarlyStopped;
                break;
            }
        }

        self.state = TrainerState::Stopped(stop_reason);
        let Some(best) = best else {
            return Err(TrainingError::Empty {
                what: "epoch history",
            });
        };
        self.model.assign(&best.tensors)?;
        debug!(epoch = best.epoch, "Best parameters restored");

        Ok(TrainingReport {
            epochs: history,
            best_epoch: best.epoch,
            best_val_loss: best.val_loss,
            stop_reason,
        })
    }

    /// Hands a frozen copy of the current parameters to serving.
    pub fn publish(&self, handle: &SnapshotHandle) -> Result<u64, TrainingError> {
        Ok(handle.publish(self.model.freeze()?))
    }
}

fn count_correct(pos: &Tensor, neg: &Tensor) -> Result<usize, TrainingError> {
    let pos = pos.to_vec1::<f32>()?;
    let neg = neg.to_vec1::<f32>()?;
    Ok(pos.iter().zip(&neg).filter(|(p, n)| p > n).count())
}
