//! Pairing engine entrypoint.
//!
//! With `PAIRING_INTERACTIONS_PATH` set, trains first and serves the best
//! parameters. Otherwise restores a checkpoint as configured.

use std::sync::Arc;

use mimalloc::MiMalloc;

use pairing::config::Config;
use pairing::graph::NodeType;
use pairing::service::{Service, ServiceCell, ServiceOptions};
use pairing::training::{TrainerConfig, pipeline};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!(
        graph = %config.graph_path.display(),
        checkpoints = %config.checkpoint_dir.display(),
        load_mode = %config.load_mode,
        fallback = config.fallback_enabled,
        device = %config.device,
        "Pairing engine starting"
    );

    let cell = ServiceCell::new();
    let service = if config.interactions_path.is_some() {
        let trainer_config = TrainerConfig::from_env()?;
        let train_config = config.clone();
        let outcome =
            tokio::task::spawn_blocking(move || pipeline::run(&train_config, trainer_config))
                .await??;

        tracing::info!(
            best_epoch = outcome.report.best_epoch,
            best_val_loss = outcome.report.best_val_loss,
            stop_reason = ?outcome.report.stop_reason,
            "Training finished"
        );

        let service = Service::new(
            outcome.graph,
            Some(outcome.model),
            ServiceOptions::from(&config),
        )?;
        cell.set(service)?
    } else {
        cell.get_or_init(&config).await?
    };

    log_sample(&service);

    tracing::info!("Start-up check complete");
    Ok(())
}

/// Logs recommendations for the first liquor as a start-up smoke check.
fn log_sample(service: &Arc<Service>) {
    let Some(liquor) = service.list_nodes(NodeType::Liquor).into_iter().next() else {
        tracing::warn!("Graph has no liquor nodes");
        return;
    };

    match service.recommend(liquor.id, None) {
        Ok(recs) => {
            for (rank, rec) in recs.iter().enumerate() {
                tracing::info!(
                    liquor = %liquor.name,
                    rank = rank + 1,
                    ingredient = %rec.name,
                    score = rec.score,
                    source = ?rec.source,
                    "Recommendation"
                );
            }
        }
        Err(e) => tracing::warn!(liquor = liquor.id, error = %e, "Sample recommendation failed"),
    }
}
