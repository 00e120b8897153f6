use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inference_worker::core::pipeline::DiffusionPipeline;
use inference_worker::infrastructure::queue::QueueConsumer;
use inference_worker::infrastructure::storage::S3ArtifactStorage;
use inference_worker::infrastructure::telemetry::Telemetry;
use inference_worker::infrastructure::tracker::StatusTracker;
use inference_worker::utils::config::Config;
use inference_worker::workers::inference_worker::InferenceWorker;

#[tokio::main]
async fn main() {
    // Initialisation du logging
    setup_tracing();
    info!("🚀 Démarrage du worker d'inférence");

    // Chargement de la configuration
    let config = Config::from_env().expect("❌ Impossible de charger la configuration");
    info!("✅ Configuration chargée avec succès");

    // Export des traces distribuées
    let telemetry = Telemetry::init(&config.telemetry)
        .expect("❌ Impossible d'initialiser le tracing distribué");

    // Chargement du pipeline de génération: seul échec fatal au démarrage
    let pipeline = DiffusionPipeline::load(&config.pipeline)
        .expect("❌ Impossible de charger le pipeline de génération");

    // Initialisation des services
    let storage = S3ArtifactStorage::from_config(&config.storage).await;
    let tracker = StatusTracker::new(config.tracker.base_url.clone());

    let worker = InferenceWorker::new(
        Arc::new(pipeline),
        tracker,
        Arc::new(storage),
        telemetry.clone(),
        config.worker.clone(),
        config.queue.queue_name.clone(),
    );

    info!("✅ Worker prêt, en attente de livraisons");

    // Boucle de consommation: ne rend jamais la main
    let consumer = QueueConsumer::new(config.queue.clone());
    consumer.run(Arc::new(worker)).await
}

/// Configure le tracing pour le logging structuré
fn setup_tracing() {
    let log_level = env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(tracing::Level::INFO);

    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "json".into());

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with(if log_format == "json" {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(true),
            ) as Box<dyn tracing_subscriber::Layer<_> + Send + Sync>
        } else {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_line_number(true)
                    .with_file(true),
            ) as Box<dyn tracing_subscriber::Layer<_> + Send + Sync>
        });

    subscriber.init();
}
