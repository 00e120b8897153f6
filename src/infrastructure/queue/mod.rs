use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Connection, ConnectionProperties};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::infrastructure::error::{AppError, AppResult};
use crate::utils::config::QueueConfig;
use crate::workers::inference_worker::{AckDecision, InferenceWorker};

/// Délai fixe entre deux tentatives de connexion à la queue
const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Tag du consumer unique enregistré sur la queue
const CONSUMER_TAG: &str = "inference-worker";

/// Consumer de la queue de travail
///
/// Possède le cycle de vie de la connexion AMQP. Un seul callback de
/// consommation est enregistré, jamais en auto-ack: l'acquittement est
/// toujours décidé par le processeur de jobs.
pub struct QueueConsumer {
    config: QueueConfig,
}

impl QueueConsumer {
    /// Crée un nouveau consumer pour la queue configurée
    pub fn new(config: QueueConfig) -> Self {
        Self { config }
    }

    /// Boucle de consommation supervisée, ne rend jamais la main
    ///
    /// Politique de vivacité: reconnexion indéfinie à délai fixe, sans
    /// budget de tentatives. Une erreur échappée du flux de consommation
    /// est loggée et suivie du même délai; le processus ne s'arrête que
    /// par terminaison externe.
    pub async fn run(&self, worker: Arc<InferenceWorker>) {
        loop {
            match self.connect_and_consume(worker.clone()).await {
                Ok(()) => warn!(
                    "⚠️  Flux de consommation terminé, reconnexion dans {}s",
                    RECONNECT_DELAY.as_secs()
                ),
                Err(e) => error!(
                    "❌ Connexion à la queue perdue: {}, nouvelle tentative dans {}s",
                    e,
                    RECONNECT_DELAY.as_secs()
                ),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// Une session de consommation, de la connexion à la perte du flux
    async fn connect_and_consume(&self, worker: Arc<InferenceWorker>) -> AppResult<()> {
        info!(
            "🔧 Connexion à la queue '{}' sur {}:{}...",
            self.config.queue_name, self.config.host, self.config.port
        );

        let connection =
            Connection::connect(&self.config.amqp_uri(), ConnectionProperties::default())
                .await
                .map_err(|e| AppError::ConnectionError(e.to_string()))?;
        let channel = connection.create_channel().await?;

        // Un seul job en vol: la capacité de génération est exclusive,
        // le prefetch sert de backpressure
        channel.basic_qos(1, BasicQosOptions::default()).await?;

        // La queue survit à un redémarrage du broker
        channel
            .queue_declare(
                &self.config.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        let mut consumer = channel
            .basic_consume(
                &self.config.queue_name,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!("✅ Consommation démarrée (prefetch=1, ack manuel)");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let headers = header_map(delivery.properties.headers());

            match worker.handle_delivery(&delivery.data, &headers).await {
                AckDecision::Ack => {
                    delivery.acker.ack(BasicAckOptions::default()).await?;
                }
            }
        }

        Ok(())
    }
}

/// Convertit les en-têtes AMQP en mapping string -> string
///
/// Seules les valeurs chaîne sont conservées: c'est le format des
/// en-têtes de propagation de contexte de trace.
fn header_map(headers: &Option<FieldTable>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(table) = headers {
        for (key, value) in table.inner() {
            if let AMQPValue::LongString(s) = value {
                map.insert(
                    key.as_str().to_string(),
                    String::from_utf8_lossy(s.as_bytes()).to_string(),
                );
            }
        }
    }
    map
}
