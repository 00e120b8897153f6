use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{global, Context, KeyValue};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tracing::{error, info, warn};
use validator::Validate;

use crate::core::pipeline::ImageGenerator;
use crate::domain::jobs::{JobRequest, JobStatus};
use crate::infrastructure::error::{AppError, AppResult};
use crate::infrastructure::storage::ArtifactStore;
use crate::infrastructure::telemetry::{self, Telemetry, TRACER_NAME};
use crate::infrastructure::tracker::StatusTracker;
use crate::utils::config::WorkerConfig;

/// Décision d'acquittement rendue au consumer
///
/// Une seule issue possible: tout message traité est acquitté, succès
/// comme échec. Un échec de job est terminal; re-queuer entretiendrait
/// des boucles de messages empoisonnés.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AckDecision {
    Ack,
}

/// Processeur de jobs de génération
///
/// Capture ses dépendances (pipeline, suivi, stockage, télémétrie) à la
/// construction et expose un unique point d'entrée par livraison. Aucun
/// état n'est conservé entre deux messages.
pub struct InferenceWorker {
    pipeline: Arc<dyn ImageGenerator>,
    tracker: StatusTracker,
    storage: Arc<dyn ArtifactStore>,
    telemetry: Telemetry,
    config: WorkerConfig,
    queue_name: String,
}

impl InferenceWorker {
    /// Crée une nouvelle instance du worker
    pub fn new(
        pipeline: Arc<dyn ImageGenerator>,
        tracker: StatusTracker,
        storage: Arc<dyn ArtifactStore>,
        telemetry: Telemetry,
        config: WorkerConfig,
        queue_name: String,
    ) -> Self {
        Self {
            pipeline,
            tracker,
            storage,
            telemetry,
            config,
            queue_name,
        }
    }

    /// Traite une livraison de la queue
    ///
    /// Toutes les erreurs restent confinées au job: aucune ne remonte au
    /// consumer. Le flush des spans précède le retour, et l'acquittement
    /// est le dernier acte du handler sur tous les chemins.
    pub async fn handle_delivery(
        &self,
        body: &[u8],
        headers: &HashMap<String, String>,
    ) -> AckDecision {
        // Corps invalide: aucun request_id fiable, donc aucun rapport
        let request = match serde_json::from_slice::<JobRequest>(body) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "❌ Message malformé, abandonné sans rapport de statut");
                return AckDecision::Ack;
            }
        };

        let started = Instant::now();
        info!(request_id = %request.request_id, "🔄 Traitement du job");

        // Span parent du job, rattaché au contexte du producteur
        let parent_cx = telemetry::extract_context(headers);
        let tracer = global::tracer(TRACER_NAME);
        let span = tracer
            .span_builder(format!("{} process", self.queue_name))
            .with_kind(SpanKind::Consumer)
            .with_attributes([
                KeyValue::new("messaging.system", "rabbitmq"),
                KeyValue::new("messaging.destination.name", self.queue_name.clone()),
                KeyValue::new("request_id", request.request_id.clone()),
            ])
            .start_with_context(&tracer, &parent_cx);
        let cx = parent_cx.with_span(span);

        match self.run_job(&request, &cx).await {
            Ok(image_url) => {
                info!(
                    request_id = %request.request_id,
                    image_url = %image_url,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "✅ Job complété",
                );
            }
            Err(e) => {
                error!(request_id = %request.request_id, error = %e, "❌ Échec du job");
                {
                    let span = cx.span();
                    span.record_error(&e);
                    span.set_status(Status::error(e.to_string()));
                }
                // Rapport terminal best-effort, puis acquittement quand même
                self.report(&request.request_id, JobStatus::Failed, None, &cx)
                    .await;
            }
        }

        cx.span().end();

        // Flush des spans avant de rendre la main, quelle que soit l'issue
        self.telemetry.force_flush();

        AckDecision::Ack
    }

    /// Déroule la machine à états d'un job et retourne l'URL de l'artefact
    async fn run_job(&self, request: &JobRequest, cx: &Context) -> AppResult<String> {
        // Statut processing: télémétrie best-effort, jamais une précondition
        self.report(&request.request_id, JobStatus::Processing, None, cx)
            .await;

        // Prompt vide = erreur de validation, pas de substitution ici
        request.params.validate()?;

        let image = self.generate(request, cx).await?;

        // Persistance locale le temps de l'upload
        fs::create_dir_all(&self.config.temp_dir).await?;
        let local_path = self
            .config
            .temp_dir
            .join(format!("{}.png", request.request_id));
        fs::write(&local_path, &image).await?;

        let image_url = self.upload(&local_path, &request.request_id, cx).await;

        // Suppression inconditionnelle, issue de l'upload comprise
        if let Err(e) = fs::remove_file(&local_path).await {
            warn!(
                request_id = %request.request_id,
                error = %e,
                "⚠️  Fichier temporaire non supprimé: {}",
                local_path.display(),
            );
        }

        match image_url {
            Some(url) => {
                self.report(&request.request_id, JobStatus::Completed, Some(&url), cx)
                    .await;
                Ok(url)
            }
            // Pas de référence = job échoué, même sans exception levée
            None => Err(AppError::StorageError(
                "aucune référence retournée par le stockage".to_string(),
            )),
        }
    }

    /// Invoque le pipeline sous un span imbriqué
    async fn generate(&self, request: &JobRequest, cx: &Context) -> AppResult<Vec<u8>> {
        let tracer = global::tracer(TRACER_NAME);
        let span = tracer.start_with_context("generate_image", cx);
        let generate_cx = cx.with_span(span);

        let result = self.pipeline.generate(&request.params).await;

        if let Err(e) = &result {
            let span = generate_cx.span();
            span.record_error(e);
            span.set_status(Status::error(e.to_string()));
        }
        generate_cx.span().end();

        result
    }

    /// Upload de l'artefact sous un span imbriqué
    async fn upload(&self, local_path: &Path, request_id: &str, cx: &Context) -> Option<String> {
        let tracer = global::tracer(TRACER_NAME);
        let span = tracer.start_with_context("upload_artifact", cx);
        let upload_cx = cx.with_span(span);

        let result = self.storage.store_image(local_path, request_id).await;

        if result.is_none() {
            upload_cx
                .span()
                .set_status(Status::error("no reference returned"));
        }
        upload_cx.span().end();

        result
    }

    /// Rapporte un statut sous un span imbriqué
    ///
    /// Effet best-effort: le résultat est loggé puis délibérément
    /// ignoré, le job continue dans tous les cas.
    async fn report(
        &self,
        request_id: &str,
        status: JobStatus,
        image_url: Option<&str>,
        cx: &Context,
    ) {
        let tracer = global::tracer(TRACER_NAME);
        let span = tracer.start_with_context("report_status", cx);
        let report_cx = cx.with_span(span);

        if let Err(e) = self
            .tracker
            .report_status(request_id, status, image_url)
            .await
        {
            warn!(request_id, %status, error = %e, "⚠️  Rapport de statut échoué (ignoré)");
            report_cx.span().set_status(Status::error(e.to_string()));
        }
        report_cx.span().end();
    }
}
