use reqwest::Client as HttpClient;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::jobs::JobStatus;
use crate::infrastructure::error::{AppError, AppResult};

/// Client de suivi des statuts de jobs
///
/// Une requête sortante par appel, sans retry ni batching. L'appelant
/// décide quoi faire du résultat; le processeur le logge et l'ignore,
/// un rapport manqué n'interrompt jamais un job.
#[derive(Clone)]
pub struct StatusTracker {
    http_client: HttpClient,
    base_url: Option<String>,
}

/// Corps JSON envoyé au service de suivi
#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
}

impl StatusTracker {
    /// Crée un nouveau client de suivi
    ///
    /// Sans `base_url`, chaque rapport est un no-op documenté.
    pub fn new(base_url: Option<String>) -> Self {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url,
        }
    }

    /// Rapporte une transition de statut pour un job
    ///
    /// Émet `POST {base}/update_db/{request_id}` avec `{status, image_url?}`.
    /// Toute réponse non-2xx est une erreur; aucune relance n'est tentée.
    pub async fn report_status(
        &self,
        request_id: &str,
        status: JobStatus,
        image_url: Option<&str>,
    ) -> AppResult<()> {
        let Some(base_url) = &self.base_url else {
            debug!(request_id, %status, "Suivi non configuré, rapport ignoré");
            return Ok(());
        };

        let url = format!("{}/update_db/{}", base_url, request_id);
        let payload = StatusUpdate { status, image_url };

        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "update_db a répondu {}",
                response.status()
            )));
        }

        debug!(request_id, %status, "Statut rapporté");
        Ok(())
    }
}
