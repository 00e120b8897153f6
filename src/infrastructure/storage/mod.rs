use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{error, info, warn};

use crate::infrastructure::error::{AppError, AppResult};
use crate::utils::config::StorageConfig;

/// Dépôt d'artefacts produits par les jobs
///
/// `None` couvre à la fois le stockage non configuré et l'upload échoué;
/// les deux cas sont loggés distinctement au point d'occurrence, sans
/// retry.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store_image(&self, local_path: &Path, request_id: &str) -> Option<String>;
}

/// Service de stockage S3/MinIO
#[derive(Clone)]
pub struct S3ArtifactStorage {
    backend: Option<S3Backend>,
}

#[derive(Clone)]
struct S3Backend {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3ArtifactStorage {
    /// Crée le service de stockage depuis la configuration
    ///
    /// Sans bucket configuré, le service reste opérationnel mais chaque
    /// upload retourne `None`.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let Some(bucket) = &config.bucket else {
            warn!("⚠️  Aucun bucket configuré, les uploads d'artefacts sont désactivés");
            return Self { backend: None };
        };

        info!("🔧 Initialisation du service de stockage...");

        let client = match (&config.endpoint, &config.access_key, &config.secret_key) {
            // Déploiement type MinIO: endpoint et clés explicites
            (Some(endpoint), Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key.as_str(), secret_key.as_str(), None, None, "env");
                let s3_config = aws_sdk_s3::Config::builder()
                    .credentials_provider(credentials)
                    .endpoint_url(endpoint.as_str())
                    .region(Region::new(config.region.clone()))
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            // Sinon, chaîne de credentials AWS ambiante
            _ => {
                let shared_config = aws_config::from_env()
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                Client::new(&shared_config)
            }
        };

        let public_base = public_base_url(config.endpoint.as_deref(), &config.region, bucket);

        info!("✅ Service de stockage initialisé pour le bucket: {}", bucket);

        Self {
            backend: Some(S3Backend {
                client,
                bucket: bucket.clone(),
                public_base,
            }),
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStorage {
    async fn store_image(&self, local_path: &Path, request_id: &str) -> Option<String> {
        let Some(backend) = &self.backend else {
            warn!(request_id, "⚠️  Stockage non configuré, artefact non uploadé");
            return None;
        };

        match backend.upload(local_path, request_id).await {
            Ok(url) => {
                info!(request_id, url = %url, "📤 Artefact uploadé");
                Some(url)
            }
            Err(e) => {
                error!(request_id, error = %e, "❌ Échec de l'upload de l'artefact");
                None
            }
        }
    }
}

impl S3Backend {
    async fn upload(&self, local_path: &Path, request_id: &str) -> AppResult<String> {
        let content = tokio::fs::read(local_path).await?;
        let key = object_key(request_id);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(content))
            .content_type("image/png")
            .send()
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        Ok(format!("{}/{}", self.public_base, key))
    }
}

/// Clé objet d'un artefact de job
fn object_key(request_id: &str) -> String {
    format!("generated/{}.png", request_id)
}

/// Base publique des URLs de récupération
fn public_base_url(endpoint: Option<&str>, region: &str, bucket: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::StorageConfig;

    #[test]
    fn object_key_is_namespaced_by_request() {
        assert_eq!(object_key("r1"), "generated/r1.png");
    }

    #[test]
    fn public_base_uses_virtual_hosted_s3_url() {
        assert_eq!(
            public_base_url(None, "eu-west-3", "game-assets"),
            "https://game-assets.s3.eu-west-3.amazonaws.com"
        );
    }

    #[test]
    fn public_base_uses_endpoint_when_configured() {
        assert_eq!(
            public_base_url(Some("http://minio:9000/"), "us-east-1", "game-assets"),
            "http://minio:9000/game-assets"
        );
    }

    #[tokio::test]
    async fn unconfigured_bucket_disables_uploads() {
        let config = StorageConfig {
            bucket: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        };
        let storage = S3ArtifactStorage::from_config(&config).await;

        let result = storage
            .store_image(Path::new("/tmp/does-not-exist.png"), "r1")
            .await;

        assert!(result.is_none());
    }
}
