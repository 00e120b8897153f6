use serde_json::Error as JsonError;
use validator::ValidationErrors;

/// Type de résultat standard pour l'application
pub type AppResult<T> = Result<T, AppError>;

/// Erreurs principales de l'application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Erreur de configuration (fatale au démarrage)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Erreur de connexion (queue, réseau)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Erreur du canal ou de la consommation AMQP
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Erreur de sérialisation/désérialisation
    #[error("Serialization error: {0}")]
    SerializationError(#[from] JsonError),

    /// Données invalides dans la requête
    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationErrors),

    /// Échec du pipeline de génération
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// Erreur de stockage (S3, fichiers locaux)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Erreur d'un service externe (suivi de statut)
    #[error("External service error: {0}")]
    ExternalService(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<lapin::Error> for AppError {
    fn from(err: lapin::Error) -> Self {
        AppError::QueueError(err.to_string())
    }
}
