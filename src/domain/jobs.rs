use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Statut d'un job de génération, projeté vers le service de suivi
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Paramètres de génération portés par le message
///
/// Les valeurs par défaut s'appliquent aux clés absentes du corps; un
/// prompt vide reste présent après désérialisation et est rejeté par la
/// validation, jamais substitué.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationParams {
    #[serde(default)]
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_num_inference_steps")]
    #[validate(range(min = 1, message = "num_inference_steps must be positive"))]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default = "default_seed")]
    pub seed: i64,
}

fn default_num_inference_steps() -> u32 {
    50
}

fn default_guidance_scale() -> f32 {
    7.5
}

fn default_seed() -> i64 {
    50
}

/// Requête de génération telle que délivrée par la queue
///
/// `request_id` et `params` sont obligatoires: un corps qui ne les porte
/// pas est structurellement invalide et n'atteint jamais la machine à
/// états (aucun rapport de statut n'est possible sans `request_id`).
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub request_id: String,
    pub params: GenerationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_applies_defaults() {
        let body = r#"{"request_id": "r1", "params": {"prompt": "a brown bread"}}"#;
        let request: JobRequest = serde_json::from_str(body).unwrap();

        assert_eq!(request.request_id, "r1");
        assert_eq!(request.params.prompt, "a brown bread");
        assert_eq!(request.params.negative_prompt, "");
        assert_eq!(request.params.num_inference_steps, 50);
        assert_eq!(request.params.guidance_scale, 7.5);
        assert_eq!(request.params.seed, 50);
    }

    #[test]
    fn parse_rejects_missing_request_id() {
        let body = r#"{"params": {"prompt": "x"}}"#;
        assert!(serde_json::from_str::<JobRequest>(body).is_err());
    }

    #[test]
    fn parse_rejects_missing_params() {
        let body = r#"{"request_id": "r1"}"#;
        assert!(serde_json::from_str::<JobRequest>(body).is_err());
    }

    #[test]
    fn empty_prompt_fails_validation_not_parsing() {
        let body = r#"{"request_id": "r2", "params": {"prompt": ""}}"#;
        let request: JobRequest = serde_json::from_str(body).unwrap();

        assert!(request.params.validate().is_err());
    }

    #[test]
    fn missing_prompt_key_fails_validation() {
        let body = r#"{"request_id": "r3", "params": {}}"#;
        let request: JobRequest = serde_json::from_str(body).unwrap();

        assert!(request.params.validate().is_err());
    }

    #[test]
    fn explicit_params_are_kept() {
        let body = r#"{
            "request_id": "r4",
            "params": {
                "prompt": "tsuki_advtr, a potion bottle",
                "negative_prompt": "pattern, multiple",
                "num_inference_steps": 30,
                "guidance_scale": 9.0,
                "seed": 1234
            }
        }"#;
        let request: JobRequest = serde_json::from_str(body).unwrap();

        assert!(request.params.validate().is_ok());
        assert_eq!(request.params.num_inference_steps, 30);
        assert_eq!(request.params.guidance_scale, 9.0);
        assert_eq!(request.params.seed, 1234);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }
}
