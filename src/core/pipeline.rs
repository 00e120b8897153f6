use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::jobs::GenerationParams;
use crate::infrastructure::error::{AppError, AppResult};
use crate::utils::config::PipelineConfig;

/// Capacité de génération d'images, opaque pour le reste du worker
///
/// Déterministe à seed et poids chargés identiques. Échoue sur prompt
/// vide ou manquant. Le coût (temps d'accélérateur) est supposé élevé et
/// exclusif: un seul job l'invoque à la fois.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, params: &GenerationParams) -> AppResult<Vec<u8>>;
}

/// Pipeline Stable Diffusion + LoRA invoqué via le runtime Python
///
/// Construit une fois au démarrage puis injecté tel quel dans le
/// processeur de jobs; jamais muté pendant le traitement.
pub struct DiffusionPipeline {
    python_path: String,
    script_path: PathBuf,
    model_dir: PathBuf,
    lora_path: PathBuf,
}

impl DiffusionPipeline {
    /// Charge le pipeline et vérifie ses dépendances
    ///
    /// Un script, un répertoire de modèles ou un adaptateur LoRA absent
    /// est fatal: le worker ne démarre pas sans capacité de génération.
    pub fn load(config: &PipelineConfig) -> AppResult<Self> {
        info!("🔧 Chargement du pipeline de génération...");

        if !config.script_path.exists() {
            return Err(AppError::ConfigurationError(format!(
                "script d'inférence introuvable: {}",
                config.script_path.display()
            )));
        }
        if !config.model_dir.exists() {
            return Err(AppError::ConfigurationError(format!(
                "répertoire de modèles introuvable: {}",
                config.model_dir.display()
            )));
        }
        if !config.lora_path.exists() {
            return Err(AppError::ConfigurationError(format!(
                "adaptateur LoRA introuvable: {}",
                config.lora_path.display()
            )));
        }

        info!(
            "✅ Pipeline prêt (script: {}, lora: {})",
            config.script_path.display(),
            config.lora_path.display()
        );

        Ok(Self {
            python_path: config.python_path.clone(),
            script_path: config.script_path.clone(),
            model_dir: config.model_dir.clone(),
            lora_path: config.lora_path.clone(),
        })
    }

    /// Arguments passés au script d'inférence
    fn build_args(&self, params: &GenerationParams, output_path: &Path) -> Vec<String> {
        vec![
            "--prompt".to_string(),
            params.prompt.clone(),
            "--negative-prompt".to_string(),
            params.negative_prompt.clone(),
            "--num-inference-steps".to_string(),
            params.num_inference_steps.to_string(),
            "--guidance-scale".to_string(),
            params.guidance_scale.to_string(),
            "--seed".to_string(),
            params.seed.to_string(),
            "--model-dir".to_string(),
            self.model_dir.display().to_string(),
            "--lora-path".to_string(),
            self.lora_path.display().to_string(),
            "--output".to_string(),
            output_path.display().to_string(),
        ]
    }
}

#[async_trait]
impl ImageGenerator for DiffusionPipeline {
    async fn generate(&self, params: &GenerationParams) -> AppResult<Vec<u8>> {
        if params.prompt.trim().is_empty() {
            return Err(AppError::GenerationError(
                "prompt vide ou manquant".to_string(),
            ));
        }

        let output_path =
            std::env::temp_dir().join(format!("generation_{}.png", Uuid::new_v4()));

        debug!(seed = params.seed, steps = params.num_inference_steps, "Invocation du pipeline");

        let output = Command::new(&self.python_path)
            .arg(&self.script_path)
            .args(self.build_args(params, &output_path))
            .output()
            .await
            .map_err(|e| AppError::GenerationError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::GenerationError(format!(
                "le script d'inférence a échoué: {}",
                stderr
            )));
        }

        let image = tokio::fs::read(&output_path)
            .await
            .map_err(|e| AppError::GenerationError(format!("image produite illisible: {}", e)))?;

        if let Err(e) = tokio::fs::remove_file(&output_path).await {
            warn!(error = %e, "⚠️  Fichier de sortie du pipeline non supprimé");
        }

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn pipeline_in(dir: &Path) -> DiffusionPipeline {
        let script = dir.join("inference.py");
        let models = dir.join("models");
        let lora = models.join("lora_adapter.safetensors");
        fs::write(&script, "# stub").unwrap();
        fs::create_dir_all(&models).unwrap();
        fs::write(&lora, b"weights").unwrap();

        let config = PipelineConfig {
            python_path: "python3".to_string(),
            script_path: script,
            model_dir: models,
            lora_path: lora,
        };
        DiffusionPipeline::load(&config).unwrap()
    }

    #[test]
    fn load_fails_without_lora_adapter() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("inference.py");
        fs::write(&script, "# stub").unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();

        let config = PipelineConfig {
            python_path: "python3".to_string(),
            script_path: script,
            model_dir: dir.path().join("models"),
            lora_path: dir.path().join("models/missing.safetensors"),
        };

        let result = DiffusionPipeline::load(&config);
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[test]
    fn load_fails_without_script() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            python_path: "python3".to_string(),
            script_path: dir.path().join("missing.py"),
            model_dir: dir.path().to_path_buf(),
            lora_path: dir.path().to_path_buf(),
        };

        assert!(DiffusionPipeline::load(&config).is_err());
    }

    #[test]
    fn args_forward_every_parameter() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline_in(dir.path());

        let params = GenerationParams {
            prompt: "tsuki_advtr, a brown bread".to_string(),
            negative_prompt: "pattern, multiple".to_string(),
            num_inference_steps: 50,
            guidance_scale: 7.5,
            seed: 50,
        };
        let args = pipeline.build_args(&params, Path::new("/tmp/out.png"));

        let expect_pair = |flag: &str, value: &str| {
            let position = args.iter().position(|a| a == flag).unwrap();
            assert_eq!(args[position + 1], value);
        };
        expect_pair("--prompt", "tsuki_advtr, a brown bread");
        expect_pair("--negative-prompt", "pattern, multiple");
        expect_pair("--num-inference-steps", "50");
        expect_pair("--guidance-scale", "7.5");
        expect_pair("--seed", "50");
        expect_pair("--output", "/tmp/out.png");
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_invocation() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline_in(dir.path());

        let params = GenerationParams {
            prompt: "   ".to_string(),
            negative_prompt: String::new(),
            num_inference_steps: 50,
            guidance_scale: 7.5,
            seed: 50,
        };

        let result = pipeline.generate(&params).await;
        assert!(matches!(result, Err(AppError::GenerationError(_))));
    }
}
