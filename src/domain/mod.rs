//! # Domain Models Module
//!
//! Ce module contient les modèles de données du worker. Ces modèles
//! représentent les entités métier échangées avec la queue et le service
//! de suivi.
//!
//! ## Structure
//! - `jobs.rs`: Requête de génération, paramètres et statut de job
//!
//! ## Conventions
//! - Tous les modèles implémentent `serde::Deserialize`
//! - Les valeurs par défaut des paramètres sont portées par serde
//! - La validation métier passe par `validator::Validate`

pub mod jobs;

// Ré-export des types principaux pour une utilisation facile
pub use jobs::{GenerationParams, JobRequest, JobStatus};
