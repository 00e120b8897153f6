//! # Workers Module
//!
//! Ce module contient le traitement background des livraisons :
//! - `inference_worker.rs`: Machine à états d'un job de génération
//!
//! ## Architecture
//! Le worker capture ses dépendances à la construction et traite une
//! livraison à la fois :
//! - Un seul point d'entrée par message
//! - Gestion robuste des erreurs, toutes confinées au job
//! - Acquittement systématique, succès comme échec
//!
//! ## Monitoring
//! - Logging structuré pour chaque étape
//! - Un span parent par job, spans imbriqués par opération
//! - Flush explicite des spans en fin de job

pub mod inference_worker;

pub use inference_worker::{AckDecision, InferenceWorker};
