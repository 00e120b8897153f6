//! # Core Module
//!
//! Ce module contient la capacité de génération d'images derrière sa
//! seam de test:
//! - `pipeline.rs`: Trait `ImageGenerator` et pipeline Stable Diffusion
//!   invoqué via le runtime Python

pub mod pipeline;

pub use pipeline::{DiffusionPipeline, ImageGenerator};
