use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::{global, Context};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::infrastructure::error::{AppError, AppResult};
use crate::utils::config::TelemetryConfig;

/// Nom du tracer utilisé pour tous les spans du worker
pub const TRACER_NAME: &str = "inference-worker";

/// Poignée sur le provider de traces
///
/// Clonable et injectée dans le worker pour permettre le flush explicite
/// des spans en fin de job. Sans provider (mode désactivé), toutes les
/// opérations sont des no-ops.
#[derive(Clone)]
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Initialise l'export des traces vers le collecteur OTLP
    pub fn init(config: &TelemetryConfig) -> AppResult<Self> {
        info!("🔧 Initialisation du tracing distribué...");

        global::set_text_map_propagator(TraceContextPropagator::new());

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.otlp_endpoint)
            .build()
            .map_err(|e| {
                AppError::ConfigurationError(format!("exporteur OTLP invalide: {}", e))
            })?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(
                Resource::builder()
                    .with_service_name(config.service_name.clone())
                    .build(),
            )
            .build();

        global::set_tracer_provider(provider.clone());

        info!(
            "✅ Tracing configuré pour le service '{}' vers {}",
            config.service_name, config.otlp_endpoint
        );

        Ok(Self {
            provider: Some(provider),
        })
    }

    /// Poignée sans export (tests, tracing désactivé)
    ///
    /// Le propagateur W3C reste installé: l'extraction/injection de
    /// contexte fonctionne même sans exporteur.
    pub fn disabled() -> Self {
        global::set_text_map_propagator(TraceContextPropagator::new());
        Self { provider: None }
    }

    /// Vide les spans bufferisés vers le collecteur
    ///
    /// Appelé en fin de chaque job, succès comme échec. Un échec de
    /// flush est loggé et jamais propagé.
    pub fn force_flush(&self) {
        if let Some(provider) = &self.provider {
            if let Err(e) = provider.force_flush() {
                warn!("⚠️  Échec du flush des spans: {}", e);
            } else {
                debug!("Spans flushés vers le collecteur");
            }
        }
    }

    /// Arrêt propre du provider (fin de processus)
    pub fn shutdown(&self) {
        if let Some(provider) = &self.provider {
            if let Err(e) = provider.shutdown() {
                warn!("⚠️  Échec de l'arrêt du provider de traces: {}", e);
            }
        }
    }
}

/// Extrait le contexte de trace W3C des en-têtes du message
pub fn extract_context(headers: &HashMap<String, String>) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Injecte le contexte de trace courant dans un jeu d'en-têtes
pub fn inject_context(cx: &Context, headers: &mut HashMap<String, String>) {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(cx, &mut HeaderInjector(headers))
    });
}

struct HeaderExtractor<'a>(&'a HashMap<String, String>);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|value| value.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}

struct HeaderInjector<'a>(&'a mut HashMap<String, String>);

impl<'a> Injector for HeaderInjector<'a> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};

    fn remote_context() -> Context {
        let span_context = SpanContext::new(
            TraceId::from(0x4bf92f3577b34da6a3ce929d0e0e4736u128),
            SpanId::from(0x00f067aa0ba902b7u64),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn inject_then_extract_roundtrips_trace_id() {
        let _telemetry = Telemetry::disabled();

        let cx = remote_context();
        let mut headers = HashMap::new();
        inject_context(&cx, &mut headers);

        assert!(headers.contains_key("traceparent"));

        let extracted = extract_context(&headers);
        let original = cx.span().span_context().clone();
        let restored = extracted.span().span_context().clone();

        assert_eq!(original.trace_id(), restored.trace_id());
        assert_eq!(original.span_id(), restored.span_id());
        assert!(restored.is_remote());
    }

    #[test]
    fn extract_without_headers_yields_invalid_context() {
        let _telemetry = Telemetry::disabled();

        let headers = HashMap::new();
        let cx = extract_context(&headers);

        assert!(!cx.span().span_context().is_valid());
    }

    #[test]
    fn disabled_flush_is_a_noop() {
        let telemetry = Telemetry::disabled();
        telemetry.force_flush();
        telemetry.shutdown();
    }
}
