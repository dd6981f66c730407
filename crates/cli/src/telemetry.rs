//! Tracing subscriber and OpenTelemetry exporter setup.

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

const SERVICE_NAME: &str = "parcelscope";

/// Keeps the exporter alive; call [`Telemetry::shutdown`] before exit to
/// flush buffered spans.
pub struct Telemetry {
    provider: Option<TracerProvider>,
}

impl Telemetry {
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(err) = provider.shutdown() {
                eprintln!("failed to flush OpenTelemetry spans: {err}");
            }
        }
    }
}

/// Installs the global subscriber: `RUST_LOG` filter (default `info`), the
/// chosen formatter, and an OTLP layer when `otlp_endpoint` is set.
pub fn init(format: LogFormat, otlp_endpoint: Option<&str>) -> Result<Telemetry> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let provider = otlp_endpoint.map(otlp_provider).transpose()?;
    let otel_layer = provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME)));

    let (json_layer, pretty_layer) = match format {
        LogFormat::Json => (
            Some(fmt::layer().json().with_current_span(true).with_span_list(false)),
            None,
        ),
        LogFormat::Pretty => (None, Some(fmt::layer().compact().with_target(true))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    if let Some(provider) = &provider {
        opentelemetry::global::set_tracer_provider(provider.clone());
    }
    Ok(Telemetry { provider })
}

fn otlp_provider(endpoint: &str) -> Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            SERVICE_NAME,
        )]))
        .build())
}
