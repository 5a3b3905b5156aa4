use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt,
};

pub(crate) type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// Uses RUST_LOG environment variable for filtering (defaults to "info" if not set).
/// Spans are bridged to OpenTelemetry, which is a no-op until a tracer provider
/// is installed (see [`crate::TelemetryGuard`]).
pub fn setup_logging(environment: Environment) {
    install_subscriber(environment, tracing_opentelemetry::layer());
}

pub(crate) fn install_subscriber<L>(environment: Environment, otel_layer: L)
where
    L: Layer<FilteredRegistry> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    // A subscriber may already be set (tests, embedding binaries); keep the first one.
    let result = match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init(),
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already initialized: {e}");
    }
}
