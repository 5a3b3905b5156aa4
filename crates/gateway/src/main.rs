use common::{TelemetryGuard, setup_logging};
use gateway::{AppState, GatewayConfig, run_server};
use inference::{Classifier, OrtBackend};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env();

    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init("gateway", endpoint, config.environment)?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    tracing::info!(config = ?config, "Loaded configuration");

    let classifier = Classifier::<OrtBackend>::load(&config.inference);
    // Fatal when the loaded model rejects the configured input shape.
    classifier.verify()?;

    let state = AppState::new(Arc::new(classifier), config)?;
    run_server(state).await
}
