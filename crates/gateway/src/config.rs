use common::{env_or, env_string};
use inference::InferenceConfig;
use std::path::PathBuf;

pub use common::Environment;

/// 10 MiB, enough for any single MRI slice export.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub addr: String,
    /// Where `/upload` keeps images for display and later reports.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// OTLP collector; telemetry export is off when unset.
    pub otel_endpoint: Option<String>,
    pub inference: InferenceConfig,
}

impl GatewayConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        Self {
            environment: Environment::from_env(),
            addr: env_string("GATEWAY_ADDR", "0.0.0.0:8000"),
            upload_dir: PathBuf::from(env_string("GATEWAY_UPLOAD_DIR", "static/uploads")),
            max_upload_bytes: env_or("GATEWAY_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            otel_endpoint: std::env::var("OTEL_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            inference: InferenceConfig::from_env(),
        }
    }

    /// Create default configuration for testing
    pub fn test_default(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            environment: Environment::Development,
            addr: "127.0.0.1:0".to_string(),
            upload_dir: upload_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            otel_endpoint: None,
            inference: InferenceConfig::test_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn from_env_uses_defaults() {
        unsafe {
            env::remove_var("GATEWAY_ADDR");
            env::remove_var("GATEWAY_UPLOAD_DIR");
            env::remove_var("GATEWAY_MAX_UPLOAD_BYTES");
            env::remove_var("OTEL_ENDPOINT");
        }

        let config = GatewayConfig::from_env();
        assert_eq!(config.addr, "0.0.0.0:8000");
        assert_eq!(config.upload_dir, PathBuf::from("static/uploads"));
        assert_eq!(config.max_upload_bytes, 10_485_760);
        assert!(config.otel_endpoint.is_none());
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        unsafe {
            env::set_var("GATEWAY_ADDR", "127.0.0.1:9000");
            env::set_var("GATEWAY_MAX_UPLOAD_BYTES", "2048");
            env::set_var("OTEL_ENDPOINT", "http://collector:4317");
        }

        let config = GatewayConfig::from_env();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.otel_endpoint.as_deref(), Some("http://collector:4317"));

        unsafe {
            env::remove_var("GATEWAY_ADDR");
            env::remove_var("GATEWAY_MAX_UPLOAD_BYTES");
            env::remove_var("OTEL_ENDPOINT");
        }
    }

    #[test]
    #[serial]
    fn blank_otel_endpoint_disables_export() {
        unsafe { env::set_var("OTEL_ENDPOINT", "  ") };
        assert!(GatewayConfig::from_env().otel_endpoint.is_none());
        unsafe { env::remove_var("OTEL_ENDPOINT") };
    }
}
