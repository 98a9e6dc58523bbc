use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Demo configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Store name used to prefix diagnostic lines.
    pub store_name: String,
    /// Attach a logger to the store. Without one the store logs nothing.
    pub diagnostics: bool,
    /// Simulated latency of the item source.
    pub fetch_delay: Duration,
    /// How long the rendered view keeps its upstream after the last observer.
    pub projection_stop: Duration,
}

impl DemoConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            store_name: std::env::var("SWITCHBOARD_NAME").unwrap_or_else(|_| "demo".to_string()),
            diagnostics: parse_or(
                "SWITCHBOARD_DIAGNOSTICS",
                std::env::var("SWITCHBOARD_DIAGNOSTICS").ok(),
                true,
            )?,
            fetch_delay: Duration::from_millis(parse_or(
                "SWITCHBOARD_FETCH_DELAY_MS",
                std::env::var("SWITCHBOARD_FETCH_DELAY_MS").ok(),
                250,
            )?),
            projection_stop: Duration::from_millis(parse_or(
                "SWITCHBOARD_PROJECTION_STOP_MS",
                std::env::var("SWITCHBOARD_PROJECTION_STOP_MS").ok(),
                5_000,
            )?),
        };

        config.log_values();
        Ok(config)
    }

    fn log_values(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  SWITCHBOARD_NAME: {}", self.store_name);
        tracing::info!("  SWITCHBOARD_DIAGNOSTICS: {}", self.diagnostics);
        tracing::info!("  SWITCHBOARD_FETCH_DELAY_MS: {}", self.fetch_delay.as_millis());
        tracing::info!(
            "  SWITCHBOARD_PROJECTION_STOP_MS: {}",
            self.projection_stop.as_millis()
        );
    }
}

/// Parse `raw` if set, otherwise fall back to `default`.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {value:?}")),
        _ => Ok(default),
    }
}
