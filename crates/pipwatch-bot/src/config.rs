//! Application configuration.
//!
//! One TOML file with a section per component, every field optional.
//! Environment variables prefixed `PIPWATCH_` override file values
//! (`PIPWATCH_ENGINE__CANDLE_POLL_MS=500` etc.).

use crate::error::{AppError, AppResult};
use config::{Config, Environment, File};
use pipwatch_engine::EngineConfig;
use pipwatch_exec::ExecConfig;
use pipwatch_exit::ExitConfig;
use pipwatch_oco::OcoConfig;
use pipwatch_signal::SignalConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub exit: ExitConfig,
    #[serde(default)]
    pub oco: OcoConfig,
    #[serde(default)]
    pub exec: ExecConfig,
}

impl AppConfig {
    /// Load configuration: file (if present) layered under
    /// `PIPWATCH_` environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut builder = Config::builder();
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path));
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
        }
        let settings = builder
            .add_source(Environment::with_prefix("PIPWATCH").separator("__"))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to load config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipwatch_core::Symbol;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.engine.symbols, vec![Symbol::from("EURUSD")]);
        assert_eq!(config.signal.n_ticks, 3);
        assert_eq!(config.exit.max_loss_money, dec!(10));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[exit]"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [engine]
            symbols = ["GBPUSD"]
            candle_poll_ms = 500

            [exit]
            buffer_pips = 3
            "#,
        )
        .unwrap();
        assert_eq!(parsed.engine.symbols, vec![Symbol::from("GBPUSD")]);
        assert_eq!(parsed.engine.candle_poll_ms, 500);
        assert_eq!(parsed.exit.buffer_pips, dec!(3));
        // Untouched sections fall back to defaults.
        assert_eq!(parsed.signal.n_ticks, 3);
    }
}
