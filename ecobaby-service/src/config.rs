use cry_flow::AnalysisSettings;
use std::{net::SocketAddr, time::Duration};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Pretty,
    #[default]
    Json,
}

/// Service settings, read once from the environment at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub bind_addr: String,
    pub log_format: LogFormat,
    pub urgent_delay: Duration,
    pub detailed_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let analysis = AnalysisSettings::default();
        Self {
            port: DEFAULT_PORT,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_format: LogFormat::default(),
            urgent_delay: analysis.urgent_latency,
            detailed_delay: analysis.detailed_latency,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.log_format = match format.as_str() {
                "pretty" => LogFormat::Pretty,
                _ => LogFormat::Json,
            };
        }
        if let Some(ms) = lookup("URGENT_ANALYSIS_DELAY_MS") {
            config.urgent_delay = Duration::from_millis(parse("URGENT_ANALYSIS_DELAY_MS", &ms)?);
        }
        if let Some(ms) = lookup("DETAILED_ANALYSIS_DELAY_MS") {
            config.detailed_delay =
                Duration::from_millis(parse("DETAILED_ANALYSIS_DELAY_MS", &ms)?);
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.bind_addr, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            var: "BIND_ADDR",
            value: self.bind_addr.clone(),
        })
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            urgent_latency: self.urgent_delay,
            detailed_latency: self.detailed_delay,
        }
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
        assert_eq!(config.analysis_settings(), AnalysisSettings::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("BIND_ADDR", "127.0.0.1"),
            ("LOG_FORMAT", "pretty"),
            ("URGENT_ANALYSIS_DELAY_MS", "10"),
            ("DETAILED_ANALYSIS_DELAY_MS", "20"),
        ]))
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
        let settings = config.analysis_settings();
        assert_eq!(settings.urgent_latency, Duration::from_millis(10));
        assert_eq!(settings.detailed_latency, Duration::from_millis(20));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "PORT",
                value: "eighty".to_string()
            }
        );
    }
}
