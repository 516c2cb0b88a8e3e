//! Document server configuration.

use std::net::SocketAddr;

use thiserror::Error;

pub const ADDR_VAR: &str = "CLINICA_DOCS_ADDR";
pub const CLINIC_NAME_VAR: &str = "CLINICA_NAME";

pub const DEFAULT_ADDR: &str = "0.0.0.0:3001";
pub const DEFAULT_CLINIC_NAME: &str = "Clínica";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a socket address like 0.0.0.0:3001, got {value:?}")]
    InvalidAddr { var: &'static str, value: String },
}

/// Server settings resolved at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct DocsConfig {
    addr: SocketAddr,
    clinic_name: String,
}

impl DocsConfig {
    pub fn new(addr: SocketAddr, clinic_name: impl Into<String>) -> Self {
        let clinic_name = clinic_name.into();
        let clinic_name = if clinic_name.trim().is_empty() {
            DEFAULT_CLINIC_NAME.to_string()
        } else {
            clinic_name.trim().to_string()
        };
        Self { addr, clinic_name }
    }

    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup(ADDR_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw.parse().map_err(|_| ConfigError::InvalidAddr {
            var: ADDR_VAR,
            value: raw.clone(),
        })?;
        let clinic_name = lookup(CLINIC_NAME_VAR).unwrap_or_default();
        Ok(Self::new(addr, clinic_name))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Name printed in document headers.
    pub fn clinic_name(&self) -> &str {
        &self.clinic_name
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 3001)), DEFAULT_CLINIC_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        assert_eq!(DocsConfig::from_lookup(|_| None).unwrap(), DocsConfig::default());

        let config = DocsConfig::from_lookup(|key| match key {
            ADDR_VAR => Some("127.0.0.1:8080".into()),
            CLINIC_NAME_VAR => Some(" Clínica Vale Verde ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.addr().port(), 8080);
        assert_eq!(config.clinic_name(), "Clínica Vale Verde");
    }

    #[test]
    fn test_invalid_addr() {
        assert!(matches!(
            DocsConfig::from_lookup(|key| (key == ADDR_VAR).then(|| "localhost".to_string())),
            Err(ConfigError::InvalidAddr { .. })
        ));
    }
}
