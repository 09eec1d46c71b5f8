//! Configuration validation for the stock scrape services.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{Config, ObservabilityConfig, ScrapeConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.scrape.validate() {
            errors.push(e);
        }

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Err(e) = self.check_ports() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    fn check_ports(&self) -> ValidationResult<()> {
        let ports = [
            (self.scrape_port(), "services.scrape.port"),
            (self.legacy_port(), "services.legacy.port"),
        ];

        for (port, field) in ports {
            if port == 0 {
                return Err(ValidationError::InvalidPort {
                    port,
                    field: field.into(),
                });
            }
        }

        if ports[0].0 == ports[1].0 {
            return Err(ValidationError::Conflict {
                reason: format!(
                    "Port {} is used by both {} and {}",
                    ports[0].0, ports[0].1, ports[1].1
                ),
            });
        }

        Ok(())
    }
}

impl Validate for ScrapeConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(reason) = self.search_strategy() {
            errors.push(ValidationError::InvalidValue {
                field: "scrape.search_mode".into(),
                reason,
            });
        }

        let urls = [
            ("scrape.finance_search_url", &self.finance_search_url),
            ("scrape.finance_site_base", &self.finance_site_base),
            ("scrape.web_search_url", &self.web_search_url),
            ("scrape.engine_url", &self.engine_url),
            ("scrape.sibling_scrape_url", &self.sibling_scrape_url),
        ];
        for (field, value) in urls {
            if let Err(e) = validate_http_url(field, value) {
                errors.push(e);
            }
        }
        if let Some(ref billing_url) = self.billing_url {
            if let Err(e) = validate_http_url("scrape.billing_url", billing_url) {
                errors.push(e);
            }
        }

        if self.target_domain.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "scrape.target_domain".into(),
            });
        }

        if self.output_dir.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "scrape.output_dir".into(),
            });
        }

        let positives = [
            ("scrape.finance_search_timeout_ms", self.finance_search_timeout_ms),
            ("scrape.default_timeout_ms", self.default_timeout_ms),
            ("scrape.engine_poll_interval_ms", self.engine_poll_interval_ms),
            ("scrape.web_search_limit", self.web_search_limit as u64),
        ];
        for (field, value) in positives {
            if value == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: "must be greater than 0".into(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> ValidationResult<()> {
    let parsed = url::Url::parse(value).map_err(|e| ValidationError::InvalidValue {
        field: field.into(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_search_mode_rejected() {
        let mut config = Config::default();
        config.scrape.search_mode = "bing".into();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidValue { ref field, .. } if field == "scrape.search_mode"
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut scrape = ScrapeConfig::default();
        scrape.default_timeout_ms = 0;
        assert!(scrape.validate().is_err());
    }

    #[test]
    fn test_bad_url_rejected() {
        let mut scrape = ScrapeConfig::default();
        scrape.engine_url = "ftp://engine".into();
        scrape.billing_url = Some("not a url".into());

        let err = scrape.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Multiple(ref errs) if errs.len() == 2));
    }

    #[test]
    fn test_port_conflict() {
        let mut config = Config::default();
        config.services.scrape.port = Some(3003);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Conflict { .. }));
    }

    #[test]
    fn test_observability_validation() {
        let mut obs = ObservabilityConfig::default();
        assert!(obs.validate().is_ok());

        obs.log_level = "verbose".into();
        assert!(obs.validate().is_err());

        obs.log_level = "debug".into();
        obs.log_format = "xml".into();
        assert!(obs.validate().is_err());
    }
}
