//! Stock Common - Shared configuration, logging and error types for the stock scrape services.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and request context helpers
//! - Utility functions used across the services

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    Config, NetworkConfig, ObservabilityConfig, ScrapeConfig, SearchStrategy, ServicesConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
