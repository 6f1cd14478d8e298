// src/config.rs - Target server, timing and seeding configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ConformanceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub timing: TimingConfig,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the API under test
    pub url: String,
    pub admin_user: String,
    pub admin_password: String,
    /// Per-request timeout (in seconds)
    pub request_timeout_seconds: u64,
    /// `limit` query parameter appended to every GET
    pub page_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Pause after each fixture create so the search index catches up (in milliseconds)
    pub index_settle_ms: u64,
    /// Pause after the visibility graph is built (in milliseconds)
    pub visibility_settle_ms: u64,
    /// Attempts made by the retry helper
    pub retry_attempts: u32,
    /// Delay between retry attempts (in milliseconds)
    pub retry_delay_ms: u64,
    /// Upper bound for a single case (in seconds)
    pub case_timeout_seconds: u64,
    /// Delete leftover public containers before the visibility suites
    pub purge_public_containers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    pub mongodb_uri: String,
    pub database: String,
}

/// Detailed validation result with specific error information
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub success: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub error_type: String,
    pub message: String,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub recommendation: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                url: "http://localhost:8000".to_string(),
                admin_user: "root".to_string(),
                admin_password: "Root123".to_string(),
                request_timeout_seconds: 30,
                page_limit: 1000,
            },
            timing: TimingConfig {
                index_settle_ms: 1000,
                visibility_settle_ms: 2000,
                retry_attempts: 10,
                retry_delay_ms: 1000,
                case_timeout_seconds: 120,
                purge_public_containers: true,
            },
            seed: SeedConfig {
                mongodb_uri: "mongodb://localhost:27017".to_string(),
                database: "ocl".to_string(),
            },
        }
    }
}

/// Parse `var` into `target` if set, recording a message on failure
fn parse_var<T>(var: &str, target: &mut T, parse_errors: &mut Vec<String>)
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(var) {
        match raw.parse::<T>() {
            Ok(value) => {
                debug!("Found {}: {:?}", var, value);
                *target = value;
            }
            Err(e) => {
                parse_errors.push(format!("Invalid {} '{}': {}", var, raw, e));
            }
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let start_time = std::time::Instant::now();
        let mut config = Config::default();
        let mut parse_errors = Vec::new();

        debug!("Loading configuration from environment variables");

        // Server
        if let Ok(url) = std::env::var("OCL_API_URL") {
            debug!("Found OCL_API_URL: {}", url);
            config.server.url = url;
        }

        if let Ok(user) = std::env::var("OCL_ADMIN_USER") {
            debug!("Found OCL_ADMIN_USER: {}", user);
            config.server.admin_user = user;
        }

        if let Ok(password) = std::env::var("OCL_ADMIN_PASSWORD") {
            debug!("Found OCL_ADMIN_PASSWORD (redacted)");
            config.server.admin_password = password;
        }

        parse_var("OCL_REQUEST_TIMEOUT", &mut config.server.request_timeout_seconds, &mut parse_errors);
        parse_var("OCL_PAGE_LIMIT", &mut config.server.page_limit, &mut parse_errors);

        // Timing
        parse_var("OCL_INDEX_SETTLE_MS", &mut config.timing.index_settle_ms, &mut parse_errors);
        parse_var("OCL_VISIBILITY_SETTLE_MS", &mut config.timing.visibility_settle_ms, &mut parse_errors);
        parse_var("OCL_RETRY_ATTEMPTS", &mut config.timing.retry_attempts, &mut parse_errors);
        parse_var("OCL_RETRY_DELAY_MS", &mut config.timing.retry_delay_ms, &mut parse_errors);
        parse_var("OCL_CASE_TIMEOUT", &mut config.timing.case_timeout_seconds, &mut parse_errors);
        parse_var(
            "OCL_PURGE_PUBLIC_CONTAINERS",
            &mut config.timing.purge_public_containers,
            &mut parse_errors,
        );

        // Seeding
        if let Ok(uri) = std::env::var("OCL_MONGODB_URI") {
            debug!("Found OCL_MONGODB_URI");
            config.seed.mongodb_uri = uri;
        }

        if let Ok(database) = std::env::var("OCL_MONGODB_DATABASE") {
            debug!("Found OCL_MONGODB_DATABASE: {}", database);
            config.seed.database = database;
        }

        let load_duration = start_time.elapsed();

        if !parse_errors.is_empty() {
            let error_msg = format!(
                "Configuration parsing failed after {:.3}s with {} errors: {}",
                load_duration.as_secs_f64(),
                parse_errors.len(),
                parse_errors.join(", ")
            );
            return Err(ConformanceError::Configuration(error_msg).into());
        }

        info!(
            server = %config.server.url,
            admin = %config.server.admin_user,
            index_settle_ms = config.timing.index_settle_ms,
            "Configuration loaded from environment in {:.3}s",
            load_duration.as_secs_f64()
        );

        Ok(config)
    }

    /// Validate configuration, logging warnings
    pub fn validate(&self) -> Result<()> {
        let validation_result = self.validate_detailed();

        if !validation_result.success {
            let error_messages: Vec<String> = validation_result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();

            return Err(anyhow::anyhow!(
                "Configuration validation failed: {}",
                error_messages.join(", ")
            ));
        }

        for warning in &validation_result.warnings {
            warn!(
                "Configuration warning for {}: {}{}",
                warning.field,
                warning.message,
                warning
                    .recommendation
                    .as_ref()
                    .map(|r| format!(" (Recommendation: {})", r))
                    .unwrap_or_default()
            );
        }

        Ok(())
    }

    pub fn validate_detailed(&self) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match url::Url::parse(&self.server.url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(parsed) => {
                errors.push(ValidationError {
                    field: "server.url".to_string(),
                    error_type: "unsupported_scheme".to_string(),
                    message: format!("Unsupported URL scheme: {}", parsed.scheme()),
                    suggested_fix: Some("Use an http:// or https:// URL".to_string()),
                });
            }
            Err(e) => {
                errors.push(ValidationError {
                    field: "server.url".to_string(),
                    error_type: "invalid_url".to_string(),
                    message: format!("Invalid server URL '{}': {}", self.server.url, e),
                    suggested_fix: Some("Set OCL_API_URL to e.g. http://localhost:8000".to_string()),
                });
            }
        }

        if self.server.admin_user.trim().is_empty() {
            errors.push(ValidationError {
                field: "server.admin_user".to_string(),
                error_type: "empty_value".to_string(),
                message: "Admin user cannot be empty".to_string(),
                suggested_fix: Some("Set OCL_ADMIN_USER".to_string()),
            });
        }

        if self.server.page_limit == 0 {
            errors.push(ValidationError {
                field: "server.page_limit".to_string(),
                error_type: "invalid_range".to_string(),
                message: "Page limit must be at least 1".to_string(),
                suggested_fix: Some("Use the default of 1000".to_string()),
            });
        }

        if self.timing.retry_attempts == 0 {
            errors.push(ValidationError {
                field: "timing.retry_attempts".to_string(),
                error_type: "invalid_range".to_string(),
                message: "Retry helper needs at least one attempt".to_string(),
                suggested_fix: Some("Set OCL_RETRY_ATTEMPTS to 1 or more".to_string()),
            });
        }

        if self.timing.index_settle_ms < 250 {
            warnings.push(ValidationWarning {
                field: "timing.index_settle_ms".to_string(),
                message: "Short index settle delay may make listing checks flaky".to_string(),
                recommendation: Some("Consider at least 1000ms against a real search index".to_string()),
            });
        }

        if self.timing.visibility_settle_ms < self.timing.index_settle_ms {
            warnings.push(ValidationWarning {
                field: "timing.visibility_settle_ms".to_string(),
                message: "Visibility settle delay is shorter than the per-create delay".to_string(),
                recommendation: None,
            });
        }

        if !self.seed.mongodb_uri.contains("localhost") && !self.seed.mongodb_uri.contains("127.0.0.1") {
            warnings.push(ValidationWarning {
                field: "seed.mongodb_uri".to_string(),
                message: "Seeding target is not local; the perf profile wipes collections".to_string(),
                recommendation: Some("Double-check OCL_MONGODB_URI before seeding".to_string()),
            });
        }

        ValidationResult {
            success: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            server_url: self.server.url.clone(),
            admin_user: self.server.admin_user.clone(),
            page_limit: self.server.page_limit,
            index_settle_ms: self.timing.index_settle_ms,
            retry_attempts: self.timing.retry_attempts,
            purge_public_containers: self.timing.purge_public_containers,
            seed_database: self.seed.database.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    pub fn index_settle(&self) -> Duration {
        Duration::from_millis(self.timing.index_settle_ms)
    }

    pub fn visibility_settle(&self) -> Duration {
        Duration::from_millis(self.timing.visibility_settle_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.timing.retry_delay_ms)
    }

    pub fn case_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.case_timeout_seconds)
    }
}

/// Configuration summary for logging; never carries the admin password
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub server_url: String,
    pub admin_user: String,
    pub page_limit: u32,
    pub index_settle_ms: u64,
    pub retry_attempts: u32,
    pub purge_public_containers: bool,
    pub seed_database: String,
}
