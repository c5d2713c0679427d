//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Convert the first error into a `ConfigError`, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_retry(config, &mut result);
        Self::validate_worker(config, &mut result);
        Self::validate_queues(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_retry(config: &Config, result: &mut ValidationResult) {
        let retry = &config.retry;

        if retry.initial_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "retry.initial_interval_ms",
                "initial_interval_ms must be greater than 0",
            ));
        }

        if retry.maximum_interval_ms < retry.initial_interval_ms {
            result.add_error(ValidationError::new(
                "retry.maximum_interval_ms",
                "maximum_interval_ms must not be lower than initial_interval_ms",
            ));
        }

        if retry.backoff_coefficient < 1.0 {
            result.add_error(ValidationError::new(
                "retry.backoff_coefficient",
                "backoff_coefficient must be at least 1.0",
            ));
        }

        if retry.start_to_close_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "retry.start_to_close_timeout_secs",
                "start_to_close_timeout_secs must be greater than 0",
            ));
        }

        if retry.maximum_attempts == 0 {
            result.add_warning(ValidationWarning::new(
                "retry.maximum_attempts",
                "maximum_attempts is 0, failing activities will be retried forever",
            ));
        }

        if let Some(budget) = retry.schedule_to_close_timeout_secs {
            if budget < retry.start_to_close_timeout_secs {
                result.add_warning(ValidationWarning::new(
                    "retry.schedule_to_close_timeout_secs",
                    "schedule_to_close_timeout_secs is shorter than a single attempt",
                ));
            }
        }
    }

    fn validate_worker(config: &Config, result: &mut ValidationResult) {
        if config.worker.max_concurrent_runs == 0 {
            result.add_error(ValidationError::new(
                "worker.max_concurrent_runs",
                "max_concurrent_runs must be greater than 0",
            ));
        }

        if config.worker.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "worker.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }

        // A claim that expires before one attempt can finish lets another worker steal the run.
        if config.store.claim_lease_secs <= config.retry.start_to_close_timeout_secs {
            result.add_warning(ValidationWarning::new(
                "store.claim_lease_secs",
                "claim_lease_secs should exceed start_to_close_timeout_secs",
            ));
        }
    }

    fn validate_queues(config: &Config, result: &mut ValidationResult) {
        if config.queues.order.trim().is_empty() {
            result.add_error(ValidationError::new("queues.order", "Queue name cannot be empty"));
        }

        if config.queues.invoice.trim().is_empty() {
            result.add_error(ValidationError::new(
                "queues.invoice",
                "Queue name cannot be empty",
            ));
        }

        if config.queues.order == config.queues.invoice {
            result.add_warning(ValidationWarning::new(
                "queues",
                "order and invoice workflows share a task queue",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
