use crate::TransferError;

/// Configuration for resource naming at runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub app_name: String,
    pub environment: String,
}

impl RuntimeConfig {
    /// Both APP_NAME and ENVIRONMENT are set on every Lambda by the deployment
    pub fn from_env() -> Result<Self, TransferError> {
        let app_name = std::env::var("APP_NAME")
            .map_err(|_| TransferError::ConfigurationError("APP_NAME not set".to_string()))?;

        let environment = std::env::var("ENVIRONMENT")
            .map_err(|_| TransferError::ConfigurationError("ENVIRONMENT not set".to_string()))?;

        Ok(Self {
            app_name,
            environment,
        })
    }

    /// Create a resource name following the {APP_NAME}-{ENVIRONMENT}-{RESOURCE_NAME} pattern
    pub fn resource_name(&self, resource_name: &str) -> String {
        format!("{}-{}-{}", self.app_name, self.environment, resource_name)
    }

    pub fn ses_template(&self, template_name: &str) -> String {
        self.resource_name(template_name)
    }
}

/// Read a required environment variable, falling back to a runtime-derived
/// resource name when APP_NAME/ENVIRONMENT are available.
pub fn env_or_resource(var: &str, resource: &str) -> Result<String, TransferError> {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            return Ok(value);
        }
    }

    match RuntimeConfig::from_env() {
        Ok(config) => {
            let name = config.resource_name(resource);
            tracing::warn!("{} not set, using derived name {}", var, name);
            Ok(name)
        }
        Err(_) => {
            tracing::error!("{} environment variable not set", var);
            Err(TransferError::ConfigurationError(format!("{} not set", var)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_naming() {
        let config = RuntimeConfig {
            app_name: "transfers".to_string(),
            environment: "test".to_string(),
        };

        assert_eq!(config.resource_name("main"), "transfers-test-main");
        assert_eq!(
            config.ses_template("booking-confirmation"),
            "transfers-test-booking-confirmation"
        );
    }
}
