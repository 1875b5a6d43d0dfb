use aws_sdk_ses::error::ProvideErrorMetadata;
use aws_sdk_ses::types::{Destination, MessageTag};
use aws_sdk_ses::Client as SesClient;
use std::collections::HashMap;

use crate::{
    is_valid_email, EmailRequest, EmailResponse, EmailTemplates, RuntimeConfig, TransferError,
    TransferResult,
};

fn tag(name: &str, value: &str) -> TransferResult<MessageTag> {
    MessageTag::builder()
        .name(name)
        .value(value)
        .build()
        .map_err(|e| TransferError::SESError(e.to_string()))
}

/// SES tag values allow only ASCII letters, digits, underscores and dashes
fn tag_value(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Sends SES templated email, resolving base template names to deployed ones
pub struct EmailService {
    client: SesClient,
    from_email: String,
    template_names: HashMap<String, String>,
}

impl EmailService {
    pub fn new(client: SesClient, from_email: String, template_names: HashMap<String, String>) -> Self {
        Self {
            client,
            from_email,
            template_names,
        }
    }

    /// Template names come from `*_TEMPLATE_NAME` variables, falling back to
    /// `{APP_NAME}-{ENVIRONMENT}-{template}` for any that are unset
    pub fn from_env(client: SesClient) -> TransferResult<Self> {
        let from_email = std::env::var("FROM_EMAIL")
            .map_err(|_| TransferError::ConfigurationError("FROM_EMAIL not set".to_string()))?;
        let runtime_config = RuntimeConfig::from_env().ok();

        let mut template_names = HashMap::new();
        for template in EmailTemplates::ALL {
            let resolved = std::env::var(EmailTemplates::env_var(template))
                .ok()
                .or_else(|| runtime_config.as_ref().map(|c| c.ses_template(template)));

            match resolved {
                Some(name) => {
                    template_names.insert(template.to_string(), name);
                }
                None => tracing::warn!("No SES template configured for {}", template),
            }
        }

        Ok(Self::new(client, from_email, template_names))
    }

    pub fn from_runtime_config(
        client: SesClient,
        from_email: String,
        runtime_config: &RuntimeConfig,
    ) -> Self {
        let template_names = EmailTemplates::ALL
            .iter()
            .map(|t| (t.to_string(), runtime_config.ses_template(t)))
            .collect();
        Self::new(client, from_email, template_names)
    }

    pub fn get_full_template_name(&self, base_template_name: &str) -> Option<&str> {
        self.template_names.get(base_template_name).map(String::as_str)
    }

    /// Requests that can never succeed are errors; SES rejections come back
    /// as an unsuccessful `EmailResponse` so the caller can decide on retry
    pub async fn send_templated_email(&self, request: &EmailRequest) -> TransferResult<EmailResponse> {
        if !is_valid_email(&request.recipient) {
            return Err(TransferError::ValidationError(format!(
                "Invalid email address: {}",
                request.recipient
            )));
        }

        let template_name = self
            .get_full_template_name(&request.template_name)
            .ok_or_else(|| {
                TransferError::ConfigurationError(format!(
                    "Template '{}' not configured",
                    request.template_name
                ))
            })?
            .to_string();

        let template_data = serde_json::to_string(&request.template_data)?;
        let destination = Destination::builder().to_addresses(&request.recipient).build();
        let from_address = request.from_address.as_deref().unwrap_or(&self.from_email);
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "unknown".to_string());

        let mut ses_request = self
            .client
            .send_templated_email()
            .source(from_address)
            .destination(destination)
            .template(&template_name)
            .template_data(template_data)
            .tags(tag("Environment", &tag_value(&environment))?)
            .tags(tag("TemplateType", &tag_value(&request.template_name))?)
            .tags(tag("Priority", &format!("{:?}", request.priority))?);

        if let Some(reply_to) = &request.reply_to {
            ses_request = ses_request.reply_to_addresses(reply_to);
        }

        tracing::info!("Sending SES templated email - Template: {}", template_name);

        match ses_request.send().await {
            Ok(result) => {
                let message_id = result.message_id().to_string();
                tracing::info!(
                    "SES email sent - Message ID: {}, Template: {}",
                    message_id,
                    template_name
                );
                Ok(EmailResponse {
                    message_id,
                    success: true,
                    error: None,
                })
            }
            Err(err) => {
                let code = err.code().unwrap_or("Unknown").to_string();
                let message = err.message().unwrap_or("No error message provided").to_string();
                tracing::error!(
                    "SES send failed - Template: {}, Code: {}, Message: {}",
                    template_name,
                    code,
                    message
                );

                if code == "TemplateDoesNotExist" {
                    tracing::error!(
                        "Template '{}' (base '{}') is missing from SES",
                        template_name,
                        request.template_name
                    );
                }

                Ok(EmailResponse {
                    message_id: String::new(),
                    success: false,
                    error: Some(format!("SES Error [{}]: {}", code, message)),
                })
            }
        }
    }
}
