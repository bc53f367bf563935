mod emailjs;
mod log_sink;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::cli::{ Args, mask_secret };
use crate::models::contact::ContactSubmission;

pub use emailjs::{ EmailJsConfig, EmailJsMailer };
pub use log_sink::LogMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider rejected the message ({status}): {body}")]
    Rejected {
        status: u16,
        body: String,
    },
    #[error("mail provider is not configured: {0}")]
    Config(String),
}

/// Delivery target for contact-form submissions. One call, one attempt.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, submission: &ContactSubmission) -> Result<(), MailError>;

    fn name(&self) -> &'static str;
}

pub fn create_mailer(args: &Args, default_recipient: &str) -> Result<Arc<dyn Mailer>, MailError> {
    match args.mail_type.to_lowercase().as_str() {
        "log" => Ok(Arc::new(LogMailer)),
        "emailjs" => {
            let required = |value: &Option<String>, name: &str| {
                value
                    .clone()
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| MailError::Config(format!("{} is required for emailjs", name)))
            };
            let config = EmailJsConfig {
                endpoint: args.emailjs_base_url.clone(),
                service_id: required(&args.emailjs_service_id, "EMAILJS_SERVICE_ID")?,
                template_id: required(&args.emailjs_template_id, "EMAILJS_TEMPLATE_ID")?,
                public_key: required(&args.emailjs_public_key, "EMAILJS_PUBLIC_KEY")?,
                private_key: args.emailjs_private_key.clone().filter(|k| !k.trim().is_empty()),
                to_email: args.contact_to_email.clone().unwrap_or_else(|| default_recipient.to_string()),
            };
            info!(
                "EmailJS relay configured: service={}, template={}, public_key={}, private_key={}",
                config.service_id,
                config.template_id,
                mask_secret(&config.public_key),
                config.private_key.as_deref().map(mask_secret).unwrap_or_else(|| "<unset>".to_string())
            );
            Ok(Arc::new(EmailJsMailer::new(config)))
        }
        other => Err(MailError::Config(format!("Unsupported mail type: {}", other))),
    }
}
