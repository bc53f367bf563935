use async_trait::async_trait;
use log::{ info, error };
use reqwest::Client as HttpClient;
use serde::Serialize;

use super::{ MailError, Mailer };
use crate::models::contact::ContactSubmission;

#[derive(Debug, Clone)]
pub struct EmailJsConfig {
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub private_key: Option<String>,
    pub to_email: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: TemplateParams<'a>,
}

#[derive(Serialize)]
struct TemplateParams<'a> {
    from_name: &'a str,
    from_email: &'a str,
    message: &'a str,
    to_email: &'a str,
}

/// Relays submissions through the EmailJS REST API.
pub struct EmailJsMailer {
    http: HttpClient,
    config: EmailJsConfig,
}

impl EmailJsMailer {
    pub fn new(config: EmailJsConfig) -> Self {
        Self { http: HttpClient::new(), config }
    }
}

#[async_trait]
impl Mailer for EmailJsMailer {
    async fn send(&self, submission: &ContactSubmission) -> Result<(), MailError> {
        let req = SendRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            access_token: self.config.private_key.as_deref(),
            template_params: TemplateParams {
                from_name: &submission.name,
                from_email: &submission.email,
                message: &submission.message,
                to_email: &self.config.to_email,
            },
        };

        let resp = self.http.post(&self.config.endpoint).json(&req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("EmailJS rejected submission ({}): {}", status, body);
            return Err(MailError::Rejected { status: status.as_u16(), body });
        }

        info!("Contact submission from {:?} relayed via EmailJS", submission.email);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "emailjs"
    }
}
