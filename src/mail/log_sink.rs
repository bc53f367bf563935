use async_trait::async_trait;
use log::info;

use super::{ MailError, Mailer };
use crate::models::contact::ContactSubmission;

/// Writes submissions to the process log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, submission: &ContactSubmission) -> Result<(), MailError> {
        info!(
            "Contact form submission: name={:?}, email={:?}, message={:?}",
            submission.name,
            submission.email,
            submission.message
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
