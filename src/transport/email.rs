// src/transport/email.rs

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{EmailTransport, check_response};
use crate::{config::EmailConfig, error::TransportError};

/// Transactional mail API: JSON POST authenticated with a bearer key.
pub struct HttpEmailTransport {
    cfg: EmailConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl HttpEmailTransport {
    pub fn new(cfg: EmailConfig, http_client: reqwest::Client) -> Self {
        Self { cfg, http_client }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        let payload = OutgoingEmail {
            from: &self.cfg.from,
            to: [to],
            subject,
            text: body,
        };

        let response = self
            .http_client
            .post(&self.cfg.api_url)
            .bearer_auth(&self.cfg.api_key)
            .json(&payload)
            .send()
            .await?;

        check_response(response).await?;
        debug!("email accepted by provider");
        Ok(())
    }
}
