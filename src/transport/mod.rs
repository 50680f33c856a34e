use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::TransportError;

pub mod email;
pub mod sms;

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), TransportError>;
}

/// Extra context handed to the SMS provider alongside the message.
#[derive(Debug, Clone, Copy)]
pub struct SmsContext {
    pub patient_id: Uuid,
}

#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, to: &str, body: &str, ctx: SmsContext) -> Result<(), TransportError>;
}

/// Stand-in for a channel with no provider configured; every send fails.
pub struct UnconfiguredTransport(pub &'static str);

#[async_trait]
impl EmailTransport for UnconfiguredTransport {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured(self.0))
    }
}

#[async_trait]
impl SmsTransport for UnconfiguredTransport {
    async fn send(&self, _to: &str, _body: &str, _ctx: SmsContext) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured(self.0))
    }
}

/// Shared HTTP client; the timeout applies to every provider call.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn check_response(response: reqwest::Response) -> Result<(), TransportError> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Rejected { status, body })
}

/// Serve `app` on an ephemeral local port and return its base url.
#[cfg(test)]
pub(crate) async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}
