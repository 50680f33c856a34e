// src/transport/sms.rs

use async_trait::async_trait;
use tracing::debug;

use super::{SmsContext, SmsTransport, check_response};
use crate::{config::SmsConfig, error::TransportError};

/// Twilio-style gateway: form POST with HTTP basic auth (account sid / token).
pub struct HttpSmsTransport {
    cfg: SmsConfig,
    http_client: reqwest::Client,
}

impl HttpSmsTransport {
    pub fn new(cfg: SmsConfig, http_client: reqwest::Client) -> Self {
        Self { cfg, http_client }
    }
}

#[async_trait]
impl SmsTransport for HttpSmsTransport {
    async fn send(&self, to: &str, body: &str, ctx: SmsContext) -> Result<(), TransportError> {
        let form = [("From", self.cfg.from.as_str()), ("To", to), ("Body", body)];

        let response = self
            .http_client
            .post(&self.cfg.api_url)
            .basic_auth(&self.cfg.account_sid, Some(&self.cfg.auth_token))
            .form(&form)
            .send()
            .await?;

        check_response(response).await?;
        debug!(patient_id = %ctx.patient_id, "sms accepted by gateway");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{
        Form, Router,
        extract::State,
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        routing::post,
    };
    use uuid::Uuid;

    use super::*;
    use crate::transport::{http_client, serve};

    type Seen = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    fn transport(base: &str) -> HttpSmsTransport {
        let cfg = SmsConfig {
            api_url: format!("{base}/Messages.json"),
            account_sid: "AC123".into(),
            auth_token: "tok".into(),
            from: "+390212345678".into(),
        };
        HttpSmsTransport::new(cfg, http_client(Duration::from_secs(5)).unwrap())
    }

    fn ctx() -> SmsContext {
        SmsContext {
            patient_id: Uuid::new_v4(),
        }
    }

    async fn accept(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> StatusCode {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        seen.lock().unwrap().push((auth, form));
        StatusCode::CREATED
    }

    #[tokio::test]
    async fn test_send_posts_form_with_basic_auth() {
        let seen = Seen::default();
        let app = Router::new()
            .route("/Messages.json", post(accept))
            .with_state(seen.clone());
        let base = serve(app).await;

        transport(&base)
            .send("+393331234567", "Gentile Maria, promemoria per Igiene.", ctx())
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (auth, form) = &seen[0];
        // base64("AC123:tok")
        assert_eq!(auth, "Basic QUMxMjM6dG9r");
        assert_eq!(form["From"], "+390212345678");
        assert_eq!(form["To"], "+393331234567");
        assert_eq!(form["Body"], "Gentile Maria, promemoria per Igiene.");
        assert_eq!(form.len(), 3);
    }

    #[tokio::test]
    async fn test_gateway_error_is_rejected() {
        let app = Router::new().route(
            "/Messages.json",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "invalid number") }),
        );
        let base = serve(app).await;

        let err = transport(&base)
            .send("+393331234567", "b", ctx())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransportError::Rejected { status: 500, ref body } if body == "invalid number"
        ));
    }
}
