use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue};
use axum_extra::TypedHeader;
use headers::{Authorization, Header, authorization::Bearer};

use crate::auth::secrets_match;
use crate::error::ApiError;
use crate::models::AppState;

static CRON_SECRET: HeaderName = HeaderName::from_static("x-cron-secret");

/// `x-cron-secret: <secret>`
#[derive(Debug, Clone)]
pub struct CronSecret(pub String);

impl Header for CronSecret {
    fn name() -> &'static HeaderName {
        &CRON_SECRET
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let s = value.to_str().map_err(|_| headers::Error::invalid())?;
        Ok(CronSecret(s.trim().to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(v) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(v));
        }
    }
}

/// Proof that the caller may start a recall pass.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    /// false only in the explicit permissive mode (no secret configured).
    pub authenticated: bool,
}

impl FromRequestParts<AppState> for CronTrigger {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // x-cron-secret first, then Authorization: Bearer <secret>
            let provided = match TypedHeader::<CronSecret>::from_request_parts(parts, state).await {
                Ok(TypedHeader(CronSecret(s))) => Some(s),
                Err(_) => TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                    .await
                    .ok()
                    .map(|TypedHeader(authz)| authz.token().to_string()),
            };

            match (state.trigger.secret.as_deref(), provided) {
                (Some(expected), Some(p)) if secrets_match(&p, expected) => {
                    Ok(CronTrigger { authenticated: true })
                }
                (Some(_), _) => {
                    tracing::warn!("recall trigger rejected: bad or missing secret");
                    Err(ApiError::trigger_rejected())
                }
                (None, _) if state.trigger.allow_unauthenticated => {
                    Ok(CronTrigger {
                        authenticated: false,
                    })
                }
                (None, _) => {
                    tracing::warn!("recall trigger rejected: no secret configured");
                    Err(ApiError::trigger_rejected())
                }
            }
        }
    }
}
