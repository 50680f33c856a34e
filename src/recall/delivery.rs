// src/recall/delivery.rs

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::audit::{AuditEvent, AuditSink};
use crate::{
    error::TransportError,
    transport::{EmailTransport, SmsContext, SmsTransport},
};

/// One outbound send for one recall. Transport errors are audited and turned
/// into `false`; nothing escapes this boundary.
pub struct DeliveryAttempt<'a> {
    pub recall_id: Uuid,
    pub audit: &'a dyn AuditSink,
}

impl DeliveryAttempt<'_> {
    pub async fn email(
        &self,
        transport: &dyn EmailTransport,
        to: &str,
        subject: &str,
        body: &str,
    ) -> bool {
        let result = transport.send(to, subject, body).await;
        self.finish("email", result)
    }

    pub async fn sms(
        &self,
        transport: &dyn SmsTransport,
        to: &str,
        body: &str,
        ctx: SmsContext,
    ) -> bool {
        let result = transport.send(to, body, ctx).await;
        self.finish("sms", result)
    }

    fn finish(&self, channel: &'static str, result: Result<(), TransportError>) -> bool {
        match result {
            Ok(()) => {
                info!(recall_id = %self.recall_id, channel, "recall delivered");
                true
            }
            Err(e) => {
                warn!(recall_id = %self.recall_id, channel, "recall delivery failed: {e}");
                self.audit.record(AuditEvent::new(
                    "recall.delivery_failed",
                    json!({
                        "recall_id": self.recall_id,
                        "channel": channel,
                        "error": e.to_string(),
                    }),
                ));
                false
            }
        }
    }
}
