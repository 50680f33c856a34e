// src/recall/audit.rs

use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::{error, warn};

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub context: JsonValue,
}

impl AuditEvent {
    pub fn new(event: &'static str, context: JsonValue) -> Self {
        Self { event, context }
    }
}

/// Fire-and-forget sink for operator-visible failures. `record` must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        warn!(event = event.event, context = %event.context, "audit");
    }
}

/// Logs like [`TracingAuditSink`] and persists to `audit_event` on a detached task.
pub struct PgAuditSink {
    db: PgPool,
}

impl PgAuditSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl AuditSink for PgAuditSink {
    fn record(&self, event: AuditEvent) {
        TracingAuditSink.record(event.clone());

        let db = self.db.clone();
        tokio::spawn(async move {
            let res = sqlx::query(
                r#"
                INSERT INTO audit_event (event, context, created_at)
                VALUES ($1, $2::jsonb, now())
                "#,
            )
            .bind(event.event)
            .bind(event.context.to_string())
            .execute(&db)
            .await;

            if let Err(e) = res {
                error!(event = event.event, "audit insert failed: {e}");
            }
        });
    }
}
