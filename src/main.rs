mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod recall;
mod routes;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    models::{AppState, TriggerAuth},
    recall::{
        audit::{AuditSink, PgAuditSink, TracingAuditSink},
        batch::BatchRunner,
        dispatcher::RecallDispatcher,
        store::{PgRecallStore, RecallStore},
    },
    transport::{
        EmailTransport, SmsTransport, UnconfiguredTransport, email::HttpEmailTransport,
        sms::HttpSmsTransport,
    },
};

use tower_http::trace::TraceLayer;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;

    if cfg.cron_secret.is_none() {
        if cfg.allow_unauthenticated_trigger {
            tracing::warn!("CRON_SECRET unset: recall trigger accepts unauthenticated calls");
        } else {
            tracing::warn!("CRON_SECRET unset: recall trigger will reject every call");
        }
    }

    let http = transport::http_client(Duration::from_secs(cfg.transport_timeout_secs))?;

    let email: Arc<dyn EmailTransport> = match cfg.email.clone() {
        Some(c) => Arc::new(HttpEmailTransport::new(c, http.clone())),
        None => {
            tracing::warn!("email transport not configured; email recalls will be skipped");
            Arc::new(UnconfiguredTransport("email"))
        }
    };
    let sms: Arc<dyn SmsTransport> = match cfg.sms.clone() {
        Some(c) => Arc::new(HttpSmsTransport::new(c, http.clone())),
        None => {
            tracing::warn!("sms transport not configured; sms recalls will be skipped");
            Arc::new(UnconfiguredTransport("sms"))
        }
    };
    let audit: Arc<dyn AuditSink> = if cfg.audit_to_db {
        Arc::new(PgAuditSink::new(pool.clone()))
    } else {
        Arc::new(TracingAuditSink)
    };

    let store: Arc<dyn RecallStore> = Arc::new(PgRecallStore::new(pool));
    let dispatcher = RecallDispatcher::new(store.clone(), email, sms, audit);
    let runner = BatchRunner::new(
        store,
        dispatcher,
        cfg.dispatch_concurrency,
        cfg.claim_lease,
    );

    let state = AppState {
        runner: Arc::new(runner),
        trigger: TriggerAuth {
            secret: cfg.cron_secret.clone(),
            allow_unauthenticated: cfg.allow_unauthenticated_trigger,
        },
        batch_size: cfg.batch_size,
    };

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
