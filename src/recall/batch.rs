// src/recall/batch.rs

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use futures::{StreamExt, stream};
use serde_json::json;
use tracing::{error, info, warn};

use super::{
    audit::AuditEvent,
    dispatcher::{DispatchOutcome, RecallDispatcher},
    store::RecallStore,
};
use crate::{
    error::StoreError,
    models::{BatchReport, DueRecall},
};

/// One bounded pass over due, pending recalls.
pub struct BatchRunner {
    store: Arc<dyn RecallStore>,
    dispatcher: RecallDispatcher,
    concurrency: usize,
    claim_lease: Duration,
}

impl BatchRunner {
    pub fn new(
        store: Arc<dyn RecallStore>,
        dispatcher: RecallDispatcher,
        concurrency: usize,
        claim_lease: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            concurrency: concurrency.max(1),
            claim_lease,
        }
    }

    /// Claim at most `limit` recalls due at `now` and dispatch each of them.
    ///
    /// Only the initial scan can fail the pass. A failed status write is
    /// logged, audited and counted, and the remaining recalls still run.
    pub async fn run(&self, now: DateTime<Utc>, limit: i64) -> Result<BatchReport, StoreError> {
        let due = self
            .store
            .claim_due_recalls(now, limit, self.claim_lease)
            .await?;

        let mut report = BatchReport {
            processed: due.len(),
            ..BatchReport::default()
        };
        if due.is_empty() {
            info!("recall pass: nothing due");
            return Ok(report);
        }

        let started = Instant::now();
        let due = &due;
        let results: Vec<_> = stream::iter(0..due.len())
            .map(|i| async move {
                let recall = &due[i];
                let at = now + elapsed_since(started);
                (recall.recall_id, self.process(recall, now, at).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (recall_id, result) in results {
            match result {
                Ok(Some(DispatchOutcome::Delivered)) => report.contacted += 1,
                Ok(Some(DispatchOutcome::Failed)) => report.skipped += 1,
                Ok(Some(DispatchOutcome::NotAttempted)) => report.untouched += 1,
                Ok(None) => report.lost_claims += 1,
                Err(e) => {
                    report.write_failures += 1;
                    error!(%recall_id, "recall status write failed: {e}");
                    self.dispatcher.audit().record(AuditEvent::new(
                        "recall.status_write_failed",
                        json!({ "recall_id": recall_id, "error": e.to_string() }),
                    ));
                }
            }
        }

        info!(
            processed = report.processed,
            contacted = report.contacted,
            skipped = report.skipped,
            untouched = report.untouched,
            write_failures = report.write_failures,
            lost_claims = report.lost_claims,
            "recall pass finished"
        );
        Ok(report)
    }

    /// Dispatch one recall claimed at `claimed_at`, first moving the claim to
    /// `at` so its lease counts from the moment sending starts. `None` when
    /// another pass re-claimed the recall in the meantime; nothing is sent.
    async fn process(
        &self,
        recall: &DueRecall,
        claimed_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Option<DispatchOutcome>, StoreError> {
        if !self
            .store
            .renew_claim(recall.recall_id, claimed_at, at)
            .await?
        {
            warn!(recall_id = %recall.recall_id, "recall claim lost to a later pass");
            return Ok(None);
        }

        self.dispatcher.dispatch(recall, at).await.map(Some)
    }
}

fn elapsed_since(started: Instant) -> Duration {
    Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero())
}
