// src/recall/dispatcher.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::{
    audit::AuditSink,
    delivery::DeliveryAttempt,
    policy::ChannelPolicy,
    store::RecallStore,
};
use crate::{
    error::StoreError,
    models::{DueRecall, RecallStatus, present},
    transport::{EmailTransport, SmsContext, SmsTransport},
};

/// What happened to one recall in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The rule asked for no channel at all; the recall stays pending.
    NotAttempted,
    /// At least one channel delivered.
    Delivered,
    /// Channels were wanted but none delivered (failure or no destination).
    Failed,
}

impl DispatchOutcome {
    pub fn next_status(self) -> Option<RecallStatus> {
        match self {
            DispatchOutcome::NotAttempted => None,
            DispatchOutcome::Delivered => Some(RecallStatus::Contacted),
            DispatchOutcome::Failed => Some(RecallStatus::Skipped),
        }
    }
}

pub struct RecallDispatcher {
    store: Arc<dyn RecallStore>,
    email: Arc<dyn EmailTransport>,
    sms: Arc<dyn SmsTransport>,
    audit: Arc<dyn AuditSink>,
}

impl RecallDispatcher {
    pub fn new(
        store: Arc<dyn RecallStore>,
        email: Arc<dyn EmailTransport>,
        sms: Arc<dyn SmsTransport>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            email,
            sms,
            audit,
        }
    }

    pub fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    /// Run the delivery attempts for one recall without touching the store.
    /// Email goes first; an email failure never stops the SMS attempt.
    pub async fn deliver(&self, recall: &DueRecall) -> DispatchOutcome {
        let policy = ChannelPolicy::resolve(&recall.rule, &recall.patient);
        let attempt = DeliveryAttempt {
            recall_id: recall.recall_id,
            audit: self.audit.as_ref(),
        };

        let mut attempted = false;
        let mut delivered = false;

        if policy.wants_email {
            attempted = true;
            match present(recall.patient.email.as_deref()) {
                Some(to) => {
                    delivered |= attempt
                        .email(self.email.as_ref(), to, &policy.subject, &policy.body)
                        .await;
                }
                None => debug!(recall_id = %recall.recall_id, "no email on file"),
            }
        }

        if policy.wants_sms {
            attempted = true;
            match present(recall.patient.phone.as_deref()) {
                Some(to) => {
                    let ctx = SmsContext {
                        patient_id: recall.patient.patient_id,
                    };
                    delivered |= attempt.sms(self.sms.as_ref(), to, &policy.body, ctx).await;
                }
                None => debug!(recall_id = %recall.recall_id, "no phone on file"),
            }
        }

        match (attempted, delivered) {
            (false, _) => DispatchOutcome::NotAttempted,
            (true, true) => DispatchOutcome::Delivered,
            (true, false) => DispatchOutcome::Failed,
        }
    }

    /// Deliver and write the resulting status.
    #[instrument(skip_all, fields(recall_id = %recall.recall_id))]
    pub async fn dispatch(
        &self,
        recall: &DueRecall,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, StoreError> {
        let outcome = self.deliver(recall).await;

        match outcome.next_status() {
            Some(status) => {
                self.store
                    .complete_recall(recall.recall_id, status, now)
                    .await?;
                info!(?status, "recall closed");
            }
            None => {
                self.store.release_recall(recall.recall_id).await?;
                info!("rule resolves to no channel; recall left pending");
            }
        }

        Ok(outcome)
    }
}
