// In-memory collaborators for dispatcher, batch and route tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use super::audit::{AuditEvent, AuditSink};
use super::store::RecallStore;
use crate::{
    error::{StoreError, TransportError},
    models::{DueRecall, PatientContact, RecallRule, RecallStatus},
    transport::{EmailTransport, SmsContext, SmsTransport},
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn due_recall(channel: Option<&str>, email: Option<&str>, phone: Option<&str>) -> DueRecall {
    DueRecall {
        recall_id: Uuid::new_v4(),
        due_at: t0() - Duration::days(1),
        status: RecallStatus::Pending,
        last_contact_at: None,
        patient: PatientContact {
            patient_id: Uuid::new_v4(),
            first_name: Some("Luca".into()),
            last_name: Some("Bianchi".into()),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
        },
        rule: RecallRule {
            rule_id: Uuid::new_v4(),
            channel: channel.map(str::to_string),
            service_type: Some("Igiene".into()),
            email_subject: None,
            message: None,
        },
    }
}

/* -------------------------
   Store
--------------------------*/

struct Entry {
    recall: DueRecall,
    claimed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Entry>>,
    failing: Mutex<HashSet<Uuid>>,
    claim_calls: AtomicUsize,
    terminal_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn with(recalls: Vec<DueRecall>) -> Self {
        let entries = recalls
            .into_iter()
            .map(|recall| Entry {
                recall,
                claimed_at: None,
            })
            .collect();
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn fail_writes_for(&self, recall_id: Uuid) {
        self.failing.lock().unwrap().insert(recall_id);
    }

    pub fn mark_claimed(&self, recall_id: Uuid, at: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap();
        let e = entries
            .iter_mut()
            .find(|e| e.recall.recall_id == recall_id)
            .unwrap();
        e.recall.status = RecallStatus::InProgress;
        e.claimed_at = Some(at);
    }

    pub fn status_of(&self, recall_id: Uuid) -> RecallStatus {
        self.find(recall_id, |e| e.recall.status)
    }

    pub fn last_contact_of(&self, recall_id: Uuid) -> Option<DateTime<Utc>> {
        self.find(recall_id, |e| e.recall.last_contact_at)
    }

    pub fn claimed_at_of(&self, recall_id: Uuid) -> Option<DateTime<Utc>> {
        self.find(recall_id, |e| e.claimed_at)
    }

    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    pub fn terminal_writes(&self) -> usize {
        self.terminal_writes.load(Ordering::SeqCst)
    }

    fn find<T>(&self, recall_id: Uuid, f: impl Fn(&Entry) -> T) -> T {
        let entries = self.entries.lock().unwrap();
        f(entries.iter().find(|e| e.recall.recall_id == recall_id).unwrap())
    }
}

#[async_trait]
impl RecallStore for MemoryStore {
    async fn claim_due_recalls(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<DueRecall>, StoreError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        let stale_before = now - lease;

        let mut entries = self.entries.lock().unwrap();
        let mut selectable: Vec<&mut Entry> = entries
            .iter_mut()
            .filter(|e| e.recall.due_at <= now)
            .filter(|e| match e.recall.status {
                RecallStatus::Pending => true,
                RecallStatus::InProgress => e.claimed_at.is_some_and(|at| at < stale_before),
                _ => false,
            })
            .collect();
        selectable.sort_by_key(|e| e.claimed_at);

        Ok(selectable
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|e| {
                e.recall.status = RecallStatus::InProgress;
                e.claimed_at = Some(now);
                e.recall.clone()
            })
            .collect())
    }

    async fn renew_claim(
        &self,
        recall_id: Uuid,
        claimed_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let Some(e) = entries
            .iter_mut()
            .find(|e| e.recall.recall_id == recall_id)
            .filter(|e| e.recall.status == RecallStatus::InProgress)
            .filter(|e| e.claimed_at == Some(claimed_at))
        else {
            return Ok(false);
        };
        e.claimed_at = Some(at);
        Ok(true)
    }

    async fn complete_recall(
        &self,
        recall_id: Uuid,
        status: RecallStatus,
        last_contact_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::NotTerminal(status));
        }
        if self.failing.lock().unwrap().contains(&recall_id) {
            return Err(StoreError::Db(sqlx::Error::PoolTimedOut));
        }

        let mut entries = self.entries.lock().unwrap();
        let e = entries
            .iter_mut()
            .find(|e| e.recall.recall_id == recall_id)
            .filter(|e| !e.recall.status.is_terminal())
            .ok_or(StoreError::NotClaimable(recall_id))?;
        e.recall.status = status;
        e.recall.last_contact_at = Some(last_contact_at);
        self.terminal_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release_recall(&self, recall_id: Uuid) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(e) = entries
            .iter_mut()
            .find(|e| e.recall.recall_id == recall_id)
            .filter(|e| e.recall.status == RecallStatus::InProgress)
        {
            e.recall.status = RecallStatus::Pending;
        }
        Ok(())
    }
}

/* -------------------------
   Transports
--------------------------*/

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct SentSms {
    pub to: String,
    pub body: String,
    pub patient_id: Uuid,
}

pub struct StubEmail {
    fail: bool,
    sent: Mutex<Vec<SentEmail>>,
}

impl StubEmail {
    pub fn ok() -> Self {
        Self {
            fail: false,
            sent: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(vec![]),
        }
    }

    /// Every call, including the ones that failed.
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for StubEmail {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        });
        if self.fail {
            return Err(TransportError::Rejected {
                status: 502,
                body: "upstream down".into(),
            });
        }
        Ok(())
    }
}

pub struct StubSms {
    fail: bool,
    sent: Mutex<Vec<SentSms>>,
}

impl StubSms {
    pub fn ok() -> Self {
        Self {
            fail: false,
            sent: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(vec![]),
        }
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsTransport for StubSms {
    async fn send(&self, to: &str, body: &str, ctx: SmsContext) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(SentSms {
            to: to.into(),
            body: body.into(),
            patient_id: ctx.patient_id,
        });
        if self.fail {
            return Err(TransportError::NotConfigured("sms"));
        }
        Ok(())
    }
}

/* -------------------------
   Audit
--------------------------*/

#[derive(Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}
