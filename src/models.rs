use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recall::batch::BatchRunner;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<BatchRunner>,
    pub trigger: TriggerAuth,
    pub batch_size: i64,
}

/// How the cron trigger is authenticated.
#[derive(Clone, Debug)]
pub struct TriggerAuth {
    pub secret: Option<String>,
    /// Only consulted when `secret` is `None`.
    pub allow_unauthenticated: bool,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Recalls selected by the scan; this is the pass result.
    pub processed: usize,
    pub contacted: usize,
    pub skipped: usize,
    pub untouched: usize,
    pub write_failures: usize,
    /// Recalls another pass took over before this one reached them.
    pub lost_claims: usize,
}

/* -------------------------
   Domain
--------------------------*/

/// recall.status (smallint):
/// 0 pending, 1 contacted, 2 skipped, 3 in progress (claimed by a pass)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum RecallStatus {
    Pending = 0,
    Contacted = 1,
    Skipped = 2,
    InProgress = 3,
}

impl RecallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecallStatus::Contacted | RecallStatus::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    Email,
    Sms,
    Both,
    None,
}

impl Channel {
    /// recall_rule.channel is free text edited by staff; anything we do not
    /// recognise behaves as EMAIL.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Channel::Email;
        };
        match raw.trim().to_ascii_uppercase().as_str() {
            "SMS" => Channel::Sms,
            "BOTH" => Channel::Both,
            "NONE" | "OFF" | "DISABLED" => Channel::None,
            _ => Channel::Email,
        }
    }

    pub fn wants_email(self) -> bool {
        matches!(self, Channel::Email | Channel::Both)
    }

    pub fn wants_sms(self) -> bool {
        matches!(self, Channel::Sms | Channel::Both)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallRule {
    pub rule_id: Uuid,
    pub channel: Option<String>,
    pub service_type: Option<String>,
    pub email_subject: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientContact {
    pub patient_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A recall selected by the scan, with the patient and rule it needs.
#[derive(Debug, Clone, Serialize)]
pub struct DueRecall {
    pub recall_id: Uuid,
    pub due_at: DateTime<Utc>,
    pub status: RecallStatus,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub patient: PatientContact,
    pub rule: RecallRule,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct DueRecallRow {
    pub recall_id: Uuid,
    pub due_at: DateTime<Utc>,
    pub status: RecallStatus,
    pub last_contact_at: Option<DateTime<Utc>>,

    pub patient_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,

    pub rule_id: Uuid,
    pub channel: Option<String>,
    pub service_type: Option<String>,
    pub email_subject: Option<String>,
    pub message: Option<String>,
}

impl From<DueRecallRow> for DueRecall {
    fn from(r: DueRecallRow) -> Self {
        DueRecall {
            recall_id: r.recall_id,
            due_at: r.due_at,
            status: r.status,
            last_contact_at: r.last_contact_at,
            patient: PatientContact {
                patient_id: r.patient_id,
                first_name: r.first_name,
                last_name: r.last_name,
                email: r.email,
                phone: r.phone_number,
            },
            rule: RecallRule {
                rule_id: r.rule_id,
                channel: r.channel,
                service_type: r.service_type,
                email_subject: r.email_subject,
                message: r.message,
            },
        }
    }
}

/* -------------------------
   Helpers
--------------------------*/

/// Trimmed value, with blank strings treated as missing.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
