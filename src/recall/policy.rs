// src/recall/policy.rs

use crate::models::{Channel, PatientContact, RecallRule, present};

/// Which channels to try for a recall, and what to say on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub wants_email: bool,
    pub wants_sms: bool,
    pub subject: String,
    pub body: String,
}

impl ChannelPolicy {
    pub fn resolve(rule: &RecallRule, patient: &PatientContact) -> Self {
        let channel = Channel::parse(rule.channel.as_deref());
        let service_type = present(rule.service_type.as_deref());

        let subject = match (present(rule.email_subject.as_deref()), service_type) {
            (Some(s), _) => s.to_string(),
            (None, Some(service)) => format!("Promemoria {service}"),
            (None, None) => "Promemoria".to_string(),
        };

        let body = match present(rule.message.as_deref()) {
            Some(m) => m.to_string(),
            None => {
                let name = present(patient.first_name.as_deref())
                    .or_else(|| present(patient.last_name.as_deref()))
                    .unwrap_or("paziente");
                match service_type {
                    Some(service) => format!("Gentile {name}, promemoria per {service}."),
                    None => format!("Gentile {name}, promemoria."),
                }
            }
        };

        Self {
            wants_email: channel.wants_email(),
            wants_sms: channel.wants_sms(),
            subject,
            body,
        }
    }

    pub fn wants_any(&self) -> bool {
        self.wants_email || self.wants_sms
    }
}
