//! Recall dispatch: find due reminders, contact the patient on the channels
//! the rule asks for, and close each recall as contacted or skipped.
//!
//! BatchRunner → RecallDispatcher → ChannelPolicy → DeliveryAttempt(s) → status write

pub mod audit;
pub mod batch;
pub mod delivery;
pub mod dispatcher;
pub mod policy;
pub mod store;

#[cfg(test)]
pub mod test_support;
