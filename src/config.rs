use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub cron_secret: Option<String>,
    /// Accept the trigger without a header when `CRON_SECRET` is unset.
    /// Off unless explicitly enabled.
    pub allow_unauthenticated_trigger: bool,
    pub batch_size: i64,
    pub dispatch_concurrency: usize,
    /// Never shorter than the longest a pass can take, see [`effective_claim_lease`].
    pub claim_lease: chrono::Duration,
    pub transport_timeout_secs: u64,
    pub email: Option<EmailConfig>,
    pub sms: Option<SmsConfig>,
    pub audit_to_db: bool,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub api_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let cron_secret = non_empty_var("CRON_SECRET");
        let allow_unauthenticated_trigger = flag_var("RECALL_TRIGGER_ALLOW_UNAUTHENTICATED", false);

        let batch_size = parsed_var::<i64>("RECALL_BATCH_SIZE")
            .filter(|n| *n > 0)
            .unwrap_or(50);
        let dispatch_concurrency = parsed_var::<usize>("RECALL_DISPATCH_CONCURRENCY")
            .filter(|n| *n > 0)
            .unwrap_or(1);
        let claim_lease_secs = parsed_var::<i64>("RECALL_CLAIM_LEASE_SECS")
            .filter(|n| *n > 0)
            .unwrap_or(900);
        let transport_timeout_secs = parsed_var::<u64>("TRANSPORT_TIMEOUT_SECS")
            .filter(|n| *n > 0)
            .unwrap_or(10);
        let claim_lease = effective_claim_lease(
            claim_lease_secs,
            batch_size,
            dispatch_concurrency,
            transport_timeout_secs,
        )?;

        let email = match (
            non_empty_var("EMAIL_API_URL"),
            non_empty_var("EMAIL_API_KEY"),
            non_empty_var("EMAIL_FROM"),
        ) {
            (Some(api_url), Some(api_key), Some(from)) => Some(EmailConfig {
                api_url,
                api_key,
                from,
            }),
            _ => None,
        };

        let sms = match (
            non_empty_var("SMS_API_URL"),
            non_empty_var("SMS_ACCOUNT_SID"),
            non_empty_var("SMS_AUTH_TOKEN"),
            non_empty_var("SMS_FROM"),
        ) {
            (Some(api_url), Some(account_sid), Some(auth_token), Some(from)) => Some(SmsConfig {
                api_url,
                account_sid,
                auth_token,
                from,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            cron_secret,
            allow_unauthenticated_trigger,
            batch_size,
            dispatch_concurrency,
            claim_lease,
            transport_timeout_secs,
            email,
            sms,
            audit_to_db: flag_var("AUDIT_TO_DB", true),
        })
    }
}

/// Slack added on top of the worst-case pass duration.
const CLAIM_LEASE_MARGIN_SECS: i64 = 60;

/// The claim lease actually used: the configured value, raised to at least the
/// worst-case length of one pass (every recall sends on both channels and each
/// send runs to the transport timeout). A shorter lease would let a later
/// trigger re-claim recalls the running pass has not reached yet.
pub fn effective_claim_lease(
    configured_secs: i64,
    batch_size: i64,
    concurrency: usize,
    transport_timeout_secs: u64,
) -> anyhow::Result<chrono::Duration> {
    let concurrency = i64::try_from(concurrency.max(1))?;
    let batch_size = batch_size.max(1);
    let rounds = batch_size / concurrency + i64::from(batch_size % concurrency != 0);
    let timeout = i64::try_from(transport_timeout_secs)?;

    let floor_secs = rounds
        .checked_mul(2)
        .and_then(|n| n.checked_mul(timeout))
        .and_then(|n| n.checked_add(CLAIM_LEASE_MARGIN_SECS))
        .ok_or_else(|| anyhow::anyhow!("claim lease floor overflows"))?;

    let secs = configured_secs.max(floor_secs);
    chrono::Duration::try_seconds(secs)
        .ok_or_else(|| anyhow::anyhow!("RECALL_CLAIM_LEASE_SECS out of range: {secs}"))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn flag_var(key: &str, default: bool) -> bool {
    match non_empty_var(key) {
        Some(v) => parse_flag(&v).unwrap_or(default),
        None => default,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
