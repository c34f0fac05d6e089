use std::time::Duration;

use anyhow::{Context, Result};

use crate::ingest::service::RetryPolicy;

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

/// Connection descriptor for the event stream source.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub stream_name: String,
    /// Subject filter fanning partitions into one sequence.
    pub subject_filter: String,
    /// Durable consumer group; partition ownership across process
    /// instances is the stream server's job.
    pub consumer_group: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub ingest_enabled: bool,
    /// `None` when `EVENT_STREAM_URL` is unset — ingestion will not start,
    /// but the process keeps running.
    pub stream: Option<StreamConfig>,
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    pub max_connect_retries: u32,
    /// Presence sweep interval in seconds.
    pub sweep_interval_secs: u64,
    /// Quiet period after which a device is considered inactive.
    pub offline_after_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            ingest_enabled: parse_bool(&optional("INGEST_ENABLED", "true"))
                .context("INGEST_ENABLED must be a boolean")?,
            stream: std::env::var("EVENT_STREAM_URL").ok().map(|url| StreamConfig {
                url,
                stream_name: optional("EVENT_STREAM_NAME", "telemetry"),
                subject_filter: optional("EVENT_SUBJECT_FILTER", "telemetry.>"),
                consumer_group: optional("CONSUMER_GROUP", "telemetry-ingest"),
            }),
            retry_base_delay_secs: optional("RETRY_BASE_DELAY_SECS", "5")
                .parse()
                .context("RETRY_BASE_DELAY_SECS must be a positive integer")?,
            retry_max_delay_secs: optional("RETRY_MAX_DELAY_SECS", "300")
                .parse()
                .context("RETRY_MAX_DELAY_SECS must be a positive integer")?,
            max_connect_retries: optional("MAX_CONNECT_RETRIES", "10")
                .parse()
                .context("MAX_CONNECT_RETRIES must be a positive integer")?,
            sweep_interval_secs: optional("SWEEP_INTERVAL_SECS", "60")
                .parse()
                .context("SWEEP_INTERVAL_SECS must be a positive integer")?,
            offline_after_secs: optional("OFFLINE_AFTER_SECS", "300")
                .parse()
                .context("OFFLINE_AFTER_SECS must be a positive integer")?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(self.retry_base_delay_secs),
            max_delay: Duration::from_secs(self.retry_max_delay_secs),
            max_retries: self.max_connect_retries,
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(anyhow::anyhow!("not a boolean: {other:?}")),
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(parse_bool("yes").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(!parse_bool(" no ").unwrap());
    }

    #[test]
    fn parse_bool_rejects_garbage() {
        assert!(parse_bool("enabled").is_err());
        assert!(parse_bool("").is_err());
    }
}
