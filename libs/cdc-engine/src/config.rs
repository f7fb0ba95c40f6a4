use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Root configuration, parsed from TOML and overridable from the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Listen address of the webhook endpoint.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Mount point of the ingest endpoint, e.g. `/v1`.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// How long shutdown waits for in-flight requests.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Accepted `sharedKey` values. Empty disables the check.
    #[serde(default)]
    pub shared_keys: Vec<String>,

    /// Prepended to every topic name taken from a request path.
    #[serde(default)]
    pub topic_prefix: String,

    /// Longest accepted body line in bytes (0 = unlimited).
    #[serde(default)]
    pub max_line_bytes: usize,

    #[serde(default)]
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// Keep messages in process memory.
    #[default]
    Memory,
    /// Like `memory`, and log every message.
    Dump,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub kind: BrokerKind,

    /// Ring size per topic for the in-process broker.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Simulated acknowledgement latency of the in-process broker.
    #[serde(default)]
    pub ack_delay_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:13013".to_string()
}

fn default_path_prefix() -> String {
    "/v1".to_string()
}

fn default_grace_period_secs() -> u64 {
    30
}

fn default_max_records() -> usize {
    100_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            max_records: default_max_records(),
            ack_delay_ms: 0,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            path_prefix: default_path_prefix(),
            grace_period_secs: default_grace_period_secs(),
            shared_keys: Vec::new(),
            topic_prefix: String::new(),
            max_line_bytes: 0,
            broker: BrokerConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.bind_addr.trim().is_empty() {
            return Err(EngineError::Config("bind_addr must not be empty".into()));
        }
        if !self.path_prefix.is_empty() && !self.path_prefix.starts_with('/') {
            return Err(EngineError::Config(format!(
                "path_prefix '{}' must start with '/'",
                self.path_prefix
            )));
        }
        if self.path_prefix.contains(['{', '}', '*']) {
            return Err(EngineError::Config(format!(
                "path_prefix '{}' must be a literal path",
                self.path_prefix
            )));
        }
        if self.shared_keys.iter().any(|k| k.is_empty()) {
            return Err(EngineError::Config("shared_keys must not contain empty values".into()));
        }
        if self.broker.max_records == 0 {
            return Err(EngineError::Config("broker.max_records must be positive".into()));
        }
        Ok(())
    }

    /// Path prefix without trailing slashes (`/v1/` → `/v1`, `/` → ``).
    pub fn mount_prefix(&self) -> &str {
        self.path_prefix.trim_end_matches('/')
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn ack_delay(&self) -> Duration {
        Duration::from_millis(self.broker.ack_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = BridgeConfig::parse("").unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:13013");
        assert_eq!(config.mount_prefix(), "/v1");
        assert_eq!(config.grace_period(), Duration::from_secs(30));
        assert!(config.shared_keys.is_empty());
        assert_eq!(config.broker.kind, BrokerKind::Memory);
        assert_eq!(config.broker.max_records, 100_000);
    }

    #[test]
    fn full_document() {
        let config = BridgeConfig::parse(
            r#"
            bind_addr = "127.0.0.1:9000"
            path_prefix = "/ingest/"
            grace_period_secs = 5
            shared_keys = ["abc", "def"]
            topic_prefix = "cdc-"
            max_line_bytes = 1024

            [broker]
            kind = "dump"
            max_records = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.mount_prefix(), "/ingest");
        assert_eq!(config.shared_keys, vec!["abc", "def"]);
        assert_eq!(config.topic_prefix, "cdc-");
        assert_eq!(config.max_line_bytes, 1024);
        assert_eq!(config.broker.kind, BrokerKind::Dump);
        assert_eq!(config.broker.max_records, 10);
    }

    #[test]
    fn root_prefix_mounts_at_root() {
        let config = BridgeConfig {
            path_prefix: "/".into(),
            ..BridgeConfig::default()
        };
        assert_eq!(config.mount_prefix(), "");
        config.validate().unwrap();
    }

    #[test]
    fn rejects_invalid_values() {
        let bad = [
            r#"bind_addr = """#,
            r#"path_prefix = "v1""#,
            r#"path_prefix = "/v1/{*x}""#,
            r#"shared_keys = ["ok", ""]"#,
            "[broker]\nmax_records = 0",
            r#"[broker]
kind = "pubsub""#,
        ];
        for doc in bad {
            let err = BridgeConfig::parse(doc).unwrap_err();
            assert!(matches!(err, EngineError::Config(_)), "{doc}: {err}");
        }
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = BridgeConfig::load("/nonexistent/cdc.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cdc.toml"));
    }
}
