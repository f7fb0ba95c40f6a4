use clap::{Parser, ValueEnum};

use cdc_engine::config::{BridgeConfig, BrokerKind};
use cdc_engine::EngineError;

#[derive(Parser, Debug)]
#[command(name = "cdc-server", about = "Changefeed webhook to message broker bridge")]
pub struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long, env = "CDC_CONFIG")]
    pub config: Option<String>,

    /// Listen address, e.g. 0.0.0.0:13013.
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Seconds to wait for in-flight requests on shutdown.
    #[arg(long, value_name = "SECS")]
    pub grace_period: Option<u64>,

    /// Accepted sharedKey value. Repeat for several keys.
    #[arg(long = "shared-key", value_name = "KEY")]
    pub shared_keys: Vec<String>,

    /// Prepended to every topic name.
    #[arg(long)]
    pub topic_prefix: Option<String>,

    /// Mount point of the webhook endpoint.
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Broker implementation.
    #[arg(long, value_enum)]
    pub broker: Option<BrokerArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerArg {
    Memory,
    Dump,
}

impl From<BrokerArg> for BrokerKind {
    fn from(arg: BrokerArg) -> Self {
        match arg {
            BrokerArg::Memory => BrokerKind::Memory,
            BrokerArg::Dump => BrokerKind::Dump,
        }
    }
}

impl Cli {
    /// Load the file (if any) and apply command-line overrides on top.
    pub fn into_config(self) -> Result<BridgeConfig, EngineError> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!(config = %path, "loading configuration");
                BridgeConfig::load(path)?
            }
            None => BridgeConfig::default(),
        };

        if let Some(addr) = self.bind_addr {
            config.bind_addr = addr;
        }
        if let Some(secs) = self.grace_period {
            config.grace_period_secs = secs;
        }
        if !self.shared_keys.is_empty() {
            config.shared_keys = self.shared_keys;
        }
        if let Some(prefix) = self.topic_prefix {
            config.topic_prefix = prefix;
        }
        if let Some(prefix) = self.path_prefix {
            config.path_prefix = prefix;
        }
        if let Some(broker) = self.broker {
            config.broker.kind = broker.into();
        }

        config.validate()?;
        Ok(config)
    }
}
