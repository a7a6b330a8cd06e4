// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::consensus::{
    ConsensusMethod, DEFAULT_APP_ID, DEFAULT_MSG_TIMEOUT_MS, DEFAULT_RATE_MAX_MS,
    DEFAULT_RATE_MIN_MS,
};
use config::{Config, ConfigError, File};
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, metadata, File as FsFile};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use struct_field_names_as_array::FieldNamesAsArray;

const ENV_PREFIX: &str = "dltree";

#[derive(Debug)]
pub enum SettingsErr {
    Config(ConfigError),

    /// Defaults could not be flattened into config sources
    Defaults(String),

    /// An address could not be parsed
    InvalidAddr(String),

    /// Production delay range is inverted
    InvalidRate { min_ms: u64, max_ms: u64 },

    /// Message timeout must be positive
    InvalidTimeout,

    InvalidDevnet(&'static str),
}

impl From<ConfigError> for SettingsErr {
    fn from(other: ConfigError) -> Self {
        Self::Config(other)
    }
}

impl fmt::Display for SettingsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Defaults(err) => write!(f, "could not load defaults: {err}"),
            Self::InvalidAddr(addr) => write!(f, "invalid address: {addr}"),
            Self::InvalidRate { min_ms, max_ms } => {
                write!(f, "invalid production rate [{min_ms}, {max_ms}]")
            }
            Self::InvalidTimeout => f.write_str("message timeout must be positive"),
            Self::InvalidDevnet(reason) => write!(f, "invalid devnet settings: {reason}"),
        }
    }
}

impl std::error::Error for SettingsErr {}

#[derive(Debug, Serialize, Deserialize, Default, FieldNamesAsArray)]
pub struct Settings {
    /// Network settings.
    pub network: Network,

    /// Node settings.
    pub node: Node,

    /// Consensus settings.
    pub consensus: ConsensusSettings,

    /// In-process devnet settings.
    pub devnet: Devnet,
}

impl Settings {
    /// Loads settings from `<config dir>/dltree/config.toml` and `DLTREE_*`
    /// environment variables. The file is created with defaults if missing.
    pub fn new() -> Result<Self, SettingsErr> {
        let config_path = dirs::config_dir().map(|mut path| {
            path.push("dltree");
            path.push("config.toml");
            path
        });

        if let Some(path) = config_path.as_ref() {
            if metadata(path).is_err() {
                write_default_config(path);
            }
        }

        Self::load(config_path, std::env::vars().collect())
    }

    /// Builds settings from defaults, an optional file and the given
    /// environment, in increasing order of precedence.
    pub fn load(
        config_path: Option<PathBuf>,
        env_source: Vec<(String, String)>,
    ) -> Result<Self, SettingsErr> {
        let mut s = Config::builder();

        if let Some(path) = config_path {
            s = s.add_source(File::from(path).required(false));
        }

        // Set defaults
        let default_settings = Settings::default();
        let defaults: HashMap<String, HashMap<String, DynamicConfVal>> =
            serde_yaml::to_value(&default_settings)
                .and_then(serde_yaml::from_value)
                .map_err(|err| SettingsErr::Defaults(err.to_string()))?;

        for (k1, inner) in &defaults {
            for (k2, v) in inner {
                match v {
                    DynamicConfVal::String(v) => {
                        s = s.set_default(format!("{k1}.{k2}"), v.as_str())?;
                    }

                    DynamicConfVal::Bool(v) => {
                        s = s.set_default(format!("{k1}.{k2}"), v.to_string())?;
                    }

                    DynamicConfVal::U64(v) => {
                        s = s.set_default(format!("{k1}.{k2}"), v.to_string())?;
                    }

                    DynamicConfVal::Sequence(v) => {
                        s = s.set_default(format!("{k1}.{k2}"), v.clone())?;
                    }

                    DynamicConfVal::Option(v) => {
                        if let Some(v) = v {
                            s = s.set_default(format!("{k1}.{k2}"), v.as_str())?;
                        }
                    }
                }
            }
        }

        // Make sure to list these in order
        let settings_modules: Vec<_> = vec![
            Network::FIELD_NAMES_AS_ARRAY,
            Node::FIELD_NAMES_AS_ARRAY,
            ConsensusSettings::FIELD_NAMES_AS_ARRAY,
            Devnet::FIELD_NAMES_AS_ARRAY,
        ];

        // Gather all possible settings keys
        let possible_keys: HashMap<String, (&str, &str)> = Settings::FIELD_NAMES_AS_ARRAY
            .iter()
            .zip(settings_modules.iter())
            .flat_map(|(field, nested_fields)| {
                nested_fields.iter().map(move |nested| {
                    (
                        format!("{}_{}_{}", ENV_PREFIX, field, nested.replace('_', "")),
                        (*field, *nested),
                    )
                })
            })
            .collect();

        // Parse env vars manually and set overrides if they exist as the
        // config package `Environment` module seems to behave poorly.
        for (k, v) in env_source.iter() {
            let Some((section, key)) = possible_keys.get(&k.to_lowercase()) else {
                continue;
            };

            // Filter empty values
            if v.is_empty() {
                continue;
            }

            let path = format!("{section}.{key}");
            let is_sequence = matches!(
                defaults.get(*section).and_then(|inner| inner.get(*key)),
                Some(DynamicConfVal::Sequence(_))
            );

            if is_sequence {
                let items: Vec<String> = v.split(',').map(|i| i.trim().to_owned()).collect();
                s = s.set_override(path, items)?;
            } else {
                s = s.set_override(path, v.as_str())?;
            }
        }

        Ok(s.build()?.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), SettingsErr> {
        if self.network.msg_timeout_ms == 0 {
            return Err(SettingsErr::InvalidTimeout);
        }

        self.network.listen()?;
        self.network.peer_addrs()?;

        if self.consensus.rate_min_ms > self.consensus.rate_max_ms {
            return Err(SettingsErr::InvalidRate {
                min_ms: self.consensus.rate_min_ms,
                max_ms: self.consensus.rate_max_ms,
            });
        }

        if self.devnet.nodes == 0 {
            return Err(SettingsErr::InvalidDevnet("at least one node is required"));
        }

        if self.devnet.validators == 0 || self.devnet.validators > self.devnet.nodes {
            return Err(SettingsErr::InvalidDevnet(
                "validators must be between 1 and the node count",
            ));
        }

        if u64::from(self.devnet.base_port).saturating_add(self.devnet.nodes) > u64::from(u16::MAX) {
            return Err(SettingsErr::InvalidDevnet("port range overflows"));
        }

        Ok(())
    }
}

fn write_default_config(path: &PathBuf) {
    let settings_str = match toml::ser::to_string_pretty(&Settings::default()) {
        Ok(s) => s,
        Err(err) => {
            error!("Failed to serialize default configuration! Reason: {:#?}", err);
            return;
        }
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).unwrap_or(());
    }

    // Create configuration file
    match FsFile::create(path) {
        Ok(mut file) => {
            file.write_all(settings_str.as_bytes()).unwrap_or(());
        }
        Err(err) => {
            // If this fails, do nothing and fall back to envionment variables
            error!("Failed to create configuration! Reason: {:#?}", err);
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FieldNamesAsArray)]
pub struct Network {
    /// Application id. Peers only talk to peers with the same id.
    #[serde(alias = "appid")]
    pub app_id: String,

    /// Milliseconds a request waits for its response.
    #[serde(alias = "msgtimeoutms")]
    pub msg_timeout_ms: u64,

    /// Node listen address.
    #[serde(alias = "listenaddr")]
    pub listen_addr: String,

    /// Static peer addresses.
    pub peers: Vec<String>,
}

impl Network {
    #[must_use]
    pub fn msg_timeout(&self) -> Duration {
        Duration::from_millis(self.msg_timeout_ms)
    }

    pub fn listen(&self) -> Result<SocketAddr, SettingsErr> {
        self.listen_addr
            .parse()
            .map_err(|_| SettingsErr::InvalidAddr(self.listen_addr.clone()))
    }

    pub fn peer_addrs(&self) -> Result<Vec<SocketAddr>, SettingsErr> {
        self.peers
            .iter()
            .map(|p| p.parse().map_err(|_| SettingsErr::InvalidAddr(p.clone())))
            .collect()
    }
}

impl Default for Network {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_owned(),
            msg_timeout_ms: DEFAULT_MSG_TIMEOUT_MS,
            listen_addr: "127.0.0.1:9000".to_owned(),
            peers: vec![],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, FieldNamesAsArray)]
pub struct Node {
    /// Number of worker threads of the async runtime.
    ///
    /// Default is 0 which means the number of cores of the system
    #[serde(alias = "networkthreads")]
    pub network_threads: u64,
}

impl Node {
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        match self.network_threads {
            0 => num_cpus::get(),
            n => n as usize,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FieldNamesAsArray)]
pub struct ConsensusSettings {
    /// Consensus method.
    pub method: ConsensusMethod,

    /// Hex encoded ed25519 public keys allowed to sign blocks.
    #[serde(alias = "authorizedkeys")]
    pub authorized_keys: Vec<String>,

    /// Lower bound of the block production delay in milliseconds.
    #[serde(alias = "rateminms")]
    pub rate_min_ms: u64,

    /// Upper bound of the block production delay in milliseconds.
    #[serde(alias = "ratemaxms")]
    pub rate_max_ms: u64,

    /// Hex encoded ed25519 secret key. Only validators need one.
    #[serde(alias = "signingkey")]
    pub signing_key: Option<String>,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            method: ConsensusMethod::Auth,
            authorized_keys: vec![],
            rate_min_ms: DEFAULT_RATE_MIN_MS,
            rate_max_ms: DEFAULT_RATE_MAX_MS,
            signing_key: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FieldNamesAsArray)]
pub struct Devnet {
    /// Number of in-process nodes.
    pub nodes: u64,

    /// How many of the nodes are validators. Validator keys are generated
    /// on startup and form the authorized set.
    pub validators: u64,

    /// Number of self-spends the faucet submits.
    #[serde(alias = "faucetspends")]
    pub faucet_spends: u64,

    /// Milliseconds between two faucet spends.
    #[serde(alias = "spendintervalms")]
    pub spend_interval_ms: u64,

    /// First port of the devnet address range.
    #[serde(alias = "baseport")]
    pub base_port: u16,
}

impl Default for Devnet {
    fn default() -> Self {
        Self {
            nodes: 4,
            validators: 1,
            faucet_spends: 10,
            spend_interval_ms: 2_000,
            base_port: 9000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DynamicConfVal {
    String(String),
    Sequence(Vec<String>),
    Option(Option<String>),
    Bool(bool),
    U64(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn loads_defaults() {
        let settings = Settings::load(None, vec![]).unwrap();

        assert_eq!(settings.network.app_id, DEFAULT_APP_ID);
        assert_eq!(settings.network.msg_timeout_ms, DEFAULT_MSG_TIMEOUT_MS);
        assert_eq!(settings.consensus.method, ConsensusMethod::Auth);
        assert_eq!(settings.consensus.rate_min_ms, DEFAULT_RATE_MIN_MS);
        assert_eq!(settings.consensus.signing_key, None);
        assert_eq!(settings.devnet.nodes, 4);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn env_overrides_defaults() {
        let settings = Settings::load(
            None,
            env(&[
                ("DLTREE_CONSENSUS_RATEMINMS", "100"),
                ("DLTREE_CONSENSUS_RATEMAXMS", "200"),
                ("DLTREE_NETWORK_APPID", "other"),
                ("DLTREE_NETWORK_PEERS", "127.0.0.1:1, 127.0.0.1:2"),
                ("DLTREE_DEVNET_VALIDATORS", ""),
                ("UNRELATED", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.consensus.rate_min_ms, 100);
        assert_eq!(settings.consensus.rate_max_ms, 200);
        assert_eq!(settings.network.app_id, "other");
        assert_eq!(settings.network.peer_addrs().unwrap().len(), 2);
        assert_eq!(settings.devnet.validators, 1);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.consensus.rate_min_ms = 10;
        settings.consensus.rate_max_ms = 5;
        assert!(matches!(
            settings.validate(),
            Err(SettingsErr::InvalidRate { min_ms: 10, max_ms: 5 })
        ));

        let mut settings = Settings::default();
        settings.network.peers.push("nowhere".to_owned());
        assert!(matches!(settings.validate(), Err(SettingsErr::InvalidAddr(_))));

        let mut settings = Settings::default();
        settings.devnet.validators = 5;
        assert!(matches!(settings.validate(), Err(SettingsErr::InvalidDevnet(_))));
    }

    #[test]
    fn default_config_is_valid_toml() {
        let encoded = toml::ser::to_string_pretty(&Settings::default()).unwrap();
        let decoded: Settings = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.network.app_id, DEFAULT_APP_ID);
    }
}
