//! Configuration read at startup and on REHASH.
//!
//! The whole configuration lives in one YAML file whose path is the sole
//! command-line argument.  Most fields have defaults; only `domain` is
//! mandatory.

use selka_tokens::Dialect;
use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

/// An operator credential.  `local` entries grant the local-operator user
/// mode (`O`) instead of the global one (`o`).
#[derive(Clone, Debug, Deserialize)]
pub struct Oper {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub local: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub domain: String,

    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
    #[serde(default = "default_dialect")]
    pub dialect: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub motd_file: Option<String>,
    #[serde(default)]
    pub opers: Vec<Oper>,

    #[serde(default = "default_org_name")]
    pub org_name: String,
    #[serde(default = "default_org_location")]
    pub org_location: String,
    #[serde(default = "default_org_mail")]
    pub org_mail: String,

    #[serde(default = "default_chan_mode")]
    pub default_chan_mode: String,

    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default = "default_nicklen")]
    pub nicklen: usize,
    #[serde(default = "default_channellen")]
    pub channellen: usize,
    #[serde(default = "default_kicklen")]
    pub kicklen: usize,
    #[serde(default = "default_topiclen")]
    pub topiclen: usize,
    #[serde(default = "default_userlen")]
    pub userlen: usize,
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,
    #[serde(default = "default_whowas_len")]
    pub whowas_len: usize,
}

fn default_ports() -> Vec<u16> { vec![6667] }
fn default_dialect() -> String { "modern".to_owned() }
fn default_org_name() -> String { "unspecified".to_owned() }
fn default_org_location() -> String { "unspecified".to_owned() }
fn default_org_mail() -> String { "unspecified".to_owned() }
fn default_chan_mode() -> String { "+n".to_owned() }
fn default_max_line_length() -> usize { 512 }
fn default_nicklen() -> usize { 9 }
fn default_channellen() -> usize { 50 }
fn default_kicklen() -> usize { 300 }
fn default_topiclen() -> usize { 300 }
fn default_userlen() -> usize { 64 }
fn default_max_channels() -> usize { 10 }
fn default_whowas_len() -> usize { 100 }

impl Config {
    /// Reads and validates the configuration at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Box<dyn Error>> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        if config.ports.is_empty() {
            return Err("no listening ports configured".into());
        }
        let _ = config.dialect()?;
        Ok(config)
    }

    pub fn dialect(&self) -> Result<Dialect, Box<dyn Error>> {
        self.dialect
            .parse()
            .map_err(|_| format!("unknown dialect {:?}", self.dialect).into())
    }

    /// The subset of the configuration the server state needs.
    pub fn state(&self) -> State {
        State {
            dialect: self.dialect().unwrap_or_default(),
            domain: self.domain.clone(),
            org_name: self.org_name.clone(),
            org_location: self.org_location.clone(),
            org_mail: self.org_mail.clone(),
            password: self.password.clone(),
            motd_file: self.motd_file.clone(),
            opers: self
                .opers
                .iter()
                .map(|o| (o.name.clone(), o.password.clone(), o.local))
                .collect(),
            default_chan_mode: self.default_chan_mode.clone(),
            nicklen: self.nicklen,
            channellen: self.channellen,
            kicklen: self.kicklen,
            topiclen: self.topiclen,
            userlen: self.userlen,
            max_channels: self.max_channels,
            whowas_len: self.whowas_len,
        }
    }
}

/// The state-relevant part of the configuration.
#[derive(Clone, Debug)]
pub struct State {
    pub dialect: Dialect,
    pub domain: String,
    pub org_name: String,
    pub org_location: String,
    pub org_mail: String,
    pub password: Option<String>,
    pub motd_file: Option<String>,
    /// `(name, password, local)` triples accepted by OPER.
    pub opers: Vec<(String, String, bool)>,
    pub default_chan_mode: String,
    pub nicklen: usize,
    pub channellen: usize,
    pub kicklen: usize,
    pub topiclen: usize,
    pub userlen: usize,
    pub max_channels: usize,
    pub whowas_len: usize,
}

impl State {
    /// A workable configuration for tests and examples.
    pub fn sample() -> State {
        State {
            dialect: Dialect::Modern,
            domain: "selka.localdomain".to_owned(),
            org_name: default_org_name(),
            org_location: default_org_location(),
            org_mail: default_org_mail(),
            password: None,
            motd_file: None,
            opers: vec![("root".to_owned(), "hunter2".to_owned(), false)],
            default_chan_mode: default_chan_mode(),
            nicklen: default_nicklen(),
            channellen: default_channellen(),
            kicklen: default_kicklen(),
            topiclen: default_topiclen(),
            userlen: default_userlen(),
            max_channels: default_max_channels(),
            whowas_len: default_whowas_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: Config = serde_yaml::from_str("domain: irc.example.org").unwrap();
        assert_eq!(config.domain, "irc.example.org");
        assert_eq!(config.ports, vec![6667]);
        assert_eq!(config.dialect().unwrap(), Dialect::Modern);
        assert_eq!(config.nicklen, 9);
    }

    #[test]
    fn test_full_config() {
        let config: Config = serde_yaml::from_str(
            "
domain: irc.example.org
ports: [6667, 6668]
dialect: rfc1459
password: sesame
opers:
  - name: root
    password: hunter2
  - name: helper
    password: hunter3
    local: true
nicklen: 12
",
        )
        .unwrap();
        assert_eq!(config.ports, vec![6667, 6668]);
        assert_eq!(config.dialect().unwrap(), Dialect::Rfc1459);
        assert_eq!(config.password.as_deref(), Some("sesame"));
        let state = config.state();
        assert_eq!(state.opers.len(), 2);
        assert!(state.opers[1].2);
        assert_eq!(state.nicklen, 12);
    }

    #[test]
    fn test_bad_dialect_is_rejected() {
        let config: Config =
            serde_yaml::from_str("domain: irc.example.org\ndialect: rfc2812").unwrap();
        assert!(config.dialect().is_err());
    }
}
