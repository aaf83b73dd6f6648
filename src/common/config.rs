//! receiver settings, read from a json file with defaults behind it
//!
//! [`Config`] is the raw key/value store.  [`ServerConfig`] is the typed set of
//! knobs the server runs with, pulled out of a `Config` and checked.
use json::JsonValue;
use log::{info, warn};
use regex::Regex;
use serde::Serialize;
use simple_error::bail;
use std::{
    error::Error,
    fmt,
    fs::File,
    io::{ErrorKind, Write},
};

use super::{box_error::BoxError, packet::ChannelMask};

#[derive(Debug)]
pub struct MissingConfigError {
    key: String,
}

impl fmt::Display for MissingConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Required configuration value '{}' is missing", self.key)
    }
}

impl Error for MissingConfigError {}

pub struct Config {
    filename: String,
    settings: JsonValue,
    defaults: JsonValue,
}

impl Config {
    /// build a config around a settings file.  A missing or unreadable file is not
    /// an error, the defaults carry everything in that case.
    pub fn build(filename: String, defaults: JsonValue) -> Result<Config, std::io::Error> {
        let filename_regex = match Regex::new(r"^[a-zA-Z0-9_\-\./]+\.json$") {
            Ok(re) => re,
            Err(e) => return Err(std::io::Error::new(ErrorKind::Other, e.to_string())),
        };
        if !filename_regex.is_match(&filename) || filename.contains("..") {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "Invalid filename - must contain only letters, numbers, underscore, dash, dot, slash and end in .json",
            ));
        }
        let mut config = Config {
            filename,
            settings: json::object! {},
            defaults,
        };
        if let Err(err) = config.load_from_file() {
            warn!("Using default settings: {}", err);
        }
        Ok(config)
    }

    fn load_from_file(&mut self) -> std::io::Result<()> {
        let raw_data = std::fs::read_to_string(&self.filename)?;
        match json::parse(&raw_data) {
            Ok(parsed) => {
                self.settings = parsed;
                info!("Loaded settings from {}: {}", self.filename, self.settings.dump());
            }
            Err(err) => warn!("Failed to parse config file {}: {}", self.filename, err),
        }
        Ok(())
    }

    /// settings first, then the explicit default, then the built in defaults
    fn lookup<T>(
        &self,
        key: &str,
        default: Option<T>,
        get: impl Fn(&JsonValue) -> Option<T>,
    ) -> Result<T, MissingConfigError> {
        if let Some(val) = get(&self.settings[key]) {
            return Ok(val);
        }
        if let Some(def) = default {
            return Ok(def);
        }
        get(&self.defaults[key]).ok_or(MissingConfigError {
            key: key.to_string(),
        })
    }

    pub fn get_str_value(&self, key: &str, default: Option<String>) -> Result<String, MissingConfigError> {
        self.lookup(key, default, |v| v.as_str().map(String::from))
    }

    pub fn get_bool_value(&self, key: &str, default: Option<bool>) -> Result<bool, MissingConfigError> {
        self.lookup(key, default, |v| v.as_bool())
    }

    pub fn get_u32_value(&self, key: &str, default: Option<u32>) -> Result<u32, MissingConfigError> {
        self.lookup(key, default, |v| v.as_u32())
    }

    pub fn set_value(&mut self, key: &str, val: impl Into<JsonValue>) -> Result<(), String> {
        let json_val = val.into();
        match json_val {
            JsonValue::Short(_) | JsonValue::String(_) | JsonValue::Boolean(_) | JsonValue::Number(_) => {
                self.settings[key] = json_val;
                Ok(())
            }
            _ => Err(format!("Unsupported value type for key: {}", key)),
        }
    }

    pub fn dump(&self) -> String {
        self.settings.pretty(2)
    }

    /// write the current settings (not the defaults) back to the file
    pub fn save_settings(&self) -> std::io::Result<bool> {
        let mut f = match std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.filename.as_str())
        {
            Ok(f) => f,
            Err(error) if error.kind() == ErrorKind::NotFound => File::create(self.filename.as_str())?,
            Err(error) => return Err(error),
        };
        f.write_all(self.settings.pretty(2).as_bytes())?;
        f.sync_all()?;
        Ok(true)
    }
}

/// forward error correction stage (not built)
pub const OPT_FEC: u32 = 0x1;
/// sample rate conversion stage (not built)
pub const OPT_RESAMPLING: u32 = 0x2;

/// The knobs the server runs with.
///
/// `timeout` is counted in render rounds, `latency`, `max_ts_jump` in samples.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServerConfig {
    pub options: u32,
    pub channels: ChannelMask,
    pub timeout: u32,
    pub latency: u32,
    pub max_sessions: usize,
    pub max_packets: usize,
    pub max_seq_jump: u32,
    pub max_ts_jump: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            options: 0,
            channels: 0x3,
            timeout: 375,
            latency: 2048,
            max_sessions: 10,
            max_packets: 100,
            max_seq_jump: 100,
            max_ts_jump: 48000,
        }
    }
}

impl ServerConfig {
    /// defaults in the shape [`Config::build`] wants them
    pub fn json_defaults() -> JsonValue {
        let d = ServerConfig::default();
        let max_sessions = d.max_sessions as u32;
        let max_packets = d.max_packets as u32;
        json::object! {
            "fec": false,
            "resampling": false,
            "channels": d.channels,
            "timeout": d.timeout,
            "latency": d.latency,
            "max_sessions": max_sessions,
            "max_packets": max_packets,
            "max_seq_jump": d.max_seq_jump,
            "max_ts_jump": d.max_ts_jump
        }
    }

    pub fn from_config(config: &Config) -> Result<ServerConfig, BoxError> {
        let mut options = 0;
        if config.get_bool_value("fec", Some(false))? {
            options |= OPT_FEC;
        }
        if config.get_bool_value("resampling", Some(false))? {
            options |= OPT_RESAMPLING;
        }
        let d = ServerConfig::default();
        let cfg = ServerConfig {
            options,
            channels: config.get_u32_value("channels", Some(d.channels))?,
            timeout: config.get_u32_value("timeout", Some(d.timeout))?,
            latency: config.get_u32_value("latency", Some(d.latency))?,
            max_sessions: config.get_u32_value("max_sessions", Some(d.max_sessions as u32))? as usize,
            max_packets: config.get_u32_value("max_packets", Some(d.max_packets as u32))? as usize,
            max_seq_jump: config.get_u32_value("max_seq_jump", Some(d.max_seq_jump))?,
            max_ts_jump: config.get_u32_value("max_ts_jump", Some(d.max_ts_jump))?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), BoxError> {
        if self.options & OPT_FEC != 0 {
            bail!("forward error correction is not supported");
        }
        if self.options & OPT_RESAMPLING != 0 {
            bail!("resampling is not supported");
        }
        if self.options != 0 {
            bail!("unknown option bits {:#x}", self.options);
        }
        if self.channels == 0 {
            bail!("channel mask must select at least one channel");
        }
        if self.max_sessions == 0 || self.max_packets == 0 {
            bail!("max_sessions and max_packets must be non zero");
        }
        if self.timeout == 0 {
            bail!("timeout must be at least one round");
        }
        Ok(())
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}
