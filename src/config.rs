use crate::error::{Result, TsError};
use crate::format::ts::pid::PidSet;
use crate::format::ts::types::{Pid, PID_MAX};
use lazy_static::lazy_static;
use log::{debug, warn};
use parking_lot::RwLock;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::load());
}

const CONFIG_PATHS: [&str; 2] = ["./tsdemux.toml", "./config.toml"];

/// PIDs to filter, as written in the configuration: `all`, `none`, or a
/// comma-separated list of decimal or `0x` hexadecimal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidFilterSetting {
    All,
    None,
    List(Vec<Pid>),
}

impl PidFilterSetting {
    pub fn to_pid_set(&self) -> PidSet {
        match self {
            PidFilterSetting::All => PidSet::all(),
            PidFilterSetting::None => PidSet::none(),
            PidFilterSetting::List(pids) => PidSet::from_pids(pids.iter().copied()),
        }
    }
}

fn parse_u16(value: &str) -> Result<u16> {
    let value = value.trim();
    Ok(match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16)?,
        None => value.parse()?,
    })
}

impl FromStr for PidFilterSetting {
    type Err = TsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(PidFilterSetting::All),
            "none" | "" => Ok(PidFilterSetting::None),
            list => {
                let pids = list
                    .split(',')
                    .map(|item| {
                        let pid = parse_u16(item)?;
                        if usize::from(pid) >= PID_MAX {
                            return Err(TsError::Config(format!("PID {} out of range", pid)));
                        }
                        Ok(pid)
                    })
                    .collect::<Result<Vec<Pid>>>()?;
                Ok(PidFilterSetting::List(pids))
            }
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(TsError::Config(format!("invalid boolean '{}'", other))),
    }
}

/// Process-wide settings of the demultiplexers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// PIDs filtered by demuxes built from the configuration.
    pub pid_filter: PidFilterSetting,
    /// Add `<font color>` tags in Teletext subtitles.
    pub teletext_colors: bool,
    /// Default G0 character set group of Teletext pages.
    pub teletext_default_charset: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pid_filter: PidFilterSetting::All,
            teletext_colors: false,
            teletext_default_charset: 0,
        }
    }
}

impl Config {
    // Defaults, then environment, then the first configuration file found.
    fn load() -> Self {
        let mut config = Config::default();

        for (var, key) in [
            ("TSDEMUX_PIDS", "pids"),
            ("TSDEMUX_TELETEXT_COLORS", "teletext_colors"),
            ("TSDEMUX_TELETEXT_CHARSET", "teletext_charset"),
        ] {
            if let Ok(value) = env::var(var) {
                if let Err(e) = config.set(key, &value) {
                    warn!("ignoring {}: {}", var, e);
                }
            }
        }

        if let Some(path) = CONFIG_PATHS.iter().find(|path| Path::new(path).exists()) {
            match fs::read_to_string(path) {
                Ok(content) => {
                    if let Err(e) = config.apply_pairs(&content) {
                        warn!("ignoring {}: {}", path, e);
                    }
                }
                Err(e) => warn!("cannot read {}: {}", path, e),
            }
        }

        config
    }

    /// Parses a configuration file body, `key = value` lines.
    ///
    /// Values may be quoted, `#` starts a comment line and unknown keys are
    /// ignored. Missing keys keep their default value.
    pub fn from_str_pairs(content: &str) -> Result<Self> {
        let mut config = Config::default();
        config.apply_pairs(content)?;
        Ok(config)
    }

    fn apply_pairs(&mut self, content: &str) -> Result<()> {
        // Parse into a copy so that a bad line leaves the settings unchanged.
        let mut updated = self.clone();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| TsError::Config(format!("invalid line '{}'", line)))?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            updated.set(key.trim(), value)?;
        }
        *self = updated;
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "pids" => self.pid_filter = value.parse()?,
            "teletext_colors" => self.teletext_colors = parse_bool(value)?,
            "teletext_charset" => {
                let group = parse_u16(value)?;
                self.teletext_default_charset = u8::try_from(group)
                    .ok()
                    .filter(|&g| g < 0x10)
                    .ok_or_else(|| TsError::Config(format!("invalid charset group {}", group)))?;
            }
            other => debug!("unknown configuration key '{}'", other),
        }
        Ok(())
    }

    /// Re-reads the environment and configuration files.
    pub fn reload() {
        let new_config = Config::load();
        *CONFIG.write() = new_config;
    }
}

/// Returns a snapshot of the current configuration.
pub fn get() -> Config {
    CONFIG.read().clone()
}

/// Re-reads the environment and configuration files.
pub fn reload() {
    Config::reload();
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# tsdemux configuration
# Environment variables TSDEMUX_PIDS, TSDEMUX_TELETEXT_COLORS and
# TSDEMUX_TELETEXT_CHARSET are read first, this file overrides them.

# PIDs to demultiplex: all, none, or a list such as 0, 0x100, 1068
pids = "all"

# Add <font color> tags in Teletext subtitles
teletext_colors = false

# Default G0 character set group (0 to 15) of Teletext pages
teletext_charset = 0
"#;
        fs::write(path, template)?;
    }
    Ok(())
}
