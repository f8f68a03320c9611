use std::{env, net::{IpAddr, Ipv4Addr}, path::PathBuf, str::FromStr, time::Duration};

use anyhow::anyhow;
use rideshare_data_management::DEFAULT_DATABASE_PATH;
use tracing::info;

/// What a refused signup looks like to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignupDeniedPolicy {
    /// 403 with an explanation.
    #[default]
    Forbidden,
    /// Quietly send the client back to the ride list.
    Redirect,
}

impl FromStr for SignupDeniedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forbidden" => Ok(SignupDeniedPolicy::Forbidden),
            "redirect" => Ok(SignupDeniedPolicy::Redirect),
            other => Err(format!("expected \"forbidden\" or \"redirect\", got {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub mail_from: String,
    /// Notifications are only logged when there is no relay.
    pub mail_relay_url: Option<String>,
    pub mail_max_attempts: u32,
    pub mail_retry_backoff: Duration,
    pub signup_denied: SignupDeniedPolicy,
    /// Variables that were not set and fell back to their default.
    pub defaulted: Vec<&'static str>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            log_dir: PathBuf::from("log"),
            mail_from: "rides@localhost".to_string(),
            mail_relay_url: None,
            mail_max_attempts: 3,
            mail_retry_backoff: Duration::from_millis(500),
            signup_denied: SignupDeniedPolicy::default(),
            defaulted: Vec::new(),
        }
    }
}

impl Config {
    /// Reads the environment on top of the defaults. Runs before logging is set up,
    /// so nothing is logged here. [`Config::log_summary`] reports the result,
    /// including which variables were left at their default.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(|key| env::var(key).ok())
    }

    fn load_from(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let mut vars = EnvLoader { lookup, defaulted: Vec::new() };

        let mut config = Self {
            bind: vars.load_or("RIDESHARE_BIND", defaults.bind)?,
            port: vars.load_or("RIDESHARE_PORT", defaults.port)?,
            database_path: vars.load_or("RIDESHARE_DATABASE", defaults.database_path)?,
            log_dir: vars.load_or("RIDESHARE_LOG_DIR", defaults.log_dir)?,
            mail_from: vars.load_or("MAIL_FROM", defaults.mail_from)?,
            mail_relay_url: (vars.lookup)("MAIL_RELAY_URL").filter(|url| !url.trim().is_empty()),
            mail_max_attempts: vars.load_or("MAIL_MAX_ATTEMPTS", defaults.mail_max_attempts)?,
            mail_retry_backoff: Duration::from_millis(vars.load_or("MAIL_RETRY_BACKOFF_MS", defaults.mail_retry_backoff.as_millis() as u64)?),
            signup_denied: vars.load_or("SIGNUP_DENIED", defaults.signup_denied)?,
            defaulted: Vec::new(),
        };
        config.defaulted = vars.defaulted;
        Ok(config)
    }

    pub fn log_summary(&self) {
        if !self.defaulted.is_empty() {
            info!("Not set, using defaults: {}", self.defaulted.join(", "));
        }
        info!("Listening address: {}:{}", self.bind, self.port);
        info!("Database: {:?}", self.database_path);
        info!("Notifications from {} via {}", self.mail_from, self.mail_relay_url.as_deref().unwrap_or("log only"));
        info!("Mail attempts: {}, initial backoff {:?}", self.mail_max_attempts, self.mail_retry_backoff);
        info!("Refused signups answer with {:?}", self.signup_denied);
    }
}

struct EnvLoader<F> {
    lookup: F,
    defaulted: Vec<&'static str>,
}

impl<F: Fn(&str) -> Option<String>> EnvLoader<F> {
    fn load_or<T>(&mut self, key: &'static str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(key) {
            Some(value) => value.parse().map_err(|e| anyhow!("Invalid {key} value {value:?}: {e}")),
            None => {
                self.defaulted.push(key);
                Ok(default)
            }
        }
    }
}
