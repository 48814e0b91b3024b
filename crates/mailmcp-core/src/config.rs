//! Startup configuration.
//!
//! Values are read once, validated, and then shared read-only. Every
//! constructor has a `from_lookup` twin so tests can supply variables
//! without touching the process environment.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use thiserror::Error;

/// Default relay host.
pub const DEFAULT_RELAY_HOST: &str = "smtp.gmail.com";
/// Default relay port (submission with STARTTLS).
pub const DEFAULT_RELAY_PORT: u16 = 587;
/// Default bound on a single relay conversation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Mail relay identity and credential.
#[derive(Clone, PartialEq, Eq)]
pub struct MailConfig {
    /// Sender address, also used as the relay login.
    pub sender: String,
    /// Relay password (app password for Gmail).
    pub password: String,
    /// Relay host name.
    pub relay_host: String,
    /// Relay port.
    pub relay_port: u16,
    /// Connection and command timeout for the relay.
    pub timeout: Duration,
}

impl MailConfig {
    /// Read the mail configuration from the process environment.
    ///
    /// # Errors
    /// Returns error if the identity or credential is absent, or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the mail configuration through an arbitrary lookup function.
    ///
    /// # Errors
    /// See [`MailConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sender = required(&lookup, "EMAIL_ACCOUNT")?;
        let password = required(&lookup, "EMAIL_PASSWORD")?;
        let relay_host =
            optional(&lookup, "SMTP_HOST").unwrap_or_else(|| DEFAULT_RELAY_HOST.into());
        let relay_port = parsed(&lookup, "SMTP_PORT")?.unwrap_or(DEFAULT_RELAY_PORT);
        let timeout_secs: u64 =
            parsed(&lookup, "SMTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            sender,
            password,
            relay_host,
            relay_port,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .field("relay_host", &self.relay_host)
            .field("relay_port", &self.relay_port)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
        }
    }
}

impl ServerConfig {
    /// Read the listener configuration from the process environment.
    ///
    /// # Errors
    /// Returns error if `HOST` or `PORT` does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the listener configuration through an arbitrary lookup function.
    ///
    /// # Errors
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let host: IpAddr = parsed(&lookup, "HOST")?.unwrap_or_else(|| defaults.bind_addr.ip());
        let port: u16 = parsed(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
        })
    }
}

fn optional<F>(lookup: &F, var: &'static str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, var).ok_or(ConfigError::Missing(var))
}

fn parsed<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    optional(lookup, var)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::Invalid { var, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_mail_config_defaults() {
        let config = assert_ok!(MailConfig::from_lookup(lookup(&[
            ("EMAIL_ACCOUNT", "bot@example.com"),
            ("EMAIL_PASSWORD", "hunter2"),
        ])));
        assert_eq!(config.sender, "bot@example.com");
        assert_eq!(config.relay_host, DEFAULT_RELAY_HOST);
        assert_eq!(config.relay_port, 587);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_mail_config_requires_identity_and_credential() {
        let err = assert_err!(MailConfig::from_lookup(lookup(&[("EMAIL_PASSWORD", "x")])));
        assert_eq!(err, ConfigError::Missing("EMAIL_ACCOUNT"));

        let err = assert_err!(MailConfig::from_lookup(lookup(&[
            ("EMAIL_ACCOUNT", "bot@example.com"),
            ("EMAIL_PASSWORD", "   "),
        ])));
        assert_eq!(err, ConfigError::Missing("EMAIL_PASSWORD"));
    }

    #[test]
    fn test_mail_config_rejects_bad_port() {
        let err = assert_err!(MailConfig::from_lookup(lookup(&[
            ("EMAIL_ACCOUNT", "bot@example.com"),
            ("EMAIL_PASSWORD", "x"),
            ("SMTP_PORT", "smtp"),
        ])));
        assert!(matches!(err, ConfigError::Invalid { var: "SMTP_PORT", .. }));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = assert_ok!(MailConfig::from_lookup(lookup(&[
            ("EMAIL_ACCOUNT", "bot@example.com"),
            ("EMAIL_PASSWORD", "hunter2"),
        ])));
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_server_config() {
        let config = assert_ok!(ServerConfig::from_lookup(lookup(&[("PORT", "3000")])));
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.bind_addr.ip().is_unspecified());

        let config = assert_ok!(ServerConfig::from_lookup(lookup(&[])));
        assert_eq!(config, ServerConfig::default());

        assert_err!(ServerConfig::from_lookup(lookup(&[("HOST", "not-an-ip")])));
    }
}
