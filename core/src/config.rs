//! Connection configuration for [`crate::Client`].

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 9497;
pub const DEFAULT_VERSION: &str = "0.1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to reach the service and authenticate the session.
///
/// Only `host` is required when deserializing. `timeout` is given in
/// seconds; `null` or `0` disables it and a negative value is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "enabled")]
    pub https: bool,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "enabled")]
    pub verify_certificate: bool,
    #[serde(default = "default_timeout", with = "timeout_secs")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn enabled() -> bool {
    true
}

fn default_timeout() -> Option<Duration> {
    Some(DEFAULT_TIMEOUT)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            version: DEFAULT_VERSION.to_string(),
            https: true,
            prefix: None,
            verify_certificate: true,
            timeout: Some(DEFAULT_TIMEOUT),
            proxy: None,
            user_agent: None,
            username: None,
            password: None,
            token: None,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_verify_certificate(mut self, verify: bool) -> Self {
        self.verify_certificate = verify;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Root URL that every resource path is appended to:
    /// `{scheme}://{host}:{port}{prefix}/{version}`.
    pub fn url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        let prefix = self
            .prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| format!("/{p}"))
            .unwrap_or_default();
        let mut url = format!("{scheme}://{}:{}{prefix}", self.host, self.port);
        let version = self.version.trim_matches('/');
        if !version.is_empty() {
            url.push('/');
            url.push_str(version);
        }
        url
    }
}

mod timeout_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<f64>::deserialize(deserializer)? {
            None => Ok(None),
            Some(secs) if secs == 0.0 => Ok(None),
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid timeout {secs}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_render_https_root() {
        let config = ClientConfig::new("auth.example.com");
        assert_eq!(config.url(), "https://auth.example.com:9497/0.1");
        assert!(config.verify_certificate);
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn prefix_is_normalised() {
        let config = ClientConfig::new("localhost")
            .with_https(false)
            .with_port(8080)
            .with_prefix("api/auth/");
        assert_eq!(config.url(), "http://localhost:8080/api/auth/0.1");
    }

    #[test]
    fn empty_version_is_omitted() {
        let config = ClientConfig::new("localhost").with_version("");
        assert_eq!(config.url(), "https://localhost:9497");
    }

    #[test]
    fn deserializes_with_only_host() {
        let config: ClientConfig = serde_json::from_str(r#"{"host":"h"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("h"));
    }

    #[test]
    fn host_is_required() {
        assert!(serde_json::from_str::<ClientConfig>("{}").is_err());
    }

    #[test]
    fn deserializes_full_bag() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "host": "h",
                "port": 443,
                "version": "1.0",
                "verify_certificate": false,
                "timeout": 2.5,
                "username": "admin",
                "password": "secret"
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 443);
        assert_eq!(config.version, "1.0");
        assert!(!config.verify_certificate);
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn null_timeout_disables_it() {
        let config: ClientConfig = serde_json::from_str(r#"{"host":"h","timeout":null}"#).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config: ClientConfig = serde_json::from_str(r#"{"host":"h","timeout":0}"#).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn out_of_range_timeout_is_an_error() {
        let err = serde_json::from_str::<ClientConfig>(r#"{"host":"h","timeout":1e300}"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid timeout"), "{err}");
        assert!(serde_json::from_str::<ClientConfig>(r#"{"host":"h","timeout":-1}"#).is_err());
    }
}
