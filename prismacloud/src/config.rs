//! Provider configuration
//!
//! Settings come from the provider block, `PRISMACLOUD_*` environment
//! variables and an optional JSON file, in that order of precedence, with
//! built-in defaults filling whatever is left.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tfplug::types::{Dynamic, DynamicValue};

pub const DEFAULT_PROTOCOL: &str = "https";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 90;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_POLL_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is required (set it in the provider block or the {env} environment variable)")]
    Missing {
        name: &'static str,
        env: &'static str,
    },

    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("protocol must be http or https, got {0:?}")]
    InvalidProtocol(String),

    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    FileParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fully resolved provider configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub customer_name: Option<String>,
    pub protocol: String,
    pub port: Option<u16>,
    pub timeout: u64,
    pub skip_ssl_cert_verification: bool,
    pub max_retries: u32,
    pub retry_max_delay: u64,
    pub poll_timeout: u64,
}

impl ProviderConfig {
    /// Merge the provider block with the environment and the JSON file
    pub fn resolve(block: &DynamicValue) -> Result<Self, ConfigError> {
        let mut settings = PartialConfig::from_block(block)?.merge(PartialConfig::from_env()?);

        if let Some(path) = settings.json_config_file.clone() {
            tracing::debug!("Loading provider settings from {}", path);
            settings = settings.merge(PartialConfig::from_file(&path)?);
        }

        settings.finish()
    }

    /// Base URL requests are made against, without a trailing slash
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let raw = if self.url.contains("://") {
            self.url.clone()
        } else {
            match self.port {
                Some(port) => format!("{}://{}:{}", self.protocol, self.url, port),
                None => format!("{}://{}", self.protocol, self.url),
            }
        };

        url::Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;

        Ok(raw.trim_end_matches('/').to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout)
    }
}

/// One layer of settings; unset fields fall through to the next layer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub customer_name: Option<String>,
    pub protocol: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<u64>,
    pub skip_ssl_cert_verification: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_max_delay: Option<u64>,
    pub poll_timeout: Option<u64>,
    #[serde(skip)]
    pub json_config_file: Option<String>,
}

impl PartialConfig {
    pub fn from_block(block: &DynamicValue) -> Result<Self, ConfigError> {
        Ok(Self {
            url: block_string(block, "url"),
            username: block_string(block, "username"),
            password: block_string(block, "password"),
            customer_name: block_string(block, "customer_name"),
            protocol: block_string(block, "protocol"),
            port: block_int(block, "port")?,
            timeout: block_int(block, "timeout")?,
            skip_ssl_cert_verification: block.attribute("skip_ssl_cert_verification").as_bool(),
            max_retries: block_int(block, "max_retries")?,
            retry_max_delay: block_int(block, "retry_max_delay")?,
            poll_timeout: block_int(block, "poll_timeout")?,
            json_config_file: block_string(block, "json_config_file"),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_string("PRISMACLOUD_URL"),
            username: env_string("PRISMACLOUD_USERNAME"),
            password: env_string("PRISMACLOUD_PASSWORD"),
            customer_name: env_string("PRISMACLOUD_CUSTOMER_NAME"),
            protocol: env_string("PRISMACLOUD_PROTOCOL"),
            port: env_parsed("PRISMACLOUD_PORT", "port")?,
            timeout: env_parsed("PRISMACLOUD_TIMEOUT", "timeout")?,
            skip_ssl_cert_verification: env_parsed(
                "PRISMACLOUD_SKIP_SSL_CERT_VERIFICATION",
                "skip_ssl_cert_verification",
            )?,
            max_retries: env_parsed("PRISMACLOUD_MAX_RETRIES", "max_retries")?,
            retry_max_delay: env_parsed("PRISMACLOUD_RETRY_MAX_DELAY", "retry_max_delay")?,
            poll_timeout: env_parsed("PRISMACLOUD_POLL_TIMEOUT", "poll_timeout")?,
            json_config_file: env_string("PRISMACLOUD_JSON_CONFIG_FILE"),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            ConfigError::FileRead {
                path: path_str.clone(),
                source,
            }
        })?;
        Self::from_json(&contents).map_err(|source| ConfigError::FileParse {
            path: path_str,
            source,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Fields set on `self` win over `lower`
    pub fn merge(self, lower: PartialConfig) -> Self {
        Self {
            url: self.url.or(lower.url),
            username: self.username.or(lower.username),
            password: self.password.or(lower.password),
            customer_name: self.customer_name.or(lower.customer_name),
            protocol: self.protocol.or(lower.protocol),
            port: self.port.or(lower.port),
            timeout: self.timeout.or(lower.timeout),
            skip_ssl_cert_verification: self
                .skip_ssl_cert_verification
                .or(lower.skip_ssl_cert_verification),
            max_retries: self.max_retries.or(lower.max_retries),
            retry_max_delay: self.retry_max_delay.or(lower.retry_max_delay),
            poll_timeout: self.poll_timeout.or(lower.poll_timeout),
            json_config_file: self.json_config_file.or(lower.json_config_file),
        }
    }

    pub fn finish(self) -> Result<ProviderConfig, ConfigError> {
        let url = self.url.ok_or(ConfigError::Missing {
            name: "url",
            env: "PRISMACLOUD_URL",
        })?;
        let username = self.username.ok_or(ConfigError::Missing {
            name: "username",
            env: "PRISMACLOUD_USERNAME",
        })?;
        let password = self.password.ok_or(ConfigError::Missing {
            name: "password",
            env: "PRISMACLOUD_PASSWORD",
        })?;

        let protocol = self
            .protocol
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }

        Ok(ProviderConfig {
            url,
            username,
            password,
            customer_name: self.customer_name,
            protocol,
            port: self.port,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            skip_ssl_cert_verification: self.skip_ssl_cert_verification.unwrap_or(false),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_max_delay: self.retry_max_delay.unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
            poll_timeout: self.poll_timeout.unwrap_or(DEFAULT_POLL_TIMEOUT_SECONDS),
        })
    }
}

fn block_string(block: &DynamicValue, name: &str) -> Option<String> {
    match block.attribute(name) {
        Dynamic::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Integer attribute converted to the target width; negative, fractional
/// or out-of-range numbers are rejected like malformed environment values
fn block_int<T: TryFrom<i64>>(
    block: &DynamicValue,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(number) = block.attribute(name).as_number() else {
        return Ok(None);
    };
    let invalid = || ConfigError::InvalidValue {
        name,
        value: number.to_string(),
    };
    if number.fract() != 0.0 || number < i64::MIN as f64 || number > i64::MAX as f64 {
        return Err(invalid());
    }
    T::try_from(number as i64).map(Some).map_err(|_| invalid())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(
    key: &str,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: &[&str] = &[
        "PRISMACLOUD_URL",
        "PRISMACLOUD_USERNAME",
        "PRISMACLOUD_PASSWORD",
        "PRISMACLOUD_CUSTOMER_NAME",
        "PRISMACLOUD_PROTOCOL",
        "PRISMACLOUD_PORT",
        "PRISMACLOUD_TIMEOUT",
        "PRISMACLOUD_SKIP_SSL_CERT_VERIFICATION",
        "PRISMACLOUD_MAX_RETRIES",
        "PRISMACLOUD_RETRY_MAX_DELAY",
        "PRISMACLOUD_POLL_TIMEOUT",
        "PRISMACLOUD_JSON_CONFIG_FILE",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    fn block(values: &[(&str, Dynamic)]) -> DynamicValue {
        let mut block = DynamicValue::empty_object();
        for (name, value) in values {
            block.set_attribute(name, value.clone());
        }
        block
    }

    #[test]
    #[serial]
    fn block_values_win_over_environment() {
        clear_env();
        std::env::set_var("PRISMACLOUD_URL", "env.example.com");
        std::env::set_var("PRISMACLOUD_USERNAME", "env-user");
        std::env::set_var("PRISMACLOUD_PASSWORD", "env-pass");

        let config = ProviderConfig::resolve(&block(&[(
            "url",
            Dynamic::from("api.prismacloud.io"),
        )]))
        .unwrap();

        assert_eq!(config.url, "api.prismacloud.io");
        assert_eq!(config.username, "env-user");
        assert_eq!(config.password, "env-pass");
        assert_eq!(config.protocol, "https");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(config.poll_timeout, DEFAULT_POLL_TIMEOUT_SECONDS);
        clear_env();
    }

    #[test]
    #[serial]
    fn missing_credentials_are_reported() {
        clear_env();
        let err = ProviderConfig::resolve(&block(&[("url", Dynamic::from("x"))])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "username", .. }));
    }

    #[test]
    #[serial]
    fn invalid_env_number_is_an_error() {
        clear_env();
        std::env::set_var("PRISMACLOUD_MAX_RETRIES", "lots");
        let err = PartialConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "max_retries", .. }));
        clear_env();
    }

    #[test]
    fn out_of_range_block_numbers_are_errors() {
        for (name, value) in [
            ("port", 70000.0),
            ("timeout", -1.0),
            ("poll_timeout", -5.0),
            ("max_retries", 1.5),
        ] {
            let err = PartialConfig::from_block(&block(&[(name, Dynamic::Number(value))]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { name: n, .. } if n == name),
                "{name}: {err:?}"
            );
        }

        let settings =
            PartialConfig::from_block(&block(&[("port", Dynamic::Number(8443.0))])).unwrap();
        assert_eq!(settings.port, Some(8443));
    }

    #[test]
    #[serial]
    fn json_file_fills_remaining_settings() {
        clear_env();
        let path = std::env::temp_dir().join(format!("prismacloud-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"url":"file.example.com","username":"file-user","password":"file-pass","max_retries":7}"#,
        )
        .unwrap();

        let config = ProviderConfig::resolve(&block(&[
            ("username", Dynamic::from("block-user")),
            (
                "json_config_file",
                Dynamic::from(path.display().to_string()),
            ),
        ]))
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.url, "file.example.com");
        assert_eq!(config.username, "block-user");
        assert_eq!(config.password, "file-pass");
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn protocol_is_validated() {
        let err = PartialConfig {
            url: Some("x".into()),
            username: Some("u".into()),
            password: Some("p".into()),
            protocol: Some("ftp".into()),
            ..Default::default()
        }
        .finish()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProtocol(_)));
    }

    #[test]
    fn base_url_combines_protocol_and_port() {
        let mut config = PartialConfig {
            url: Some("api.prismacloud.io".into()),
            username: Some("u".into()),
            password: Some("p".into()),
            port: Some(8443),
            ..Default::default()
        }
        .finish()
        .unwrap();
        assert_eq!(config.base_url().unwrap(), "https://api.prismacloud.io:8443");

        config.url = "http://127.0.0.1:1234/".into();
        assert_eq!(config.base_url().unwrap(), "http://127.0.0.1:1234");
    }
}
