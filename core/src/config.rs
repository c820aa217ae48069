//! Connection settings.
//!
//! # Design
//! `ConnectionConfig` is plain data: it can be deserialized with serde from
//! whatever the host application keeps its settings in, built in code, or
//! read from the `SAP_*` environment variables. URL assembly lives here so
//! it can be tested without a connection.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ApiError, Result};

/// Path of the ADT services below the server root.
pub const ADT_MOUNT: &str = "sap/bc/adt";

#[derive(Clone, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub client: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_ssl")]
    pub ssl: bool,
    /// Global per-request timeout; unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_ssl() -> bool {
    true
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("client", &self.client)
            .field("user", &self.user)
            .field("password", &"***")
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        client: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            client: client.into(),
            user: user.into(),
            password: password.into(),
            port: None,
            ssl: true,
            timeout_secs: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Read `SAP_ASHOST`, `SAP_CLIENT`, `SAP_USER` and `SAP_PASSWORD`, plus the
    /// optional `SAP_PORT`, `SAP_SSL` and `SAP_TIMEOUT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ApiError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(
            required("SAP_ASHOST")?,
            required("SAP_CLIENT")?,
            required("SAP_USER")?,
            required("SAP_PASSWORD")?,
        );

        if let Some(port) = lookup("SAP_PORT") {
            config.port = Some(
                port.parse()
                    .map_err(|_| ApiError::Config(format!("SAP_PORT is not a port: {port}")))?,
            );
        }
        if let Some(ssl) = lookup("SAP_SSL") {
            config.ssl = match ssl.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ApiError::Config(format!("SAP_SSL is not a boolean: {ssl}"))),
            };
        }
        if let Some(timeout) = lookup("SAP_TIMEOUT") {
            config.timeout_secs = Some(timeout.parse().map_err(|_| {
                ApiError::Config(format!("SAP_TIMEOUT is not a number of seconds: {timeout}"))
            })?);
        }

        Ok(config)
    }

    pub fn scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }

    /// The explicit port, or 443/80 depending on `ssl`.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.ssl { 443 } else { 80 })
    }

    /// `<scheme>://<host>:<port>/sap/bc/adt`
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme(),
            self.host,
            self.effective_port(),
            ADT_MOUNT
        )
    }

    /// Query arguments sent with every request.
    pub fn query_args(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("sap-client", &self.client)
            .append_pair("saml2", "disabled")
            .finish()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
