//! Client configuration.
//!
//! `ClientConfig` carries the credential, live/test endpoint selection and
//! the transport options. It is an immutable value shared by reference
//! across requests; nothing in it is mutated by a request.

use serde::Deserialize;

use crate::error::UspsError;
use crate::http::{parse_endpoint, TransportOptions};

pub const LIVE_API_URL: &str = "https://secure.shippingapis.com/ShippingAPI.dll";
pub const TEST_API_URL: &str = "https://stg-secure.shippingapis.com/ShippingAPI.dll";

pub const ENV_USER_ID: &str = "USPS_USER_ID";
pub const ENV_TEST_MODE: &str = "USPS_TEST_MODE";
pub const ENV_LIVE_URL: &str = "USPS_LIVE_URL";
pub const ENV_TEST_URL: &str = "USPS_TEST_URL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub user_id: String,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_live_url")]
    pub live_url: String,
    #[serde(default = "default_test_url")]
    pub test_url: String,
    #[serde(default)]
    pub transport: TransportOptions,
}

fn default_live_url() -> String {
    LIVE_API_URL.to_string()
}

fn default_test_url() -> String {
    TEST_API_URL.to_string()
}

impl ClientConfig {
    /// Live-mode configuration with the vendor's default endpoints.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            test_mode: false,
            live_url: default_live_url(),
            test_url: default_test_url(),
            transport: TransportOptions::default(),
        }
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Point both modes at one URL, e.g. a local mock server.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.live_url = url.clone();
        self.test_url = url;
        self
    }

    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// Read configuration from `USPS_*` environment variables.
    pub fn from_env() -> Result<Self, UspsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, UspsError> {
        let user_id = lookup(ENV_USER_ID)
            .filter(|v| !v.is_empty())
            .ok_or(UspsError::MissingConfig(ENV_USER_ID))?;
        let test_mode = match lookup(ENV_TEST_MODE) {
            None => false,
            Some(value) => parse_flag(&value).ok_or(UspsError::InvalidConfig {
                var: ENV_TEST_MODE,
                value,
            })?,
        };
        let config = Self {
            user_id,
            test_mode,
            live_url: lookup(ENV_LIVE_URL).unwrap_or_else(default_live_url),
            test_url: lookup(ENV_TEST_URL).unwrap_or_else(default_test_url),
            transport: TransportOptions::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check both endpoints parse as http(s) URLs.
    pub fn validate(&self) -> Result<(), UspsError> {
        parse_endpoint(&self.live_url)?;
        parse_endpoint(&self.test_url)?;
        Ok(())
    }

    /// URL selected by the test-mode flag.
    pub fn endpoint(&self) -> &str {
        if self.test_mode {
            &self.test_url
        } else {
            &self.live_url
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
