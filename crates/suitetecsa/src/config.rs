use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Rows per history page on the user portal.
pub const DEFAULT_PAGE_SIZE: u32 = 14;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_user_base_url")]
    pub user_base_url: String,

    #[serde(default = "default_connect_base_url")]
    pub connect_base_url: String,

    /// Plain HTTP page used to detect the captive portal redirect.
    #[serde(default = "default_check_url")]
    pub check_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// How many months `get_lasts` scans back before giving up.
    #[serde(default = "default_lasts_max_months")]
    pub lasts_max_months: u32,
}

fn default_user_base_url() -> String {
    "https://www.portal.nauta.cu/".to_string()
}
fn default_connect_base_url() -> String {
    "https://secure.etecsa.net:8443/".to_string()
}
fn default_check_url() -> String {
    "http://www.cubadebate.cu/".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}
fn default_lasts_max_months() -> u32 {
    24
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            user_base_url: default_user_base_url(),
            connect_base_url: default_connect_base_url(),
            check_url: default_check_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            page_size: default_page_size(),
            lasts_max_months: default_lasts_max_months(),
        }
    }
}

impl PortalConfig {
    /// Points both portals at `base_url`, as a test server or proxy would need.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = format!("{}/", base_url.trim_end_matches('/'));
        Self {
            user_base_url: base.clone(),
            connect_base_url: base.clone(),
            check_url: base,
            ..Self::default()
        }
    }

    /// Rejects values the clients cannot work with, such as a zero page size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("page_size", u64::from(self.page_size)),
            ("lasts_max_months", u64::from(self.lasts_max_months)),
            ("timeout_secs", self.timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(field));
            }
        }
        for (field, value) in [
            ("user_base_url", &self.user_base_url),
            ("connect_base_url", &self.connect_base_url),
            ("check_url", &self.check_url),
        ] {
            if Url::parse(value).is_err() {
                return Err(ConfigError::InvalidUrl {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn user_url(&self, path: &str) -> String {
        format!("{}{}", self.user_base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn connect_url(&self, path: &str) -> String {
        format!("{}{}", self.connect_base_url, path.trim_start_matches('/'))
    }
}
