use crate::config::{ConfigError, PortalConfig};
use crate::parser::{ParseError, PortalMessage, parse_errors};
use crate::types::Portal;

use reqwest::{Client, Url};
use scraper::Html;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Precondition {
    #[error("you are not logged in")]
    NotLoggedIn,
    #[error("operation only available for Nauta Hogar (home service) accounts")]
    NotHomeService,
    #[error("there is no open internet session")]
    NotConnected,
    #[error("an internet session is already open")]
    AlreadyConnected,
    #[error("the captive portal is not reachable from this network")]
    NoPortalAccess,
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(reqwest::Error),
    #[error("HTTP request timed out: {0}")]
    Timeout(reqwest::Error),
    #[error("Portal rejected the request: {0}")]
    Rejected(PortalMessage),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Precondition failed: {0}")]
    Precondition(#[from] Precondition),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for ScraperError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ScraperError::Timeout(error)
        } else {
            ScraperError::HttpError(error)
        }
    }
}

/// A fetched page: the final URL after redirects and its body.
#[derive(Debug)]
pub(crate) struct Page {
    pub url: Url,
    pub body: String,
}

impl Page {
    /// Parses the body, failing with [`ScraperError::Rejected`] when the page
    /// embeds a portal error.
    pub fn document(&self, portal: Portal) -> Result<Html, ScraperError> {
        let document = Html::parse_document(&self.body);
        match parse_errors(&document, portal) {
            Some(message) => {
                log::warn!("{:?} portal rejected {}: {}", portal, self.url, message);
                Err(ScraperError::Rejected(message))
            }
            None => Ok(document),
        }
    }
}

/// One HTTP client with its own cookie store. Each portal owns one.
#[derive(Debug, Clone)]
pub(crate) struct HttpSession {
    client: Client,
}

impl HttpSession {
    pub fn new(config: &PortalConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }

    pub async fn get(&self, url: &str) -> Result<Page, ScraperError> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?;
        Self::read(response).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<Page, ScraperError> {
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?;
        Self::read(response).await
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ScraperError> {
        log::debug!("GET {}", url);
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .bytes()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;
        Ok(bytes.to_vec())
    }

    async fn read(response: reqwest::Response) -> Result<Page, ScraperError> {
        let url = response.url().clone();
        let body = response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;
        Ok(Page { url, body })
    }
}
