use reqwest::Url;

use super::parser::{
    parse_attribute_uuid, parse_connect_information, parse_login_form, parse_redirect_form,
};
use super::types::{ConnectInformation, ConnectSession};

use crate::config::PortalConfig;
use crate::parser::{ParseError, PortalMessage};
use crate::scraper::{HttpSession, Page, Precondition, ScraperError};
use crate::types::Portal;
use crate::utils::time_to_seconds;

const QUERY_PATH: &str = "EtecsaQueryServlet";
const LOGOUT_PATH: &str = "LogoutServlet";

/// Client for the captive portal that opens and closes internet sessions.
#[derive(Debug, Clone)]
pub struct ConnectPortal {
    http: HttpSession,
    config: PortalConfig,
    session: Option<ConnectSession>,
}

impl ConnectPortal {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_config(PortalConfig::default())
    }

    pub fn with_config(config: PortalConfig) -> Result<Self, ScraperError> {
        config.validate()?;
        Ok(Self {
            http: HttpSession::new(&config)?,
            config,
            session: None,
        })
    }

    pub fn session(&self) -> Option<&ConnectSession> {
        self.session.as_ref()
    }

    /// Resumes a session saved by an earlier [`ConnectPortal::session`].
    pub fn restore(&mut self, session: ConnectSession) {
        self.session = Some(session);
    }

    fn is_connect_domain(&self, url: &Url) -> bool {
        Url::parse(&self.config.connect_base_url)
            .map(|connect| connect.origin() == url.origin())
            .unwrap_or(false)
    }

    async fn check(&self) -> Result<Page, ScraperError> {
        log::debug!("Checking connection through {}", self.config.check_url);
        self.http.get(&self.config.check_url).await
    }

    /// `true` when the check URL is intercepted by the captive portal.
    pub async fn check_portal_access(&self) -> bool {
        match self.check().await {
            Ok(page) => self.is_connect_domain(&page.url),
            Err(e) => {
                log::debug!("Captive portal not reachable: {}", e);
                false
            }
        }
    }

    /// `true` when the check URL is reached without being redirected.
    pub async fn is_connected(&self) -> Result<bool, ScraperError> {
        let page = self.check().await?;
        Ok(!self.is_connect_domain(&page.url))
    }

    /// Follows the captive portal redirect and reads the login form.
    pub async fn init(&mut self) -> Result<(), ScraperError> {
        let page = self.check().await.map_err(|e| {
            log::debug!("Captive portal not reachable: {}", e);
            Precondition::NoPortalAccess
        })?;
        if !self.is_connect_domain(&page.url) {
            return Err(Precondition::AlreadyConnected.into());
        }

        log::info!("Obtaining pre login data...");
        let redirect = parse_redirect_form(&page.document(Portal::Connect)?)?;
        let action = page
            .url
            .join(&redirect.action)
            .map_err(|_| ParseError::MissingField("form action".into()))?;
        let inputs: Vec<(&str, &str)> = redirect
            .inputs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        log::info!("Connecting to {}", action);
        let page = self.http.post_form(action.as_str(), &inputs).await?;
        let mut login = parse_login_form(&page.document(Portal::Connect)?)?;
        let login_action = page
            .url
            .join(&login.action)
            .map_err(|_| ParseError::MissingField("#formulario action".into()))?;

        self.session = Some(ConnectSession {
            login_action: login_action.to_string(),
            csrfhw: login.inputs.remove("CSRFHW").unwrap_or_default(),
            wlanuserip: login.inputs.remove("wlanuserip").unwrap_or_default(),
            username: None,
            attribute_uuid: None,
        });
        Ok(())
    }

    async fn ensure_session(&mut self) -> Result<ConnectSession, ScraperError> {
        if self.session.is_none() {
            self.init().await?;
        }
        self.session
            .clone()
            .ok_or_else(|| ScraperError::from(ParseError::MissingField("CSRFHW".into())))
    }

    fn connected_session(&self) -> Result<(&ConnectSession, &str, &str), ScraperError> {
        match &self.session {
            Some(
                session @ ConnectSession {
                    username: Some(username),
                    attribute_uuid: Some(uuid),
                    ..
                },
            ) => Ok((session, username.as_str(), uuid.as_str())),
            _ => Err(Precondition::NotConnected.into()),
        }
    }

    /// Opens an internet session.
    pub async fn connect(&mut self, username: &str, password: &str) -> Result<(), ScraperError> {
        if username.is_empty() {
            return Err(Precondition::MissingArgument("username").into());
        }
        if password.is_empty() {
            return Err(Precondition::MissingArgument("password").into());
        }
        if self.session.as_ref().is_some_and(ConnectSession::is_connected) {
            return Err(Precondition::AlreadyConnected.into());
        }

        let session = self.ensure_session().await?;
        log::info!("Opening internet session for {}...", username);
        let page = self
            .http
            .post_form(
                &session.login_action,
                &[
                    ("CSRFHW", session.csrfhw.as_str()),
                    ("wlanuserip", session.wlanuserip.as_str()),
                    ("username", username),
                    ("password", password),
                ],
            )
            .await?;

        if !page.url.as_str().contains("online.do") {
            page.document(Portal::Connect)?;
            return Err(ScraperError::Rejected(PortalMessage::Single(format!(
                "login was not accepted (landed on {})",
                page.url
            ))));
        }

        let attribute_uuid = parse_attribute_uuid(&page.body)?;
        log::debug!("Session ATTRIBUTE_UUID: {}", attribute_uuid);
        self.session = Some(ConnectSession {
            username: Some(username.to_string()),
            attribute_uuid: Some(attribute_uuid),
            ..session
        });
        Ok(())
    }

    /// Seconds left at the current credit, as reported for the open session.
    pub async fn remaining_time(&self) -> Result<u64, ScraperError> {
        let (session, username, uuid) = self.connected_session()?;
        let page = self
            .http
            .post_form(
                &self.config.connect_url(QUERY_PATH),
                &[
                    ("op", "getLeftTime"),
                    ("ATTRIBUTE_UUID", uuid),
                    ("CSRFHW", session.csrfhw.as_str()),
                    ("wlanuserip", session.wlanuserip.as_str()),
                    ("username", username),
                ],
            )
            .await?;
        Ok(time_to_seconds(page.body.trim()).map_err(ParseError::from)?)
    }

    /// Account details and recent connections of `username`. Works without an
    /// open session.
    pub async fn connect_information(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<ConnectInformation, ScraperError> {
        let session = self.ensure_session().await?;
        log::info!("Fetching connect information for {}...", username);
        let page = self
            .http
            .post_form(
                &self.config.connect_url(QUERY_PATH),
                &[
                    ("username", username),
                    ("password", password),
                    ("wlanuserip", session.wlanuserip.as_str()),
                    ("CSRFHW", session.csrfhw.as_str()),
                    ("lang", ""),
                ],
            )
            .await?;
        Ok(parse_connect_information(&page.document(Portal::Connect)?)?)
    }

    /// Closes the open internet session.
    pub async fn disconnect(&mut self) -> Result<(), ScraperError> {
        let (session, username, uuid) = self.connected_session()?;
        let mut url = Url::parse(&self.config.connect_url(LOGOUT_PATH))
            .map_err(|_| ParseError::MissingField("logout url".into()))?;
        url.query_pairs_mut()
            .append_pair("CSRFHW", &session.csrfhw)
            .append_pair("username", username)
            .append_pair("ATTRIBUTE_UUID", uuid)
            .append_pair("wlanuserip", &session.wlanuserip);

        log::info!("Closing internet session for {}...", username);
        let page = self.http.get(url.as_str()).await?;
        if !page.body.to_uppercase().contains("SUCCESS") {
            let reply: String = page.body.trim().chars().take(100).collect();
            return Err(ScraperError::Rejected(PortalMessage::Single(format!(
                "logout failed: {reply}"
            ))));
        }

        self.session = None;
        Ok(())
    }
}
