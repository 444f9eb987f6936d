use super::pages::{PagePlan, take_page_rows};
use super::parser::{Row, map_row, parse_account_profile, parse_history_rows, parse_summary};
use super::types::{AccountProfile, ActionKind, Record, Summary};

use crate::config::PortalConfig;
use crate::parser::{parse_csrf, parse_success};
use crate::scraper::{HttpSession, Precondition, ScraperError};
use crate::types::Portal;

const LOGIN_PATH: &str = "user/login/es-es";
const LOGOUT_PATH: &str = "user/logout";
const CAPTCHA_PATH: &str = "captcha/?";
const USER_INFO_PATH: &str = "useraaa/user_info";
const RECHARGE_PATH: &str = "useraaa/recharge_account";
const TRANSFER_PATH: &str = "useraaa/transfer_balance";
const NAUTA_HOGAR_PAID_PATH: &str = "useraaa/transfer_nautahogarpaid";
const CHANGE_PASSWORD_PATH: &str = "useraaa/change_password";
const CHANGE_EMAIL_PASSWORD_PATH: &str = "mail/change_password";

#[derive(Debug, Clone, Default)]
struct UserSession {
    csrf: Option<String>,
    username: Option<String>,
    home_service: bool,
}

/// Client for the Nauta self-service portal.
///
/// Owns its cookie store and session state. Calls that change the session
/// take `&mut self`; share it behind a lock if several tasks need it.
#[derive(Debug, Clone)]
pub struct UserPortal {
    http: HttpSession,
    pub(crate) config: PortalConfig,
    session: UserSession,
}

impl UserPortal {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_config(PortalConfig::default())
    }

    pub fn with_config(config: PortalConfig) -> Result<Self, ScraperError> {
        config.validate()?;
        Ok(Self {
            http: HttpSession::new(&config)?,
            config,
            session: UserSession::default(),
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.username.is_some()
    }

    pub fn is_home_service(&self) -> bool {
        self.session.home_service
    }

    pub fn csrf(&self) -> Option<&str> {
        self.session.csrf.as_deref()
    }

    fn require_login(&self) -> Result<(), ScraperError> {
        if self.is_logged_in() {
            Ok(())
        } else {
            Err(Precondition::NotLoggedIn.into())
        }
    }

    pub(crate) fn require_action(&self, action: ActionKind) -> Result<(), ScraperError> {
        self.require_login()?;
        if action.requires_home_service() && !self.session.home_service {
            return Err(Precondition::NotHomeService.into());
        }
        Ok(())
    }

    /// Opens a portal session and stores the login form's CSRF token.
    pub async fn init(&mut self) -> Result<(), ScraperError> {
        let url = self.config.user_url(LOGIN_PATH);
        log::info!("Initializing user portal session...");
        let page = self.http.get(&url).await?;
        let csrf = parse_csrf(&page.document(Portal::User)?)?;
        self.session.csrf = Some(csrf);
        Ok(())
    }

    pub async fn captcha_image(&mut self) -> Result<Vec<u8>, ScraperError> {
        if self.session.csrf.is_none() {
            self.init().await?;
        }
        self.http.get_bytes(&self.config.user_url(CAPTCHA_PATH)).await
    }

    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
        captcha_code: &str,
    ) -> Result<AccountProfile, ScraperError> {
        if username.is_empty() {
            return Err(Precondition::MissingArgument("username").into());
        }
        if password.is_empty() {
            return Err(Precondition::MissingArgument("password").into());
        }
        if captcha_code.is_empty() {
            return Err(Precondition::MissingArgument("captcha code").into());
        }
        if self.session.csrf.is_none() {
            self.init().await?;
        }

        let csrf = self.session.csrf.clone().unwrap_or_default();
        let captcha = captcha_code.to_uppercase();
        log::info!("Logging in as {}...", username);
        let page = self
            .http
            .post_form(
                &self.config.user_url(LOGIN_PATH),
                &[
                    ("csrf", csrf.as_str()),
                    ("login_user", username),
                    ("password_user", password),
                    ("captcha", captcha.as_str()),
                    ("btn_submit", ""),
                ],
            )
            .await?;

        let profile = parse_account_profile(&page.document(Portal::User)?)?;
        self.session.username = Some(username.to_string());
        self.session.home_service = profile.is_home_service();
        Ok(profile)
    }

    pub async fn user_information(&mut self) -> Result<AccountProfile, ScraperError> {
        self.require_login()?;
        log::info!("Fetching account information...");
        let page = self.http.get(&self.config.user_url(USER_INFO_PATH)).await?;
        let profile = parse_account_profile(&page.document(Portal::User)?)?;
        self.session.home_service = profile.is_home_service();
        Ok(profile)
    }

    pub async fn logout(&mut self) -> Result<(), ScraperError> {
        self.require_login()?;
        log::info!("Logging out...");
        self.http.get(&self.config.user_url(LOGOUT_PATH)).await?;
        self.session = UserSession::default();
        Ok(())
    }

    /// GETs `path` for a fresh CSRF token, then POSTs `fields` along with it.
    ///
    /// Returns the success toast message, when the portal shows one.
    async fn submit_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<Option<String>, ScraperError> {
        let url = self.config.user_url(path);
        let page = self.http.get(&url).await?;
        let csrf = parse_csrf(&page.document(Portal::User)?)?;

        let mut form = vec![("csrf", csrf.as_str())];
        form.extend_from_slice(fields);
        log::info!("Submitting form to {}", url);
        let page = self.http.post_form(&url, &form).await?;
        Ok(parse_success(&page.document(Portal::User)?))
    }

    pub async fn recharge(&self, recharge_code: &str) -> Result<Option<String>, ScraperError> {
        self.require_login()?;
        if recharge_code.is_empty() {
            return Err(Precondition::MissingArgument("recharge code").into());
        }
        self.submit_form(
            RECHARGE_PATH,
            &[("recharge_code", recharge_code), ("btn_submit", "")],
        )
        .await
    }

    pub async fn transfer(
        &self,
        amount: f64,
        password: &str,
        destination_account: &str,
    ) -> Result<Option<String>, ScraperError> {
        self.require_login()?;
        if destination_account.is_empty() {
            return Err(Precondition::MissingArgument("destination account").into());
        }
        let amount = format_amount(amount);
        self.submit_form(
            TRANSFER_PATH,
            &[
                ("transfer", amount.as_str()),
                ("password_user", password),
                ("id_cuenta", destination_account),
                ("action", "checkdata"),
            ],
        )
        .await
    }

    /// Pays the Nauta Hogar quote from the account's credit.
    pub async fn pay_nauta_home(
        &self,
        amount: f64,
        password: &str,
    ) -> Result<Option<String>, ScraperError> {
        self.require_login()?;
        if !self.session.home_service {
            return Err(Precondition::NotHomeService.into());
        }
        let amount = format_amount(amount);
        self.submit_form(
            NAUTA_HOGAR_PAID_PATH,
            &[
                ("transfer", amount.as_str()),
                ("password_user", password),
                ("action", "checkdata"),
            ],
        )
        .await
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<Option<String>, ScraperError> {
        self.require_login()?;
        self.submit_form(
            CHANGE_PASSWORD_PATH,
            &password_fields(old_password, new_password),
        )
        .await
    }

    pub async fn change_email_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<Option<String>, ScraperError> {
        self.require_login()?;
        self.submit_form(
            CHANGE_EMAIL_PASSWORD_PATH,
            &password_fields(old_password, new_password),
        )
        .await
    }

    /// Fetches the summary of one month of `action` history.
    pub async fn get_summary(
        &self,
        action: ActionKind,
        year: i32,
        month: u32,
    ) -> Result<Summary, ScraperError> {
        self.require_action(action)?;

        let base_url = self.config.user_url(&format!("useraaa/{}/", action.slug()));
        let page = self.http.get(&base_url).await?;
        let csrf = parse_csrf(&page.document(Portal::User)?)?;

        let year_month = format!("{}-{:02}", year, month);
        log::info!("Fetching {} summary for {}...", action, year_month);
        let page = self
            .http
            .post_form(
                &self
                    .config
                    .user_url(&format!("useraaa/{}_summary/", action.slug())),
                &[
                    ("csrf", csrf.as_str()),
                    ("year_month", year_month.as_str()),
                    ("list_type", action.slug()),
                ],
            )
            .await?;

        let summary = parse_summary(&page.document(Portal::User)?, action)?;
        log::debug!("{}", summary);
        Ok(summary)
    }

    /// Fetches up to `large` raw history rows (`0` = all), one request per
    /// page, stopping as soon as the quota is met.
    ///
    /// Pages without a table contribute no rows.
    pub async fn fetch_rows(
        &self,
        action: ActionKind,
        year_month_selected: &str,
        count: u32,
        large: u32,
        reversed: bool,
    ) -> Result<Vec<Row>, ScraperError> {
        let plan = PagePlan::new(count, large, reversed, self.config.page_size);
        let limit = plan.limit();
        log::debug!(
            "Planning {} of {} page(s) for {} rows of {} ({}reversed)",
            plan.expected_requests(),
            plan.total_pages(),
            limit,
            action,
            if reversed { "" } else { "not " }
        );

        let mut rows: Vec<Row> = Vec::new();
        for marker in plan {
            if rows.len() >= limit as usize {
                break;
            }
            let url = self.config.user_url(&format!(
                "useraaa/{}_list/{}/{}",
                action.slug(),
                year_month_selected,
                marker.path(count)
            ));
            log::info!("Fetching {} page {}: {}", action, marker.page_number(), url);
            let page = self.http.get(&url).await?;
            match parse_history_rows(&page.document(Portal::User)?) {
                Some(page_rows) => take_page_rows(&mut rows, page_rows, limit, reversed),
                None => log::warn!("No table found on {} page {}", action, marker.page_number()),
            }
        }

        Ok(rows)
    }

    /// Fetches one month of `action` records.
    ///
    /// `summary` skips the summary request when the caller already has it.
    /// `large` caps the number of records (`0` = all); `reversed` walks pages
    /// from the last one, returning the most recent records first.
    pub async fn get_records(
        &self,
        action: ActionKind,
        year: i32,
        month: u32,
        summary: Option<&Summary>,
        large: u32,
        reversed: bool,
    ) -> Result<Vec<Record>, ScraperError> {
        self.require_action(action)?;
        let fetched;
        let summary = match summary {
            Some(summary) => summary,
            None => {
                fetched = self.get_summary(action, year, month).await?;
                &fetched
            }
        };

        if summary.count == 0 {
            return Ok(Vec::new());
        }

        let rows = self
            .fetch_rows(
                action,
                &summary.year_month_selected,
                summary.count,
                large,
                reversed,
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| map_row(row, action))
            .collect::<Result<Vec<_>, _>>()?)
    }
}

fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount).replace('.', ",")
}

fn password_fields<'a>(old_password: &'a str, new_password: &'a str) -> [(&'a str, &'a str); 4] {
    [
        ("old_password", old_password),
        ("new_password", new_password),
        ("repeat_new_password", new_password),
        ("btn_submit", ""),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::PortalMessage;
    use std::fs;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn fixture(name: &str) -> String {
        fs::read_to_string(format!("fixtures/user/{}", name))
            .unwrap_or_else(|e| panic!("Failed to read fixture {name}: {e}"))
    }

    pub(crate) fn html(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
    }

    pub(crate) async fn mount_get(server: &MockServer, at: &str, body: String, times: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(html(body))
            .expect(times)
            .mount(server)
            .await;
    }

    /// A portal logged in against `server` with a regular or home account.
    pub(crate) async fn logged_in_portal(server: &MockServer, home: bool) -> UserPortal {
        mount_get(server, "/user/login/es-es", fixture("csrf_token.html"), 1).await;
        let profile = if home {
            "user_info_home.html"
        } else {
            "user_info.html"
        };
        Mock::given(method("POST"))
            .and(path("/user/login/es-es"))
            .respond_with(html(fixture(profile)))
            .expect(1)
            .mount(server)
            .await;

        let mut portal =
            UserPortal::with_config(PortalConfig::with_base_url(&server.uri())).unwrap();
        portal
            .login("user.name@nauta.com.cu", "some_password", "abcd")
            .await
            .expect("login should succeed");
        portal
    }

    /// A connections page with `rows` rows numbered from `first`, oldest first.
    pub(crate) fn connections_page(year_month: (i32, u32), first: u32, rows: u32) -> String {
        let (year, month) = year_month;
        let body: String = (first..first + rows)
            .map(|i| {
                let day = 1 + i / 24;
                let hour = i % 24;
                format!(
                    "<tr><td>{day:02}/{month:02}/{year} {hour:02}:00:00</td>\
                     <td>{day:02}/{month:02}/{year} {hour:02}:30:00</td>\
                     <td>00:30:00</td><td>1,5 MB</td><td>12 MB</td><td>$3,75 CUP</td></tr>"
                )
            })
            .collect();
        format!(
            r#"<html><body><table class="responsive-table"><thead><tr><th>Inicio</th></tr></thead>
            <tbody>{body}</tbody></table></body></html>"#
        )
    }

    #[tokio::test]
    async fn test_init_stores_csrf() {
        let server = MockServer::start().await;
        mount_get(&server, "/user/login/es-es", fixture("csrf_token.html"), 1).await;

        let mut portal =
            UserPortal::with_config(PortalConfig::with_base_url(&server.uri())).unwrap();
        portal.init().await.unwrap();
        assert_eq!(portal.csrf(), Some("security6416bea61ad2b"));
    }

    #[tokio::test]
    async fn test_login_sends_uppercased_captcha() {
        let server = MockServer::start().await;
        mount_get(&server, "/user/login/es-es", fixture("csrf_token.html"), 1).await;
        Mock::given(method("POST"))
            .and(path("/user/login/es-es"))
            .and(body_string_contains("captcha=ABCD"))
            .and(body_string_contains("csrf=security6416bea61ad2b"))
            .respond_with(html(fixture("user_info.html")))
            .expect(1)
            .mount(&server)
            .await;

        let mut portal =
            UserPortal::with_config(PortalConfig::with_base_url(&server.uri())).unwrap();
        let profile = portal
            .login("user.name@nauta.com.cu", "some_password", "abcd")
            .await
            .unwrap();

        assert_eq!(profile.username, "user.name@nauta.com.cu");
        assert!(portal.is_logged_in());
        assert!(!portal.is_home_service());
    }

    #[tokio::test]
    async fn test_login_with_three_field_errors() {
        let server = MockServer::start().await;
        mount_get(&server, "/user/login/es-es", fixture("csrf_token.html"), 1).await;
        Mock::given(method("POST"))
            .and(path("/user/login/es-es"))
            .respond_with(html(fixture("login_fail_fields.html")))
            .mount(&server)
            .await;

        let mut portal =
            UserPortal::with_config(PortalConfig::with_base_url(&server.uri())).unwrap();
        let err = portal
            .login("user.name@nauta.com.cu", "some_password", "abcd")
            .await
            .unwrap_err();

        match err {
            ScraperError::Rejected(PortalMessage::Multiple(messages)) => assert_eq!(
                messages,
                vec![
                    "El campo Usuario es obligatorio.",
                    "El campo Contraseña es obligatorio.",
                    "El campo Captcha es obligatorio.",
                ]
            ),
            other => panic!("Expected a multi-message rejection, got {other:?}"),
        }
        assert!(!portal.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_requires_arguments() {
        let mut portal = UserPortal::new().unwrap();
        let err = portal.login("user", "", "abcd").await.unwrap_err();
        assert!(matches!(
            err,
            ScraperError::Precondition(Precondition::MissingArgument("password"))
        ));
    }

    #[tokio::test]
    async fn test_queries_require_login() {
        let portal = UserPortal::new().unwrap();
        let err = portal
            .get_summary(ActionKind::Recharges, 2023, 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScraperError::Precondition(Precondition::NotLoggedIn)
        ));
    }

    #[tokio::test]
    async fn test_quotes_paid_requires_home_service() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;

        let err = portal
            .get_records(ActionKind::QuotesPaid, 2023, 3, None, 0, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScraperError::Precondition(Precondition::NotHomeService)
        ));
        let err = portal.pay_nauta_home(300.0, "some_password").await.unwrap_err();
        assert!(matches!(
            err,
            ScraperError::Precondition(Precondition::NotHomeService)
        ));
    }

    #[tokio::test]
    async fn test_get_summary_posts_year_month() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_get(&server, "/useraaa/recharge_detail/", fixture("csrf_token.html"), 1).await;
        Mock::given(method("POST"))
            .and(path("/useraaa/recharge_detail_summary/"))
            .and(body_string_contains("year_month=2023-03"))
            .and(body_string_contains("list_type=recharge_detail"))
            .respond_with(html(fixture("rd_summary.html")))
            .expect(1)
            .mount(&server)
            .await;

        let summary = portal
            .get_summary(ActionKind::Recharges, 2023, 3)
            .await
            .unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.year_month_selected, "2023-03");
    }

    #[tokio::test]
    async fn test_two_recharges_take_one_page_request() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_get(&server, "/useraaa/recharge_detail/", fixture("csrf_token.html"), 1).await;
        Mock::given(method("POST"))
            .and(path("/useraaa/recharge_detail_summary/"))
            .respond_with(html(fixture("rd_summary.html")))
            .expect(1)
            .mount(&server)
            .await;
        mount_get(
            &server,
            "/useraaa/recharge_detail_list/2023-03/2",
            fixture("rdl_2023-03_2.html"),
            1,
        )
        .await;

        let records = portal
            .get_records(ActionKind::Recharges, 2023, 3, None, 0, false)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        let Record::Recharge(first) = &records[0] else {
            panic!("Expected a recharge");
        };
        assert_eq!(first.import, 25.0);
        assert_eq!(first.channel, "Cupet");
        assert_eq!(first.recharge_type, "Tarjeta");
        assert_eq!(first.date.to_string(), "2023-03-04 10:00:00");
    }

    fn summary(action: ActionKind, count: u32, year_month: &str) -> Summary {
        Summary {
            action,
            count,
            year_month_selected: year_month.to_string(),
            total_import: 0.0,
            traffic: None,
        }
    }

    async fn mount_47_connections(server: &MockServer, times: [u64; 4]) {
        let base = "/useraaa/service_detail_list/2022-05/47";
        mount_get(server, base, connections_page((2022, 5), 0, 14), times[0]).await;
        mount_get(server, &format!("{base}/2"), connections_page((2022, 5), 14, 14), times[1])
            .await;
        mount_get(server, &format!("{base}/3"), connections_page((2022, 5), 28, 14), times[2])
            .await;
        mount_get(server, &format!("{base}/4"), connections_page((2022, 5), 42, 5), times[3])
            .await;
    }

    #[tokio::test]
    async fn test_47_connections_take_four_page_requests() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_47_connections(&server, [1, 1, 1, 1]).await;

        let summary = summary(ActionKind::Connections, 47, "2022-05");
        let records = portal
            .get_records(ActionKind::Connections, 2022, 5, Some(&summary), 0, false)
            .await
            .unwrap();

        assert_eq!(records.len(), 47);
        let dates: Vec<_> = records.iter().map(Record::date).collect();
        assert!(
            dates.windows(2).all(|w| w[0] < w[1]),
            "forward pagination keeps server order without gaps or duplicates"
        );
    }

    #[tokio::test]
    async fn test_reversed_partial_fetch_takes_latest_rows() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        // Last page has 5 rows, so 8 rows need pages 4 and 3 only.
        mount_47_connections(&server, [0, 0, 1, 1]).await;

        let rows = portal
            .fetch_rows(ActionKind::Connections, "2022-05", 47, 8, true)
            .await
            .unwrap();

        assert_eq!(rows.len(), 8);
        let records: Vec<_> = rows
            .iter()
            .map(|r| map_row(r, ActionKind::Connections).unwrap())
            .collect();
        let all: Vec<_> = (0..47)
            .map(|i| {
                let page = connections_page((2022, 5), i, 1);
                let document = ::scraper::Html::parse_document(&page);
                let row = parse_history_rows(&document).unwrap().remove(0);
                map_row(&row, ActionKind::Connections).unwrap()
            })
            .collect();
        let expected: Vec<_> = all.iter().rev().take(8).cloned().collect();
        assert_eq!(records, expected);
    }

    #[tokio::test]
    async fn test_forward_fetch_stops_once_quota_met() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_47_connections(&server, [1, 1, 0, 0]).await;

        let rows = portal
            .fetch_rows(ActionKind::Connections, "2022-05", 47, 20, false)
            .await
            .unwrap();
        assert_eq!(rows.len(), 20);
    }

    #[tokio::test]
    async fn test_missing_table_counts_as_empty_page() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        let base = "/useraaa/service_detail_list/2022-05/20";
        mount_get(&server, base, connections_page((2022, 5), 0, 14), 1).await;
        mount_get(
            &server,
            &format!("{base}/2"),
            "<html><body><p>Sin datos</p></body></html>".to_string(),
            1,
        )
        .await;

        let rows = portal
            .fetch_rows(ActionKind::Connections, "2022-05", 20, 0, false)
            .await
            .unwrap();
        assert_eq!(rows.len(), 14);
    }

    #[tokio::test]
    async fn test_zero_count_issues_no_page_requests() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;

        let summary = summary(ActionKind::Transfers, 0, "2023-03");
        let records = portal
            .get_records(ActionKind::Transfers, 2023, 3, Some(&summary), 0, false)
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_page_error_is_a_rejection() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_get(
            &server,
            "/useraaa/transfer_detail_list/2023-03/3",
            fixture("login_fail_captcha.html"),
            1,
        )
        .await;

        let err = portal
            .fetch_rows(ActionKind::Transfers, "2023-03", 3, 0, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Rejected(PortalMessage::Single(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        Mock::given(method("GET"))
            .and(path("/useraaa/transfer_detail/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = portal
            .get_summary(ActionKind::Transfers, 2023, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::HttpError(_)));
    }

    #[tokio::test]
    async fn test_slow_page_is_a_timeout() {
        let server = MockServer::start().await;
        let mut config = PortalConfig::with_base_url(&server.uri());
        config.timeout_secs = 1;
        Mock::given(method("GET"))
            .and(path("/user/login/es-es"))
            .respond_with(
                html(fixture("csrf_token.html")).set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut portal = UserPortal::with_config(config).unwrap();
        let err = portal.init().await.unwrap_err();
        assert!(matches!(err, ScraperError::Timeout(_)));
    }

    #[test]
    fn test_zero_page_size_is_refused() {
        let mut config = PortalConfig::with_base_url("http://127.0.0.1:8080");
        config.page_size = 0;
        assert!(matches!(
            UserPortal::with_config(config),
            Err(ScraperError::Config(crate::config::ConfigError::Zero("page_size")))
        ));
    }

    #[tokio::test]
    async fn test_recharge_posts_code_and_reads_success() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_get(&server, "/useraaa/recharge_account", fixture("csrf_token.html"), 1).await;
        Mock::given(method("POST"))
            .and(path("/useraaa/recharge_account"))
            .and(body_string_contains("recharge_code=1234567890123456"))
            .respond_with(html(fixture("recharge_success.html")))
            .expect(1)
            .mount(&server)
            .await;

        let message = portal.recharge("1234567890123456").await.unwrap();
        assert_eq!(
            message.as_deref(),
            Some("Su cuenta ha sido recargada satisfactoriamente.")
        );
    }

    #[tokio::test]
    async fn test_recharge_rejected() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_get(&server, "/useraaa/recharge_account", fixture("csrf_token.html"), 1).await;
        Mock::given(method("POST"))
            .and(path("/useraaa/recharge_account"))
            .respond_with(html(fixture("recharge_fail.html")))
            .mount(&server)
            .await;

        let err = portal.recharge("1234567890123456").await.unwrap_err();
        assert!(matches!(
            err,
            ScraperError::Rejected(PortalMessage::Single(message))
                if message == "El código de recarga es incorrecto."
        ));
    }

    #[tokio::test]
    async fn test_transfer_formats_amount_with_comma() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_get(&server, "/useraaa/transfer_balance", fixture("csrf_token.html"), 1).await;
        Mock::given(method("POST"))
            .and(path("/useraaa/transfer_balance"))
            .and(body_string_contains("transfer=25%2C50"))
            .and(body_string_contains("id_cuenta=friend%40nauta.com.cu"))
            .respond_with(html("<html><body></body></html>".to_string()))
            .expect(1)
            .mount(&server)
            .await;

        let message = portal
            .transfer(25.5, "some_password", "friend@nauta.com.cu")
            .await
            .unwrap();
        assert!(message.is_none());
    }

    #[tokio::test]
    async fn test_change_password_rejected_lists_errors() {
        let server = MockServer::start().await;
        let portal = logged_in_portal(&server, false).await;
        mount_get(&server, "/useraaa/change_password", fixture("csrf_token.html"), 1).await;
        Mock::given(method("POST"))
            .and(path("/useraaa/change_password"))
            .respond_with(html(fixture("change_password_fail.html")))
            .mount(&server)
            .await;

        let err = portal
            .change_password("some_password", "short")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScraperError::Rejected(PortalMessage::Multiple(messages)) if messages.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let server = MockServer::start().await;
        let mut portal = logged_in_portal(&server, true).await;
        assert!(portal.is_home_service());
        mount_get(&server, "/user/logout", "<html></html>".to_string(), 1).await;

        portal.logout().await.unwrap();
        assert!(!portal.is_logged_in());
        assert!(!portal.is_home_service());
        assert!(portal.csrf().is_none());
    }
}
