use std::collections::HashMap;
use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::types::{ActionKind, Portal};
use crate::utils::ConversionError;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Malformed {action} row: expected {expected} cells, found {found}")]
    MalformedRow {
        action: ActionKind,
        expected: usize,
        found: usize,
    },
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Human readable error(s) a portal embeds in an otherwise successful page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortalMessage {
    Single(String),
    Multiple(Vec<String>),
}

impl Display for PortalMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortalMessage::Single(message) => write!(f, "{}", message),
            PortalMessage::Multiple(messages) => write!(f, "{}", messages.join("; ")),
        }
    }
}

const VARIOUS_ERRORS_TEXT: &str = "Se han detectado algunos errores.";

static RE_USER_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"toastr\.error\('(?P<reason>[^']*?)'\)").expect("invalid regex: toastr error")
});

static RE_USER_SUCCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"toastr\.success\('(?P<reason>[^']*?)'\)").expect("invalid regex: toastr success")
});

static RE_CONNECT_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"alert\("(?P<reason>[^"]*?)"\)"#).expect("invalid regex: alert")
});

static SCRIPT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("invalid selector: script"));
static CSRF_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name=csrf]").expect("invalid selector: csrf"));
static INPUT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name]").expect("invalid selector: input"));
static MSG_ERROR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.msg_error").expect("invalid selector: msg_error"));
static SUB_MESSAGE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.sub-message").expect("invalid selector: sub-message"));

pub(crate) fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector '{css}': {e}"))
}

fn last_script_text(document: &Html) -> Option<String> {
    document
        .select(&SCRIPT_SEL)
        .last()
        .map(|script| elem_text(script).trim().to_string())
}

/// Extracts the error a portal reports through the page's last `<script>`.
///
/// The user portal calls `toastr.error('<html fragment>')`; when the fragment
/// starts with "Se han detectado algunos errores." every `li.sub-message` is a
/// separate field error. The connect portal calls `alert("...")`.
pub fn parse_errors(document: &Html, portal: Portal) -> Option<PortalMessage> {
    let script = last_script_text(document)?;

    match portal {
        Portal::User => {
            let caps = RE_USER_ERROR.captures(&script)?;
            let fragment = Html::parse_fragment(&caps["reason"]);
            let error = fragment.select(&MSG_ERROR_SEL).next()?;

            let fragment_text = normalize_whitespace(&elem_text(fragment.root_element()));
            if fragment_text.starts_with(VARIOUS_ERRORS_TEXT) {
                let messages = error
                    .select(&SUB_MESSAGE_SEL)
                    .map(|e| normalize_whitespace(&elem_text(e)))
                    .filter(|s| !s.is_empty())
                    .collect();
                Some(PortalMessage::Multiple(messages))
            } else {
                Some(PortalMessage::Single(normalize_whitespace(&elem_text(error))))
            }
        }
        Portal::Connect => {
            let caps = RE_CONNECT_ERROR.captures(&script)?;
            Some(PortalMessage::Single(caps["reason"].trim().to_string()))
        }
    }
}

/// The message of a `toastr.success('...')` call, if the page carries one.
pub fn parse_success(document: &Html) -> Option<String> {
    let script = last_script_text(document)?;
    let caps = RE_USER_SUCCESS.captures(&script)?;
    let fragment = Html::parse_fragment(&caps["reason"]);
    let text = normalize_whitespace(&elem_text(fragment.root_element()));
    (!text.is_empty()).then_some(text)
}

pub fn parse_csrf(document: &Html) -> Result<String, ParseError> {
    document
        .select(&CSRF_SEL)
        .next()
        .and_then(|e| e.value().attr("value"))
        .map(str::to_string)
        .ok_or_else(|| ParseError::MissingField("csrf".into()))
}

/// `name -> value` for every named input below `form`. Inputs without a value
/// map to an empty string.
pub fn parse_inputs(form: ElementRef) -> HashMap<String, String> {
    form.select(&INPUT_SEL)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_single_user_error() {
        let html = fs::read_to_string("fixtures/user/login_fail_captcha.html")
            .expect("Failed to read fixture");
        let document = Html::parse_document(&html);

        let error = parse_errors(&document, Portal::User).expect("Should find an error");
        assert_eq!(
            error,
            PortalMessage::Single("El código Captcha no es correcto.".into())
        );
    }

    #[test]
    fn test_parse_multiple_user_errors_in_page_order() {
        let html = fs::read_to_string("fixtures/user/login_fail_fields.html")
            .expect("Failed to read fixture");
        let document = Html::parse_document(&html);

        let error = parse_errors(&document, Portal::User).expect("Should find errors");
        assert_eq!(
            error,
            PortalMessage::Multiple(vec![
                "El campo Usuario es obligatorio.".into(),
                "El campo Contraseña es obligatorio.".into(),
                "El campo Captcha es obligatorio.".into(),
            ])
        );
    }

    #[test]
    fn test_parse_errors_ignores_other_scripts() {
        let html = r#"<html><body><script>toastr.error('x')</script>
            <script>console.log("ready")</script></body></html>"#;
        let document = Html::parse_document(html);
        assert!(parse_errors(&document, Portal::User).is_none());
    }

    #[test]
    fn test_parse_connect_error() {
        let html = r#"<html><body><form id="formulario"></form>
            <script type="text/javascript">alert("Entre el nombre de usuario y contraseña correctos.");</script>
            </body></html>"#;
        let document = Html::parse_document(html);

        assert_eq!(
            parse_errors(&document, Portal::Connect),
            Some(PortalMessage::Single(
                "Entre el nombre de usuario y contraseña correctos.".into()
            ))
        );
        assert!(parse_errors(&document, Portal::User).is_none());
    }

    #[test]
    fn test_parse_success() {
        let html = r#"<html><body><script>toastr.success('<li class="msg_message">Su cuenta ha sido recargada.</li>')</script></body></html>"#;
        let document = Html::parse_document(html);
        assert_eq!(
            parse_success(&document).as_deref(),
            Some("Su cuenta ha sido recargada.")
        );
    }

    #[test]
    fn test_parse_csrf() {
        let html = fs::read_to_string("fixtures/user/csrf_token.html")
            .expect("Failed to read fixture");
        let document = Html::parse_document(&html);
        assert_eq!(parse_csrf(&document).unwrap(), "security6416bea61ad2b");

        let empty = Html::parse_document("<html></html>");
        assert!(matches!(
            parse_csrf(&empty),
            Err(ParseError::MissingField(field)) if field == "csrf"
        ));
    }

    #[test]
    fn test_parse_inputs() {
        let html = r#"<form action="/login"><input name="CSRFHW" value="abc">
            <input name="wlanuserip" value="10.0.0.1"><input name="lang"><input type="submit"></form>"#;
        let document = Html::parse_document(html);
        let inputs = parse_inputs(document.root_element());

        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs["CSRFHW"], "abc");
        assert_eq!(inputs["wlanuserip"], "10.0.0.1");
        assert_eq!(inputs["lang"], "");
    }
}
