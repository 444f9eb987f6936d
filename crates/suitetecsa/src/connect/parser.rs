use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::types::{AccountInfo, ConnectInformation, LastConnection};
use crate::parser::{ParseError, elem_text, normalize_whitespace, parse_inputs, selector};
use crate::utils::{parse_currency, parse_datetime, time_to_seconds};

static RE_ATTRIBUTE_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ATTRIBUTE_UUID=(\w+)&CSRFHW=").expect("invalid regex: ATTRIBUTE_UUID")
});

static FORM_SEL: LazyLock<Selector> = LazyLock::new(|| selector("form"));
static FORMULARIO_SEL: LazyLock<Selector> = LazyLock::new(|| selector("#formulario"));
static SESSION_INFO_SEL: LazyLock<Selector> =
    LazyLock::new(|| selector("#sessioninfo > tbody > tr > :not(td.key)"));
static SESSION_TRACE_SEL: LazyLock<Selector> =
    LazyLock::new(|| selector("#sesiontraza > tbody > tr"));
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| selector("td"));

/// A form's action and named inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormData {
    pub action: String,
    pub inputs: HashMap<String, String>,
}

fn form_data(form: ElementRef) -> Result<FormData, ParseError> {
    let action = form
        .value()
        .attr("action")
        .ok_or_else(|| ParseError::MissingField("form action".into()))?;
    Ok(FormData {
        action: action.to_string(),
        inputs: parse_inputs(form),
    })
}

/// The first form of the page the check URL redirects to.
pub fn parse_redirect_form(document: &Html) -> Result<FormData, ParseError> {
    let form = document
        .select(&FORM_SEL)
        .next()
        .ok_or_else(|| ParseError::MissingField("form".into()))?;
    form_data(form)
}

/// The `#formulario` login form with its `CSRFHW` and `wlanuserip` inputs.
pub fn parse_login_form(document: &Html) -> Result<FormData, ParseError> {
    let form = document
        .select(&FORMULARIO_SEL)
        .next()
        .ok_or_else(|| ParseError::MissingField("#formulario".into()))?;
    let data = form_data(form)?;
    for field in ["CSRFHW", "wlanuserip"] {
        if !data.inputs.contains_key(field) {
            return Err(ParseError::MissingField(field.into()));
        }
    }
    Ok(data)
}

pub fn parse_attribute_uuid(body: &str) -> Result<String, ParseError> {
    RE_ATTRIBUTE_UUID
        .captures(body)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ParseError::MissingField("ATTRIBUTE_UUID".into()))
}

fn cell_text(element: ElementRef) -> String {
    normalize_whitespace(&elem_text(element))
}

/// Account block and recent connections shown by `EtecsaQueryServlet`.
pub fn parse_connect_information(document: &Html) -> Result<ConnectInformation, ParseError> {
    let values: Vec<String> = document.select(&SESSION_INFO_SEL).map(cell_text).collect();
    let value = |index: usize, field: &str| {
        values
            .get(index)
            .cloned()
            .ok_or_else(|| ParseError::MissingField(field.to_string()))
    };

    let account_info = AccountInfo {
        account_status: value(0, "account_status")?,
        credit: parse_currency(&value(1, "credit")?)?,
        expiration_date: value(2, "expiration_date")?,
        access_areas: value(3, "access_areas")?,
    };

    let lasts_connections = document
        .select(&SESSION_TRACE_SEL)
        .map(|tr| {
            let cells: Vec<String> = tr.select(&CELL_SEL).map(cell_text).collect();
            match cells.as_slice() {
                [from, to, time] => Ok(LastConnection {
                    from: parse_datetime(from)?,
                    to: parse_datetime(to)?,
                    time: time_to_seconds(time)?,
                }),
                _ => Err(ParseError::MissingField("session trace cell".into())),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ConnectInformation {
        account_info,
        lasts_connections,
    })
}
