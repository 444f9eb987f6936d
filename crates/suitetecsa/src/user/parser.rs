use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::types::{
    AccountProfile, ActionKind, Connection, HomeService, QuotePaid, Recharge, Record, Summary,
    TrafficTotals, Transfer,
};
use crate::parser::{ParseError, elem_text, normalize_whitespace, selector};
use crate::utils::{parse_bytes, parse_currency, parse_date, parse_datetime, time_to_seconds};

/// Raw text cells of one history table row.
pub type Row = Vec<String>;

static CARD_SEL: LazyLock<Selector> = LazyLock::new(|| selector("#content .card-content"));
static STATS_SEL: LazyLock<Selector> = LazyLock::new(|| selector(".card-stats-number"));
static COUNT_SEL: LazyLock<Selector> = LazyLock::new(|| selector("input[name=count]"));
static YEAR_MONTH_SEL: LazyLock<Selector> =
    LazyLock::new(|| selector("input[name=year_month_selected]"));
static TABLE_BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| selector(".responsive-table > tbody"));
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static PROFILE_SEL: LazyLock<Selector> = LazyLock::new(|| selector(".z-depth-1 .m6"));
static PROFILE_VALUE_SEL: LazyLock<Selector> = LazyLock::new(|| selector("p"));

fn cell_text(element: ElementRef) -> String {
    normalize_whitespace(&elem_text(element))
}

fn stats_number(card: ElementRef, field: &str) -> Result<String, ParseError> {
    card.select(&STATS_SEL)
        .next()
        .map(cell_text)
        .ok_or_else(|| ParseError::MissingField(field.to_string()))
}

fn input_value(card: ElementRef, sel: &Selector, field: &str) -> Result<String, ParseError> {
    card.select(sel)
        .next()
        .and_then(|e| e.value().attr("value"))
        .map(|v| v.trim().to_string())
        .ok_or_else(|| ParseError::MissingField(field.to_string()))
}

/// Parses the summary cards shown after posting a year-month to
/// `<slug>_summary/`.
///
/// The first card carries the row count and the `year_month_selected` token.
/// Connections then list total time, total import, uploaded, downloaded and
/// total traffic; every other history lists only the total import.
pub fn parse_summary(document: &Html, action: ActionKind) -> Result<Summary, ParseError> {
    let cards: Vec<ElementRef> = document.select(&CARD_SEL).collect();
    let card = |i: usize, field: &str| {
        cards
            .get(i)
            .copied()
            .ok_or_else(|| ParseError::MissingField(field.to_string()))
    };

    let head = card(0, "count")?;
    let raw_count = input_value(head, &COUNT_SEL, "count")?;
    let count = raw_count
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidNumber(raw_count.clone()))?;
    let year_month_selected = input_value(head, &YEAR_MONTH_SEL, "year_month_selected")?;

    let (total_import, traffic) = match action {
        ActionKind::Connections => {
            let total_time = time_to_seconds(&stats_number(card(1, "total_time")?, "total_time")?)?;
            let total_import =
                parse_currency(&stats_number(card(2, "total_import")?, "total_import")?)?;
            let uploaded = parse_bytes(&stats_number(card(3, "uploaded")?, "uploaded")?)?;
            let downloaded = parse_bytes(&stats_number(card(4, "downloaded")?, "downloaded")?)?;
            let total_traffic =
                parse_bytes(&stats_number(card(5, "total_traffic")?, "total_traffic")?)?;
            (
                total_import,
                Some(TrafficTotals {
                    total_time,
                    uploaded,
                    downloaded,
                    total_traffic,
                }),
            )
        }
        ActionKind::Recharges | ActionKind::Transfers | ActionKind::QuotesPaid => {
            let total_import =
                parse_currency(&stats_number(card(1, "total_import")?, "total_import")?)?;
            (total_import, None)
        }
    };

    Ok(Summary {
        action,
        count,
        year_month_selected,
        total_import,
        traffic,
    })
}

/// Rows of the first element matching `container`, in document order.
///
/// `None` when the container is absent from the page.
pub fn extract_rows(document: &Html, container: &Selector) -> Option<Vec<Row>> {
    let body = document.select(container).next()?;
    Some(
        body.select(&ROW_SEL)
            .map(|tr| tr.select(&CELL_SEL).map(cell_text).collect::<Row>())
            .filter(|row| !row.is_empty())
            .collect(),
    )
}

/// Rows of a history page's `.responsive-table`.
pub fn parse_history_rows(document: &Html) -> Option<Vec<Row>> {
    extract_rows(document, &TABLE_BODY_SEL)
}

/// Maps one history row to its typed record.
pub fn map_row(row: &[String], action: ActionKind) -> Result<Record, ParseError> {
    if row.len() != action.cell_count() {
        return Err(ParseError::MalformedRow {
            action,
            expected: action.cell_count(),
            found: row.len(),
        });
    }

    let record = match action {
        ActionKind::Connections => Record::Connection(Connection {
            start_session: parse_datetime(&row[0])?,
            end_session: parse_datetime(&row[1])?,
            duration: time_to_seconds(&row[2])?,
            uploaded: parse_bytes(&row[3])?,
            downloaded: parse_bytes(&row[4])?,
            import: parse_currency(&row[5])?,
        }),
        ActionKind::Recharges => Record::Recharge(Recharge {
            date: parse_datetime(&row[0])?,
            import: parse_currency(&row[1])?,
            channel: row[2].clone(),
            recharge_type: row[3].clone(),
        }),
        ActionKind::Transfers => Record::Transfer(Transfer {
            date: parse_datetime(&row[0])?,
            import: parse_currency(&row[1])?,
            destiny_account: row[2].clone(),
        }),
        ActionKind::QuotesPaid => Record::QuotePaid(QuotePaid {
            date: parse_datetime(&row[0])?,
            import: parse_currency(&row[1])?,
            channel: row[2].clone(),
            quote_type: row[3].clone(),
            office: row[4].clone(),
        }),
    };

    Ok(record)
}

fn optional<T, E>(
    values: &[String],
    index: usize,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<Option<T>, ParseError>
where
    ParseError: From<E>,
{
    match values.get(index).filter(|v| !v.is_empty()) {
        Some(value) => Ok(Some(parse(value)?)),
        None => Ok(None),
    }
}

/// Parses the profile cards of `useraaa/user_info` (also shown after login).
///
/// Values are positional. Accounts with a Nauta Hogar offer show a ninth card
/// and the rest of the home service block after it.
pub fn parse_account_profile(document: &Html) -> Result<AccountProfile, ParseError> {
    let values: Vec<String> = document
        .select(&PROFILE_SEL)
        .map(|card| {
            card.select(&PROFILE_VALUE_SEL)
                .next()
                .map(cell_text)
                .unwrap_or_default()
        })
        .collect();

    let required = |index: usize, field: &str| {
        values
            .get(index)
            .cloned()
            .ok_or_else(|| ParseError::MissingField(field.to_string()))
    };

    let text = |v: &str| Ok::<_, ParseError>(v.to_string());

    let home = match optional(&values, 8, text)? {
        Some(offer) => Some(HomeService {
            offer,
            monthly_fee: optional(&values, 9, parse_currency)?,
            download_speeds: optional(&values, 10, text)?,
            upload_speeds: optional(&values, 11, text)?,
            phone: optional(&values, 12, text)?,
            link_identifiers: optional(&values, 13, text)?,
            link_status: optional(&values, 14, text)?,
            activation_date: optional(&values, 15, parse_date)?,
            blocking_date_home: optional(&values, 16, parse_date)?,
            date_of_elimination_home: optional(&values, 17, parse_date)?,
            quote_paid: optional(&values, 18, parse_currency)?,
            voucher: optional(&values, 19, parse_currency)?,
            debt: optional(&values, 20, parse_currency)?,
        }),
        None => None,
    };

    Ok(AccountProfile {
        username: required(0, "username")?,
        blocking_date: parse_date(&required(1, "blocking_date")?)?,
        date_of_elimination: parse_date(&required(2, "date_of_elimination")?)?,
        account_type: required(3, "account_type")?,
        service_type: required(4, "service_type")?,
        credit: parse_currency(&required(5, "credit")?)?,
        time: time_to_seconds(&required(6, "time")?)?,
        mail_account: required(7, "mail_account")?,
        home,
    })
}
