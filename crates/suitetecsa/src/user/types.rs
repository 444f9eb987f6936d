use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub use crate::types::ActionKind;
use crate::utils::{format_bytes, format_currency, seconds_to_time};

/// Traffic figures only the connections history reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTotals {
    /// Seconds.
    pub total_time: u64,
    /// Bytes.
    pub uploaded: u64,
    /// Bytes.
    pub downloaded: u64,
    /// Bytes.
    pub total_traffic: u64,
}

impl Display for TrafficTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "time {}, up {}, down {}, traffic {}",
            seconds_to_time(self.total_time),
            format_bytes(self.uploaded),
            format_bytes(self.downloaded),
            format_bytes(self.total_traffic)
        )
    }
}

/// A month's history summary as reported by the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub action: ActionKind,
    pub count: u32,
    /// Opaque token echoed back verbatim when requesting history pages.
    pub year_month_selected: String,
    pub total_import: f64,
    pub traffic: Option<TrafficTotals>,
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {} - total {}",
            self.year_month_selected,
            self.count,
            self.action,
            format_currency(self.total_import)
        )?;
        if let Some(traffic) = &self.traffic {
            write!(f, " - {}", traffic)?;
        }
        Ok(())
    }
}

/// Aggregate recomputed from a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub action: ActionKind,
    pub count: u32,
    pub total_import: f64,
    pub traffic: Option<TrafficTotals>,
}

impl Totals {
    pub fn from_records(action: ActionKind, records: &[Record]) -> Totals {
        let total_import = records.iter().map(Record::import).sum();
        let traffic = (action == ActionKind::Connections).then(|| {
            let mut traffic = TrafficTotals::default();
            for record in records {
                if let Record::Connection(c) = record {
                    traffic.total_time += c.duration;
                    traffic.uploaded += c.uploaded;
                    traffic.downloaded += c.downloaded;
                }
            }
            traffic.total_traffic = traffic.uploaded + traffic.downloaded;
            traffic
        });

        Totals {
            action,
            count: records.len() as u32,
            total_import,
            traffic,
        }
    }
}

impl Display for Totals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} - total {}",
            self.count,
            self.action,
            format_currency(self.total_import)
        )?;
        if let Some(traffic) = &self.traffic {
            write!(f, " - {}", traffic)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub start_session: NaiveDateTime,
    pub end_session: NaiveDateTime,
    /// Seconds.
    pub duration: u64,
    /// Bytes.
    pub uploaded: u64,
    /// Bytes.
    pub downloaded: u64,
    pub import: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recharge {
    pub date: NaiveDateTime,
    pub import: f64,
    pub channel: String,
    pub recharge_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub date: NaiveDateTime,
    pub import: f64,
    pub destiny_account: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotePaid {
    pub date: NaiveDateTime,
    pub import: f64,
    pub channel: String,
    pub quote_type: String,
    pub office: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Connection(Connection),
    Recharge(Recharge),
    Transfer(Transfer),
    QuotePaid(QuotePaid),
}

impl Record {
    pub fn kind(&self) -> ActionKind {
        match self {
            Record::Connection(_) => ActionKind::Connections,
            Record::Recharge(_) => ActionKind::Recharges,
            Record::Transfer(_) => ActionKind::Transfers,
            Record::QuotePaid(_) => ActionKind::QuotesPaid,
        }
    }

    /// The date records are ordered by.
    pub fn date(&self) -> NaiveDateTime {
        match self {
            Record::Connection(c) => c.start_session,
            Record::Recharge(r) => r.date,
            Record::Transfer(t) => t.date,
            Record::QuotePaid(q) => q.date,
        }
    }

    pub fn import(&self) -> f64 {
        match self {
            Record::Connection(c) => c.import,
            Record::Recharge(r) => r.import,
            Record::Transfer(t) => t.import,
            Record::QuotePaid(q) => q.import,
        }
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Record::Connection(c) => write!(
                f,
                "{} -> {} ({}) up {}, down {} - {}",
                c.start_session,
                c.end_session,
                seconds_to_time(c.duration),
                format_bytes(c.uploaded),
                format_bytes(c.downloaded),
                format_currency(c.import)
            ),
            Record::Recharge(r) => write!(
                f,
                "{} - {} via {} ({})",
                r.date,
                format_currency(r.import),
                r.channel,
                r.recharge_type
            ),
            Record::Transfer(t) => write!(
                f,
                "{} - {} to {}",
                t.date,
                format_currency(t.import),
                t.destiny_account
            ),
            Record::QuotePaid(q) => write!(
                f,
                "{} - {} via {} ({}) at {}",
                q.date,
                format_currency(q.import),
                q.channel,
                q.quote_type,
                q.office
            ),
        }
    }
}

/// Result of a rolling-window query over the most recent records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lasts {
    pub summary: Totals,
    pub records: Vec<Record>,
}

impl Display for Lasts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.summary)?;
        for (i, record) in self.records.iter().enumerate() {
            writeln!(f, "{:>3}. {}", i + 1, record)?;
        }
        Ok(())
    }
}

/// Account data shown on the user portal's profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub username: String,
    pub blocking_date: NaiveDate,
    pub date_of_elimination: NaiveDate,
    pub account_type: String,
    pub service_type: String,
    pub credit: f64,
    /// Seconds of navigation left at the current credit.
    pub time: u64,
    pub mail_account: String,
    pub home: Option<HomeService>,
}

impl AccountProfile {
    pub fn is_home_service(&self) -> bool {
        self.home.is_some()
    }
}

/// Nauta Hogar block of the profile, present only for home service accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeService {
    pub offer: String,
    pub monthly_fee: Option<f64>,
    pub download_speeds: Option<String>,
    pub upload_speeds: Option<String>,
    pub phone: Option<String>,
    pub link_identifiers: Option<String>,
    pub link_status: Option<String>,
    pub activation_date: Option<NaiveDate>,
    pub blocking_date_home: Option<NaiveDate>,
    pub date_of_elimination_home: Option<NaiveDate>,
    pub quote_paid: Option<f64>,
    pub voucher: Option<f64>,
    pub debt: Option<f64>,
}

impl Display for AccountProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.username)?;
        writeln!(f, "  Account type: {}", self.account_type)?;
        writeln!(f, "  Service type: {}", self.service_type)?;
        writeln!(f, "  Credit: {}", format_currency(self.credit))?;
        writeln!(f, "  Time: {}", seconds_to_time(self.time))?;
        writeln!(f, "  Blocking date: {}", self.blocking_date)?;
        writeln!(f, "  Elimination date: {}", self.date_of_elimination)?;
        writeln!(f, "  Mail account: {}", self.mail_account)?;
        if let Some(home) = &self.home {
            writeln!(f, "  Nauta Hogar offer: {}", home.offer)?;
            if let Some(fee) = home.monthly_fee {
                writeln!(f, "  Monthly fee: {}", format_currency(fee))?;
            }
            if let Some(quote) = home.quote_paid {
                writeln!(f, "  Quote paid: {}", format_currency(quote))?;
            }
            if let Some(debt) = home.debt {
                writeln!(f, "  Debt: {}", format_currency(debt))?;
            }
        }
        Ok(())
    }
}
