use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::utils::{format_currency, seconds_to_time};

/// State of a captive portal session.
///
/// Serializable so that one process can connect and a later one disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectSession {
    /// `#formulario` action the credentials are posted to.
    pub login_action: String,
    #[serde(rename = "CSRFHW")]
    pub csrfhw: String,
    pub wlanuserip: String,
    pub username: Option<String>,
    #[serde(rename = "ATTRIBUTE_UUID")]
    pub attribute_uuid: Option<String>,
}

impl ConnectSession {
    pub fn is_connected(&self) -> bool {
        self.attribute_uuid.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_status: String,
    pub credit: f64,
    pub expiration_date: String,
    pub access_areas: String,
}

/// One row of the portal's recent connections table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastConnection {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    /// Seconds.
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectInformation {
    pub account_info: AccountInfo,
    pub lasts_connections: Vec<LastConnection>,
}

impl Display for ConnectInformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = &self.account_info;
        writeln!(f, "Account status: {}", info.account_status)?;
        writeln!(f, "Credit: {}", format_currency(info.credit))?;
        writeln!(f, "Expiration date: {}", info.expiration_date)?;
        writeln!(f, "Access areas: {}", info.access_areas)?;
        if !self.lasts_connections.is_empty() {
            writeln!(f, "Last connections:")?;
            for connection in &self.lasts_connections {
                writeln!(
                    f,
                    "  {} -> {} ({})",
                    connection.from,
                    connection.to,
                    seconds_to_time(connection.time)
                )?;
            }
        }
        Ok(())
    }
}
