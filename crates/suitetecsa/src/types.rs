use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Portal {
    /// The captive portal that opens internet sessions.
    Connect,
    /// The self-service account portal.
    User,
}

#[derive(Debug, thiserror::Error)]
#[error(
    "Invalid action '{0}'. Accepted values: 'connections', 'recharges', 'transfers', 'quotes-paid'"
)]
pub struct ActionKindParseError(String);

/// The history tables exposed by the user portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Connections,
    Recharges,
    Transfers,
    QuotesPaid,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Connections,
        ActionKind::Recharges,
        ActionKind::Transfers,
        ActionKind::QuotesPaid,
    ];

    /// Path segment used by the portal for this history (`<slug>/`,
    /// `<slug>_summary/`, `<slug>_list/`). Also sent as `list_type`.
    pub fn slug(&self) -> &'static str {
        match self {
            ActionKind::Connections => "service_detail",
            ActionKind::Recharges => "recharge_detail",
            ActionKind::Transfers => "transfer_detail",
            ActionKind::QuotesPaid => "nautahogarpaid_detail",
        }
    }

    /// Number of `<td>` cells in one history row.
    pub fn cell_count(&self) -> usize {
        match self {
            ActionKind::Connections => 6,
            ActionKind::Recharges => 4,
            ActionKind::Transfers => 3,
            ActionKind::QuotesPaid => 5,
        }
    }

    pub fn requires_home_service(&self) -> bool {
        matches!(self, ActionKind::QuotesPaid)
    }
}

impl FromStr for ActionKind {
    type Err = ActionKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connections" => Ok(ActionKind::Connections),
            "recharges" => Ok(ActionKind::Recharges),
            "transfers" => Ok(ActionKind::Transfers),
            "quotes-paid" | "quotes_paid" => Ok(ActionKind::QuotesPaid),
            _ => Err(ActionKindParseError(s.to_string())),
        }
    }
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Connections => write!(f, "connections"),
            ActionKind::Recharges => write!(f, "recharges"),
            ActionKind::Transfers => write!(f, "transfers"),
            ActionKind::QuotesPaid => write!(f, "quotes paid"),
        }
    }
}
