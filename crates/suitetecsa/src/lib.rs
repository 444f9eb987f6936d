//! Client for ETECSA's Nauta portals.
//!
//! [`UserPortal`] drives the self-service portal: account profile, recharges,
//! transfers and the paginated monthly histories. [`ConnectPortal`] opens and
//! closes internet sessions through the captive portal.

pub mod config;
pub mod connect;
pub mod parser;
pub mod scraper;
pub mod types;
pub mod user;
pub mod utils;

pub use config::{ConfigError, DEFAULT_PAGE_SIZE, PortalConfig};
pub use connect::ConnectPortal;
pub use parser::PortalMessage;
pub use scraper::{Precondition, ScraperError};
pub use types::{ActionKind, Portal};
pub use user::UserPortal;
