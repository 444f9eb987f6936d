pub mod parser;
pub mod scraper;
pub mod types;

pub use scraper::ConnectPortal;
