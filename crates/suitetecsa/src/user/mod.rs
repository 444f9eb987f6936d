mod lasts;
pub mod pages;
pub mod parser;
pub mod scraper;
pub mod types;

pub use lasts::previous_month;
pub use scraper::UserPortal;
