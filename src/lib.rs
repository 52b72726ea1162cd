// Library interface for rust_post_scraper
// The CLI binary and the integration tests both build on these modules

pub mod app_state;
pub mod auth;
pub mod browser;
pub mod config;
pub mod db;
pub mod error;
pub mod helpers;
pub mod logging;
pub mod models;
pub mod scrape;
pub mod session;

pub use app_state::AppState;
pub use error::{Result, ScraperError};
