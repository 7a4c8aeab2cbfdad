pub mod browser;
pub mod config;
pub mod error;
pub mod logging;
pub mod module;
pub mod portal;

pub use error::{ErrorKind, ScrapeError};
