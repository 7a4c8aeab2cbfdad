pub mod types;
pub mod match_utils;

pub use types::*;
