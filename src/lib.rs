pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod ml;
pub mod montage;

pub use error::{Error, Result};
