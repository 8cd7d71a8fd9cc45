//! Points-weighted curation of a media library collection.
//!
//! A run turns one watched title into recommendations, matches them against
//! the library, sends missing titles to the download manager, rescores the
//! collection and converges it. The refresher rebuilds the collection from
//! the stored scores on its own schedule.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult};
