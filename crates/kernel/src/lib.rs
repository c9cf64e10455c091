//! Formseal Kernel Library
//!
//! Form tamper protection, string templates and form rendering, plus the
//! HTTP routes of the `formseal` demonstration server.

pub mod config;
pub mod error;
pub mod form;
pub mod routes;
pub mod session;
pub mod state;
pub mod theme;

pub use config::{Config, GuardConfig};
pub use error::{AppError, HelperError};
pub use state::AppState;
